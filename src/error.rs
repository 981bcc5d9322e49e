/*
 * Copyright 2025 Luc Lenôtre
 *
 * This file is part of Maestro.
 *
 * Maestro is free software: you can redistribute it and/or modify it under the
 * terms of the GNU General Public License as published by the Free Software
 * Foundation, either version 3 of the License, or (at your option) any later
 * version.
 *
 * Maestro is distributed in the hope that it will be useful, but WITHOUT ANY
 * WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR
 * A PARTICULAR PURPOSE. See the GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License along with
 * Maestro. If not, see <https://www.gnu.org/licenses/>.
 */

//! Errors returned by filesystem operations.
//!
//! Each error maps to a stable negative integer, exposed by [`Error::code`].
//! The codes are part of the on-disk tool contract and must not change.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// An error returned by a filesystem operation.
#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
pub enum Error {
    /// The requested disk size is invalid.
    #[error("invalid disk size")]
    DskSize,
    /// The disk image could not be opened.
    #[error("cannot open disk image")]
    Open,
    /// The disk image could not be created.
    #[error("cannot create disk image")]
    Creat,
    /// The disk has been closed.
    #[error("disk is closed")]
    Closed,
    /// The disk handle does not exist.
    #[error("invalid disk handle")]
    InvalidDisk,
    /// The block number is out of range for the disk.
    #[error("invalid block number")]
    InvalidBnum,
    /// The filesystem could not be created.
    #[error("failed to create filesystem")]
    FailedCreat,
    /// A filesystem is already mounted.
    #[error("a filesystem is already mounted")]
    MountedFs,
    /// No filesystem is mounted.
    #[error("no filesystem is mounted")]
    MountedNone,
    /// The file descriptor does not refer to an open file.
    #[error("invalid file descriptor")]
    InvalidFd,
    /// No free block or table slot is left.
    #[error("no free blocks left")]
    NoFreeBlocks,
    /// The given size does not match the given buffer.
    #[error("invalid file size")]
    FileSize,
    /// The image does not contain a valid filesystem.
    #[error("invalid filesystem")]
    InvalidFs,
    /// The seek offset is past the end of the file.
    #[error("invalid seek offset")]
    InvalidSeek,
    /// The byte offset is past the end of the file.
    #[error("invalid byte offset")]
    InvalidOffset,
    /// The file would exceed the maximum file size.
    #[error("file too large")]
    FileTooLarge,
    /// No open file has the given name.
    #[error("no file descriptor for name")]
    NoFd,
    /// The file does not exist.
    #[error("file not found")]
    FileNotFound,
    /// The operation is not allowed by the file's permissions.
    #[error("invalid permissions")]
    InvalidPerms,
}

impl Error {
    /// Returns the stable integer code of the error.
    pub fn code(self) -> i32 {
        match self {
            Self::DskSize => -1,
            Self::Open => -2,
            Self::Creat => -3,
            Self::Closed => -4,
            Self::InvalidDisk => -5,
            Self::InvalidBnum => -6,
            Self::FailedCreat => -7,
            Self::MountedFs => -8,
            Self::MountedNone => -9,
            Self::InvalidFd => -10,
            Self::NoFreeBlocks => -11,
            Self::FileSize => -12,
            Self::InvalidFs => -13,
            Self::InvalidSeek => -14,
            Self::InvalidOffset => -15,
            Self::FileTooLarge => -16,
            Self::NoFd => -17,
            Self::FileNotFound => -18,
            Self::InvalidPerms => -19,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn codes() {
        assert_eq!(Error::DskSize.code(), -1);
        assert_eq!(Error::Closed.code(), -4);
        assert_eq!(Error::MountedNone.code(), -9);
        assert_eq!(Error::NoFreeBlocks.code(), -11);
        assert_eq!(Error::InvalidOffset.code(), -15);
        assert_eq!(Error::InvalidPerms.code(), -19);
    }
}
