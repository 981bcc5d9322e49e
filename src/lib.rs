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

//! TinyFS is a small, flat, block-structured filesystem stored inside a
//! single host file treated as a raw device of 256-byte blocks.
//!
//! The on-disk layout is fixed: block 0 is the superblock, blocks 1 and 2
//! are reserved for free-block bitmap extensions, blocks 3 to 7 hold the
//! inode table and everything above is the data region. A [`fs::TinyFs`]
//! context creates, mounts and operates on images through file descriptors.

use std::fmt;
use std::process::exit;

pub mod bitmap;
pub mod clock;
pub mod disk;
pub mod error;
pub mod fs;
pub mod inode;
pub mod prompt;
pub mod superblock;
pub mod table;
pub mod util;

#[cfg(test)]
mod test_util;

pub use error::Error;
pub use error::Result;
pub use fs::Stat;
pub use fs::TinyFs;

/// Writes an error to stderr, then exits.
pub fn error<M: fmt::Display>(bin: &str, msg: M) -> ! {
    eprintln!("{bin}: error: {msg}");
    exit(1);
}
