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

//! Codec for inode blocks.
//!
//! An inode block holds a fixed metadata prefix followed by the list of the
//! file's data blocks. Every field is a big-endian unsigned integer at a
//! fixed byte offset, described once by the [`Field`] table below.

use crate::disk::BLOCK_SIZE;
use crate::disk::Block;
use std::fmt;

/// A fixed-width big-endian field of an inode block.
#[derive(Clone, Copy)]
pub struct Field {
    /// Byte offset of the field within the block.
    pub offset: usize,
    /// Width of the field in bytes.
    pub width: usize,
}

/// Permission flag: 0 is read/write, 1 is read-only.
pub const PERMS: Field = Field { offset: 0, width: 1 };
/// File type discriminant.
pub const TYPE: Field = Field { offset: 1, width: 1 };
/// File size in bytes.
pub const SIZE: Field = Field { offset: 2, width: 2 };
/// Number of allocated data blocks.
pub const NBLOCKS: Field = Field { offset: 4, width: 4 };
/// Creation time, in seconds since the Unix epoch.
pub const CTIME: Field = Field { offset: 8, width: 4 };
/// Last-access time.
pub const ATIME: Field = Field { offset: 12, width: 4 };
/// Last-modification time.
pub const MTIME: Field = Field { offset: 16, width: 4 };

/// Byte offset of the data-block list.
pub const BLOCK_LIST: usize = 20;
/// Width of a data-block list slot in bytes.
pub const ADDR_SIZE: usize = 4;
/// The maximum number of data blocks of a file, dictated by the space left
/// for the block list.
pub const MAX_DATA_BLOCKS: usize = (BLOCK_SIZE - BLOCK_LIST) / ADDR_SIZE;
/// The maximum size of a file in bytes.
pub const MAX_FILE_SIZE: usize = MAX_DATA_BLOCKS * BLOCK_SIZE;

/// Reads the field `field` of `block`.
pub fn get_field(block: &Block, field: Field) -> u32 {
    block[field.offset..field.offset + field.width]
        .iter()
        .fold(0, |val, b| (val << 8) | *b as u32)
}

/// Writes `value` to the field `field` of `block`.
pub fn set_field(block: &mut Block, field: Field, value: u32) {
    for (i, b) in block[field.offset..field.offset + field.width]
        .iter_mut()
        .rev()
        .enumerate()
    {
        *b = (value >> (8 * i)) as u8;
    }
}

/// The kind of object an inode describes, stored in the type byte.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FileType {
    /// The superblock.
    Superblock,
    /// A directory.
    Directory,
    /// A regular data file.
    Data,
}

impl FileType {
    fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(Self::Superblock),
            1 => Some(Self::Directory),
            2 => Some(Self::Data),
            _ => None,
        }
    }

    fn as_byte(self) -> u8 {
        match self {
            Self::Superblock => 0,
            Self::Directory => 1,
            Self::Data => 2,
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Superblock => write!(fmt, "superblock"),
            Self::Directory => write!(fmt, "directory"),
            Self::Data => write!(fmt, "data"),
        }
    }
}

/// A file's permissions, stored in the permission byte.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Perms {
    /// Read/write.
    Rw,
    /// Read-only.
    Ro,
}

impl fmt::Display for Perms {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rw => write!(fmt, "Read/Write (RW)"),
            Self::Ro => write!(fmt, "Read-Only (RO)"),
        }
    }
}

/// The in-memory form of an inode block.
#[derive(Debug)]
pub struct Inode {
    /// The file's permissions.
    pub perms: Perms,
    /// The kind of object the inode describes.
    pub file_type: FileType,
    /// The file's size in bytes.
    pub size: u32,
    /// Creation time.
    pub ctime: u32,
    /// Last-access time.
    pub atime: u32,
    /// Last-modification time.
    pub mtime: u32,
    /// The file's data blocks, in file order.
    pub blocks: Vec<u32>,
}

impl Inode {
    /// Creates a fresh, empty inode with every timestamp set to `now`.
    pub fn new(file_type: FileType, now: u32) -> Self {
        Self {
            perms: Perms::Rw,
            file_type,
            size: 0,
            ctime: now,
            atime: now,
            mtime: now,
            blocks: Vec::new(),
        }
    }

    /// Decodes an inode block.
    ///
    /// The `nblocks` field is authoritative for the length of the block list;
    /// an all-zero slot before that count also terminates it, since a valid
    /// list never contains block 0.
    pub fn decode(block: &Block) -> Self {
        let n = (get_field(block, NBLOCKS) as usize).min(MAX_DATA_BLOCKS);
        let mut blocks = Vec::with_capacity(n);
        for i in 0..n {
            let slot = Field {
                offset: BLOCK_LIST + i * ADDR_SIZE,
                width: ADDR_SIZE,
            };
            let bnum = get_field(block, slot);
            if bnum == 0 {
                break;
            }
            blocks.push(bnum);
        }
        Self {
            perms: match get_field(block, PERMS) {
                0 => Perms::Rw,
                _ => Perms::Ro,
            },
            file_type: FileType::from_byte(get_field(block, TYPE) as u8)
                .unwrap_or(FileType::Data),
            size: get_field(block, SIZE),
            ctime: get_field(block, CTIME),
            atime: get_field(block, ATIME),
            mtime: get_field(block, MTIME),
            blocks,
        }
    }

    /// Encodes the inode into a block. Unused block-list slots are zeroed.
    pub fn encode(&self) -> Block {
        debug_assert!(self.blocks.len() <= MAX_DATA_BLOCKS);
        let mut block: Block = [0; BLOCK_SIZE];
        set_field(
            &mut block,
            PERMS,
            match self.perms {
                Perms::Rw => 0,
                Perms::Ro => 1,
            },
        );
        set_field(&mut block, TYPE, self.file_type.as_byte() as u32);
        set_field(&mut block, SIZE, self.size);
        set_field(&mut block, NBLOCKS, self.blocks.len() as u32);
        set_field(&mut block, CTIME, self.ctime);
        set_field(&mut block, ATIME, self.atime);
        set_field(&mut block, MTIME, self.mtime);
        for (i, bnum) in self.blocks.iter().enumerate() {
            let slot = Field {
                offset: BLOCK_LIST + i * ADDR_SIZE,
                width: ADDR_SIZE,
            };
            set_field(&mut block, slot, *bnum);
        }
        block
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn fields() {
        let mut block: Block = [0; BLOCK_SIZE];
        set_field(&mut block, SIZE, 0x1234);
        assert_eq!(block[2], 0x12);
        assert_eq!(block[3], 0x34);
        assert_eq!(get_field(&block, SIZE), 0x1234);

        set_field(&mut block, CTIME, 0xdead_beef);
        assert_eq!(&block[8..12], &[0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(get_field(&block, CTIME), 0xdead_beef);
    }

    #[test]
    fn codec() {
        let mut inode = Inode::new(FileType::Data, 1000);
        inode.size = 700;
        inode.blocks = vec![9, 10, 11];
        inode.mtime = 1002;

        let block = inode.encode();
        assert_eq!(block[0], 0);
        assert_eq!(block[1], 2);
        let decoded = Inode::decode(&block);
        assert_eq!(decoded.perms, Perms::Rw);
        assert_eq!(decoded.file_type, FileType::Data);
        assert_eq!(decoded.size, 700);
        assert_eq!(decoded.ctime, 1000);
        assert_eq!(decoded.atime, 1000);
        assert_eq!(decoded.mtime, 1002);
        assert_eq!(decoded.blocks, vec![9, 10, 11]);
    }

    #[test]
    fn full_block_list() {
        // A 59-block file fills the block exactly, leaving no terminator
        let mut inode = Inode::new(FileType::Data, 0);
        inode.blocks = (8..8 + MAX_DATA_BLOCKS as u32).collect();
        inode.size = MAX_FILE_SIZE as u32;

        let block = inode.encode();
        assert_eq!(BLOCK_LIST + MAX_DATA_BLOCKS * ADDR_SIZE, BLOCK_SIZE);
        let decoded = Inode::decode(&block);
        assert_eq!(decoded.blocks.len(), MAX_DATA_BLOCKS);
        assert_eq!(decoded.blocks[MAX_DATA_BLOCKS - 1], 66);
    }

    #[test]
    fn advisory_terminator() {
        // An overlong count stops at the first all-zero slot
        let mut inode = Inode::new(FileType::Data, 0);
        inode.blocks = vec![9, 10];
        let mut block = inode.encode();
        set_field(&mut block, NBLOCKS, 5);
        assert_eq!(Inode::decode(&block).blocks, vec![9, 10]);
    }
}
