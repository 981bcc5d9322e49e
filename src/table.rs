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

//! Inode table management.
//!
//! The table spans blocks 3 to 7. Each block holds 21 entries of 12 bytes:
//! the file name padded with zeros to 8 bytes, then the big-endian block
//! number of the file's inode. An all-zero entry is a free slot.
//!
//! A file descriptor is `table_block_index * 21 + slot`, the same bijection
//! in both directions.

use crate::disk::BLOCK_SIZE;
use crate::disk::Block;
use crate::disk::DiskPool;
use crate::error::Error;
use crate::error::Result;
use crate::superblock::INODE_TABLE_BLOCKS;
use crate::superblock::INODE_TABLE_START;

/// The size of a table entry in bytes.
pub const ENTRY_SIZE: usize = 12;
/// The number of bytes reserved for the file name in an entry.
pub const NAME_SIZE: usize = 8;
/// The number of entries per table block.
pub const ENTRIES_PER_BLOCK: usize = BLOCK_SIZE / ENTRY_SIZE;

/// A file descriptor.
pub type Fd = usize;

/// Returns the table block index and slot of `fd`, or an error if `fd` is
/// beyond the table.
fn locate(fd: Fd) -> Result<(usize, usize)> {
    let block_index = fd / ENTRIES_PER_BLOCK;
    if block_index >= INODE_TABLE_BLOCKS as usize {
        return Err(Error::InvalidFd);
    }
    Ok((block_index, fd % ENTRIES_PER_BLOCK))
}

/// Returns the descriptor of the first free table slot.
pub fn find_free_slot(pool: &mut DiskPool, disk: usize) -> Result<Fd> {
    let mut block: Block = [0; BLOCK_SIZE];
    for block_index in 0..INODE_TABLE_BLOCKS as usize {
        pool.read_block(disk, INODE_TABLE_START + block_index as u32, &mut block)?;
        for slot in 0..ENTRIES_PER_BLOCK {
            let entry = &block[slot * ENTRY_SIZE..][..ENTRY_SIZE];
            if entry.iter().all(|b| *b == 0) {
                return Ok(block_index * ENTRIES_PER_BLOCK + slot);
            }
        }
    }
    Err(Error::NoFreeBlocks)
}

/// Fills the table slot of `fd` with an entry binding `name` to the inode at
/// block `inode_block`.
pub fn write_entry(pool: &mut DiskPool, disk: usize, fd: Fd, name: &str, inode_block: u32) -> Result<()> {
    debug_assert!(name.len() <= NAME_SIZE);
    let (block_index, slot) = locate(fd)?;
    let bnum = INODE_TABLE_START + block_index as u32;
    let mut block: Block = [0; BLOCK_SIZE];
    pool.read_block(disk, bnum, &mut block)?;
    let entry = &mut block[slot * ENTRY_SIZE..][..ENTRY_SIZE];
    entry.fill(0);
    entry[..name.len()].copy_from_slice(name.as_bytes());
    entry[NAME_SIZE..].copy_from_slice(&inode_block.to_be_bytes());
    pool.write_block(disk, bnum, &block)
}

/// Reads the table entry of `fd`, returning the file name and the block
/// number of its inode. A free slot yields an invalid-descriptor error.
pub fn entry(pool: &mut DiskPool, disk: usize, fd: Fd) -> Result<(String, u32)> {
    let (block_index, slot) = locate(fd)?;
    let mut block: Block = [0; BLOCK_SIZE];
    pool.read_block(disk, INODE_TABLE_START + block_index as u32, &mut block)?;
    let entry = &block[slot * ENTRY_SIZE..][..ENTRY_SIZE];
    if entry.iter().all(|b| *b == 0) {
        return Err(Error::InvalidFd);
    }
    let name = String::from_utf8_lossy(&entry[..NAME_SIZE])
        .trim_end_matches('\0')
        .to_string();
    let inode_block = entry[NAME_SIZE..]
        .iter()
        .fold(0u32, |val, b| (val << 8) | *b as u32);
    Ok((name, inode_block))
}

/// Zeroes the table slot of `fd`.
pub fn free_entry(pool: &mut DiskPool, disk: usize, fd: Fd) -> Result<()> {
    let (block_index, slot) = locate(fd)?;
    let bnum = INODE_TABLE_START + block_index as u32;
    let mut block: Block = [0; BLOCK_SIZE];
    pool.read_block(disk, bnum, &mut block)?;
    block[slot * ENTRY_SIZE..][..ENTRY_SIZE].fill(0);
    pool.write_block(disk, bnum, &block)
}
