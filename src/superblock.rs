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

//! Superblock management and the on-disk layout of an image.
//!
//! Layout, in blocks:
//! - 0: superblock (magic, root pointer, extension count, bitmap prefix);
//! - 1 to 2: reserved for free-block bitmap extensions;
//! - 3 to 7: inode table;
//! - 8 and up: data region.

use crate::disk::BLOCK_SIZE;
use crate::disk::Block;
use crate::disk::DiskPool;
use crate::error::Result;
use std::cmp::min;

/// The magic byte identifying an image, held by the first byte of the
/// superblock.
pub const MAGIC: u8 = 0x5a;
/// The block number of the root directory, held by the second byte of the
/// superblock.
pub const ROOT_DIR_BLOCK: u8 = 3;
/// The number of header bytes at the start of the superblock, before the
/// bitmap.
pub const HEADER_BYTES: usize = 3;
/// The number of bitmap bytes the superblock itself can hold.
pub const SB_BITMAP_BYTES: usize = BLOCK_SIZE - HEADER_BYTES;
/// The number of blocks reserved for bitmap extensions, whether used or not.
pub const BITMAP_BLOCKS: u32 = 2;
/// The first block of the inode table.
pub const INODE_TABLE_START: u32 = 1 + BITMAP_BLOCKS;
/// The number of blocks of the inode table.
pub const INODE_TABLE_BLOCKS: u32 = 5;
/// The first block of the data region.
pub const DATA_REGION_START: u32 = INODE_TABLE_START + INODE_TABLE_BLOCKS;

/// The minimum size of an image in bytes: the fixed metadata blocks plus one
/// inode block and one data block.
pub const MIN_DISK_SIZE: i64 = 10 * BLOCK_SIZE as i64;
/// The maximum size of an image in bytes. Beyond this, the free-block bitmap
/// overflows its two extension blocks.
pub const MAX_DISK_SIZE: i64 = 1_568_768;

/// Returns the number of extension blocks needed for a bitmap of
/// `free_blocks` bits.
pub fn extension_blocks(free_blocks: u32) -> u8 {
    let sb_bits = (SB_BITMAP_BYTES * 8) as u32;
    let ext_bits = (BLOCK_SIZE * 8) as u32;
    let rem = free_blocks.saturating_sub(sb_bits);
    rem.div_ceil(ext_bits) as u8
}

/// Writes the superblock and bitmap extension blocks of a fresh image of
/// `num_blocks` blocks, and returns the number of extension blocks.
///
/// Every data-region block starts out free: the first `num_blocks - 8` bitmap
/// bits are set, most significant bit first, and the rest are zero.
pub fn format(pool: &mut DiskPool, disk: usize, num_blocks: u32) -> Result<u8> {
    let free_blocks = num_blocks - DATA_REGION_START;
    let ext = extension_blocks(free_blocks);

    // The bitmap as a contiguous byte string
    let mut bitmap = vec![0xffu8; (free_blocks / 8) as usize];
    let leftover = free_blocks % 8;
    if leftover != 0 {
        bitmap.push(0xffu8 << (8 - leftover));
    }

    let mut block: Block = [0; BLOCK_SIZE];
    block[0] = MAGIC;
    block[1] = ROOT_DIR_BLOCK;
    block[2] = ext;
    let n = min(bitmap.len(), SB_BITMAP_BYTES);
    block[HEADER_BYTES..HEADER_BYTES + n].copy_from_slice(&bitmap[..n]);
    pool.write_block(disk, 0, &block)?;

    // Continuation of the bitmap, one whole block at a time
    let mut rest = &bitmap[n..];
    for i in 0..ext {
        let mut block: Block = [0; BLOCK_SIZE];
        let n = min(rest.len(), BLOCK_SIZE);
        block[..n].copy_from_slice(&rest[..n]);
        rest = &rest[n..];
        pool.write_block(disk, 1 + i as u32, &block)?;
    }
    Ok(ext)
}

/// Tells whether the disk holds a valid superblock, returning its
/// extension-block count if so.
pub fn probe(pool: &mut DiskPool, disk: usize) -> Result<Option<u8>> {
    let mut block: Block = [0; BLOCK_SIZE];
    pool.read_block(disk, 0, &mut block)?;
    if block[0] != MAGIC {
        return Ok(None);
    }
    Ok(Some(block[2]))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_util::TempImage;

    #[test]
    fn extension_count() {
        assert_eq!(extension_blocks(2), 0);
        assert_eq!(extension_blocks(2024), 0);
        assert_eq!(extension_blocks(2025), 1);
        assert_eq!(extension_blocks(4072), 1);
        assert_eq!(extension_blocks(4073), 2);
        assert_eq!(extension_blocks(6120), 2);
    }

    #[test]
    fn format_minimal() {
        let img = TempImage::new("superblock-minimal");
        let mut pool = DiskPool::default();
        let disk = pool.open(img.path(), MIN_DISK_SIZE).unwrap();
        assert_eq!(format(&mut pool, disk, 10), Ok(0));

        let mut block: Block = [0; BLOCK_SIZE];
        pool.read_block(disk, 0, &mut block).unwrap();
        assert_eq!(block[0], MAGIC);
        assert_eq!(block[1], ROOT_DIR_BLOCK);
        assert_eq!(block[2], 0);
        // Two free blocks, most significant bit first
        assert_eq!(block[3], 0xc0);
        assert!(block[4..].iter().all(|b| *b == 0));

        assert_eq!(probe(&mut pool, disk), Ok(Some(0)));
    }

    #[test]
    fn format_with_extension() {
        let img = TempImage::new("superblock-extension");
        let mut pool = DiskPool::default();
        // 2100 blocks: 2092 free bits, 68 of which spill into block 1
        let disk = pool.open(img.path(), 2100 * BLOCK_SIZE as i64).unwrap();
        assert_eq!(format(&mut pool, disk, 2100), Ok(1));

        let mut block: Block = [0; BLOCK_SIZE];
        pool.read_block(disk, 0, &mut block).unwrap();
        assert_eq!(block[2], 1);
        assert!(block[HEADER_BYTES..].iter().all(|b| *b == 0xff));

        pool.read_block(disk, 1, &mut block).unwrap();
        // 68 bits: 8 full bytes then 4 high bits
        assert!(block[..8].iter().all(|b| *b == 0xff));
        assert_eq!(block[8], 0xf0);
        assert!(block[9..].iter().all(|b| *b == 0));
    }

    #[test]
    fn probe_foreign() {
        let img = TempImage::new("superblock-foreign");
        let mut pool = DiskPool::default();
        let disk = pool.open(img.path(), MIN_DISK_SIZE).unwrap();
        assert_eq!(probe(&mut pool, disk), Ok(None));
    }
}
