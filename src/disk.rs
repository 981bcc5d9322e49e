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

//! Fixed-size block I/O over a host file treated as a raw device.

use crate::error::Error;
use crate::error::Result;
use libc::ioctl;
use std::ffi::c_long;
use std::fs;
use std::fs::File;
use std::fs::OpenOptions;
use std::io;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use std::io::Write;
use std::os::fd::AsRawFd;
use std::os::unix::fs::FileTypeExt;
use std::path::Path;

/// The size of a block in bytes.
pub const BLOCK_SIZE: usize = 256;

/// A single disk block.
pub type Block = [u8; BLOCK_SIZE];

/// ioctl macro: Command.
macro_rules! ioc {
    ($a:expr, $b:expr, $c:expr, $d:expr) => {
        (($a) << 30) | (($b) << 8) | ($c) | (($d) << 16)
    };
}

/// ioctl macro: Read command.
macro_rules! ior {
    ($a:expr, $b:expr, $c:ty) => {
        ioc!(2, $a, $b, std::mem::size_of::<$c>() as c_long)
    };
}

/// ioctl command: Get size of disk in bytes.
const BLKGETSIZE64: c_long = ior!(0x12, 114, u64);

/// An open disk image.
struct Disk {
    /// The host file backing the disk.
    file: File,
    /// The number of blocks on the disk.
    num_blocks: u32,
    /// Tells whether the disk is open.
    open: bool,
}

/// The set of disks opened by the process.
///
/// A disk is referenced by the integer handle returned by [`DiskPool::open`].
/// Closing a disk keeps its slot so handles are never reused within the
/// process's lifetime.
#[derive(Default)]
pub struct DiskPool {
    disks: Vec<Disk>,
}

impl DiskPool {
    /// Opens a disk image at `path` and returns its handle.
    ///
    /// `n_bytes` selects the open mode:
    /// - `0`: attach to an existing image without truncating it;
    /// - positive: create or truncate the image and zero-fill it to `n_bytes`;
    /// - negative: fail with an invalid-size error.
    pub fn open(&mut self, path: &Path, n_bytes: i64) -> Result<usize> {
        if n_bytes < 0 {
            return Err(Error::DskSize);
        }
        let (file, size) = if n_bytes == 0 {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .open(path)
                .map_err(|_| Error::Open)?;
            let size = file.metadata().map_err(|_| Error::Open)?.len();
            (file, size)
        } else {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(true)
                .open(path)
                .map_err(|_| Error::Creat)?;
            file.set_len(n_bytes as u64).map_err(|_| Error::Creat)?;
            (file, n_bytes as u64)
        };
        self.disks.push(Disk {
            file,
            num_blocks: (size / BLOCK_SIZE as u64) as u32,
            open: true,
        });
        Ok(self.disks.len() - 1)
    }

    /// Returns the disk with the given handle, checking it is open.
    fn disk(&mut self, handle: usize) -> Result<&mut Disk> {
        let disk = self.disks.get_mut(handle).ok_or(Error::InvalidDisk)?;
        if !disk.open {
            return Err(Error::Closed);
        }
        Ok(disk)
    }

    /// Reads block `bnum` of the disk `handle` into `block`.
    pub fn read_block(&mut self, handle: usize, bnum: u32, block: &mut Block) -> Result<()> {
        let disk = self.disk(handle)?;
        if bnum >= disk.num_blocks {
            return Err(Error::InvalidBnum);
        }
        disk.file
            .seek(SeekFrom::Start(bnum as u64 * BLOCK_SIZE as u64))
            .map_err(|_| Error::Open)?;
        disk.file.read_exact(block).map_err(|_| Error::Open)
    }

    /// Writes `block` to block `bnum` of the disk `handle`.
    pub fn write_block(&mut self, handle: usize, bnum: u32, block: &Block) -> Result<()> {
        let disk = self.disk(handle)?;
        if bnum >= disk.num_blocks {
            return Err(Error::InvalidBnum);
        }
        disk.file
            .seek(SeekFrom::Start(bnum as u64 * BLOCK_SIZE as u64))
            .map_err(|_| Error::Open)?;
        disk.file.write_all(block).map_err(|_| Error::Open)
    }

    /// Returns the number of blocks on the disk `handle`.
    pub fn num_blocks(&self, handle: usize) -> Result<u32> {
        let disk = self.disks.get(handle).ok_or(Error::InvalidDisk)?;
        if !disk.open {
            return Err(Error::Closed);
        }
        Ok(disk.num_blocks)
    }

    /// Closes the disk `handle`. The handle's slot is preserved.
    pub fn close(&mut self, handle: usize) -> Result<()> {
        let disk = self.disks.get_mut(handle).ok_or(Error::InvalidDisk)?;
        disk.open = false;
        Ok(())
    }
}

/// Returns the size in bytes of the host device or file at `path`.
pub fn host_size(path: &Path) -> io::Result<u64> {
    let metadata = fs::metadata(path)?;
    let file_type = metadata.file_type();
    if file_type.is_block_device() || file_type.is_char_device() {
        let dev = File::open(path)?;
        let mut size = 0u64;
        let ret = unsafe { ioctl(dev.as_raw_fd(), BLKGETSIZE64 as _, &mut size) };
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(size)
    } else if file_type.is_file() {
        Ok(metadata.len())
    } else {
        Ok(0)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_util::TempImage;

    #[test]
    fn open_invalid_size() {
        let img = TempImage::new("disk-invalid-size");
        let mut pool = DiskPool::default();
        assert_eq!(pool.open(img.path(), -1), Err(Error::DskSize));
    }

    #[test]
    fn open_missing() {
        let img = TempImage::new("disk-missing");
        let mut pool = DiskPool::default();
        assert_eq!(pool.open(img.path(), 0), Err(Error::Open));
    }

    #[test]
    fn read_write() {
        let img = TempImage::new("disk-read-write");
        let mut pool = DiskPool::default();
        let disk = pool.open(img.path(), 4 * BLOCK_SIZE as i64).unwrap();
        assert_eq!(pool.num_blocks(disk), Ok(4));

        let mut block: Block = [0xab; BLOCK_SIZE];
        pool.write_block(disk, 2, &block).unwrap();

        // A fresh block is zero-filled
        pool.read_block(disk, 1, &mut block).unwrap();
        assert!(block.iter().all(|b| *b == 0));

        pool.read_block(disk, 2, &mut block).unwrap();
        assert!(block.iter().all(|b| *b == 0xab));

        assert_eq!(
            pool.write_block(disk, 4, &block),
            Err(Error::InvalidBnum)
        );
        assert_eq!(
            pool.read_block(disk + 1, 0, &mut block),
            Err(Error::InvalidDisk)
        );
    }

    #[test]
    fn reopen() {
        let img = TempImage::new("disk-reopen");
        let mut pool = DiskPool::default();
        let disk = pool.open(img.path(), 4 * BLOCK_SIZE as i64).unwrap();
        let block: Block = [0x5c; BLOCK_SIZE];
        pool.write_block(disk, 3, &block).unwrap();
        pool.close(disk).unwrap();
        assert_eq!(pool.write_block(disk, 3, &block), Err(Error::Closed));

        // Attaching does not truncate
        let disk = pool.open(img.path(), 0).unwrap();
        assert_eq!(disk, 1);
        assert_eq!(pool.num_blocks(disk), Ok(4));
        let mut block: Block = [0; BLOCK_SIZE];
        pool.read_block(disk, 3, &mut block).unwrap();
        assert!(block.iter().all(|b| *b == 0x5c));
    }
}
