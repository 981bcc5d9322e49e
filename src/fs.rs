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

//! The filesystem core: mkfs, mount lifecycle and the file operations.
//!
//! A [`TinyFs`] context owns every filesystem the process knows about, the
//! disks backing them and the single mount slot. Mutating operations keep the
//! free-block bitmap consistent with the inode table and block lists: a
//! block's bit goes down before anything on disk references the block, and
//! goes back up before the reference is erased.

use crate::bitmap;
use crate::clock::Clock;
use crate::clock::SystemClock;
use crate::disk::BLOCK_SIZE;
use crate::disk::Block;
use crate::disk::DiskPool;
use crate::error::Error;
use crate::error::Result;
use crate::inode;
use crate::inode::FileType;
use crate::inode::Inode;
use crate::inode::MAX_FILE_SIZE;
use crate::inode::Perms;
use crate::superblock;
use crate::superblock::DATA_REGION_START;
use crate::superblock::MAX_DISK_SIZE;
use crate::superblock::MIN_DISK_SIZE;
use crate::table;
use crate::table::Fd;
use crate::table::NAME_SIZE;
use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;

/// An open file: the name it was opened under and the read cursor.
struct OpenFile {
    /// The file's name.
    name: String,
    /// The current byte offset, advanced by reads and moved by seeks.
    offset: usize,
}

/// The metadata of a file, as returned by [`TinyFs::stat`].
#[derive(Debug, Eq, PartialEq)]
pub struct Stat {
    /// The file's name.
    pub name: String,
    /// The file's descriptor.
    pub fd: Fd,
    /// The file's permissions.
    pub perms: Perms,
    /// The kind of object the inode describes.
    pub file_type: FileType,
    /// The file's size in bytes.
    pub size: u32,
    /// The number of data blocks allocated for the file.
    pub n_blocks: u32,
    /// Creation time.
    pub ctime: u32,
    /// Last-access time.
    pub atime: u32,
    /// Last-modification time.
    pub mtime: u32,
}

/// The in-memory state of one filesystem image.
struct FileSystem {
    /// Handle of the disk backing the image.
    disk: usize,
    /// Total number of blocks on the disk.
    num_blocks: u32,
    /// Number of bitmap extension blocks in use.
    extension_blocks: u8,
    /// Number of free data-region blocks, kept equal to the number of set
    /// bitmap bits.
    free_blocks: u32,
    /// The open-file table, indexed by descriptor.
    files: Vec<Option<OpenFile>>,
}

impl FileSystem {
    /// Returns the open-file entry of `fd`.
    fn file(&self, fd: Fd) -> Result<&OpenFile> {
        self.files
            .get(fd)
            .and_then(Option::as_ref)
            .ok_or(Error::InvalidFd)
    }

    /// Returns the open-file entry of `fd` for update.
    fn file_mut(&mut self, fd: Fd) -> Result<&mut OpenFile> {
        self.files
            .get_mut(fd)
            .and_then(Option::as_mut)
            .ok_or(Error::InvalidFd)
    }

    /// Reads the inode block of `fd`, returning its block number and content.
    fn load_inode(&self, pool: &mut DiskPool, fd: Fd) -> Result<(u32, Block)> {
        let (_, inode_bnum) = table::entry(pool, self.disk, fd)?;
        let mut block: Block = [0; BLOCK_SIZE];
        pool.read_block(self.disk, inode_bnum, &mut block)?;
        Ok((inode_bnum, block))
    }

    fn open(&mut self, pool: &mut DiskPool, now: u32, name: &str) -> Result<Fd> {
        if name.is_empty() || name.len() > NAME_SIZE || !name.is_ascii() {
            return Err(Error::Creat);
        }
        let fd = table::find_free_slot(pool, self.disk)?;
        let inode_bnum = bitmap::find_free(pool, self.disk, self.extension_blocks)?;
        bitmap::mark_used(pool, self.disk, inode_bnum)?;
        self.free_blocks -= 1;
        let inode = Inode::new(FileType::Data, now);
        pool.write_block(self.disk, inode_bnum, &inode.encode())?;
        table::write_entry(pool, self.disk, fd, name, inode_bnum)?;
        if fd >= self.files.len() {
            self.files.resize_with(fd + 1, || None);
        }
        self.files[fd] = Some(OpenFile {
            name: name.to_string(),
            offset: 0,
        });
        Ok(fd)
    }

    fn close(&mut self, fd: Fd) -> Result<()> {
        self.file(fd)?;
        self.files[fd] = None;
        Ok(())
    }

    fn write(&mut self, pool: &mut DiskPool, now: u32, fd: Fd, buf: &[u8], size: usize) -> Result<()> {
        self.file(fd)?;
        if size > MAX_FILE_SIZE {
            return Err(Error::FileTooLarge);
        }
        if size > buf.len() {
            return Err(Error::FileSize);
        }
        let (inode_bnum, block) = self.load_inode(pool, fd)?;
        let mut inode = Inode::decode(&block);
        if inode.perms == Perms::Ro {
            return Err(Error::InvalidPerms);
        }
        // The blocks the file already holds are reusable, so validate
        // capacity before releasing them and nothing is consumed on failure
        let needed = size / BLOCK_SIZE;
        let held = inode.blocks.len();
        if needed > (self.free_blocks as usize) + held {
            return Err(Error::NoFreeBlocks);
        }
        for bnum in inode.blocks.drain(..) {
            bitmap::mark_free(pool, self.disk, bnum)?;
        }
        self.free_blocks += held as u32;
        for _ in 0..needed {
            let bnum = bitmap::find_free(pool, self.disk, self.extension_blocks)?;
            bitmap::mark_used(pool, self.disk, bnum)?;
            self.free_blocks -= 1;
            inode.blocks.push(bnum);
        }
        inode.size = size as u32;
        inode.atime = now;
        inode.mtime = now;
        pool.write_block(self.disk, inode_bnum, &inode.encode())?;
        for (i, bnum) in inode.blocks.iter().enumerate() {
            let mut data: Block = [0; BLOCK_SIZE];
            data.copy_from_slice(&buf[i * BLOCK_SIZE..][..BLOCK_SIZE]);
            pool.write_block(self.disk, *bnum, &data)?;
        }
        Ok(())
    }

    fn write_byte(&mut self, pool: &mut DiskPool, now: u32, fd: Fd, offset: usize, data: u8) -> Result<()> {
        self.file(fd)?;
        let (inode_bnum, block) = self.load_inode(pool, fd)?;
        let mut inode = Inode::decode(&block);
        if inode.perms == Perms::Ro {
            return Err(Error::InvalidPerms);
        }
        if offset >= inode.size as usize {
            return Err(Error::InvalidOffset);
        }
        let Some(&dbnum) = inode.blocks.get(offset / BLOCK_SIZE) else {
            // The trailing partial block of a write is never allocated
            return Err(Error::InvalidOffset);
        };
        let mut data_block: Block = [0; BLOCK_SIZE];
        pool.read_block(self.disk, dbnum, &mut data_block)?;
        data_block[offset % BLOCK_SIZE] = data;
        pool.write_block(self.disk, dbnum, &data_block)?;
        inode.atime = now;
        inode.mtime = now;
        pool.write_block(self.disk, inode_bnum, &inode.encode())
    }

    fn read_byte(&mut self, pool: &mut DiskPool, now: u32, fd: Fd) -> Result<u8> {
        let offset = self.file(fd)?.offset;
        let (inode_bnum, block) = self.load_inode(pool, fd)?;
        let mut inode = Inode::decode(&block);
        if offset >= inode.size as usize {
            return Err(Error::InvalidOffset);
        }
        let Some(&dbnum) = inode.blocks.get(offset / BLOCK_SIZE) else {
            return Err(Error::InvalidOffset);
        };
        let mut data_block: Block = [0; BLOCK_SIZE];
        pool.read_block(self.disk, dbnum, &mut data_block)?;
        let byte = data_block[offset % BLOCK_SIZE];
        self.file_mut(fd)?.offset += 1;
        inode.atime = now;
        pool.write_block(self.disk, inode_bnum, &inode.encode())?;
        Ok(byte)
    }

    fn seek(&mut self, pool: &mut DiskPool, fd: Fd, offset: usize) -> Result<()> {
        self.file(fd)?;
        let (_, block) = self.load_inode(pool, fd)?;
        if offset >= inode::get_field(&block, inode::SIZE) as usize {
            return Err(Error::InvalidSeek);
        }
        self.file_mut(fd)?.offset = offset;
        Ok(())
    }

    fn delete(&mut self, pool: &mut DiskPool, fd: Fd) -> Result<()> {
        self.file(fd)?;
        let (inode_bnum, block) = self.load_inode(pool, fd)?;
        let inode = Inode::decode(&block);
        if inode.perms == Perms::Ro {
            return Err(Error::InvalidPerms);
        }
        // Data blocks and the inode block go back to the bitmap before the
        // table entry is erased
        for bnum in &inode.blocks {
            bitmap::mark_free(pool, self.disk, *bnum)?;
        }
        bitmap::mark_free(pool, self.disk, inode_bnum)?;
        self.free_blocks += inode.blocks.len() as u32 + 1;
        table::free_entry(pool, self.disk, fd)?;
        self.files[fd] = None;
        Ok(())
    }

    /// Returns the descriptor of the open file named `name`.
    fn fd_of(&self, name: &str) -> Result<Fd> {
        self.files
            .iter()
            .position(|f| f.as_ref().is_some_and(|f| f.name == name))
            .ok_or(Error::NoFd)
    }

    fn set_perms(&mut self, pool: &mut DiskPool, now: u32, name: &str, perms: Perms) -> Result<()> {
        let fd = self.fd_of(name).map_err(|_| Error::FileNotFound)?;
        let (inode_bnum, mut block) = self.load_inode(pool, fd)?;
        let val = match perms {
            Perms::Rw => 0,
            Perms::Ro => 1,
        };
        inode::set_field(&mut block, inode::PERMS, val);
        inode::set_field(&mut block, inode::ATIME, now);
        inode::set_field(&mut block, inode::MTIME, now);
        pool.write_block(self.disk, inode_bnum, &block)
    }

    fn stat(&self, pool: &mut DiskPool, fd: Fd) -> Result<Stat> {
        self.file(fd)?;
        let (name, _) = table::entry(pool, self.disk, fd)?;
        let (_, block) = self.load_inode(pool, fd)?;
        let inode = Inode::decode(&block);
        Ok(Stat {
            name,
            fd,
            perms: inode.perms,
            file_type: inode.file_type,
            size: inode.size,
            n_blocks: inode.blocks.len() as u32,
            ctime: inode.ctime,
            atime: inode.atime,
            mtime: inode.mtime,
        })
    }
}

/// The set of filesystems known to the process, together with the disks
/// backing them, the clock stamping the inodes and the single mount slot.
pub struct TinyFs {
    /// The disks opened so far.
    pool: DiskPool,
    /// Every filesystem created or attached, keyed by image path.
    filesystems: HashMap<PathBuf, FileSystem>,
    /// The image path of the mounted filesystem, if any.
    mounted: Option<PathBuf>,
    /// The timestamp source.
    clock: Box<dyn Clock>,
}

impl TinyFs {
    /// Creates a context using the system clock.
    pub fn new() -> Self {
        Self::with_clock(Box::new(SystemClock))
    }

    /// Creates a context stamping inodes with `clock`.
    pub fn with_clock(clock: Box<dyn Clock>) -> Self {
        Self {
            pool: DiskPool::default(),
            filesystems: HashMap::new(),
            mounted: None,
            clock,
        }
    }

    /// Returns the mounted filesystem along with the disk pool.
    fn mounted_parts(&mut self) -> Result<(&mut DiskPool, &mut FileSystem)> {
        let path = self.mounted.as_ref().ok_or(Error::MountedNone)?;
        let fs = self.filesystems.get_mut(path).ok_or(Error::MountedNone)?;
        Ok((&mut self.pool, fs))
    }

    /// Creates a filesystem image of `n_bytes` bytes at `path` and registers
    /// it. The filesystem is not mounted.
    ///
    /// Fails with an invalid-size error unless
    /// 2 560 <= `n_bytes` <= 1 568 768.
    pub fn mkfs(&mut self, path: &Path, n_bytes: i64) -> Result<()> {
        if !(MIN_DISK_SIZE..=MAX_DISK_SIZE).contains(&n_bytes) {
            return Err(Error::DskSize);
        }
        if self.mounted.as_deref() == Some(path) {
            return Err(Error::MountedFs);
        }
        let disk = self.pool.open(path, n_bytes).map_err(|_| Error::FailedCreat)?;
        let num_blocks = (n_bytes / BLOCK_SIZE as i64) as u32;
        let extension_blocks = superblock::format(&mut self.pool, disk, num_blocks)?;
        // Remaking an image obsoletes its previous disk handle
        if let Some(old) = self.filesystems.remove(path) {
            let _ = self.pool.close(old.disk);
        }
        self.filesystems.insert(
            path.to_path_buf(),
            FileSystem {
                disk,
                num_blocks,
                extension_blocks,
                free_blocks: num_blocks - DATA_REGION_START,
                files: Vec::new(),
            },
        );
        Ok(())
    }

    /// Mounts the filesystem at `path`, verifying its superblock.
    ///
    /// An image unknown to the context, created by an earlier process, is
    /// attached first: the host file is opened without truncation and the
    /// block count, extension count and free-block count are rebuilt from it.
    pub fn mount(&mut self, path: &Path) -> Result<()> {
        if self.mounted.is_some() {
            return Err(Error::MountedFs);
        }
        let (disk, attached) = match self.filesystems.get(path) {
            Some(fs) => (fs.disk, false),
            None => (self.pool.open(path, 0)?, true),
        };
        let extension_blocks = match superblock::probe(&mut self.pool, disk)? {
            Some(ext) => ext,
            None => {
                if attached {
                    let _ = self.pool.close(disk);
                }
                return Err(Error::InvalidFs);
            }
        };
        if attached {
            let num_blocks = self.pool.num_blocks(disk)?;
            let free_blocks = bitmap::count_free(&mut self.pool, disk, extension_blocks)?;
            self.filesystems.insert(
                path.to_path_buf(),
                FileSystem {
                    disk,
                    num_blocks,
                    extension_blocks,
                    free_blocks,
                    files: Vec::new(),
                },
            );
        }
        self.mounted = Some(path.to_path_buf());
        Ok(())
    }

    /// Unmounts the mounted filesystem.
    pub fn unmount(&mut self) -> Result<()> {
        self.mounted.take().ok_or(Error::MountedNone)?;
        Ok(())
    }

    /// Returns the image path of the mounted filesystem, if any.
    pub fn mounted_path(&self) -> Option<&Path> {
        self.mounted.as_deref()
    }

    /// Returns the number of free data-region blocks of the mounted
    /// filesystem.
    pub fn free_blocks(&self) -> Result<u32> {
        Ok(self.mounted_fs()?.free_blocks)
    }

    /// Returns the total number of blocks of the mounted filesystem.
    pub fn total_blocks(&self) -> Result<u32> {
        Ok(self.mounted_fs()?.num_blocks)
    }

    /// Returns the mounted filesystem.
    fn mounted_fs(&self) -> Result<&FileSystem> {
        let path = self.mounted.as_ref().ok_or(Error::MountedNone)?;
        self.filesystems.get(path).ok_or(Error::MountedNone)
    }

    /// Creates a file named `name` and opens it, returning its descriptor.
    ///
    /// The file starts out empty and read/write, with an inode allocated in
    /// the data region. `name` must be 1 to 8 ASCII bytes.
    pub fn open(&mut self, name: &str) -> Result<Fd> {
        let now = self.clock.now();
        let (pool, fs) = self.mounted_parts()?;
        fs.open(pool, now, name)
    }

    /// Closes the descriptor `fd`. The file itself is untouched.
    pub fn close(&mut self, fd: Fd) -> Result<()> {
        let (_, fs) = self.mounted_parts()?;
        fs.close(fd)
    }

    /// Replaces the whole content of `fd` with the first `size` bytes of
    /// `buf`.
    ///
    /// `size / 256` data blocks are allocated; a partial trailing block is
    /// not. The file's previous blocks are released first. Fails with a
    /// no-free-blocks error, before consuming anything, if the allocation
    /// cannot be satisfied.
    pub fn write(&mut self, fd: Fd, buf: &[u8], size: usize) -> Result<()> {
        let now = self.clock.now();
        let (pool, fs) = self.mounted_parts()?;
        fs.write(pool, now, fd, buf, size)
    }

    /// Overwrites the byte at `offset` in the file `fd`.
    pub fn write_byte(&mut self, fd: Fd, offset: usize, data: u8) -> Result<()> {
        let now = self.clock.now();
        let (pool, fs) = self.mounted_parts()?;
        fs.write_byte(pool, now, fd, offset, data)
    }

    /// Reads the byte at the current offset of `fd` and advances the offset.
    pub fn read_byte(&mut self, fd: Fd) -> Result<u8> {
        let now = self.clock.now();
        let (pool, fs) = self.mounted_parts()?;
        fs.read_byte(pool, now, fd)
    }

    /// Moves the offset of `fd` to `offset`, which must be strictly within
    /// the file.
    pub fn seek(&mut self, fd: Fd, offset: usize) -> Result<()> {
        let (pool, fs) = self.mounted_parts()?;
        fs.seek(pool, fd, offset)
    }

    /// Deletes the file `fd`: its data blocks and inode block return to the
    /// bitmap and its table entry is erased. The descriptor becomes invalid.
    pub fn delete(&mut self, fd: Fd) -> Result<()> {
        let (pool, fs) = self.mounted_parts()?;
        fs.delete(pool, fd)
    }

    /// Makes the open file named `name` read-only.
    pub fn make_ro(&mut self, name: &str) -> Result<()> {
        let now = self.clock.now();
        let (pool, fs) = self.mounted_parts()?;
        fs.set_perms(pool, now, name, Perms::Ro)
    }

    /// Makes the open file named `name` read/write.
    pub fn make_rw(&mut self, name: &str) -> Result<()> {
        let now = self.clock.now();
        let (pool, fs) = self.mounted_parts()?;
        fs.set_perms(pool, now, name, Perms::Rw)
    }

    /// Returns the descriptor of the open file named `name`.
    pub fn fd_of(&self, name: &str) -> Result<Fd> {
        self.mounted_fs()?.fd_of(name)
    }

    /// Returns the metadata of the file `fd`.
    pub fn stat(&mut self, fd: Fd) -> Result<Stat> {
        let (pool, fs) = self.mounted_parts()?;
        fs.stat(pool, fd)
    }
}

impl Default for TinyFs {
    fn default() -> Self {
        Self::new()
    }
}
