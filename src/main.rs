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

//! The `tfs` tool creates and inspects TinyFS images.

use std::env;
use std::path::PathBuf;
use std::process::exit;
use tinyfs::TinyFs;
use tinyfs::bitmap;
use tinyfs::disk;
use tinyfs::disk::BLOCK_SIZE;
use tinyfs::disk::Block;
use tinyfs::disk::DiskPool;
use tinyfs::error;
use tinyfs::inode::Inode;
use tinyfs::prompt::prompt;
use tinyfs::superblock;
use tinyfs::table;
use tinyfs::table::ENTRIES_PER_BLOCK;
use tinyfs::util::ByteSize;

/// The size of a fresh image when none is given and the target does not
/// already exist.
const DEFAULT_DISK_SIZE: i64 = 10240;

/// Prints the command's usage.
fn print_usage() {
    eprintln!("Usage:");
    eprintln!(" tfs mkfs <path> [size]");
    eprintln!(" tfs info <path>");
    eprintln!(" tfs -h");
    eprintln!();
    eprintln!("Options:");
    eprintln!(" -h:\tprints usage");
    eprintln!(" path:\tthe path to the image file or device");
    eprintln!(" size:\tthe image size in bytes. Defaults to the size of the existing file or device");
}

/// Creates an image at `path`, asking before clobbering an existing
/// filesystem.
fn mkfs(path: PathBuf, size: Option<i64>) {
    let size = size.unwrap_or_else(|| match disk::host_size(&path) {
        Ok(0) | Err(_) => DEFAULT_DISK_SIZE,
        Ok(size) => size as i64,
    });
    let mut pool = DiskPool::default();
    if let Ok(d) = pool.open(&path, 0) {
        if let Ok(Some(_)) = superblock::probe(&mut pool, d) {
            println!("{} already contains a filesystem", path.display());
            let confirm = prompt("Proceed anyway? (y/N) ")
                .map(|s| s.to_lowercase() == "y")
                .unwrap_or(false);
            if !confirm {
                eprintln!("Abort.");
                exit(1);
            }
        }
        let _ = pool.close(d);
    }
    let mut ctx = TinyFs::new();
    ctx.mkfs(&path, size)
        .unwrap_or_else(|e| error("tfs", format_args!("{}: {e}", path.display())));
    println!(
        "Created a {} filesystem at {}",
        ByteSize(size as u64),
        path.display()
    );
}

/// Prints a summary of the image at `path` and lists its files.
fn info(path: PathBuf) {
    let mut pool = DiskPool::default();
    let d = pool
        .open(&path, 0)
        .unwrap_or_else(|e| error("tfs", format_args!("{}: {e}", path.display())));
    let ext = superblock::probe(&mut pool, d)
        .unwrap_or_else(|e| error("tfs", format_args!("{}: {e}", path.display())))
        .unwrap_or_else(|| error("tfs", format_args!("{}: not a TinyFS image", path.display())));
    let num_blocks = pool.num_blocks(d).unwrap_or(0);
    let free = bitmap::count_free(&mut pool, d, ext)
        .unwrap_or_else(|e| error("tfs", format_args!("{}: {e}", path.display())));
    println!("Image: {}", path.display());
    println!(
        "Size: {} ({num_blocks} blocks, {free} free)",
        ByteSize(num_blocks as u64 * BLOCK_SIZE as u64)
    );
    println!("Bitmap extension blocks: {ext}");
    println!();
    println!("Name\tBlock\tType\tPerms\tSize\tBlocks");
    for fd in 0..superblock::INODE_TABLE_BLOCKS as usize * ENTRIES_PER_BLOCK {
        let Ok((name, bnum)) = table::entry(&mut pool, d, fd) else {
            continue;
        };
        let mut block: Block = [0; BLOCK_SIZE];
        if pool.read_block(d, bnum, &mut block).is_err() {
            continue;
        }
        let inode = Inode::decode(&block);
        println!(
            "{name}\t{bnum}\t{}\t{}\t{}\t{}",
            inode.file_type,
            inode.perms,
            inode.size,
            inode.blocks.len()
        );
    }
}

fn main() {
    let args: Vec<_> = env::args_os().skip(1).collect();
    match &args[..] {
        [opt] if opt == "-h" || opt == "--help" => {
            print_usage();
            exit(0);
        }
        [cmd, path] if cmd == "mkfs" => mkfs(PathBuf::from(path), None),
        [cmd, path, size] if cmd == "mkfs" => {
            let parsed = size.to_str().and_then(|s| s.parse::<i64>().ok());
            let Some(size) = parsed else {
                error(
                    "tfs",
                    format_args!("invalid size `{}`", size.to_string_lossy()),
                );
            };
            mkfs(PathBuf::from(path), Some(size));
        }
        [cmd, path] if cmd == "info" => info(PathBuf::from(path)),
        _ => {
            print_usage();
            exit(1);
        }
    }
}
