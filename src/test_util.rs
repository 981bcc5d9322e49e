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

//! Helpers shared by the module tests.

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::process;

/// A scratch image file, removed when dropped.
pub struct TempImage(PathBuf);

impl TempImage {
    /// Creates a scratch image path unique to the process and `tag`.
    pub fn new(tag: &str) -> Self {
        let path = env::temp_dir().join(format!("tinyfs-test-{}-{tag}.img", process::id()));
        let _ = fs::remove_file(&path);
        Self(path)
    }

    /// Returns the path of the image.
    pub fn path(&self) -> &Path {
        &self.0
    }
}

impl Drop for TempImage {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.0);
    }
}
