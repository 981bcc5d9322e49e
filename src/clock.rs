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

//! Time source for inode timestamps.

use std::time::SystemTime;
use std::time::UNIX_EPOCH;

/// A source of seconds-since-epoch timestamps.
///
/// Timestamps are stored on disk as 32-bit big-endian integers.
pub trait Clock {
    /// Returns the current time in seconds since the Unix epoch.
    fn now(&self) -> u32;
}

/// Clock backed by the system time.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u32 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("System clock panic!")
            .as_secs() as u32
    }
}
