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

//! This module implements utility functions.

use std::fmt;

/// Structure representing a number of bytes.
pub struct ByteSize(pub u64);

impl fmt::Display for ByteSize {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        // A u64 never gets past exbibytes
        let order = self.0.checked_ilog2().unwrap_or(0) / 10;
        let suffix = match order {
            0 => "bytes",
            1 => "KiB",
            2 => "MiB",
            3 => "GiB",
            4 => "TiB",
            5 => "PiB",
            _ => "EiB",
        };
        let unit = 1u64 << (10 * order);
        write!(fmt, "{} {}", self.0 / unit, suffix)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn bytesize() {
        assert_eq!(format!("{}", ByteSize(0)).as_str(), "0 bytes");
        assert_eq!(format!("{}", ByteSize(1)).as_str(), "1 bytes");
        assert_eq!(format!("{}", ByteSize(1023)).as_str(), "1023 bytes");
        assert_eq!(format!("{}", ByteSize(1024)).as_str(), "1 KiB");
        assert_eq!(format!("{}", ByteSize(1025)).as_str(), "1 KiB");
        assert_eq!(format!("{}", ByteSize(2048)).as_str(), "2 KiB");
        assert_eq!(format!("{}", ByteSize(1024 * 1024)).as_str(), "1 MiB");
        assert_eq!(
            format!("{}", ByteSize(1024 * 1024 * 1024)).as_str(),
            "1 GiB"
        );
    }
}
