/*
 *  display/error.rs
 *
 *  ledcava - bars on the wall
 *  (c) 2020-26 Stuart Hunter
 *
 *  Unified error types for the matrix display
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use thiserror::Error;

/// Unified error type for all display operations
///
/// Validation variants are raised before anything reaches the bus, so the
/// driver state is untouched and the call can be retried with corrected input.
#[derive(Debug, Error)]
pub enum DisplayError {
    /// Brightness outside 0..=7
    #[error("Brightness must be between 0 and 7, got {0}")]
    InvalidBrightness(u8),

    /// Start row outside 0..=15
    #[error("Position must be between 0 and 15, got {0}")]
    InvalidPosition(usize),

    /// Write would run past the last row register
    #[error("Writing {len} bytes at row {pos} overruns the 16 row registers")]
    BufferOverflow { pos: usize, len: usize },

    /// Bar level outside the column table
    #[error("Bar level {level} at index {index} is outside 0..=8")]
    InvalidLevel { index: usize, level: u8 },

    /// Integer does not fit the requested number of bytes
    #[error("Value {value:#x} does not fit in {len} bytes")]
    ValueOverflow { value: u64, len: usize },

    /// GPIO line failure, not retried
    #[error("GPIO line error: {0}")]
    LineIo(String),

    /// A previous operation panicked while holding the driver lock
    #[error("Display lock poisoned")]
    LockPoisoned,
}

impl DisplayError {
    /// Wrap an embedded-hal pin error.
    pub fn line<E: embedded_hal::digital::Error>(err: E) -> Self {
        DisplayError::LineIo(format!("{:?}", err))
    }

    /// True for errors raised before any bus traffic.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            DisplayError::InvalidBrightness(_)
                | DisplayError::InvalidPosition(_)
                | DisplayError::BufferOverflow { .. }
                | DisplayError::InvalidLevel { .. }
                | DisplayError::ValueOverflow { .. }
        )
    }
}
