/*
 *  display/traits.rs
 *
 *  ledcava - bars on the wall
 *  (c) 2020-26 Stuart Hunter
 *
 *  Core trait for the matrix display driver
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

use crate::display::bitmap::RowBitmap;
use crate::display::error::DisplayError;

/// Minimal hardware abstraction for a row-addressed LED matrix
///
/// Methods take `&self`: implementations serialize access internally and hold
/// their lock for the whole operation, so a transmission is never interleaved
/// with another one.
pub trait MatrixDisplay: Send + Sync {
    /// Write row bytes starting at row `pos`.
    ///
    /// Bytes already latched in the chip are not resent.
    fn write(&self, data: &[u8], pos: usize) -> Result<(), DisplayError>;

    /// Set panel brightness (0-7)
    fn set_brightness(&self, level: u8) -> Result<(), DisplayError>;

    /// Current brightness
    fn brightness(&self) -> Result<u8, DisplayError>;

    /// Blank every row
    fn clear(&self) -> Result<(), DisplayError>;

    /// Write a full 16 row frame
    fn write_frame(&self, bitmap: &RowBitmap) -> Result<(), DisplayError> {
        self.write(bitmap, 0)
    }
}
