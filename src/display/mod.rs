/*
 *  display/mod.rs
 *
 *  ledcava - bars on the wall
 *  (c) 2020-26 Stuart Hunter
 *
 *  Display subsystem: AiP1640 driver and bar graph bitmap
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

// Core trait definitions
pub mod traits;
pub mod error;

// Wire protocol and frame rendering
pub mod protocol;
pub mod bitmap;

// Hardware access and drivers
pub mod gpio;
pub mod drivers;
pub mod factory;

// Re-exports for convenience
pub use traits::MatrixDisplay;
pub use error::DisplayError;
pub use bitmap::{transform, ColumnTable, Frame, Orientation, RowBitmap, BAR_COUNT, COLUMN_TABLE, MAX_LEVEL};
pub use drivers::aip1640::Aip1640;
pub use factory::{BoxedDriver, DisplayDriverFactory};
