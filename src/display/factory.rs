/*
 *  display/factory.rs
 *
 *  ledcava - bars on the wall
 *  (c) 2020-26 Stuart Hunter
 *
 *  Builds the matrix display from configuration
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

use log::info;

use crate::config::DisplayConfig;
use crate::display::drivers::aip1640::{Aip1640, DEFAULT_BRIGHTNESS};
use crate::display::drivers::mock::MockBus;
use crate::display::error::DisplayError;
use crate::display::gpio;
use crate::display::traits::MatrixDisplay;

/// Type alias for boxed display driver trait objects
pub type BoxedDriver = Box<dyn MatrixDisplay>;

/// Factory for creating the display driver from configuration
pub struct DisplayDriverFactory;

impl DisplayDriverFactory {
    /// Create and bring up the display
    ///
    /// Opens the lines (or mock lines for a dry run), initializes the chip,
    /// applies the configured brightness and blanks the panel. Any failure
    /// here is fatal to the session.
    pub fn create_from_config(config: &DisplayConfig, dry_run: bool) -> Result<BoxedDriver, DisplayError> {
        let driver: BoxedDriver = if dry_run {
            info!("Dry run - driving mock lines, no hardware touched");
            let (clk, dio) = MockBus::counting().pins();
            Box::new(Aip1640::new(clk, dio, DEFAULT_BRIGHTNESS)?)
        } else {
            let (clk, dio) = gpio::open_lines(&config.gpio_chip, config.clock_pin, config.data_pin)?;
            Box::new(Aip1640::new(clk, dio, DEFAULT_BRIGHTNESS)?)
        };
        Self::bring_up(driver.as_ref(), config)?;
        Ok(driver)
    }

    fn bring_up(driver: &dyn MatrixDisplay, config: &DisplayConfig) -> Result<(), DisplayError> {
        driver.set_brightness(config.brightness)?;
        driver.clear()
    }
}
