/*
 *  display/gpio.rs
 *
 *  ledcava - bars on the wall
 *  (c) 2020-26 Stuart Hunter
 *
 *  GPIO character-device lines for the clock/data pair
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

use linux_embedded_hal::gpio_cdev::{Chip, LineRequestFlags};
use linux_embedded_hal::CdevPin;
use log::info;

use crate::display::error::DisplayError;

const CONSUMER: &str = "ledcava";

/// Request one output line, driven low.
fn request_output(chip: &mut Chip, offset: u32, label: &str) -> Result<CdevPin, DisplayError> {
    let line = chip.get_line(offset).map_err(|e| {
        DisplayError::LineIo(format!("{} line {} unavailable: {}", label, offset, e))
    })?;
    let handle = line
        .request(LineRequestFlags::OUTPUT, 0, CONSUMER)
        .map_err(|e| DisplayError::LineIo(format!("{} line {} request failed: {}", label, offset, e)))?;
    CdevPin::new(handle).map_err(|e| DisplayError::LineIo(format!("{} line {}: {}", label, offset, e)))
}

/// Open the clock and data lines on `chip_path`
///
/// Offsets are line numbers on the chip, which on a Raspberry Pi's
/// `/dev/gpiochip0` are the BCM GPIO numbers.
pub fn open_lines(chip_path: &str, clock: u32, data: u32) -> Result<(CdevPin, CdevPin), DisplayError> {
    let mut chip = Chip::new(chip_path)
        .map_err(|e| DisplayError::LineIo(format!("cannot open {}: {}", chip_path, e)))?;
    let clk = request_output(&mut chip, clock, "clock")?;
    let dio = request_output(&mut chip, data, "data")?;
    info!("GPIO lines on {}: clock={} data={}", chip_path, clock, data);
    Ok((clk, dio))
}
