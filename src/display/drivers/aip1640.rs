/*
 *  display/drivers/aip1640.rs
 *
 *  ledcava - bars on the wall
 *  (c) 2020-26 Stuart Hunter
 *
 *  AiP1640 16x8 LED matrix controller, bit-banged over two GPIO lines
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

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use embedded_hal::digital::OutputPin;
use log::{debug, info};

use crate::display::bitmap::RowBitmap;
use crate::display::error::DisplayError;
use crate::display::protocol::{
    display_control, Level, Line, Transmission,
    DATA_COMMAND, FIXED_ADDRESS, MAX_BRIGHTNESS, MAX_POSITION, MAX_ROWS,
};
use crate::display::traits::MatrixDisplay;

pub const DEFAULT_BRIGHTNESS: u8 = 5;

/// Pins plus everything the chip is known to hold.
struct Bus<CLK, DIO> {
    clk: CLK,
    dio: DIO,
    brightness: u8,
    /// Last rows latched in display RAM
    shadow: RowBitmap,
}

impl<CLK: OutputPin, DIO: OutputPin> Bus<CLK, DIO> {
    fn send(&mut self, tx: &Transmission) -> Result<(), DisplayError> {
        for edge in tx.edges() {
            match (edge.line, edge.level) {
                (Line::Clock, Level::High) => self.clk.set_high().map_err(DisplayError::line)?,
                (Line::Clock, Level::Low) => self.clk.set_low().map_err(DisplayError::line)?,
                (Line::Data, Level::High) => self.dio.set_high().map_err(DisplayError::line)?,
                (Line::Data, Level::Low) => self.dio.set_low().map_err(DisplayError::line)?,
            }
        }
        Ok(())
    }

    fn send_command(&mut self, cmd: u8) -> Result<(), DisplayError> {
        self.send(&Transmission::command(cmd))
    }

    fn send_display_control(&mut self) -> Result<(), DisplayError> {
        self.send_command(display_control(self.brightness))
    }

    fn write_rows(&mut self, data: &[u8], pos: usize) -> Result<(), DisplayError> {
        if pos > MAX_POSITION {
            return Err(DisplayError::InvalidPosition(pos));
        }
        let end = pos + data.len();
        if end > MAX_ROWS {
            return Err(DisplayError::BufferOverflow { pos, len: data.len() });
        }

        if self.shadow[pos..end] == *data {
            return Ok(());
        }

        self.send_command(FIXED_ADDRESS)?;
        self.send(&Transmission::burst(pos as u8, data))?;
        self.shadow[pos..end].copy_from_slice(data);

        // keep the panel lit whatever happened to the control register
        self.send_display_control()
    }
}

/// AiP1640 driver
///
/// Owns the clock and data lines and a shadow of the chip's display RAM.
/// Every public operation takes the bus lock for its full duration.
pub struct Aip1640<CLK: OutputPin, DIO: OutputPin> {
    bus: Mutex<Bus<CLK, DIO>>,
}

impl<CLK: OutputPin, DIO: OutputPin> Aip1640<CLK, DIO> {
    /// Take ownership of the lines and initialize the chip
    ///
    /// # Arguments
    ///
    /// * `clk` - clock line
    /// * `dio` - data line
    /// * `brightness` - initial brightness (0-7)
    pub fn new(clk: CLK, dio: DIO, brightness: u8) -> Result<Self, DisplayError> {
        if brightness > MAX_BRIGHTNESS {
            return Err(DisplayError::InvalidBrightness(brightness));
        }
        let driver = Self {
            bus: Mutex::new(Bus {
                clk,
                dio,
                brightness,
                shadow: [0; MAX_ROWS],
            }),
        };
        driver.initialize()?;
        info!("AiP1640 initialized at brightness {}", brightness);
        Ok(driver)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Bus<CLK, DIO>>, DisplayError> {
        self.bus.lock().map_err(|_| DisplayError::LockPoisoned)
    }

    /// Data command then display control.
    pub fn initialize(&self) -> Result<(), DisplayError> {
        let mut bus = self.lock()?;
        bus.send_command(DATA_COMMAND)?;
        bus.send_display_control()
    }

    /// Copy of the rows last latched in the chip.
    pub fn shadow(&self) -> Result<RowBitmap, DisplayError> {
        Ok(self.lock()?.shadow)
    }

    /// Write the low `len` bytes of `value`, most significant first.
    pub fn write_int(&self, value: u64, pos: usize, len: usize) -> Result<(), DisplayError> {
        if pos > MAX_POSITION {
            return Err(DisplayError::InvalidPosition(pos));
        }
        if len > MAX_ROWS - pos {
            return Err(DisplayError::BufferOverflow { pos, len });
        }
        let be = value.to_be_bytes();
        let significant = be.len() - be.iter().take_while(|&&b| b == 0).count();
        if significant > len {
            return Err(DisplayError::ValueOverflow { value, len });
        }
        let mut data = vec![0u8; len];
        data[len - significant..].copy_from_slice(&be[be.len() - significant..]);
        self.lock()?.write_rows(&data, pos)
    }

    /// Write glyph bytes for up to 16 characters, unmapped characters blank.
    pub fn write_string(&self, text: &str, char_map: &HashMap<char, u8>, pos: usize) -> Result<(), DisplayError> {
        let data: Vec<u8> = text
            .chars()
            .take(MAX_ROWS)
            .map(|c| char_map.get(&c).copied().unwrap_or(0x00))
            .collect();
        self.lock()?.write_rows(&data, pos)
    }
}

impl<CLK, DIO> MatrixDisplay for Aip1640<CLK, DIO>
where
    CLK: OutputPin + Send,
    DIO: OutputPin + Send,
{
    fn write(&self, data: &[u8], pos: usize) -> Result<(), DisplayError> {
        self.lock()?.write_rows(data, pos)
    }

    fn set_brightness(&self, level: u8) -> Result<(), DisplayError> {
        if level > MAX_BRIGHTNESS {
            return Err(DisplayError::InvalidBrightness(level));
        }
        let mut bus = self.lock()?;
        if bus.brightness != level {
            bus.brightness = level;
            bus.send_display_control()?;
        }
        Ok(())
    }

    fn brightness(&self) -> Result<u8, DisplayError> {
        Ok(self.lock()?.brightness)
    }

    fn clear(&self) -> Result<(), DisplayError> {
        let mut bus = self.lock()?;
        if bus.shadow.iter().any(|&row| row != 0) {
            bus.write_rows(&[0; MAX_ROWS], 0)?;
        }
        Ok(())
    }
}

impl<CLK: OutputPin, DIO: OutputPin> Drop for Aip1640<CLK, DIO> {
    /// Best effort blank on the way out; the lines are released when the pins drop.
    fn drop(&mut self) {
        let bus = self.bus.get_mut().unwrap_or_else(|poisoned| {
            debug!("AiP1640 lock poisoned, clearing anyway");
            poisoned.into_inner()
        });
        if bus.shadow.iter().any(|&row| row != 0) {
            if let Err(e) = bus.write_rows(&[0; MAX_ROWS], 0) {
                debug!("Ignoring clear failure on teardown: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::drivers::mock::{MockBus, MockPin};
    use crate::display::protocol::ADDRESS_COMMAND;

    fn driver(brightness: u8) -> (Aip1640<MockPin, MockPin>, MockBus) {
        let bus = MockBus::recording();
        let (clk, dio) = bus.pins();
        let d = Aip1640::new(clk, dio, brightness).unwrap();
        bus.reset();
        (d, bus)
    }

    fn bursts(bus: &MockBus) -> Vec<Vec<u8>> {
        bus.transmissions()
            .into_iter()
            .filter(|t| t.first().is_some_and(|b| b & 0xF0 == ADDRESS_COMMAND))
            .collect()
    }

    #[test]
    fn test_init_sequence() {
        let bus = MockBus::recording();
        let (clk, dio) = bus.pins();
        let _d = Aip1640::new(clk, dio, 3).unwrap();
        assert_eq!(bus.transmissions(), vec![vec![0x40], vec![0x8B]]);
    }

    #[test]
    fn test_invalid_initial_brightness() {
        let bus = MockBus::recording();
        let (clk, dio) = bus.pins();
        assert!(matches!(Aip1640::new(clk, dio, 8), Err(DisplayError::InvalidBrightness(8))));
        assert!(bus.transmissions().is_empty());
    }

    #[test]
    fn test_write_wire_format() {
        let (d, bus) = driver(5);
        d.write(&[0x12, 0x34], 4).unwrap();
        assert_eq!(
            bus.transmissions(),
            vec![vec![0x44], vec![0xC4, 0x12, 0x34], vec![0x8D]]
        );
        let mut expected = [0u8; MAX_ROWS];
        expected[4] = 0x12;
        expected[5] = 0x34;
        assert_eq!(d.shadow().unwrap(), expected);
    }

    #[test]
    fn test_identical_write_skipped() {
        let (d, bus) = driver(5);
        let frame = [0x80; MAX_ROWS];
        d.write_frame(&frame).unwrap();
        d.write_frame(&frame).unwrap();
        assert_eq!(bursts(&bus).len(), 1);

        // a matching sub-slice is also a no-op
        bus.reset();
        d.write(&[0x80, 0x80], 7).unwrap();
        assert!(bus.transmissions().is_empty());
    }

    #[test]
    fn test_clear() {
        let (d, bus) = driver(5);
        d.clear().unwrap();
        assert!(bus.transmissions().is_empty());

        d.write(&[0xFF], 2).unwrap();
        bus.reset();
        d.clear().unwrap();
        assert_eq!(bursts(&bus), vec![{
            let mut t = vec![0xC0];
            t.extend_from_slice(&[0; MAX_ROWS]);
            t
        }]);
        assert_eq!(d.shadow().unwrap(), [0; MAX_ROWS]);

        bus.reset();
        d.clear().unwrap();
        assert!(bus.transmissions().is_empty());
    }

    #[test]
    fn test_brightness_changes_only() {
        let (d, bus) = driver(3);
        d.set_brightness(3).unwrap();
        assert!(bus.transmissions().is_empty());

        d.set_brightness(5).unwrap();
        assert_eq!(bus.transmissions(), vec![vec![0x8D]]);
        assert_eq!(d.brightness().unwrap(), 5);
    }

    #[test]
    fn test_invalid_brightness_leaves_state() {
        let (d, bus) = driver(3);
        assert!(matches!(d.set_brightness(8), Err(DisplayError::InvalidBrightness(8))));
        assert_eq!(d.brightness().unwrap(), 3);
        assert!(bus.transmissions().is_empty());
    }

    #[test]
    fn test_position_bounds() {
        let (d, bus) = driver(5);
        d.write(&[0x01], 15).unwrap();
        assert_eq!(bursts(&bus), vec![vec![0xCF, 0x01]]);

        bus.reset();
        assert!(matches!(
            d.write(&[0x01, 0x02], 15),
            Err(DisplayError::BufferOverflow { pos: 15, len: 2 })
        ));
        assert!(matches!(d.write(&[0x01], 16), Err(DisplayError::InvalidPosition(16))));
        assert!(matches!(
            d.write(&[0u8; 17], 0),
            Err(DisplayError::BufferOverflow { pos: 0, len: 17 })
        ));
        assert!(bus.transmissions().is_empty());
        assert_eq!(d.shadow().unwrap()[15], 0x01);
    }

    #[test]
    fn test_line_failure_propagates_and_shadow_kept() {
        let (d, bus) = driver(5);
        bus.set_failing(true);
        assert!(matches!(d.write(&[0xAA], 0), Err(DisplayError::LineIo(_))));
        bus.set_failing(false);
        assert_eq!(d.shadow().unwrap(), [0; MAX_ROWS]);

        // nothing was latched, so the retry goes out
        d.write(&[0xAA], 0).unwrap();
        assert_eq!(bursts(&bus), vec![vec![0xC0, 0xAA]]);
    }

    #[test]
    fn test_write_int() {
        let (d, bus) = driver(5);
        d.write_int(0x0102, 0, 4).unwrap();
        assert_eq!(bursts(&bus), vec![vec![0xC0, 0x00, 0x00, 0x01, 0x02]]);
        assert!(matches!(
            d.write_int(0x1_0000, 0, 2),
            Err(DisplayError::ValueOverflow { value: 0x1_0000, len: 2 })
        ));
    }

    #[test]
    fn test_write_int_bounds() {
        let (d, bus) = driver(5);
        assert!(matches!(
            d.write_int(1, 0, usize::MAX),
            Err(DisplayError::BufferOverflow { pos: 0, len: usize::MAX })
        ));
        assert!(matches!(
            d.write_int(1, 14, 3),
            Err(DisplayError::BufferOverflow { pos: 14, len: 3 })
        ));
        assert!(matches!(d.write_int(1, 16, 1), Err(DisplayError::InvalidPosition(16))));
        assert!(bus.transmissions().is_empty());

        d.write_int(0xAB, 15, 1).unwrap();
        assert_eq!(bursts(&bus), vec![vec![0xCF, 0xAB]]);
    }

    #[test]
    fn test_write_string() {
        let (d, bus) = driver(5);
        let map: HashMap<char, u8> = [('1', 0x06), ('2', 0x5B)].into_iter().collect();
        d.write_string("12x", &map, 1).unwrap();
        assert_eq!(bursts(&bus), vec![vec![0xC1, 0x06, 0x5B, 0x00]]);
    }

    #[test]
    fn test_drop_clears_panel() {
        let (d, bus) = driver(5);
        d.write(&[0xFF; 4], 0).unwrap();
        bus.reset();
        drop(d);
        let t = bus.transmissions();
        assert_eq!(t[1][0], 0xC0);
        assert!(t[1][1..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_poisoned_lock() {
        let (d, bus) = driver(5);
        d.write(&[0xFF; 4], 0).unwrap();

        fn panic_holding_bus(d: &Aip1640<MockPin, MockPin>) {
            let _bus = d.bus.lock().unwrap();
            panic!("panic while holding the bus");
        }
        let joined = std::thread::scope(|s| s.spawn(|| panic_holding_bus(&d)).join());
        assert!(joined.is_err());

        assert!(matches!(d.write(&[0x01], 0), Err(DisplayError::LockPoisoned)));
        assert!(matches!(d.set_brightness(2), Err(DisplayError::LockPoisoned)));
        assert!(matches!(d.brightness(), Err(DisplayError::LockPoisoned)));
        assert!(matches!(d.clear(), Err(DisplayError::LockPoisoned)));
        assert!(matches!(d.shadow(), Err(DisplayError::LockPoisoned)));
        assert!(bus.transmissions().is_empty());

        // teardown still blanks the panel
        drop(d);
        assert_eq!(bursts(&bus), vec![{
            let mut t = vec![0xC0];
            t.extend_from_slice(&[0; MAX_ROWS]);
            t
        }]);
    }

    #[test]
    fn test_drop_swallows_line_errors() {
        let (d, bus) = driver(5);
        d.write(&[0xFF], 0).unwrap();
        bus.set_failing(true);
        drop(d);
    }
}
