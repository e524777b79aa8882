/*
 *  display/drivers/mock.rs
 *
 *  ledcava - bars on the wall
 *  (c) 2020-26 Stuart Hunter
 *
 *  Mock GPIO lines for running without hardware
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

use std::fmt;
use std::sync::{Arc, Mutex};

use embedded_hal::digital::{ErrorKind, ErrorType, OutputPin};
use log::trace;

use crate::display::protocol::{Edge, Level, Line};

/// Error reported by a [`MockPin`] when failures are simulated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockPinError;

impl fmt::Display for MockPinError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "simulated line failure")
    }
}

impl embedded_hal::digital::Error for MockPinError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

/// Reassembles bytes from the pin edges the way the chip samples them
///
/// Data falling while clock is high opens a transmission, each rising clock
/// samples one bit, data rising while clock is high closes it. The extra
/// clock pulse of the stop condition leaves a partial byte that is dropped.
#[derive(Debug, Clone)]
pub struct WireDecoder {
    clk: Level,
    dio: Level,
    open: bool,
    bits: Vec<bool>,
}

impl Default for WireDecoder {
    fn default() -> Self {
        Self { clk: Level::Low, dio: Level::Low, open: false, bits: Vec::new() }
    }
}

impl WireDecoder {
    /// Feed one edge, returning the payload when a stop condition completes.
    pub fn feed(&mut self, edge: Edge) -> Option<Vec<u8>> {
        match edge.line {
            Line::Clock => {
                if self.open && self.clk == Level::Low && edge.level == Level::High {
                    self.bits.push(self.dio == Level::High);
                }
                self.clk = edge.level;
                None
            }
            Line::Data => {
                let prev = self.dio;
                self.dio = edge.level;
                if self.clk != Level::High || prev == edge.level {
                    return None;
                }
                match edge.level {
                    Level::Low => {
                        self.open = true;
                        self.bits.clear();
                        None
                    }
                    Level::High if self.open => {
                        self.open = false;
                        Some(
                            self.bits
                                .chunks_exact(8)
                                .map(|byte| {
                                    byte.iter()
                                        .enumerate()
                                        .fold(0u8, |acc, (i, &bit)| acc | ((bit as u8) << i))
                                })
                                .collect(),
                        )
                    }
                    Level::High => None,
                }
            }
        }
    }
}

/// Decode a whole edge log into transmissions.
pub fn decode(edges: &[Edge]) -> Vec<Vec<u8>> {
    let mut decoder = WireDecoder::default();
    edges.iter().filter_map(|&e| decoder.feed(e)).collect()
}

#[derive(Debug, Default)]
struct MockBusState {
    record: bool,
    failing: bool,
    edges: Vec<Edge>,
    decoder: WireDecoder,
    transmissions: Vec<Vec<u8>>,
    transmission_count: usize,
}

/// Shared wire the two mock lines write to
///
/// A recording bus keeps every edge and decoded transmission for inspection
/// in tests. A counting bus (dry runs) only traces and counts them.
#[derive(Debug, Clone, Default)]
pub struct MockBus {
    state: Arc<Mutex<MockBusState>>,
}

impl MockBus {
    pub fn recording() -> Self {
        let bus = Self::default();
        bus.with_state(|s| s.record = true);
        bus
    }

    pub fn counting() -> Self {
        Self::default()
    }

    /// Clock and data lines on this bus.
    pub fn pins(&self) -> (MockPin, MockPin) {
        (
            MockPin { line: Line::Clock, bus: self.clone() },
            MockPin { line: Line::Data, bus: self.clone() },
        )
    }

    /// Make every pin operation fail until switched off.
    pub fn set_failing(&self, failing: bool) {
        self.with_state(|s| s.failing = failing);
    }

    pub fn edges(&self) -> Vec<Edge> {
        self.with_state(|s| s.edges.clone())
    }

    pub fn transmissions(&self) -> Vec<Vec<u8>> {
        self.with_state(|s| s.transmissions.clone())
    }

    pub fn transmission_count(&self) -> usize {
        self.with_state(|s| s.transmission_count)
    }

    /// Forget recorded traffic; line levels are kept.
    pub fn reset(&self) {
        self.with_state(|s| {
            s.edges.clear();
            s.transmissions.clear();
            s.transmission_count = 0;
        });
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut MockBusState) -> T) -> T {
        let mut guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut guard)
    }

    fn drive(&self, edge: Edge) -> Result<(), MockPinError> {
        self.with_state(|s| {
            if s.failing {
                return Err(MockPinError);
            }
            if s.record {
                s.edges.push(edge);
            }
            if let Some(bytes) = s.decoder.feed(edge) {
                s.transmission_count += 1;
                trace!("wire: {:02X?}", bytes);
                if s.record {
                    s.transmissions.push(bytes);
                }
            }
            Ok(())
        })
    }
}

/// One line of a [`MockBus`]
#[derive(Debug, Clone)]
pub struct MockPin {
    line: Line,
    bus: MockBus,
}

impl ErrorType for MockPin {
    type Error = MockPinError;
}

impl OutputPin for MockPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.bus.drive(Edge { line: self.line, level: Level::Low })
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.bus.drive(Edge { line: self.line, level: Level::High })
    }
}
