/*
 *  display/protocol.rs
 *
 *  ledcava - bars on the wall
 *  (c) 2020-26 Stuart Hunter
 *
 *  AiP1640 command set and two-wire transmission framing
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

//! The AiP1640 is driven over a clock/data pair that looks like I2C but has
//! no addressing and no acknowledge. Every command is one framed transmission:
//! a start condition, one or more bytes shifted LSB first, and a stop
//! condition. A [`Transmission`] is that whole sequence as a list of pin
//! edges, so a caller can never shift bits without framing them.

/// Data command: auto-increment addressing, normal mode
pub const DATA_COMMAND: u8 = 0x40;
/// Data command: fixed addressing
pub const FIXED_ADDRESS: u8 = 0x44;
/// Address command base, OR'd with the start row
pub const ADDRESS_COMMAND: u8 = 0xC0;
/// Display control base
pub const DISPLAY_COMMAND: u8 = 0x80;
/// Display control: panel on
pub const DISPLAY_ON: u8 = 0x08;

pub const MAX_BRIGHTNESS: u8 = 7;
pub const MAX_ROWS: usize = 16;
pub const MAX_POSITION: usize = MAX_ROWS - 1;

/// Control byte for a panel that is on at `brightness`.
#[inline]
pub const fn display_control(brightness: u8) -> u8 {
    DISPLAY_COMMAND | DISPLAY_ON | (brightness & MAX_BRIGHTNESS)
}

/// Address command for a start row.
#[inline]
pub const fn address_command(pos: u8) -> u8 {
    ADDRESS_COMMAND | (pos & 0x0F)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line {
    Clock,
    Data,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Low,
    High,
}

impl From<bool> for Level {
    fn from(bit: bool) -> Self {
        if bit { Level::High } else { Level::Low }
    }
}

/// One pin assertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub line: Line,
    pub level: Level,
}

impl Edge {
    const fn clk(level: Level) -> Self {
        Self { line: Line::Clock, level }
    }

    const fn dio(level: Level) -> Self {
        Self { line: Line::Data, level }
    }
}

// data falls while clock is high, then clock drops ready for the first bit
const START: [Edge; 4] = [
    Edge::dio(Level::High),
    Edge::clk(Level::High),
    Edge::dio(Level::Low),
    Edge::clk(Level::Low),
];

// data rises while clock is high
const STOP: [Edge; 4] = [
    Edge::clk(Level::Low),
    Edge::dio(Level::Low),
    Edge::clk(Level::High),
    Edge::dio(Level::High),
];

const EDGES_PER_BYTE: usize = 8 * 3;

/// A complete framed transmission: start, payload bytes, stop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transmission {
    edges: Vec<Edge>,
}

impl Transmission {
    /// Frame `bytes` into one transmission.
    pub fn new(bytes: &[u8]) -> Self {
        let mut edges = Vec::with_capacity(START.len() + bytes.len() * EDGES_PER_BYTE + STOP.len());
        edges.extend_from_slice(&START);
        for &byte in bytes {
            let mut b = byte;
            for _ in 0..8 {
                edges.push(Edge::clk(Level::Low));
                edges.push(Edge::dio(Level::from(b & 1 == 1)));
                edges.push(Edge::clk(Level::High));
                b >>= 1;
            }
        }
        edges.extend_from_slice(&STOP);
        Self { edges }
    }

    /// Single command byte.
    pub fn command(cmd: u8) -> Self {
        Self::new(&[cmd])
    }

    /// Address command for `pos` followed by the row data.
    pub fn burst(pos: u8, data: &[u8]) -> Self {
        let mut bytes = Vec::with_capacity(data.len() + 1);
        bytes.push(address_command(pos));
        bytes.extend_from_slice(data);
        Self::new(&bytes)
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}
