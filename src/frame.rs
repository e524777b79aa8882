/*
 *  frame.rs
 *
 *  ledcava - bars on the wall
 *  (c) 2020-26 Stuart Hunter
 *
 *  Single-slot hand-off between the spectrum reader and the renderer
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

use std::sync::{Mutex, MutexGuard};

use crate::display::bitmap::Frame;

#[derive(Debug, Default)]
struct Slot {
    frame: Frame,
    seq: u64,
}

/// Latest published frame
///
/// A publish overwrites whatever the renderer has not picked up yet: no queue,
/// no backpressure. Readers always see the newest bars.
#[derive(Debug, Default)]
pub struct LatestFrame {
    slot: Mutex<Slot>,
}

impl LatestFrame {
    pub fn new() -> Self {
        Self::default()
    }

    // a frame is plain bytes; a panicked writer cannot leave it half-valid
    fn slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn publish(&self, frame: Frame) {
        let mut slot = self.slot();
        slot.frame = frame;
        slot.seq = slot.seq.wrapping_add(1);
    }

    /// Copy of the newest frame, all zero before the first publish.
    pub fn snapshot(&self) -> Frame {
        self.slot().frame
    }

    /// Newest frame and its publish count.
    pub fn snapshot_with_seq(&self) -> (Frame, u64) {
        let slot = self.slot();
        (slot.frame, slot.seq)
    }
}
