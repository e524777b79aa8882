/*
 *  pacer.rs
 *
 *  ledcava - bars on the wall
 *  (c) 2020-26 Stuart Hunter
 *
 *  Fixed-rate frame deadlines for the render loop
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
use std::time::{Duration, Instant};

pub struct Pacer {
    next_deadline: Instant,
    frame: Duration,
}

// bit-banging 16 rows is well under a millisecond,
// cava's framerate is the real limit
impl Pacer {
    pub fn new(target_fps: u32) -> Self {
        Self { next_deadline: Instant::now(), frame: Self::period(target_fps) }
    }

    #[inline]
    fn period(fps: u32) -> Duration {
        Duration::from_micros((1_000_000u32 / fps.max(1)) as u64)
    }

    #[inline]
    pub fn frame_time(&self) -> Duration {
        self.frame
    }

    /// Returns true if we should flush now; if true, it also schedules the next deadline.
    #[inline]
    pub fn should_flush(&mut self) -> bool {
        self.should_flush_at(Instant::now())
    }

    fn should_flush_at(&mut self, now: Instant) -> bool {
        if now >= self.next_deadline {
            self.next_deadline = now + self.frame;
            true
        } else {
            false
        }
    }

    /// Time left until the next deadline.
    #[inline]
    pub fn remaining(&self) -> Duration {
        self.next_deadline.saturating_duration_since(Instant::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period() {
        assert_eq!(Pacer::new(60).frame_time(), Duration::from_micros(16_666));
        // zero fps is clamped rather than dividing by zero
        assert_eq!(Pacer::new(0).frame_time(), Duration::from_secs(1));
        assert_eq!(Pacer::new(50).frame_time(), Duration::from_millis(20));
    }

    #[test]
    fn test_deadlines() {
        let mut p = Pacer::new(10);
        let t0 = Instant::now();
        assert!(p.should_flush_at(t0));
        assert!(!p.should_flush_at(t0 + Duration::from_millis(50)));
        assert!(p.should_flush_at(t0 + Duration::from_millis(100)));
        assert!(p.remaining() <= Duration::from_millis(200));
    }
}
