/*
 *  render.rs
 *
 *  ledcava - bars on the wall
 *  (c) 2020-26 Stuart Hunter
 *
 *  Render loop: latest frame -> bitmap -> panel, on its own thread
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

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{debug, error, info};
use serde::{Deserialize, Serialize};

use crate::config::DisplayConfig;
use crate::display::bitmap::{transform, Frame, Orientation};
use crate::display::error::DisplayError;
use crate::display::factory::BoxedDriver;
use crate::display::traits::MatrixDisplay;
use crate::frame::LatestFrame;
use crate::pacer::Pacer;

// upper bound on how long a stop request waits
const IDLE_POLL: Duration = Duration::from_millis(5);

/// What to do when the panel reports an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// End the session
    Halt,
    /// Log it and carry on with the next frame
    LogAndContinue,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RenderStats {
    pub frames: u64,
    pub failures: u64,
}

/// Owns the display for the whole session
pub struct Renderer {
    display: BoxedDriver,
    mirror: bool,
    orientation: Orientation,
    on_frame_error: ErrorPolicy,
    last_seq: Option<u64>,
    stats: RenderStats,
}

impl Renderer {
    pub fn new(display: BoxedDriver, config: &DisplayConfig) -> Self {
        Self {
            display,
            mirror: config.mirror,
            orientation: config.orientation,
            on_frame_error: config.on_frame_error,
            last_seq: None,
            stats: RenderStats::default(),
        }
    }

    pub fn display(&self) -> &dyn MatrixDisplay {
        self.display.as_ref()
    }

    pub fn stats(&self) -> RenderStats {
        self.stats
    }

    /// Draw one frame.
    pub fn render(&self, frame: &Frame) -> Result<(), DisplayError> {
        let bitmap = transform(frame, self.mirror, self.orientation)?;
        self.display.write_frame(&bitmap)
    }

    /// Draw the newest frame if it has not been drawn yet, applying the frame error policy.
    pub fn tick(&mut self, source: &LatestFrame) -> Result<(), DisplayError> {
        let (frame, seq) = source.snapshot_with_seq();
        if self.last_seq == Some(seq) {
            return Ok(());
        }
        match self.render(&frame) {
            Ok(()) => {
                self.last_seq = Some(seq);
                self.stats.frames += 1;
                Ok(())
            }
            Err(e) => {
                self.stats.failures += 1;
                match self.on_frame_error {
                    ErrorPolicy::Halt => Err(e),
                    ErrorPolicy::LogAndContinue => {
                        error!("Display update failed: {}", e);
                        Ok(())
                    }
                }
            }
        }
    }

    /// Render at `fps` until `stop` is raised, then blank the panel.
    pub fn run(mut self, source: Arc<LatestFrame>, fps: u32, stop: Arc<AtomicBool>) -> Result<RenderStats, DisplayError> {
        let mut pacer = Pacer::new(fps);
        info!("Render loop at {} fps ({:?} per frame)", fps, pacer.frame_time());

        while !stop.load(Ordering::Acquire) {
            if pacer.should_flush() {
                self.tick(&source)?;
            }
            thread::sleep(pacer.remaining().min(IDLE_POLL));
        }

        if let Err(e) = self.display.clear() {
            debug!("Ignoring clear failure on shutdown: {}", e);
        }
        info!("Render loop stopped after {} frames ({} failed)", self.stats.frames, self.stats.failures);
        Ok(self.stats)
    }
}

/// Run the renderer on a dedicated blocking thread.
pub fn spawn(
    renderer: Renderer,
    source: Arc<LatestFrame>,
    fps: u32,
    stop: Arc<AtomicBool>,
) -> tokio::task::JoinHandle<Result<RenderStats, DisplayError>> {
    tokio::task::spawn_blocking(move || renderer.run(source, fps, stop))
}
