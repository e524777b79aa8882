/*
 *  cava.rs
 *
 *  ledcava - bars on the wall
 *  (c) 2020-26 Stuart Hunter
 *
 *  cava child process: config generation and bar stream parsing
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
//! cava does the audio capture and FFT. It is started with a generated config
//! in raw ascii mode and prints one `;`-separated line of bar levels per frame
//! on stdout. Each well-formed line becomes the latest [`Frame`].

use std::fmt::Write as _;
use std::io;
use std::path::PathBuf;
use std::process::Stdio;

use log::{debug, info, warn};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::time::{sleep, Duration};

use crate::config::CavaConfig;
use crate::display::bitmap::{Frame, BAR_COUNT, MAX_LEVEL};
use crate::frame::LatestFrame;

const READ_ERROR_BACKOFF: Duration = Duration::from_millis(100);
const MAX_CONSECUTIVE_READ_ERRORS: u32 = 50;

#[derive(Debug, Error)]
pub enum CavaError {
    #[error("failed to write cava config {}: {source}", path.display())]
    Config { path: PathBuf, source: io::Error },
    #[error("CAVA start failed: {0}")]
    Spawn(#[source] io::Error),
    #[error("cava stdout was not captured")]
    NoStdout,
    #[error("CAVA read error: {0}")]
    Read(#[source] io::Error),
}

/// Why a line of cava output was dropped
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LineError {
    #[error("empty line")]
    Empty,
    #[error("not a bar level: {0:?}")]
    NotANumber(String),
    #[error("expected {expected} bars, got {actual}")]
    BarCount { expected: usize, actual: usize },
    #[error("bar level {level} at index {index} above 8")]
    Level { index: usize, level: u32 },
}

/// Parse one raw ascii line, e.g. `0;3;8;...;1;`.
pub fn parse_line(line: &str) -> Result<Frame, LineError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(LineError::Empty);
    }
    let mut frame = [0u8; BAR_COUNT];
    let mut count = 0;
    for (index, field) in line.split(';').filter(|f| !f.is_empty()).enumerate() {
        let level: u32 = field
            .trim()
            .parse()
            .map_err(|_| LineError::NotANumber(field.to_string()))?;
        if level > MAX_LEVEL as u32 {
            return Err(LineError::Level { index, level });
        }
        if let Some(slot) = frame.get_mut(index) {
            *slot = level as u8;
        }
        count += 1;
    }
    if count != BAR_COUNT {
        return Err(LineError::BarCount { expected: BAR_COUNT, actual: count });
    }
    Ok(frame)
}

/// Render the cava ini file.
pub fn render_config(cfg: &CavaConfig) -> String {
    let mut s = String::new();
    let _ = writeln!(s, "[general]");
    let _ = writeln!(s, "bars = {}", cfg.bars);
    let _ = writeln!(s, "framerate = {}", cfg.framerate);
    let _ = writeln!(s, "\n[input]");
    let _ = writeln!(s, "method = {}", cfg.input.method);
    let _ = writeln!(s, "source = {}", cfg.input.source);
    let _ = writeln!(s, "channels = {}", cfg.input.channels);
    let _ = writeln!(s, "\n[output]");
    let _ = writeln!(s, "method = {}", cfg.output.method);
    let _ = writeln!(s, "raw_target = {}", cfg.output.raw_target);
    let _ = writeln!(s, "data_format = {}", cfg.output.data_format);
    let _ = writeln!(s, "ascii_max_range = {}", cfg.output.ascii_max_range);
    let _ = writeln!(s, "\n[smoothing]");
    let _ = writeln!(s, "noise_reduction = {}", cfg.smoothing.noise_reduction);
    let _ = writeln!(s, "monstercat = {}", cfg.smoothing.monstercat);
    let _ = writeln!(s, "waves = {}", cfg.smoothing.waves);
    let _ = writeln!(s, "gravity = {}", cfg.smoothing.gravity);
    let _ = writeln!(s, "ignore = {}", cfg.smoothing.ignore);
    let _ = writeln!(s, "\n[eq]");
    for (band, gain) in &cfg.eq {
        match gain {
            serde_json::Value::String(g) => { let _ = writeln!(s, "{band} = {g}"); }
            g => { let _ = writeln!(s, "{band} = {g}"); }
        }
    }
    s
}

/// Counters from one run of [`pump`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PumpStats {
    pub published: u64,
    pub dropped: u64,
}

/// Read cava lines until EOF, publishing every valid frame.
pub async fn pump<R>(reader: R, sink: &LatestFrame) -> Result<PumpStats, CavaError>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut stats = PumpStats::default();
    let mut errors = 0;
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                errors = 0;
                match parse_line(&line) {
                    Ok(frame) => {
                        sink.publish(frame);
                        stats.published += 1;
                    }
                    Err(LineError::Empty) => {}
                    Err(e) => {
                        debug!("Dropping cava line {:?}: {}", line, e);
                        stats.dropped += 1;
                    }
                }
            }
            Ok(None) => return Ok(stats),
            Err(e) => {
                errors += 1;
                if errors >= MAX_CONSECUTIVE_READ_ERRORS {
                    return Err(CavaError::Read(e));
                }
                warn!("CAVA read error: {}", e);
                sleep(READ_ERROR_BACKOFF).await;
            }
        }
    }
}

/// Running cava process
pub struct Cava {
    child: Child,
    config_path: PathBuf,
}

impl Cava {
    /// Write the config and start cava with it.
    pub fn spawn(cfg: &CavaConfig) -> Result<Self, CavaError> {
        std::fs::write(&cfg.config_path, render_config(cfg)).map_err(|source| CavaError::Config {
            path: cfg.config_path.clone(),
            source,
        })?;

        let mut child = Command::new(&cfg.binary)
            .arg("-p")
            .arg(&cfg.config_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if let Err(rm) = std::fs::remove_file(&cfg.config_path) {
                    debug!("Could not remove {}: {}", cfg.config_path.display(), rm);
                }
                CavaError::Spawn(e)
            })?;

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    warn!("cava: {}", line);
                }
            });
        }

        info!("CAVA started (pid {})", child.id().unwrap_or_default());
        Ok(Self { child, config_path: cfg.config_path.clone() })
    }

    /// Stream frames into `sink` until cava exits.
    pub async fn run(&mut self, sink: &LatestFrame) -> Result<PumpStats, CavaError> {
        let stdout = self.child.stdout.take().ok_or(CavaError::NoStdout)?;
        pump(BufReader::new(stdout), sink).await
    }

    /// Stop cava and remove the generated config.
    pub async fn shutdown(mut self) {
        if let Err(e) = self.child.kill().await {
            debug!("cava kill: {}", e);
        }
        match std::fs::remove_file(&self.config_path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("Could not remove {}: {}", self.config_path.display(), e),
        }
    }
}
