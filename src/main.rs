/*
 *  main.rs
 *
 *  ledcava - bars on the wall
 *  (c) 2020-26 Stuart Hunter
 *
 *  Entry point: settings, display bring-up, cava, render thread, shutdown
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

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;
use log::{debug, error, info, warn};
use tokio::signal::unix::{signal, SignalKind};

use ledcava::cava::Cava;
use ledcava::config::{self, Cli, Config};
use ledcava::display::{BoxedDriver, DisplayDriverFactory};
use ledcava::frame::LatestFrame;
use ledcava::render::{self, ErrorPolicy, Renderer};

include!(concat!(env!("OUT_DIR"), "/build_info.rs"));

/// Waits for SIGINT, SIGTERM or SIGHUP and logs which one arrived.
async fn signal_handler() -> std::io::Result<()> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sighup = signal(SignalKind::hangup())?;

    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT received. Initiating graceful shutdown.");
        }
        _ = sigterm.recv() => {
            info!("SIGTERM received. Initiating graceful shutdown.");
        }
        _ = sighup.recv() => {
            info!("SIGHUP received. Initiating graceful shutdown.");
        }
    }
    Ok(())
}

/// Bring up the panel, applying the configured init error policy.
fn open_display(cfg: &Config, dry_run: bool) -> Result<BoxedDriver> {
    match DisplayDriverFactory::create_from_config(&cfg.display, dry_run) {
        Ok(display) => Ok(display),
        Err(e) => match cfg.display.on_init_error {
            ErrorPolicy::Halt => Err(e).context("Display initialization failed"),
            ErrorPolicy::LogAndContinue => {
                error!("Display initialization failed: {}; continuing without the panel", e);
                DisplayDriverFactory::create_from_config(&cfg.display, true)
                    .context("Fallback display initialization failed")
            }
        },
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = config::load(&cli).context("Loading settings")?;

    if cli.dump_config {
        println!("{}", serde_yaml::to_string(&cfg)?);
        return Ok(());
    }

    env_logger::Builder::from_env(Env::default().default_filter_or(cfg.log_level.as_deref().unwrap_or("info")))
        .format_timestamp_secs()
        .init();

    info!("{} v.{} built {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"), BUILD_DATE);
    info!("Starting system...");

    let display = open_display(&cfg, cli.dry_run)?;
    info!("AiP1640 matrix initialized");

    let frames = Arc::new(LatestFrame::new());
    // on failure the display drops here and blanks itself
    let mut cava = Cava::spawn(&cfg.cava)?;

    let stop = Arc::new(AtomicBool::new(false));
    let mut render_task = render::spawn(
        Renderer::new(display, &cfg.display),
        Arc::clone(&frames),
        cfg.cava.framerate,
        Arc::clone(&stop),
    );
    info!("System ready - Press Ctrl+C to exit");

    let mut render_result = None;
    tokio::select! {
        res = signal_handler() => {
            if let Err(e) = res {
                error!("Signal handler failed: {}", e);
            }
        }
        res = cava.run(&frames) => {
            match res {
                Ok(stats) => warn!("CAVA exited after {} frames ({} lines dropped)", stats.published, stats.dropped),
                Err(e) => error!("{}", e),
            }
        }
        res = &mut render_task => {
            render_result = Some(res);
        }
    }

    info!("Cleaning up...");
    stop.store(true, Ordering::Release);
    cava.shutdown().await;

    let res = match render_result {
        Some(res) => res,
        None => render_task.await,
    };
    info!("Shutdown complete");

    match res {
        Ok(Ok(stats)) => {
            debug!("Rendered {} frames, {} failed", stats.frames, stats.failures);
            Ok(())
        }
        Ok(Err(e)) => Err(e).context("Display halted"),
        Err(e) => Err(e).context("Render thread panicked"),
    }
}
