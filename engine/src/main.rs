//! VeloZ engine: the single-process data plane binary. Reads NDJSON
//! commands on stdin, writes NDJSON events on stdout (C11), replaying the
//! WAL on startup and checkpointing it as it runs.

mod context;

use common::config::CoreConfig;
use common::constants::DEFAULT_QUEUE_CAPACITY;
use context::DataPlane;
use std::io::{self, BufRead, Write};
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use veloz_bridge::parse_command;
use veloz_bus::MpmcQueue;
use veloz_oms::{replay_and_resume, WalWriterConfig};

const SERVICE_NAME: &str = "veloz-engine";

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            format!("{}=info", SERVICE_NAME.replace('-', "_")).into()
        }))
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

fn main() -> ExitCode {
    init_tracing();
    info!(version = env!("CARGO_PKG_VERSION"), "starting {SERVICE_NAME}");

    let config = match CoreConfig::load(std::env::var("VELOZ_CONFIG_FILE").ok().as_deref()) {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "failed to load configuration");
            return ExitCode::from(2);
        }
    };

    let wal_cfg = WalWriterConfig {
        max_file_size_bytes: config.wal.max_file_size_bytes,
        checkpoint_interval: config.wal.checkpoint_interval,
        ..WalWriterConfig::default()
    };
    let wal_dir = std::path::Path::new(&config.wal.dir);
    let (replay, wal) = match replay_and_resume(wal_dir, &config.wal.prefix, wal_cfg) {
        Ok(result) => result,
        Err(err) => {
            error!(error = %err, "wal replay failed, cannot start");
            return ExitCode::from(1);
        }
    };
    info!(
        entries_applied = replay.stats.entries_applied,
        corrupted_entries = replay.stats.corrupted_entries,
        "wal replay complete"
    );
    if replay.stats.corrupted_entries > 0 {
        warn!(count = replay.stats.corrupted_entries, "wal replay skipped corrupted tail entries");
    }

    let mut data_plane = DataPlane::new(wal, DEFAULT_QUEUE_CAPACITY);

    let lines = MpmcQueue::<String>::unbounded();
    let reader_lines = lines.clone();
    let reader = std::thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) => {
                    if reader_lines.push(line).is_err() {
                        break;
                    }
                }
                Err(err) => {
                    error!(error = %err, "stdin read error, stopping input");
                    break;
                }
            }
        }
        drop(reader_lines);
    });

    let stdout = io::stdout();
    let mut out = stdout.lock();
    loop {
        match lines.pop_wait(Duration::from_millis(100)) {
            Some(line) => {
                match parse_command(&line) {
                    Ok(cmd) => {
                        for event in data_plane.handle_command(cmd) {
                            data_plane.outbound.push(event);
                        }
                    }
                    Err(err) => {
                        data_plane.note_parse_error();
                        warn!(error = %err, line = %line, "failed to parse inbound command");
                    }
                }
                while let Some(event) = data_plane.outbound.pop() {
                    if writeln!(out, "{}", event.to_line()).is_err() {
                        error!("stdout write failed, halting");
                        return ExitCode::from(1);
                    }
                }
                let _ = out.flush();
            }
            None => {
                if reader.is_finished() {
                    break;
                }
            }
        }
    }

    let _ = reader.join();
    info!("stdin closed, shutting down cleanly");
    ExitCode::from(0)
}
