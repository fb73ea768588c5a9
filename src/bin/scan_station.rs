// src/bin/scan_station.rs - Terminal scan station
//
// Reads keyboard-wedge scanner input from stdin and reports to the dispatch
// backend configured under [station].
use std::io::BufRead;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::mpsc;
use tracing::Instrument;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dispatch_tracker::scan::console::{self, Command, StationInput};
use dispatch_tracker::scan::debounce::next_burst;
use dispatch_tracker::scan::remote::HttpRemoteStore;
use dispatch_tracker::scan::station::{ScanFeedback, ScanStation, StationSettings};
use dispatch_tracker::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load()?;
    setup_logging(&config)?;

    let remote = HttpRemoteStore::new(
        config.station.base_url.as_str(),
        Duration::from_secs(config.station.request_timeout_secs),
    )?;
    match &config.station.password {
        Some(password) => remote
            .login(&config.station.username, password)
            .await
            .with_context(|| format!("Login to {} failed", config.station.base_url))?,
        None => log::warn!("STATION_PASSWORD not set; requests will be sent without a token"),
    }

    let mut station = ScanStation::new(Arc::new(remote), StationSettings::from(&config.scanner));
    let window = Duration::from_millis(config.scanner.qr_burst_window_ms);
    let span = tracing::info_span!("station", session = %station.session_id());
    run(&mut station, spawn_stdin_reader(), window)
        .instrument(span)
        .await;

    log::info!("Scan station session {} closed", station.session_id());
    Ok(())
}

async fn run(station: &mut ScanStation, mut lines: mpsc::Receiver<String>, window: Duration) {
    println!("{}", console::HELP);
    while let Some(burst) = next_burst(&mut lines, window).await {
        let scanning = station.part_scan_eligibility().is_eligible();
        let input = match console::classify_burst(&burst, scanning) {
            Ok(input) => input,
            Err(message) => {
                println!("[info] {}", message);
                continue;
            }
        };

        let feedback = match input {
            StationInput::Ignored => continue,
            StationInput::BinLabel(text) => station.scan_bin_label(&text).await,
            StationInput::PartScan(text) => station.scan_part(&text),
            StationInput::Command(Command::SelectInvoice(number)) => {
                station.select_invoice(&number).await
            }
            StationInput::Command(Command::LoadBin(text)) => station.scan_bin_label(&text).await,
            StationInput::Command(Command::Reset) => station.reset_all(),
            StationInput::Command(Command::Status) => {
                println!("{}", console::status_report(station.session()));
                continue;
            }
            StationInput::Command(Command::Help) => {
                println!("{}", console::HELP);
                continue;
            }
            StationInput::Command(Command::Quit) => break,
        };
        print_feedback(&feedback);
    }

    if let Some(handle) = station.flush() {
        if let Err(e) = handle.await {
            log::warn!("Final statistics report did not finish: {}", e);
        }
    }
}

fn setup_logging(config: &Config) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.logging.level.as_str()));

    // Feedback owns stdout.
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .context("Failed to install log subscriber")?;

    Ok(())
}

fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(256);
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) => {
                    if tx.blocking_send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    log::error!("Failed to read scanner input: {}", e);
                    break;
                }
            }
        }
    });
    rx
}

fn print_feedback(feedback: &ScanFeedback) {
    match feedback.error_kind {
        Some(kind) => println!("[{}:{}] {}", feedback.status, kind, feedback.message),
        None => println!("[{}] {}", feedback.status, feedback.message),
    }
}
