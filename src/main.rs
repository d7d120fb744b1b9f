//! camscan - Scan-session controller with pluggable decode engines
//!
//! This is the binary entry point. All logic lives in the library.

use std::path::PathBuf;
use std::time::Duration;

use camscan::HeadlessOptions;
use camscan_core::prelude::*;
use camscan_core::{EngineKind, FocusMode, QualityProfile};
use clap::Parser;

/// camscan - Drive a barcode scan session and report NDJSON events
#[derive(Parser, Debug)]
#[command(name = "camscan")]
#[command(about = "Drive a barcode scan session and report NDJSON events", long_about = None)]
struct Args {
    /// Project directory holding .camscan/
    #[arg(value_name = "PATH")]
    path: Option<PathBuf>,

    /// Replay fixture describing the virtual camera
    #[arg(long, value_name = "FILE")]
    fixture: PathBuf,

    /// Decode engine (e.g. zbar, html5-qrcode, scandit)
    #[arg(long)]
    engine: Option<EngineKind>,

    /// Quality profile: low, standard, high or ultra
    #[arg(long)]
    quality: Option<QualityProfile>,

    /// Focus hint: continuous, single-shot, manual or macro
    #[arg(long)]
    focus: Option<FocusMode>,

    /// Camera device id
    #[arg(long, value_name = "ID")]
    device: Option<String>,

    /// Stop the session and exit after this many seconds
    #[arg(long, value_name = "SECS")]
    duration: Option<u64>,

    /// Print the enumerated cameras and exit
    #[arg(long)]
    list_devices: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let project_path = args
        .path
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    if !args.fixture.exists() {
        eprintln!("❌ Replay fixture not found: {}", args.fixture.display());
        std::process::exit(1);
    }

    let mut options = HeadlessOptions::new(project_path, args.fixture);
    options.engine = args.engine;
    options.quality = args.quality;
    options.focus = args.focus;
    options.device = args.device;
    options.duration = args.duration.map(Duration::from_secs);
    options.list_devices = args.list_devices;

    camscan::run_headless(options).await
}
