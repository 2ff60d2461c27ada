use clap::Parser;
use log::{error, info};
use std::path::Path;
use std::process::ExitCode;

use gtruth2yolo::{process_external_dataset, RemapArgs};

fn main() -> ExitCode {
    // Initialize the logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = RemapArgs::parse();

    if !Path::new(&args.external_root).exists() {
        error!(
            "The specified external_root does not exist: {}",
            args.external_root
        );
        return ExitCode::FAILURE;
    }

    info!("Starting external dataset remap...");

    match process_external_dataset(&args) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Failed to remap external dataset: {}", e);
            ExitCode::FAILURE
        }
    }
}
