use clap::Parser;
use log::{error, info};
use std::path::Path;
use std::process::ExitCode;

use gtruth2yolo::{process_dataset, ConvertArgs};

fn main() -> ExitCode {
    // Initialize the logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = ConvertArgs::parse();

    if !Path::new(&args.table).exists() {
        error!("The specified table does not exist: {}", args.table);
        return ExitCode::FAILURE;
    }

    info!("Starting the conversion process...");

    match process_dataset(&args) {
        Ok(_) => {
            info!("Conversion process completed successfully.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Failed to convert dataset: {}", e);
            ExitCode::FAILURE
        }
    }
}
