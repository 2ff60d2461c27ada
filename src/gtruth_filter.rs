use clap::Parser;
use log::{error, info};
use std::path::Path;
use std::process::ExitCode;

use gtruth2yolo::{filter_ground_truth, load_ground_truth, save_ground_truth, FilterArgs};

fn run(args: &FilterArgs) -> gtruth2yolo::Result<()> {
    let in_table = Path::new(&args.in_table);
    let out_table = Path::new(&args.out_table);

    info!("Loading ground truth from {}...", in_table.display());
    let ground_truth = load_ground_truth(in_table)?;

    let (filtered, report) = filter_ground_truth(&ground_truth)?;
    report.print_summary();

    save_ground_truth(out_table, &filtered)?;
    info!("Saved: {}", out_table.display());
    Ok(())
}

fn main() -> ExitCode {
    // Initialize the logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = FilterArgs::parse();

    if !Path::new(&args.in_table).exists() {
        error!("The specified table does not exist: {}", args.in_table);
        return ExitCode::FAILURE;
    }

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Failed to filter ground truth: {}", e);
            ExitCode::FAILURE
        }
    }
}
