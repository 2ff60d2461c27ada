use dashmap::DashMap;
use log::{error, info, warn};
use rayon::prelude::*;
use std::path::{Path, PathBuf};

use crate::config::ConvertArgs;
use crate::conversion::{build_image_record, record_to_label_lines, CoordinateNormalizer};
use crate::error::Result;
use crate::io::{
    label_file_name, load_ground_truth, read_image_dimensions, write_dataset_yaml, write_label_file,
};
use crate::polygon::row_has_any_polygon;
use crate::types::{CellValue, ClassCatalog, DatasetYaml, GroundTruth, ProcessingStats};
use crate::utils::{create_progress_bar, ensure_output_directory, to_forward_slashes};

/// What happened to a single image during label writing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageOutcome {
    Written { polygons: usize },
    SkippedMissingImage,
    SkippedBadDimensions,
    DroppedEmpty,
    /// A later row maps to the same label file
    Superseded,
    Failed,
}

impl ProcessingStats {
    pub fn record(&mut self, outcome: ImageOutcome) {
        self.total_images += 1;
        match outcome {
            ImageOutcome::Written { polygons } => {
                self.labels_written += 1;
                self.polygons_written += polygons;
                if polygons == 0 {
                    self.empty_labels += 1;
                }
            }
            ImageOutcome::SkippedMissingImage => self.skipped_missing_image += 1,
            ImageOutcome::SkippedBadDimensions => self.skipped_bad_dimensions += 1,
            ImageOutcome::DroppedEmpty => self.dropped_empty += 1,
            ImageOutcome::Superseded => self.superseded += 1,
            ImageOutcome::Failed => self.failed_writes += 1,
        }
    }
}

/// Label content of one image, computed before anything is written
#[derive(Debug, Clone, PartialEq)]
pub enum PreparedLabel<'a> {
    Skipped(ImageOutcome),
    Ready {
        image_file: &'a str,
        file_name: String,
        lines: Vec<String>,
    },
}

/// Main conversion pipeline: table -> label files + data.yaml
pub fn process_dataset(args: &ConvertArgs) -> Result<ProcessingStats> {
    let table_path = Path::new(&args.table);
    info!("Loading ground truth from {}...", table_path.display());
    let ground_truth = load_ground_truth(table_path)?;
    info!(
        "Loaded {} images with {} classes.",
        ground_truth.len(),
        ground_truth.catalog().len()
    );
    if ground_truth.is_empty() {
        warn!("The table lists no images, only data.yaml will be written.");
    }
    if ground_truth.catalog().is_empty() {
        warn!("The table has no classes.");
    }

    let labels_dir = ensure_output_directory(Path::new(&args.labels_out))?;
    let stats = write_labels(&ground_truth, &labels_dir, args);
    stats.print_summary();

    info!("Creating data.yaml file...");
    let yaml_path = Path::new(&args.yaml_out);
    write_dataset_yaml(yaml_path, &dataset_yaml(args, ground_truth.catalog()))?;
    info!("Labels dir: {}", labels_dir.display());
    info!("data.yaml:  {}", yaml_path.display());

    Ok(stats)
}

/// Write one label file per image in parallel and aggregate the outcomes.
///
/// When several rows map to the same label file, the last such row in table
/// order owns it and the others are counted as superseded.
pub fn write_labels(
    ground_truth: &GroundTruth,
    labels_dir: &Path,
    args: &ConvertArgs,
) -> ProcessingStats {
    let rows: Vec<_> = ground_truth.table().rows().collect();
    let prepared: Vec<PreparedLabel<'_>> = ground_truth
        .image_files()
        .par_iter()
        .zip(rows.par_iter())
        .map(|(image_file, row)| prepare_label(image_file, row, args))
        .collect();

    let owners = label_owners(&prepared);

    let pb = create_progress_bar(prepared.len() as u64, "Labels");
    let stats = prepared
        .into_par_iter()
        .enumerate()
        .map(|(index, label)| {
            let outcome = write_prepared_label(index, label, labels_dir, &owners);
            pb.inc(1);
            outcome
        })
        .fold(ProcessingStats::new, |mut stats, outcome| {
            stats.record(outcome);
            stats
        })
        .reduce(ProcessingStats::new, ProcessingStats::merge);

    pb.finish_with_message("Label writing complete");
    stats
}

/// Label file name -> index of the last row that writes it
pub fn label_owners(prepared: &[PreparedLabel<'_>]) -> DashMap<String, usize> {
    let owners: DashMap<String, usize> = DashMap::new();
    prepared
        .par_iter()
        .enumerate()
        .for_each(|(index, label)| {
            if let PreparedLabel::Ready { file_name, .. } = label {
                owners
                    .entry(file_name.clone())
                    .and_modify(|owner| *owner = (*owner).max(index))
                    .or_insert(index);
            }
        });
    owners
}

fn write_prepared_label(
    index: usize,
    label: PreparedLabel<'_>,
    labels_dir: &Path,
    owners: &DashMap<String, usize>,
) -> ImageOutcome {
    let (image_file, file_name, lines) = match label {
        PreparedLabel::Skipped(outcome) => return outcome,
        PreparedLabel::Ready {
            image_file,
            file_name,
            lines,
        } => (image_file, file_name, lines),
    };

    if owners.get(&file_name).map(|owner| *owner) != Some(index) {
        warn!(
            "Label file {} is also written by a later image, skipping {}",
            file_name, image_file
        );
        return ImageOutcome::Superseded;
    }

    match write_label_file(labels_dir, &file_name, &lines) {
        Ok(_) => ImageOutcome::Written {
            polygons: lines.len(),
        },
        Err(e) => {
            error!("Failed to write labels for {}: {}", image_file, e);
            ImageOutcome::Failed
        }
    }
}

/// Resolve an image identifier against the optional image root
pub fn resolve_image_path(image_root: Option<&str>, image_file: &str) -> PathBuf {
    let image_path = PathBuf::from(image_file);
    match image_root {
        Some(root) if image_path.is_relative() => Path::new(root).join(image_path),
        _ => image_path,
    }
}

/// Check a single image and compute its label lines
pub fn prepare_label<'a>(
    image_file: &'a str,
    row: &[CellValue],
    args: &ConvertArgs,
) -> PreparedLabel<'a> {
    let image_path = resolve_image_path(args.image_root.as_deref(), image_file);
    if !image_path.is_file() {
        warn!("Image file not found, skipping: {:?}", image_path);
        return PreparedLabel::Skipped(ImageOutcome::SkippedMissingImage);
    }

    let normalizer = match read_image_dimensions(&image_path)
        .and_then(|(width, height)| CoordinateNormalizer::new(width, height))
    {
        Ok(normalizer) => normalizer.with_precision(args.precision),
        Err(e) => {
            warn!("Skipping {:?}: {}", image_path, e);
            return PreparedLabel::Skipped(ImageOutcome::SkippedBadDimensions);
        }
    };

    if args.drop_empty && !row_has_any_polygon(row) {
        return PreparedLabel::Skipped(ImageOutcome::DroppedEmpty);
    }

    let Some(file_name) = label_file_name(image_file) else {
        error!("Cannot derive a label file name from {:?}", image_file);
        return PreparedLabel::Skipped(ImageOutcome::Failed);
    };

    let record = build_image_record(image_file, row, &normalizer);
    PreparedLabel::Ready {
        image_file,
        file_name,
        lines: record_to_label_lines(&record, normalizer.precision()),
    }
}

/// data.yaml content for the converted dataset
pub fn dataset_yaml(args: &ConvertArgs, catalog: &ClassCatalog) -> DatasetYaml {
    DatasetYaml {
        path: Some(args.dataset_root.as_str())
            .filter(|root| !root.is_empty())
            .map(to_forward_slashes),
        train: args.train_rel.clone(),
        val: args.val_rel.clone(),
        test: args.test_rel.clone(),
        names: catalog.to_index_map(),
    }
}
