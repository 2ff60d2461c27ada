//! External YOLO dataset remapping
//!
//! Copies a third-party YOLO dataset into the unified dataset layout, keeping
//! only the classes named in the mapping and renumbering them to the unified
//! class catalog.

use dashmap::DashMap;
use glob::glob;
use log::{info, warn};
use rayon::prelude::*;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::{ClassMapping, RemapArgs};
use crate::error::{Error, Result};
use crate::io::{read_external_data_yaml, write_dataset_yaml, write_label_file};
use crate::types::{ClassCatalog, DatasetYaml};
use crate::utils::{
    create_progress_bar, ensure_output_directory, has_image_extension, to_forward_slashes,
};

/// Split keys read from the external data.yaml, in processing order.
pub const SPLITS: [&str; 3] = ["train", "val", "test"];

/// Source class index -> target class index
pub type ClassRemap = HashMap<usize, usize>;

// Counters for the remap run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RemapStats {
    pub scanned: usize,
    pub kept: usize,
    pub dropped: usize,
    /// Images whose output name is taken by a later image of the split
    pub superseded: usize,
}

impl RemapStats {
    pub fn merge(mut self, other: Self) -> Self {
        self.scanned += other.scanned;
        self.kept += other.kept;
        self.dropped += other.dropped;
        self.superseded += other.superseded;
        self
    }

    pub fn print_summary(&self) {
        info!("=== Remap Summary ===");
        info!("Images scanned:    {}", self.scanned);
        info!("Images copied:     {}", self.kept);
        info!("Images dropped:    {}", self.dropped);
        info!("Images superseded: {}", self.superseded);
    }
}

// Output directories for one split
struct SplitDirs {
    images_dir: PathBuf,
    labels_dir: PathBuf,
}

/// Resolve the mapping against the external class names.
///
/// Every source must exist in `source_names` and every target in `target_names`.
pub fn resolve_class_remap(
    source_names: &[String],
    target_names: &[String],
    mappings: &[ClassMapping],
    yaml_path: &Path,
) -> Result<ClassRemap> {
    let mut remap = ClassRemap::with_capacity(mappings.len());
    for mapping in mappings {
        let source_id = source_names
            .iter()
            .position(|name| name == &mapping.source)
            .ok_or_else(|| Error::UnknownClass {
                name: mapping.source.clone(),
                path: yaml_path.to_path_buf(),
            })?;
        let target_id = target_names
            .iter()
            .position(|name| name == &mapping.target)
            .ok_or_else(|| {
                Error::InvalidClassMapping(format!(
                    "target '{}' is not one of the target names {:?}",
                    mapping.target, target_names
                ))
            })?;
        if let Some(previous) = remap.insert(source_id, target_id) {
            if previous != target_id {
                return Err(Error::InvalidClassMapping(format!(
                    "source '{}' is mapped more than once",
                    mapping.source
                )));
            }
        }
    }
    Ok(remap)
}

/// Rewrite the class id of every label line, dropping lines whose class is
/// not remapped or cannot be parsed. Remaining tokens are kept verbatim.
pub fn remap_label_lines(content: &str, remap: &ClassRemap) -> Vec<String> {
    content
        .lines()
        .filter_map(|line| {
            let mut tokens = line.split_whitespace();
            let class_token = tokens.next()?;
            let class_id = parse_class_id(class_token)?;
            let target_id = remap.get(&class_id)?;

            let mut out = target_id.to_string();
            for token in tokens {
                out.push(' ');
                out.push_str(token);
            }
            Some(out)
        })
        .collect()
}

// Class ids are sometimes written as floats ("1.0"); truncate toward zero
fn parse_class_id(token: &str) -> Option<usize> {
    let value = token.parse::<f64>().ok()?.trunc();
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    Some(value as usize)
}

/// Read and remap a label file. Returns `Ok(None)` when the label file does not exist.
pub fn filter_and_remap_label(
    label_path: &Path,
    remap: &ClassRemap,
) -> Result<Option<Vec<String>>> {
    if !label_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(label_path).map_err(|source| Error::Read {
        path: label_path.to_path_buf(),
        source,
    })?;
    Ok(Some(remap_label_lines(&content, remap)))
}

/// Images directly inside `dir` with a supported extension, sorted by path
pub fn list_images(dir: &Path) -> Vec<PathBuf> {
    let pattern = format!("{}/*", glob::Pattern::escape(&dir.to_string_lossy()));
    let mut images: Vec<PathBuf> = match glob(&pattern) {
        Ok(paths) => paths
            .filter_map(|entry| entry.ok())
            .filter(|path| path.is_file() && has_image_extension(path))
            .collect(),
        Err(e) => {
            warn!("Invalid image glob pattern {}: {}", pattern, e);
            Vec::new()
        }
    };
    images.sort();
    images
}

/// Copy an image and write its remapped label under `<tag>__<stem>`
fn copy_pair(
    image_path: &Path,
    dirs: &SplitDirs,
    new_stem: &str,
    label_lines: &[String],
) -> Result<()> {
    let extension = image_path
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
        .unwrap_or_default();
    let dst_image = dirs.images_dir.join(format!("{}{}", new_stem, extension));
    fs::copy(image_path, &dst_image).map_err(|source| Error::Write {
        path: dst_image.clone(),
        source,
    })?;

    let file_name = format!("{}.txt", new_stem);
    if let Err(e) = write_label_file(&dirs.labels_dir, &file_name, label_lines) {
        let _ = fs::remove_file(&dst_image);
        return Err(e);
    }
    Ok(())
}

// A kept image and its remapped label, before anything is copied
struct PreparedCopy<'a> {
    image_path: &'a Path,
    new_stem: String,
    lines: Vec<String>,
}

/// Process one split of the external dataset.
///
/// Images whose output names collide are resolved in listing order: the last
/// one is copied and the others are counted as superseded.
fn process_split(
    split_name: &str,
    image_dir: &Path,
    label_dir: &Path,
    out_root: &Path,
    args: &RemapArgs,
    remap: &ClassRemap,
) -> Result<RemapStats> {
    let dirs = SplitDirs {
        images_dir: ensure_output_directory(&out_root.join("images").join(split_name))?,
        labels_dir: ensure_output_directory(&out_root.join("labels").join(split_name))?,
    };

    let images = list_images(image_dir);
    info!("[{}] imgs={} img_dir={}", split_name, images.len(), image_dir.display());

    let prepared: Vec<Option<PreparedCopy<'_>>> = images
        .par_iter()
        .map(|image_path| prepare_copy(image_path, label_dir, args, remap))
        .collect();

    let owners: DashMap<String, usize> = DashMap::new();
    prepared.par_iter().enumerate().for_each(|(index, copy)| {
        if let Some(copy) = copy {
            owners
                .entry(copy.new_stem.clone())
                .and_modify(|owner| *owner = (*owner).max(index))
                .or_insert(index);
        }
    });

    let pb = create_progress_bar(prepared.len() as u64, split_name);
    let stats = prepared
        .into_par_iter()
        .enumerate()
        .map(|(index, copy)| {
            let stats = copy_prepared(index, copy, &dirs, &owners);
            pb.inc(1);
            stats
        })
        .reduce(RemapStats::default, RemapStats::merge);

    pb.finish_with_message(format!("{} complete", split_name));
    Ok(stats)
}

// Returns None when the image is dropped
fn prepare_copy<'a>(
    image_path: &'a Path,
    label_dir: &Path,
    args: &RemapArgs,
    remap: &ClassRemap,
) -> Option<PreparedCopy<'a>> {
    let stem = image_path.file_stem()?.to_string_lossy().into_owned();
    let label_path = label_dir.join(format!("{}.txt", stem));

    let lines = match filter_and_remap_label(&label_path, remap) {
        Ok(lines) => lines?,
        Err(e) => {
            warn!("{}", e);
            return None;
        }
    };
    if args.drop_empty && lines.is_empty() {
        return None;
    }

    Some(PreparedCopy {
        image_path,
        new_stem: sanitize_filename::sanitize(format!("{}__{}", args.tag, stem)),
        lines,
    })
}

fn copy_prepared(
    index: usize,
    copy: Option<PreparedCopy<'_>>,
    dirs: &SplitDirs,
    owners: &DashMap<String, usize>,
) -> RemapStats {
    let mut stats = RemapStats {
        scanned: 1,
        ..RemapStats::default()
    };
    let Some(copy) = copy else {
        stats.dropped = 1;
        return stats;
    };

    if owners.get(&copy.new_stem).map(|owner| *owner) != Some(index) {
        warn!(
            "{} collides with a later image named {}, skipping it",
            copy.image_path.display(),
            copy.new_stem
        );
        stats.superseded = 1;
        return stats;
    }

    match copy_pair(copy.image_path, dirs, &copy.new_stem, &copy.lines) {
        Ok(()) => stats.kept = 1,
        Err(e) => {
            warn!("Failed to copy {}: {}", copy.image_path.display(), e);
            stats.dropped = 1;
        }
    }
    stats
}

/// Remap an external YOLO dataset into `out_root` and write its data.yaml
pub fn process_external_dataset(args: &RemapArgs) -> Result<RemapStats> {
    let external_root = PathBuf::from(&args.external_root);
    let out_root = PathBuf::from(&args.out_root);
    let yaml_path = external_root.join("data.yaml");

    let external_yaml = read_external_data_yaml(&yaml_path)?;
    let source_names = external_yaml.names.into_names();
    let remap =
        resolve_class_remap(&source_names, &args.target_names, &args.mappings, &yaml_path)?;

    let mut mapping: Vec<_> = remap.iter().map(|(&src, &tgt)| (src, tgt)).collect();
    mapping.sort_unstable();
    info!("Mapping external -> final: {:?}", mapping);

    let splits = [
        (SPLITS[0], external_yaml.train.as_deref()),
        (SPLITS[1], external_yaml.val.as_deref()),
        (SPLITS[2], external_yaml.test.as_deref()),
    ];

    let mut stats = RemapStats::default();
    for (split_name, rel_images) in splits {
        let Some(rel_images) = rel_images.filter(|rel| !rel.is_empty()) else {
            continue;
        };

        let Ok(image_dir) = external_root.join(rel_images).canonicalize() else {
            warn!(
                "Split {} does not exist: {}",
                split_name,
                external_root.join(rel_images).display()
            );
            continue;
        };
        let label_dir = image_dir
            .parent()
            .map(|parent| parent.join("labels"))
            .unwrap_or_else(|| PathBuf::from("labels"));
        if !label_dir.is_dir() {
            warn!(
                "No labels for split {}: {} (skipping the split)",
                split_name,
                label_dir.display()
            );
            continue;
        }

        let split_stats =
            process_split(split_name, &image_dir, &label_dir, &out_root, args, &remap)?;
        stats = stats.merge(split_stats);
    }

    let final_yaml = DatasetYaml {
        path: Some(to_forward_slashes(&out_root.to_string_lossy())),
        train: "images/train".to_string(),
        val: "images/val".to_string(),
        test: None,
        names: ClassCatalog::new(args.target_names.clone()).to_index_map(),
    };
    let final_yaml_path = out_root.join("data.yaml");
    write_dataset_yaml(&final_yaml_path, &final_yaml)?;

    stats.print_summary();
    info!("Final dataset: {}", out_root.display());
    info!("Final YAML:    {}", final_yaml_path.display());
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_class_id() {
        assert_eq!(parse_class_id("3"), Some(3));
        assert_eq!(parse_class_id("1.0"), Some(1));
        assert_eq!(parse_class_id("2.9"), Some(2));
        assert_eq!(parse_class_id("-0.5"), Some(0));
        assert_eq!(parse_class_id("-1"), None);
        assert_eq!(parse_class_id("-1.5"), None);
        assert_eq!(parse_class_id("apple"), None);
        assert_eq!(parse_class_id("NaN"), None);
    }

    #[test]
    fn test_remap_label_lines() {
        let remap: ClassRemap = [(2, 0), (5, 1)].into_iter().collect();
        let content = "2 0.1 0.2 0.3 0.4\n\n0 0.5 0.5 0.1 0.1\n5.0 0.9   0.8 0.7\nbad 1 2\n";
        assert_eq!(
            remap_label_lines(content, &remap),
            vec!["0 0.1 0.2 0.3 0.4".to_string(), "1 0.9 0.8 0.7".to_string()]
        );
    }

    #[test]
    fn test_copy_pair_removes_image_when_label_write_fails() {
        let temp_dir = tempfile::tempdir().unwrap();
        let image_path = temp_dir.path().join("a.BMP");
        fs::write(&image_path, b"BM").unwrap();

        let dirs = SplitDirs {
            images_dir: temp_dir.path().join("images"),
            labels_dir: temp_dir.path().join("labels"),
        };
        fs::create_dir_all(&dirs.images_dir).unwrap();
        // A directory in place of the label file makes the write fail
        fs::create_dir_all(dirs.labels_dir.join("ext__a.txt")).unwrap();

        let lines = vec!["0 0.1 0.1 0.2 0.2".to_string()];
        assert!(copy_pair(&image_path, &dirs, "ext__a", &lines).is_err());
        assert!(!dirs.images_dir.join("ext__a.bmp").exists());
    }

    #[test]
    fn test_colliding_stems_keep_last_image() {
        let temp_dir = tempfile::tempdir().unwrap();
        let image_dir = temp_dir.path().join("ext/train/images");
        let label_dir = temp_dir.path().join("ext/train/labels");
        fs::create_dir_all(&image_dir).unwrap();
        fs::create_dir_all(&label_dir).unwrap();
        fs::write(image_dir.join("one.bmp"), b"bmp").unwrap();
        fs::write(image_dir.join("one.png"), b"png").unwrap();
        fs::write(label_dir.join("one.txt"), "3 0.5 0.5 0.1 0.1\n").unwrap();

        let out_root = temp_dir.path().join("out");
        let args = RemapArgs {
            external_root: temp_dir.path().join("ext").to_string_lossy().into_owned(),
            out_root: out_root.to_string_lossy().into_owned(),
            tag: "ext".to_string(),
            drop_empty: false,
            target_names: vec!["apple".to_string()],
            mappings: Vec::new(),
        };
        let remap: ClassRemap = [(3, 0)].into_iter().collect();

        let stats =
            process_split("train", &image_dir, &label_dir, &out_root, &args, &remap).unwrap();
        assert_eq!(stats.scanned, 2);
        assert_eq!(stats.kept, 1);
        assert_eq!(stats.superseded, 1);
        assert!(out_root.join("images/train/ext__one.png").is_file());
        assert!(!out_root.join("images/train/ext__one.bmp").exists());
        assert_eq!(
            fs::read_to_string(out_root.join("labels/train/ext__one.txt")).unwrap(),
            "0 0.5 0.5 0.1 0.1\n"
        );
    }
}
