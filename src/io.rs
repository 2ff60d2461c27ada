use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::types::{DatasetYaml, ExternalDataYaml, GroundTruth, GroundTruthFile};
use crate::utils::image_stem;

/// Read and validate a ground-truth table.
///
/// The JSON is parsed straight from a buffered file stream. Cells may nest to
/// any depth: the recursion limit is lifted and the stack grows on demand.
pub fn load_ground_truth(path: &Path) -> Result<GroundTruth> {
    let file = File::open(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let json_error = |source| Error::Json {
        path: path.to_path_buf(),
        source,
    };

    let mut deserializer = serde_json::Deserializer::from_reader(BufReader::new(file));
    deserializer.disable_recursion_limit();
    let parsed = GroundTruthFile::deserialize(serde_stacker::Deserializer::new(&mut deserializer))
        .map_err(json_error)?;
    deserializer.end().map_err(json_error)?;

    GroundTruth::from_file(parsed)
}

/// Write a ground-truth table in the same layout it is read from.
pub fn save_ground_truth(path: &Path, ground_truth: &GroundTruth) -> Result<()> {
    ensure_parent(path)?;
    let file = File::create(path).map_err(|source| Error::Write {
        path: path.to_path_buf(),
        source,
    })?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, &ground_truth.to_file()).map_err(|source| Error::Json {
        path: path.to_path_buf(),
        source,
    })?;
    writer.flush().map_err(|source| Error::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Width and height of an image, read from its header only.
pub fn read_image_dimensions(path: &Path) -> Result<(u32, u32)> {
    let size = imagesize::size(path).map_err(|source| Error::ImageDimensionRead {
        path: path.to_path_buf(),
        source,
    })?;
    dimensions_to_u32(path, size.width, size.height)
}

fn dimensions_to_u32(path: &Path, width: usize, height: usize) -> Result<(u32, u32)> {
    match (u32::try_from(width), u32::try_from(height)) {
        (Ok(width), Ok(height)) => Ok((width, height)),
        _ => Err(Error::ImageTooLarge {
            path: path.to_path_buf(),
            width,
            height,
        }),
    }
}

/// Sanitized label file name (`<stem>.txt`) for an image identifier.
pub fn label_file_name(image_file: &str) -> Option<String> {
    let stem = image_stem(image_file)?;
    Some(format!("{}.txt", sanitize_filename::sanitize(stem)))
}

/// Write label lines, one per polygon, to `labels_dir/file_name`.
///
/// A failed write removes the partial file.
pub fn write_label_file(labels_dir: &Path, file_name: &str, lines: &[String]) -> Result<PathBuf> {
    let output_path = labels_dir.join(file_name);

    let mut content = String::with_capacity(lines.iter().map(|line| line.len() + 1).sum());
    for line in lines {
        content.push_str(line);
        content.push('\n');
    }

    if let Err(source) = fs::write(&output_path, content.as_bytes()) {
        let _ = fs::remove_file(&output_path);
        return Err(Error::Write {
            path: output_path,
            source,
        });
    }
    Ok(output_path)
}

/// Create the data.yaml file for YOLO training
pub fn write_dataset_yaml(path: &Path, dataset_yaml: &DatasetYaml) -> Result<()> {
    ensure_parent(path)?;
    let yaml_content = serde_yaml::to_string(dataset_yaml).map_err(|source| Error::Yaml {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, yaml_content).map_err(|source| Error::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Read the data.yaml of a third-party YOLO dataset.
pub fn read_external_data_yaml(path: &Path) -> Result<ExternalDataYaml> {
    let data = fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_yaml::from_str(&data).map_err(|source| Error::Yaml {
        path: path.to_path_buf(),
        source,
    })
}

fn ensure_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|source| Error::Write {
                path: parent.to_path_buf(),
                source,
            })
        }
        _ => Ok(()),
    }
}
