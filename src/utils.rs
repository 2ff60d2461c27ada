use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::{Path, PathBuf};

/// Create a progress bar with the given length and label
pub fn create_progress_bar(len: u64, label: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} [{}] [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} ({{eta}})",
                label
            ))
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb
}

/// Create an output directory if needed and return its path.
///
/// Existing contents are kept.
pub fn ensure_output_directory(path: &Path) -> std::io::Result<PathBuf> {
    if path.exists() {
        log::debug!("Directory {:?} already exists, reusing it.", path);
    } else {
        fs::create_dir_all(path)?;
    }
    Ok(path.to_path_buf())
}

/// File stem of an image identifier.
///
/// Identifiers exported on Windows use backslashes, so both separators are
/// accepted regardless of the host platform.
pub fn image_stem(image_file: &str) -> Option<String> {
    let file_name = image_file.rsplit(['/', '\\']).next()?;
    Path::new(file_name)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .map(str::to_string)
}

/// Render a path with forward slashes, as YOLO tooling expects in data.yaml.
pub fn to_forward_slashes(path: &str) -> String {
    path.replace('\\', "/")
}

/// True if the path has one of the supported image extensions.
pub fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| crate::types::get_image_extensions_set().contains(&ext.to_lowercase()))
}
