use clap::Parser;
use std::str::FromStr;

/// Convert a flat ground-truth table into YOLO segmentation labels and a data.yaml.
#[derive(Parser, Debug, Clone)]
#[command(version, long_about = None)]
pub struct ConvertArgs {
    /// Ground-truth table exported from the labeling tool (JSON)
    #[arg(long = "table", visible_alias = "mat")]
    pub table: String,

    /// Output directory for the label files
    #[arg(long = "labels_out")]
    pub labels_out: String,

    /// Output path of the data.yaml file
    #[arg(long = "yaml_out")]
    pub yaml_out: String,

    /// Dataset root written as 'path:' in data.yaml
    #[arg(long = "dataset_root", default_value = "")]
    pub dataset_root: String,

    /// Training images directory relative to the dataset root
    #[arg(long = "train_rel", default_value = "images/train")]
    pub train_rel: String,

    /// Validation images directory relative to the dataset root
    #[arg(long = "val_rel", default_value = "images/val")]
    pub val_rel: String,

    /// Test images directory relative to the dataset root
    #[arg(long = "test_rel")]
    pub test_rel: Option<String>,

    /// Base directory for relative image paths in the table
    #[arg(long = "image_root")]
    pub image_root: Option<String>,

    /// Decimal places for normalized coordinates
    #[arg(long = "precision", default_value_t = 6, value_parser = validate_precision)]
    pub precision: usize,

    /// Skip images whose row holds no valid polygon instead of writing an empty label
    #[arg(long = "drop_empty")]
    pub drop_empty: bool,
}

/// Drop images that carry no valid polygon from a ground-truth table.
#[derive(Parser, Debug, Clone)]
#[command(version, long_about = None)]
pub struct FilterArgs {
    /// Input ground-truth table (JSON)
    #[arg(long = "in_table", visible_alias = "in_mat")]
    pub in_table: String,

    /// Output path for the filtered table
    #[arg(long = "out_table", visible_alias = "out_mat")]
    pub out_table: String,
}

/// Merge a third-party YOLO dataset into the unified dataset, remapping its classes.
#[derive(Parser, Debug, Clone)]
#[command(version, long_about = None)]
pub struct RemapArgs {
    /// Root of the external dataset (the directory holding data.yaml)
    #[arg(long = "external_root")]
    pub external_root: String,

    /// Root of the unified output dataset
    #[arg(long = "out_root")]
    pub out_root: String,

    /// Prefix added to copied file names to avoid collisions
    #[arg(long = "tag", default_value = "external")]
    pub tag: String,

    /// Drop images left without instances after remapping
    #[arg(long = "drop_empty")]
    pub drop_empty: bool,

    /// Ordered class names of the unified dataset
    #[arg(
        long = "target_names",
        value_delimiter = ',',
        default_values = ["apple_green", "apple_red"]
    )]
    pub target_names: Vec<String>,

    /// Class mapping from the external dataset, as SOURCE=TARGET
    #[arg(
        long = "map",
        value_parser = parse_class_mapping,
        default_values = ["green_apple=apple_green", "red_apple=apple_red"]
    )]
    pub mappings: Vec<ClassMapping>,
}

/// One `SOURCE=TARGET` class rename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassMapping {
    pub source: String,
    pub target: String,
}

impl FromStr for ClassMapping {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('=') {
            Some((source, target)) if !source.trim().is_empty() && !target.trim().is_empty() => {
                Ok(ClassMapping {
                    source: source.trim().to_string(),
                    target: target.trim().to_string(),
                })
            }
            _ => Err(format!("expected SOURCE=TARGET, got '{}'", s)),
        }
    }
}

pub fn parse_class_mapping(s: &str) -> Result<ClassMapping, String> {
    s.parse()
}

// Validate that the precision is a usable number of decimal places
pub fn validate_precision(s: &str) -> Result<usize, String> {
    match usize::from_str(s) {
        Ok(val) if (1..=12).contains(&val) => Ok(val),
        _ => Err("PRECISION must be between 1 and 12".to_string()),
    }
}
