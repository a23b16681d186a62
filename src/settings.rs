//! ## Model and Application Settings
//!
//! Static configuration for the bike rental model: file locations, the feature list, the ordinal
//! mapping tables consumed by [`crate::transformers::categorical_encoding::Mapper`], and the
//! hyper-parameters of the outlier handler and the random forest.
//!
//! [`Config::default`] returns the built-in values. [`Config::from_env`] starts from the defaults
//! and lets two environment variables override file locations:
//!
//! - `BIKERENTAL_TRAINING_DATA`: path of the training dataset (CSV or Parquet).
//! - `BIKERENTAL_MODEL_DIR`: directory that holds saved pipeline artifacts.

use crate::model::ForestConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

pub const YEAR_MAPPING: &[(&str, i64)] = &[("2011", 0), ("2012", 1)];

pub const MONTH_MAPPINGS: &[(&str, i64)] = &[
    ("January", 0),
    ("February", 1),
    ("December", 2),
    ("March", 3),
    ("November", 4),
    ("April", 5),
    ("October", 6),
    ("May", 7),
    ("September", 8),
    ("June", 9),
    ("July", 10),
    ("August", 11),
];

pub const SEASON_MAPPINGS: &[(&str, i64)] =
    &[("spring", 0), ("winter", 1), ("summer", 2), ("fall", 3)];

pub const WEATHER_MAPPINGS: &[(&str, i64)] = &[
    ("Heavy Rain", 0),
    ("Light Rain", 1),
    ("Mist", 2),
    ("Clear", 3),
];

pub const HOLIDAY_MAPPING: &[(&str, i64)] = &[("Yes", 0), ("No", 1)];

pub const WORKINGDAY_MAPPING: &[(&str, i64)] = &[("No", 0), ("Yes", 1)];

// Ordered by average demand, quietest hour first.
pub const HOUR_MAPPING: &[(&str, i64)] = &[
    ("4am", 0),
    ("3am", 1),
    ("5am", 2),
    ("2am", 3),
    ("1am", 4),
    ("12am", 5),
    ("6am", 6),
    ("11pm", 7),
    ("10pm", 8),
    ("10am", 9),
    ("9pm", 10),
    ("11am", 11),
    ("7am", 12),
    ("9am", 13),
    ("8pm", 14),
    ("2pm", 15),
    ("1pm", 16),
    ("12pm", 17),
    ("3pm", 18),
    ("4pm", 19),
    ("7pm", 20),
    ("8am", 21),
    ("6pm", 22),
    ("5pm", 23),
];

/// Three-letter weekday abbreviations accepted in the `weekday` column.
pub const WEEKDAYS: &[&str] = &["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

/// Converts one of the static tables above into an owned mapping.
pub fn mapping_from(table: &[(&str, i64)]) -> HashMap<String, i64> {
    table.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

/// File locations and naming.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub package_name: String,
    pub training_data_file: PathBuf,
    /// Prefix of saved pipeline artifacts; the crate version and `.json` are appended.
    pub pipeline_save_file: String,
    pub trained_model_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            package_name: "bikerental_model".to_string(),
            training_data_file: PathBuf::from("datasets/bike-rental-dataset.csv"),
            pipeline_save_file: "bikerental_model_output_v".to_string(),
            trained_model_dir: PathBuf::from("trained_models"),
        }
    }
}

/// Everything the pipeline needs to be built and trained.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub target: String,
    pub features: Vec<String>,
    pub unused_fields: Vec<String>,

    pub date_var: String,
    pub weekday_var: String,
    pub weathersit_var: String,
    pub weathersit_default: String,

    pub year_var: String,
    pub year_mapping: HashMap<String, i64>,
    pub month_var: String,
    pub month_mappings: HashMap<String, i64>,
    pub season_var: String,
    pub season_mappings: HashMap<String, i64>,
    pub weather_mappings: HashMap<String, i64>,
    pub holiday_var: String,
    pub holiday_mapping: HashMap<String, i64>,
    pub workingday_var: String,
    pub workingday_mapping: HashMap<String, i64>,
    pub hour_var: String,
    pub hour_mapping: HashMap<String, i64>,

    pub numerical_features: Vec<String>,
    pub outlier_method: String,
    pub outlier_factor: f64,
    pub weekday_drop_first: bool,

    pub test_size: f64,
    pub random_state: u64,
    pub forest: ForestConfig,
}

impl Default for ModelConfig {
    fn default() -> Self {
        let names = |cols: &[&str]| cols.iter().map(|c| c.to_string()).collect::<Vec<_>>();
        Self {
            target: "cnt".to_string(),
            features: names(&[
                "dteday",
                "season",
                "hr",
                "holiday",
                "weekday",
                "workingday",
                "weathersit",
                "temp",
                "atemp",
                "hum",
                "windspeed",
                "yr",
                "mnth",
            ]),
            unused_fields: names(&["casual", "registered"]),
            date_var: "dteday".to_string(),
            weekday_var: "weekday".to_string(),
            weathersit_var: "weathersit".to_string(),
            weathersit_default: "Mist".to_string(),
            year_var: "yr".to_string(),
            year_mapping: mapping_from(YEAR_MAPPING),
            month_var: "mnth".to_string(),
            month_mappings: mapping_from(MONTH_MAPPINGS),
            season_var: "season".to_string(),
            season_mappings: mapping_from(SEASON_MAPPINGS),
            weather_mappings: mapping_from(WEATHER_MAPPINGS),
            holiday_var: "holiday".to_string(),
            holiday_mapping: mapping_from(HOLIDAY_MAPPING),
            workingday_var: "workingday".to_string(),
            workingday_mapping: mapping_from(WORKINGDAY_MAPPING),
            hour_var: "hr".to_string(),
            hour_mapping: mapping_from(HOUR_MAPPING),
            numerical_features: names(&["temp", "atemp", "hum", "windspeed"]),
            outlier_method: "iqr".to_string(),
            outlier_factor: 1.5,
            weekday_drop_first: false,
            test_size: 0.2,
            random_state: 42,
            forest: ForestConfig::default(),
        }
    }
}

/// The complete configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub model: ModelConfig,
}

impl Config {
    /// Defaults, with file locations overridden from the environment when set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(path) = non_empty_var("BIKERENTAL_TRAINING_DATA") {
            config.app.training_data_file = PathBuf::from(path);
        }
        if let Some(dir) = non_empty_var("BIKERENTAL_MODEL_DIR") {
            config.app.trained_model_dir = PathBuf::from(dir);
        }
        config
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mapping_tables_are_dense() {
        for table in [
            YEAR_MAPPING,
            MONTH_MAPPINGS,
            SEASON_MAPPINGS,
            WEATHER_MAPPINGS,
            HOLIDAY_MAPPING,
            WORKINGDAY_MAPPING,
            HOUR_MAPPING,
        ] {
            let mut codes: Vec<i64> = table.iter().map(|(_, v)| *v).collect();
            codes.sort_unstable();
            let expected: Vec<i64> = (0..table.len() as i64).collect();
            assert_eq!(codes, expected);
        }
    }

    #[test]
    fn test_default_model_config() {
        let config = ModelConfig::default();
        assert_eq!(config.season_mappings.get("winter"), Some(&1));
        assert_eq!(config.hour_mapping.len(), 24);
        assert_eq!(config.forest.n_trees, 150);
        assert_eq!(config.forest.max_depth, 5);
        assert_eq!(config.forest.seed, 42);
        assert!(!config.features.contains(&config.target));
    }
}
