//! ## Input Validation
//!
//! Checks raw JSON records against the input schema before they reach the pipeline.
//!
//! Validation is advisory: a malformed record is dropped from the batch and reported in
//! [`ValidationErrors`], while the well-formed records go on to be scored. Nothing here returns
//! a [`crate::exceptions::BikeRentalError`].

use crate::settings::{ModelConfig, WEEKDAYS};
use crate::transformers::datetime_features::parse_date;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use tracing::warn;

/// One input record. Every field is optional on the wire; the rules in [`validate_inputs`]
/// decide which ones must be present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataInput {
    pub dteday: Option<String>,
    pub season: Option<String>,
    pub hr: Option<String>,
    pub holiday: Option<String>,
    pub weekday: Option<String>,
    pub workingday: Option<String>,
    pub weathersit: Option<String>,
    pub temp: Option<f64>,
    pub atemp: Option<f64>,
    pub hum: Option<f64>,
    pub windspeed: Option<f64>,
    pub yr: Option<String>,
    pub mnth: Option<String>,
}

/// A problem with one field of one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordError {
    /// Position of the record in the submitted batch.
    pub index: usize,
    pub field: String,
    pub message: String,
}

/// Every problem found in a batch, in record order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrors {
    pub errors: Vec<RecordError>,
}

impl ValidationErrors {
    /// Indices of the rejected records, ascending and without repeats.
    pub fn rejected_indices(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = self.errors.iter().map(|e| e.index).collect();
        indices.dedup();
        indices
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, e) in self.errors.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "record {}: {}: {}", e.index, e.field, e.message)?;
        }
        Ok(())
    }
}

struct RecordChecker<'a> {
    index: usize,
    errors: Vec<RecordError>,
    config: &'a ModelConfig,
}

impl RecordChecker<'_> {
    fn push(&mut self, field: &str, message: impl Into<String>) {
        self.errors.push(RecordError {
            index: self.index,
            field: field.to_string(),
            message: message.into(),
        });
    }

    fn number(&mut self, field: &str, value: Option<f64>) {
        match value {
            None => self.push(field, "field required"),
            Some(v) if !v.is_finite() => self.push(field, "value is not a finite number"),
            Some(_) => {}
        }
    }

    fn category(
        &mut self,
        field: &str,
        value: Option<&str>,
        table: &HashMap<String, i64>,
        required: bool,
    ) {
        match value {
            None if required => self.push(field, "field required"),
            None => {}
            Some(v) if table.contains_key(v) => {}
            Some(v) => self.push(field, format!("unknown category '{}'", v)),
        }
    }

    fn check(&mut self, input: &DataInput) {
        let config = self.config;
        for (field, value) in [
            ("temp", input.temp),
            ("atemp", input.atemp),
            ("hum", input.hum),
            ("windspeed", input.windspeed),
        ] {
            self.number(field, value);
        }

        self.category("season", input.season.as_deref(), &config.season_mappings, true);
        self.category("hr", input.hr.as_deref(), &config.hour_mapping, true);
        self.category("holiday", input.holiday.as_deref(), &config.holiday_mapping, true);
        self.category(
            "workingday",
            input.workingday.as_deref(),
            &config.workingday_mapping,
            true,
        );
        self.category(
            "weathersit",
            input.weathersit.as_deref(),
            &config.weather_mappings,
            false,
        );

        if let Some(day) = input.weekday.as_deref() {
            if !WEEKDAYS.contains(&day) {
                self.push("weekday", format!("'{}' is not a three-letter day abbreviation", day));
            }
        }

        if let Some(d) = input.dteday.as_deref() {
            if parse_date(d).is_none() {
                self.push("dteday", format!("'{}' is not a valid date (YYYY-MM-DD)", d));
            }
        }
        for (field, value, table) in [
            ("yr", input.yr.as_deref(), &config.year_mapping),
            ("mnth", input.mnth.as_deref(), &config.month_mappings),
        ] {
            if value.is_none() && input.dteday.is_none() {
                self.push(field, "field required when dteday is missing");
            } else {
                self.category(field, value, table, false);
            }
        }
    }
}

/// Validates a batch of raw records.
///
/// Returns the records that passed, in their original order, and the report of the ones that
/// did not (`None` when every record passed).
pub fn validate_inputs(
    config: &ModelConfig,
    records: &[Value],
) -> (Vec<DataInput>, Option<ValidationErrors>) {
    let mut accepted = Vec::with_capacity(records.len());
    let mut report = ValidationErrors::default();

    for (index, record) in records.iter().enumerate() {
        let mut checker = RecordChecker {
            index,
            errors: Vec::new(),
            config,
        };
        match DataInput::deserialize(record) {
            Ok(input) => {
                checker.check(&input);
                if checker.errors.is_empty() {
                    accepted.push(input);
                }
            }
            Err(e) => checker.push("record", e.to_string()),
        }
        if !checker.errors.is_empty() {
            warn!(
                "Rejected record {} with {} validation error(s)",
                index,
                checker.errors.len()
            );
            report.errors.extend(checker.errors);
        }
    }

    let errors = if report.errors.is_empty() {
        None
    } else {
        Some(report)
    };
    (accepted, errors)
}
