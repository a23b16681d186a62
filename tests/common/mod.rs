#![allow(dead_code)]

use arrow::array::{ArrayRef, Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use bikerental_model::frame::session_context;
use bikerental_model::settings::HOUR_MAPPING;
use chrono::{Duration, NaiveDate};
use datafusion::datasource::MemTable;
use datafusion::prelude::DataFrame;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;

const SEASONS: [&str; 4] = ["winter", "spring", "summer", "fall"];
const WEATHER: [&str; 4] = ["Clear", "Mist", "Light Rain", "Clear"];

/// One synthetic rental row, as it would appear in the training dataset.
pub struct Row {
    pub dteday: String,
    pub season: String,
    pub hr: String,
    pub holiday: String,
    pub weekday: Option<String>,
    pub workingday: String,
    pub weathersit: Option<String>,
    pub temp: f64,
    pub atemp: f64,
    pub hum: f64,
    pub windspeed: f64,
    pub casual: f64,
    pub registered: f64,
    pub cnt: f64,
}

/// Deterministic rows covering every hour label, a mix of weather situations and a few
/// missing weekdays and weather situations. Demand depends mostly on the hour and the
/// temperature.
pub fn rows(n: usize) -> Vec<Row> {
    let start = NaiveDate::from_ymd_opt(2011, 1, 1).unwrap();
    (0..n)
        .map(|i| {
            let date = start + Duration::days((i / 24 * 5) as i64);
            let (hour_label, hour_rank) = HOUR_MAPPING[i % 24];
            let temp = 2.0 + ((i * 7) % 30) as f64;
            let windspeed = if i % 50 == 0 { 95.0 } else { ((i * 3) % 40) as f64 };
            let cnt = 20.0 + 15.0 * hour_rank as f64 + 4.0 * temp;
            Row {
                dteday: date.format("%Y-%m-%d").to_string(),
                season: SEASONS[(i / 24) % 4].to_string(),
                hr: hour_label.to_string(),
                holiday: if i % 37 == 0 { "Yes" } else { "No" }.to_string(),
                weekday: if i % 11 == 0 {
                    None
                } else {
                    Some(date.format("%a").to_string())
                },
                workingday: if i % 7 < 5 { "Yes" } else { "No" }.to_string(),
                weathersit: if i % 13 == 0 {
                    None
                } else {
                    Some(WEATHER[i % 4].to_string())
                },
                temp,
                atemp: temp - 1.5,
                hum: 30.0 + ((i * 11) % 60) as f64,
                windspeed,
                casual: (cnt * 0.2).round(),
                registered: (cnt * 0.8).round(),
                cnt,
            }
        })
        .collect()
}

pub fn rows_to_batch(rows: &[Row]) -> RecordBatch {
    let text = |f: fn(&Row) -> Option<String>| -> ArrayRef {
        Arc::new(StringArray::from(rows.iter().map(f).collect::<Vec<_>>()))
    };
    let number = |f: fn(&Row) -> f64| -> ArrayRef {
        Arc::new(Float64Array::from(rows.iter().map(f).collect::<Vec<_>>()))
    };
    let columns: Vec<(&str, ArrayRef)> = vec![
        ("dteday", text(|r| Some(r.dteday.clone()))),
        ("season", text(|r| Some(r.season.clone()))),
        ("hr", text(|r| Some(r.hr.clone()))),
        ("holiday", text(|r| Some(r.holiday.clone()))),
        ("weekday", text(|r| r.weekday.clone())),
        ("workingday", text(|r| Some(r.workingday.clone()))),
        ("weathersit", text(|r| r.weathersit.clone())),
        ("temp", number(|r| r.temp)),
        ("atemp", number(|r| r.atemp)),
        ("hum", number(|r| r.hum)),
        ("windspeed", number(|r| r.windspeed)),
        ("casual", number(|r| r.casual)),
        ("registered", number(|r| r.registered)),
        ("cnt", number(|r| r.cnt)),
    ];
    let schema = Arc::new(Schema::new(
        columns
            .iter()
            .map(|(name, array)| Field::new(*name, array.data_type().clone(), true))
            .collect::<Vec<_>>(),
    ));
    RecordBatch::try_new(schema, columns.into_iter().map(|(_, a)| a).collect()).unwrap()
}

/// Raw training frame (before pre-pipeline preparation).
pub async fn training_frame(n: usize) -> DataFrame {
    let batch = rows_to_batch(&rows(n));
    frame_from_batch(batch).await
}

/// Registers a single batch as a table in a fresh session and returns it as a DataFrame.
pub async fn frame_from_batch(batch: RecordBatch) -> DataFrame {
    let schema = batch.schema();
    let mem_table = MemTable::try_new(schema, vec![vec![batch]]).unwrap();
    let ctx = session_context();
    ctx.register_table("t", Arc::new(mem_table)).unwrap();
    ctx.table("t").await.unwrap()
}

/// Writes the synthetic rows as a CSV file with a header, leaving missing values empty.
pub fn write_csv(path: &Path, n: usize) {
    let mut out = String::from(
        "dteday,season,hr,holiday,weekday,workingday,weathersit,temp,atemp,hum,windspeed,casual,registered,cnt\n",
    );
    for r in rows(n) {
        out.push_str(&format!(
            "{},{},{},{},{},{},{},{},{},{},{},{},{},{}\n",
            r.dteday,
            r.season,
            r.hr,
            r.holiday,
            r.weekday.unwrap_or_default(),
            r.workingday,
            r.weathersit.unwrap_or_default(),
            r.temp,
            r.atemp,
            r.hum,
            r.windspeed,
            r.casual,
            r.registered,
            r.cnt
        ));
    }
    std::fs::write(path, out).unwrap();
}

/// The reference inference record.
pub fn example_record() -> Value {
    json!({
        "dteday": "2012-11-05",
        "season": "winter",
        "hr": "2am",
        "holiday": "No",
        "weekday": "Mon",
        "workingday": "Yes",
        "weathersit": "Mist",
        "temp": 6.1,
        "atemp": 3.0014,
        "hum": 49,
        "windspeed": 19.0012
    })
}
