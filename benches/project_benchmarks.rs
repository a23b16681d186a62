use bikerental_model::bike_pipeline::BikeRentalPipeline;
use bikerental_model::model::{ForestConfig, RandomForest};
use bikerental_model::predict::make_prediction;
use bikerental_model::processing::data_manager::{load_dataset, pre_pipeline_preparation};
use bikerental_model::settings::{ModelConfig, HOUR_MAPPING};
use bikerental_model::train::fit_and_evaluate;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::{json, Value};
use std::path::Path;
use tokio::runtime::Runtime;

const SEASONS: [&str; 4] = ["winter", "spring", "summer", "fall"];
const WEATHER: [&str; 3] = ["Clear", "Mist", "Light Rain"];
const WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

fn bench_config() -> ModelConfig {
    ModelConfig {
        forest: ForestConfig {
            n_trees: 30,
            ..Default::default()
        },
        ..Default::default()
    }
}

fn write_training_csv(path: &Path, n: usize) {
    let mut out = String::from(
        "dteday,season,hr,holiday,weekday,workingday,weathersit,temp,atemp,hum,windspeed,casual,registered,cnt\n",
    );
    for i in 0..n {
        let (hour, rank) = HOUR_MAPPING[i % 24];
        let temp = 2.0 + ((i * 7) % 30) as f64;
        let cnt = 20.0 + 15.0 * rank as f64 + 4.0 * temp;
        out.push_str(&format!(
            "2011-{:02}-{:02},{},{},No,{},Yes,{},{},{},{},{},{},{},{}\n",
            (i / 24) % 12 + 1,
            (i / 288) % 28 + 1,
            SEASONS[(i / 24) % 4],
            hour,
            WEEKDAYS[(i / 24) % 7],
            WEATHER[i % 3],
            temp,
            temp - 1.5,
            30 + (i * 11) % 60,
            (i * 3) % 40,
            (cnt * 0.2).round(),
            (cnt * 0.8).round(),
            cnt
        ));
    }
    std::fs::write(path, out).unwrap();
}

fn records(n: usize) -> Vec<Value> {
    (0..n)
        .map(|i| {
            json!({
                "dteday": "2012-11-05",
                "season": SEASONS[i % 4],
                "hr": HOUR_MAPPING[i % 24].0,
                "holiday": "No",
                "weekday": WEEKDAYS[i % 7],
                "workingday": "Yes",
                "weathersit": WEATHER[i % 3],
                "temp": 6.1 + i as f64 % 20.0,
                "atemp": 3.0014,
                "hum": 49,
                "windspeed": 19.0012
            })
        })
        .collect()
}

fn fitted_pipeline(rt: &Runtime, config: &ModelConfig) -> BikeRentalPipeline {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rentals.csv");
    write_training_csv(&path, 2400);
    rt.block_on(async {
        let raw = load_dataset(&path).await.unwrap();
        let prepared = pre_pipeline_preparation(raw, config).unwrap();
        let (pipeline, _) = fit_and_evaluate(&prepared, config).await.unwrap();
        pipeline
    })
}

fn bench_prediction(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let config = bench_config();
    let pipeline = fitted_pipeline(&rt, &config);

    let mut group = c.benchmark_group("make_prediction");
    for n in [1usize, 100, 1000] {
        let batch = records(n);
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &batch, |b, batch| {
            b.iter(|| {
                rt.block_on(make_prediction(&pipeline, &config, black_box(batch)))
                    .unwrap()
            })
        });
    }
    group.finish();
}

fn bench_forest_fit(c: &mut Criterion) {
    let features: Vec<Vec<f64>> = (0..2000)
        .map(|i| {
            vec![
                (i % 24) as f64,
                ((i * 7) % 30) as f64,
                ((i * 11) % 60) as f64,
                ((i * 3) % 40) as f64,
            ]
        })
        .collect();
    let labels: Vec<f64> = features.iter().map(|row| 15.0 * row[0] + 4.0 * row[1]).collect();
    let names: Vec<String> = ["hr", "temp", "hum", "windspeed"]
        .iter()
        .map(|s| s.to_string())
        .collect();

    c.bench_function("random_forest_fit_2000x4", |b| {
        b.iter(|| {
            let mut forest = RandomForest::new(ForestConfig {
                n_trees: 30,
                ..Default::default()
            });
            forest
                .fit(black_box(&features), black_box(&labels), names.clone())
                .unwrap();
            forest
        })
    });
}

criterion_group!(benches, bench_prediction, bench_forest_fit);
criterion_main!(benches);
