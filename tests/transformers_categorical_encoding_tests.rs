use arrow::array::{Array, ArrayRef, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use bikerental_model::exceptions::{BikeRentalError, BikeRentalResult};
use bikerental_model::frame::session_context;
use bikerental_model::settings::{mapping_from, HOUR_MAPPING, SEASON_MAPPINGS};
use bikerental_model::transformers::categorical_encoding::{Mapper, WeekdayOneHotEncoder};
use datafusion::datasource::MemTable;
use datafusion::prelude::*;
use std::sync::Arc;

/// Helper function to create a DataFrame with one Utf8 column and one Float64 column.
async fn create_df(col_name: &str, values: Vec<Option<&str>>) -> DataFrame {
    let n = values.len();
    let schema = Arc::new(Schema::new(vec![
        Field::new(col_name, DataType::Utf8, true),
        Field::new("temp", DataType::Float64, true),
    ]));
    let text: ArrayRef = Arc::new(StringArray::from(values));
    let temp: ArrayRef = Arc::new(arrow::array::Float64Array::from(
        (0..n).map(|i| i as f64).collect::<Vec<_>>(),
    ));
    let batch = RecordBatch::try_new(schema.clone(), vec![text, temp]).unwrap();
    let mem_table = MemTable::try_new(schema, vec![vec![batch]]).unwrap();
    let ctx = session_context();
    ctx.register_table("t", Arc::new(mem_table)).unwrap();
    ctx.table("t").await.unwrap()
}

async fn int_column(df: DataFrame, name: &str) -> BikeRentalResult<Vec<Option<i64>>> {
    let batches = df.collect().await?;
    let mut values = Vec::new();
    for batch in &batches {
        let array = batch
            .column(batch.schema().index_of(name)?)
            .as_any()
            .downcast_ref::<Int64Array>()
            .expect("Expected Int64Array");
        values.extend(array.iter());
    }
    Ok(values)
}

#[tokio::test]
async fn test_mapper_maps_season() -> BikeRentalResult<()> {
    let df = create_df("season", vec![Some("winter"), Some("fall"), Some("spring")]).await;
    let mut mapper = Mapper::new("season", mapping_from(SEASON_MAPPINGS));
    mapper.fit(&df).await?;
    let transformed = mapper.transform(df).await?;

    let schema = transformed.schema().clone();
    assert_eq!(
        schema.field_with_unqualified_name("season")?.data_type(),
        &DataType::Int64
    );
    // Other columns and the column order are untouched.
    assert_eq!(schema.field(1).name(), "temp");
    assert_eq!(
        int_column(transformed, "season").await?,
        vec![Some(1), Some(3), Some(0)]
    );
    Ok(())
}

#[tokio::test]
async fn test_mapper_maps_every_hour_label() -> BikeRentalResult<()> {
    let labels: Vec<Option<&str>> = HOUR_MAPPING.iter().map(|(k, _)| Some(*k)).collect();
    let df = create_df("hr", labels).await;
    let mapper = Mapper::new("hr", mapping_from(HOUR_MAPPING));
    let transformed = mapper.transform(df).await?;
    let expected: Vec<Option<i64>> = HOUR_MAPPING.iter().map(|(_, v)| Some(*v)).collect();
    assert_eq!(int_column(transformed, "hr").await?, expected);
    Ok(())
}

#[tokio::test]
async fn test_mapper_rejects_unmapped_category() -> BikeRentalResult<()> {
    let df = create_df("season", vec![Some("winter"), Some("monsoon")]).await;
    let mapper = Mapper::new("season", mapping_from(SEASON_MAPPINGS));
    match mapper.transform(df).await {
        Err(BikeRentalError::UnmappedCategory { column, value }) => {
            assert_eq!(column, "season");
            assert_eq!(value, "monsoon");
        }
        other => panic!("expected UnmappedCategory, got {:?}", other.map(|_| ())),
    }
    Ok(())
}

#[tokio::test]
async fn test_mapper_rejects_missing_value() -> BikeRentalResult<()> {
    let df = create_df("season", vec![Some("winter"), None]).await;
    let mapper = Mapper::new("season", mapping_from(SEASON_MAPPINGS));
    let err = mapper.transform(df).await.unwrap_err();
    assert!(matches!(err, BikeRentalError::UnmappedCategory { .. }));
    Ok(())
}

#[tokio::test]
async fn test_weekday_one_hot_encoder() -> BikeRentalResult<()> {
    let fit_df = create_df("weekday", vec![Some("Tue"), Some("Mon"), Some("Tue"), None]).await;
    let mut encoder = WeekdayOneHotEncoder::new("weekday", false);
    encoder.fit(&fit_df).await?;
    assert_eq!(
        encoder.output_columns()?,
        vec!["weekday_Mon".to_string(), "weekday_Tue".to_string()]
    );

    // "Sun" was not seen at fit and the missing value has no category: both get zeros.
    let df = create_df("weekday", vec![Some("Mon"), Some("Tue"), Some("Sun"), None]).await;
    let transformed = encoder.transform(df).await?;
    let names: Vec<String> = transformed
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().to_string())
        .collect();
    assert_eq!(names, vec!["temp", "weekday_Mon", "weekday_Tue"]);

    let batches = transformed.collect().await?;
    let batch = &batches[0];
    let mon = batch
        .column(1)
        .as_any()
        .downcast_ref::<Int64Array>()
        .expect("Expected Int64Array");
    let tue = batch
        .column(2)
        .as_any()
        .downcast_ref::<Int64Array>()
        .expect("Expected Int64Array");
    assert_eq!(mon.values().to_vec(), vec![1, 0, 0, 0]);
    assert_eq!(tue.values().to_vec(), vec![0, 1, 0, 0]);
    assert_eq!(mon.null_count() + tue.null_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_weekday_one_hot_encoder_drop_first() -> BikeRentalResult<()> {
    let df = create_df("weekday", vec![Some("Wed"), Some("Mon"), Some("Fri")]).await;
    let mut encoder = WeekdayOneHotEncoder::new("weekday", true);
    encoder.fit(&df).await?;
    assert_eq!(
        encoder.output_columns()?,
        vec!["weekday_Mon".to_string(), "weekday_Wed".to_string()]
    );
    Ok(())
}

#[tokio::test]
async fn test_weekday_one_hot_encoder_transform_before_fit() -> BikeRentalResult<()> {
    let df = create_df("weekday", vec![Some("Mon")]).await;
    let encoder = WeekdayOneHotEncoder::new("weekday", false);
    let err = encoder.transform(df).await.unwrap_err();
    assert!(matches!(err, BikeRentalError::FitNotCalled));
    Ok(())
}
