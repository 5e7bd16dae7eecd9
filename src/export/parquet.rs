//! Parquet export of assessments and calibration history

use crate::assessment::Assessment;
use crate::scoring::CalibrationSnapshot;
use arrow::array::{
    Array, ArrayRef, BooleanArray, Date32Array, Float64Array, StringArray, TimestampMicrosecondArray,
    UInt64Array,
};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, NaiveDate, Utc};
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use rust_decimal::Decimal;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default()
}

fn to_date32(date: NaiveDate) -> i32 {
    (date - epoch()).num_days() as i32
}

fn from_date32(days: i32) -> NaiveDate {
    epoch() + chrono::Duration::days(days as i64)
}

fn string_column<T>(rows: &[T], f: impl Fn(&T) -> Option<String>) -> ArrayRef {
    Arc::new(StringArray::from(rows.iter().map(f).collect::<Vec<_>>()))
}

fn float_column<T>(rows: &[T], f: impl Fn(&T) -> Option<f64>) -> ArrayRef {
    Arc::new(Float64Array::from(rows.iter().map(f).collect::<Vec<_>>()))
}

fn timestamp_column<T>(rows: &[T], f: impl Fn(&T) -> DateTime<Utc>) -> ArrayRef {
    Arc::new(
        TimestampMicrosecondArray::from(
            rows.iter().map(|r| f(r).timestamp_micros()).collect::<Vec<_>>(),
        )
        .with_timezone("UTC"),
    )
}

fn utc_timestamp(name: &str) -> Field {
    Field::new(
        name,
        DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into())),
        false,
    )
}

/// Assessment schema fields
pub fn assessment_schema() -> Schema {
    Schema::new(vec![
        Field::new("date", DataType::Date32, false),
        Field::new("deal", DataType::Utf8, false),
        Field::new("strategy", DataType::Utf8, false),
        Field::new("escalated", DataType::Boolean, false),
        Field::new("significance", DataType::Utf8, false),
        Field::new("fingerprint", DataType::Utf8, false),
        Field::new("overall_grade", DataType::Utf8, false),
        Field::new("reasoner_probability", DataType::Float64, true),
        Field::new("analyst_probability", DataType::Float64, true),
        Field::new("market_implied_probability", DataType::Float64, true),
        Field::new("blended_probability", DataType::Float64, true),
        // Decimals as strings to keep precision
        Field::new("deal_price", DataType::Utf8, false),
        Field::new("current_price", DataType::Utf8, false),
        Field::new("spread_bps", DataType::Utf8, true),
        utc_timestamp("created_at"),
    ])
}

/// Calibration history schema fields
pub fn calibration_schema() -> Schema {
    Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("scope", DataType::Utf8, false),
        Field::new("computed_on", DataType::Date32, false),
        Field::new("sample_count", DataType::UInt64, false),
        Field::new("bucket_count", DataType::UInt64, false),
        Field::new("brier_mean", DataType::Float64, true),
        Field::new("log_score_mean", DataType::Float64, true),
        Field::new("ece", DataType::Float64, true),
        Field::new("sharpness", DataType::Float64, true),
        Field::new("resolution_skill", DataType::Float64, true),
        Field::new("base_rate", DataType::Float64, true),
        Field::new("usable", DataType::Boolean, false),
        Field::new("previous_id", DataType::Utf8, true),
        Field::new("brier_delta", DataType::Float64, true),
        utc_timestamp("computed_at"),
    ])
}

/// Flat assessment row
#[derive(Debug, Clone, PartialEq)]
pub struct AssessmentRecord {
    pub date: NaiveDate,
    pub deal: String,
    pub strategy: String,
    pub escalated: bool,
    pub significance: String,
    pub fingerprint: String,
    pub overall_grade: String,
    pub reasoner_probability: Option<f64>,
    pub analyst_probability: Option<f64>,
    pub market_implied_probability: Option<f64>,
    pub blended_probability: Option<f64>,
    pub deal_price: Decimal,
    pub current_price: Decimal,
    pub spread_bps: Option<Decimal>,
    pub created_at: DateTime<Utc>,
}

impl From<&Assessment> for AssessmentRecord {
    fn from(a: &Assessment) -> Self {
        Self {
            date: a.date,
            deal: a.deal.clone(),
            strategy: a.strategy.as_str().to_string(),
            escalated: a.escalated,
            significance: a.significance.as_str().to_string(),
            fingerprint: a.fingerprint.hash.clone(),
            overall_grade: a.judgment.overall_grade.as_str().to_string(),
            reasoner_probability: a.probabilities.reasoner,
            analyst_probability: a.probabilities.analyst,
            market_implied_probability: a.probabilities.market_implied,
            blended_probability: a.probabilities.blended,
            deal_price: a.market.deal_price,
            current_price: a.market.current_price,
            spread_bps: a.market.spread_bps().map(|s| s.round_dp(4)),
            created_at: a.created_at,
        }
    }
}

/// Writes export files under one directory
pub struct ParquetExporter {
    output_dir: PathBuf,
}

impl ParquetExporter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn ensure_dir(&self) -> anyhow::Result<()> {
        fs::create_dir_all(&self.output_dir)?;
        Ok(())
    }

    /// `<dir>/<prefix>_<YYYYMMDD>.parquet`
    pub fn file_path(&self, prefix: &str, date: NaiveDate) -> PathBuf {
        let filename = format!("{}_{}.parquet", prefix, date.format("%Y%m%d"));
        self.output_dir.join(filename)
    }

    fn writer(&self, path: &Path, schema: Arc<Schema>) -> anyhow::Result<ArrowWriter<File>> {
        self.ensure_dir()?;
        let file = File::create(path)?;
        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build();
        Ok(ArrowWriter::try_new(file, schema, Some(props))?)
    }

    /// Write assessments. Returns false, writing nothing, when empty.
    pub fn write_assessments(
        &self,
        path: &Path,
        assessments: &[Assessment],
    ) -> anyhow::Result<bool> {
        if assessments.is_empty() {
            return Ok(false);
        }

        let records: Vec<AssessmentRecord> =
            assessments.iter().map(AssessmentRecord::from).collect();
        let schema = Arc::new(assessment_schema());
        let mut writer = self.writer(path, schema.clone())?;

        let r = records.as_slice();
        let columns: Vec<ArrayRef> = vec![
            Arc::new(Date32Array::from(
                r.iter().map(|r| to_date32(r.date)).collect::<Vec<_>>(),
            )),
            string_column(r, |r| Some(r.deal.clone())),
            string_column(r, |r| Some(r.strategy.clone())),
            Arc::new(BooleanArray::from(
                r.iter().map(|r| r.escalated).collect::<Vec<_>>(),
            )),
            string_column(r, |r| Some(r.significance.clone())),
            string_column(r, |r| Some(r.fingerprint.clone())),
            string_column(r, |r| Some(r.overall_grade.clone())),
            float_column(r, |r| r.reasoner_probability),
            float_column(r, |r| r.analyst_probability),
            float_column(r, |r| r.market_implied_probability),
            float_column(r, |r| r.blended_probability),
            string_column(r, |r| Some(r.deal_price.to_string())),
            string_column(r, |r| Some(r.current_price.to_string())),
            string_column(r, |r| r.spread_bps.map(|s| s.to_string())),
            timestamp_column(r, |r| r.created_at),
        ];

        let batch = RecordBatch::try_new(schema, columns)?;
        writer.write(&batch)?;
        writer.close()?;

        tracing::debug!(path = ?path, count = records.len(), "Wrote assessments to Parquet");
        Ok(true)
    }

    /// Write calibration history. Returns false, writing nothing, when empty.
    pub fn write_calibration(
        &self,
        path: &Path,
        snapshots: &[CalibrationSnapshot],
    ) -> anyhow::Result<bool> {
        if snapshots.is_empty() {
            return Ok(false);
        }

        let schema = Arc::new(calibration_schema());
        let mut writer = self.writer(path, schema.clone())?;

        let columns: Vec<ArrayRef> = vec![
            string_column(snapshots, |s| Some(s.id.to_string())),
            string_column(snapshots, |s| Some(s.scope.to_string())),
            Arc::new(Date32Array::from(
                snapshots
                    .iter()
                    .map(|s| to_date32(s.computed_on))
                    .collect::<Vec<_>>(),
            )),
            Arc::new(UInt64Array::from(
                snapshots
                    .iter()
                    .map(|s| s.sample_count as u64)
                    .collect::<Vec<_>>(),
            )),
            Arc::new(UInt64Array::from(
                snapshots
                    .iter()
                    .map(|s| s.buckets.len() as u64)
                    .collect::<Vec<_>>(),
            )),
            float_column(snapshots, |s| s.brier_mean),
            float_column(snapshots, |s| s.log_score_mean),
            float_column(snapshots, |s| s.ece),
            float_column(snapshots, |s| s.sharpness),
            float_column(snapshots, |s| s.resolution_skill),
            float_column(snapshots, |s| s.base_rate),
            Arc::new(BooleanArray::from(
                snapshots.iter().map(|s| s.usable).collect::<Vec<_>>(),
            )),
            string_column(snapshots, |s| s.previous_id.map(|id| id.to_string())),
            float_column(snapshots, |s| s.brier_delta),
            timestamp_column(snapshots, |s| s.computed_at),
        ];

        let batch = RecordBatch::try_new(schema, columns)?;
        writer.write(&batch)?;
        writer.close()?;

        tracing::debug!(path = ?path, count = snapshots.len(), "Wrote calibration history to Parquet");
        Ok(true)
    }
}

/// Reads back exported assessment files
pub struct ParquetReader {
    path: PathBuf,
}

impl ParquetReader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn read_assessments(&self) -> anyhow::Result<Vec<AssessmentRecord>> {
        use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
        use std::str::FromStr;

        let file = File::open(&self.path)?;
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;

        let mut records = Vec::new();
        for batch in reader {
            let batch = batch?;

            let column = |name: &str| {
                batch
                    .column_by_name(name)
                    .ok_or_else(|| anyhow::anyhow!("Missing column {name}"))
            };
            let strings = |name: &str| -> anyhow::Result<StringArray> {
                column(name)?
                    .as_any()
                    .downcast_ref::<StringArray>()
                    .cloned()
                    .ok_or_else(|| anyhow::anyhow!("Invalid {name} column"))
            };
            let floats = |name: &str| -> anyhow::Result<Float64Array> {
                column(name)?
                    .as_any()
                    .downcast_ref::<Float64Array>()
                    .cloned()
                    .ok_or_else(|| anyhow::anyhow!("Invalid {name} column"))
            };
            let opt = |array: &Float64Array, i: usize| {
                (!array.is_null(i)).then(|| array.value(i))
            };

            let dates = column("date")?
                .as_any()
                .downcast_ref::<Date32Array>()
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("Invalid date column"))?;
            let escalated = column("escalated")?
                .as_any()
                .downcast_ref::<BooleanArray>()
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("Invalid escalated column"))?;
            let created = column("created_at")?
                .as_any()
                .downcast_ref::<TimestampMicrosecondArray>()
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("Invalid created_at column"))?;

            let deal = strings("deal")?;
            let strategy = strings("strategy")?;
            let significance = strings("significance")?;
            let fingerprint = strings("fingerprint")?;
            let grade = strings("overall_grade")?;
            let deal_price = strings("deal_price")?;
            let current_price = strings("current_price")?;
            let spread = strings("spread_bps")?;
            let reasoner = floats("reasoner_probability")?;
            let analyst = floats("analyst_probability")?;
            let market = floats("market_implied_probability")?;
            let blended = floats("blended_probability")?;

            for i in 0..batch.num_rows() {
                records.push(AssessmentRecord {
                    date: from_date32(dates.value(i)),
                    deal: deal.value(i).to_string(),
                    strategy: strategy.value(i).to_string(),
                    escalated: escalated.value(i),
                    significance: significance.value(i).to_string(),
                    fingerprint: fingerprint.value(i).to_string(),
                    overall_grade: grade.value(i).to_string(),
                    reasoner_probability: opt(&reasoner, i),
                    analyst_probability: opt(&analyst, i),
                    market_implied_probability: opt(&market, i),
                    blended_probability: opt(&blended, i),
                    deal_price: Decimal::from_str(deal_price.value(i))?,
                    current_price: Decimal::from_str(current_price.value(i))?,
                    spread_bps: if spread.is_null(i) {
                        None
                    } else {
                        Some(Decimal::from_str(spread.value(i))?)
                    },
                    created_at: DateTime::from_timestamp_micros(created.value(i))
                        .ok_or_else(|| anyhow::anyhow!("Invalid created_at"))?,
                });
            }
        }
        Ok(records)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
