use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use unbillable_core::{HistoricalRecord, HistorySource, sort_by_headcount};

/// A persisted observation plus its storage metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricRecord {
    pub id: String,
    #[serde(flatten)]
    pub record: HistoricalRecord,
    pub recorded_at_ms: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewMetricRecord {
    pub headcount: f64,
    pub software_costs: f64,
    pub rent: f64,
    pub utilization_percentage: f64,
    pub actual_unbillable_expenditure: f64,
    pub month_year: NaiveDate,
}

impl NewMetricRecord {
    fn validate(&self) -> Result<(), StorageError> {
        let numbers = [
            ("headcount", self.headcount),
            ("software_costs", self.software_costs),
            ("rent", self.rent),
            ("utilization_percentage", self.utilization_percentage),
            ("actual_unbillable_expenditure", self.actual_unbillable_expenditure),
        ];
        for (name, v) in numbers {
            if !v.is_finite() {
                return Err(StorageError::InvalidInput(format!(
                    "{name} must be a finite number"
                )));
            }
            if v < 0.0 {
                return Err(StorageError::InvalidInput(format!(
                    "{name} cannot be negative"
                )));
            }
        }
        if self.headcount <= 0.0 {
            return Err(StorageError::InvalidInput(
                "headcount must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Storage collaborator for the forecaster: range and scan queries come from
/// [`HistorySource`], writes are append-only.
pub trait StorageBackend: HistorySource + Send {
    fn append(&mut self, new_record: NewMetricRecord) -> Result<MetricRecord, StorageError>;
    fn list(&self, limit: usize) -> Vec<MetricRecord>;
    fn stats(&self) -> serde_json::Value;
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Accepts `YYYY-MM-DD` or `YYYY-MM`; the latter maps to the first of the month.
pub fn parse_month_year(raw: &str) -> Result<NaiveDate, StorageError> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(&format!("{raw}-01"), "%Y-%m-%d"))
        .map_err(|_| StorageError::InvalidInput(format!("invalid month_year: {raw:?}")))
}

#[derive(Debug, Default, Deserialize)]
struct Persisted {
    records: Vec<MetricRecord>,
}

#[derive(Serialize)]
struct PersistedRef<'a> {
    records: &'a [MetricRecord],
}

pub struct PersistentMetricsStore {
    path: PathBuf,
    records: Vec<MetricRecord>,
    next_id: u64,
}

impl PersistentMetricsStore {
    /// Loads the store at `path`. A missing file is an empty history; the
    /// file is first written on append.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let records = match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice::<Persisted>(&bytes)?.records,
            Err(err) if err.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(err) => return Err(err.into()),
        };
        let next_id = records
            .iter()
            .filter_map(|r| r.id.strip_prefix("metric-")?.parse::<u64>().ok())
            .max()
            .map_or(1, |max| max + 1);
        debug!(path = %path.display(), rows = records.len(), "opened metrics store");

        Ok(Self {
            path,
            records,
            next_id,
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Newest first.
    pub fn list(&self, limit: usize) -> Vec<MetricRecord> {
        let n = limit.max(1);
        self.records.iter().rev().take(n).cloned().collect()
    }

    pub fn stats(&self) -> serde_json::Value {
        let first = self.records.iter().map(|r| r.record.month_year).min();
        let last = self.records.iter().map(|r| r.record.month_year).max();
        serde_json::json!({
            "count": self.records.len(),
            "path": self.path,
            "first_month": first,
            "last_month": last,
        })
    }

    pub fn append(&mut self, new_record: NewMetricRecord) -> Result<MetricRecord, StorageError> {
        new_record.validate()?;

        let record = MetricRecord {
            id: format!("metric-{}", self.next_id),
            record: HistoricalRecord {
                headcount: new_record.headcount,
                software_costs: new_record.software_costs,
                rent: new_record.rent,
                utilization_percentage: new_record.utilization_percentage,
                actual_unbillable_expenditure: new_record.actual_unbillable_expenditure,
                month_year: new_record.month_year,
            },
            recorded_at_ms: now_ms(),
        };

        self.records.push(record.clone());
        if let Err(err) = self.persist() {
            self.records.pop();
            return Err(err);
        }
        self.next_id += 1;

        Ok(record)
    }

    /// Rewrites the whole file through a sibling temp file and a rename.
    fn persist(&self) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let bytes = serde_json::to_vec_pretty(&PersistedRef {
            records: &self.records,
        })?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl HistorySource for PersistentMetricsStore {
    fn in_headcount_range(&self, min: f64, max: f64) -> Vec<HistoricalRecord> {
        history_in_range(&self.records, min, max)
    }

    fn all_by_headcount(&self) -> Vec<HistoricalRecord> {
        let mut rows: Vec<_> = self.records.iter().map(|r| r.record.clone()).collect();
        sort_by_headcount(&mut rows);
        rows
    }
}

impl StorageBackend for PersistentMetricsStore {
    fn append(&mut self, new_record: NewMetricRecord) -> Result<MetricRecord, StorageError> {
        Self::append(self, new_record)
    }

    fn list(&self, limit: usize) -> Vec<MetricRecord> {
        Self::list(self, limit)
    }

    fn stats(&self) -> serde_json::Value {
        Self::stats(self)
    }
}

/// Rows with `min <= headcount <= max`, oldest month first.
pub fn history_in_range(records: &[MetricRecord], min: f64, max: f64) -> Vec<HistoricalRecord> {
    let mut rows: Vec<_> = records
        .iter()
        .filter(|r| r.record.headcount >= min && r.record.headcount <= max)
        .map(|r| r.record.clone())
        .collect();
    rows.sort_by_key(|r| r.month_year);
    rows
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
