use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::features::FeatureVector;

pub const MIN_TRAINING_ROWS: usize = 2;
const PEER_BAND: f64 = 0.5;

/// One verified month of organization metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalRecord {
    pub headcount: f64,
    pub software_costs: f64,
    pub rent: f64,
    pub utilization_percentage: f64,
    pub actual_unbillable_expenditure: f64,
    pub month_year: NaiveDate,
}

impl HistoricalRecord {
    pub fn features(&self) -> FeatureVector {
        FeatureVector::transform(
            self.headcount,
            self.software_costs,
            self.rent,
            self.utilization_percentage,
        )
    }
}

/// Read side of the historical store.
pub trait HistorySource {
    /// Rows with `min <= headcount <= max`, oldest month first.
    fn in_headcount_range(&self, min: f64, max: f64) -> Vec<HistoricalRecord>;
    /// Every row, ordered by headcount.
    fn all_by_headcount(&self) -> Vec<HistoricalRecord>;
}

impl HistorySource for [HistoricalRecord] {
    fn in_headcount_range(&self, min: f64, max: f64) -> Vec<HistoricalRecord> {
        let mut rows: Vec<_> = self
            .iter()
            .filter(|r| r.headcount >= min && r.headcount <= max)
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.month_year);
        rows
    }

    fn all_by_headcount(&self) -> Vec<HistoricalRecord> {
        let mut rows = self.to_vec();
        sort_by_headcount(&mut rows);
        rows
    }
}

impl HistorySource for Vec<HistoricalRecord> {
    fn in_headcount_range(&self, min: f64, max: f64) -> Vec<HistoricalRecord> {
        self.as_slice().in_headcount_range(min, max)
    }

    fn all_by_headcount(&self) -> Vec<HistoricalRecord> {
        self.as_slice().all_by_headcount()
    }
}

pub fn sort_by_headcount(rows: &mut [HistoricalRecord]) {
    rows.sort_by(|a, b| {
        a.headcount
            .total_cmp(&b.headcount)
            .then_with(|| a.month_year.cmp(&b.month_year))
    });
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleTier {
    Peer,
    FullHistory,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PeerSelection {
    Sample { tier: SampleTier, rows: Vec<HistoricalRecord> },
    Insufficient { available: usize },
}

/// Inclusive headcount band used for the peer query.
pub fn peer_bounds(headcount: f64) -> (f64, f64) {
    (
        (headcount * (1.0 - PEER_BAND)).floor(),
        (headcount * (1.0 + PEER_BAND)).ceil(),
    )
}

pub fn select_peers<S: HistorySource + ?Sized>(source: &S, headcount: f64) -> PeerSelection {
    let (min, max) = peer_bounds(headcount);
    let peers = source.in_headcount_range(min, max);
    if peers.len() >= MIN_TRAINING_ROWS {
        debug!(min, max, rows = peers.len(), "training on peer sample");
        return PeerSelection::Sample {
            tier: SampleTier::Peer,
            rows: peers,
        };
    }

    let all = source.all_by_headcount();
    if all.len() >= MIN_TRAINING_ROWS {
        debug!(
            peers = peers.len(),
            rows = all.len(),
            "peer sample too small, training on full history"
        );
        return PeerSelection::Sample {
            tier: SampleTier::FullHistory,
            rows: all,
        };
    }

    PeerSelection::Insufficient {
        available: all.len(),
    }
}
