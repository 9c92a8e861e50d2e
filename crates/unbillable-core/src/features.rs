use serde::{Serialize, Serializer};

use crate::input::clamp_utilization;

pub const FEATURE_COUNT: usize = 6;

/// The six model features, in column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureKind {
    HeadcountVolume,
    SoftwareInfrastructure,
    FixedRent,
    EfficiencyDrop,
    ScaleAdjustedWaste,
    StartupFriction,
}

impl FeatureKind {
    pub const ALL: [Self; FEATURE_COUNT] = [
        Self::HeadcountVolume,
        Self::SoftwareInfrastructure,
        Self::FixedRent,
        Self::EfficiencyDrop,
        Self::ScaleAdjustedWaste,
        Self::StartupFriction,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::HeadcountVolume => "Headcount Volume",
            Self::SoftwareInfrastructure => "Software Infrastructure",
            Self::FixedRent => "Fixed Rent",
            Self::EfficiencyDrop => "Efficiency Drop (Exponential)",
            Self::ScaleAdjustedWaste => "Scale-Adjusted Waste",
            Self::StartupFriction => "Startup Frictional Waste",
        }
    }
}

impl Serialize for FeatureKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FeatureVector([f64; FEATURE_COUNT]);

impl FeatureVector {
    /// Applies the model transform. Historical rows and the query row both go
    /// through here; utilization is clamped to `[0, 100]` for either.
    ///
    /// 1. `sqrt(h)`
    /// 2. software costs
    /// 3. rent
    /// 4. `ln(101 - u)`
    /// 5. `h * (100 - u)`
    /// 6. `(100 - u) * exp(-h / 10)`
    pub fn transform(headcount: f64, software_costs: f64, rent: f64, utilization: f64) -> Self {
        let u = clamp_utilization(utilization);
        let idle = 100.0 - u;
        Self([
            headcount.sqrt(),
            software_costs,
            rent,
            (101.0 - u).ln(),
            headcount * idle,
            idle * (-headcount / 10.0).exp(),
        ])
    }

    pub fn values(&self) -> &[f64; FEATURE_COUNT] {
        &self.0
    }

    pub fn get(&self, kind: FeatureKind) -> f64 {
        let idx = kind as usize;
        self.0.get(idx).copied().unwrap_or(0.0)
    }

    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|v| v.is_finite())
    }

    pub fn iter(&self) -> impl Iterator<Item = (FeatureKind, f64)> + '_ {
        FeatureKind::ALL.into_iter().zip(self.0.iter().copied())
    }
}

impl From<[f64; FEATURE_COUNT]> for FeatureVector {
    fn from(values: [f64; FEATURE_COUNT]) -> Self {
        Self(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn transform_matches_closed_form() {
        let f = FeatureVector::transform(25.0, 40_000.0, 10_000.0, 80.0);
        let v = f.values();
        assert!(close(v[0], 5.0));
        assert!(close(v[1], 40_000.0));
        assert!(close(v[2], 10_000.0));
        assert!(close(v[3], 21.0_f64.ln()));
        assert!(close(v[4], 500.0));
        assert!(close(v[5], 20.0 * (-2.5_f64).exp()));
    }

    #[test]
    fn utilization_over_100_matches_100() {
        let over = FeatureVector::transform(10.0, 1.0, 2.0, 150.0);
        let full = FeatureVector::transform(10.0, 1.0, 2.0, 100.0);
        assert_eq!(over, full);
        assert!(over.is_finite());
        assert!(close(over.get(FeatureKind::EfficiencyDrop), 0.0));
    }

    #[test]
    fn feature_kind_index_matches_column() {
        let f = FeatureVector::from([1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        for (i, kind) in FeatureKind::ALL.iter().enumerate() {
            assert_eq!(f.get(*kind), (i + 1) as f64);
        }
    }
}
