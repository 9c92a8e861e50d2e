use serde::Serialize;

use crate::driver::Driver;
use crate::features::{FeatureKind, FeatureVector};
use crate::guardrails::{CostBasis, SMALL_TEAM_HEADCOUNT};
use crate::input::QueryInput;
use crate::regression::LinearModel;

const NORMALCY_BAND: f64 = 1.25;
const RENT_OVERRIDE_RATIO: f64 = 0.5;

/// Contribution of one feature relative to the training sample's mean.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Impact {
    #[serde(rename = "name")]
    pub feature: FeatureKind,
    pub value: f64,
    pub abs: f64,
    pub weight: f64,
    pub deviation: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attribution {
    pub impacts: Vec<Impact>,
    /// Feature picked on contributions alone, after the rent override.
    pub statistical: FeatureKind,
    pub driver: Driver,
}

pub fn impacts(model: &LinearModel, features: &FeatureVector) -> Vec<Impact> {
    features
        .iter()
        .zip(model.weights.iter().zip(model.means.iter()))
        .map(|((feature, x), (w, mean))| {
            let deviation = x - mean;
            let raw = w * deviation;
            let value = if raw.is_finite() { raw } else { 0.0 };
            Impact {
                feature,
                value,
                abs: value.abs(),
                weight: *w,
                deviation,
            }
        })
        .collect()
}

/// Largest positive contribution, or the largest magnitude when nothing
/// pushes the cost above typical.
pub fn statistical_driver(impacts: &[Impact]) -> Option<FeatureKind> {
    strongest(impacts.iter().filter(|i| i.value > 0.0), |i| i.value)
        .or_else(|| strongest(impacts.iter(), |i| i.abs))
}

fn strongest<'a>(
    candidates: impl Iterator<Item = &'a Impact>,
    key: impl Fn(&Impact) -> f64,
) -> Option<FeatureKind> {
    candidates
        .fold(None::<&Impact>, |best, i| match best {
            Some(b) if key(b) >= key(i) => Some(b),
            _ => Some(i),
        })
        .map(|i| i.feature)
}

/// Rent is not actionable; prefer the waste feature when it is comparably large.
pub fn rent_override(winner: FeatureKind, impacts: &[Impact]) -> FeatureKind {
    if winner != FeatureKind::FixedRent {
        return winner;
    }
    let contribution = |kind| {
        impacts
            .iter()
            .find(|i| i.feature == kind)
            .map_or(0.0, |i| i.value)
    };
    let rent = contribution(FeatureKind::FixedRent);
    let waste = contribution(FeatureKind::ScaleAdjustedWaste);
    if waste > RENT_OVERRIDE_RATIO * rent {
        FeatureKind::ScaleAdjustedWaste
    } else {
        winner
    }
}

/// Maps a raw feature to the label shown to the user.
pub fn label(feature: FeatureKind, query: &QueryInput) -> Driver {
    let h = query.headcount;
    let u = query.utilization;
    match feature {
        FeatureKind::EfficiencyDrop | FeatureKind::ScaleAdjustedWaste => {
            if u > 85.0 && h >= SMALL_TEAM_HEADCOUNT {
                Driver::HeadcountVariance
            } else if u <= 75.0 {
                Driver::LowEfficiency { utilization: u }
            } else if h < SMALL_TEAM_HEADCOUNT && u <= 85.0 {
                Driver::SmallTeamRisk
            } else {
                Driver::UtilizationVariance
            }
        }
        FeatureKind::StartupFriction => Driver::StartupFriction,
        FeatureKind::HeadcountVolume => Driver::HeadcountVariance,
        FeatureKind::FixedRent if query.rent == 0.0 => Driver::RemoteFixedOverheads,
        FeatureKind::FixedRent => Driver::FixedRent,
        FeatureKind::SoftwareInfrastructure => Driver::SoftwareInfrastructure,
    }
}

/// Near-floor forecasts are explained by fixed bills, not by variance terms.
pub fn normalcy_override(raw_prediction: f64, query: &QueryInput, basis: &CostBasis) -> Option<Driver> {
    if !raw_prediction.is_finite() || raw_prediction > NORMALCY_BAND * basis.fixed_floor {
        return None;
    }
    if query.software_costs > 0.5 * basis.fixed_floor {
        Some(Driver::SoftwareInfrastructureCosts)
    } else {
        Some(Driver::StandardFixedOverheads)
    }
}

pub fn attribute(
    model: &LinearModel,
    features: &FeatureVector,
    query: &QueryInput,
    basis: &CostBasis,
    raw_prediction: f64,
) -> Attribution {
    let impacts = impacts(model, features);
    let winner = statistical_driver(&impacts).unwrap_or(FeatureKind::HeadcountVolume);
    let statistical = rent_override(winner, &impacts);
    let driver = normalcy_override(raw_prediction, query, basis)
        .unwrap_or_else(|| label(statistical, query));
    Attribution {
        impacts,
        statistical,
        driver,
    }
}
