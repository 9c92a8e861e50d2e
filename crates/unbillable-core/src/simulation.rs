//! Utilization what-if curve.
//!
//! A closed-form projection of cost against utilization, shifted by a
//! calibration offset so the curve passes through the model's forecast at the
//! query's own utilization.

use serde::Serialize;

use crate::guardrails::{
    CostBasis, IDLE_POINT_PENALTY, SMALL_TEAM_HEADCOUNT, SOFT_CAP_EXCESS_KEPT,
};
use crate::input::QueryInput;

pub const TARGET_UTILIZATION: f64 = 90.0;
const IDLE_HEAD_COST: f64 = 20_000.0;
const CURVE_START: u32 = 60;
const CURVE_STEP: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SimulationPoint {
    pub utilization: f64,
    pub cost: f64,
    pub is_current: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationReport {
    pub calibration_offset: f64,
    pub target_utilization: f64,
    pub savings_potential: f64,
    pub points: Vec<SimulationPoint>,
}

pub fn projected_cost(headcount: f64, utilization: f64, basis: &CostBasis) -> f64 {
    let floor = basis.fixed_floor;
    let idle = 100.0 - utilization;
    let projected = if headcount < SMALL_TEAM_HEADCOUNT {
        floor + idle * IDLE_POINT_PENALTY
    } else {
        let waste = floor + headcount * (idle / 100.0) * IDLE_HEAD_COST;
        if utilization > 80.0 {
            waste.min(floor * (1.0 + idle / 20.0))
        } else {
            waste
        }
    };

    let cap = basis.soft_cap();
    if projected > cap {
        cap + (projected - cap) * SOFT_CAP_EXCESS_KEPT
    } else {
        projected
    }
}

pub fn simulate(query: &QueryInput, predicted: f64) -> SimulationReport {
    let basis = CostBasis::new(query);
    let h = query.headcount;
    let offset = predicted - projected_cost(h, query.utilization, &basis);
    let calibrated = |u: f64| (projected_cost(h, u, &basis) + offset).max(basis.fixed_floor);
    let current_bucket = query.utilization.round();

    let points = (CURVE_START..=100)
        .step_by(CURVE_STEP)
        .map(f64::from)
        .map(|u| SimulationPoint {
            utilization: u,
            cost: calibrated(u).round(),
            is_current: (u - current_bucket).abs() < f64::EPSILON,
        })
        .collect();

    let savings_potential = if query.utilization < TARGET_UTILIZATION {
        (calibrated(query.utilization) - calibrated(TARGET_UTILIZATION)).max(0.0)
    } else {
        0.0
    };

    SimulationReport {
        calibration_offset: offset,
        target_utilization: TARGET_UTILIZATION,
        savings_potential,
        points,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_team_projection_is_linear_in_idle_points() {
        let q = QueryInput::new(5.0, 50_000.0, 50_000.0, 70.0);
        let basis = CostBasis::new(&q);
        assert_eq!(projected_cost(5.0, 70.0, &basis), 118_000.0);
        assert_eq!(projected_cost(5.0, 95.0, &basis), 105_500.0);
    }

    #[test]
    fn large_team_projection_is_capped_above_80() {
        let q = QueryInput::new(50.0, 400_000.0, 100_000.0, 90.0);
        let basis = CostBasis::new(&q);
        // floor 530k plus 50 * 10% * 20k of idle cost, under the 1.5x cap
        assert_eq!(projected_cost(50.0, 90.0, &basis), 630_000.0);

        let big = QueryInput::new(200.0, 400_000.0, 100_000.0, 99.0);
        let basis = CostBasis::new(&big);
        assert_eq!(basis.fixed_floor, 620_000.0);
        assert_eq!(
            projected_cost(200.0, 99.0, &basis),
            620_000.0 * (1.0 + 1.0 / 20.0)
        );
    }

    #[test]
    fn curve_passes_through_prediction() {
        let q = QueryInput::new(5.0, 50_000.0, 50_000.0, 70.0);
        let report = simulate(&q, 125_000.0);
        assert_eq!(report.calibration_offset, 7_000.0);
        assert_eq!(report.points.len(), 9);
        let current: Vec<_> = report.points.iter().filter(|p| p.is_current).collect();
        assert_eq!(current.len(), 1);
        assert_eq!(current[0].utilization, 70.0);
        assert_eq!(current[0].cost, 125_000.0);
        assert_eq!(report.savings_potential, 10_000.0);
    }

    #[test]
    fn no_savings_at_or_above_target() {
        let q = QueryInput::new(5.0, 50_000.0, 50_000.0, 95.0);
        let report = simulate(&q, 105_500.0);
        assert_eq!(report.savings_potential, 0.0);
        assert!(report.points.iter().all(|p| p.cost >= 103_000.0));
    }
}
