//! Ordered post-model adjustments.
//!
//! Every stage is a pure function of the current value and the request's
//! [`GuardrailContext`]. The floor and bills are computed once from the
//! sanitized inputs and never from an intermediate value, so the order of
//! [`Stage::PIPELINE`] is the whole of the precedence.

use serde::Serialize;
use tracing::debug;

use crate::driver::Driver;
use crate::input::QueryInput;

pub const MANAGEMENT_OVERHEAD_PER_HEAD: f64 = 600.0;
/// Organizations at or below this headcount carry no management overhead.
pub const SOLO_OPERATION_MAX_HEADCOUNT: f64 = 2.0;
pub const SMALL_TEAM_HEADCOUNT: f64 = 20.0;
pub const IDLE_POINT_PENALTY: f64 = 500.0;
pub const SOFT_CAP_MULTIPLE: f64 = 2.5;
pub const SOFT_CAP_EXCESS_KEPT: f64 = 0.4;
const REMOTE_WASTE_KEPT: f64 = 0.5;

pub fn management_overhead(headcount: f64) -> f64 {
    if headcount <= SOLO_OPERATION_MAX_HEADCOUNT {
        0.0
    } else {
        headcount * MANAGEMENT_OVERHEAD_PER_HEAD
    }
}

/// The two cost baselines. `fixed_floor` includes management overhead and
/// bounds the forecast from below; `bills` does not and anchors the soft cap.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CostBasis {
    pub management_overhead: f64,
    pub fixed_floor: f64,
    pub bills: f64,
}

impl CostBasis {
    pub fn new(query: &QueryInput) -> Self {
        let bills = query.rent + query.software_costs;
        let management_overhead = management_overhead(query.headcount);
        Self {
            management_overhead,
            fixed_floor: bills + management_overhead,
            bills,
        }
    }

    pub fn soft_cap(&self) -> f64 {
        self.bills * SOFT_CAP_MULTIPLE
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GuardrailContext {
    pub query: QueryInput,
    pub basis: CostBasis,
}

impl GuardrailContext {
    pub fn new(query: QueryInput) -> Self {
        Self {
            query,
            basis: CostBasis::new(&query),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    FixedFloor,
    RemoteCorrection,
    SmallTeam,
    LargeTeamCap,
    SoftCap,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageOutcome {
    pub value: f64,
    pub driver: Option<Driver>,
}

impl StageOutcome {
    fn keep(value: f64) -> Self {
        Self {
            value,
            driver: None,
        }
    }
}

impl Stage {
    pub const PIPELINE: [Self; 5] = [
        Self::FixedFloor,
        Self::RemoteCorrection,
        Self::SmallTeam,
        Self::LargeTeamCap,
        Self::SoftCap,
    ];

    pub fn apply(self, value: f64, ctx: &GuardrailContext) -> StageOutcome {
        match self {
            Self::FixedFloor => fixed_floor(value, ctx),
            Self::RemoteCorrection => remote_correction(value, ctx),
            Self::SmallTeam => small_team(value, ctx),
            Self::LargeTeamCap => large_team_cap(value, ctx),
            Self::SoftCap => soft_cap(value, ctx),
        }
    }
}

/// Clamps to the fixed floor. A non-finite model output lands here too.
pub fn fixed_floor(value: f64, ctx: &GuardrailContext) -> StageOutcome {
    let floor = ctx.basis.fixed_floor;
    if !value.is_finite() {
        return StageOutcome {
            value: floor,
            driver: Some(Driver::FloorHit),
        };
    }
    StageOutcome::keep(value.max(floor))
}

/// Fully remote organizations keep half of the waste implied above their
/// bills, added back onto the fixed floor.
pub fn remote_correction(value: f64, ctx: &GuardrailContext) -> StageOutcome {
    if ctx.query.rent != 0.0 {
        return StageOutcome::keep(value);
    }
    let implied_waste = (value - ctx.basis.bills).max(0.0);
    StageOutcome::keep(ctx.basis.fixed_floor + implied_waste * REMOTE_WASTE_KEPT)
}

pub fn small_team(value: f64, ctx: &GuardrailContext) -> StageOutcome {
    let q = &ctx.query;
    if q.headcount >= SMALL_TEAM_HEADCOUNT {
        return StageOutcome::keep(value);
    }
    let standard = ctx.basis.fixed_floor + (100.0 - q.utilization) * IDLE_POINT_PENALTY;
    if q.utilization > 85.0 {
        StageOutcome::keep(value.min(standard))
    } else {
        StageOutcome::keep(standard)
    }
}

pub fn large_team_cap(value: f64, ctx: &GuardrailContext) -> StageOutcome {
    let q = &ctx.query;
    if q.headcount < SMALL_TEAM_HEADCOUNT || q.utilization <= 80.0 {
        return StageOutcome::keep(value);
    }
    let cap = ctx.basis.fixed_floor * (1.0 + (100.0 - q.utilization) / 20.0);
    StageOutcome::keep(value.min(cap))
}

/// Discounts 60% of whatever exceeds 2.5x bills. The fixed floor still wins
/// when management overhead alone outweighs the discounted value, so the
/// result never drops below the floor even if that exceeds the soft-cap bound.
pub fn soft_cap(value: f64, ctx: &GuardrailContext) -> StageOutcome {
    let cap = ctx.basis.soft_cap();
    if value <= cap {
        return StageOutcome::keep(value);
    }
    let discounted = cap + (value - cap) * SOFT_CAP_EXCESS_KEPT;
    let driver = if ctx.query.software_costs > 0.6 * ctx.basis.bills {
        Driver::HighSoftwareDrag
    } else {
        Driver::WorkforceEfficiencyGap
    };
    StageOutcome {
        value: discounted.max(ctx.basis.fixed_floor),
        driver: Some(driver),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StageRecord {
    pub stage: Stage,
    pub before: f64,
    pub after: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver: Option<Driver>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GuardrailReport {
    pub value: f64,
    pub driver: Driver,
    /// Stages that changed the value or the label, in execution order.
    pub trace: Vec<StageRecord>,
}

pub fn run_pipeline(raw: f64, driver: Driver, ctx: &GuardrailContext) -> GuardrailReport {
    let mut value = raw;
    let mut driver = driver;
    let mut trace = Vec::new();

    for stage in Stage::PIPELINE {
        let outcome = stage.apply(value, ctx);
        let changed = outcome.value.to_bits() != value.to_bits();
        if changed || outcome.driver.is_some() {
            debug!(?stage, before = value, after = outcome.value, "guardrail fired");
            trace.push(StageRecord {
                stage,
                before: value,
                after: outcome.value,
                driver: outcome.driver,
            });
        }
        value = outcome.value;
        if let Some(d) = outcome.driver {
            driver = d;
        }
    }

    GuardrailReport {
        value,
        driver,
        trace,
    }
}
