use serde::Serialize;
use tracing::{debug, warn};

use crate::attribution::{attribute, Impact};
use crate::driver::Driver;
use crate::error::InputError;
use crate::features::{FeatureVector, FEATURE_COUNT};
use crate::guardrails::{run_pipeline, GuardrailContext, StageRecord};
use crate::input::{QueryInput, RawQueryInput, Sanitized};
use crate::peers::{select_peers, HistoricalRecord, HistorySource, PeerSelection, SampleTier};
use crate::regression::LinearModel;
use crate::simulation::{simulate, SimulationReport};

pub const MODEL_DESCRIPTION: &str = "Transformed linear regression: sqrt(HC), Software, Rent, \
     ln(101-Util), HC*(100-Util), (100-Util)*exp(-HC/10)";
const HEURISTIC_IDLE_HEAD_COST: f64 = 50.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelDetails {
    pub weights: [f64; FEATURE_COUNT],
    pub means: [f64; FEATURE_COUNT],
    pub intercept: f64,
    pub training_rows: usize,
    pub sample_tier: SampleTier,
    pub description: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelForecast {
    pub predicted_unbillable_expenditure: f64,
    pub main_driver: Driver,
    pub raw_prediction: f64,
    pub model_details: ModelDetails,
    pub impact_analysis: Vec<Impact>,
    pub guardrails: Vec<StageRecord>,
    pub debug_inputs: FeatureVector,
    pub simulation: SimulationReport,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeuristicForecast {
    pub predicted_unbillable_expenditure: f64,
    pub main_driver: Driver,
    pub training_rows: usize,
    pub simulation: SimulationReport,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InactiveForecast {
    pub predicted_unbillable_expenditure: f64,
    pub main_driver: Driver,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Forecast {
    Model(ModelForecast),
    Heuristic(HeuristicForecast),
    Inactive(InactiveForecast),
}

impl Forecast {
    fn inactive() -> Self {
        Self::Inactive(InactiveForecast {
            predicted_unbillable_expenditure: 0.0,
            main_driver: Driver::InactiveOrganization,
        })
    }

    pub fn predicted(&self) -> f64 {
        match self {
            Self::Model(m) => m.predicted_unbillable_expenditure,
            Self::Heuristic(h) => h.predicted_unbillable_expenditure,
            Self::Inactive(i) => i.predicted_unbillable_expenditure,
        }
    }

    pub fn driver(&self) -> Driver {
        match self {
            Self::Model(m) => m.main_driver,
            Self::Heuristic(h) => h.main_driver,
            Self::Inactive(i) => i.main_driver,
        }
    }
}

/// Sanitizes an untrusted request and forecasts it.
pub fn forecast<S: HistorySource + ?Sized>(
    source: &S,
    raw: &RawQueryInput,
) -> Result<Forecast, InputError> {
    match raw.sanitize()? {
        Sanitized::Inactive => Ok(Forecast::inactive()),
        Sanitized::Active(query) => Ok(forecast_query(source, &query)),
    }
}

/// Selects peers, fits a fresh model, attributes the result and runs the
/// guardrail pipeline. Always returns a bounded, labeled value.
pub fn forecast_query<S: HistorySource + ?Sized>(source: &S, query: &QueryInput) -> Forecast {
    if query.headcount <= 0.0 || query.utilization < 0.0 {
        return Forecast::inactive();
    }

    let (tier, rows) = match select_peers(source, query.headcount) {
        PeerSelection::Sample { tier, rows } => (tier, rows),
        PeerSelection::Insufficient { available } => {
            warn!(available, "not enough history to fit, using heuristic estimate");
            return heuristic(query, available);
        }
    };

    let x: Vec<FeatureVector> = rows.iter().map(HistoricalRecord::features).collect();
    let y: Vec<f64> = rows
        .iter()
        .map(|r| r.actual_unbillable_expenditure)
        .collect();
    let model = LinearModel::fit(&x, &y).unwrap_or_else(|err| {
        warn!(%err, rows = x.len(), "regression failed, flooring to fixed costs");
        LinearModel::degenerate(&x)
    });

    let features = FeatureVector::transform(
        query.headcount,
        query.software_costs,
        query.rent,
        query.utilization,
    );
    let raw_prediction = model.predict(&features);
    let ctx = GuardrailContext::new(*query);
    let attribution = attribute(&model, &features, query, &ctx.basis, raw_prediction);
    let report = run_pipeline(raw_prediction, attribution.driver, &ctx);
    let predicted = round_currency(report.value);
    debug!(
        raw_prediction,
        predicted,
        driver = %report.driver,
        "forecast complete"
    );

    Forecast::Model(ModelForecast {
        predicted_unbillable_expenditure: predicted,
        main_driver: report.driver,
        raw_prediction,
        model_details: ModelDetails {
            weights: model.weights,
            means: model.means,
            intercept: model.intercept,
            training_rows: model.training_rows,
            sample_tier: tier,
            description: MODEL_DESCRIPTION,
        },
        impact_analysis: attribution.impacts,
        guardrails: report.trace,
        debug_inputs: features,
        simulation: simulate(query, predicted),
    })
}

/// Estimate used when fewer than two historical rows exist.
pub fn heuristic_estimate(query: &QueryInput) -> f64 {
    query.rent
        + query.software_costs
        + (100.0 - query.utilization) * query.headcount * HEURISTIC_IDLE_HEAD_COST
}

fn heuristic(query: &QueryInput, available: usize) -> Forecast {
    let predicted = round_currency(heuristic_estimate(query));
    Forecast::Heuristic(HeuristicForecast {
        predicted_unbillable_expenditure: predicted,
        main_driver: Driver::HeuristicEstimate,
        training_rows: available,
        simulation: simulate(query, predicted),
    })
}

fn round_currency(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
