use serde::Deserialize;
use unbillable_core::{InputError, LooseNumber};
use unbillable_storage::{parse_month_year, NewMetricRecord};

/// Body of `POST /api/metrics`.
#[derive(Debug, Default, Deserialize)]
pub struct RecordMetricRequest {
    #[serde(default)]
    pub headcount: Option<LooseNumber>,
    #[serde(default)]
    pub software_costs: Option<LooseNumber>,
    #[serde(default)]
    pub rent: Option<LooseNumber>,
    #[serde(default, alias = "utilization_percentage")]
    pub utilization: Option<LooseNumber>,
    #[serde(default)]
    pub actual_unbillable_expenditure: Option<LooseNumber>,
    #[serde(default)]
    pub month_year: Option<String>,
}

impl RecordMetricRequest {
    pub fn into_new_record(self) -> Result<NewMetricRecord, String> {
        let month_year = self
            .month_year
            .ok_or_else(|| InputError::MissingField("month_year").to_string())?;
        Ok(NewMetricRecord {
            headcount: number(self.headcount, "headcount")?,
            software_costs: number(self.software_costs, "software_costs")?,
            rent: number(self.rent, "rent")?,
            utilization_percentage: number(self.utilization, "utilization")?,
            actual_unbillable_expenditure: number(
                self.actual_unbillable_expenditure,
                "actual_unbillable_expenditure",
            )?,
            month_year: parse_month_year(&month_year).map_err(|e| e.to_string())?,
        })
    }
}

fn number(value: Option<LooseNumber>, field: &'static str) -> Result<f64, String> {
    value
        .ok_or(InputError::MissingField(field))
        .and_then(|v| v.parse(field))
        .map_err(|e| e.to_string())
}
