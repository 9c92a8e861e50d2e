use serde::{Deserialize, Serialize};

use crate::error::InputError;

/// A number as it arrives from a form or JSON body: either already numeric or
/// text such as `"1,20,000"` or `"₹ 45,000.50"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LooseNumber {
    Number(f64),
    Text(String),
}

impl LooseNumber {
    pub fn parse(&self, field: &'static str) -> Result<f64, InputError> {
        let value = match self {
            Self::Number(v) => *v,
            Self::Text(raw) => parse_loose_number(raw).ok_or_else(|| InputError::NotNumeric {
                field,
                value: raw.clone(),
            })?,
        };
        if !value.is_finite() {
            return Err(InputError::NonFinite(field));
        }
        Ok(value)
    }
}

impl From<f64> for LooseNumber {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<&str> for LooseNumber {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

/// Strips grouping separators and a leading currency symbol, then parses.
pub fn parse_loose_number(raw: &str) -> Option<f64> {
    let trimmed = raw
        .trim()
        .trim_start_matches(|c: char| !c.is_ascii_digit() && c != '-' && c != '+' && c != '.');
    let cleaned: String = trimmed
        .chars()
        .filter(|c| !matches!(c, ',' | '_' | ' ' | '\u{a0}'))
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok()
}

/// Untrusted forecast request body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawQueryInput {
    #[serde(default)]
    pub headcount: Option<LooseNumber>,
    #[serde(default)]
    pub software_costs: Option<LooseNumber>,
    #[serde(default)]
    pub rent: Option<LooseNumber>,
    #[serde(default, alias = "utilization_percentage")]
    pub utilization: Option<LooseNumber>,
}

/// Sanitized query. Utilization is clamped to `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QueryInput {
    pub headcount: f64,
    pub software_costs: f64,
    pub rent: f64,
    pub utilization: f64,
}

/// Outcome of sanitation: either a usable query or an organization with no
/// active workforce, which bypasses the model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sanitized {
    Active(QueryInput),
    Inactive,
}

impl RawQueryInput {
    pub fn sanitize(&self) -> Result<Sanitized, InputError> {
        let headcount = required(self.headcount.as_ref(), "headcount")?;
        let software_costs = required(self.software_costs.as_ref(), "software_costs")?;
        let rent = required(self.rent.as_ref(), "rent")?;
        let utilization = required(self.utilization.as_ref(), "utilization")?;

        if headcount <= 0.0 || utilization < 0.0 {
            return Ok(Sanitized::Inactive);
        }
        if software_costs < 0.0 {
            return Err(InputError::Negative("software_costs"));
        }
        if rent < 0.0 {
            return Err(InputError::Negative("rent"));
        }

        Ok(Sanitized::Active(QueryInput {
            headcount,
            software_costs,
            rent,
            utilization: clamp_utilization(utilization),
        }))
    }
}

impl QueryInput {
    pub fn new(headcount: f64, software_costs: f64, rent: f64, utilization: f64) -> Self {
        Self {
            headcount,
            software_costs,
            rent,
            utilization: clamp_utilization(utilization),
        }
    }
}

pub fn clamp_utilization(u: f64) -> f64 {
    u.clamp(0.0, 100.0)
}

fn required(value: Option<&LooseNumber>, field: &'static str) -> Result<f64, InputError> {
    value.ok_or(InputError::MissingField(field))?.parse(field)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(h: &str, s: &str, r: &str, u: &str) -> RawQueryInput {
        RawQueryInput {
            headcount: Some(h.into()),
            software_costs: Some(s.into()),
            rent: Some(r.into()),
            utilization: Some(u.into()),
        }
    }

    #[test]
    fn strips_thousands_separators_and_currency() {
        assert_eq!(parse_loose_number("1,20,000"), Some(120_000.0));
        assert_eq!(parse_loose_number(" 45,000.50 "), Some(45_000.5));
        assert_eq!(parse_loose_number("₹ 3,000"), Some(3_000.0));
        assert_eq!(parse_loose_number("$-12"), Some(-12.0));
        assert_eq!(parse_loose_number("abc"), None);
        assert_eq!(parse_loose_number(""), None);
    }

    #[test]
    fn sanitizes_string_fields_and_clamps_utilization() {
        let out = raw("25", "1,00,000", "50,000", "150").sanitize().expect("valid");
        let Sanitized::Active(q) = out else {
            panic!("expected active query");
        };
        assert_eq!(q.headcount, 25.0);
        assert_eq!(q.software_costs, 100_000.0);
        assert_eq!(q.rent, 50_000.0);
        assert_eq!(q.utilization, 100.0);
    }

    #[test]
    fn missing_field_is_reported() {
        let mut input = raw("5", "1", "1", "50");
        input.rent = None;
        assert_eq!(input.sanitize(), Err(InputError::MissingField("rent")));
    }

    #[test]
    fn non_numeric_field_is_reported() {
        let err = raw("five", "1", "1", "50").sanitize().unwrap_err();
        assert!(matches!(err, InputError::NotNumeric { field: "headcount", .. }));
    }

    #[test]
    fn non_finite_number_is_rejected() {
        let input = RawQueryInput {
            headcount: Some(LooseNumber::Number(f64::INFINITY)),
            ..raw("1", "1", "1", "1")
        };
        assert_eq!(input.sanitize(), Err(InputError::NonFinite("headcount")));
        let input = RawQueryInput {
            software_costs: Some(LooseNumber::Number(f64::NAN)),
            ..raw("1", "1", "1", "1")
        };
        assert_eq!(input.sanitize(), Err(InputError::NonFinite("software_costs")));
    }

    #[test]
    fn zero_headcount_or_negative_utilization_is_inactive() {
        assert_eq!(raw("0", "100", "100", "50").sanitize(), Ok(Sanitized::Inactive));
        assert_eq!(raw("-3", "100", "100", "50").sanitize(), Ok(Sanitized::Inactive));
        assert_eq!(raw("10", "100", "100", "-1").sanitize(), Ok(Sanitized::Inactive));
    }

    #[test]
    fn inactive_wins_over_negative_costs() {
        assert_eq!(raw("0", "1000", "-5", "50").sanitize(), Ok(Sanitized::Inactive));
        assert_eq!(raw("-1", "-200", "300", "50").sanitize(), Ok(Sanitized::Inactive));
        assert_eq!(
            raw("4", "1000", "-5", "50").sanitize(),
            Err(InputError::Negative("rent"))
        );
    }

    #[test]
    fn negative_costs_are_rejected() {
        assert_eq!(
            raw("10", "-1", "0", "50").sanitize(),
            Err(InputError::Negative("software_costs"))
        );
    }

    #[test]
    fn accepts_json_numbers_and_alias() {
        let input: RawQueryInput = serde_json::from_str(
            r#"{"headcount":12,"software_costs":"20,000","rent":0,"utilization_percentage":88.5}"#,
        )
        .expect("parse");
        let Ok(Sanitized::Active(q)) = input.sanitize() else {
            panic!("expected active query");
        };
        assert_eq!(q.utilization, 88.5);
        assert_eq!(q.software_costs, 20_000.0);
    }
}
