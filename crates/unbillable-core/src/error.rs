use thiserror::Error;

/// Rejection of caller-supplied input. No forecast is attempted.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InputError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("field {field} is not numeric: {value:?}")]
    NotNumeric { field: &'static str, value: String },

    #[error("field {0} must be a finite number")]
    NonFinite(&'static str),

    #[error("field {0} cannot be negative")]
    Negative(&'static str),
}

/// Conditions that stop the regression from producing usable parameters.
/// Both are recovered inside `forecast` and never reach the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegressionError {
    #[error("need at least {required} training rows, got {got}")]
    TooFewRows { required: usize, got: usize },

    #[error("least squares solve was degenerate: {0}")]
    Degenerate(&'static str),
}
