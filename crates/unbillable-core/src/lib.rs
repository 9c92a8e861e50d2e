pub mod attribution;
pub mod driver;
pub mod error;
pub mod features;
pub mod forecast;
pub mod guardrails;
pub mod input;
pub mod peers;
pub mod regression;
pub mod simulation;

pub use attribution::*;
pub use driver::Driver;
pub use error::{InputError, RegressionError};
pub use features::*;
pub use forecast::*;
pub use guardrails::*;
pub use input::*;
pub use peers::*;
pub use regression::*;
pub use simulation::*;
