pub mod checksum;
pub mod config;
pub mod error;
pub mod fp;
pub mod types;

pub use checksum::Checksum;
pub use config::{Rules, Scenario, ScenarioConfig};
pub use error::{Rejection, Result, SimError};
pub use fp::FpVector;
