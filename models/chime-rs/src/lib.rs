pub mod config;
pub mod disposition;
pub mod error;
pub mod model;
pub mod parameters;
pub mod presentation;
pub mod regions;
pub mod run;
pub mod sir;

pub use disposition::{Category, Disposition, Dispositions};
pub use error::{ChimeError, ConfigurationError};
pub use model::{AdmissionsRow, CensusRow, Reconciliation, SimSirModel, SirRow};
pub use parameters::{ParameterInputs, Parameters};
