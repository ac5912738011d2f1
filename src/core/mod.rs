pub mod config;
pub mod error;
pub mod types;

pub use config::{load_config, RecruitConfig};
pub use error::{MusterError, Result};
pub use types::{Gold, Score, SideId, UnitId, UnitTypeId};
