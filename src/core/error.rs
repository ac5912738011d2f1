use thiserror::Error;

#[derive(Error, Debug)]
pub enum MusterError {
    #[error("Unknown unit type: {0}")]
    UnknownUnitType(crate::core::types::UnitTypeId),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Equilibrium search failed: {0}")]
    Equilibrium(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, MusterError>;
