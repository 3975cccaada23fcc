use thiserror::Error;

#[derive(Error, Debug)]
pub enum BattleError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid scenario: {0}")]
    InvalidScenario(String),

    #[error("Unknown unit kind: {0}")]
    UnknownKind(String),

    #[error("Unknown tactic: {0}")]
    UnknownTactic(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BattleError>;
