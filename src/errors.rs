use thiserror::Error;

pub type Result<T> = std::result::Result<T, TrajectoryError>;

#[derive(Error, Debug)]
pub enum TrajectoryError {
    #[error("IO error {0}")]
    IOError(#[from] std::io::Error),

    #[error("JSON error {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("CSV error {0}")]
    CsvError(#[from] csv::Error),

    #[error("record error {0}")]
    RecorderError(#[from] burn::record::RecorderError),

    #[error("config file error {0}")]
    ConfigFileError(#[from] burn::config::ConfigError),

    #[error("invalid configuration {0}")]
    ConfigError(String),

    #[error("shape mismatch {0}")]
    ShapeError(String),

    #[error("parse error {0}")]
    ParseError(String),

    #[error("no checkpoint found in {0}")]
    MissingCheckpoint(String),
}

macro_rules! shape_error {
    ($fmt:literal $(, $arg:expr )* ) => {
        $crate::errors::TrajectoryError::ShapeError( format!( $fmt $(, $arg)* ))
    };
}
pub(crate) use shape_error;

macro_rules! config_error {
    ($fmt:literal $(, $arg:expr )* ) => {
        $crate::errors::TrajectoryError::ConfigError( format!( $fmt $(, $arg)* ))
    };
}
pub(crate) use config_error;

macro_rules! parse_error {
    ($fmt:literal $(, $arg:expr )* ) => {
        $crate::errors::TrajectoryError::ParseError( format!( $fmt $(, $arg)* ))
    };
}
pub(crate) use parse_error;
