use thiserror::Error;

#[derive(Error, Debug)]
pub enum MapSearchError {
    #[error("Query error: {0}")]
    QueryError(#[from] crate::query::QueryError),
    #[error("Coordinate error: {0}")]
    CoordinateError(#[from] crate::observer::CoordinateError),
    #[error("Transport error: {0}")]
    Transport(#[from] mapsearch_transport::TransportError),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("No result at position {0}")]
    NoSuchResult(usize),
    #[error("Init Logging error: {0}")]
    InitLoggingError(#[from] tracing_subscriber::filter::ParseError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, MapSearchError>;
