use thiserror::Error;

#[derive(Error, Debug)]
pub enum GeorefError {
    #[error("Search error: {0}")]
    SearchError(#[from] crate::search::SearchError),
    #[error("Planner error: {0}")]
    PlannerError(#[from] crate::planner::PlannerError),
    #[error("Geometry error: {0}")]
    GeometryError(#[from] crate::geometry::GeometryError),
    #[error("Address error: {0}")]
    AddressError(#[from] crate::address::AddressError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Init Logging error: {0}")]
    InitLoggingError(#[from] tracing_subscriber::filter::ParseError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, GeorefError>;
