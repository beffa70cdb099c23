use thiserror::Error;

/// Error taxonomy of the journey search engine.
///
/// `NotFound` is a normal outcome of a structurally valid query, not a
/// fault. `InternalData` signals an inconsistency in the network model
/// handed over by the construction collaborator and aborts the query.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("invalid settings: {0}")]
    Configuration(String),
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("no connection found")]
    NotFound,
    #[error("inconsistent network data: {0}")]
    InternalData(String),
}

impl Error {
    /// Stable taxonomy code for the wire layer.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Configuration(_) => "CONFIGURATION_ERROR",
            Error::Validation(_) => "REQUEST_VALIDATION_ERROR",
            Error::NotFound => "SEARCH_NOT_FOUND",
            Error::InternalData(_) => "INTERNAL_DATA_ERROR",
        }
    }
}
