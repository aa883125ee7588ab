use thiserror::Error;

/// Failures surfaced by the engine.
///
/// Shape and type errors are raised synchronously before any backend call;
/// execution failures wrap the backend's own message after the failed call.
/// No operation retries.
#[derive(Error, Debug)]
pub enum Error {
    /// A backend handle could not be opened, or is no longer live.
    #[error("connection failure: {0}")]
    Connection(String),

    /// The query cannot be translated: missing or invalid operation flag.
    #[error("invalid query: {0}")]
    QueryShape(String),

    /// The backend rejected a command; carries the backend's message.
    #[error("execution failed: {0}")]
    Execution(String),

    /// A single-row fetch found zero rows.
    #[error("no {entity} found for {key}")]
    NotFound { entity: String, key: String },

    /// The named type is not registered as an entity.
    #[error("not a registered entity type: {0}")]
    InvalidEntityType(String),
}

pub type Result<T> = std::result::Result<T, Error>;
