use thiserror::Error;

/// Domain errors raised by the resource managers.
///
/// Transport and I/O failures are not listed here: they propagate as
/// [`anyhow::Error`] with context. Callers that need to branch on one of these
/// variants can `downcast_ref::<Error>()` the returned error.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("configuration error: `{field}` cannot be empty")]
    Config { field: &'static str },

    #[error("refusing to delete objects with an empty prefix")]
    EmptyPrefix,

    #[error("object storage requires an explicit resource name")]
    MissingName,

    #[error("invalid put parameter: {key}")]
    InvalidParameter { key: String },
}

impl Error {
    pub(crate) fn config(field: &'static str) -> Self {
        Error::Config { field }
    }
}

/// Fails with [`Error::Config`] when `value` is missing or blank.
pub(crate) fn require<'a>(field: &'static str, value: Option<&'a str>) -> Result<&'a str, Error> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(Error::config(field)),
    }
}
