use thiserror::Error;

/// The error returned when a key that must be present in a map is not.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum KeyError {
    #[error("key not found")]
    NotFound,
}
