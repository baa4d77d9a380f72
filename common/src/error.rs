use std::time::Duration;

use thiserror::Error;

/// Recoverable input errors. These are handled at the capture boundary (the
/// prompt loop re-asks); they never propagate past input capture.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("input must not be empty")]
    Empty,

    #[error("`{0}` is not a whole number")]
    NotANumber(String),

    #[error("{got} is outside the allowed range [{min}, {max}]")]
    OutOfRange { min: u32, max: u32, got: i64 },

    #[error("not a recognized SSH public key (expected e.g. `ssh-ed25519 AAAA... user@host`)")]
    InvalidKey,

    #[error("answer y or n")]
    InvalidChoice,

    #[error("`{0}` does not look like a URL (expected scheme://host)")]
    InvalidUrl(String),

    #[error("`{0}` is not a full VM folder path (expected /<datacenter>/vm/<folder>)")]
    InvalidPath(String),

    #[error("`{0}` is not a valid selection")]
    InvalidSelection(String),
}

/// Fatal errors. Every variant aborts the run; the message names what failed
/// and what the operator can do about it.
#[derive(Debug, Error)]
pub enum DeployError {
    #[error("{what} is missing. {remedy}")]
    PrerequisiteMissing { what: String, remedy: String },

    #[error("{step} failed for {resource}: {detail}")]
    Remote {
        resource: String,
        step: String,
        detail: String,
    },

    #[error("timed out after {waited:?} waiting for {what}")]
    Timeout { what: String, waited: Duration },
}
