// Behavioral error classes referenced by the Capture Worker (§7).
//
// "Access lost" and "wait timeout" are first-class variants here rather than
// generic anyhow failures, so the worker can dispatch on them directly
// instead of string-matching an exception message.

use std::fmt;

/// Outcome of a single frame-acquisition attempt against a duplication session.
pub enum AcquisitionError {
    /// The session produced no new frame within its wait timeout.
    Timeout,
    /// The duplication session was invalidated (desktop switch, secure
    /// attention sequence, resolution change) and must be rebuilt.
    AccessLost,
    /// Any other failure; treated the same as `AccessLost` for re-init
    /// purposes but logged with its full context.
    Other(anyhow::Error),
}

impl fmt::Debug for AcquisitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "Timeout"),
            Self::AccessLost => write!(f, "AccessLost"),
            Self::Other(e) => write!(f, "Other({e:#})"),
        }
    }
}

impl fmt::Display for AcquisitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "acquisition timed out"),
            Self::AccessLost => write!(f, "duplication session access lost"),
            Self::Other(e) => write!(f, "acquisition failed: {e:#}"),
        }
    }
}

impl std::error::Error for AcquisitionError {}

impl From<anyhow::Error> for AcquisitionError {
    fn from(e: anyhow::Error) -> Self {
        Self::Other(e)
    }
}
