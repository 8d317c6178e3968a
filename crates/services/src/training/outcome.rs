use crate::error::PersistenceError;

/// What happened to the remote half of a mutation.
#[derive(Debug)]
pub enum RemoteWrite {
    Saved,
    /// Nothing to send, or no remote counterpart yet.
    Skipped,
    /// The write failed; the local change stands.
    Failed(PersistenceError),
}

impl RemoteWrite {
    #[must_use]
    pub fn is_saved(&self) -> bool {
        matches!(self, RemoteWrite::Saved)
    }

    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, RemoteWrite::Failed(_))
    }

    #[must_use]
    pub fn error(&self) -> Option<&PersistenceError> {
        match self {
            RemoteWrite::Failed(err) => Some(err),
            _ => None,
        }
    }
}

/// A mutation that was applied locally, plus the fate of its remote write.
#[derive(Debug)]
#[must_use]
pub struct Applied<T> {
    pub value: T,
    pub remote: RemoteWrite,
}

impl<T> Applied<T> {
    pub(crate) fn local(value: T) -> Self {
        Self {
            value,
            remote: RemoteWrite::Skipped,
        }
    }

    pub(crate) fn with_remote(value: T, remote: RemoteWrite) -> Self {
        Self { value, remote }
    }
}
