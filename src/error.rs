use hickory_resolver::proto::rr::RecordType;
use thiserror::Error;

/// Failure modes of a single upstream resolution.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("upstream exchange failed: {0}")]
    Transport(String),

    #[error("no records found for {0}")]
    NoRecords(String),

    #[error("resolution of {0} records is not implemented")]
    NotImplemented(RecordType),
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueError {
    #[error("request queue is full")]
    Full,

    #[error("request queue is shut down")]
    Closed,
}
