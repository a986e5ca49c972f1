use crate::exception::{SystemException, UserException};
use thiserror::Error;

/// Local-process error taxonomy for this ORB runtime.
///
/// `CorbaError` is distinct from [`SystemException`]/[`crate::exception::UserException`]: those are
/// wire-visible CORBA concepts, reconstructed from a GIOP Reply. A `SystemException` received over
/// the wire is surfaced here through [`CorbaError::Remote`].
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum CorbaError {
    /// Error occured in communication with the peer.
    #[error(transparent)]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// A CDR buffer ended before a value could be fully decoded.
    #[error("truncated CDR stream: {0}")]
    Truncated(&'static str),

    /// The first octet of an encapsulation was neither 0 nor 1.
    #[error("invalid byte order flag: {0:#x}")]
    InvalidByteOrderFlag(u8),

    /// A stringified IOR did not start with `IOR:` or contained invalid hex.
    #[error("bad IOR format: {0}")]
    BadIorFormat(String),

    /// A remote system exception was returned in a GIOP Reply.
    #[error("remote system exception: {0}")]
    Remote(#[from] SystemException),

    /// A remote user exception was returned in a GIOP Reply.
    #[error("remote user exception: {0}")]
    RemoteUser(#[from] UserException),

    /// A TypeCode operation referenced a kind that does not match the stored descriptor.
    #[error("typecode kind mismatch for {repo_id}")]
    TypeCodeKindMismatch { repo_id: String },

    /// No TypeCode is registered under the given repository id.
    #[error("unknown repository id: {0}")]
    UnknownRepositoryId(String),

    /// An `Any`'s value does not match the shape required by its TypeCode.
    #[error("type mismatch: {0}")]
    TypeMismatch(&'static str),

    /// A naming operation failed because the terminal component was already bound.
    #[error("already bound")]
    AlreadyBound,

    /// A naming operation failed because an intermediate binding was not a context.
    #[error("not a context")]
    NotContext,

    /// A naming operation failed to resolve the given name.
    #[error("name not found: {0}")]
    NotFound(String),

    /// A string name could not be parsed.
    #[error("bad stringified name: {0}")]
    BadName(String),

    /// An event-channel operation was attempted after the channel was destroyed.
    #[error("channel destroyed")]
    ChannelDestroyed,

    /// A proxy was asked to connect a peer while already connected.
    #[error("already connected")]
    AlreadyConnected,

    /// A pull consumer found nothing queued within the poll interval.
    #[error("no events available")]
    NoEvents,

    /// Implementation error local to this process, never sent over the wire.
    #[error("implementation error: {0}")]
    Impl(&'static str),

    /// Caller error local to this process: invalid arguments, terminal-state reuse, etc.
    #[error("usage error: {0}")]
    Usage(&'static str),

    /// `CorbaError::UsageDetailed` variant for runtime-formatted usage errors.
    #[error("usage error: {0}")]
    UsageDetailed(String),

    /// A transaction operation was attempted while the transaction was not in a valid state.
    #[error("transaction inactive")]
    TransactionInactive,

    /// `Terminator::commit` rolled the transaction back instead of committing it.
    #[error("transaction rolled back")]
    TransactionRolledBack,

    /// `Terminator::commit` committed with an uncertain outcome for at least one resource.
    #[error("heuristic hazard")]
    HeuristicHazard,

    /// A deferred request has not yet completed.
    #[error("operation not complete")]
    OperationNotComplete,

    /// A deferred or one-way request has no response to return.
    #[error("no response available")]
    NoResponse,

    /// Error occured in thread synchronization (a lock was poisoned by a panicking holder).
    #[error("poisoned lock")]
    Poison,
}

/// Abbreviation of `Result<T, CorbaError>`.
pub type CorbaResult<T> = std::result::Result<T, CorbaError>;

impl<G> From<std::sync::PoisonError<G>> for CorbaError {
    fn from(_error: std::sync::PoisonError<G>) -> Self {
        Self::Poison
    }
}
