use thiserror::Error;

/// Canonical brook error taxonomy used across crates.
///
/// Classification guidance:
/// - [`BrookError::Plan`]: malformed operator trees or parameters discovered
///   while compiling a plan
/// - [`BrookError::Parse`]: malformed JSON where a value was required
/// - [`BrookError::Execution`]: runtime operator evaluation or data-shape
///   failures after compilation succeeded
/// - [`BrookError::Io`]: raw filesystem IO failures, typically from spill
///   files
/// - [`BrookError::Resource`]: pool allocation failures
/// - [`BrookError::Cancelled`]: injected by a consumer to stop the pipeline
/// - [`BrookError::Unsupported`]: valid plans using behavior this engine
///   intentionally does not implement
///
/// Type mismatches inside expressions are not errors: expressions yield
/// MISSING instead, matching SQL-for-JSON semantics.
#[derive(Debug, Error)]
pub enum BrookError {
    /// Invalid operator tree shape or parameter list.
    ///
    /// Examples:
    /// - wrong number of children for an operator kind
    /// - a parameter that is not the expected JSON shape
    /// - an expression array with an unknown head
    #[error("plan error: {0}")]
    Plan(String),

    /// Malformed JSON in a place where a parseable value was required.
    #[error("parse error: {0}")]
    Parse(String),

    /// Runtime execution failures after plan compilation succeeded.
    ///
    /// Examples:
    /// - a temp slot holding the wrong state kind
    /// - corrupt encoded records in a container
    #[error("execution error: {0}")]
    Execution(String),

    /// Transparent std IO failures (spill file open/read/write).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Pool allocation failed.
    #[error("resource error: {0}")]
    Resource(String),

    /// Externally injected cancellation; the pipeline stops producing.
    #[error("cancelled: {0}")]
    Cancelled(String),

    /// Valid request for behavior outside this engine's scope.
    ///
    /// Examples:
    /// - an operator kind with no registered external dispatch
    /// - a scan source kind the core does not recognize
    #[error("unsupported: {0}")]
    Unsupported(String),
}

/// Standard brook result alias.
pub type Result<T> = std::result::Result<T, BrookError>;
