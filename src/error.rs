use thiserror::Error;

/// Every way the delegate can fail past the support probe.
///
/// The probe itself (see [`crate::probe`]) never constructs one of these: it collapses every
/// rejection reason to `false` and logs the reason at `trace` level instead, since the host-facing
/// probe contract is a plain boolean.
#[derive(Debug, Error)]
pub enum DelegateError {
    #[error("unsupported op kind: {0}")]
    UnsupportedOp(String),

    #[error("unsupported element type for tensor {tensor}: {ty:?}")]
    UnsupportedType { tensor: usize, ty: String },

    #[error("unsupported rank {rank} for tensor {tensor}")]
    UnsupportedRank { tensor: usize, rank: usize },

    #[error("unsupported attribute on op {op}: {detail}")]
    UnsupportedAttribute { op: String, detail: String },

    #[error("no producer registered for source tensor {0}")]
    MissingProducer(usize),

    #[error("source tensor {0} already has a registered producer")]
    DuplicateProducer(usize),

    #[error("op {0} produces more than one output, which this builder does not support")]
    MultipleOutputsUnsupported(String),

    #[error("target library failed to compile the model: {0}")]
    TargetCompileError(String),

    #[error("no cached artifact for token {0}")]
    CacheMiss(String),

    #[error("failed to read cached artifact at {path}: {source}")]
    CacheReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write cached artifact at {path}: {source}")]
    CacheWriteError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("no suitable device available (wanted one of: {0})")]
    DeviceUnavailable(String),

    #[error("inference timed out after {0:?}")]
    InferTimeout(std::time::Duration),

    #[error("inference failed: {0}")]
    InferError(String),

    #[error("eval() called while a previous eval() is still in flight")]
    Busy,
}
