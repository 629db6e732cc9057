//! Dispatch errors.
//!
//! Every variant is a configuration or device problem surfaced to the
//! caller as-is; nothing here is retried.

use thiserror::Error;

use super::types::Uint3;
use crate::gpu::BackendError;

#[derive(Debug, Error)]
pub enum DispatchError {
    /// Entry ordinal outside the registered range.
    #[error("no entry point with ordinal {ordinal} ({count} registered)")]
    InvalidKernel { ordinal: usize, count: usize },

    /// Slot not declared by the kernel, or declared but not bound.
    #[error("entry point `{entry}`: slot `{slot}` {reason}")]
    UnknownSlot {
        entry: String,
        slot: String,
        reason: &'static str,
    },

    /// Resource kind or element type doesn't match the slot declaration.
    #[error("slot `{slot}` expects {expected}, got {found}")]
    FieldTypeMismatch {
        slot: String,
        expected: String,
        found: String,
    },

    #[error("no hardware backend attached")]
    NoBackend,

    /// The compiled kernel orders its entry points differently from the
    /// registration. A configuration bug, not recoverable.
    #[error(
        "entry point `{name}` is registered as ordinal {ordinal} but the {backend} backend reports {backend_index:?}"
    )]
    KernelIndexMismatch {
        name: String,
        ordinal: usize,
        backend: &'static str,
        backend_index: Option<usize>,
    },

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("dispatcher has no source path; attach one with `with_source`")]
    SourceUnknown,

    #[error("dispatch grid of `{entry}` overflows: extent {extent} x groups {groups}")]
    GridOverflow {
        entry: String,
        extent: Uint3,
        groups: Uint3,
    },

    #[error("failed to start worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("entry point `{0}` registered twice")]
    DuplicateEntry(String),

    #[error("slot `{0}` registered twice")]
    DuplicateSlot(String),

    #[error("entry point `{entry}` has a zero thread-group extent {extent}")]
    ZeroExtent { entry: String, extent: Uint3 },
}
