//! Error types for rendering and model serialization

use thiserror::Error;

use crate::backend::BackendError;

/// Errors raised while building or submitting draws
///
/// Configuration and precondition errors are fatal for the current render
/// call; nothing here is retried.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("no vertex mapping provider can map this mesh to effect `{effect}`")]
    NoVertexMapping { effect: String },
    #[error("unknown default effect `{name}`")]
    UnknownDefaultEffect { name: String },
    #[error("index buffer accessed before load_buffers")]
    IndexBufferNotLoaded,
    #[error("mesh has no vertices or indices; it only carries hierarchy")]
    EmptyMesh,
    #[error("effect `{effect}` has no parameter `{parameter}`")]
    MissingParameter { effect: String, parameter: String },
    #[error("{bones} bones exceed the effect's bone array of {capacity}")]
    TooManyBones { bones: usize, capacity: usize },
    #[error("vertex mapping produced a {found} vertex for a {expected} buffer")]
    VertexKindMismatch {
        expected: &'static str,
        found: &'static str,
    },
    #[error("asset `{name}` is not ready")]
    AssetNotReady { name: String },
    #[error("render target stack is empty")]
    RenderTargetStackUnderflow,
    #[error("effect stack is empty")]
    EffectStackUnderflow,
    #[error("invalid renderer state: expected {expected}, found {found}")]
    InvalidState {
        expected: &'static str,
        found: &'static str,
    },
    #[error(transparent)]
    Backend(#[from] BackendError),
}

pub type RenderResult<T> = Result<T, RenderError>;

/// Errors raised by the binary model codec
#[derive(Error, Debug)]
pub enum SerializeError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed string: {0}")]
    InvalidString(String),
    #[error("negative element count {0}")]
    NegativeCount(i32),
    #[error("negative vertex index {0}")]
    NegativeIndex(i32),
    #[error("element count {0} does not fit in 32 bits")]
    CountOverflow(usize),
    #[error("vertex index {0} does not fit in 32 bits")]
    IndexOverflow(u32),
    #[error("model has no root bone; this format requires a bone hierarchy")]
    MissingSkeleton,
    #[error("model has no meshes")]
    NoMeshes,
    #[error("{0} unread bytes after the model")]
    TrailingBytes(usize),
}

pub type SerializeResult<T> = Result<T, SerializeError>;
