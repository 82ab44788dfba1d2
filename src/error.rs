use crate::data::ElementType;

/// Every failure the library reports to its caller.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unsupported element type tag: {0}")]
    UnsupportedElementType(u32),

    #[error("element type mismatch: fixed is {fixed}, moving is {moving}")]
    ElementTypeMismatch {
        fixed: ElementType,
        moving: ElementType,
    },

    #[error("dimension mismatch: fixed is {fixed:?}, moving is {moving:?}")]
    DimensionMismatch {
        fixed: (usize, usize),
        moving: (usize, usize),
    },

    #[error("transform is not invertible (determinant {determinant})")]
    SingularTransform { determinant: f64 },

    #[error("registration failed: {0}")]
    RegistrationFailed(String),

    #[error("failed to provision working directory: {0}")]
    ResourceProvisioning(#[source] std::io::Error),

    #[error("buffer size mismatch: expected {expected} bytes, got {actual}")]
    BufferSize { expected: usize, actual: usize },

    #[error("null pointer passed for {0}")]
    NullPointer(&'static str),

    #[error("expected {expected} transform parameters, got {actual}")]
    InvalidParameterCount { expected: usize, actual: usize },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn registration(message: impl Into<String>) -> Self {
        Self::RegistrationFailed(message.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
