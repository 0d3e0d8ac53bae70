use thiserror::Error;

#[derive(Error, Debug)]
pub enum MocoError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("NIfTI error: {0}")]
    Nifti(#[from] nifti::NiftiError),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Registration failed for volume {volume} at iteration {iteration}: {reason}")]
    RegistrationFailed {
        volume: usize,
        iteration: usize,
        reason: String,
    },

    #[error("Singular transform (|det| = {determinant:.3e})")]
    SingularTransform { determinant: f64 },

    #[error("Model fitting failed: {0}")]
    ModelFitting(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Invalid gradient table: {0}")]
    InvalidGradients(String),

    #[error("Volume dimension mismatch: expected {expected:?}, got {actual:?}")]
    DimensionMismatch {
        expected: (usize, usize, usize),
        actual: (usize, usize, usize),
    },

    #[error("Empty volume sequence")]
    EmptySequence,

    #[error("Pipeline error: {0}")]
    Pipeline(String),
}

pub type Result<T> = std::result::Result<T, MocoError>;
