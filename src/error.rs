use thiserror::Error;

/// Exit code for input, configuration and I/O problems.
pub const EXIT_INPUT: u8 = 2;
/// Exit code when no usable data remains.
pub const EXIT_NO_DATA: u8 = 3;
/// Exit code for numerical failures.
pub const EXIT_NUMERIC: u8 = 4;

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn input(message: impl Into<String>) -> Self {
        Self::new(EXIT_INPUT, message)
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

/// Typed failures raised by the factor-analysis stage.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    #[error("The combined table is empty: {0}")]
    EmptyInput(String),

    #[error(
        "Invalid number of factors: requested {requested}, but it must be between 1 and {} (fewer than the {columns} retained columns)",
        columns.saturating_sub(1)
    )]
    InvalidFactorCount { requested: usize, columns: usize },

    #[error("Factor analysis failed: {0}")]
    Numerical(String),
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        let exit_code = match err {
            PipelineError::EmptyInput(_) => EXIT_NO_DATA,
            PipelineError::InvalidFactorCount { .. } => EXIT_INPUT,
            PipelineError::Numerical(_) => EXIT_NUMERIC,
        };
        AppError::new(exit_code, err.to_string())
    }
}
