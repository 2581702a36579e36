use thiserror::Error;

pub type Result<T> = std::result::Result<T, CodegenError>;

#[derive(Error, Debug)]
pub enum CodegenError {
    #[error(transparent)]
    Core(#[from] mech_core::Error),

    #[error("unknown backend `{0}`, expected one of: c, kernkraft")]
    UnknownBackend(String),
}

impl CodegenError {
    pub fn is_internal(&self) -> bool {
        matches!(self, CodegenError::Core(err) if err.is_internal())
    }
}

impl From<CodegenError> for mech_core::Error {
    fn from(err: CodegenError) -> Self {
        match err {
            CodegenError::Core(err) => err,
            other => mech_core::Error::Generic(other.to_string()),
        }
    }
}
