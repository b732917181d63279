use thiserror::Error;

use crate::{
    application::render::{HighlightError, RenderError},
    config::LoadError,
    infra::error::InfraError,
};

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Config(#[from] LoadError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Highlight(#[from] HighlightError),
    #[error("validation failed: {0}")]
    Validation(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Process exit code for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::Config(_) | AppError::Validation(_) => 2,
            AppError::Infra(InfraError::Input { .. }) => 2,
            AppError::Infra(_) | AppError::Render(_) | AppError::Highlight(_) => 1,
        }
    }
}
