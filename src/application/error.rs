use thiserror::Error;

use crate::{application::render::RenderError, config::LoadError, infra::error::InfraError};

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] LoadError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("diagram not cached")]
    NotFound,
}

impl AppError {
    /// Process exit code reported by the binary.
    pub fn exit_status(&self) -> u8 {
        match self {
            AppError::NotFound => 1,
            AppError::Render(RenderError::EmptySource) => 2,
            AppError::Config(_) => 3,
            AppError::Render(_) => 4,
            AppError::Infra(_) => 70,
        }
    }

    /// Whether the failure deserves an error log. A miss on `get` is an
    /// answer, not a failure; the exit status alone reports it.
    pub fn is_reportable(&self) -> bool {
        !matches!(self, AppError::NotFound)
    }
}
