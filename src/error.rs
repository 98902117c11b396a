//! Error type shared by every scene component.
//!
//! Each [`SceneError`] carries a [`Severity`]. Fatal errors abort scene
//! initialisation (or the event loop); recoverable ones are logged and the
//! current frame is skipped or retried.

use std::path::PathBuf;

/// How the caller is expected to react to a [`SceneError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Fatal,
    Recoverable,
}

#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    #[error("could not read asset {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not decode image {path:?}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("could not parse mesh {path:?}: {reason}")]
    Mesh { path: PathBuf, reason: String },
    #[error("shader `{label}` failed to compile: {message}")]
    ShaderCompile { label: String, message: String },
    #[error("could not create `{label}`: {reason}")]
    ResourceCreation { label: String, reason: String },
    #[error("invalid geometry for `{label}`: {reason}")]
    InvalidGeometry { label: String, reason: String },
    #[error("surface unavailable: {0}")]
    Surface(String),
    #[error("shader `{label}` ran out of draw slots ({capacity} per frame)")]
    DrawBudget { label: String, capacity: u32 },
    #[error("model `{label}` has no bindings for this shader")]
    Unprepared { label: String },
}

impl SceneError {
    pub fn severity(&self) -> Severity {
        match self {
            SceneError::Surface(_) | SceneError::DrawBudget { .. } | SceneError::Unprepared { .. } => {
                Severity::Recoverable
            }
            _ => Severity::Fatal,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }

    pub(crate) fn creation(label: impl Into<String>, reason: impl ToString) -> Self {
        SceneError::ResourceCreation {
            label: label.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn geometry(label: impl Into<String>, reason: impl ToString) -> Self {
        SceneError::InvalidGeometry {
            label: label.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SceneError>;
