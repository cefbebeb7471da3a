use thiserror::Error;

/// Errors surfaced while building a scene graph.
#[derive(Debug, Error)]
pub enum SceneError {
    #[error("structure '{0}' not found in library")]
    StructureNotFound(String),

    #[error("library contains no structures")]
    EmptyLibrary,
}
