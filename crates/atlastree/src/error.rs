use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum AtlasTreeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    #[error("Watch error: {0}")]
    Watch(String),
}

pub type Result<T> = std::result::Result<T, AtlasTreeError>;
