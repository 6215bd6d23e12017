use std::{io, path::PathBuf};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModSyncError {
    #[error("No such file {0:?}")]
    MissingFile(PathBuf),
    #[error(transparent)]
    IoError(#[from] io::Error),
    #[error("{0}")]
    MiscError(String),
    #[error("Error talking to Modrinth: {0}")]
    RequestError(#[from] Box<ureq::Error>),
    #[error("Modrinth returned HTTP {status} for {url}")]
    StatusError { url: String, status: u16 },
    #[error(transparent)]
    ZipError(#[from] zip::result::ZipError),
    #[error("Error parsing JSON: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Error parsing mod metadata: {0}")]
    Json5Error(#[from] json5::Error),
    #[error("'{0}' is not a valid Modrinth slug")]
    InvalidSlug(String),
    #[error("Refusing to write download named '{0}' outside the mods folder")]
    UnsafeFilename(String),
    #[error("{path:?} was already replaced while updating {slug}")]
    AlreadyReplaced { slug: String, path: PathBuf },
    #[error("No instance selected")]
    NoInstance,
    #[error("No such instance '{0}'")]
    UnknownInstance(String),
    #[error("Unable to determine the home directory")]
    NoHomeDir,
    #[error("Attempted to save a file but the path was None")]
    MissingPath,
}

impl From<ureq::Error> for ModSyncError {
    fn from(value: ureq::Error) -> Self {
        Self::RequestError(Box::new(value))
    }
}
