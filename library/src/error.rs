use thiserror::Error;

use crate::plugin::PluginCategory;

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Plugin error: {0}")]
    Plugin(String),
    #[error("Pipeline error: {0}")]
    Pipeline(String),
    #[error("Missing prerequisite: {0}")]
    MissingPrerequisite(String),
    #[error("Module '{0}' is already in the further-transformation list and is not repeatable")]
    DuplicateModule(String),
    #[error("No {0} stage with the requested id")]
    StageNotFound(PluginCategory),
    #[error("Attachment '{0}' already exists")]
    AttachmentNameConflict(String),
    #[error("Attachment '{0}' not found")]
    AttachmentNotFound(String),
    #[error("Attachment '{0}' is still referenced by {1}")]
    AttachmentInUse(String, String),
    #[error("Transform error: {0}")]
    Transform(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}
