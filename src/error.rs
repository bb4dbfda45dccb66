use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Input root {0} does not exist or is not a directory")]
    InputRoot(PathBuf),

    #[error("Failed to open archive {archive}: {source}")]
    ArchiveOpen {
        archive: String,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("Failed to extract {member} from {archive}: {source}")]
    MemberExtract {
        archive: String,
        member: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to decode image {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Classifier failed on {path}: {message}")]
    Classify { path: PathBuf, message: String },

    #[error("Failed to copy {src} to {dest}: {source}")]
    Copy {
        src: PathBuf,
        dest: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Audit table error: {0}")]
    Audit(#[from] csv::Error),

    #[error("Run cancelled")]
    Cancelled,
}
