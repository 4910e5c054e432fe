use media_timing::TimingError;
use thiserror::Error;
use tourify_client::ClientError;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Timing(#[from] TimingError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to parse config file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    ConfigWrite(#[from] toml::ser::Error),

    #[error("Progress template error: {0}")]
    Template(#[from] indicatif::style::TemplateError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    InvalidInput(String),

    /// The backend rejected the submitted images.
    #[error("{invalid} image(s) failed validation")]
    Rejected { invalid: usize },

    #[error("Video generation failed: {0}")]
    GenerationFailed(String),

    #[error("Gmail export failed: {0}")]
    ExportFailed(String),

    #[error("{failed} of {total} upload(s) failed")]
    UploadFailed { failed: usize, total: usize },

    #[error("Interrupted")]
    Interrupted,
}

impl CliError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}
