//! Error Handling Module
//!
//! Defines the error type shared by the dataset index, classifier, trainer and
//! soil analysis. Uses thiserror for ergonomic error definitions.

use thiserror::Error;

/// Main error type for GreenThumb operations
#[derive(Error, Debug)]
pub enum GreenThumbError {
    /// Image could not be opened, decoded or converted
    #[error("Failed to decode image: {0}")]
    Decode(String),

    /// Training or validation requested on a dataset without samples
    #[error("Dataset is empty. Please upload training images first.")]
    EmptyDataset,

    /// Checkpoint missing, unreadable, or built for another architecture
    #[error("Failed to load model: {0}")]
    Load(String),

    /// Invalid crop/severity label or invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// Image rejected by size or format validation
    #[error("Invalid image: {0}")]
    InvalidImage(String),

    /// Failure inside a training run
    #[error("Training error: {0}")]
    Training(String),

    /// Model output could not be read back from the backend
    #[error("Inference error: {0}")]
    Inference(String),

    /// A training run is already in flight
    #[error("Busy: {0}")]
    Busy(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Convenience Result type for GreenThumb operations
pub type Result<T> = std::result::Result<T, GreenThumbError>;

impl From<image::ImageError> for GreenThumbError {
    fn from(err: image::ImageError) -> Self {
        GreenThumbError::Decode(err.to_string())
    }
}

impl From<serde_json::Error> for GreenThumbError {
    fn from(err: serde_json::Error) -> Self {
        GreenThumbError::Serialization(err.to_string())
    }
}

impl GreenThumbError {
    /// Whether the error was caused by the caller's input rather than the service
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            GreenThumbError::Decode(_)
                | GreenThumbError::Config(_)
                | GreenThumbError::InvalidImage(_)
                | GreenThumbError::EmptyDataset
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GreenThumbError::Config("unknown crop 'kale'".to_string());
        assert_eq!(format!("{}", err), "Configuration error: unknown crop 'kale'");
    }

    #[test]
    fn test_empty_dataset_message() {
        let err = GreenThumbError::EmptyDataset;
        assert!(err.to_string().contains("empty"));
        assert!(err.is_client_error());
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: GreenThumbError = io.into();
        assert!(matches!(err, GreenThumbError::Io(_)));
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_json_conversion() {
        let parse: std::result::Result<u32, _> = serde_json::from_str::<u32>("not json");
        let err: GreenThumbError = parse.unwrap_err().into();
        assert!(matches!(err, GreenThumbError::Serialization(_)));
    }
}
