//! Error types for fingerprint generation

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A profile field is out of its valid range
    #[error("invalid profile: {0}")]
    InvalidProfile(String),

    #[error("unknown profile: {0}")]
    UnknownProfile(String),

    #[error("failed to parse profile: {0}")]
    ProfileParse(#[from] toml::de::Error),

    #[error("profile JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// More classifiers than fit into a 32-bit hash
    #[error("{count} classifiers configured, at most {max} fit into a hash")]
    TooManyClassifiers { count: usize, max: usize },

    #[error("classifier {index} is {width} columns wide, integral image retains {capacity}")]
    FilterTooWide {
        index: usize,
        width: usize,
        capacity: usize,
    },

    #[error("classifier {index} covers rows {start}..{end}, only {bins} chroma bins exist")]
    FilterOutOfRange {
        index: usize,
        start: usize,
        end: usize,
        bins: usize,
    },

    #[error("audio source delivers {actual} Hz, profile expects {expected} Hz")]
    SampleRateMismatch { expected: u32, actual: u32 },

    /// Reading from the audio source failed
    #[error("audio source error: {0}")]
    Source(#[from] std::io::Error),

    /// The subscriber stopped listening
    #[error("fingerprint sink closed")]
    SinkClosed,
}
