use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SurveyError {
    #[error("failed to read image directory {}: {source}", path.display())]
    ScanDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write results file {}: {source}", path.display())]
    WriteResults {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode results: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("{0}")]
    Ranking(#[from] RankingIssue),

    #[error("no images found for any round")]
    NoImages,

    #[error("the survey is already complete")]
    AlreadyComplete,
}

/// Reasons a round cannot be advanced yet. The messages are shown to the evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RankingIssue {
    #[error("Click every image to set the order! ({ranked} of {expected} ranked)")]
    Incomplete { ranked: usize, expected: usize },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value {value:?} for {key}: expected {expected}")]
    Invalid {
        key: &'static str,
        value: String,
        expected: &'static str,
    },
}
