//! Error taxonomy
//!
//! Every failure here is recoverable by design: config errors fall back to
//! defaults, asset errors fall back to a static frame, update errors are
//! dropped after a log line. `anyhow` wraps these at the binary edge.

use std::path::PathBuf;
use thiserror::Error;

/// Config file could not be read or parsed; callers substitute defaults.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to persist config at {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Animation asset missing or undecodable; callers substitute a static frame.
#[derive(Error, Debug)]
pub enum AssetError {
    #[error("failed to open asset {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode asset {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: png::DecodingError,
    },

    #[error("asset {path} contains no frames")]
    Empty { path: PathBuf },
}

/// Version check failed; callers log at debug and move on.
#[derive(Error, Debug)]
pub enum UpdateError {
    #[error("release feed request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("release feed contained no version tag")]
    NoVersionFound,
}
