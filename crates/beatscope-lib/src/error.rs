use thiserror::Error;

/// Recording is well formed but not something the pipeline accepts.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("only mono recordings are supported (found {channels} channels)")]
    Channels { channels: u16 },
    #[error("unsupported sampling rate: {rate}Hz")]
    SampleRate { rate: u32 },
}

/// Failure to turn an input stream into a [`crate::WaveformData`].
#[derive(Debug, Error)]
pub enum WaveformError {
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error("failed to parse WAV data: {0}")]
    Parse(String),
}

impl From<hound::Error> for WaveformError {
    fn from(err: hound::Error) -> Self {
        WaveformError::Parse(err.to_string())
    }
}

impl From<std::io::Error> for WaveformError {
    fn from(err: std::io::Error) -> Self {
        WaveformError::Parse(err.to_string())
    }
}

/// External analyzer unavailable or misbehaving. Never surfaced past the pipeline.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("failed to start external analyzer `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("external analyzer I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("external analyzer timed out after {0} ms")]
    Timeout(u64),
    #[error("external analyzer exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
    #[error("malformed external analyzer response: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("external analyzer reported an error: {0}")]
    Reported(String),
    #[error("external analyzer response rejected: {0}")]
    Invalid(String),
}

/// Request-level failure of an analysis.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Waveform(#[from] WaveformError),
    #[error("invalid signal: {0}")]
    InvalidSignal(String),
}

impl AnalysisError {
    /// Client-input problems (bad format or unreadable container).
    pub fn is_client_error(&self) -> bool {
        matches!(self, AnalysisError::Waveform(_))
    }
}
