//! Error types for configuration, audio, detection, and action dispatch.
//! Fatal kinds (config, audio start, stream closure) end the run; the rest are
//! logged by the loop and the tick is skipped.

use std::fmt;

#[derive(Debug)]
pub enum ConfigError {
    NonPositive { field: &'static str, value: f64 },
    InvalidUrl { field: &'static str, value: String },
    InvalidEnv { var: &'static str, value: String },
    /// Rounds to a zero `Duration`.
    TooShort { field: &'static str, value: f64 },
    OutOfRange { field: &'static str, value: f64, range: &'static str },
    /// The capture ring cannot hold one frame, so no read would ever complete.
    FrameExceedsBuffer { frame_length: usize, capacity: usize },
    Io(std::io::Error),
    Parse(serde_json::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::NonPositive { field, value } => {
                write!(f, "{field} must be positive, got {value}")
            }
            ConfigError::InvalidUrl { field, value } => {
                write!(f, "{field} is not an http(s)/file URL: {value}")
            }
            ConfigError::InvalidEnv { var, value } => {
                write!(f, "invalid value for {var}: {value:?}")
            }
            ConfigError::TooShort { field, value } => {
                write!(f, "{field} is too short to measure: {value}s")
            }
            ConfigError::OutOfRange {
                field,
                value,
                range,
            } => write!(f, "{field} must be in {range}, got {value}"),
            ConfigError::FrameExceedsBuffer {
                frame_length,
                capacity,
            } => write!(
                f,
                "audio ring buffer holds {capacity} samples, less than one {frame_length}-sample frame"
            ),
            ConfigError::Io(e) => write!(f, "config IO error: {e}"),
            ConfigError::Parse(e) => write!(f, "config parse error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Parse(e)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AudioError {
    NoInputDevice,
    UnsupportedConfig(String),
    StreamBuild(String),
    StreamStart(String),
    NotStarted,
    /// Device was lost; the stream cannot deliver any more frames.
    Closed(String),
    /// Transient backend error reported by the device callback.
    Device(String),
}

impl AudioError {
    /// Whether the loop must stop and release the stream.
    pub fn is_fatal(&self) -> bool {
        matches!(self, AudioError::Closed(_))
    }
}

impl fmt::Display for AudioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudioError::NoInputDevice => write!(f, "no audio input device available"),
            AudioError::UnsupportedConfig(msg) => write!(f, "unsupported input config: {msg}"),
            AudioError::StreamBuild(msg) => write!(f, "failed to build input stream: {msg}"),
            AudioError::StreamStart(msg) => write!(f, "failed to start audio stream: {msg}"),
            AudioError::NotStarted => write!(f, "audio stream not started"),
            AudioError::Closed(msg) => write!(f, "audio stream closed: {msg}"),
            AudioError::Device(msg) => write!(f, "audio device error: {msg}"),
        }
    }
}

impl std::error::Error for AudioError {}

#[derive(Debug, Clone, PartialEq)]
pub enum DetectorError {
    EmptyFrame,
    FrameLength { expected: usize, actual: usize },
    Engine(String),
}

impl fmt::Display for DetectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectorError::EmptyFrame => write!(f, "empty frame"),
            DetectorError::FrameLength { expected, actual } => {
                write!(f, "frame has {actual} samples, expected {expected}")
            }
            DetectorError::Engine(msg) => write!(f, "detector engine failed: {msg}"),
        }
    }
}

impl std::error::Error for DetectorError {}

#[derive(Debug, Clone, PartialEq)]
pub enum DispatchError {
    CommandNotFound(String),
    Spawn { program: String, reason: String },
    InvalidUrl(String),
    Unsupported(String),
    NothingLaunched,
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::CommandNotFound(program) => write!(f, "command not found: {program}"),
            DispatchError::Spawn { program, reason } => {
                write!(f, "failed to launch {program}: {reason}")
            }
            DispatchError::InvalidUrl(url) => write!(f, "invalid URL format: {url}"),
            DispatchError::Unsupported(os) => write!(f, "unsupported OS: {os}"),
            DispatchError::NothingLaunched => write!(f, "no application could be launched"),
        }
    }
}

impl std::error::Error for DispatchError {}

/// Fatal outcome of a controller run.
#[derive(Debug)]
pub enum RunError {
    Config(ConfigError),
    Audio(AudioError),
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunError::Config(e) => write!(f, "configuration error: {e}"),
            RunError::Audio(e) => write!(f, "audio error: {e}"),
        }
    }
}

impl std::error::Error for RunError {}

impl From<ConfigError> for RunError {
    fn from(e: ConfigError) -> Self {
        RunError::Config(e)
    }
}

impl From<AudioError> for RunError {
    fn from(e: AudioError) -> Self {
        RunError::Audio(e)
    }
}
