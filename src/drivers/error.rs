use thiserror::Error;

#[derive(Debug, Error)]
pub enum ViewerError {
    #[error("sample rate must be greater than zero")]
    InvalidSampleRate,
    #[error("sample rate mismatch: expected {expected}, got {actual}")]
    SampleRateMismatch { expected: f64, actual: f64 },
    #[error("channel count mismatch: expected {expected}, got {actual}")]
    ChannelMismatch { expected: usize, actual: usize },
    #[error("sample count mismatch: expected {expected}, got {actual}")]
    SampleCountMismatch { expected: usize, actual: usize },
    #[error("buffer duration must be greater than zero, got {0}")]
    InvalidBufferDuration(f64),
    #[error("window duration must be greater than zero, got {0}")]
    NonPositiveWindow(f64),
    #[error("window duration {window}s exceeds buffer duration {buffer}s")]
    WindowTooLong { window: f64, buffer: f64 },
    #[error("amplitude scale must be greater than zero, got {0}")]
    NonPositiveScale(f64),
    #[error("at least one channel must be selected")]
    NoChannelsSelected,
    #[error("channel {0} is selected more than once")]
    DuplicateChannel(usize),
    #[error("channel {channel} out of range (scope has {available} channels)")]
    ChannelOutOfRange { channel: usize, available: usize },
    #[error("invalid annotation label {0:?}: must be non-empty, on one line, without leading or trailing spaces")]
    InvalidLabel(String),
    #[error("tick period must be greater than zero")]
    InvalidTickPeriod,
    #[error("annotation log I/O failed: {0}")]
    Persistence(#[from] std::io::Error),
    #[error("failed to render plot: {0}")]
    Plot(String),
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

impl<E: std::error::Error + Send + Sync + 'static> From<plotters::drawing::DrawingAreaErrorKind<E>>
    for ViewerError
{
    fn from(value: plotters::drawing::DrawingAreaErrorKind<E>) -> Self {
        ViewerError::Plot(format!("{value:?}"))
    }
}

impl From<image::ImageError> for ViewerError {
    fn from(value: image::ImageError) -> Self {
        ViewerError::Plot(value.to_string())
    }
}
