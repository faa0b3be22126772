use assembly_guide_core::{CalibrationError, RectifyError};

/// A catalog lookup that found nothing.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DataNotFound {
    #[error("preset {0:?} has no steps")]
    Preset(String),
    #[error("grid layout {0:?} not found")]
    GridLayout(String),
    #[error("image {0:?} not found")]
    Image(String),
}

#[derive(thiserror::Error, Debug)]
pub enum CatalogError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(thiserror::Error, Debug)]
pub enum CursorError {
    #[error("cursor store io: {0}")]
    Io(#[from] std::io::Error),
    #[error("cursor json: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Errors that abort a running session.
#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    DataNotFound(#[from] DataNotFound),
    #[error("step {index} of preset {preset:?} is invalid: {reason}")]
    InvalidStep {
        preset: String,
        index: usize,
        reason: &'static str,
    },
    #[error(transparent)]
    Calibration(#[from] CalibrationError),
    #[error(transparent)]
    Rectify(#[from] RectifyError),
    #[error(transparent)]
    Cursor(#[from] CursorError),
}

/// The capture source went away or changed shape.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("capture lost: {0}")]
    CaptureLost(String),
    #[error("frame size changed from {expected_w}x{expected_h} to {got_w}x{got_h}")]
    FrameSizeChanged {
        expected_w: usize,
        expected_h: usize,
        got_w: usize,
        got_h: usize,
    },
}

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("detection worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}
