use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("Camera permission denied")]
    PermissionDenied,

    #[error("No video input device found")]
    NotFound,

    #[error("Camera is in use by another application")]
    InUse,

    #[error("Frame grab failed: {0}")]
    Grab(String),
}

/// An exclusively held video input.
#[async_trait]
pub trait VideoDevice: Send {
    /// Native resolution of the live stream, once the device reports it
    fn dimensions(&self) -> Option<(u32, u32)>;

    /// Draw the current video frame at `width` x `height` and return it as
    /// a compressed still.
    async fn grab(&mut self, width: u32, height: u32) -> Result<Vec<u8>, DeviceError>;

    /// Stop every track of the stream.
    fn release(&mut self);
}

/// Source of the default video input.
#[async_trait]
pub trait DeviceProvider: Send + Sync {
    /// Request exclusive access. May wait on a user permission prompt.
    async fn acquire_default(&self) -> Result<Box<dyn VideoDevice>, DeviceError>;
}
