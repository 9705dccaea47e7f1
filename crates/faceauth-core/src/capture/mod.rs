//! Camera lifecycle and the multi-frame capture protocol.
//!
//! A capture-capable view owns one `CaptureController`. The controller
//! acquires the default video input through a `DeviceProvider`, grabs a fixed
//! number of spaced frames per trigger, and releases the device when the view
//! goes away. Frames are compressed stills, sent to the authenticator as data
//! URLs.

mod controller;
mod device;
mod frame;
mod mock;

pub use controller::{
    CaptureConfig, CaptureController, CaptureError, CaptureSession, CaptureState, FRAMES_PER_CAPTURE, MIN_FRAME_INTERVAL,
};
pub use device::{DeviceError, DeviceProvider, VideoDevice};
pub use frame::{encode_frames, Frame};
pub use mock::{MockCamera, MockCameraProvider, MockCameraStats};
