use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use super::device::{DeviceError, DeviceProvider, VideoDevice};

/// Minimal JPEG start/end markers around a frame counter
const SOI: [u8; 2] = [0xFF, 0xD8];
const EOI: [u8; 2] = [0xFF, 0xD9];

/// Observations shared between a mock provider, its cameras and a test.
#[derive(Debug, Clone, Default)]
pub struct MockCameraStats {
    acquisitions: Arc<AtomicUsize>,
    releases: Arc<AtomicUsize>,
    grabs: Arc<Mutex<Vec<(u32, u32, Instant)>>>,
}

impl MockCameraStats {
    pub fn acquisitions(&self) -> usize {
        self.acquisitions.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    /// Every grab as `(width, height, when)`, in order
    pub fn grabs(&self) -> Vec<(u32, u32, Instant)> {
        self.grabs.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

/// Synthetic camera producing tiny JPEG-framed payloads.
pub struct MockCamera {
    dimensions: Option<(u32, u32)>,
    stats: MockCameraStats,
    released: bool,
}

impl MockCamera {
    pub fn new(dimensions: Option<(u32, u32)>, stats: MockCameraStats) -> Self {
        Self {
            dimensions,
            stats,
            released: false,
        }
    }
}

#[async_trait]
impl VideoDevice for MockCamera {
    fn dimensions(&self) -> Option<(u32, u32)> {
        self.dimensions
    }

    async fn grab(&mut self, width: u32, height: u32) -> Result<Vec<u8>, DeviceError> {
        if self.released {
            return Err(DeviceError::Grab("track stopped".to_string()));
        }
        let mut grabs = self.stats.grabs.lock().unwrap_or_else(|e| e.into_inner());
        grabs.push((width, height, Instant::now()));

        let mut data = SOI.to_vec();
        data.extend_from_slice(&(grabs.len() as u32).to_be_bytes());
        data.extend_from_slice(&EOI);
        Ok(data)
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.stats.releases.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Provider handing out [`MockCamera`]s, or failing the way a browser does
/// when permission is denied or no camera exists.
pub struct MockCameraProvider {
    outcome: Result<Option<(u32, u32)>, DeviceError>,
    acquire_delay: Duration,
    stats: MockCameraStats,
}

impl MockCameraProvider {
    /// A working camera with the given native resolution
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            outcome: Ok(Some((width, height))),
            acquire_delay: Duration::ZERO,
            stats: MockCameraStats::default(),
        }
    }

    /// A camera that never reports its dimensions
    pub fn without_dimensions() -> Self {
        Self {
            outcome: Ok(None),
            ..Self::new(0, 0)
        }
    }

    pub fn failing(error: DeviceError) -> Self {
        Self {
            outcome: Err(error),
            ..Self::new(0, 0)
        }
    }

    /// Simulate a slow permission prompt
    pub fn with_acquire_delay(mut self, delay: Duration) -> Self {
        self.acquire_delay = delay;
        self
    }

    pub fn stats(&self) -> MockCameraStats {
        self.stats.clone()
    }
}

#[async_trait]
impl DeviceProvider for MockCameraProvider {
    async fn acquire_default(&self) -> Result<Box<dyn VideoDevice>, DeviceError> {
        if !self.acquire_delay.is_zero() {
            tokio::time::sleep(self.acquire_delay).await;
        }
        let dimensions = self.outcome.clone()?;
        self.stats.acquisitions.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockCamera::new(dimensions, self.stats.clone())))
    }
}
