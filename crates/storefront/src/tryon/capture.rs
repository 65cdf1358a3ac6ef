//! Camera capture.
//!
//! A [`CaptureDevice`] hands out at most one live [`CaptureStream`]. The
//! try-on session wraps it in an [`ActiveCapture`], which stops the stream
//! when dropped so every exit from camera mode releases the device.

use thiserror::Error;
use tracing::debug;

use super::image::ImagePayload;

/// Errors raised by a capture device.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    #[error("camera permission denied")]
    PermissionDenied,

    #[error("camera unavailable: {0}")]
    Unavailable(String),

    #[error("failed to capture frame: {0}")]
    Frame(String),
}

/// Which camera to request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacingMode {
    User,
    Environment,
}

/// Constraints passed when opening a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureConstraints {
    pub facing: FacingMode,
    pub ideal_width: u32,
    pub ideal_height: u32,
}

impl Default for CaptureConstraints {
    /// Front camera, portrait 3:4.
    fn default() -> Self {
        Self {
            facing: FacingMode::User,
            ideal_width: 1080,
            ideal_height: 1440,
        }
    }
}

/// A live camera stream.
pub trait CaptureStream: Send {
    /// Grab the current frame.
    ///
    /// # Errors
    ///
    /// Returns `CaptureError::Frame` if no frame could be read.
    fn capture_frame(&mut self) -> Result<ImagePayload, CaptureError>;

    /// Stop every track of the stream. Called exactly once.
    fn stop(&mut self);
}

/// Source of camera streams.
pub trait CaptureDevice {
    /// Request a stream.
    ///
    /// # Errors
    ///
    /// Returns an error if permission is denied or no camera is present.
    fn open(&mut self, constraints: &CaptureConstraints)
    -> Result<Box<dyn CaptureStream>, CaptureError>;
}

/// Owned camera stream, stopped on drop.
pub struct ActiveCapture {
    stream: Box<dyn CaptureStream>,
}

impl std::fmt::Debug for ActiveCapture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveCapture").finish_non_exhaustive()
    }
}

impl ActiveCapture {
    /// Open a stream on `device`.
    ///
    /// # Errors
    ///
    /// Propagates the device error.
    pub fn start(
        device: &mut impl CaptureDevice,
        constraints: &CaptureConstraints,
    ) -> Result<Self, CaptureError> {
        let stream = device.open(constraints)?;
        debug!(?constraints, "Camera stream started");
        Ok(Self { stream })
    }

    /// Grab the current frame.
    ///
    /// # Errors
    ///
    /// Returns `CaptureError::Frame` if no frame could be read.
    pub fn capture(&mut self) -> Result<ImagePayload, CaptureError> {
        self.stream.capture_frame()
    }
}

impl Drop for ActiveCapture {
    fn drop(&mut self) {
        self.stream.stop();
        debug!("Camera stream stopped");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// Fake camera tracking how many of its streams are live.
    #[derive(Debug, Clone, Default)]
    pub(crate) struct FakeCamera {
        pub live: Arc<AtomicUsize>,
        pub opened: Arc<AtomicUsize>,
        pub deny: bool,
        pub broken_frames: bool,
    }

    impl FakeCamera {
        pub(crate) fn live_streams(&self) -> usize {
            self.live.load(Ordering::SeqCst)
        }
    }

    struct FakeStream {
        live: Arc<AtomicUsize>,
        broken: bool,
    }

    impl CaptureStream for FakeStream {
        fn capture_frame(&mut self) -> Result<ImagePayload, CaptureError> {
            if self.broken {
                return Err(CaptureError::Frame("no video".to_string()));
            }
            ImagePayload::from_bytes("image/jpeg", b"frame")
                .map_err(|e| CaptureError::Frame(e.to_string()))
        }

        fn stop(&mut self) {
            self.live.fetch_sub(1, Ordering::SeqCst);
        }
    }

    impl CaptureDevice for FakeCamera {
        fn open(
            &mut self,
            _constraints: &CaptureConstraints,
        ) -> Result<Box<dyn CaptureStream>, CaptureError> {
            if self.deny {
                return Err(CaptureError::PermissionDenied);
            }
            self.opened.fetch_add(1, Ordering::SeqCst);
            self.live.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FakeStream {
                live: Arc::clone(&self.live),
                broken: self.broken_frames,
            }))
        }
    }

    #[test]
    fn test_default_constraints() {
        let constraints = CaptureConstraints::default();
        assert_eq!(constraints.facing, FacingMode::User);
        assert_eq!((constraints.ideal_width, constraints.ideal_height), (1080, 1440));
    }

    #[test]
    fn test_drop_stops_stream() {
        let mut camera = FakeCamera::default();
        let mut capture = ActiveCapture::start(&mut camera, &CaptureConstraints::default()).unwrap();
        assert_eq!(camera.live_streams(), 1);

        let frame = capture.capture().unwrap();
        assert_eq!(frame.mime_type, "image/jpeg");

        drop(capture);
        assert_eq!(camera.live_streams(), 0);
    }
}
