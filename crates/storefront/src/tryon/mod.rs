//! Virtual try-on.
//!
//! A [`TryOnSession`] walks the shopper through picking a photo of
//! themselves (upload, camera or model preset), sends it with the product's
//! photo to an [`ImageSynthesizer`], and shows the result. The session's
//! state is held as plain fields; [`TryOnSession::phase`] derives where in
//! the flow it stands:
//!
//! ```text
//! idle -> acquiring(upload|camera|preset) -> ready -> synthesizing -> result | failed
//! ```
//!
//! [`TryOnDialog`] owns at most one session. Closing the dialog destroys the
//! session; a synthesis reply that arrives afterwards is discarded.

mod capture;
mod image;
mod synthesis;

use std::collections::VecDeque;
use std::sync::Arc;

use luxe_core::Product;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::cart::{AddOutcome, CartStore, SnapshotStore};

pub use capture::{
    ActiveCapture, CaptureConstraints, CaptureDevice, CaptureError, CaptureStream, FacingMode,
};
pub use image::{ImageError, ImagePayload, ImageSource};
pub use synthesis::{
    DEFAULT_TRYON_MODEL, GEMINI_API_BASE, GeminiSynthesizer, ImageSynthesizer, SynthesisError,
    SynthesisRequest, build_instruction,
};

/// Status text shown when an attempt fails.
pub const FAILURE_MESSAGE: &str = "Error in processing. Please try again.";

/// Number of recent photos remembered per session.
pub const MAX_RECENT_PHOTOS: usize = 5;

/// Errors from try-on operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TryOnError {
    #[error("a synthesis is already in progress")]
    Busy,

    #[error("no source photo selected")]
    NoSourceImage,

    #[error("product has no reference image")]
    NoProductImage,

    #[error("no try-on result to act on")]
    NoResult,

    #[error("camera is not active")]
    CameraInactive,

    #[error("unknown model preset: {0}")]
    UnknownPreset(String),

    #[error("no recent photo at index {0}")]
    UnknownRecent(usize),

    #[error("try-on dialog is closed")]
    NotOpen,

    #[error(transparent)]
    Capture(#[from] CaptureError),
}

/// How the shopper is currently picking a photo.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AcquisitionMode {
    #[default]
    Idle,
    Upload,
    Camera,
    Preset,
}

/// Progress stages reported while synthesizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStep {
    AnalyzingBody,
    SimulatingDrape,
    SynchronizingLighting,
}

impl ProcessStep {
    pub const ALL: [Self; 3] = [
        Self::AnalyzingBody,
        Self::SimulatingDrape,
        Self::SynchronizingLighting,
    ];

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::AnalyzingBody => "Analyzing body geometry...",
            Self::SimulatingDrape => "Simulating fabric drape...",
            Self::SynchronizingLighting => "Synchronizing lighting...",
        }
    }
}

/// Synthesis status.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ProcessingStatus {
    #[default]
    Idle,
    InProgress(ProcessStep),
    Failed(String),
}

/// Where a session stands in the try-on flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TryOnPhase {
    Idle,
    Acquiring(AcquisitionMode),
    Ready,
    Synthesizing,
    Result,
    Failed,
}

/// A curated model photo the shopper can use instead of their own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelPreset {
    pub id: String,
    pub label: String,
    pub url: String,
}

impl ModelPreset {
    fn new(id: &str, label: &str, url: &str) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            url: url.to_string(),
        }
    }
}

/// Built-in model presets.
#[must_use]
pub fn default_presets() -> Vec<ModelPreset> {
    vec![
        ModelPreset::new(
            "m1",
            "Classic",
            "https://images.unsplash.com/photo-1515886657613-9f3515b0c78f?q=80&w=800&auto=format&fit=crop",
        ),
        ModelPreset::new(
            "m2",
            "Elegant",
            "https://images.unsplash.com/photo-1539109136881-3be0616acf4b?q=80&w=800&auto=format&fit=crop",
        ),
        ModelPreset::new(
            "m3",
            "Minimalist",
            "https://images.unsplash.com/photo-1529139574466-a303027c1d8b?q=80&w=800&auto=format&fit=crop",
        ),
    ]
}

/// Proof that a synthesis was started, needed to apply its result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisTicket {
    session_id: Uuid,
    request: SynthesisRequest,
}

impl SynthesisTicket {
    #[must_use]
    pub const fn session_id(&self) -> Uuid {
        self.session_id
    }

    #[must_use]
    pub const fn request(&self) -> &SynthesisRequest {
        &self.request
    }
}

/// What became of a synthesis reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The reply updated the session.
    Applied,
    /// The session it belonged to is gone or moved on.
    Discarded,
}

/// One try-on flow for one product.
#[derive(Debug)]
pub struct TryOnSession {
    id: Uuid,
    product: Arc<Product>,
    mode: AcquisitionMode,
    source: Option<ImageSource>,
    result: Option<ImagePayload>,
    status: ProcessingStatus,
    capture: Option<ActiveCapture>,
    recent: VecDeque<ImageSource>,
    presets: Vec<ModelPreset>,
}

impl TryOnSession {
    #[must_use]
    pub fn new(product: Arc<Product>) -> Self {
        Self::with_presets(product, default_presets())
    }

    #[must_use]
    pub fn with_presets(product: Arc<Product>, presets: Vec<ModelPreset>) -> Self {
        Self {
            id: Uuid::new_v4(),
            product,
            mode: AcquisitionMode::Idle,
            source: None,
            result: None,
            status: ProcessingStatus::Idle,
            capture: None,
            recent: VecDeque::with_capacity(MAX_RECENT_PHOTOS),
            presets,
        }
    }

    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub fn product(&self) -> &Product {
        &self.product
    }

    #[must_use]
    pub const fn mode(&self) -> AcquisitionMode {
        self.mode
    }

    #[must_use]
    pub const fn source(&self) -> Option<&ImageSource> {
        self.source.as_ref()
    }

    #[must_use]
    pub const fn result(&self) -> Option<&ImagePayload> {
        self.result.as_ref()
    }

    #[must_use]
    pub const fn status(&self) -> &ProcessingStatus {
        &self.status
    }

    /// Human-readable status line, if any.
    #[must_use]
    pub fn status_text(&self) -> Option<&str> {
        match &self.status {
            ProcessingStatus::Idle => None,
            ProcessingStatus::InProgress(step) => Some(step.label()),
            ProcessingStatus::Failed(message) => Some(message),
        }
    }

    /// Recent photos, newest first.
    pub fn recent_photos(&self) -> impl Iterator<Item = &ImageSource> {
        self.recent.iter()
    }

    #[must_use]
    pub fn presets(&self) -> &[ModelPreset] {
        &self.presets
    }

    #[must_use]
    pub const fn is_camera_active(&self) -> bool {
        self.capture.is_some()
    }

    #[must_use]
    pub const fn is_synthesizing(&self) -> bool {
        matches!(self.status, ProcessingStatus::InProgress(_))
    }

    #[must_use]
    pub const fn phase(&self) -> TryOnPhase {
        if self.is_synthesizing() {
            return TryOnPhase::Synthesizing;
        }
        if !matches!(self.mode, AcquisitionMode::Idle) {
            return TryOnPhase::Acquiring(self.mode);
        }
        if self.result.is_some() {
            return TryOnPhase::Result;
        }
        if matches!(self.status, ProcessingStatus::Failed(_)) {
            return TryOnPhase::Failed;
        }
        if self.source.is_some() {
            TryOnPhase::Ready
        } else {
            TryOnPhase::Idle
        }
    }

    fn ensure_idle(&self) -> Result<(), TryOnError> {
        if self.is_synthesizing() {
            Err(TryOnError::Busy)
        } else {
            Ok(())
        }
    }

    fn enter_mode(&mut self, mode: AcquisitionMode) -> Result<(), TryOnError> {
        self.ensure_idle()?;
        if mode != AcquisitionMode::Camera {
            self.capture = None;
        }
        self.mode = mode;
        debug!(session = %self.id, ?mode, "Acquisition mode changed");
        Ok(())
    }

    /// Make `source` the current photo and leave acquisition.
    fn accept_source(&mut self, source: ImageSource) {
        self.capture = None;
        self.mode = AcquisitionMode::Idle;
        self.result = None;
        self.status = ProcessingStatus::Idle;
        if let Some(pos) = self.recent.iter().position(|r| r == &source) {
            self.recent.remove(pos);
        }
        self.recent.push_front(source.clone());
        self.recent.truncate(MAX_RECENT_PHOTOS);
        self.source = Some(source);
    }

    /// Show the upload picker.
    ///
    /// # Errors
    ///
    /// Returns `TryOnError::Busy` while synthesizing.
    pub fn begin_upload(&mut self) -> Result<(), TryOnError> {
        self.enter_mode(AcquisitionMode::Upload)
    }

    /// Accept an uploaded photo.
    ///
    /// # Errors
    ///
    /// Returns `TryOnError::Busy` while synthesizing.
    pub fn submit_upload(&mut self, photo: ImagePayload) -> Result<(), TryOnError> {
        self.ensure_idle()?;
        self.accept_source(ImageSource::Inline(photo));
        Ok(())
    }

    /// Switch to camera mode and start the stream.
    ///
    /// Returns `false` if the camera could not be opened; the flow is then
    /// back on the idle menu. Calling it with a stream already live keeps
    /// that stream.
    ///
    /// # Errors
    ///
    /// Returns `TryOnError::Busy` while synthesizing.
    pub fn start_camera(&mut self, device: &mut impl CaptureDevice) -> Result<bool, TryOnError> {
        self.ensure_idle()?;
        if self.capture.is_some() {
            return Ok(true);
        }
        match ActiveCapture::start(device, &CaptureConstraints::default()) {
            Ok(capture) => {
                self.capture = Some(capture);
                self.mode = AcquisitionMode::Camera;
                Ok(true)
            }
            Err(e) => {
                warn!(session = %self.id, error = %e, "Camera unavailable");
                self.mode = AcquisitionMode::Idle;
                Ok(false)
            }
        }
    }

    /// Take the current camera frame as the source photo and stop the camera.
    ///
    /// A frame error keeps the camera running so the shopper can try again.
    ///
    /// # Errors
    ///
    /// Returns `TryOnError::CameraInactive` without a live stream, or the
    /// capture error.
    pub fn capture_photo(&mut self) -> Result<(), TryOnError> {
        self.ensure_idle()?;
        let capture = self.capture.as_mut().ok_or(TryOnError::CameraInactive)?;
        let frame = capture.capture()?;
        self.accept_source(ImageSource::Inline(frame));
        Ok(())
    }

    /// Show the model presets.
    ///
    /// # Errors
    ///
    /// Returns `TryOnError::Busy` while synthesizing.
    pub fn begin_presets(&mut self) -> Result<(), TryOnError> {
        self.enter_mode(AcquisitionMode::Preset)
    }

    /// Use a model preset as the source photo.
    ///
    /// # Errors
    ///
    /// Returns `TryOnError::UnknownPreset` if no preset has that id.
    pub fn choose_preset(&mut self, id: &str) -> Result<(), TryOnError> {
        self.ensure_idle()?;
        let preset = self
            .presets
            .iter()
            .find(|p| p.id == id)
            .ok_or_else(|| TryOnError::UnknownPreset(id.to_string()))?;
        let source = ImageSource::Remote(preset.url.clone());
        self.accept_source(source);
        Ok(())
    }

    /// Reuse a recent photo (0 is newest).
    ///
    /// # Errors
    ///
    /// Returns `TryOnError::UnknownRecent` if the index is out of range.
    pub fn use_recent(&mut self, index: usize) -> Result<(), TryOnError> {
        self.ensure_idle()?;
        let source = self
            .recent
            .get(index)
            .cloned()
            .ok_or(TryOnError::UnknownRecent(index))?;
        self.accept_source(source);
        Ok(())
    }

    /// Back out of any acquisition mode, stopping the camera.
    pub fn cancel_acquisition(&mut self) {
        self.capture = None;
        self.mode = AcquisitionMode::Idle;
    }

    /// Begin a synthesis attempt for the current photo.
    ///
    /// The caller sends [`SynthesisTicket::request`] to the synthesizer and
    /// hands the reply back through [`TryOnSession::complete_synthesis`].
    ///
    /// # Errors
    ///
    /// Returns an error if already synthesizing, no photo is selected, or
    /// the product has no image.
    pub fn start_synthesis(&mut self) -> Result<SynthesisTicket, TryOnError> {
        self.ensure_idle()?;
        let user_image = self.source.clone().ok_or(TryOnError::NoSourceImage)?;
        let garment = self
            .product
            .primary_image()
            .map(str::to_string)
            .ok_or(TryOnError::NoProductImage)?;

        self.cancel_acquisition();
        self.result = None;
        self.status = ProcessingStatus::InProgress(ProcessStep::AnalyzingBody);
        info!(session = %self.id, product = %self.product.id, "Try-on synthesis started");

        Ok(SynthesisTicket {
            session_id: self.id,
            request: SynthesisRequest {
                user_image,
                garment_image: ImageSource::Remote(garment),
                instruction: build_instruction(&self.product),
            },
        })
    }

    /// Advance the progress label of an in-flight attempt.
    pub fn report_progress(&mut self, ticket: &SynthesisTicket, step: ProcessStep) {
        if ticket.session_id == self.id && self.is_synthesizing() {
            self.status = ProcessingStatus::InProgress(step);
        }
    }

    /// Apply the synthesizer's reply.
    pub fn complete_synthesis(
        &mut self,
        ticket: &SynthesisTicket,
        outcome: Result<ImagePayload, SynthesisError>,
    ) -> Completion {
        if ticket.session_id != self.id || !self.is_synthesizing() {
            debug!(session = %self.id, "Discarding stale synthesis reply");
            return Completion::Discarded;
        }
        match outcome {
            Ok(image) => {
                info!(session = %self.id, "Try-on synthesis finished");
                self.result = Some(image);
                self.status = ProcessingStatus::Idle;
            }
            Err(e) => {
                error!(session = %self.id, error = %e, "Try-on synthesis failed");
                self.status = ProcessingStatus::Failed(FAILURE_MESSAGE.to_string());
            }
        }
        Completion::Applied
    }

    /// Drop the result and return to the selected photo.
    ///
    /// # Errors
    ///
    /// Returns `TryOnError::NoResult` if there is nothing to discard.
    pub fn discard_result(&mut self) -> Result<(), TryOnError> {
        self.result.take().map(|_| ()).ok_or(TryOnError::NoResult)
    }

    /// Put the tried-on product (not the generated image) in the cart.
    ///
    /// # Errors
    ///
    /// Returns `TryOnError::NoResult` unless a result is showing.
    pub fn add_look_to_cart<S: SnapshotStore>(
        &self,
        cart: &mut CartStore<S>,
    ) -> Result<AddOutcome, TryOnError> {
        if self.result.is_none() {
            return Err(TryOnError::NoResult);
        }
        Ok(cart.add(Arc::clone(&self.product)))
    }
}

/// The try-on overlay; holds the session while it is open.
#[derive(Debug, Default)]
pub struct TryOnDialog {
    session: Option<TryOnSession>,
}

impl TryOnDialog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open for `product`, replacing any previous session.
    pub fn open(&mut self, product: Arc<Product>) -> &mut TryOnSession {
        debug!(product = %product.id, "Opening try-on");
        self.session.insert(TryOnSession::new(product))
    }

    /// Close and destroy the session, releasing the camera.
    pub fn close(&mut self) {
        if let Some(session) = self.session.take() {
            debug!(session = %session.id(), "Closing try-on");
        }
    }

    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.session.is_some()
    }

    #[must_use]
    pub const fn session(&self) -> Option<&TryOnSession> {
        self.session.as_ref()
    }

    pub const fn session_mut(&mut self) -> Option<&mut TryOnSession> {
        self.session.as_mut()
    }

    /// Route a synthesis reply to the session that asked for it.
    pub fn complete(
        &mut self,
        ticket: &SynthesisTicket,
        outcome: Result<ImagePayload, SynthesisError>,
    ) -> Completion {
        match self.session.as_mut() {
            Some(session) if session.id() == ticket.session_id => {
                session.complete_synthesis(ticket, outcome)
            }
            _ => {
                debug!(session = %ticket.session_id, "Try-on closed, dropping reply");
                Completion::Discarded
            }
        }
    }

    /// Run one synthesis attempt for the open session.
    ///
    /// # Errors
    ///
    /// Returns an error if the dialog is closed or the attempt cannot start.
    pub async fn run(&mut self, synthesizer: &impl ImageSynthesizer) -> Result<Completion, TryOnError> {
        let ticket = self
            .session
            .as_mut()
            .ok_or(TryOnError::NotOpen)?
            .start_synthesis()?;
        let outcome = synthesizer.synthesize(ticket.request()).await;
        Ok(self.complete(&ticket, outcome))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::capture::tests::FakeCamera;
    use super::*;
    use crate::cart::MemoryStore;
    use crate::catalog::tests::product;
    use luxe_core::Category;

    fn session() -> TryOnSession {
        TryOnSession::new(Arc::new(product("gown", Category::Clothing, 2450)))
    }

    fn photo(tag: &str) -> ImagePayload {
        ImagePayload::from_bytes("image/jpeg", tag.as_bytes()).unwrap()
    }

    fn ready_session() -> TryOnSession {
        let mut s = session();
        s.submit_upload(photo("me")).unwrap();
        s
    }

    struct CannedSynthesizer(Result<&'static str, u16>);

    impl ImageSynthesizer for CannedSynthesizer {
        async fn synthesize(
            &self,
            _request: &SynthesisRequest,
        ) -> Result<ImagePayload, SynthesisError> {
            match self.0 {
                Ok(tag) => Ok(photo(tag)),
                Err(status) => Err(SynthesisError::Api {
                    status,
                    message: "quota".to_string(),
                }),
            }
        }
    }

    #[test]
    fn test_phase_walk() {
        let mut s = session();
        assert_eq!(s.phase(), TryOnPhase::Idle);

        s.begin_upload().unwrap();
        assert_eq!(s.phase(), TryOnPhase::Acquiring(AcquisitionMode::Upload));

        s.submit_upload(photo("me")).unwrap();
        assert_eq!(s.phase(), TryOnPhase::Ready);

        let ticket = s.start_synthesis().unwrap();
        assert_eq!(s.phase(), TryOnPhase::Synthesizing);
        assert_eq!(s.status_text(), Some("Analyzing body geometry..."));

        s.report_progress(&ticket, ProcessStep::SynchronizingLighting);
        assert_eq!(s.status_text(), Some("Synchronizing lighting..."));

        assert_eq!(s.complete_synthesis(&ticket, Ok(photo("look"))), Completion::Applied);
        assert_eq!(s.phase(), TryOnPhase::Result);

        s.discard_result().unwrap();
        assert_eq!(s.phase(), TryOnPhase::Ready);
    }

    #[test]
    fn test_request_carries_both_images() {
        let mut s = ready_session();
        let ticket = s.start_synthesis().unwrap();
        let request = ticket.request();

        assert_eq!(request.user_image, ImageSource::Inline(photo("me")));
        assert_eq!(
            request.garment_image,
            ImageSource::Remote("https://img.example/gown.jpg".to_string())
        );
        assert!(request.instruction.contains("Product gown"));
    }

    #[test]
    fn test_start_synthesis_stops_open_camera() {
        let mut camera = FakeCamera::default();
        let mut s = ready_session();
        assert!(s.start_camera(&mut camera).unwrap());
        assert_eq!(camera.live_streams(), 1);

        let ticket = s.start_synthesis().unwrap();
        assert_eq!(camera.live_streams(), 0);
        assert_eq!(s.phase(), TryOnPhase::Synthesizing);
        assert_eq!(
            ticket.request().garment_image,
            ImageSource::Remote("https://img.example/gown.jpg".to_string())
        );
    }

    #[test]
    fn test_second_synthesis_rejected_while_in_flight() {
        let mut s = ready_session();
        let _ticket = s.start_synthesis().unwrap();
        assert_eq!(s.start_synthesis(), Err(TryOnError::Busy));
        assert_eq!(s.begin_upload(), Err(TryOnError::Busy));
    }

    #[test]
    fn test_failure_sets_message_and_allows_retry() {
        let mut s = ready_session();
        let ticket = s.start_synthesis().unwrap();
        s.complete_synthesis(&ticket, Err(SynthesisError::NoImage));

        assert_eq!(s.phase(), TryOnPhase::Failed);
        assert_eq!(s.status_text(), Some(FAILURE_MESSAGE));
        assert!(s.source().is_some());

        assert!(s.start_synthesis().is_ok());
    }

    #[test]
    fn test_synthesis_requires_photo() {
        let mut s = session();
        assert_eq!(s.start_synthesis(), Err(TryOnError::NoSourceImage));

        let mut bare = product("bare", Category::Bags, 10);
        bare.images.clear();
        let mut s = TryOnSession::new(Arc::new(bare));
        s.submit_upload(photo("me")).unwrap();
        assert_eq!(s.start_synthesis(), Err(TryOnError::NoProductImage));
    }

    #[test]
    fn test_camera_capture_releases_stream() {
        let mut camera = FakeCamera::default();
        let mut s = session();

        assert!(s.start_camera(&mut camera).unwrap());
        assert!(s.start_camera(&mut camera).unwrap());
        assert_eq!(camera.live_streams(), 1);
        assert_eq!(s.phase(), TryOnPhase::Acquiring(AcquisitionMode::Camera));

        s.capture_photo().unwrap();
        assert_eq!(camera.live_streams(), 0);
        assert_eq!(s.phase(), TryOnPhase::Ready);
        assert!(!s.is_camera_active());
    }

    #[test]
    fn test_camera_released_on_cancel_mode_change_and_drop() {
        let mut camera = FakeCamera::default();
        let mut s = session();

        s.start_camera(&mut camera).unwrap();
        s.cancel_acquisition();
        assert_eq!(camera.live_streams(), 0);

        s.start_camera(&mut camera).unwrap();
        s.begin_presets().unwrap();
        assert_eq!(camera.live_streams(), 0);

        s.start_camera(&mut camera).unwrap();
        drop(s);
        assert_eq!(camera.live_streams(), 0);
    }

    #[test]
    fn test_camera_denied_returns_to_menu() {
        let mut camera = FakeCamera {
            deny: true,
            ..FakeCamera::default()
        };
        let mut s = session();

        assert!(!s.start_camera(&mut camera).unwrap());
        assert_eq!(s.phase(), TryOnPhase::Idle);
        assert!(!s.is_camera_active());
    }

    #[test]
    fn test_frame_error_keeps_camera() {
        let mut camera = FakeCamera {
            broken_frames: true,
            ..FakeCamera::default()
        };
        let mut s = session();
        s.start_camera(&mut camera).unwrap();

        assert!(matches!(s.capture_photo(), Err(TryOnError::Capture(_))));
        assert!(s.is_camera_active());
        assert_eq!(camera.live_streams(), 1);
    }

    #[test]
    fn test_capture_without_camera() {
        let mut s = session();
        assert_eq!(s.capture_photo(), Err(TryOnError::CameraInactive));
    }

    #[test]
    fn test_presets_and_recent_photos() {
        let mut s = session();
        assert_eq!(s.presets().len(), 3);

        s.begin_presets().unwrap();
        s.choose_preset("m2").unwrap();
        assert!(matches!(s.source(), Some(ImageSource::Remote(url)) if url.contains("unsplash")));
        assert_eq!(
            s.choose_preset("m9"),
            Err(TryOnError::UnknownPreset("m9".to_string()))
        );

        for i in 0..6 {
            s.submit_upload(photo(&format!("p{i}"))).unwrap();
        }
        let recent: Vec<_> = s.recent_photos().cloned().collect();
        assert_eq!(recent.len(), MAX_RECENT_PHOTOS);
        assert_eq!(recent[0], ImageSource::Inline(photo("p5")));

        s.use_recent(3).unwrap();
        assert_eq!(s.source(), Some(&ImageSource::Inline(photo("p2"))));
        assert_eq!(
            s.recent_photos().next(),
            Some(&ImageSource::Inline(photo("p2")))
        );
        assert_eq!(s.use_recent(9), Err(TryOnError::UnknownRecent(9)));
    }

    #[test]
    fn test_add_look_adds_product() {
        let mut cart = CartStore::open(MemoryStore::new(), "cart");
        let mut s = ready_session();
        assert_eq!(s.add_look_to_cart(&mut cart), Err(TryOnError::NoResult));

        let ticket = s.start_synthesis().unwrap();
        s.complete_synthesis(&ticket, Ok(photo("look")));
        assert_eq!(s.add_look_to_cart(&mut cart), Ok(AddOutcome::Appended));

        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.lines()[0].id().as_str(), "gown");
    }

    #[test]
    fn test_reply_after_close_is_discarded() {
        let mut dialog = TryOnDialog::new();
        let gown = Arc::new(product("gown", Category::Clothing, 2450));
        dialog.open(Arc::clone(&gown)).submit_upload(photo("me")).unwrap();
        let ticket = dialog.session_mut().unwrap().start_synthesis().unwrap();

        dialog.close();
        assert_eq!(dialog.complete(&ticket, Ok(photo("look"))), Completion::Discarded);
        assert!(!dialog.is_open());

        dialog.open(gown);
        assert_eq!(dialog.complete(&ticket, Ok(photo("look"))), Completion::Discarded);
        assert_eq!(dialog.session().unwrap().phase(), TryOnPhase::Idle);
    }

    #[test]
    fn test_dialog_close_releases_camera() {
        let mut camera = FakeCamera::default();
        let mut dialog = TryOnDialog::new();
        dialog
            .open(Arc::new(product("gown", Category::Clothing, 2450)))
            .start_camera(&mut camera)
            .unwrap();
        assert_eq!(camera.live_streams(), 1);

        dialog.close();
        assert_eq!(camera.live_streams(), 0);
    }

    #[tokio::test]
    async fn test_dialog_run() {
        let mut dialog = TryOnDialog::new();
        assert_eq!(
            dialog.run(&CannedSynthesizer(Ok("look"))).await,
            Err(TryOnError::NotOpen)
        );

        dialog
            .open(Arc::new(product("gown", Category::Clothing, 2450)))
            .submit_upload(photo("me"))
            .unwrap();

        let completion = dialog.run(&CannedSynthesizer(Err(503))).await.unwrap();
        assert_eq!(completion, Completion::Applied);
        assert_eq!(dialog.session().unwrap().phase(), TryOnPhase::Failed);

        dialog.run(&CannedSynthesizer(Ok("look"))).await.unwrap();
        assert_eq!(
            dialog.session().unwrap().result(),
            Some(&photo("look"))
        );
    }
}
