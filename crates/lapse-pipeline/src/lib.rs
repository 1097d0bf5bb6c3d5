//! `lapse-pipeline`: the capture → upload → retention pipeline and the
//! lifecycle controller that switches it on and off.
//!
//! The scheduled units ([`capture::CaptureTask`], [`retention::RetentionTask`])
//! implement [`lapse_scheduler::JobAction`] and are bound to named jobs by
//! [`lifecycle::LifecycleController`]. Frames come from a [`frame::FrameSource`]
//! and leave through an [`upload::UploadSink`].

pub mod capture;
pub mod cloudinary;
pub mod error;
pub mod frame;
pub mod lifecycle;
pub mod retention;
pub mod staging;
pub mod upload;

pub use capture::CaptureTask;
pub use cloudinary::CloudinarySink;
pub use error::{CaptureError, CycleError, RetentionError, UploadError};
pub use frame::{CommandFrameSource, FrameSource};
pub use lifecycle::{LifecycleController, LifecyclePlan, CAPTURE_JOB, CLEANUP_JOB};
pub use retention::RetentionTask;
pub use staging::{StagedFile, Staging};
pub use upload::{NullSink, UploadSink};

#[cfg(feature = "screen")]
pub use frame::ScreenFrameSource;
