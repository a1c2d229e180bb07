//! Progress Tracking
//!
//! Lesson completion, quiz scoring, and one-time certificate issuance for
//! learners enrolled in a course.

#![warn(missing_docs)]

pub mod error;
pub mod tracker;
pub mod certificate;
pub mod report;
pub mod service;

pub use error::{ProgressError, Result};
pub use tracker::{ProgressTracker, CourseIndex, LessonLocation, EnrollmentSnapshot, QuizResult};
pub use certificate::{
    CertificateBlocker, CertificateRenderer, CertificateRequest, RenderError, TextCertificateRenderer,
};
pub use report::{ProgressReport, ModuleReport, LessonReport};
pub use service::{ProgressService, BasicProgressService, ServiceConfig};
