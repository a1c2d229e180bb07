//! LessonPath core data models.
//!
//! This crate defines the course aggregate: course structure (modules,
//! lessons, quizzes) and the enrollments nested inside it.

#![warn(missing_docs)]

// Core identities
mod id;

// Course aggregate
mod course;
mod enrollment;

// Re-exports
pub use id::*;

pub use course::{Course, CourseError, Module, Lesson, Quiz, Question};
pub use enrollment::{Enrollment, EnrollmentStatus, LessonCompletion, CertificateState};

/// Timestamp type
pub type Time = chrono::DateTime<chrono::Utc>;
