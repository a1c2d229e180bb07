//! Progress errors.

use lessonpath_core::{CourseError, CourseId, LearnerId, LessonId};
use lessonpath_storage::StorageError;

/// Result type for progress operations.
pub type Result<T> = std::result::Result<T, ProgressError>;

/// Recoverable failures reported to the caller.
#[derive(Debug, thiserror::Error)]
pub enum ProgressError {
    /// Learner has no enrollment on the course
    #[error("Learner {learner} is not enrolled in course {course}")]
    NotEnrolled {
        /// Course
        course: CourseId,
        /// Learner
        learner: LearnerId,
    },

    /// Lesson is not part of any module of the course
    #[error("Lesson not found: {0}")]
    LessonNotFound(LessonId),

    /// Lesson exists but has no quiz
    #[error("No quiz found for lesson {0}")]
    NoQuizForLesson(LessonId),

    /// Learner is already enrolled
    #[error("Learner {learner} is already enrolled in course {course}")]
    AlreadyEnrolled {
        /// Course
        course: CourseId,
        /// Learner
        learner: LearnerId,
    },

    /// Course does not exist in storage
    #[error("Course not found: {0}")]
    CourseNotFound(CourseId),

    /// Course definition is malformed
    #[error("Invalid course: {0}")]
    InvalidCourse(#[from] CourseError),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl ProgressError {
    /// HTTP status an API layer should answer with.
    pub fn http_status(&self) -> u16 {
        match self {
            ProgressError::NotEnrolled { .. } => 403,
            ProgressError::LessonNotFound(_) | ProgressError::CourseNotFound(_) => 404,
            ProgressError::NoQuizForLesson(_) => 400,
            ProgressError::AlreadyEnrolled { .. } => 409,
            ProgressError::InvalidCourse(_) => 422,
            ProgressError::Storage(_) => 500,
        }
    }
}
