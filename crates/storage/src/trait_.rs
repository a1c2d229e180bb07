//! Storage trait abstraction.

use async_trait::async_trait;
use lessonpath_core::{Course, CourseId};

/// Error type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Item not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Storage abstraction for course aggregates.
///
/// A course is loaded and saved as a whole, enrollments included. Saves
/// and deletes are staged until [`Storage::commit`]; loads through the same
/// storage see staged changes.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Save a course (create or update).
    async fn save_course(&mut self, course: &Course) -> Result<()>;

    /// Load a course by ID.
    async fn load_course(&self, id: CourseId) -> Result<Option<Course>>;

    /// List all courses.
    async fn list_courses(&self) -> Result<Vec<Course>>;

    /// Delete a course.
    async fn delete_course(&mut self, id: CourseId) -> Result<()>;

    /// Make staged changes durable.
    async fn commit(&mut self, message: &str) -> Result<()>;

    /// Discard staged changes, restoring the last committed state.
    async fn rollback(&mut self) -> Result<()>;
}
