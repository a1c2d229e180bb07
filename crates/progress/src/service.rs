//! Progress service - transactional progress updates over storage.

use std::sync::Arc;

use async_trait::async_trait;
use lessonpath_core::{Course, CourseId, LearnerId, LessonId};
use lessonpath_storage::Storage;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::certificate::{CertificateRenderer, CertificateRequest};
use crate::error::{ProgressError, Result};
use crate::report::ProgressReport;
use crate::tracker::{EnrollmentSnapshot, ProgressTracker, QuizResult};

/// Progress service.
#[async_trait]
pub trait ProgressService: Send + Sync {
    /// Validate and store a course definition.
    ///
    /// Re-importing an existing course replaces its structure and keeps
    /// the enrollments already stored for it.
    async fn import_course(&self, course: &Course) -> Result<()>;

    /// Enroll a learner in a course.
    async fn enroll(
        &self,
        course_id: CourseId,
        learner: LearnerId,
        learner_name: &str,
    ) -> Result<EnrollmentSnapshot>;

    /// Mark a lesson completed.
    async fn record_lesson_completion(
        &self,
        course_id: CourseId,
        learner: LearnerId,
        lesson: LessonId,
    ) -> Result<EnrollmentSnapshot>;

    /// Submit quiz answers for a lesson.
    async fn submit_quiz(
        &self,
        course_id: CourseId,
        learner: LearnerId,
        lesson: LessonId,
        answers: &[usize],
    ) -> Result<QuizResult>;

    /// Report a learner's progress.
    async fn course_progress(&self, course_id: CourseId, learner: LearnerId) -> Result<ProgressReport>;
}

/// Configuration for the progress service.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Whether to commit storage after each mutation
    pub auto_commit: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self { auto_commit: true }
    }
}

/// Basic progress service implementation.
///
/// Each mutation loads the course, applies the change and saves it while
/// holding the storage lock, so concurrent updates to one course never
/// overwrite each other.
pub struct BasicProgressService<S: Storage> {
    storage: Arc<Mutex<S>>,
    tracker: ProgressTracker,
    renderer: Option<Arc<dyn CertificateRenderer>>,
    config: ServiceConfig,
}

impl<S: Storage> BasicProgressService<S> {
    /// Create a new progress service.
    pub fn new(storage: S) -> Self {
        Self {
            storage: Arc::new(Mutex::new(storage)),
            tracker: ProgressTracker::new(),
            renderer: None,
            config: ServiceConfig::default(),
        }
    }

    /// Set the certificate renderer.
    pub fn with_renderer(mut self, renderer: Arc<dyn CertificateRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Set the configuration.
    pub fn with_config(mut self, config: ServiceConfig) -> Self {
        self.config = config;
        self
    }

    /// Shared handle to the underlying storage.
    pub fn storage(&self) -> Arc<Mutex<S>> {
        self.storage.clone()
    }

    /// Load, mutate and save one course under the storage lock.
    ///
    /// Nothing is written when `apply` fails or reports no change.
    async fn mutate<T, F>(&self, course_id: CourseId, action: &str, apply: F) -> Result<(T, Course)>
    where
        F: FnOnce(&ProgressTracker, &mut Course) -> Result<(T, bool)> + Send,
        T: Send,
    {
        let mut storage = self.storage.lock().await;
        let mut course = storage
            .load_course(course_id)
            .await?
            .ok_or(ProgressError::CourseNotFound(course_id))?;

        let (out, changed) = apply(&self.tracker, &mut course)?;
        if !changed {
            debug!("{} on course {} changed nothing", action, course_id);
            return Ok((out, course));
        }

        self.persist(&mut *storage, &course, action).await?;
        Ok((out, course))
    }

    /// Save and, with auto-commit, commit one course.
    ///
    /// A failed commit rolls the save back so a certificate issued by the
    /// mutation is issued (and rendered) again on retry.
    async fn persist(&self, storage: &mut S, course: &Course, action: &str) -> Result<()> {
        storage.save_course(course).await?;
        if !self.config.auto_commit {
            return Ok(());
        }

        if let Err(e) = storage.commit(&format!("{} on course {}", action, course.id)).await {
            warn!("Commit failed for course {}: {}", course.id, e);
            if let Err(rollback) = storage.rollback().await {
                warn!("Rollback failed for course {}: {}", course.id, rollback);
            }
            return Err(e.into());
        }
        Ok(())
    }

    /// Hand a newly issued certificate to the renderer.
    async fn deliver_certificate(&self, course: &Course, learner: LearnerId) {
        let Some(renderer) = &self.renderer else {
            return;
        };
        let Some(request) = course
            .enrollment(learner)
            .and_then(|e| CertificateRequest::for_enrollment(course, e))
        else {
            return;
        };

        match renderer.render(&request).await {
            Ok(path) => info!("Certificate for learner {} written to {}", learner, path.display()),
            // Issuance stands even when rendering fails
            Err(e) => warn!("Failed to render certificate for learner {}: {}", learner, e),
        }
    }
}

#[async_trait]
impl<S: Storage + 'static> ProgressService for BasicProgressService<S> {
    async fn import_course(&self, course: &Course) -> Result<()> {
        course.validate()?;

        let mut storage = self.storage.lock().await;
        let mut course = course.clone();
        if let Some(existing) = storage.load_course(course.id).await? {
            let kept = existing.enrollments.len();
            for (learner, enrollment) in existing.enrollments {
                course.enrollments.entry(learner).or_insert(enrollment);
            }
            info!("Re-importing course {} with {} existing enrollment(s)", course.id, kept);
        }

        self.persist(&mut *storage, &course, "Import").await?;
        info!("Imported course {} ({} lessons)", course.id, course.total_lessons());
        Ok(())
    }

    async fn enroll(
        &self,
        course_id: CourseId,
        learner: LearnerId,
        learner_name: &str,
    ) -> Result<EnrollmentSnapshot> {
        let (snapshot, _) = self
            .mutate(course_id, "Enroll", |tracker, course| {
                tracker.enroll(course, learner, learner_name).map(|s| (s, true))
            })
            .await?;
        Ok(snapshot)
    }

    async fn record_lesson_completion(
        &self,
        course_id: CourseId,
        learner: LearnerId,
        lesson: LessonId,
    ) -> Result<EnrollmentSnapshot> {
        let (snapshot, course) = self
            .mutate(course_id, "Complete lesson", |tracker, course| {
                let snapshot = tracker.record_lesson_completion(course, learner, lesson)?;
                let changed = snapshot.changed;
                Ok((snapshot, changed))
            })
            .await?;

        if snapshot.certificate_newly_issued {
            self.deliver_certificate(&course, learner).await;
        }
        Ok(snapshot)
    }

    async fn submit_quiz(
        &self,
        course_id: CourseId,
        learner: LearnerId,
        lesson: LessonId,
        answers: &[usize],
    ) -> Result<QuizResult> {
        let (result, course) = self
            .mutate(course_id, "Submit quiz", |tracker, course| {
                tracker.submit_quiz(course, learner, lesson, answers).map(|r| (r, true))
            })
            .await?;

        if result.snapshot.certificate_newly_issued {
            self.deliver_certificate(&course, learner).await;
        }
        Ok(result)
    }

    async fn course_progress(&self, course_id: CourseId, learner: LearnerId) -> Result<ProgressReport> {
        let course = self
            .storage
            .lock()
            .await
            .load_course(course_id)
            .await?
            .ok_or(ProgressError::CourseNotFound(course_id))?;

        ProgressReport::build(&course, learner)
            .ok_or(ProgressError::NotEnrolled { course: course_id, learner })
    }
}
