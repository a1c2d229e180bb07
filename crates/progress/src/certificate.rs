//! Certificate eligibility and rendering hand-off.
//!
//! Eligibility is a pure check over the course aggregate: every lesson
//! completed, and every completed lesson that owns a quiz carrying a
//! passing score. The check reports *why* a learner is not eligible as a
//! list of blockers; an empty list means the certificate may be issued.

use std::path::PathBuf;

use async_trait::async_trait;
use lessonpath_core::{Course, CourseId, Enrollment, LearnerId, LessonId, Time};
use serde::Serialize;
use tokio::fs;

use crate::tracker::CourseIndex;

/// Something preventing certificate issuance.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CertificateBlocker {
    /// Learner is not enrolled
    NotEnrolled,
    /// Not every lesson is completed
    Incomplete {
        /// Completed lessons
        completed: usize,
        /// Lessons in the course
        total: usize,
    },
    /// Lesson has a quiz but no score was recorded
    QuizNotTaken {
        /// The lesson
        lesson: LessonId,
    },
    /// Recorded score is under the passing threshold
    QuizBelowPassing {
        /// The lesson
        lesson: LessonId,
        /// Recorded score
        score: f64,
        /// Required score
        passing_score: f64,
    },
    /// Completion refers to a lesson the course no longer has
    DataInconsistency {
        /// The missing lesson
        lesson: LessonId,
    },
}

impl CertificateBlocker {
    /// Human-readable description.
    pub fn describe(&self) -> String {
        match self {
            CertificateBlocker::NotEnrolled => "not enrolled".to_string(),
            CertificateBlocker::Incomplete { completed, total } => {
                format!("{} of {} lessons completed", completed, total)
            }
            CertificateBlocker::QuizNotTaken { lesson } => {
                format!("quiz for lesson {} not taken", lesson)
            }
            CertificateBlocker::QuizBelowPassing { lesson, score, passing_score } => {
                format!("quiz for lesson {} scored {:.1}, needs {:.1}", lesson, score, passing_score)
            }
            CertificateBlocker::DataInconsistency { lesson } => {
                format!("completion for unknown lesson {}", lesson)
            }
        }
    }
}

/// Collect every blocker for an enrollment.
pub(crate) fn blockers(
    course: &Course,
    index: &CourseIndex,
    enrollment: &Enrollment,
) -> Vec<CertificateBlocker> {
    let mut blockers = Vec::new();

    let completed = index.completed_count(enrollment);
    let total = index.total_lessons();
    if total == 0 || completed < total {
        blockers.push(CertificateBlocker::Incomplete { completed, total });
    }

    for (lesson_id, completion) in &enrollment.completions {
        // Fail closed when the completion points at nothing
        let Some(lesson) = index.lesson(course, *lesson_id) else {
            blockers.push(CertificateBlocker::DataInconsistency { lesson: *lesson_id });
            continue;
        };
        let Some(quiz) = &lesson.quiz else {
            continue;
        };
        match completion.quiz_score {
            None => blockers.push(CertificateBlocker::QuizNotTaken { lesson: *lesson_id }),
            Some(score) if !quiz.passes(score) => {
                blockers.push(CertificateBlocker::QuizBelowPassing {
                    lesson: *lesson_id,
                    score,
                    passing_score: quiz.passing_score,
                })
            }
            Some(_) => {}
        }
    }

    blockers
}

/// What a renderer needs to produce a certificate.
#[derive(Debug, Clone, Serialize)]
pub struct CertificateRequest {
    /// Course
    pub course_id: CourseId,
    /// Learner
    pub learner_id: LearnerId,
    /// Name printed on the certificate
    pub learner_name: String,
    /// Course title printed on the certificate
    pub course_title: String,
    /// Issuance date
    pub issued_at: Time,
}

impl CertificateRequest {
    /// Build a request for an enrollment whose certificate is issued.
    pub fn for_enrollment(course: &Course, enrollment: &Enrollment) -> Option<Self> {
        let issued_at = enrollment.certificate.issued_at()?;
        Some(Self {
            course_id: course.id,
            learner_id: enrollment.learner,
            learner_name: enrollment.learner_name.clone(),
            course_title: course.title.clone(),
            issued_at,
        })
    }
}

/// Errors while rendering a certificate.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Turns an issued certificate into a downloadable artifact.
#[async_trait]
pub trait CertificateRenderer: Send + Sync {
    /// Render the certificate and return where it was written.
    async fn render(&self, request: &CertificateRequest) -> Result<PathBuf, RenderError>;
}

/// Writes plain-text certificates to a directory.
#[derive(Debug, Clone)]
pub struct TextCertificateRenderer {
    dir: PathBuf,
}

impl TextCertificateRenderer {
    /// Create a renderer writing into `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path a certificate for this course and learner is written to.
    pub fn path_for(&self, course_id: CourseId, learner_id: LearnerId) -> PathBuf {
        self.dir.join(format!("{}-{}.txt", course_id, learner_id))
    }
}

#[async_trait]
impl CertificateRenderer for TextCertificateRenderer {
    async fn render(&self, request: &CertificateRequest) -> Result<PathBuf, RenderError> {
        fs::create_dir_all(&self.dir).await?;

        let body = format!(
            "Certificate of Completion\n\n\
             This is to certify that\n\n\
             {}\n\n\
             has successfully completed the course\n\n\
             {}\n\n\
             Issued on: {}\n",
            request.learner_name,
            request.course_title,
            request.issued_at.format("%Y-%m-%d"),
        );

        let path = self.path_for(request.course_id, request.learner_id);
        fs::write(&path, body.as_bytes()).await?;
        tracing::debug!("Wrote certificate to {}", path.display());
        Ok(path)
    }
}
