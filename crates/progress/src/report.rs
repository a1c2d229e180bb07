//! Per-lesson progress report for one learner.

use lessonpath_core::{
    CertificateState, Course, CourseId, EnrollmentStatus, LearnerId, LessonId, ModuleId, Time,
};
use serde::Serialize;

use crate::certificate::CertificateBlocker;
use crate::tracker::ProgressTracker;

/// A learner's progress through a course.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressReport {
    /// Course
    pub course_id: CourseId,
    /// Course title
    pub course_title: String,
    /// Learner
    pub learner: LearnerId,
    /// Stored overall percentage
    pub overall: f64,
    /// Active or completed
    pub status: EnrollmentStatus,
    /// When the course was completed
    pub completed_at: Option<Time>,
    /// Module of the lesson last worked on
    pub current_module: Option<ModuleId>,
    /// Lesson last worked on
    pub current_lesson: Option<LessonId>,
    /// Last completion or quiz submission
    pub last_accessed_at: Option<Time>,
    /// Modules in course order
    pub modules: Vec<ModuleReport>,
    /// Certificate state
    pub certificate: CertificateState,
    /// Why the certificate is not issuable yet (empty when eligible)
    pub blockers: Vec<CertificateBlocker>,
}

/// Progress through one module.
#[derive(Debug, Clone, Serialize)]
pub struct ModuleReport {
    /// Module title
    pub title: String,
    /// Lessons in module order
    pub lessons: Vec<LessonReport>,
}

/// Progress on one lesson.
#[derive(Debug, Clone, Serialize)]
pub struct LessonReport {
    /// Lesson
    pub lesson: LessonId,
    /// Lesson title
    pub title: String,
    /// Whether the lesson is completed
    pub completed: bool,
    /// Whether the lesson has a quiz
    pub has_quiz: bool,
    /// Recorded quiz score
    pub quiz_score: Option<f64>,
}

impl ProgressReport {
    /// Build the report, or `None` if the learner is not enrolled.
    pub fn build(course: &Course, learner: LearnerId) -> Option<Self> {
        let enrollment = course.enrollment(learner)?;

        let modules = course
            .modules
            .iter()
            .map(|module| ModuleReport {
                title: module.title.clone(),
                lessons: module
                    .lessons
                    .iter()
                    .map(|lesson| {
                        let completion = enrollment.completions.get(&lesson.id);
                        LessonReport {
                            lesson: lesson.id,
                            title: lesson.title.clone(),
                            completed: completion.is_some(),
                            has_quiz: lesson.quiz.is_some(),
                            quiz_score: completion.and_then(|c| c.quiz_score),
                        }
                    })
                    .collect(),
            })
            .collect();

        Some(Self {
            course_id: course.id,
            course_title: course.title.clone(),
            learner,
            overall: enrollment.progress_percent,
            status: enrollment.status,
            completed_at: enrollment.completed_at,
            current_module: enrollment.current_module,
            current_lesson: enrollment.current_lesson,
            last_accessed_at: enrollment.last_accessed_at,
            modules,
            certificate: enrollment.certificate,
            blockers: ProgressTracker::new().certificate_blockers(course, learner),
        })
    }

    /// Number of completed lessons in the report.
    pub fn completed_lessons(&self) -> usize {
        self.modules
            .iter()
            .flat_map(|m| m.lessons.iter())
            .filter(|l| l.completed)
            .count()
    }
}
