//! Enrollment model - a learner's progress within one course.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use crate::id::{LearnerId, LessonId, ModuleId};
use crate::Time;

/// A learner's relationship to one course.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enrollment {
    /// The enrolled learner
    pub learner: LearnerId,

    /// Name printed on the certificate
    pub learner_name: String,

    /// When the learner enrolled
    pub enrolled_at: Time,

    /// Completed lessons, at most one record per lesson
    #[serde(default)]
    pub completions: BTreeMap<LessonId, LessonCompletion>,

    /// Percentage complete (0-100) as of the last recompute
    #[serde(default)]
    pub progress_percent: f64,

    /// Certificate state
    #[serde(default)]
    pub certificate: CertificateState,

    /// Active until the certificate is issued
    #[serde(default)]
    pub status: EnrollmentStatus,

    /// When the course was completed
    #[serde(default)]
    pub completed_at: Option<Time>,

    /// Module of the lesson last worked on
    #[serde(default)]
    pub current_module: Option<ModuleId>,

    /// Lesson last worked on, to resume from
    #[serde(default)]
    pub current_lesson: Option<LessonId>,

    /// Last completion or quiz submission
    #[serde(default)]
    pub last_accessed_at: Option<Time>,
}

impl Enrollment {
    /// Create a fresh enrollment with no completions.
    pub fn new(learner: LearnerId, learner_name: impl Into<String>) -> Self {
        Self {
            learner,
            learner_name: learner_name.into(),
            enrolled_at: chrono::Utc::now(),
            completions: BTreeMap::new(),
            progress_percent: 0.0,
            certificate: CertificateState::NotIssued,
            status: EnrollmentStatus::Active,
            completed_at: None,
            current_module: None,
            current_lesson: None,
            last_accessed_at: None,
        }
    }

    /// Record where the learner is working.
    pub fn touch(&mut self, module: ModuleId, lesson: LessonId, at: Time) {
        self.current_module = Some(module);
        self.current_lesson = Some(lesson);
        self.last_accessed_at = Some(at);
    }

    /// Issue the certificate and complete the enrollment.
    ///
    /// Returns false if the certificate was already issued; nothing changes
    /// in that case.
    pub fn issue_certificate(&mut self, at: Time) -> bool {
        if self.certificate.is_issued() {
            return false;
        }
        self.certificate = CertificateState::Issued { issued_at: at };
        self.status = EnrollmentStatus::Completed;
        self.completed_at = Some(at);
        true
    }

    /// Whether a lesson has a completion record.
    pub fn has_completed(&self, lesson: LessonId) -> bool {
        self.completions.contains_key(&lesson)
    }
}

/// Enrollment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentStatus {
    /// Still working through the course
    #[default]
    Active,
    /// Certificate issued
    Completed,
}

/// Record that a lesson was finished.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LessonCompletion {
    /// When the lesson was first completed
    pub completed_at: Time,

    /// Latest quiz score (0-100), if a quiz was submitted
    #[serde(default)]
    pub quiz_score: Option<f64>,
}

impl LessonCompletion {
    /// Completion stamped now.
    pub fn now() -> Self {
        Self {
            completed_at: chrono::Utc::now(),
            quiz_score: None,
        }
    }
}

/// Certificate state of an enrollment.
///
/// `NotIssued -> Issued` happens at most once; there is no way back.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CertificateState {
    /// Not yet eligible, or not yet evaluated
    #[default]
    NotIssued,
    /// Issued at the given time
    Issued {
        /// Issuance time
        issued_at: Time,
    },
}

impl CertificateState {
    /// Whether the certificate has been issued.
    pub fn is_issued(&self) -> bool {
        matches!(self, CertificateState::Issued { .. })
    }

    /// Issuance time, if issued.
    pub fn issued_at(&self) -> Option<Time> {
        match self {
            CertificateState::Issued { issued_at } => Some(*issued_at),
            CertificateState::NotIssued => None,
        }
    }
}
