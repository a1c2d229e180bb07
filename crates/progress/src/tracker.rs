//! Progress tracking over an in-memory course aggregate.
//!
//! The tracker never touches storage. Callers load a [`Course`], apply one
//! of the mutating operations, and persist the course afterwards; every
//! mutation ends with a progress recompute and a certificate check.

use std::collections::HashMap;

use lessonpath_core::{
    CertificateState, Course, Enrollment, LearnerId, Lesson, LessonCompletion, LessonId,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::certificate::{self, CertificateBlocker};
use crate::error::{ProgressError, Result};

/// Position of a lesson inside the course structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LessonLocation {
    /// Index into `Course::modules`
    pub module: usize,
    /// Index into `Module::lessons`
    pub lesson: usize,
}

/// Lesson lookup table built once per loaded course.
#[derive(Debug, Clone, Default)]
pub struct CourseIndex {
    lessons: HashMap<LessonId, LessonLocation>,
    total: usize,
}

impl CourseIndex {
    /// Index every lesson of a course.
    pub fn build(course: &Course) -> Self {
        let mut lessons = HashMap::new();
        let mut total = 0;
        for (m, module) in course.modules.iter().enumerate() {
            for (l, lesson) in module.lessons.iter().enumerate() {
                lessons.insert(lesson.id, LessonLocation { module: m, lesson: l });
                total += 1;
            }
        }
        Self { lessons, total }
    }

    /// Total lessons across all modules.
    pub fn total_lessons(&self) -> usize {
        self.total
    }

    /// Whether the course has this lesson.
    pub fn contains(&self, lesson: LessonId) -> bool {
        self.lessons.contains_key(&lesson)
    }

    /// Where a lesson lives.
    pub fn locate(&self, lesson: LessonId) -> Option<LessonLocation> {
        self.lessons.get(&lesson).copied()
    }

    /// Resolve a lesson against the course this index was built from.
    pub fn lesson<'c>(&self, course: &'c Course, lesson: LessonId) -> Option<&'c Lesson> {
        let loc = self.locate(lesson)?;
        course.modules.get(loc.module)?.lessons.get(loc.lesson)
    }

    /// Distinct completed lessons that still exist in the course.
    pub fn completed_count(&self, enrollment: &Enrollment) -> usize {
        enrollment
            .completions
            .keys()
            .filter(|id| self.contains(**id))
            .count()
    }

    /// Completion percentage (0-100) for an enrollment.
    pub fn progress(&self, enrollment: &Enrollment) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.completed_count(enrollment) as f64 / self.total as f64 * 100.0
    }
}

/// Enrollment state after a mutation.
#[derive(Debug, Clone, Serialize)]
pub struct EnrollmentSnapshot {
    /// The learner
    pub learner: LearnerId,
    /// Percentage complete (0-100)
    pub progress_percent: f64,
    /// Certificate state
    pub certificate: CertificateState,
    /// Whether this call issued the certificate
    pub certificate_newly_issued: bool,
    /// Whether this call modified the enrollment
    pub changed: bool,
}

/// Outcome of a quiz submission.
#[derive(Debug, Clone, Serialize)]
pub struct QuizResult {
    /// Score (0-100)
    pub score: f64,
    /// Whether the score meets the quiz's passing score
    pub passed: bool,
    /// Enrollment after recording the score
    pub snapshot: EnrollmentSnapshot,
}

/// Computes progress, scores quizzes and issues certificates.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProgressTracker;

impl ProgressTracker {
    /// Create a tracker.
    pub fn new() -> Self {
        Self
    }

    /// Enroll a learner with no completions.
    pub fn enroll(
        &self,
        course: &mut Course,
        learner: LearnerId,
        learner_name: impl Into<String>,
    ) -> Result<EnrollmentSnapshot> {
        if course.enrollments.contains_key(&learner) {
            return Err(ProgressError::AlreadyEnrolled { course: course.id, learner });
        }

        let enrollment = Enrollment::new(learner, learner_name);
        let snapshot = EnrollmentSnapshot {
            learner,
            progress_percent: enrollment.progress_percent,
            certificate: enrollment.certificate,
            certificate_newly_issued: false,
            changed: true,
        };
        course.enrollments.insert(learner, enrollment);
        course.updated_at = chrono::Utc::now();

        info!("Enrolled learner {} in course {}", learner, course.id);
        Ok(snapshot)
    }

    /// Mark a lesson completed. Completing it again changes nothing.
    pub fn record_lesson_completion(
        &self,
        course: &mut Course,
        learner: LearnerId,
        lesson: LessonId,
    ) -> Result<EnrollmentSnapshot> {
        let index = CourseIndex::build(course);
        let course_id = course.id;

        let enrollment = course
            .enrollment_mut(learner)
            .ok_or(ProgressError::NotEnrolled { course: course_id, learner })?;
        if !index.contains(lesson) {
            return Err(ProgressError::LessonNotFound(lesson));
        }

        if enrollment.has_completed(lesson) {
            debug!("Lesson {} already completed by {}", lesson, learner);
            return Ok(EnrollmentSnapshot {
                learner,
                progress_percent: enrollment.progress_percent,
                certificate: enrollment.certificate,
                certificate_newly_issued: false,
                changed: false,
            });
        }

        enrollment.completions.insert(lesson, LessonCompletion::now());
        self.settle(course, &index, learner, lesson)
    }

    /// Score a quiz and record the score against the lesson.
    ///
    /// Submitting a quiz also completes its lesson. A later submission
    /// replaces the recorded score.
    pub fn submit_quiz(
        &self,
        course: &mut Course,
        learner: LearnerId,
        lesson: LessonId,
        answers: &[usize],
    ) -> Result<QuizResult> {
        if !course.enrollments.contains_key(&learner) {
            return Err(ProgressError::NotEnrolled { course: course.id, learner });
        }

        let index = CourseIndex::build(course);
        let quiz = index
            .lesson(course, lesson)
            .ok_or(ProgressError::LessonNotFound(lesson))?
            .quiz
            .as_ref()
            .ok_or(ProgressError::NoQuizForLesson(lesson))?;
        let score = quiz.score(answers);
        let passed = quiz.passes(score);

        let course_id = course.id;
        let enrollment = course
            .enrollment_mut(learner)
            .ok_or(ProgressError::NotEnrolled { course: course_id, learner })?;
        enrollment
            .completions
            .entry(lesson)
            .or_insert_with(LessonCompletion::now)
            .quiz_score = Some(score);

        debug!("Learner {} scored {:.1} on lesson {}", learner, score, lesson);
        let snapshot = self.settle(course, &index, learner, lesson)?;
        Ok(QuizResult { score, passed, snapshot })
    }

    /// Completion percentage for a learner; 0 if not enrolled or the
    /// course has no lessons.
    pub fn calculate_progress(&self, course: &Course, learner: LearnerId) -> f64 {
        match course.enrollment(learner) {
            Some(enrollment) => CourseIndex::build(course).progress(enrollment),
            None => 0.0,
        }
    }

    /// Whether the learner currently meets every certificate condition.
    pub fn can_issue_certificate(&self, course: &Course, learner: LearnerId) -> bool {
        self.certificate_blockers(course, learner).is_empty()
    }

    /// Everything keeping a learner from a certificate.
    pub fn certificate_blockers(&self, course: &Course, learner: LearnerId) -> Vec<CertificateBlocker> {
        match course.enrollment(learner) {
            Some(enrollment) => {
                certificate::blockers(course, &CourseIndex::build(course), enrollment)
            }
            None => vec![CertificateBlocker::NotEnrolled],
        }
    }

    /// Recompute progress, note the lesson as the learner's position and
    /// issue the certificate if newly eligible.
    fn settle(
        &self,
        course: &mut Course,
        index: &CourseIndex,
        learner: LearnerId,
        lesson: LessonId,
    ) -> Result<EnrollmentSnapshot> {
        let course_id = course.id;
        let module = index
            .locate(lesson)
            .and_then(|loc| course.modules.get(loc.module))
            .map(|m| m.id)
            .ok_or(ProgressError::LessonNotFound(lesson))?;
        let not_enrolled = ProgressError::NotEnrolled { course: course_id, learner };

        let (progress, blockers) = {
            let enrollment = course.enrollment(learner).ok_or(not_enrolled)?;
            (index.progress(enrollment), certificate::blockers(course, index, enrollment))
        };

        for blocker in &blockers {
            if let CertificateBlocker::DataInconsistency { lesson } = blocker {
                warn!("Course {} has a completion for unknown lesson {}", course_id, lesson);
            }
        }

        let now = chrono::Utc::now();
        let enrollment = course
            .enrollment_mut(learner)
            .ok_or(ProgressError::NotEnrolled { course: course_id, learner })?;
        enrollment.progress_percent = progress;
        enrollment.touch(module, lesson, now);

        let newly_issued = blockers.is_empty() && enrollment.issue_certificate(now);
        if newly_issued {
            info!("Issued certificate for course {} to learner {}", course_id, learner);
        }

        let snapshot = EnrollmentSnapshot {
            learner,
            progress_percent: progress,
            certificate: enrollment.certificate,
            certificate_newly_issued: newly_issued,
            changed: true,
        };
        course.updated_at = now;

        debug!("Learner {} progress on course {}: {:.1}%", learner, course_id, progress);
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lessonpath_core::{EnrollmentStatus, Module, Question, Quiz};

    fn two_module_course() -> (Course, LessonId, LessonId) {
        let a = Lesson::new("A");
        let b = Lesson::new("B");
        let (a_id, b_id) = (a.id, b.id);
        let course = Course::new("Course", "")
            .with_module(Module::new("One").with_lesson(a))
            .with_module(Module::new("Two").with_lesson(b));
        (course, a_id, b_id)
    }

    fn quiz_course(passing_score: f64) -> (Course, LessonId) {
        let lesson = Lesson::new("Quiz").with_quiz(
            Quiz::new(passing_score)
                .with_question(Question::new("first", vec!["x".into(), "y".into()], 0))
                .with_question(Question::new("second", vec!["x".into(), "y".into()], 1)),
        );
        let id = lesson.id;
        (Course::new("Quizzes", "").with_module(Module::new("Only").with_lesson(lesson)), id)
    }

    fn enrolled(mut course: Course) -> (Course, LearnerId) {
        let learner = LearnerId::new();
        ProgressTracker::new().enroll(&mut course, learner, "Ada").unwrap();
        (course, learner)
    }

    #[test]
    fn test_fresh_enrollment_zero_progress() {
        let (course, _, _) = two_module_course();
        let (course, learner) = enrolled(course);
        let tracker = ProgressTracker::new();

        assert_eq!(tracker.calculate_progress(&course, learner), 0.0);
        assert!(!tracker.can_issue_certificate(&course, learner));
    }

    #[test]
    fn test_enroll_twice_fails() {
        let (course, _, _) = two_module_course();
        let (mut course, learner) = enrolled(course);

        let err = ProgressTracker::new().enroll(&mut course, learner, "Ada").unwrap_err();
        assert!(matches!(err, ProgressError::AlreadyEnrolled { .. }));
    }

    #[test]
    fn test_two_modules_half_then_full() {
        let (course, a, b) = two_module_course();
        let (mut course, learner) = enrolled(course);
        let tracker = ProgressTracker::new();

        let snapshot = tracker.record_lesson_completion(&mut course, learner, a).unwrap();
        assert_eq!(snapshot.progress_percent, 50.0);
        assert!(!snapshot.certificate.is_issued());

        let snapshot = tracker.record_lesson_completion(&mut course, learner, b).unwrap();
        assert_eq!(snapshot.progress_percent, 100.0);
        assert!(snapshot.certificate_newly_issued);
        assert!(snapshot.certificate.is_issued());
        assert_eq!(course.enrollment(learner).unwrap().progress_percent, 100.0);
    }

    #[test]
    fn test_completing_all_lessons_reaches_100() {
        let mut module_a = Module::new("A");
        let mut module_b = Module::new("B");
        let mut ids = Vec::new();
        for i in 0..3 {
            let lesson = Lesson::new(format!("a{}", i));
            ids.push(lesson.id);
            module_a = module_a.with_lesson(lesson);
        }
        for i in 0..4 {
            let lesson = Lesson::new(format!("b{}", i));
            ids.push(lesson.id);
            module_b = module_b.with_lesson(lesson);
        }
        let course = Course::new("Seven", "").with_module(module_a).with_module(module_b);
        let (mut course, learner) = enrolled(course);
        let tracker = ProgressTracker::new();

        for id in &ids {
            tracker.record_lesson_completion(&mut course, learner, *id).unwrap();
        }
        assert_eq!(tracker.calculate_progress(&course, learner), 100.0);
        assert!(tracker.can_issue_certificate(&course, learner));
    }

    #[test]
    fn test_repeat_completion_is_noop() {
        let (course, a, _) = two_module_course();
        let (mut course, learner) = enrolled(course);
        let tracker = ProgressTracker::new();

        tracker.record_lesson_completion(&mut course, learner, a).unwrap();
        let first_at = course.enrollment(learner).unwrap().completions[&a].completed_at;

        let snapshot = tracker.record_lesson_completion(&mut course, learner, a).unwrap();
        assert!(!snapshot.changed);
        assert_eq!(snapshot.progress_percent, 50.0);

        let enrollment = course.enrollment(learner).unwrap();
        assert_eq!(enrollment.completions.len(), 1);
        assert_eq!(enrollment.completions[&a].completed_at, first_at);
    }

    #[test]
    fn test_completion_requires_enrollment() {
        let (mut course, a, _) = two_module_course();
        let err = ProgressTracker::new()
            .record_lesson_completion(&mut course, LearnerId::new(), a)
            .unwrap_err();
        assert!(matches!(err, ProgressError::NotEnrolled { .. }));
    }

    #[test]
    fn test_completion_unknown_lesson() {
        let (course, _, _) = two_module_course();
        let (mut course, learner) = enrolled(course);
        let missing = LessonId::new();

        let err = ProgressTracker::new()
            .record_lesson_completion(&mut course, learner, missing)
            .unwrap_err();
        assert!(matches!(err, ProgressError::LessonNotFound(id) if id == missing));
        assert!(course.enrollment(learner).unwrap().completions.is_empty());
    }

    #[test]
    fn test_quiz_scores() {
        let (course, lesson) = quiz_course(70.0);
        let (mut course, learner) = enrolled(course);
        let tracker = ProgressTracker::new();

        let result = tracker.submit_quiz(&mut course, learner, lesson, &[0, 0]).unwrap();
        assert_eq!(result.score, 50.0);
        assert!(!result.passed);
        // Lesson counts as completed even on a failing score
        assert_eq!(result.snapshot.progress_percent, 100.0);
        assert!(!result.snapshot.certificate.is_issued());

        let result = tracker.submit_quiz(&mut course, learner, lesson, &[0, 1]).unwrap();
        assert_eq!(result.score, 100.0);
        assert!(result.passed);
        assert!(result.snapshot.certificate_newly_issued);
    }

    #[test]
    fn test_quiz_resubmission_issues_once() {
        let (course, lesson) = quiz_course(70.0);
        let (mut course, learner) = enrolled(course);
        let tracker = ProgressTracker::new();

        let first = tracker.submit_quiz(&mut course, learner, lesson, &[0, 1]).unwrap();
        let issued_at = first.snapshot.certificate.issued_at().unwrap();

        let second = tracker.submit_quiz(&mut course, learner, lesson, &[0, 1]).unwrap();
        assert!(!second.snapshot.certificate_newly_issued);
        assert_eq!(second.snapshot.certificate.issued_at(), Some(issued_at));
    }

    #[test]
    fn test_certificate_never_reverts() {
        let (course, lesson) = quiz_course(70.0);
        let (mut course, learner) = enrolled(course);
        let tracker = ProgressTracker::new();

        tracker.submit_quiz(&mut course, learner, lesson, &[0, 1]).unwrap();
        let result = tracker.submit_quiz(&mut course, learner, lesson, &[1, 0]).unwrap();
        assert_eq!(result.score, 0.0);
        assert!(result.snapshot.certificate.is_issued());
        assert!(!tracker.can_issue_certificate(&course, learner));
    }

    #[test]
    fn test_quiz_updates_existing_completion() {
        let (course, lesson) = quiz_course(70.0);
        let (mut course, learner) = enrolled(course);
        let tracker = ProgressTracker::new();

        tracker.record_lesson_completion(&mut course, learner, lesson).unwrap();
        let completed_at = course.enrollment(learner).unwrap().completions[&lesson].completed_at;

        tracker.submit_quiz(&mut course, learner, lesson, &[0]).unwrap();
        let enrollment = course.enrollment(learner).unwrap();
        assert_eq!(enrollment.completions.len(), 1);
        assert_eq!(enrollment.completions[&lesson].completed_at, completed_at);
        assert_eq!(enrollment.completions[&lesson].quiz_score, Some(50.0));
    }

    #[test]
    fn test_low_score_then_raised() {
        let plain = Lesson::new("Reading");
        let quizzed = Lesson::new("Check").with_quiz(
            Quiz::new(70.0)
                .with_question(Question::new("q", vec![], 0).with_points(6))
                .with_question(Question::new("q", vec![], 0).with_points(4)),
        );
        let (plain_id, quiz_id) = (plain.id, quizzed.id);
        let course = Course::new("Gate", "")
            .with_module(Module::new("m").with_lesson(plain).with_lesson(quizzed));
        let (mut course, learner) = enrolled(course);
        let tracker = ProgressTracker::new();

        tracker.record_lesson_completion(&mut course, learner, plain_id).unwrap();
        let result = tracker.submit_quiz(&mut course, learner, quiz_id, &[0, 1]).unwrap();
        assert_eq!(result.score, 60.0);
        assert_eq!(tracker.calculate_progress(&course, learner), 100.0);
        assert!(!tracker.can_issue_certificate(&course, learner));
        assert!(!result.snapshot.certificate.is_issued());

        let result = tracker.submit_quiz(&mut course, learner, quiz_id, &[0, 0]).unwrap();
        assert_eq!(result.score, 100.0);
        assert!(result.snapshot.certificate_newly_issued);
    }

    #[test]
    fn test_quiz_errors() {
        let (course, a, _) = two_module_course();
        let (mut course, learner) = enrolled(course);
        let tracker = ProgressTracker::new();

        let err = tracker.submit_quiz(&mut course, learner, a, &[0]).unwrap_err();
        assert!(matches!(err, ProgressError::NoQuizForLesson(id) if id == a));

        let err = tracker.submit_quiz(&mut course, learner, LessonId::new(), &[0]).unwrap_err();
        assert!(matches!(err, ProgressError::LessonNotFound(_)));
    }

    #[test]
    fn test_quiz_checks_enrollment_first() {
        let (mut course, lesson) = quiz_course(70.0);

        // Unknown lesson too, but enrollment wins
        let err = ProgressTracker::new()
            .submit_quiz(&mut course, LearnerId::new(), LessonId::new(), &[0])
            .unwrap_err();
        assert!(matches!(err, ProgressError::NotEnrolled { .. }));

        let err = ProgressTracker::new()
            .submit_quiz(&mut course, LearnerId::new(), lesson, &[0, 1])
            .unwrap_err();
        assert!(matches!(err, ProgressError::NotEnrolled { .. }));
        assert!(course.enrollments.is_empty());
    }

    #[test]
    fn test_empty_quiz_scores_zero() {
        let lesson = Lesson::new("Empty").with_quiz(Quiz::new(70.0));
        let id = lesson.id;
        let course = Course::new("c", "").with_module(Module::new("m").with_lesson(lesson));
        let (mut course, learner) = enrolled(course);

        let result = ProgressTracker::new().submit_quiz(&mut course, learner, id, &[0]).unwrap();
        assert_eq!(result.score, 0.0);
        assert!(!result.passed);
    }

    #[test]
    fn test_empty_quiz_zero_passing_score() {
        let lesson = Lesson::new("Empty").with_quiz(Quiz::new(0.0));
        let id = lesson.id;
        let course = Course::new("c", "").with_module(Module::new("m").with_lesson(lesson));
        let (mut course, learner) = enrolled(course);

        let result = ProgressTracker::new().submit_quiz(&mut course, learner, id, &[]).unwrap();
        assert_eq!(result.score, 0.0);
        assert!(result.passed);
        assert!(result.snapshot.certificate_newly_issued);
    }

    #[test]
    fn test_progress_empty_course() {
        let (course, learner) = enrolled(Course::new("Empty", ""));
        let tracker = ProgressTracker::new();
        assert_eq!(tracker.calculate_progress(&course, learner), 0.0);
        assert!(!tracker.can_issue_certificate(&course, learner));
    }

    #[test]
    fn test_progress_not_enrolled() {
        let (course, _, _) = two_module_course();
        let tracker = ProgressTracker::new();
        assert_eq!(tracker.calculate_progress(&course, LearnerId::new()), 0.0);
        assert_eq!(
            tracker.certificate_blockers(&course, LearnerId::new()),
            vec![CertificateBlocker::NotEnrolled]
        );
    }

    #[test]
    fn test_stray_completion_blocks_certificate() {
        let (course, a, b) = two_module_course();
        let (mut course, learner) = enrolled(course);
        let stray = LessonId::new();
        course
            .enrollment_mut(learner)
            .unwrap()
            .completions
            .insert(stray, LessonCompletion::now());

        let tracker = ProgressTracker::new();
        tracker.record_lesson_completion(&mut course, learner, a).unwrap();
        let snapshot = tracker.record_lesson_completion(&mut course, learner, b).unwrap();

        assert_eq!(snapshot.progress_percent, 100.0);
        assert!(!snapshot.certificate.is_issued());
    }

    #[test]
    fn test_mutations_track_position_and_status() {
        let (course, a, b) = two_module_course();
        let (module_one, module_two) = (course.modules[0].id, course.modules[1].id);
        let (mut course, learner) = enrolled(course);
        let tracker = ProgressTracker::new();

        tracker.record_lesson_completion(&mut course, learner, a).unwrap();
        let enrollment = course.enrollment(learner).unwrap();
        assert_eq!(enrollment.current_module, Some(module_one));
        assert_eq!(enrollment.current_lesson, Some(a));
        let first_access = enrollment.last_accessed_at.unwrap();
        assert_eq!(enrollment.status, EnrollmentStatus::Active);
        assert!(enrollment.completed_at.is_none());

        tracker.record_lesson_completion(&mut course, learner, b).unwrap();
        let enrollment = course.enrollment(learner).unwrap();
        assert_eq!(enrollment.current_module, Some(module_two));
        assert_eq!(enrollment.current_lesson, Some(b));
        assert!(enrollment.last_accessed_at.unwrap() >= first_access);
        assert_eq!(enrollment.status, EnrollmentStatus::Completed);
        assert_eq!(enrollment.completed_at, enrollment.certificate.issued_at());
    }

    #[test]
    fn test_quiz_submission_tracks_position() {
        let (course, lesson) = quiz_course(70.0);
        let module = course.modules[0].id;
        let (mut course, learner) = enrolled(course);

        ProgressTracker::new().submit_quiz(&mut course, learner, lesson, &[0, 0]).unwrap();
        let enrollment = course.enrollment(learner).unwrap();
        assert_eq!(enrollment.current_module, Some(module));
        assert_eq!(enrollment.current_lesson, Some(lesson));
        assert!(enrollment.last_accessed_at.is_some());
        assert_eq!(enrollment.status, EnrollmentStatus::Active);
    }

    #[test]
    fn test_large_point_quiz_does_not_fault() {
        let lesson = Lesson::new("Heavy").with_quiz(
            Quiz::new(70.0)
                .with_question(Question::new("a", vec![], 0).with_points(3_000_000_000))
                .with_question(Question::new("b", vec![], 0).with_points(3_000_000_000)),
        );
        let id = lesson.id;
        let course = Course::new("c", "").with_module(Module::new("m").with_lesson(lesson));
        let (mut course, learner) = enrolled(course);

        let result = ProgressTracker::new().submit_quiz(&mut course, learner, id, &[0, 0]).unwrap();
        assert_eq!(result.score, 100.0);
        assert!(result.snapshot.certificate_newly_issued);
    }

    #[test]
    fn test_index_locate() {
        let (course, a, b) = two_module_course();
        let index = CourseIndex::build(&course);
        assert_eq!(index.total_lessons(), 2);
        assert_eq!(index.locate(a), Some(LessonLocation { module: 0, lesson: 0 }));
        assert_eq!(index.locate(b), Some(LessonLocation { module: 1, lesson: 0 }));
        assert_eq!(index.lesson(&course, b).unwrap().title, "B");
        assert!(index.locate(LessonId::new()).is_none());
    }
}
