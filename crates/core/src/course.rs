//! Course model - the aggregate that owns structure and enrollments.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use crate::enrollment::Enrollment;
use crate::id::{CourseId, LearnerId, LessonId, ModuleId};
use crate::Time;

/// A course: ordered modules of lessons, plus the learners enrolled in it.
///
/// Enrollments are nested values of the course rather than independent
/// entities, so every progress mutation is a mutation of the course.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    /// Unique identifier
    pub id: CourseId,

    /// Course title
    pub title: String,

    /// Detailed description
    #[serde(default)]
    pub description: String,

    /// Modules in display order
    pub modules: Vec<Module>,

    /// Enrollments keyed by learner
    #[serde(default)]
    pub enrollments: HashMap<LearnerId, Enrollment>,

    /// When created
    pub created_at: Time,

    /// Last updated
    pub updated_at: Time,
}

impl Course {
    /// Create an empty course.
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: CourseId::new(),
            title: title.into(),
            description: description.into(),
            modules: Vec::new(),
            enrollments: HashMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a module.
    pub fn with_module(mut self, module: Module) -> Self {
        self.modules.push(module);
        self
    }

    /// Total number of lessons across all modules.
    pub fn total_lessons(&self) -> usize {
        self.modules.iter().map(|m| m.lessons.len()).sum()
    }

    /// Iterate over every lesson in course order.
    pub fn lessons(&self) -> impl Iterator<Item = &Lesson> {
        self.modules.iter().flat_map(|m| m.lessons.iter())
    }

    /// Check the course structure before it is stored.
    ///
    /// Lesson ids must be unique across the course, passing scores must lie
    /// in 0-100, and every correct answer must index into its options.
    pub fn validate(&self) -> Result<(), CourseError> {
        let mut seen = HashSet::new();
        for lesson in self.lessons() {
            if !seen.insert(lesson.id) {
                return Err(CourseError::DuplicateLesson(lesson.id));
            }
            let Some(quiz) = &lesson.quiz else {
                continue;
            };
            if !(0.0..=100.0).contains(&quiz.passing_score) {
                return Err(CourseError::PassingScoreOutOfRange {
                    lesson: lesson.id,
                    passing_score: quiz.passing_score,
                });
            }
            for (index, question) in quiz.questions.iter().enumerate() {
                if question.correct_answer >= question.options.len() {
                    return Err(CourseError::AnswerOutOfRange {
                        lesson: lesson.id,
                        question: index,
                        correct_answer: question.correct_answer,
                        options: question.options.len(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Look up a learner's enrollment.
    pub fn enrollment(&self, learner: LearnerId) -> Option<&Enrollment> {
        self.enrollments.get(&learner)
    }

    /// Look up a learner's enrollment for mutation.
    pub fn enrollment_mut(&mut self, learner: LearnerId) -> Option<&mut Enrollment> {
        self.enrollments.get_mut(&learner)
    }
}

/// Structural problems in a course definition.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CourseError {
    /// Two lessons share an id
    #[error("Duplicate lesson id: {0}")]
    DuplicateLesson(LessonId),

    /// Passing score outside 0-100
    #[error("Lesson {lesson} has passing score {passing_score}, expected 0-100")]
    PassingScoreOutOfRange {
        /// The lesson
        lesson: LessonId,
        /// Offending score
        passing_score: f64,
    },

    /// Correct answer does not index into the options
    #[error("Lesson {lesson} question {question}: answer {correct_answer} out of {options} options")]
    AnswerOutOfRange {
        /// The lesson
        lesson: LessonId,
        /// Question position
        question: usize,
        /// Declared correct answer
        correct_answer: usize,
        /// Number of options
        options: usize,
    },
}

/// A module groups lessons.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Module {
    /// Unique identifier
    pub id: ModuleId,

    /// Module title
    pub title: String,

    /// Optional description
    #[serde(default)]
    pub description: Option<String>,

    /// Lessons in display order
    pub lessons: Vec<Lesson>,
}

impl Module {
    /// Create an empty module.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: ModuleId::new(),
            title: title.into(),
            description: None,
            lessons: Vec::new(),
        }
    }

    /// Append a lesson.
    pub fn with_lesson(mut self, lesson: Lesson) -> Self {
        self.lessons.push(lesson);
        self
    }
}

/// A single lesson, optionally gated by a quiz.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lesson {
    /// Unique identifier
    pub id: LessonId,

    /// Lesson title
    pub title: String,

    /// Lesson body
    #[serde(default)]
    pub content: String,

    /// Expected duration in minutes
    #[serde(default)]
    pub duration_minutes: u32,

    /// Quiz attached to this lesson
    #[serde(default)]
    pub quiz: Option<Quiz>,
}

impl Lesson {
    /// Create a lesson without a quiz.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: LessonId::new(),
            title: title.into(),
            content: String::new(),
            duration_minutes: 0,
            quiz: None,
        }
    }

    /// Attach a quiz.
    pub fn with_quiz(mut self, quiz: Quiz) -> Self {
        self.quiz = Some(quiz);
        self
    }
}

/// A quiz: weighted questions and a passing threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quiz {
    /// Questions in answer order
    #[serde(default)]
    pub questions: Vec<Question>,

    /// Minimum score (0-100) to pass
    #[serde(default = "default_passing_score")]
    pub passing_score: f64,
}

fn default_passing_score() -> f64 {
    70.0
}

impl Default for Quiz {
    fn default() -> Self {
        Self {
            questions: Vec::new(),
            passing_score: default_passing_score(),
        }
    }
}

impl Quiz {
    /// Create a quiz with the given passing score.
    pub fn new(passing_score: f64) -> Self {
        Self {
            questions: Vec::new(),
            passing_score,
        }
    }

    /// Append a question.
    pub fn with_question(mut self, question: Question) -> Self {
        self.questions.push(question);
        self
    }

    /// Score a set of answers as a percentage of available points.
    ///
    /// `answers[i]` is matched against question `i`. Extra answers are
    /// ignored and missing ones count as wrong. A quiz worth no points
    /// scores 0.
    pub fn score(&self, answers: &[usize]) -> f64 {
        let total: u64 = self.questions.iter().map(|q| u64::from(q.points)).sum();
        if total == 0 {
            return 0.0;
        }

        let earned: u64 = self
            .questions
            .iter()
            .zip(answers)
            .filter(|(q, answer)| **answer == q.correct_answer)
            .map(|(q, _)| u64::from(q.points))
            .sum();

        earned as f64 / total as f64 * 100.0
    }

    /// Whether a score meets the passing threshold.
    pub fn passes(&self, score: f64) -> bool {
        score >= self.passing_score
    }
}

/// A multiple-choice question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    /// Question text
    pub prompt: String,

    /// Answer options
    pub options: Vec<String>,

    /// Index into `options` of the correct answer
    pub correct_answer: usize,

    /// Weight of this question
    #[serde(default = "default_points")]
    pub points: u32,
}

fn default_points() -> u32 {
    1
}

impl Question {
    /// Create a one-point question.
    pub fn new(prompt: impl Into<String>, options: Vec<String>, correct_answer: usize) -> Self {
        Self {
            prompt: prompt.into(),
            options,
            correct_answer,
            points: default_points(),
        }
    }

    /// Override the point value.
    pub fn with_points(mut self, points: u32) -> Self {
        self.points = points;
        self
    }
}
