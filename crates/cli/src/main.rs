//! LessonPath CLI - course progress and certificates.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lessonpath_core::{Course, CourseId, LearnerId, LessonId};
use lessonpath_progress::{
    BasicProgressService, ProgressReport, ProgressService, TextCertificateRenderer,
};
use lessonpath_storage::{JsonStorage, Storage};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lessonpath")]
#[command(about = "Course progress tracking and certificates", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Storage path for course data
    #[arg(short, long, default_value = ".lessonpath")]
    data_dir: PathBuf,

    /// Where certificates are written (default: <data-dir>/certificates)
    #[arg(long)]
    certificates_dir: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a course definition from a JSON file
    Import {
        /// Path to the course JSON
        file: PathBuf,
    },
    /// List courses
    List,
    /// Enroll a learner in a course
    Enroll {
        /// Course ID
        course: CourseId,
        /// Learner ID
        learner: LearnerId,
        /// Name printed on the certificate
        #[arg(long)]
        name: String,
    },
    /// Mark a lesson completed
    Complete {
        /// Course ID
        course: CourseId,
        /// Learner ID
        learner: LearnerId,
        /// Lesson ID
        lesson: LessonId,
    },
    /// Submit quiz answers for a lesson
    Quiz {
        /// Course ID
        course: CourseId,
        /// Learner ID
        learner: LearnerId,
        /// Lesson ID
        lesson: LessonId,
        /// Answer indices, comma separated
        #[arg(long, value_delimiter = ',')]
        answers: Vec<usize>,
    },
    /// Show a learner's progress
    Progress {
        /// Course ID
        course: CourseId,
        /// Learner ID
        learner: LearnerId,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut storage = JsonStorage::new(&cli.data_dir).await?;
    let certificates_dir = cli
        .certificates_dir
        .unwrap_or_else(|| cli.data_dir.join("certificates"));

    match cli.command {
        Commands::Import { file } => {
            let json = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("reading {}", file.display()))?;
            let course: Course = serde_json::from_str(&json)
                .with_context(|| format!("parsing {}", file.display()))?;
            let service = BasicProgressService::new(storage);
            service.import_course(&course).await?;
            println!("Imported course: {} - {} ({} lessons)", course.id, course.title, course.total_lessons());
        }
        Commands::List => {
            let courses = storage.list_courses().await?;
            println!("Courses ({})", courses.len());
            for course in courses {
                println!("  {} | {} lessons | {} enrolled | {}",
                    course.id,
                    course.total_lessons(),
                    course.enrollments.len(),
                    course.title,
                );
            }
        }
        Commands::Enroll { course, learner, name } => {
            let service = BasicProgressService::new(storage);
            service.enroll(course, learner, &name).await?;
            println!("Enrolled {} ({}) in {}", name, learner, course);
        }
        Commands::Complete { course, learner, lesson } => {
            let service = BasicProgressService::new(storage)
                .with_renderer(Arc::new(TextCertificateRenderer::new(certificates_dir)));
            let snapshot = service.record_lesson_completion(course, learner, lesson).await?;
            if !snapshot.changed {
                println!("Lesson already completed");
            }
            println!("Progress: {:.1}%", snapshot.progress_percent);
            if snapshot.certificate_newly_issued {
                println!("Certificate issued");
            }
        }
        Commands::Quiz { course, learner, lesson, answers } => {
            let service = BasicProgressService::new(storage)
                .with_renderer(Arc::new(TextCertificateRenderer::new(certificates_dir)));
            let result = service.submit_quiz(course, learner, lesson, &answers).await?;
            println!("Score: {:.1} ({})", result.score, if result.passed { "passed" } else { "failed" });
            println!("Progress: {:.1}%", result.snapshot.progress_percent);
            if result.snapshot.certificate_newly_issued {
                println!("Certificate issued");
            }
        }
        Commands::Progress { course, learner } => {
            let service = BasicProgressService::new(storage);
            let report = service.course_progress(course, learner).await?;
            print_report(&report);
        }
    }

    info!("Done");
    Ok(())
}

fn print_report(report: &ProgressReport) {
    println!("Course: {} ({})", report.course_title, report.course_id);
    println!("  Overall: {:.1}% ({:?})", report.overall, report.status);
    if let (Some(lesson), Some(at)) = (report.current_lesson, report.last_accessed_at) {
        println!("  Last worked on: lesson {} at {}", lesson, at.format("%Y-%m-%d %H:%M"));
    }
    if let Some(at) = report.completed_at {
        println!("  Completed: {}", at.format("%Y-%m-%d"));
    }
    for module in &report.modules {
        println!("  {}", module.title);
        for lesson in &module.lessons {
            let mark = if lesson.completed { "x" } else { " " };
            match lesson.quiz_score {
                Some(score) => println!("    [{}] {} (quiz {:.1})", mark, lesson.title, score),
                None if lesson.has_quiz => println!("    [{}] {} (quiz pending)", mark, lesson.title),
                None => println!("    [{}] {}", mark, lesson.title),
            }
        }
    }
    match report.certificate.issued_at() {
        Some(at) => println!("  Certificate: issued {}", at.format("%Y-%m-%d")),
        None => {
            println!("  Certificate: not issued");
            for blocker in &report.blockers {
                println!("    - {}", blocker.describe());
            }
        }
    }
}
