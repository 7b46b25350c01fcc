use std::path::PathBuf;

use thiserror::Error;

use crate::store::{MAX_EXAMS, NUM_QUESTIONS};

#[derive(Debug, Error)]
pub enum MarkingError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Number of TAs must be >= 2, got {0}")]
    TooFewWorkers(usize),

    #[error("Rubric file must contain {} lines, found {found}", NUM_QUESTIONS)]
    RubricTooShort { found: usize },

    #[error("Rubric line {line} is malformed ({reason}): {text:?}")]
    RubricLine {
        line: usize,
        text: String,
        reason: &'static str,
    },

    #[error("Exam list is empty")]
    EmptyExamList,

    #[error("Too many exams (max {})", MAX_EXAMS)]
    TooManyExams,

    #[error("Exam file {} could not be read: {source}", .path.display())]
    ExamFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Exam file {} has an invalid student number: {text:?}", .path.display())]
    StudentId { path: PathBuf, text: String },

    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl MarkingError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MarkingError::Io {
            path: path.into(),
            source,
        }
    }
}
