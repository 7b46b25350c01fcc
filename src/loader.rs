//! Reads the rubric file and the exam list into memory.
//!
//! Any problem here is fatal: the supervisor never starts a TA with partial
//! input.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::MarkingError;
use crate::store::{ExamRecord, MAX_EXAMS, NUM_QUESTIONS, RubricLine, TERMINAL_STUDENT_ID};

/// Reads exactly [`NUM_QUESTIONS`] rubric lines of the form `"<n>, <grade>"`.
pub fn load_rubric(path: &Path) -> Result<Vec<RubricLine>, MarkingError> {
    let contents = std::fs::read_to_string(path).map_err(|e| MarkingError::io(path, e))?;
    let rubric = parse_rubric(&contents)?;
    info!(path = %path.display(), "rubric loaded");
    Ok(rubric)
}

pub fn parse_rubric(contents: &str) -> Result<Vec<RubricLine>, MarkingError> {
    let lines: Vec<&str> = contents
        .lines()
        .map(|l| l.trim_end_matches('\r'))
        .filter(|l| !l.trim().is_empty())
        .collect();
    if lines.len() < NUM_QUESTIONS {
        return Err(MarkingError::RubricTooShort { found: lines.len() });
    }
    if lines.len() > NUM_QUESTIONS {
        warn!(
            extra = lines.len() - NUM_QUESTIONS,
            "ignoring rubric lines past question {NUM_QUESTIONS}"
        );
    }

    lines
        .iter()
        .take(NUM_QUESTIONS)
        .enumerate()
        .map(|(i, text)| parse_rubric_line(i + 1, text))
        .collect()
}

fn parse_rubric_line(line: usize, text: &str) -> Result<RubricLine, MarkingError> {
    let malformed = |reason| MarkingError::RubricLine {
        line,
        text: text.to_string(),
        reason,
    };
    let (question, grade) = text.split_once(',').ok_or_else(|| malformed("missing comma"))?;
    let question = question
        .trim()
        .parse()
        .map_err(|_| malformed("question is not a number"))?;
    let grade = grade
        .trim_start()
        .chars()
        .next()
        .ok_or_else(|| malformed("missing grade"))?;
    Ok(RubricLine { question, grade })
}

/// Reads the exam list: one exam-file path per line, each exam file holding
/// the student number on its first line.
///
/// Relative paths are tried as written first, then against the list file's
/// directory.
pub fn load_exam_list(path: &Path) -> Result<Vec<ExamRecord>, MarkingError> {
    let contents = std::fs::read_to_string(path).map_err(|e| MarkingError::io(path, e))?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));

    let mut catalog = Vec::new();
    for entry in contents.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if catalog.len() >= MAX_EXAMS {
            return Err(MarkingError::TooManyExams);
        }
        let exam_path = resolve(entry, base);
        let student_id = read_student_id(&exam_path)?;
        catalog.push(ExamRecord {
            document: entry.to_string(),
            student_id,
        });
    }

    if catalog.is_empty() {
        return Err(MarkingError::EmptyExamList);
    }
    info!(path = %path.display(), exams = catalog.len(), "exam list loaded");
    Ok(catalog)
}

fn resolve(entry: &str, base: &Path) -> PathBuf {
    let as_written = PathBuf::from(entry);
    if as_written.is_absolute() || as_written.exists() {
        as_written
    } else {
        base.join(as_written)
    }
}

fn read_student_id(path: &Path) -> Result<u16, MarkingError> {
    let contents = std::fs::read_to_string(path).map_err(|source| MarkingError::ExamFile {
        path: path.to_path_buf(),
        source,
    })?;
    let first = contents.lines().next().unwrap_or("").trim();
    parse_student_id(first).ok_or_else(|| MarkingError::StudentId {
        path: path.to_path_buf(),
        text: first.to_string(),
    })
}

/// Student numbers are exactly four ASCII digits, `0000` to `9999`.
pub fn parse_student_id(text: &str) -> Option<u16> {
    if text.len() != 4 || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

/// Built-in scenario: every rubric line at `A`, exam `0001` then the
/// terminal exam `9999`.
pub fn demo_inputs() -> (Vec<RubricLine>, Vec<ExamRecord>) {
    let rubric = (1..=NUM_QUESTIONS as u32)
        .map(|question| RubricLine {
            question,
            grade: 'A',
        })
        .collect();
    let catalog = [1, TERMINAL_STUDENT_ID]
        .into_iter()
        .map(|student_id| ExamRecord {
            document: format!("demo/exam_{student_id:04}.txt"),
            student_id,
        })
        .collect();
    (rubric, catalog)
}
