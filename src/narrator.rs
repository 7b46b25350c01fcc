//! Progress narration for a marking run.
//!
//! Every TA reports what it is doing through a shared [`Narrator`]. In
//! [`OutputMode::Serialized`] a line is written under the print lock in one
//! piece, so concurrent TAs never interleave inside a line. In
//! [`OutputMode::Unserialized`] the tag and the message are written as two
//! separate writes, and lines from different TAs can be spliced together.
//!
//! Each event is also appended to an in-memory journal, which the
//! supervisor turns into the run report.

use std::fmt;
use std::io::{self, Write};
use std::sync::{Mutex, PoisonError};

use serde::Serialize;
use tracing::warn;

/// Who produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Actor {
    Supervisor,
    Ta(u32),
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Actor::Supervisor => write!(f, "[SUPERVISOR]"),
            Actor::Ta(id) => write!(f, "[TA {id}]"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    ExamLoaded {
        actor: Actor,
        index: usize,
        document: String,
        student_id: u16,
    },
    StartingExam {
        ta: u32,
        index: usize,
        student_id: u16,
    },
    ReviewingRubric {
        ta: u32,
        student_id: u16,
    },
    RubricCorrected {
        ta: u32,
        /// Zero-based rubric line.
        question: usize,
        old: char,
        new: char,
    },
    QuestionMarked {
        ta: u32,
        exam_index: usize,
        student_id: u16,
        /// Zero-based question.
        question: usize,
    },
    ExamAdvanced {
        ta: u32,
        from: usize,
        to: usize,
    },
    CatalogExhausted {
        ta: u32,
        last: usize,
    },
    TerminalExamDone {
        ta: u32,
        student_id: u16,
    },
    WorkerExiting {
        ta: u32,
    },
    AllFinished,
}

impl ProgressEvent {
    pub fn actor(&self) -> Actor {
        match self {
            ProgressEvent::ExamLoaded { actor, .. } => *actor,
            ProgressEvent::StartingExam { ta, .. }
            | ProgressEvent::ReviewingRubric { ta, .. }
            | ProgressEvent::RubricCorrected { ta, .. }
            | ProgressEvent::QuestionMarked { ta, .. }
            | ProgressEvent::ExamAdvanced { ta, .. }
            | ProgressEvent::CatalogExhausted { ta, .. }
            | ProgressEvent::TerminalExamDone { ta, .. }
            | ProgressEvent::WorkerExiting { ta } => Actor::Ta(*ta),
            ProgressEvent::AllFinished => Actor::Supervisor,
        }
    }

    /// The message part of the line, without the actor tag.
    pub fn message(&self) -> String {
        match self {
            ProgressEvent::ExamLoaded {
                document,
                student_id,
                ..
            } => format!("Loaded exam {document} (student {student_id:04})"),
            ProgressEvent::StartingExam {
                index, student_id, ..
            } => format!("Starting work on exam index {index} (student {student_id:04})"),
            ProgressEvent::ReviewingRubric { student_id, .. } => {
                format!("Reviewing rubric for exam {student_id:04}")
            }
            ProgressEvent::RubricCorrected {
                question, old, new, ..
            } => format!("Corrected rubric Q{}: {old} -> {new}", question + 1),
            ProgressEvent::QuestionMarked {
                student_id,
                question,
                ..
            } => format!("Marked exam {student_id:04}, question {}", question + 1),
            ProgressEvent::ExamAdvanced { from, to, .. } => {
                format!("Advanced from exam index {from} to {to}")
            }
            ProgressEvent::CatalogExhausted { last, .. } => {
                format!("Catalog exhausted after exam index {last}")
            }
            ProgressEvent::TerminalExamDone { student_id, .. } => {
                format!("Exam {student_id:04} fully marked, finishing run")
            }
            ProgressEvent::WorkerExiting { .. } => "Finishing execution".to_string(),
            ProgressEvent::AllFinished => "All TAs finished. Cleaning up.".to_string(),
        }
    }
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.actor(), self.message())
    }
}

/// How lines reach the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Whole line under the print lock.
    Serialized,
    /// Tag and message as separate writes.
    Unserialized,
}

pub struct Narrator {
    print: Mutex<Box<dyn Write + Send>>,
    journal: Mutex<Vec<ProgressEvent>>,
    mode: OutputMode,
}

impl fmt::Debug for Narrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Narrator").field("mode", &self.mode).finish()
    }
}

impl Narrator {
    pub fn new(sink: Box<dyn Write + Send>, mode: OutputMode) -> Self {
        Self {
            print: Mutex::new(sink),
            journal: Mutex::new(Vec::new()),
            mode,
        }
    }

    /// Journal only, nothing printed.
    #[cfg(test)]
    pub fn quiet(mode: OutputMode) -> Self {
        Self::new(Box::new(io::sink()), mode)
    }

    pub fn emit(&self, event: ProgressEvent) {
        let result = match self.mode {
            OutputMode::Serialized => {
                let line = format!("{event}\n");
                let mut sink = self.print.lock().unwrap_or_else(PoisonError::into_inner);
                sink.write_all(line.as_bytes()).and_then(|()| sink.flush())
            }
            OutputMode::Unserialized => {
                let tag = format!("{} ", event.actor());
                let message = format!("{}\n", event.message());
                self.write_piece(&tag).and_then(|()| self.write_piece(&message))
            }
        };
        if let Err(e) = result {
            warn!(error = %e, "failed to write progress line");
        }

        self.journal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }

    fn write_piece(&self, piece: &str) -> io::Result<()> {
        let mut sink = self.print.lock().unwrap_or_else(PoisonError::into_inner);
        sink.write_all(piece.as_bytes())?;
        sink.flush()
    }

    /// Snapshot of every event emitted so far, in emission order.
    pub fn journal(&self) -> Vec<ProgressEvent> {
        self.journal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
