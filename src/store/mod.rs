//! Shared state store: rubric, exam catalog and the exam cursor every TA
//! reads and mutates.
//!
//! [`MarkingStore`] is the seam between the worker loop and the two
//! variants: [`LockedStore`] guards the state with a rubric lock and an exam
//! lock, [`RacyStore`] (feature `racy`) performs the same steps as separate
//! loads and stores so the races stay observable.

mod locked;
#[cfg(feature = "racy")]
mod racy;

use std::fmt;
use std::future::Future;

use serde::{Deserialize, Serialize};

pub use locked::LockedStore;
#[cfg(feature = "racy")]
pub use racy::RacyStore;

/// Questions per exam; defines the shape of the per-exam state.
pub const NUM_QUESTIONS: usize = 5;

/// Upper bound on the exam catalog.
pub const MAX_EXAMS: usize = 256;

/// Student number of the exam that ends the run once fully marked.
pub const TERMINAL_STUDENT_ID: u16 = 9999;

/// One grading criterion, displayed as `"<question>, <grade>"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RubricLine {
    pub question: u32,
    pub grade: char,
}

impl RubricLine {
    /// The grade one step further, if the current grade can move.
    pub fn next_grade(grade: char) -> Option<char> {
        match grade {
            'A'..='Y' => char::from_u32(grade as u32 + 1),
            _ => None,
        }
    }
}

impl fmt::Display for RubricLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.question, self.grade)
    }
}

/// A rubric correction made by one TA.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RubricEdit {
    /// Zero-based rubric line.
    pub question: usize,
    pub old: char,
    pub new: char,
}

/// An exam in the catalog. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamRecord {
    pub document: String,
    pub student_id: u16,
}

impl ExamRecord {
    pub fn is_terminal(&self) -> bool {
        self.student_id == TERMINAL_STUDENT_ID
    }
}

/// Progress of one question of the current exam.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum QuestionSlot {
    #[default]
    Unmarked = 0,
    InProgress = 1,
    Marked = 2,
}

impl QuestionSlot {
    #[cfg_attr(not(feature = "racy"), allow(dead_code))]
    pub(crate) fn from_u8(raw: u8) -> Self {
        match raw {
            0 => QuestionSlot::Unmarked,
            1 => QuestionSlot::InProgress,
            _ => QuestionSlot::Marked,
        }
    }
}

/// Which exam is current, how far its marking got, and whether the run is
/// over.
///
/// `student_id` always equals the catalog entry at `index` once a
/// transition has completed; `finished` never goes back to false.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExamCursor {
    pub index: usize,
    pub student_id: u16,
    pub slots: [QuestionSlot; NUM_QUESTIONS],
    pub finished: bool,
}

impl ExamCursor {
    pub fn new(first: &ExamRecord) -> Self {
        Self {
            index: 0,
            student_id: first.student_id,
            slots: [QuestionSlot::Unmarked; NUM_QUESTIONS],
            finished: false,
        }
    }

    pub fn all_marked(&self) -> bool {
        self.slots.iter().all(|s| *s == QuestionSlot::Marked)
    }

    pub fn is_terminal(&self) -> bool {
        self.student_id == TERMINAL_STUDENT_ID
    }
}

/// What a TA sees when it starts a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExamView {
    pub index: usize,
    pub student_id: u16,
}

/// A question reserved by one TA.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Claim {
    pub exam_index: usize,
    pub student_id: u16,
    /// Zero-based question index.
    pub question: usize,
}

/// Result of trying to move the cursor past the current exam.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdvanceOutcome {
    /// This caller moved the cursor to `to`.
    Advanced {
        from: usize,
        to: usize,
        record: ExamRecord,
    },
    /// The last catalog entry was fully marked; the run is finished.
    Exhausted { last: usize },
    /// Questions are still open, the run is over, or the current exam is the
    /// terminal one.
    NotReady,
}

/// Which store implementation a run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    Locked,
    #[cfg(feature = "racy")]
    Racy,
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Locked => write!(f, "locked"),
            #[cfg(feature = "racy")]
            Variant::Racy => write!(f, "racy"),
        }
    }
}

/// Operations the TA loop performs on the shared state.
///
/// In [`LockedStore`] each operation is one critical section; none of them
/// suspends while holding a lock. Steady-state operations have no error
/// path: every call either changes the state or is a no-op.
pub trait MarkingStore: Send + Sync + 'static {
    fn variant(&self) -> Variant;

    fn catalog(&self) -> &[ExamRecord];

    /// Current exam, or `None` once the run is finished.
    fn begin_round(&self) -> impl Future<Output = Option<ExamView>> + Send;

    /// Moves the grade of one rubric line one letter forward.
    fn advance_rubric_letter(
        &self,
        question: usize,
    ) -> impl Future<Output = Option<RubricEdit>> + Send;

    /// Reserves the lowest unmarked question of the current exam.
    fn claim_next_unmarked_question(&self) -> impl Future<Output = Option<Claim>> + Send;

    /// Records that the claimed question has been graded.
    fn complete_question(&self, claim: Claim) -> impl Future<Output = ()> + Send;

    fn try_advance_exam(&self) -> impl Future<Output = AdvanceOutcome> + Send;

    /// Sets `finished` when the terminal exam is fully marked.
    fn check_terminal_exam_done(&self) -> impl Future<Output = bool> + Send;

    fn is_finished(&self) -> bool;

    fn rubric(&self) -> Vec<RubricLine>;

    fn cursor(&self) -> ExamCursor;
}
