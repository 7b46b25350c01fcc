use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use super::{
    AdvanceOutcome, Claim, ExamCursor, ExamRecord, ExamView, MarkingStore, NUM_QUESTIONS,
    QuestionSlot, RubricEdit, RubricLine, Variant,
};
use crate::error::MarkingError;

/// Shared state guarded by two independent locks.
///
/// The rubric lock serialises rubric edits; the exam lock covers every read
/// and write of the cursor. The two are never held at the same time, and no
/// method suspends while holding either.
#[derive(Debug)]
pub struct LockedStore {
    catalog: Vec<ExamRecord>,
    rubric: Mutex<Vec<RubricLine>>,
    exam: Mutex<ExamCursor>,
}

impl LockedStore {
    /// Builds the store with the first catalog entry loaded as the current
    /// exam.
    pub fn new(rubric: Vec<RubricLine>, catalog: Vec<ExamRecord>) -> Result<Self, MarkingError> {
        let first = catalog.first().ok_or(MarkingError::EmptyExamList)?;
        let cursor = ExamCursor::new(first);
        Ok(Self {
            rubric: Mutex::new(rubric),
            exam: Mutex::new(cursor),
            catalog,
        })
    }

    fn rubric_lock(&self) -> MutexGuard<'_, Vec<RubricLine>> {
        self.rubric.lock().unwrap_or_else(|poisoned| {
            warn!("rubric lock poisoned, recovering");
            PoisonError::into_inner(poisoned)
        })
    }

    fn exam_lock(&self) -> MutexGuard<'_, ExamCursor> {
        self.exam.lock().unwrap_or_else(|poisoned| {
            warn!("exam lock poisoned, recovering");
            PoisonError::into_inner(poisoned)
        })
    }
}

impl MarkingStore for LockedStore {
    fn variant(&self) -> Variant {
        Variant::Locked
    }

    fn catalog(&self) -> &[ExamRecord] {
        &self.catalog
    }

    async fn begin_round(&self) -> Option<ExamView> {
        let cursor = self.exam_lock();
        if cursor.finished {
            return None;
        }
        Some(ExamView {
            index: cursor.index,
            student_id: cursor.student_id,
        })
    }

    async fn advance_rubric_letter(&self, question: usize) -> Option<RubricEdit> {
        let mut rubric = self.rubric_lock();
        let line = rubric.get_mut(question)?;
        let old = line.grade;
        let new = RubricLine::next_grade(old)?;
        line.grade = new;
        Some(RubricEdit { question, old, new })
    }

    async fn claim_next_unmarked_question(&self) -> Option<Claim> {
        let mut cursor = self.exam_lock();
        if cursor.finished {
            return None;
        }
        let question = cursor
            .slots
            .iter()
            .position(|slot| *slot == QuestionSlot::Unmarked);
        let Some(question) = question else {
            debug!(exam = cursor.index, "no unmarked question left");
            return None;
        };
        cursor.slots[question] = QuestionSlot::InProgress;
        Some(Claim {
            exam_index: cursor.index,
            student_id: cursor.student_id,
            question,
        })
    }

    async fn complete_question(&self, claim: Claim) {
        let mut cursor = self.exam_lock();
        if cursor.index != claim.exam_index || claim.question >= NUM_QUESTIONS {
            debug!(?claim, current = cursor.index, "completion for a stale exam ignored");
            return;
        }
        cursor.slots[claim.question] = QuestionSlot::Marked;
    }

    async fn try_advance_exam(&self) -> AdvanceOutcome {
        let mut cursor = self.exam_lock();
        if cursor.finished || !cursor.all_marked() || cursor.is_terminal() {
            return AdvanceOutcome::NotReady;
        }

        let from = cursor.index;
        let to = from + 1;
        let Some(record) = self.catalog.get(to) else {
            cursor.finished = true;
            return AdvanceOutcome::Exhausted { last: from };
        };

        cursor.index = to;
        cursor.student_id = record.student_id;
        cursor.slots = [QuestionSlot::Unmarked; NUM_QUESTIONS];
        AdvanceOutcome::Advanced {
            from,
            to,
            record: record.clone(),
        }
    }

    async fn check_terminal_exam_done(&self) -> bool {
        let mut cursor = self.exam_lock();
        if !cursor.finished && cursor.is_terminal() && cursor.all_marked() {
            cursor.finished = true;
            return true;
        }
        false
    }

    fn is_finished(&self) -> bool {
        self.exam_lock().finished
    }

    fn rubric(&self) -> Vec<RubricLine> {
        self.rubric_lock().clone()
    }

    fn cursor(&self) -> ExamCursor {
        self.exam_lock().clone()
    }
}
