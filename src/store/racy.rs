//! Unprotected store.
//!
//! Every operation reads, decides and writes as separate atomic steps with a
//! pause in between, so two TAs can both see question 3 unmarked, both see
//! the exam finished and both load the next one, or both bump the same
//! rubric letter from `A` to `B`. Nothing here is undefined behaviour; the
//! races are at the level of the algorithm.

use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU16, AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;

use super::{
    AdvanceOutcome, Claim, ExamCursor, ExamRecord, ExamView, MarkingStore, NUM_QUESTIONS,
    QuestionSlot, RubricEdit, RubricLine, Variant,
};
use crate::error::MarkingError;

const ORDER: Ordering = Ordering::SeqCst;

#[derive(Debug)]
pub struct RacyStore {
    catalog: Vec<ExamRecord>,
    questions: Vec<u32>,
    grades: Vec<AtomicU32>,
    index: AtomicUsize,
    student_id: AtomicU16,
    slots: [AtomicU8; NUM_QUESTIONS],
    finished: AtomicBool,
    /// Pause between a read and the write that depends on it.
    race_window: Duration,
}

impl RacyStore {
    pub fn new(
        rubric: Vec<RubricLine>,
        catalog: Vec<ExamRecord>,
        race_window: Duration,
    ) -> Result<Self, MarkingError> {
        let first = catalog.first().ok_or(MarkingError::EmptyExamList)?;
        let student_id = AtomicU16::new(first.student_id);
        Ok(Self {
            questions: rubric.iter().map(|l| l.question).collect(),
            grades: rubric.iter().map(|l| AtomicU32::new(l.grade as u32)).collect(),
            index: AtomicUsize::new(0),
            student_id,
            slots: std::array::from_fn(|_| AtomicU8::new(QuestionSlot::Unmarked as u8)),
            finished: AtomicBool::new(false),
            race_window,
            catalog,
        })
    }

    async fn pause(&self) {
        if self.race_window.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(self.race_window).await;
        }
    }

    fn slot(&self, question: usize) -> QuestionSlot {
        QuestionSlot::from_u8(self.slots[question].load(ORDER))
    }

    fn all_marked(&self) -> bool {
        (0..NUM_QUESTIONS).all(|q| self.slot(q) == QuestionSlot::Marked)
    }
}

impl MarkingStore for RacyStore {
    fn variant(&self) -> Variant {
        Variant::Racy
    }

    fn catalog(&self) -> &[ExamRecord] {
        &self.catalog
    }

    async fn begin_round(&self) -> Option<ExamView> {
        if self.finished.load(ORDER) {
            return None;
        }
        Some(ExamView {
            index: self.index.load(ORDER),
            student_id: self.student_id.load(ORDER),
        })
    }

    async fn advance_rubric_letter(&self, question: usize) -> Option<RubricEdit> {
        let cell = self.grades.get(question)?;
        let old = char::from_u32(cell.load(ORDER))?;
        let new = RubricLine::next_grade(old)?;
        self.pause().await;
        cell.store(new as u32, ORDER);
        Some(RubricEdit { question, old, new })
    }

    async fn claim_next_unmarked_question(&self) -> Option<Claim> {
        if self.finished.load(ORDER) {
            return None;
        }
        let exam_index = self.index.load(ORDER);
        let student_id = self.student_id.load(ORDER);
        let question = (0..NUM_QUESTIONS).find(|q| self.slot(*q) == QuestionSlot::Unmarked)?;
        self.pause().await;
        self.slots[question].store(QuestionSlot::InProgress as u8, ORDER);
        Some(Claim {
            exam_index,
            student_id,
            question,
        })
    }

    async fn complete_question(&self, claim: Claim) {
        // No check that the cursor still points at the claimed exam.
        if let Some(slot) = self.slots.get(claim.question) {
            slot.store(QuestionSlot::Marked as u8, ORDER);
        }
    }

    async fn try_advance_exam(&self) -> AdvanceOutcome {
        if self.finished.load(ORDER)
            || !self.all_marked()
            || self.student_id.load(ORDER) == super::TERMINAL_STUDENT_ID
        {
            return AdvanceOutcome::NotReady;
        }

        let from = self.index.load(ORDER);
        self.pause().await;

        let to = from + 1;
        let Some(record) = self.catalog.get(to) else {
            self.finished.store(true, ORDER);
            return AdvanceOutcome::Exhausted { last: from };
        };
        self.index.store(to, ORDER);
        self.student_id.store(record.student_id, ORDER);
        for slot in &self.slots {
            slot.store(QuestionSlot::Unmarked as u8, ORDER);
        }
        AdvanceOutcome::Advanced {
            from,
            to,
            record: record.clone(),
        }
    }

    async fn check_terminal_exam_done(&self) -> bool {
        if self.finished.load(ORDER)
            || self.student_id.load(ORDER) != super::TERMINAL_STUDENT_ID
            || !self.all_marked()
        {
            return false;
        }
        self.pause().await;
        self.finished.store(true, ORDER);
        true
    }

    fn is_finished(&self) -> bool {
        self.finished.load(ORDER)
    }

    fn rubric(&self) -> Vec<RubricLine> {
        self.questions
            .iter()
            .zip(&self.grades)
            .map(|(question, grade)| RubricLine {
                question: *question,
                grade: char::from_u32(grade.load(ORDER)).unwrap_or('?'),
            })
            .collect()
    }

    fn cursor(&self) -> ExamCursor {
        ExamCursor {
            index: self.index.load(ORDER),
            student_id: self.student_id.load(ORDER),
            slots: std::array::from_fn(|q| self.slot(q)),
            finished: self.finished.load(ORDER),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn store(ids: &[u16], window_ms: u64) -> Arc<RacyStore> {
        let rubric = (1..=NUM_QUESTIONS as u32)
            .map(|question| RubricLine {
                question,
                grade: 'A',
            })
            .collect();
        let catalog = ids
            .iter()
            .map(|id| ExamRecord {
                document: format!("exam_{id:04}.txt"),
                student_id: *id,
            })
            .collect();
        Arc::new(RacyStore::new(rubric, catalog, Duration::from_millis(window_ms)).unwrap())
    }

    #[tokio::test]
    async fn sequential_use_behaves_like_the_locked_store() {
        let store = store(&[1, 9999], 0);
        while let Some(claim) = store.claim_next_unmarked_question().await {
            store.complete_question(claim).await;
        }
        assert!(matches!(
            store.try_advance_exam().await,
            AdvanceOutcome::Advanced { from: 0, to: 1, .. }
        ));
        while let Some(claim) = store.claim_next_unmarked_question().await {
            store.complete_question(claim).await;
        }
        assert_eq!(store.try_advance_exam().await, AdvanceOutcome::NotReady);
        assert!(store.check_terminal_exam_done().await);
        assert!(store.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_claims_get_the_same_question() {
        let store = store(&[1], 10);

        let first = tokio::spawn({
            let store = Arc::clone(&store);
            async move { store.claim_next_unmarked_question().await }
        });
        let second = tokio::spawn({
            let store = Arc::clone(&store);
            async move { store.claim_next_unmarked_question().await }
        });

        let first = first.await.unwrap().unwrap();
        let second = second.await.unwrap().unwrap();
        assert_eq!(first.question, 0);
        assert_eq!(second.question, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_rubric_edits_lose_an_update() {
        let store = store(&[1], 10);

        let edits: Vec<_> = (0..2)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.advance_rubric_letter(0).await })
            })
            .collect();
        for edit in edits {
            let edit = edit.await.unwrap().unwrap();
            assert_eq!((edit.old, edit.new), ('A', 'B'));
        }
        assert_eq!(store.rubric()[0].grade, 'B');
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_advances_both_report_the_transition() {
        let store = store(&[1, 2, 3], 10);
        for slot in &store.slots {
            slot.store(QuestionSlot::Marked as u8, ORDER);
        }

        let advances: Vec<_> = (0..2)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.try_advance_exam().await })
            })
            .collect();
        let mut advanced = 0;
        for outcome in advances {
            if let AdvanceOutcome::Advanced { to, .. } = outcome.await.unwrap() {
                assert_eq!(to, 1);
                advanced += 1;
            }
        }
        assert_eq!(advanced, 2);
        assert_eq!(store.cursor().index, 1);
    }
}
