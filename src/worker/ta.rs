use std::sync::Arc;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::Serialize;
use tokio::time::sleep;
use tracing::{debug, error, trace};

use super::state::{Step, WorkerMachine, WorkerState};
use crate::config::{DelayRange, MarkingConfig};
use crate::narrator::{Actor, Narrator, ProgressEvent};
use crate::store::{AdvanceOutcome, Claim, MarkingStore, NUM_QUESTIONS};

/// Simulated effort and the odds of touching the rubric.
#[derive(Debug, Clone, Copy)]
pub struct Timing {
    pub review: DelayRange,
    pub mark: DelayRange,
    pub correction_probability: f64,
    pub time_scale: f64,
}

impl From<&MarkingConfig> for Timing {
    fn from(config: &MarkingConfig) -> Self {
        Self {
            review: config.review_delay_ms,
            mark: config.mark_delay_ms,
            correction_probability: config.correction_probability,
            time_scale: config.time_scale,
        }
    }
}

/// What one TA did during the run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WorkerSummary {
    pub ta: u32,
    pub rounds: u32,
    pub questions_marked: u32,
    pub rubric_corrections: u32,
    pub advances: u32,
}

/// One TA: reviews the rubric, marks whatever questions it can claim, tries
/// to move the shared cursor on, and stops once the run is finished.
pub struct TeachingAssistant<S> {
    id: u32,
    store: Arc<S>,
    narrator: Arc<Narrator>,
    timing: Timing,
    rng: ChaCha20Rng,
}

impl<S: MarkingStore> TeachingAssistant<S> {
    /// `seed` is the run seed; each TA derives its own stream from it.
    pub fn new(id: u32, store: Arc<S>, narrator: Arc<Narrator>, timing: Timing, seed: u64) -> Self {
        Self {
            id,
            store,
            narrator,
            timing,
            rng: ChaCha20Rng::seed_from_u64(seed.wrapping_add(u64::from(id))),
        }
    }

    pub async fn run(mut self) -> WorkerSummary {
        let mut summary = WorkerSummary {
            ta: self.id,
            ..Default::default()
        };
        let mut state = WorkerState::CheckingFinished;
        let mut student_id = 0;

        while state != WorkerState::Exiting {
            trace!(ta = self.id, %state, "enter");
            let step = match state {
                WorkerState::CheckingFinished => match self.store.begin_round().await {
                    Some(view) => {
                        summary.rounds += 1;
                        student_id = view.student_id;
                        self.narrator.emit(ProgressEvent::StartingExam {
                            ta: self.id,
                            index: view.index,
                            student_id,
                        });
                        Step::RoundOpened
                    }
                    None => Step::RunFinished,
                },
                WorkerState::ReviewingRubric => {
                    summary.rubric_corrections += self.review_rubric(student_id).await;
                    Step::RubricReviewed
                }
                WorkerState::ClaimingQuestion => {
                    match self.store.claim_next_unmarked_question().await {
                        Some(claim) => Step::Claimed(claim),
                        None => Step::NothingToClaim,
                    }
                }
                WorkerState::Marking { claim } => {
                    self.mark(claim).await;
                    summary.questions_marked += 1;
                    Step::Marked
                }
                WorkerState::AttemptingAdvance => {
                    if self.attempt_advance().await {
                        summary.advances += 1;
                    }
                    Step::AdvanceAttempted
                }
                WorkerState::CheckingTerminal => {
                    if self.store.check_terminal_exam_done().await {
                        self.narrator.emit(ProgressEvent::TerminalExamDone {
                            ta: self.id,
                            student_id: self.store.cursor().student_id,
                        });
                    }
                    Step::TerminalChecked
                }
                WorkerState::Exiting => break,
            };

            state = match WorkerMachine::next(state, step) {
                Some(next) => next,
                None => {
                    error!(ta = self.id, %state, ?step, "step not valid in state, exiting");
                    WorkerState::Exiting
                }
            };
        }

        self.narrator.emit(ProgressEvent::WorkerExiting { ta: self.id });
        summary
    }

    /// Thinks about each rubric line and sometimes corrects it. Returns how
    /// many corrections landed.
    async fn review_rubric(&mut self, student_id: u16) -> u32 {
        self.narrator.emit(ProgressEvent::ReviewingRubric {
            ta: self.id,
            student_id,
        });

        let mut corrections = 0;
        for question in 0..NUM_QUESTIONS {
            sleep(self.timing.review.sample(&mut self.rng, self.timing.time_scale)).await;

            if !self.rng.gen_bool(self.timing.correction_probability) {
                continue;
            }
            if let Some(edit) = self.store.advance_rubric_letter(question).await {
                corrections += 1;
                self.narrator.emit(ProgressEvent::RubricCorrected {
                    ta: self.id,
                    question: edit.question,
                    old: edit.old,
                    new: edit.new,
                });
            }
        }
        corrections
    }

    async fn mark(&mut self, claim: Claim) {
        sleep(self.timing.mark.sample(&mut self.rng, self.timing.time_scale)).await;
        self.narrator.emit(ProgressEvent::QuestionMarked {
            ta: self.id,
            exam_index: claim.exam_index,
            student_id: claim.student_id,
            question: claim.question,
        });
        self.store.complete_question(claim).await;
    }

    /// Returns true when this TA performed the transition.
    async fn attempt_advance(&self) -> bool {
        match self.store.try_advance_exam().await {
            AdvanceOutcome::Advanced { from, to, record } => {
                self.narrator.emit(ProgressEvent::ExamAdvanced {
                    ta: self.id,
                    from,
                    to,
                });
                self.narrator.emit(ProgressEvent::ExamLoaded {
                    actor: Actor::Ta(self.id),
                    index: to,
                    document: record.document,
                    student_id: record.student_id,
                });
                true
            }
            AdvanceOutcome::Exhausted { last } => {
                self.narrator.emit(ProgressEvent::CatalogExhausted { ta: self.id, last });
                false
            }
            AdvanceOutcome::NotReady => {
                debug!(ta = self.id, "exam not ready to advance");
                false
            }
        }
    }
}
