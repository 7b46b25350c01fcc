use std::fmt;

use crate::store::Claim;

/// States a TA moves through while the run is in progress.
///
/// Each round flows through:
/// CHECKING_FINISHED → REVIEWING_RUBRIC → CLAIMING_QUESTION ⇄ MARKING →
/// ATTEMPTING_ADVANCE → CHECKING_TERMINAL → CHECKING_FINISHED, until the
/// finished flag sends the TA to EXITING.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    CheckingFinished,
    ReviewingRubric,
    ClaimingQuestion,
    Marking { claim: Claim },
    AttemptingAdvance,
    CheckingTerminal,
    Exiting,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerState::CheckingFinished => write!(f, "CHECKING_FINISHED"),
            WorkerState::ReviewingRubric => write!(f, "REVIEWING_RUBRIC"),
            WorkerState::ClaimingQuestion => write!(f, "CLAIMING_QUESTION"),
            WorkerState::Marking { claim } => write!(f, "MARKING(Q{})", claim.question + 1),
            WorkerState::AttemptingAdvance => write!(f, "ATTEMPTING_ADVANCE"),
            WorkerState::CheckingTerminal => write!(f, "CHECKING_TERMINAL"),
            WorkerState::Exiting => write!(f, "EXITING"),
        }
    }
}

/// What happened while a state was being carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    RoundOpened,
    RunFinished,
    RubricReviewed,
    Claimed(Claim),
    NothingToClaim,
    Marked,
    AdvanceAttempted,
    TerminalChecked,
}

/// Transition table for a TA.
pub struct WorkerMachine;

impl WorkerMachine {
    /// The state that follows `state` once `step` has happened, or `None`
    /// when `step` cannot occur in `state`.
    ///
    /// - Every advance outcome, including "not ready", moves on to the
    ///   terminal check: waiting for other TAs is not a barrier.
    /// - A TA keeps claiming until nothing is left, so marking loops back to
    ///   claiming rather than ending the round.
    /// - `Exiting` is terminal.
    pub fn next(state: WorkerState, step: Step) -> Option<WorkerState> {
        let next = match (state, step) {
            (WorkerState::CheckingFinished, Step::RoundOpened) => WorkerState::ReviewingRubric,
            (WorkerState::CheckingFinished, Step::RunFinished) => WorkerState::Exiting,
            (WorkerState::ReviewingRubric, Step::RubricReviewed) => WorkerState::ClaimingQuestion,
            (WorkerState::ClaimingQuestion, Step::Claimed(claim)) => WorkerState::Marking { claim },
            (WorkerState::ClaimingQuestion, Step::NothingToClaim) => WorkerState::AttemptingAdvance,
            (WorkerState::Marking { .. }, Step::Marked) => WorkerState::ClaimingQuestion,
            (WorkerState::AttemptingAdvance, Step::AdvanceAttempted) => {
                WorkerState::CheckingTerminal
            }
            (WorkerState::CheckingTerminal, Step::TerminalChecked) => WorkerState::CheckingFinished,
            (WorkerState::Exiting, _) => WorkerState::Exiting,
            _ => return None,
        };
        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claim(question: usize) -> Claim {
        Claim {
            exam_index: 0,
            student_id: 1,
            question,
        }
    }

    fn walk(steps: &[Step]) -> Vec<WorkerState> {
        let mut state = WorkerState::CheckingFinished;
        let mut history = vec![state];
        for step in steps {
            state = WorkerMachine::next(state, *step).unwrap();
            history.push(state);
        }
        history
    }

    #[test]
    fn full_round_walks_all_states() {
        let history = walk(&[
            Step::RoundOpened,
            Step::RubricReviewed,
            Step::Claimed(claim(0)),
            Step::Marked,
            Step::NothingToClaim,
            Step::AdvanceAttempted,
            Step::TerminalChecked,
        ]);
        assert_eq!(
            history,
            vec![
                WorkerState::CheckingFinished,
                WorkerState::ReviewingRubric,
                WorkerState::ClaimingQuestion,
                WorkerState::Marking { claim: claim(0) },
                WorkerState::ClaimingQuestion,
                WorkerState::AttemptingAdvance,
                WorkerState::CheckingTerminal,
                WorkerState::CheckingFinished,
            ]
        );
    }

    #[test]
    fn marking_loops_until_nothing_is_left() {
        let history = walk(&[
            Step::RoundOpened,
            Step::RubricReviewed,
            Step::Claimed(claim(0)),
            Step::Marked,
            Step::Claimed(claim(1)),
            Step::Marked,
            Step::Claimed(claim(2)),
            Step::Marked,
        ]);
        let marking = history
            .iter()
            .filter(|s| matches!(s, WorkerState::Marking { .. }))
            .count();
        assert_eq!(marking, 3);
        assert_eq!(history.last(), Some(&WorkerState::ClaimingQuestion));
    }

    #[test]
    fn finished_flag_exits() {
        let state = WorkerMachine::next(WorkerState::CheckingFinished, Step::RunFinished);
        assert_eq!(state, Some(WorkerState::Exiting));
    }

    #[test]
    fn exiting_is_terminal() {
        for step in [Step::RoundOpened, Step::Marked, Step::RunFinished] {
            assert_eq!(
                WorkerMachine::next(WorkerState::Exiting, step),
                Some(WorkerState::Exiting)
            );
        }
    }

    #[test]
    fn out_of_order_steps_are_rejected() {
        assert_eq!(
            WorkerMachine::next(WorkerState::ReviewingRubric, Step::Marked),
            None
        );
        assert_eq!(
            WorkerMachine::next(WorkerState::CheckingFinished, Step::Claimed(claim(0))),
            None
        );
        assert_eq!(
            WorkerMachine::next(WorkerState::AttemptingAdvance, Step::TerminalChecked),
            None
        );
    }

    #[test]
    fn state_display() {
        assert_eq!(WorkerState::CheckingFinished.to_string(), "CHECKING_FINISHED");
        assert_eq!(WorkerState::ReviewingRubric.to_string(), "REVIEWING_RUBRIC");
        assert_eq!(
            WorkerState::Marking { claim: claim(3) }.to_string(),
            "MARKING(Q4)"
        );
        assert_eq!(WorkerState::Exiting.to_string(), "EXITING");
    }
}
