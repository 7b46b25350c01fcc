use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::narrator::ProgressEvent;
use crate::store::{ExamRecord, RubricLine, Variant};
use crate::worker::WorkerSummary;

/// Marks recorded for one exam.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExamTally {
    pub index: usize,
    pub student_id: u16,
    /// Mark events per question, zero-based.
    pub marks: Vec<u32>,
}

impl ExamTally {
    pub fn total(&self) -> u32 {
        self.marks.iter().sum()
    }

    /// Questions marked more than once, and how many extra times.
    pub fn duplicates(&self) -> u32 {
        self.marks.iter().map(|m| m.saturating_sub(1)).sum()
    }
}

/// Structured record produced at the end of a run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub variant: Variant,
    pub workers: usize,
    pub seed: u64,
    pub exams_in_catalog: usize,
    pub exams: Vec<ExamTally>,
    pub advances: usize,
    pub marks: u32,
    pub duplicate_marks: u32,
    pub finished: bool,
    pub final_rubric: Vec<String>,
    pub tas: Vec<WorkerSummary>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: i64,
}

/// Inputs to [`RunReport::build`] gathered by the supervisor.
pub struct RunFacts<'a> {
    pub variant: Variant,
    pub seed: u64,
    pub catalog: &'a [ExamRecord],
    pub rubric: &'a [RubricLine],
    pub finished: bool,
    pub tas: Vec<WorkerSummary>,
    pub started_at: DateTime<Utc>,
}

impl RunReport {
    pub fn build(facts: RunFacts<'_>, journal: &[ProgressEvent]) -> Self {
        let exams = tally_marks(journal, facts.catalog);
        let advances = journal
            .iter()
            .filter(|e| matches!(e, ProgressEvent::ExamAdvanced { .. }))
            .count();
        let completed_at = Utc::now();

        Self {
            run_id: Uuid::new_v4(),
            variant: facts.variant,
            workers: facts.tas.len(),
            seed: facts.seed,
            exams_in_catalog: facts.catalog.len(),
            advances,
            marks: exams.iter().map(ExamTally::total).sum(),
            duplicate_marks: exams.iter().map(ExamTally::duplicates).sum(),
            exams,
            finished: facts.finished,
            final_rubric: facts.rubric.iter().map(ToString::to_string).collect(),
            tas: facts.tas,
            started_at: facts.started_at,
            completed_at,
            duration_ms: (completed_at - facts.started_at).num_milliseconds(),
        }
    }

    /// Questions of visited exams that never got a mark event.
    pub fn unmarked_questions(&self) -> u32 {
        self.exams
            .iter()
            .map(|t| t.marks.iter().filter(|m| **m == 0).count() as u32)
            .sum()
    }
}

/// Mark events grouped by exam, for every exam some TA worked on.
fn tally_marks(journal: &[ProgressEvent], catalog: &[ExamRecord]) -> Vec<ExamTally> {
    let mut counts: BTreeMap<usize, HashMap<usize, u32>> = BTreeMap::new();
    for event in journal {
        match event {
            ProgressEvent::StartingExam { index, .. } | ProgressEvent::ExamLoaded { index, .. } => {
                counts.entry(*index).or_default();
            }
            ProgressEvent::QuestionMarked {
                exam_index,
                question,
                ..
            } => {
                *counts
                    .entry(*exam_index)
                    .or_default()
                    .entry(*question)
                    .or_default() += 1;
            }
            _ => {}
        }
    }

    counts
        .into_iter()
        .map(|(index, per_question)| ExamTally {
            index,
            student_id: catalog.get(index).map_or(0, |r| r.student_id),
            marks: (0..crate::store::NUM_QUESTIONS)
                .map(|q| per_question.get(&q).copied().unwrap_or(0))
                .collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::narrator::Actor;

    fn marked(ta: u32, exam_index: usize, question: usize) -> ProgressEvent {
        ProgressEvent::QuestionMarked {
            ta,
            exam_index,
            student_id: 1,
            question,
        }
    }

    fn catalog() -> Vec<ExamRecord> {
        vec![
            ExamRecord {
                document: "a.txt".into(),
                student_id: 1,
            },
            ExamRecord {
                document: "b.txt".into(),
                student_id: 9999,
            },
        ]
    }

    fn facts(catalog: &[ExamRecord]) -> RunFacts<'_> {
        RunFacts {
            variant: Variant::Locked,
            seed: 1,
            catalog,
            rubric: &[],
            finished: true,
            tas: vec![WorkerSummary::default(), WorkerSummary::default()],
            started_at: Utc::now(),
        }
    }

    #[test]
    fn tally_counts_duplicates_and_gaps() {
        let catalog = catalog();
        let journal = vec![
            ProgressEvent::ExamLoaded {
                actor: Actor::Supervisor,
                index: 0,
                document: "a.txt".into(),
                student_id: 1,
            },
            marked(1, 0, 0),
            marked(2, 0, 0),
            marked(1, 0, 1),
            ProgressEvent::ExamAdvanced {
                ta: 1,
                from: 0,
                to: 1,
            },
            marked(3, 1, 4),
        ];

        let report = RunReport::build(facts(&catalog), &journal);
        assert_eq!(report.exams.len(), 2);
        assert_eq!(report.exams[0].marks, vec![2, 1, 0, 0, 0]);
        assert_eq!(report.exams[0].total(), 3);
        assert_eq!(report.exams[0].duplicates(), 1);
        assert_eq!(report.exams[1].student_id, 9999);
        assert_eq!(report.marks, 4);
        assert_eq!(report.duplicate_marks, 1);
        assert_eq!(report.advances, 1);
        assert_eq!(report.workers, 2);
        assert_eq!(report.unmarked_questions(), 3 + 4);
    }

    #[test]
    fn report_serializes_to_json() {
        let catalog = catalog();
        let report = RunReport::build(facts(&catalog), &[]);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["variant"], "locked");
        assert_eq!(json["exams_in_catalog"], 2);
        assert!(json["run_id"].is_string());
    }
}
