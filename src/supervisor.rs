//! Starts the TAs against a shared store, waits for all of them and
//! reports on the run.

use std::io::Write;
use std::sync::Arc;

use anyhow::{Result, bail};
use chrono::Utc;
use tracing::{error, info};

use crate::config::MarkingConfig;
use crate::error::MarkingError;
use crate::narrator::{Actor, Narrator, OutputMode, ProgressEvent};
use crate::report::{RunFacts, RunReport};
#[cfg(feature = "racy")]
use crate::store::RacyStore;
use crate::store::{ExamRecord, LockedStore, MarkingStore, RubricLine, Variant};
use crate::worker::{TeachingAssistant, Timing};

/// Minimum TA count for the run to mean anything.
pub const MIN_WORKERS: usize = 2;

/// Owns the run: builds the shared store, spawns the TAs, joins them.
#[derive(Debug, Clone)]
pub struct Supervisor {
    config: MarkingConfig,
    workers: usize,
    seed: u64,
}

impl Supervisor {
    /// Fails when fewer than [`MIN_WORKERS`] TAs are requested.
    pub fn new(config: MarkingConfig, workers: usize) -> Result<Self, MarkingError> {
        if workers < MIN_WORKERS {
            return Err(MarkingError::TooFewWorkers(workers));
        }
        let seed = config.seed.unwrap_or_else(rand::random);
        Ok(Self {
            config,
            workers,
            seed,
        })
    }

    /// Builds the store for `variant` and runs the TAs against it, writing
    /// progress lines to `sink`.
    pub async fn run_variant(
        &self,
        variant: Variant,
        rubric: Vec<RubricLine>,
        catalog: Vec<ExamRecord>,
        sink: Box<dyn Write + Send>,
    ) -> Result<RunReport> {
        match variant {
            Variant::Locked => {
                let store = Arc::new(LockedStore::new(rubric, catalog)?);
                let narrator = Arc::new(Narrator::new(sink, OutputMode::Serialized));
                self.run(store, narrator).await
            }
            #[cfg(feature = "racy")]
            Variant::Racy => {
                let store = Arc::new(RacyStore::new(rubric, catalog, self.config.race_window())?);
                let narrator = Arc::new(Narrator::new(sink, OutputMode::Unserialized));
                self.run(store, narrator).await
            }
        }
    }

    /// Runs every TA to completion against `store`.
    pub async fn run<S: MarkingStore>(
        &self,
        store: Arc<S>,
        narrator: Arc<Narrator>,
    ) -> Result<RunReport> {
        let started_at = Utc::now();
        info!(
            variant = %store.variant(),
            workers = self.workers,
            seed = self.seed,
            exams = store.catalog().len(),
            "starting marking run"
        );

        let Some(first) = store.catalog().first() else {
            bail!(MarkingError::EmptyExamList);
        };
        narrator.emit(ProgressEvent::ExamLoaded {
            actor: Actor::Supervisor,
            index: 0,
            document: first.document.clone(),
            student_id: first.student_id,
        });

        let timing = Timing::from(&self.config);
        let handles: Vec<_> = (1..=self.workers as u32)
            .map(|id| {
                let ta = TeachingAssistant::new(
                    id,
                    Arc::clone(&store),
                    Arc::clone(&narrator),
                    timing,
                    self.seed,
                );
                (id, tokio::spawn(ta.run()))
            })
            .collect();

        let mut summaries = Vec::with_capacity(handles.len());
        let mut failed = 0;
        for (id, handle) in handles {
            match handle.await {
                Ok(summary) => summaries.push(summary),
                Err(e) => {
                    error!(ta = id, error = %e, "TA task failed");
                    failed += 1;
                }
            }
        }
        if failed > 0 {
            bail!("{failed} of {} TAs did not finish", self.workers);
        }

        narrator.emit(ProgressEvent::AllFinished);

        let rubric = store.rubric();
        let report = RunReport::build(
            RunFacts {
                variant: store.variant(),
                seed: self.seed,
                catalog: store.catalog(),
                rubric: &rubric,
                finished: store.is_finished(),
                tas: summaries,
                started_at,
            },
            &narrator.journal(),
        );
        info!(
            marks = report.marks,
            advances = report.advances,
            duplicates = report.duplicate_marks,
            duration_ms = report.duration_ms,
            "marking run finished"
        );
        Ok(report)
    }
}
