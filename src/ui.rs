//! Terminal summary for a finished run, styled with `console`.
//!
//! Progress lines come from the narrator while the run is going; this module
//! only prints what happens after every TA has exited.

use console::Style;

use crate::report::RunReport;
use crate::store::{ExamRecord, RubricLine};

/// Colours used for the end-of-run summary.
pub struct Summary {
    green: Style,
    red: Style,
    yellow: Style,
    dim: Style,
}

impl Default for Summary {
    fn default() -> Self {
        Self {
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
            dim: Style::new().dim(),
        }
    }
}

impl Summary {
    /// Prints totals, per-exam tallies and anything that points at a race.
    pub fn print(&self, report: &RunReport) {
        println!();
        println!(
            "{}",
            self.dim.apply_to(format!(
                "─── {} run, {} TAs, seed {} ───",
                report.variant, report.workers, report.seed
            ))
        );
        for exam in &report.exams {
            let marks = exam
                .marks
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" ");
            let style = if exam.duplicates() > 0 || exam.marks.contains(&0) {
                &self.yellow
            } else {
                &self.dim
            };
            println!(
                "  exam {:>3} (student {:04}): {} {}",
                exam.index,
                exam.student_id,
                style.apply_to(format!("[{marks}]")),
                self.dim.apply_to(format!("{} marks", exam.total()))
            );
        }
        println!("  final rubric: {}", report.final_rubric.join(" | "));

        if report.duplicate_marks > 0 {
            println!(
                "  {} {} duplicate mark(s) across {} advance(s)",
                self.yellow.apply_to("!"),
                report.duplicate_marks,
                report.advances
            );
        }
        let unmarked = report.unmarked_questions();
        if unmarked > 0 {
            println!(
                "  {} {unmarked} question(s) of visited exams never marked",
                self.yellow.apply_to("!")
            );
        }
        if report.finished {
            println!(
                "  {} {} marks, {} advance(s), {}ms",
                self.green.apply_to("✓"),
                report.marks,
                report.advances,
                report.duration_ms
            );
        } else {
            println!("  {} run ended without the finished flag", self.red.apply_to("✗"));
        }
    }

    /// Prints the run report as pretty JSON.
    pub fn print_json(&self, report: &RunReport) {
        println!("{}", self.dim.apply_to("─── Run Report ───"));
        println!("{}", serde_json::to_string_pretty(report).unwrap_or_default());
    }

    /// Prints what `check` loaded.
    pub fn print_inputs(&self, rubric: &[RubricLine], catalog: &[ExamRecord]) {
        println!("{}", self.green.apply_to("Rubric"));
        for line in rubric {
            println!("  {line}");
        }
        println!("{}", self.green.apply_to(format!("Exams ({})", catalog.len())));
        for (index, exam) in catalog.iter().enumerate() {
            let marker = if exam.is_terminal() {
                self.yellow.apply_to(" (terminal)").to_string()
            } else {
                String::new()
            };
            println!("  {index:>3}: {} student {:04}{marker}", exam.document, exam.student_id);
        }
        if !catalog.iter().any(ExamRecord::is_terminal) {
            println!(
                "  {} no terminal exam; the run ends when the catalog is exhausted",
                self.dim.apply_to("note:")
            );
        }
    }

    /// Prints a fatal startup error.
    pub fn print_error(&self, err: &anyhow::Error) {
        eprintln!("{} {err:#}", self.red.apply_to("error:"));
    }
}
