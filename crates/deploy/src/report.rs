//! Run report: one row per artifact and phase.

use std::fmt;

use comfy_table::{Table, presets::UTF8_FULL};
use derive_more::Deref;
use serde::Serialize;

/// Pipeline phase a report row belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display, strum::EnumString)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    Deploy,
    Init,
}

/// Outcome of one artifact in one phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display, strum::EnumString)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum Outcome {
    Ok,
    Skipped,
    Failed,
}

/// One row of the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportEntry {
    pub artifact: String,
    pub phase: Phase,
    pub outcome: Outcome,
    /// Human-readable detail: an address, a skip reason or an error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Ordered report rows, appended to while the run progresses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deref)]
#[serde(transparent)]
pub struct RunReport(Vec<ReportEntry>);

/// Counters printed under the report table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub deployed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub initialized: usize,
}

impl RunReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(
        &mut self,
        artifact: &str,
        phase: Phase,
        outcome: Outcome,
        note: impl Into<Option<String>>,
    ) {
        let entry = ReportEntry {
            artifact: artifact.to_string(),
            phase,
            outcome,
            note: note.into(),
        };

        match outcome {
            Outcome::Failed => tracing::warn!(
                artifact = %entry.artifact,
                phase = %phase,
                note = entry.note.as_deref().unwrap_or_default(),
                "Artifact failed"
            ),
            _ => tracing::info!(
                artifact = %entry.artifact,
                phase = %phase,
                outcome = %outcome,
                note = entry.note.as_deref().unwrap_or_default(),
                "Artifact processed"
            ),
        }

        self.0.push(entry);
    }

    /// The row for `artifact` in `phase`, if one was recorded.
    pub fn entry(&self, artifact: &str, phase: Phase) -> Option<&ReportEntry> {
        self.0
            .iter()
            .find(|e| e.artifact == artifact && e.phase == phase)
    }

    /// Rows of one phase, in recording order.
    pub fn phase(&self, phase: Phase) -> impl Iterator<Item = &ReportEntry> {
        self.0.iter().filter(move |e| e.phase == phase)
    }

    pub fn summary(&self) -> RunSummary {
        let mut summary = RunSummary::default();
        for entry in &self.0 {
            match (entry.phase, entry.outcome) {
                (Phase::Deploy, Outcome::Ok) => summary.deployed += 1,
                (Phase::Init, Outcome::Ok) => summary.initialized += 1,
                (_, Outcome::Skipped) => summary.skipped += 1,
                (_, Outcome::Failed) => summary.failed += 1,
            }
        }
        summary
    }

    /// Render the rows as a table.
    pub fn to_table(&self) -> Table {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_header(vec!["Artifact", "Phase", "Outcome", "Note"]);
        for entry in &self.0 {
            table.add_row(vec![
                entry.artifact.clone(),
                entry.phase.to_string(),
                entry.outcome.to_string(),
                entry.note.clone().unwrap_or_default(),
            ]);
        }
        table
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "deployed: {}, skipped: {}, failed: {}, initialized: {}",
            self.deployed, self.skipped, self.failed, self.initialized
        )
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.to_table())?;
        write!(f, "{}", self.summary())
    }
}
