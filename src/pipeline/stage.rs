use std::fmt;
use std::path::Path;

use anyhow::Result;
use log::debug;
use serde::Serialize;

use crate::fileformat::tables::write_tsv;

///////////////////////////////
/// How far a unit, replicate pair or condition got.
///
/// Units go Ingested, Merged, Counted, Filtered, Deduplicated. Pairs go Joined, then
/// Normalized or Associated. Conditions end in Aggregated or MpraAnalyzeFormatted.
/// Failed marks the scope that broke, Blocked the scopes that depended on it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Ingested,
    Merged,
    Counted,
    Filtered,
    Deduplicated,
    Joined,
    Associated,
    Normalized,
    MpraAnalyzeFormatted,
    Aggregated,
    Failed,
    Blocked,
}

impl Stage {
    pub fn is_terminal_failure(&self) -> bool {
        matches!(self, Stage::Failed | Stage::Blocked)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Ingested => "ingested",
            Stage::Merged => "merged",
            Stage::Counted => "counted",
            Stage::Filtered => "filtered",
            Stage::Deduplicated => "deduplicated",
            Stage::Joined => "joined",
            Stage::Associated => "associated",
            Stage::Normalized => "normalized",
            Stage::MpraAnalyzeFormatted => "mpra_analyze_formatted",
            Stage::Aggregated => "aggregated",
            Stage::Failed => "failed",
            Stage::Blocked => "blocked",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Manifest,
    Unit,
    Pair,
    Condition,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryRow {
    pub scope: Scope,
    pub id: String,
    pub stage: Stage,
    pub detail: String,
}

///////////////////////////////
/// Latest stage of everything in a run, in the order each was first recorded
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub rows: Vec<SummaryRow>,
}

impl RunSummary {
    ///////////////////////////////
    /// Move a scope to a new stage. A scope seen before keeps its position in the summary
    pub fn record<I: Into<String>, D: Into<String>>(
        &mut self,
        scope: Scope,
        id: I,
        stage: Stage,
        detail: D,
    ) {
        let id = id.into();
        let detail = detail.into();
        debug!("{:?} {}: {}", scope, id, stage);
        match self.rows.iter_mut().find(|r| r.scope == scope && r.id == id) {
            Some(row) => {
                row.stage = stage;
                row.detail = detail;
            }
            None => self.rows.push(SummaryRow {
                scope,
                id,
                stage,
                detail,
            }),
        }
    }

    ///////////////////////////////
    /// Mark a scope as failed, noting the last stage it completed
    pub fn record_failure<I: Into<String>>(&mut self, scope: Scope, id: I, reason: &str) {
        let id = id.into();
        let detail = match self.stage_of(scope, &id) {
            Some(reached) if !reached.is_terminal_failure() => {
                format!("after {}: {}", reached, reason)
            }
            _ => reason.to_string(),
        };
        self.record(scope, id, Stage::Failed, detail);
    }

    pub fn stage_of(&self, scope: Scope, id: &str) -> Option<Stage> {
        self.rows
            .iter()
            .find(|r| r.scope == scope && r.id == id)
            .map(|r| r.stage)
    }

    pub fn num_failed(&self, scope: Scope) -> usize {
        self.rows
            .iter()
            .filter(|r| r.scope == scope && r.stage.is_terminal_failure())
            .count()
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        write_tsv(path, &["scope", "id", "stage", "detail"], &self.rows)
    }
}
