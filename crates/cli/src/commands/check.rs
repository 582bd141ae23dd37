//! `tof check`: register, validate and optionally recover contexts from a
//! JSON file.

use serde::Deserialize;
use std::path::Path;
use tof_core::context::{ContextType, Payload, RecoverySource};
use tof_engine::ToFManager;
use tracing::warn;

/// One context as written in the input file.
#[derive(Debug, Clone, Deserialize)]
pub struct ContextEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub context_type: ContextType,
    #[serde(default)]
    pub data: Payload,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub parent_id: Option<String>,
}

/// What happened to one entry.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryOutcome {
    Passed { version: u64, message: String },
    Failed { message: String },
    Recovered { source: RecoverySource, message: String },
}

#[derive(Debug, Default)]
pub struct CheckReport {
    pub outcomes: Vec<(String, EntryOutcome)>,
}

impl CheckReport {
    pub fn passed(&self) -> usize {
        self.count(|o| matches!(o, EntryOutcome::Passed { .. }))
    }

    pub fn recovered(&self) -> usize {
        self.count(|o| matches!(o, EntryOutcome::Recovered { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, EntryOutcome::Failed { .. }))
    }

    fn count(&self, pred: impl Fn(&EntryOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|(_, o)| pred(o)).count()
    }
}

pub fn parse_entries(raw: &str) -> Result<Vec<ContextEntry>, serde_json::Error> {
    serde_json::from_str(raw)
}

/// Register every entry, validate them concurrently, then recover the
/// failures when asked to and validate the recovered copies once more.
pub async fn check_entries(
    manager: &ToFManager,
    entries: Vec<ContextEntry>,
    recover: bool,
) -> Result<CheckReport, tof_core::Error> {
    let ids: Vec<String> = entries.iter().map(|e| e.id.clone()).collect();
    for entry in entries {
        manager.register_context(
            entry.id,
            entry.data,
            entry.context_type,
            entry.tags,
            entry.parent_id,
        );
    }

    let mut report = CheckReport::default();
    for (id, result) in manager.validate_many(&ids).await {
        let result = result?;
        let outcome = if result.passed {
            EntryOutcome::Passed {
                version: result.version,
                message: result.message,
            }
        } else if recover {
            recover_entry(manager, &id, result.message).await?
        } else {
            EntryOutcome::Failed {
                message: result.message,
            }
        };
        report.outcomes.push((id, outcome));
    }
    Ok(report)
}

async fn recover_entry(
    manager: &ToFManager,
    id: &str,
    failure: String,
) -> Result<EntryOutcome, tof_core::Error> {
    let recovered = manager.recover_context(id).await?;
    if recovered.source == RecoverySource::Unrecovered {
        return Ok(EntryOutcome::Failed { message: failure });
    }

    let revalidated = manager.validate_context(id).await?;
    if revalidated.passed {
        Ok(EntryOutcome::Recovered {
            source: recovered.source,
            message: revalidated.message,
        })
    } else {
        warn!(context_id = id, source = %recovered.source, "Recovered copy still invalid");
        Ok(EntryOutcome::Failed {
            message: revalidated.message,
        })
    }
}

pub async fn run(
    config_path: Option<&Path>,
    file: &Path,
    recover: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path).map_err(|e| format!("Failed to load config: {e}"))?;
    let raw = std::fs::read_to_string(file)
        .map_err(|e| format!("Failed to read {}: {e}", file.display()))?;
    let entries = parse_entries(&raw).map_err(|e| format!("Invalid context file: {e}"))?;

    let manager = ToFManager::from_config(&config)?;
    println!("🔎 Checking {} context(s) from {}\n", entries.len(), file.display());

    let report = check_entries(&manager, entries, recover).await?;
    for (id, outcome) in &report.outcomes {
        match outcome {
            EntryOutcome::Passed { version, message } => {
                println!("  ✅ {id} (v{version}): {message}")
            }
            EntryOutcome::Recovered { source, message } => {
                println!("  🔧 {id} recovered from {source}: {message}")
            }
            EntryOutcome::Failed { message } => println!("  ❌ {id}: {message}"),
        }
    }

    println!(
        "\n{} passed, {} recovered, {} failed",
        report.passed(),
        report.recovered(),
        report.failed()
    );

    if report.failed() > 0 {
        return Err(format!("{} context(s) failed validation", report.failed()).into());
    }
    Ok(())
}
