pub mod input;

use crate::embedding::GaitMetrics;
use crate::error::{GaitError, Result};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use std::fmt::Display;
use std::path::Path;

/// One runner (or animal) from the reference collection.
#[derive(Clone, Debug, PartialEq)]
pub struct RunnerRecord {
    pub name: String,
    pub cadence: f32,
    pub heel_strike: f32,
    pub vertical_oscillation: f32,
}

impl RunnerRecord {
    pub fn metrics(&self) -> GaitMetrics {
        GaitMetrics {
            cadence: self.cadence,
            heel_strike: self.heel_strike,
            vertical_oscillation: self.vertical_oscillation,
        }
    }
}

impl Display for RunnerRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Runner {{ name: {}, cadence: {}, heel_strike: {}, vertical_oscillation: {} }}",
            self.name, self.cadence, self.heel_strike, self.vertical_oscillation
        )
    }
}

// every field optional so a missing one can be reported by name instead of
// as a generic serde error
#[derive(Deserialize)]
struct RawRunnerRecord {
    name: Option<String>,
    cadence: Option<f32>,
    heel_strike: Option<f32>,
    vertical_oscillation: Option<f32>,
}

pub fn load_runners(path: &Path) -> Result<Vec<RunnerRecord>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| GaitError::Input(format!("read {} failed: {}", path.display(), e)))?;
    let runners = parse_runners(&content)?;
    info!("load {} runners from {}", runners.len(), path.display());
    Ok(runners)
}

/// Parses a JSON array of runner objects. The first malformed record fails
/// the whole collection.
pub fn parse_runners(content: &str) -> Result<Vec<RunnerRecord>> {
    let values: Vec<Value> = serde_json::from_str(content)
        .map_err(|e| GaitError::Input(format!("runner data must be a JSON array: {}", e)))?;

    let mut runners = Vec::with_capacity(values.len());
    let mut seen = HashSet::new();
    for (position, value) in values.into_iter().enumerate() {
        let runner = check_record(position, value)?;
        if !seen.insert(runner.name.clone()) {
            warn!(
                "duplicate runner name {:?} at record {}, later vector overwrites earlier",
                runner.name, position
            );
        }
        runners.push(runner);
    }
    Ok(runners)
}

fn check_record(position: usize, value: Value) -> Result<RunnerRecord> {
    let label = match value.get("name").and_then(Value::as_str) {
        Some(name) => format!("record {} ({:?})", position, name),
        None => format!("record {}", position),
    };
    let raw: RawRunnerRecord = serde_json::from_value(value)
        .map_err(|e| GaitError::Input(format!("{}: {}", label, e)))?;

    let missing = |field: &str| GaitError::Input(format!("{}: missing field `{}`", label, field));
    let name = raw.name.ok_or_else(|| missing("name"))?;
    if name.trim().is_empty() {
        return Err(GaitError::Input(format!("{}: empty name", label)));
    }

    // serde narrows out-of-range JSON numbers to f32 infinity
    let metric = |value: Option<f32>, field: &str| match value {
        None => Err(missing(field)),
        Some(v) if !v.is_finite() => Err(GaitError::Input(format!(
            "{}: field `{}` is not a finite f32",
            label, field
        ))),
        Some(v) => Ok(v),
    };

    Ok(RunnerRecord {
        cadence: metric(raw.cadence, "cadence")?,
        heel_strike: metric(raw.heel_strike, "heel_strike")?,
        vertical_oscillation: metric(raw.vertical_oscillation, "vertical_oscillation")?,
        name,
    })
}
