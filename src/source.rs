use std::path::Path;

use anyhow::Context;
use serde::de::DeserializeOwned;

use crate::models::{CheatMeal, DailyLog};

pub fn read_daily_logs(path: &Path) -> anyhow::Result<Vec<DailyLog>> {
    read_rows(path)
}

pub fn read_cheat_meals(path: &Path) -> anyhow::Result<Vec<CheatMeal>> {
    read_rows(path)
}

fn read_rows<T: DeserializeOwned>(path: &Path) -> anyhow::Result<Vec<T>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let mut rows = Vec::new();

    for (index, result) in reader.deserialize::<T>().enumerate() {
        // Line 1 is the header.
        let row = result.with_context(|| format!("{} line {}", path.display(), index + 2))?;
        rows.push(row);
    }

    tracing::debug!(path = %path.display(), rows = rows.len(), "read csv rows");
    Ok(rows)
}
