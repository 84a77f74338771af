use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Local};

use crate::job_boards::JobRecord;


/// Listings accepted during this run, rewritten in full to one JSON file on every addition.
pub(crate) struct MatchSet {
    path: PathBuf,
    records: Vec<JobRecord>,
}


impl MatchSet {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self { path, records: vec![] }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    pub(crate) fn records(&self) -> &[JobRecord] {
        &self.records
    }

    /// Appends `record` with its description blanked, then flushes the whole set.
    pub(crate) fn push(&mut self, record: JobRecord) -> anyhow::Result<()> {
        self.records.push(record.without_description());
        save_job_infos(&self.path, &self.records)
    }
}


/// Overwrites `path` with `records` as one JSON array.
pub(crate) fn save_job_infos(path: &Path, records: &[JobRecord]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}. Do we have permissions?", parent.display()))?;
    }
    let json = serde_json::to_vec_pretty(records)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}


/// `<dir>/<keyword>-<timestamp>.json`, with the keyword reduced to lower case letters, digits and dashes.
pub(crate) fn output_path(dir: &Path, keyword: &str, now: DateTime<Local>) -> PathBuf {
    let mut slug = String::with_capacity(keyword.len());
    for c in keyword.trim().chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            slug.push(c);
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_matches('-');
    let slug = if slug.is_empty() { "jobs" } else { slug };
    dir.join(format!("{slug}-{}.json", now.format("%Y%m%d-%H%M%S")))
}
