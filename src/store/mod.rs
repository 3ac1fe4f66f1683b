use crate::error::SurveyError;
use crate::models::{Category, RoundRecord, SurveyResults};
use crate::survey::scoring::scores_by_name;
use chrono::{DateTime, Local};
use log::{info, warn};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// Running results file plus the timestamped snapshots written beside it.
pub struct ResultsStore {
    path: PathBuf,
    results: Mutex<SurveyResults>,
}

impl ResultsStore {
    /// Loads `path`; a missing or malformed file starts an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let results = Self::load(&path);
        info!(
            "Results store at {} holds {} round(s)",
            path.display(),
            results.rounds.len()
        );
        Self {
            path,
            results: Mutex::new(results),
        }
    }

    fn load(path: &Path) -> SurveyResults {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return SurveyResults::default(),
            Err(e) => {
                warn!("Cannot read {}: {}; starting empty", path.display(), e);
                return SurveyResults::default();
            }
        };
        match serde_json::from_str(&raw) {
            Ok(results) => results,
            Err(e) => {
                warn!("Malformed results file {}: {}; starting empty", path.display(), e);
                SurveyResults::default()
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, SurveyResults> {
        self.results.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn results(&self) -> SurveyResults {
        self.lock().clone()
    }

    /// Appends one round and rewrites the running file. On a failed write the
    /// round is dropped again so the caller can retry.
    pub fn record_round(&self, record: RoundRecord) -> Result<(), SurveyError> {
        let mut results = self.lock();
        results.rounds.push(record);
        if let Err(e) = write_json(&self.path, &*results) {
            results.rounds.pop();
            return Err(e);
        }
        Ok(())
    }

    /// Stores the final scores, rewrites the running file and writes a frozen
    /// snapshot. Returns the snapshot path.
    pub fn finalize(
        &self,
        scores: &BTreeMap<Category, u32>,
        at: DateTime<Local>,
    ) -> Result<PathBuf, SurveyError> {
        let mut results = self.lock();
        results.final_scores = scores_by_name(scores);
        write_json(&self.path, &*results)?;

        let snapshot = self.unused_snapshot_path(at);
        write_json(&snapshot, &*results)?;
        info!("Wrote final snapshot {}", snapshot.display());
        Ok(snapshot)
    }

    /// `ranking_results.json` -> `ranking_results_<YYYYmmdd_HHMMSS>.json`
    pub fn snapshot_path(&self, at: DateTime<Local>) -> PathBuf {
        let stem = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "ranking_results".to_string());
        let name = format!("{}_{}.json", stem, at.format("%Y%m%d_%H%M%S"));
        self.path.with_file_name(name)
    }

    /// `snapshot_path`, with `_2`, `_3`, ... appended when that name is taken.
    fn unused_snapshot_path(&self, at: DateTime<Local>) -> PathBuf {
        let base = self.snapshot_path(at);
        if !base.exists() {
            return base;
        }
        let stem = base
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut n = 2;
        loop {
            let candidate = base.with_file_name(format!("{}_{}.json", stem, n));
            if !candidate.exists() {
                return candidate;
            }
            n += 1;
        }
    }
}

fn encode(results: &SurveyResults) -> Result<Vec<u8>, SurveyError> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    results.serialize(&mut ser)?;
    Ok(buf)
}

fn write_json(path: &Path, results: &SurveyResults) -> Result<(), SurveyError> {
    let body = encode(results)?;
    let io_err = |source| SurveyError::WriteResults {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }

    let temp_path = path.with_extension("tmp");
    fs::write(&temp_path, &body).map_err(io_err)?;
    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(io_err(e));
    }
    Ok(())
}
