use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use tracing::info;

use super::runner::{SetStatus, SyncSummary};
use super::CardSink;
use crate::reconcile::assemble::GroupResult;
use crate::reconcile::ReconcileReport;

/// Writes `<out_dir>/<set>.json` per set plus a `manifest.json` at the end.
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    out_dir: PathBuf,
}

impl JsonFileSink {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
        }
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    pub fn set_path(&self, set_code: &str) -> PathBuf {
        self.out_dir.join(format!("{}.json", set_code.to_ascii_lowercase()))
    }
}

/// Serialize to `path` through a sibling temp file and a rename, so readers
/// never observe a half-written file.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("out.json");
    let tmp = dir.join(format!(".{file_name}.tmp"));
    {
        let mut file = fs::File::create(&tmp).with_context(|| format!("create {}", tmp.display()))?;
        serde_json::to_writer_pretty(&mut file, value)?;
        file.write_all(b"\n")?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)
        .with_context(|| format!("rename {} -> {}", tmp.display(), path.display()))?;
    Ok(())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ManifestEntry<'a> {
    set_code: &'a str,
    group_ids: &'a [i64],
    status: &'static str,
    file: Option<String>,
    records: usize,
    error: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Manifest<'a> {
    generated_at: String,
    sets: Vec<ManifestEntry<'a>>,
    totals: &'a ReconcileReport,
}

impl CardSink for JsonFileSink {
    fn write_set(&self, result: &GroupResult) -> Result<PathBuf> {
        let path = self.set_path(&result.set_code);
        write_json_atomic(&path, &result.cards)?;
        info!(
            set_code = %result.set_code,
            records = result.len(),
            path = %path.display(),
            "set written"
        );
        Ok(path)
    }

    fn finish(&self, summary: &SyncSummary) -> Result<()> {
        let sets = summary
            .outcomes
            .iter()
            .map(|o| match &o.status {
                SetStatus::Written { path, records } => ManifestEntry {
                    set_code: &o.set_code,
                    group_ids: &o.group_ids,
                    status: "ok",
                    file: path
                        .file_name()
                        .and_then(|n| n.to_str())
                        .map(str::to_string),
                    records: *records,
                    error: None,
                },
                SetStatus::Failed(err) => ManifestEntry {
                    set_code: &o.set_code,
                    group_ids: &o.group_ids,
                    status: "failed",
                    file: None,
                    records: 0,
                    error: Some(err.as_str()),
                },
            })
            .collect();
        let manifest = Manifest {
            generated_at: Utc::now().to_rfc3339(),
            sets,
            totals: &summary.totals,
        };
        let path = self.out_dir.join("manifest.json");
        write_json_atomic(&path, &manifest)?;
        info!(path = %path.display(), "manifest written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RawPrice, RawProduct};
    use crate::pipeline::runner::SetOutcome;
    use crate::reconcile::assemble::assemble;
    use crate::reconcile::{reconcile_group, ReconcileOptions};
    use serde_json::Value;
    use tempfile::TempDir;

    fn sample() -> GroupResult {
        let products = vec![RawProduct::new("1", "Luffy").with_extended("Number", "OP01-001")];
        let prices = vec![RawPrice::new("1", "Normal").with_market(1.5)];
        assemble(
            "OP01",
            3188,
            reconcile_group(3188, &products, &prices, &ReconcileOptions::default()),
        )
    }

    #[test]
    fn writes_lowercase_set_file() {
        let dir = TempDir::new().unwrap();
        let sink = JsonFileSink::new(dir.path().join("prices"));
        let path = sink.write_set(&sample()).unwrap();

        assert_eq!(path, dir.path().join("prices").join("op01.json"));
        let body: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(body["OP01-001"]["marketPrice"], 1.5);
        assert!(!dir.path().join("prices").join(".op01.json.tmp").exists());
    }

    #[test]
    fn manifest_lists_every_outcome() {
        let dir = TempDir::new().unwrap();
        let sink = JsonFileSink::new(dir.path());
        let result = sample();
        let path = sink.write_set(&result).unwrap();

        let mut summary = SyncSummary::default();
        summary.record(SetOutcome {
            set_code: "OP01".into(),
            group_ids: vec![3188],
            status: SetStatus::Written { path, records: 1 },
            report: result.report.clone(),
        });
        summary.record(SetOutcome {
            set_code: "OP02".into(),
            group_ids: vec![],
            status: SetStatus::Failed("no groups".into()),
            report: ReconcileReport::default(),
        });
        sink.finish(&summary).unwrap();

        let manifest: Value =
            serde_json::from_str(&fs::read_to_string(dir.path().join("manifest.json")).unwrap())
                .unwrap();
        assert_eq!(manifest["sets"][0]["file"], "op01.json");
        assert_eq!(manifest["sets"][0]["status"], "ok");
        assert_eq!(manifest["sets"][1]["status"], "failed");
        assert_eq!(manifest["totals"]["records"], 1);
        assert!(manifest["generatedAt"].as_str().is_some());
    }
}
