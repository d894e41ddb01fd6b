use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use opencv::{
    core::Mat,
    core::Vector,
    imgcodecs::imwrite,
};
use serde::Serialize;
use tracing::info;

use crate::AppError;

pub type ThreadedSnapshots = Arc<RwLock<SnapshotRegistry>>;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SnapshotRecord {
    pub class_name: String,
    pub path: String,
    pub saved_at: DateTime<Utc>,
}

/// Keeps a single picture of the first sighting of every detected class.
pub struct SnapshotRegistry {
    output_dir: PathBuf,
    seen: HashSet<String>,
    used_paths: HashSet<PathBuf>,
    records: Vec<SnapshotRecord>,
}

impl SnapshotRegistry {
    pub fn new<P: AsRef<Path>>(output_dir: P) -> Self {
        SnapshotRegistry {
            output_dir: output_dir.as_ref().to_path_buf(),
            seen: HashSet::new(),
            used_paths: HashSet::new(),
            records: Vec::new(),
        }
    }
    pub fn new_threaded<P: AsRef<Path>>(output_dir: P) -> ThreadedSnapshots {
        Arc::new(RwLock::new(SnapshotRegistry::new(output_dir)))
    }
    pub fn is_seen(&self, class_name: &str) -> bool {
        self.seen.contains(class_name)
    }
    pub fn records(&self) -> &[SnapshotRecord] {
        &self.records
    }
    /// File for `class_name`. Distinct classes that sanitize to the same
    /// name get a numeric suffix instead of overwriting each other.
    pub fn snapshot_path(&self, class_name: &str) -> PathBuf {
        let stem = format!("detected_{}", sanitize_class_name(class_name));
        let mut path = self.output_dir.join(format!("{}.jpg", stem));
        let mut suffix = 2;
        while self.used_paths.contains(&path) {
            path = self.output_dir.join(format!("{}_{}.jpg", stem, suffix));
            suffix += 1;
        }
        path
    }
    /// Writes `frame` only on the first sighting of `class_name`.
    pub fn try_save(&mut self, class_name: &str, frame: &Mat) -> Result<Option<SnapshotRecord>, AppError> {
        if self.is_seen(class_name) {
            return Ok(None);
        }
        fs::create_dir_all(&self.output_dir)?;
        let path = self.snapshot_path(class_name);
        let path_str = path.to_string_lossy().to_string();
        if !imwrite(&path_str, frame, &Vector::<i32>::new())? {
            return Err(AppError::Snapshot(format!("OpenCV refused to write '{}'", path_str)));
        }
        let record = SnapshotRecord {
            class_name: class_name.to_string(),
            path: path_str,
            saved_at: Utc::now(),
        };
        info!("Saved {} to {}", record.class_name, record.path);
        self.seen.insert(class_name.to_string());
        self.used_paths.insert(path);
        self.records.push(record.clone());
        Ok(Some(record))
    }
}

pub fn sanitize_class_name(class_name: &str) -> String {
    let cleaned: String = class_name
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        return "unknown".to_string();
    }
    cleaned
}
