//! File-based segment store: an append-only JSON-lines record log.
//!
//! Each line is a JSON-encoded [`LedgerRecord`]. The log is replayed on open
//! and every accepted batch is appended, so updates and deletions never
//! rewrite earlier lines.
//!
//! Storage location: `~/.proctor/segments.jsonl` unless told otherwise.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use proctor_core::error::StoreError;
use proctor_core::provider::SegmentStore;
use proctor_core::segment::{ExamSegment, ExamSegmentUpdate, FieldTestItemGroup};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::ledger::{LedgerRecord, SegmentLedger};

/// A segment store persisted as a JSONL record log.
pub struct FileSegmentStore {
    path: PathBuf,
    ledger: Arc<RwLock<SegmentLedger>>,
}

impl FileSegmentStore {
    /// Open the log at `path`, replaying any records already on disk.
    ///
    /// A missing file starts empty (created on first write).
    pub fn open(path: PathBuf) -> Self {
        let mut ledger = SegmentLedger::default();
        let records = Self::load_from_disk(&path);
        let count = records.len();
        for record in records {
            ledger.apply(record);
        }
        debug!(path = %path.display(), records = count, "Segment log loaded");
        Self {
            path,
            ledger: Arc::new(RwLock::new(ledger)),
        }
    }

    /// Default path: `~/.proctor/segments.jsonl`
    pub fn default_path() -> PathBuf {
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(".proctor").join("segments.jsonl")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn segment_count(&self) -> usize {
        self.ledger.read().await.segment_count()
    }

    pub async fn group_count(&self) -> usize {
        self.ledger.read().await.group_count()
    }

    fn load_from_disk(path: &Path) -> Vec<LedgerRecord> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return Vec::new(), // Not created yet
        };

        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str::<LedgerRecord>(line) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(error = %e, "Skipping corrupted segment record");
                    None
                }
            })
            .collect()
    }

    /// Append records to the log. Called before they are folded in memory.
    fn append(&self, records: &[LedgerRecord]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Storage(format!("Failed to create store directory: {e}"))
                })?;
            }
        }

        let mut content = String::new();
        for record in records {
            let line = serde_json::to_string(record).map_err(|e| {
                StoreError::Storage(format!("Failed to serialize segment record: {e}"))
            })?;
            content.push_str(&line);
            content.push('\n');
        }

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| StoreError::Storage(format!("Failed to open segment log: {e}")))?;
        file.write_all(content.as_bytes())
            .map_err(|e| StoreError::Storage(format!("Failed to write segment log: {e}")))?;
        Ok(())
    }

    fn commit(&self, ledger: &mut SegmentLedger, records: Vec<LedgerRecord>) -> Result<usize, StoreError> {
        self.append(&records)?;
        Ok(records.into_iter().map(|r| ledger.apply(r)).sum())
    }
}

#[async_trait]
impl SegmentStore for FileSegmentStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn insert_segments(&self, segments: Vec<ExamSegment>) -> Result<(), StoreError> {
        let mut ledger = self.ledger.write().await;
        ledger.check_segments(&segments)?;
        let records = segments.into_iter().map(LedgerRecord::Segment).collect();
        self.commit(&mut ledger, records)?;
        Ok(())
    }

    async fn insert_assembly(
        &self,
        segments: Vec<ExamSegment>,
        groups: Vec<FieldTestItemGroup>,
    ) -> Result<(), StoreError> {
        let mut ledger = self.ledger.write().await;
        ledger.check_assembly(&segments, &groups)?;
        let records = groups
            .into_iter()
            .map(LedgerRecord::FieldTestGroup)
            .chain(segments.into_iter().map(LedgerRecord::Segment))
            .collect();
        self.commit(&mut ledger, records)?;
        Ok(())
    }

    async fn update_segments(&self, updates: Vec<ExamSegmentUpdate>) -> Result<(), StoreError> {
        let mut ledger = self.ledger.write().await;
        ledger.check_updates(&updates)?;
        let records = updates.into_iter().map(LedgerRecord::SegmentUpdate).collect();
        self.commit(&mut ledger, records)?;
        Ok(())
    }

    async fn find_segments(&self, exam_id: &str) -> Result<Vec<ExamSegment>, StoreError> {
        Ok(self.ledger.read().await.segments_for(exam_id))
    }

    async fn insert_field_test_groups(&self, groups: Vec<FieldTestItemGroup>) -> Result<(), StoreError> {
        let mut ledger = self.ledger.write().await;
        ledger.check_groups(&groups)?;
        let records = groups.into_iter().map(LedgerRecord::FieldTestGroup).collect();
        self.commit(&mut ledger, records)?;
        Ok(())
    }

    async fn find_field_test_groups(
        &self,
        exam_id: &str,
        segment_key: &str,
    ) -> Result<Vec<FieldTestItemGroup>, StoreError> {
        Ok(self.ledger.read().await.groups_for(exam_id, segment_key))
    }

    async fn mark_groups_administered(
        &self,
        exam_id: &str,
        group_keys: &[String],
        at: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        let mut ledger = self.ledger.write().await;
        let record = LedgerRecord::GroupsAdministered {
            exam_id: exam_id.to_string(),
            group_keys: group_keys.to_vec(),
            at,
        };
        self.commit(&mut ledger, vec![record])
    }

    async fn delete_field_test_groups(
        &self,
        exam_id: &str,
        group_keys: &[String],
        at: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        let mut ledger = self.ledger.write().await;
        let record = LedgerRecord::GroupsDeleted {
            exam_id: exam_id.to_string(),
            group_keys: group_keys.to_vec(),
            at,
        };
        self.commit(&mut ledger, vec![record])
    }
}
