use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::config::SnapshotPolicy;
use crate::error::SinkError;
use crate::sink::{persist, table_row, temp_beside, Sink, TABLE_HEADER};
use crate::types::Snapshot;

/// Writes `<dir>/<date>.csv`, one row per record.
pub struct CsvFileSink {
    dir: PathBuf,
    policy: SnapshotPolicy,
}

impl CsvFileSink {
    pub fn new(dir: &Path, policy: SnapshotPolicy) -> Self {
        Self {
            dir: dir.to_path_buf(),
            policy,
        }
    }

    pub fn path_for(&self, snapshot: &Snapshot) -> PathBuf {
        self.dir.join(format!("{}.csv", snapshot.date()))
    }
}

#[async_trait]
impl Sink for CsvFileSink {
    fn name(&self) -> &str {
        "csv"
    }

    async fn write(&self, snapshot: &Snapshot) -> Result<usize, SinkError> {
        let path = self.path_for(snapshot);
        if self.policy == SnapshotPolicy::Reject && path.exists() {
            return Err(SinkError::SnapshotExists(snapshot.date()));
        }

        // Written beside the target and moved so readers never see half a file.
        let mut tmp = temp_beside(&path)?;
        {
            let mut wtr = csv::Writer::from_writer(tmp.as_file_mut());
            wtr.write_record(TABLE_HEADER)?;
            for r in snapshot.records() {
                wtr.write_record(table_row(snapshot, r))?;
            }
            wtr.flush()?;
        }
        persist(tmp, &path, self.policy, snapshot.date())?;

        Ok(snapshot.len())
    }
}
