use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::config::SnapshotPolicy;
use crate::error::SinkError;
use crate::sink::{persist, temp_beside, Sink};
use crate::types::Snapshot;

/// Writes the snapshot as pretty-printed JSON to `<dir>/<date>.json`.
pub struct JsonFileSink {
    dir: PathBuf,
    policy: SnapshotPolicy,
}

impl JsonFileSink {
    pub fn new(dir: &Path, policy: SnapshotPolicy) -> Self {
        Self {
            dir: dir.to_path_buf(),
            policy,
        }
    }

    pub fn path_for(&self, snapshot: &Snapshot) -> PathBuf {
        self.dir.join(format!("{}.json", snapshot.date()))
    }
}

#[async_trait]
impl Sink for JsonFileSink {
    fn name(&self) -> &str {
        "json"
    }

    async fn write(&self, snapshot: &Snapshot) -> Result<usize, SinkError> {
        let path = self.path_for(snapshot);
        if self.policy == SnapshotPolicy::Reject && path.exists() {
            return Err(SinkError::SnapshotExists(snapshot.date()));
        }

        let mut tmp = temp_beside(&path)?;
        {
            let mut out = BufWriter::new(tmp.as_file_mut());
            serde_json::to_writer_pretty(&mut out, snapshot)?;
            out.flush()?;
        }
        persist(tmp, &path, self.policy, snapshot.date())?;

        Ok(snapshot.len())
    }
}
