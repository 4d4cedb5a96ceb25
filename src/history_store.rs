use crate::error::{Result, ScaffoldError};
use crate::storage::RunRecord;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

/// Append-only run history kept as JSON Lines, one record per line.
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Writes `record` as a single line at the end of the store. Earlier
    /// lines are never touched.
    pub fn append(&self, record: &RunRecord) -> Result<()> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(&line)?;
        file.sync_data()?;
        log::debug!("appended run to {}", self.path.display());
        Ok(())
    }

    /// All records, oldest first.
    pub fn all(&self) -> Result<Vec<RunRecord>> {
        let content = match fs::read(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        // Bytes, not text: invalid UTF-8 is corruption like any bad JSON.
        let mut records = Vec::new();
        for (idx, line) in content.split(|b| *b == b'\n').enumerate() {
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            let record: RunRecord = serde_json::from_slice(line).map_err(|_| ScaffoldError::HistoryCorrupt {
                path: self.path.clone(),
                line: idx + 1,
            })?;
            records.push(record);
        }

        // Stable: equal timestamps keep insertion order
        records.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(records)
    }

    /// The `n` most recent records, oldest of the window first.
    pub fn recent(&self, n: usize) -> Result<Vec<RunRecord>> {
        let mut records = self.all()?;
        let skip = records.len().saturating_sub(n);
        Ok(records.split_off(skip))
    }

    /// The k-th most recent record, 1 being the latest run.
    pub fn nth_from_end(&self, k: usize) -> Result<RunRecord> {
        let mut records = self.all()?;
        let len = records.len();
        if k == 0 || k > len {
            return Err(ScaffoldError::IndexOutOfRange { index: k, len });
        }
        Ok(records.swap_remove(len - k))
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.all()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn clear(&self) -> Result<()> {
        fs::File::create(&self.path)?;
        log::info!("cleared history at {}", self.path.display());
        Ok(())
    }

    /// Makes sure the store exists and parses. A torn last line left by an
    /// interrupted append is cut off; anything else unreadable resets the
    /// store to empty.
    pub fn verify_or_reset(&self) -> Result<()> {
        if !self.path.exists() {
            log::info!("creating history store at {}", self.path.display());
            fs::File::create(&self.path)?;
            return Ok(());
        }

        let bytes = fs::read(&self.path)?;
        if !bytes.is_empty() && !bytes.ends_with(b"\n") {
            let keep = bytes.iter().rposition(|b| *b == b'\n').map_or(0, |pos| pos + 1);
            log::warn!(
                "history store {} ends with an incomplete entry, dropping it",
                self.path.display()
            );
            let file = OpenOptions::new().write(true).open(&self.path)?;
            file.set_len(keep as u64)?;
            file.sync_data()?;
        }

        match self.all() {
            Ok(_) => Ok(()),
            Err(ScaffoldError::HistoryCorrupt { line, .. }) => {
                log::warn!(
                    "history store corrupted (line {}), recreating at {}",
                    line,
                    self.path.display()
                );
                fs::File::create(&self.path)?;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
