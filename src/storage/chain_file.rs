// Append-only block log. Every accepted block is written as one JSON record followed by a
// line holding a single `#`. On startup the records are replayed in file order, which is
// always an order where parents come before children.

use crate::core::BlockRecord;
use crate::error::{BlockchainError, Result};
use log::{debug, warn};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

pub const BLOCKCHAIN_FILENAME: &str = "blockchain.txt";
const RECORD_SEPARATOR: &str = "#";

#[derive(Debug, Clone)]
pub struct ChainFile {
    path: PathBuf,
}

impl ChainFile {
    /// Chain file inside `data_dir`; the directory is created if missing
    pub fn in_dir(data_dir: &Path) -> Result<ChainFile> {
        fs::create_dir_all(data_dir)?;
        Ok(ChainFile {
            path: data_dir.join(BLOCKCHAIN_FILENAME),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn append(&self, record: &BlockRecord) -> Result<()> {
        let json = serde_json::to_string_pretty(record)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{json}")?;
        writeln!(file, "{RECORD_SEPARATOR}")?;
        file.flush()?;
        Ok(())
    }

    /// All records in file order. A trailing fragment without separator (an interrupted
    /// write) is dropped with a warning.
    pub fn replay(&self) -> Result<Vec<BlockRecord>> {
        if !self.exists() {
            return Ok(Vec::new());
        }
        let contents = fs::read_to_string(&self.path)?;

        let mut records = Vec::new();
        let mut pending = String::new();
        for line in contents.lines() {
            if line.trim() == RECORD_SEPARATOR {
                let record: BlockRecord = serde_json::from_str(&pending).map_err(|e| {
                    BlockchainError::Serialization(format!(
                        "Corrupt record #{} in {}: {e}",
                        records.len(),
                        self.path.display()
                    ))
                })?;
                records.push(record);
                pending.clear();
            } else {
                pending.push_str(line);
                pending.push('\n');
            }
        }
        if !pending.trim().is_empty() {
            warn!(
                "Ignoring unterminated record at the end of {}",
                self.path.display()
            );
        }

        debug!("Read {} block records from {}", records.len(), self.path.display());
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Amount, Block, PublicKey, Transaction};
    use std::io::Write;

    fn record(nonce: u64) -> BlockRecord {
        let tx = Transaction::new_coinbase(PublicKey::from("miner"), Amount::from_millis(5));
        Block::new(None, nonce, vec![tx], None).unwrap().to_record()
    }

    #[test]
    fn test_append_then_replay_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let file = ChainFile::in_dir(dir.path()).unwrap();
        assert!(file.replay().unwrap().is_empty());

        file.append(&record(1)).unwrap();
        file.append(&record(2)).unwrap();

        let records = file.replay().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0], record(1));
        assert_eq!(records[1].header.get_nonce(), 2);

        let text = fs::read_to_string(file.path()).unwrap();
        assert_eq!(text.lines().filter(|l| *l == "#").count(), 2);
    }

    #[test]
    fn test_unterminated_tail_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let file = ChainFile::in_dir(dir.path()).unwrap();
        file.append(&record(1)).unwrap();
        let mut raw = OpenOptions::new().append(true).open(file.path()).unwrap();
        write!(raw, "{{\"header\": ").unwrap();

        assert_eq!(file.replay().unwrap().len(), 1);
    }

    #[test]
    fn test_corrupt_record_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = ChainFile::in_dir(dir.path()).unwrap();
        fs::write(file.path(), "not json\n#\n").unwrap();
        assert!(matches!(
            file.replay(),
            Err(BlockchainError::Serialization(_))
        ));
    }
}
