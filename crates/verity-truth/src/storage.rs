//! # Persistent Storage Layer
//!
//! Sled-backed storage for official resolutions and observed worker
//! answers.
//!
//! ## Storage Structure
//!
//! | Tree | Key | Value |
//! |------|-----|-------|
//! | `official` | statement id | resolution byte |
//! | `answers` | worker id (4 bytes, big-endian) ++ statement id | resolution byte |
//!
//! Keys in `answers` sort by worker first, so one worker's answers are a
//! single prefix scan.

use std::path::Path;

use verity_consensus::{Resolution, StatementId, WorkerId};

use crate::error::{Result, TruthError};

/// Tree name for official resolutions.
const OFFICIAL_TREE: &str = "official";

/// Tree name for observed worker answers.
const ANSWER_TREE: &str = "answers";

/// Outcome of a compare-and-swap insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Insert {
    /// The key was empty and now holds the value.
    Inserted,
    /// The key already held this value.
    Unchanged,
    /// The key already held a different value, which was kept.
    Conflict(Resolution),
}

/// Wrapper around a sled database with the two ground-truth trees.
#[derive(Clone)]
pub struct Storage {
    db: sled::Db,
    official: sled::Tree,
    answers: sled::Tree,
}

impl Storage {
    /// Opens or creates a database at the given path.
    ///
    /// # Errors
    ///
    /// Returns `TruthError::Database` if the path is unusable or the
    /// database is corrupted.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// Creates an in-memory database, lost on drop.
    pub fn temporary() -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: sled::Db) -> Result<Self> {
        let official = db.open_tree(OFFICIAL_TREE)?;
        let answers = db.open_tree(ANSWER_TREE)?;
        Ok(Storage {
            db,
            official,
            answers,
        })
    }

    /// Stores an official resolution unless one is already present.
    pub fn insert_official(&self, statement: &StatementId, resolution: Resolution) -> Result<Insert> {
        let key = statement.as_str().as_bytes();
        let swap = self.official.compare_and_swap(
            key,
            None::<&[u8]>,
            Some(vec![resolution.to_byte()]),
        )?;

        match swap {
            Ok(()) => Ok(Insert::Inserted),
            Err(existing) => {
                let stored = match existing.current {
                    Some(bytes) => decode(&bytes)?,
                    None => {
                        return Err(TruthError::Corrupt(format!(
                            "official record for '{}' vanished during insert",
                            statement
                        )))
                    }
                };
                if stored == resolution {
                    Ok(Insert::Unchanged)
                } else {
                    Ok(Insert::Conflict(stored))
                }
            }
        }
    }

    /// Loads the official resolution of a statement.
    pub fn load_official(&self, statement: &StatementId) -> Result<Option<Resolution>> {
        match self.official.get(statement.as_str().as_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Stores a worker's answer for a statement, replacing any earlier one.
    pub fn store_answer(
        &self,
        worker: WorkerId,
        statement: &StatementId,
        resolution: Resolution,
    ) -> Result<()> {
        self.answers
            .insert(answer_key(worker, statement), vec![resolution.to_byte()])?;
        Ok(())
    }

    /// Loads every answer of one worker as `(statement, resolution)`.
    pub fn load_answers(&self, worker: WorkerId) -> Result<Vec<(StatementId, Resolution)>> {
        let mut answers = Vec::new();
        for entry in self.answers.scan_prefix(worker.0.to_be_bytes()) {
            let (key, value) = entry?;
            let (_, statement) = split_answer_key(&key)?;
            answers.push((statement, decode(&value)?));
        }
        Ok(answers)
    }

    /// Loads every stored answer as `(worker, statement, resolution)`.
    pub fn load_all_answers(&self) -> Result<Vec<(WorkerId, StatementId, Resolution)>> {
        let mut answers = Vec::new();
        for entry in self.answers.iter() {
            let (key, value) = entry?;
            let (worker, statement) = split_answer_key(&key)?;
            answers.push((worker, statement, decode(&value)?));
        }
        Ok(answers)
    }

    /// Number of statements with an official resolution.
    pub fn official_count(&self) -> usize {
        self.official.len()
    }

    /// Number of stored worker answers.
    pub fn answer_count(&self) -> usize {
        self.answers.len()
    }

    /// Flushes pending writes to disk, returning bytes flushed.
    pub fn flush(&self) -> Result<usize> {
        Ok(self.db.flush()?)
    }
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("official", &self.official_count())
            .field("answers", &self.answer_count())
            .finish()
    }
}

fn answer_key(worker: WorkerId, statement: &StatementId) -> Vec<u8> {
    let mut key = Vec::with_capacity(4 + statement.as_str().len());
    key.extend_from_slice(&worker.0.to_be_bytes());
    key.extend_from_slice(statement.as_str().as_bytes());
    key
}

fn split_answer_key(key: &[u8]) -> Result<(WorkerId, StatementId)> {
    if key.len() < 4 {
        return Err(TruthError::Corrupt(format!("answer key of {} bytes", key.len())));
    }
    let (worker, statement) = key.split_at(4);
    let worker = u32::from_be_bytes([worker[0], worker[1], worker[2], worker[3]]);
    let statement = std::str::from_utf8(statement)
        .map_err(|_| TruthError::Corrupt("answer key is not UTF-8".to_string()))?;
    Ok((WorkerId(worker), StatementId::new(statement)))
}

fn decode(bytes: &[u8]) -> Result<Resolution> {
    match bytes {
        [byte] => Resolution::from_byte(*byte)
            .ok_or_else(|| TruthError::Corrupt(format!("unknown resolution byte {:#04x}", byte))),
        _ => Err(TruthError::Corrupt(format!(
            "resolution record of {} bytes",
            bytes.len()
        ))),
    }
}
