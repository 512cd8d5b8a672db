//! Append-only, hash-chained record of section transitions

use chrono::{DateTime, Utc};
use irf_schema::SectionId;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::status::SectionStatus;

/// One recorded status change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    /// Position in the log, from zero
    pub seq: u64,
    /// Wall-clock time of the change
    pub at: DateTime<Utc>,
    /// Section that changed
    pub section: SectionId,
    /// Status before
    pub from: SectionStatus,
    /// Status after
    pub to: SectionStatus,
    /// Hash of the previous entry, zero for the first
    pub prev_hash: [u8; 32],
    /// Hash over this entry's fields and `prev_hash`
    pub hash: [u8; 32],
}

impl Transition {
    /// Short hex form of `hash`
    #[must_use]
    pub fn short_hash(&self) -> String {
        hex::encode(&self.hash[..6])
    }
}

/// The chain was altered after the fact
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("transition log integrity violated at entry {seq}")]
pub struct IntegrityError {
    /// First entry that fails verification
    pub seq: u64,
}

/// In-memory transition log for one report session
#[derive(Debug, Default)]
pub struct TransitionLog {
    inner: Mutex<Vec<Transition>>,
}

impl TransitionLog {
    /// Empty log
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a transition and return its sequence number
    pub fn record(&self, section: SectionId, from: SectionStatus, to: SectionStatus) -> u64 {
        let mut guard = self.inner.lock();
        let mut entry = Transition {
            seq: guard.len() as u64,
            at: Utc::now(),
            section,
            from,
            to,
            prev_hash: guard.last().map_or([0u8; 32], |e| e.hash),
            hash: [0u8; 32],
        };
        entry.hash = compute_hash(&entry);
        let seq = entry.seq;
        guard.push(entry);
        seq
    }

    /// Copy of every entry
    #[must_use]
    pub fn entries(&self) -> Vec<Transition> {
        self.inner.lock().clone()
    }

    /// Entries for one section, oldest first
    #[must_use]
    pub fn for_section(&self, section: SectionId) -> Vec<Transition> {
        self.inner
            .lock()
            .iter()
            .filter(|e| e.section == section)
            .cloned()
            .collect()
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// No transitions recorded yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Walk the chain and recompute every hash
    ///
    /// # Errors
    /// Returns the first entry whose link or hash does not match
    pub fn verify_integrity(&self) -> Result<(), IntegrityError> {
        verify_chain(&self.inner.lock())
    }
}

/// Verify a detached copy of a chain
///
/// # Errors
/// Returns the first entry whose link or hash does not match
pub fn verify_chain(entries: &[Transition]) -> Result<(), IntegrityError> {
    let mut prev = [0u8; 32];
    for e in entries {
        if e.prev_hash != prev || e.hash != compute_hash(e) {
            return Err(IntegrityError { seq: e.seq });
        }
        prev = e.hash;
    }
    Ok(())
}

fn compute_hash(entry: &Transition) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(entry.seq.to_le_bytes());
    hasher.update(entry.at.timestamp_micros().to_le_bytes());
    hasher.update([entry.section.get()]);
    hasher.update(entry.from.as_str().as_bytes());
    hasher.update([0]);
    hasher.update(entry.to.as_str().as_bytes());
    hasher.update([0]);
    hasher.update(entry.prev_hash);
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use SectionStatus::*;

    fn id(n: u32) -> SectionId {
        SectionId::new(n).unwrap()
    }

    #[test]
    fn chain_links_entries() {
        let log = TransitionLog::new();
        assert_eq!(log.record(id(1), Pending, Generating), 0);
        assert_eq!(log.record(id(1), Generating, Generated), 1);
        assert_eq!(log.record(id(2), Pending, Generating), 2);

        let entries = log.entries();
        assert_eq!(entries[0].prev_hash, [0u8; 32]);
        assert_eq!(entries[1].prev_hash, entries[0].hash);
        assert_eq!(log.for_section(id(1)).len(), 2);
        assert!(log.verify_integrity().is_ok());
    }

    #[test]
    fn tampering_is_detected() {
        let log = TransitionLog::new();
        log.record(id(3), Pending, Generating);
        log.record(id(3), Generating, Generated);
        log.record(id(3), Generated, QaPassed);

        let mut entries = log.entries();
        entries[1].to = Approved;
        assert_eq!(verify_chain(&entries), Err(IntegrityError { seq: 1 }));
    }
}
