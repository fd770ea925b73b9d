use std::path::Path;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rocksdb::{ColumnFamilyDescriptor, Options, DB};

use tollgate_core::types::{ChallengeId, PaymentChallenge};

const CF_CHALLENGES: &str = "challenges";

/// Key-value seam the gateway keeps its challenge records behind.
///
/// The gateway is the sole writer; implementations only need per-key
/// atomicity for the individual operations. State transitions happen in
/// the gateway under its per-challenge locks, never inside the store.
pub trait ChallengeStore: Send + Sync {
    /// Fetch a record by id.
    fn get(&self, id: &ChallengeId) -> Option<PaymentChallenge>;

    /// Insert or replace a record.
    fn put(&self, challenge: PaymentChallenge);

    /// Remove a record, returning it if present.
    fn delete(&self, id: &ChallengeId) -> Option<PaymentChallenge>;

    /// Evict terminal records whose lifecycle ended before `before`.
    /// Returns the number of records removed.
    fn sweep_expired(&self, before: DateTime<Utc>) -> usize;

    /// Snapshot of every record (statistics and sweep scans).
    fn all(&self) -> Vec<PaymentChallenge>;
}

/// When a terminal record's lifecycle ended, for retention purposes.
fn ended_at(challenge: &PaymentChallenge) -> Option<DateTime<Utc>> {
    if !challenge.status.is_final() {
        return None;
    }
    Some(challenge.verified_at.unwrap_or(challenge.expires_at))
}

/// In-memory challenge store.
#[derive(Default)]
pub struct MemoryStore {
    records: DashMap<ChallengeId, PaymentChallenge>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl ChallengeStore for MemoryStore {
    fn get(&self, id: &ChallengeId) -> Option<PaymentChallenge> {
        self.records.get(id).map(|entry| entry.clone())
    }

    fn put(&self, challenge: PaymentChallenge) {
        self.records.insert(challenge.id, challenge);
    }

    fn delete(&self, id: &ChallengeId) -> Option<PaymentChallenge> {
        self.records.remove(id).map(|(_, challenge)| challenge)
    }

    fn sweep_expired(&self, before: DateTime<Utc>) -> usize {
        let initial = self.records.len();
        self.records
            .retain(|_, challenge| !matches!(ended_at(challenge), Some(ended) if ended < before));
        initial - self.records.len()
    }

    fn all(&self) -> Vec<PaymentChallenge> {
        self.records.iter().map(|entry| entry.clone()).collect()
    }
}

/// RocksDB-backed challenge store, swappable for the in-memory one.
///
/// Records are serialized as JSON in a dedicated column family, keyed by
/// the challenge id.
pub struct RocksStore {
    db: DB,
}

impl RocksStore {
    /// Open or create a database at `path`.
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        std::fs::create_dir_all(path)?;

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors = vec![ColumnFamilyDescriptor::new(CF_CHALLENGES, Options::default())];
        let db = DB::open_cf_descriptors(&opts, path, cf_descriptors)?;
        Ok(Self { db })
    }

    fn cf(&self) -> &rocksdb::ColumnFamily {
        // The column family is created in `open`; absence is a programming
        // error, not a runtime condition.
        self.db
            .cf_handle(CF_CHALLENGES)
            .expect("challenges column family missing")
    }
}

impl ChallengeStore for RocksStore {
    fn get(&self, id: &ChallengeId) -> Option<PaymentChallenge> {
        let bytes = self.db.get_cf(self.cf(), id.to_string().as_bytes()).ok()??;
        match serde_json::from_slice(&bytes) {
            Ok(challenge) => Some(challenge),
            Err(e) => {
                tracing::warn!(id = %id, error = %e, "dropping undecodable challenge record");
                None
            }
        }
    }

    fn put(&self, challenge: PaymentChallenge) {
        match serde_json::to_vec(&challenge) {
            Ok(bytes) => {
                if let Err(e) =
                    self.db
                        .put_cf(self.cf(), challenge.id.to_string().as_bytes(), bytes)
                {
                    tracing::error!(id = %challenge.id, error = %e, "failed to persist challenge");
                }
            }
            Err(e) => {
                tracing::error!(id = %challenge.id, error = %e, "failed to encode challenge");
            }
        }
    }

    fn delete(&self, id: &ChallengeId) -> Option<PaymentChallenge> {
        let existing = self.get(id);
        if existing.is_some() {
            if let Err(e) = self.db.delete_cf(self.cf(), id.to_string().as_bytes()) {
                tracing::error!(id = %id, error = %e, "failed to delete challenge");
            }
        }
        existing
    }

    fn sweep_expired(&self, before: DateTime<Utc>) -> usize {
        let mut removed = 0;
        for challenge in self.all() {
            if matches!(ended_at(&challenge), Some(ended) if ended < before) {
                if self.delete(&challenge.id).is_some() {
                    removed += 1;
                }
            }
        }
        removed
    }

    fn all(&self) -> Vec<PaymentChallenge> {
        self.db
            .iterator_cf(self.cf(), rocksdb::IteratorMode::Start)
            .filter_map(|item| item.ok())
            .filter_map(|(_, bytes)| serde_json::from_slice(&bytes).ok())
            .collect()
    }
}
