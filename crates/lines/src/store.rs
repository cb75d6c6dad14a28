//! Line persistence.
//!
//! The engine only talks to a [`LineStore`]; [`MemoryStore`] is the
//! in-process implementation, optionally backed by a JSON snapshot file.

use std::collections::HashMap;
use std::path::Path;

use contract_core::{LineError, LineResult};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::domain::{Domain, LineRow};
use crate::types::{Contract, ContractLine};

/// The writes of one committed transaction.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    pub created: Vec<ContractLine>,
    pub written: Vec<ContractLine>,
    pub deleted: Vec<Uuid>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.written.is_empty() && self.deleted.is_empty()
    }
}

pub trait LineStore: Send + Sync {
    /// Lines matching `domain`, ordered by sequence then insertion.
    fn find(&self, domain: &Domain) -> LineResult<Vec<ContractLine>>;

    fn read(&self, id: Uuid) -> LineResult<ContractLine>;

    fn contract(&self, id: Uuid) -> LineResult<Option<Contract>>;

    /// Apply every change or none of them.
    fn apply(&self, changes: ChangeSet) -> LineResult<()>;
}

/// Serialized form of a [`MemoryStore`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreSnapshot {
    #[serde(default)]
    pub contracts: Vec<Contract>,
    #[serde(default)]
    pub lines: Vec<ContractLine>,
}

#[derive(Default)]
struct Inner {
    contracts: HashMap<Uuid, Contract>,
    lines: HashMap<Uuid, ContractLine>,
    order: Vec<Uuid>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_contract(&self, contract: Contract) {
        self.inner.write().contracts.insert(contract.id, contract);
    }

    /// Insert or replace a line without going through a transaction.
    pub fn insert_line(&self, line: ContractLine) {
        let mut inner = self.inner.write();
        if !inner.lines.contains_key(&line.id) {
            inner.order.push(line.id);
        }
        inner.lines.insert(line.id, line);
    }

    pub fn len(&self) -> usize {
        self.inner.read().lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        let inner = self.inner.read();
        let mut contracts: Vec<Contract> = inner.contracts.values().cloned().collect();
        contracts.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        StoreSnapshot {
            contracts,
            lines: inner
                .order
                .iter()
                .filter_map(|id| inner.lines.get(id).cloned())
                .collect(),
        }
    }

    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        let store = Self::new();
        for contract in snapshot.contracts {
            store.insert_contract(contract);
        }
        for line in snapshot.lines {
            store.insert_line(line);
        }
        store
    }

    /// Load a snapshot file; a missing file yields an empty store.
    pub fn load_json(path: impl AsRef<Path>) -> LineResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(path = %path.display(), "No store file, starting empty");
            return Ok(Self::new());
        }
        let raw = std::fs::read(path)?;
        let snapshot: StoreSnapshot = serde_json::from_slice(&raw)?;
        debug!(
            path = %path.display(),
            contracts = snapshot.contracts.len(),
            lines = snapshot.lines.len(),
            "Loaded store"
        );
        Ok(Self::from_snapshot(snapshot))
    }

    /// Write the snapshot next to `path` and rename it into place.
    pub fn save_json(&self, path: impl AsRef<Path>) -> LineResult<()> {
        let path = path.as_ref();
        let raw = serde_json::to_vec_pretty(&self.snapshot())?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, raw)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}

impl LineStore for MemoryStore {
    fn find(&self, domain: &Domain) -> LineResult<Vec<ContractLine>> {
        let inner = self.inner.read();
        let mut found: Vec<(usize, &ContractLine)> = inner
            .order
            .iter()
            .enumerate()
            .filter_map(|(pos, id)| inner.lines.get(id).map(|line| (pos, line)))
            .filter(|(_, line)| {
                let contract = inner.contracts.get(&line.contract_id);
                domain.matches(&LineRow::new(line, contract))
            })
            .collect();
        found.sort_by_key(|(pos, line)| (line.sequence, *pos));
        Ok(found.into_iter().map(|(_, line)| line.clone()).collect())
    }

    fn read(&self, id: Uuid) -> LineResult<ContractLine> {
        self.inner
            .read()
            .lines
            .get(&id)
            .cloned()
            .ok_or_else(|| LineError::NotFound(format!("line {id}")))
    }

    fn contract(&self, id: Uuid) -> LineResult<Option<Contract>> {
        Ok(self.inner.read().contracts.get(&id).cloned())
    }

    fn apply(&self, changes: ChangeSet) -> LineResult<()> {
        let mut inner = self.inner.write();
        for line in &changes.created {
            if inner.lines.contains_key(&line.id) {
                return Err(LineError::InvalidArgument(format!(
                    "line {} already exists",
                    line.id
                )));
            }
        }
        for line in &changes.written {
            if !inner.lines.contains_key(&line.id) {
                return Err(LineError::NotFound(format!("line {}", line.id)));
            }
        }

        for line in changes.created {
            inner.order.push(line.id);
            inner.lines.insert(line.id, line);
        }
        for line in changes.written {
            inner.lines.insert(line.id, line);
        }
        if !changes.deleted.is_empty() {
            for id in &changes.deleted {
                inner.lines.remove(id);
            }
            inner.order.retain(|id| !changes.deleted.contains(id));
        }
        Ok(())
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("MemoryStore")
            .field("contracts", &inner.contracts.len())
            .field("lines", &inner.lines.len())
            .finish()
    }
}
