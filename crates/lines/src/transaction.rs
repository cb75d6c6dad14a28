//! Staged writes with commit-time validation.
//!
//! Every engine operation stages its line changes here. Reads see the
//! staged view. `commit` checks the invariants of every touched line and
//! hands the whole change set to the store in one call; dropping the
//! transaction instead discards everything.

use std::collections::HashMap;

use contract_core::types::LifecycleEvent;
use contract_core::{LineError, LineResult};
use uuid::Uuid;

use crate::invariants::{self, LineLookup};
use crate::store::{ChangeSet, LineStore};
use crate::types::{Contract, ContractLine};

pub struct Transaction<'s> {
    store: &'s dyn LineStore,
    staged: HashMap<Uuid, ContractLine>,
    created: Vec<Uuid>,
    written: Vec<Uuid>,
    deleted: Vec<Uuid>,
    contracts: HashMap<Uuid, Option<Contract>>,
    events: Vec<LifecycleEvent>,
}

impl<'s> Transaction<'s> {
    pub fn begin(store: &'s dyn LineStore) -> Self {
        Self {
            store,
            staged: HashMap::new(),
            created: Vec::new(),
            written: Vec::new(),
            deleted: Vec::new(),
            contracts: HashMap::new(),
            events: Vec::new(),
        }
    }

    pub fn line(&self, id: Uuid) -> LineResult<ContractLine> {
        if self.deleted.contains(&id) {
            return Err(LineError::NotFound(format!("line {id}")));
        }
        match self.staged.get(&id) {
            Some(line) => Ok(line.clone()),
            None => self.store.read(id),
        }
    }

    pub fn lines(&self, ids: &[Uuid]) -> LineResult<Vec<ContractLine>> {
        ids.iter().map(|id| self.line(*id)).collect()
    }

    /// Stage a modified line.
    pub fn put(&mut self, line: ContractLine) {
        if !self.created.contains(&line.id) && !self.written.contains(&line.id) {
            self.written.push(line.id);
        }
        self.staged.insert(line.id, line);
    }

    /// Stage a new line.
    pub fn create(&mut self, line: ContractLine) {
        self.created.push(line.id);
        self.staged.insert(line.id, line);
    }

    pub fn delete(&mut self, id: Uuid) {
        self.staged.remove(&id);
        self.written.retain(|w| *w != id);
        if let Some(pos) = self.created.iter().position(|c| *c == id) {
            self.created.remove(pos);
        } else if !self.deleted.contains(&id) {
            self.deleted.push(id);
        }
    }

    pub fn contract(&mut self, id: Uuid) -> LineResult<Option<Contract>> {
        if let Some(cached) = self.contracts.get(&id) {
            return Ok(cached.clone());
        }
        let contract = self.store.contract(id)?;
        self.contracts.insert(id, contract.clone());
        Ok(contract)
    }

    pub fn contract_terminated(&mut self, id: Uuid) -> LineResult<bool> {
        Ok(self.contract(id)?.is_some_and(|c| c.is_terminated))
    }

    /// Queue an event; it is only returned once the commit succeeds.
    pub fn record(&mut self, event: LifecycleEvent) {
        self.events.push(event);
    }

    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.written.is_empty() && self.deleted.is_empty()
    }

    pub fn commit(self) -> LineResult<Vec<LifecycleEvent>> {
        for id in self.created.iter().chain(self.written.iter()) {
            if let Some(line) = self.staged.get(id) {
                invariants::validate(line, &self)?;
            }
        }

        let take = |ids: &[Uuid]| -> Vec<ContractLine> {
            ids.iter().filter_map(|id| self.staged.get(id).cloned()).collect()
        };
        let changes = ChangeSet {
            created: take(&self.created),
            written: take(&self.written),
            deleted: self.deleted.clone(),
        };
        if !changes.is_empty() {
            self.store.apply(changes)?;
        }
        Ok(self.events)
    }
}

impl LineLookup for Transaction<'_> {
    fn lookup(&self, id: Uuid) -> Option<ContractLine> {
        self.line(id).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::NaiveDate;
    use contract_core::event_bus::make_event;
    use contract_core::types::EventType;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn line(contract_id: Uuid) -> ContractLine {
        let mut line =
            ContractLine::new(contract_id, "Support", d(2025, 1, 1)).with_end(d(2025, 12, 31));
        line.next_invoice_date = Some(d(2025, 1, 1));
        line
    }

    #[test]
    fn test_reads_see_staged_writes() {
        let store = MemoryStore::new();
        let original = line(Uuid::new_v4());
        store.insert_line(original.clone());

        let mut tx = Transaction::begin(&store);
        let mut changed = tx.line(original.id).unwrap();
        changed.name = "Premium support".into();
        tx.put(changed);
        assert_eq!(tx.line(original.id).unwrap().name, "Premium support");
        assert_eq!(store.read(original.id).unwrap().name, "Support");

        tx.commit().unwrap();
        assert_eq!(store.read(original.id).unwrap().name, "Premium support");
    }

    #[test]
    fn test_dropped_transaction_leaves_store_untouched() {
        let store = MemoryStore::new();
        let original = line(Uuid::new_v4());
        store.insert_line(original.clone());
        {
            let mut tx = Transaction::begin(&store);
            tx.delete(original.id);
            assert!(tx.line(original.id).is_err());
        }
        assert!(store.read(original.id).is_ok());
    }

    #[test]
    fn test_invariant_violation_aborts_commit() {
        let store = MemoryStore::new();
        let original = line(Uuid::new_v4());
        store.insert_line(original.clone());

        let mut tx = Transaction::begin(&store);
        let mut ok = line(original.contract_id);
        ok.name = "Fine".into();
        tx.create(ok.clone());
        let mut broken = tx.line(original.id).unwrap();
        broken.date_end = Some(d(2024, 1, 1));
        tx.put(broken);
        tx.record(make_event(
            EventType::LineUpdated,
            original.contract_id,
            original.id,
            (None, None),
            "never emitted",
        ));

        let err = tx.commit().unwrap_err();
        assert!(matches!(err, LineError::InvariantViolation { .. }));
        assert_eq!(store.len(), 1);
        assert_eq!(store.read(original.id).unwrap().date_end, Some(d(2025, 12, 31)));
    }

    #[test]
    fn test_commit_returns_recorded_events() {
        let store = MemoryStore::new();
        let new_line = line(Uuid::new_v4());
        let mut tx = Transaction::begin(&store);
        tx.create(new_line.clone());
        tx.record(make_event(
            EventType::LineCreated,
            new_line.contract_id,
            new_line.id,
            (Some(new_line.date_start), new_line.date_end),
            "created",
        ));
        let events = tx.commit().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, EventType::LineCreated);
    }

    #[test]
    fn test_create_then_delete_is_a_no_op() {
        let store = MemoryStore::new();
        let new_line = line(Uuid::new_v4());
        let mut tx = Transaction::begin(&store);
        tx.create(new_line.clone());
        tx.delete(new_line.id);
        assert!(tx.is_empty());
        tx.commit().unwrap();
        assert!(store.is_empty());
    }
}
