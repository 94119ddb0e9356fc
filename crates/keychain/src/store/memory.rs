//! In-process store
//!
//! Keeps records in a mutex-guarded map. Follows the add/update contract
//! strictly so the facade's check-then-act logic is exercised the same way
//! it is against a platform keychain. Faults can be injected per call kind.

use super::{Accessibility, ItemQuery, QueryMode, SecureStore, StoreFault, StoreStatus};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// A store call, as recorded by `MemoryStore::calls`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Call {
    Add,
    Update,
    Query(QueryMode),
    Delete,
}

#[derive(Debug, Clone)]
struct Record {
    value: Vec<u8>,
    access: Accessibility,
}

#[derive(Default)]
struct State {
    records: HashMap<(String, String), Record>,
    faults: HashMap<Call, StoreFault>,
    calls: Vec<Call>,
}

/// Process-local secure store
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make every future `call` fail with `fault`
    pub fn fail_on(&self, call: Call, fault: StoreFault) {
        self.lock().faults.insert(call, fault);
    }

    pub fn clear_faults(&self) {
        self.lock().faults.clear();
    }

    /// Calls made so far, oldest first
    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    /// Accessibility recorded for a stored item
    pub fn accessibility(&self, service: &str, account: &str) -> Option<Accessibility> {
        self.lock()
            .records
            .get(&(service.to_string(), account.to_string()))
            .map(|r| r.access)
    }

    /// Sorted accounts under `service`
    pub fn accounts(&self, service: &str) -> Vec<String> {
        let mut accounts: Vec<String> = self
            .lock()
            .records
            .keys()
            .filter(|(s, _)| s == service)
            .map(|(_, a)| a.clone())
            .collect();
        accounts.sort();
        accounts
    }

    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Record the call and return the injected fault for it, if any
    fn begin(state: &mut State, call: Call) -> Option<StoreFault> {
        state.calls.push(call);
        state.faults.get(&call).cloned()
    }
}

fn key(item: ItemQuery<'_>) -> (String, String) {
    (item.service.to_string(), item.account.to_string())
}

impl SecureStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn add(&self, item: ItemQuery<'_>, value: &[u8], access: Accessibility) -> StoreStatus<()> {
        let mut state = self.lock();
        if let Some(fault) = Self::begin(&mut state, Call::Add) {
            return StoreStatus::Failed(fault);
        }

        let key = key(item);
        if state.records.contains_key(&key) {
            return StoreStatus::Failed(StoreFault::DuplicateItem);
        }
        state.records.insert(
            key,
            Record {
                value: value.to_vec(),
                access,
            },
        );
        StoreStatus::Success(())
    }

    fn update(&self, item: ItemQuery<'_>, value: &[u8]) -> StoreStatus<()> {
        let mut state = self.lock();
        if let Some(fault) = Self::begin(&mut state, Call::Update) {
            return StoreStatus::Failed(fault);
        }

        match state.records.get_mut(&key(item)) {
            Some(record) => {
                record.value = value.to_vec();
                StoreStatus::Success(())
            }
            None => StoreStatus::NotFound,
        }
    }

    fn query(&self, item: ItemQuery<'_>, mode: QueryMode) -> StoreStatus<Option<Vec<u8>>> {
        let mut state = self.lock();
        if let Some(fault) = Self::begin(&mut state, Call::Query(mode)) {
            return StoreStatus::Failed(fault);
        }

        match state.records.get(&key(item)) {
            Some(record) => match mode {
                QueryMode::ExistenceOnly => StoreStatus::Success(None),
                QueryMode::WithData => StoreStatus::Success(Some(record.value.clone())),
            },
            None => StoreStatus::NotFound,
        }
    }

    fn delete(&self, item: ItemQuery<'_>) -> StoreStatus<()> {
        let mut state = self.lock();
        if let Some(fault) = Self::begin(&mut state, Call::Delete) {
            return StoreStatus::Failed(fault);
        }

        match state.records.remove(&key(item)) {
            Some(_) => StoreStatus::Success(()),
            None => StoreStatus::NotFound,
        }
    }
}
