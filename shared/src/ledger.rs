use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use log::{debug, warn};

use crate::constants::{TICKETS_KEY, TICKET_CAP};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    Unavailable,
    ReadFailed(String),
    WriteFailed(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable => write!(f, "Storage unavailable"),
            Self::ReadFailed(key) => write!(f, "Failed to read storage key '{}'", key),
            Self::WriteFailed(key) => write!(f, "Failed to write storage key '{}'", key),
        }
    }
}

impl std::error::Error for StorageError {}

/// String key/value storage with the shape of browser `localStorage`.
pub trait ClientStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}

impl<T: ClientStorage + ?Sized> ClientStorage for &T {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get_item(key)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).set_item(key, value)
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        (**self).remove_item(key)
    }
}

impl<T: ClientStorage + ?Sized> ClientStorage for Rc<T> {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get_item(key)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).set_item(key, value)
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        (**self).remove_item(key)
    }
}

/// In-memory storage. Single-threaded, like the browser storage it stands in for.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: RefCell<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ClientStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.items.borrow().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.items.borrow_mut().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.items.borrow_mut().remove(key);
        Ok(())
    }
}

/// Persisted ticket counter, capped at [`TICKET_CAP`].
///
/// Storage failures never escape: the first failure is logged and the ledger
/// keeps its balance in memory for the rest of its lifetime.
pub struct TicketLedger<S: ClientStorage> {
    storage: S,
    in_memory: Cell<Option<u32>>,
}

impl<S: ClientStorage> TicketLedger<S> {
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            in_memory: Cell::new(None),
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// True once a storage failure has switched the ledger to memory.
    pub fn is_degraded(&self) -> bool {
        self.in_memory.get().is_some()
    }

    pub fn get_balance(&self) -> u32 {
        if let Some(balance) = self.in_memory.get() {
            return balance;
        }

        match self.storage.get_item(TICKETS_KEY) {
            Ok(Some(raw)) => match raw.trim().parse::<u32>() {
                Ok(balance) => balance.min(TICKET_CAP),
                Err(_) => {
                    debug!("Ignoring unparseable ticket balance {:?}", raw);
                    0
                }
            },
            Ok(None) => 0,
            Err(e) => {
                warn!("Ticket storage read failed, using in-memory balance: {}", e);
                self.in_memory.set(Some(0));
                0
            }
        }
    }

    pub fn credit(&mut self, amount: u32) -> u32 {
        let balance = self.get_balance().saturating_add(amount).min(TICKET_CAP);
        self.write(balance);
        balance
    }

    /// Callers check `get_balance() >= amount` first; the floor at zero still holds if they don't.
    pub fn debit(&mut self, amount: u32) -> u32 {
        let balance = self.get_balance().saturating_sub(amount);
        self.write(balance);
        balance
    }

    pub fn reset(&mut self) {
        if self.in_memory.get().is_some() {
            self.in_memory.set(Some(0));
            return;
        }
        if let Err(e) = self.storage.remove_item(TICKETS_KEY) {
            warn!("Ticket storage reset failed, using in-memory balance: {}", e);
            self.in_memory.set(Some(0));
        }
    }

    fn write(&self, balance: u32) {
        if self.in_memory.get().is_some() {
            self.in_memory.set(Some(balance));
            return;
        }
        if let Err(e) = self.storage.set_item(TICKETS_KEY, &balance.to_string()) {
            warn!("Ticket storage write failed, using in-memory balance: {}", e);
            self.in_memory.set(Some(balance));
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Storage whose every operation fails.
    pub(crate) struct BrokenStorage;

    impl ClientStorage for BrokenStorage {
        fn get_item(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Err(StorageError::Unavailable)
        }

        fn set_item(&self, key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::WriteFailed(key.to_string()))
        }

        fn remove_item(&self, key: &str) -> Result<(), StorageError> {
            Err(StorageError::WriteFailed(key.to_string()))
        }
    }

    /// Reads work, writes fail.
    struct ReadOnlyStorage(MemoryStorage);

    impl ClientStorage for ReadOnlyStorage {
        fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.0.get_item(key)
        }

        fn set_item(&self, key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::WriteFailed(key.to_string()))
        }

        fn remove_item(&self, key: &str) -> Result<(), StorageError> {
            Err(StorageError::WriteFailed(key.to_string()))
        }
    }

    #[test]
    fn test_absent_or_garbage_balance_reads_as_zero() {
        let storage = MemoryStorage::new();
        let ledger = TicketLedger::new(&storage);
        assert_eq!(ledger.get_balance(), 0);

        storage.set_item(TICKETS_KEY, "not a number").unwrap();
        assert_eq!(ledger.get_balance(), 0);

        storage.set_item(TICKETS_KEY, "-3").unwrap();
        assert_eq!(ledger.get_balance(), 0);
    }

    #[test]
    fn test_read_is_idempotent() {
        let storage = MemoryStorage::new();
        storage.set_item(TICKETS_KEY, "3").unwrap();
        let ledger = TicketLedger::new(&storage);
        assert_eq!(ledger.get_balance(), 3);
        assert_eq!(ledger.get_balance(), 3);
    }

    #[test]
    fn test_credit_never_exceeds_cap() {
        let mut ledger = TicketLedger::new(MemoryStorage::new());
        for amount in [1, 2, 5, 3, 1, u32::MAX] {
            let balance = ledger.credit(amount);
            assert!(balance <= TICKET_CAP);
            assert_eq!(ledger.get_balance(), balance);
        }
        assert_eq!(ledger.get_balance(), TICKET_CAP);
    }

    #[test]
    fn test_debit_never_goes_below_zero() {
        let mut ledger = TicketLedger::new(MemoryStorage::new());
        ledger.credit(2);
        assert_eq!(ledger.debit(1), 1);
        assert_eq!(ledger.debit(1), 0);
        assert_eq!(ledger.debit(1), 0);
        assert_eq!(ledger.debit(10), 0);
    }

    #[test]
    fn test_stored_value_above_cap_is_clamped() {
        let storage = MemoryStorage::new();
        storage.set_item(TICKETS_KEY, "9").unwrap();
        let ledger = TicketLedger::new(&storage);
        assert_eq!(ledger.get_balance(), TICKET_CAP);
    }

    #[test]
    fn test_balance_persists_through_storage() {
        let storage = MemoryStorage::new();
        {
            let mut ledger = TicketLedger::new(&storage);
            ledger.credit(3);
        }
        assert_eq!(storage.get_item(TICKETS_KEY).unwrap().as_deref(), Some("3"));
        assert_eq!(TicketLedger::new(&storage).get_balance(), 3);
    }

    #[test]
    fn test_reset_removes_balance() {
        let storage = MemoryStorage::new();
        let mut ledger = TicketLedger::new(&storage);
        ledger.credit(4);
        ledger.reset();
        assert_eq!(storage.get_item(TICKETS_KEY).unwrap(), None);
        assert_eq!(ledger.get_balance(), 0);
    }

    #[test]
    fn test_unavailable_storage_falls_back_to_memory() {
        let mut ledger = TicketLedger::new(BrokenStorage);
        assert_eq!(ledger.get_balance(), 0);
        assert!(ledger.is_degraded());
        assert_eq!(ledger.credit(2), 2);
        assert_eq!(ledger.get_balance(), 2);
        assert_eq!(ledger.debit(1), 1);
        ledger.reset();
        assert_eq!(ledger.get_balance(), 0);
    }

    #[test]
    fn test_failed_write_keeps_written_value_in_memory() {
        let inner = MemoryStorage::new();
        inner.set_item(TICKETS_KEY, "1").unwrap();
        let mut ledger = TicketLedger::new(ReadOnlyStorage(inner));
        assert_eq!(ledger.credit(2), 3);
        assert!(ledger.is_degraded());
        assert_eq!(ledger.get_balance(), 3);
    }

    #[test]
    fn test_ledgers_sharing_storage_reread_before_write() {
        let storage = Rc::new(MemoryStorage::new());
        let mut first_tab = TicketLedger::new(Rc::clone(&storage));
        let mut second_tab = TicketLedger::new(Rc::clone(&storage));

        first_tab.credit(1);
        second_tab.credit(1);
        assert_eq!(first_tab.get_balance(), 2);
        assert_eq!(second_tab.debit(1), 1);
        assert_eq!(first_tab.get_balance(), 1);
    }
}
