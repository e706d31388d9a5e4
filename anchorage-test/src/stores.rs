//! In-memory store implementations for stateful scenario tests.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use eyre::Result;

use anchorage_core::{
    AnchorRecord, AnchoredOperation, OperationStore, TransactionStore,
    UnresolvableTransactionStore,
};

/// Transaction store backed by a `BTreeMap` keyed by transaction number.
#[derive(Debug, Default)]
pub struct InMemoryTransactionStore {
    records: Mutex<BTreeMap<u64, AnchorRecord>>,
}

impl InMemoryTransactionStore {
    /// All stored records in transaction-number order.
    pub fn records(&self) -> Vec<AnchorRecord> {
        self.records.lock().unwrap().values().cloned().collect()
    }

    /// Stored transaction numbers in order.
    pub fn numbers(&self) -> Vec<u64> {
        self.records.lock().unwrap().keys().copied().collect()
    }

    /// Seed the store outside of the observer path.
    pub fn seed(&self, records: impl IntoIterator<Item = AnchorRecord>) {
        let mut guard = self.records.lock().unwrap();
        for record in records {
            guard.insert(record.transaction_number, record);
        }
    }
}

#[async_trait]
impl TransactionStore for InMemoryTransactionStore {
    async fn add_transaction(&self, record: AnchorRecord) -> Result<()> {
        self.records
            .lock()
            .unwrap()
            .insert(record.transaction_number, record);
        Ok(())
    }

    async fn get_last_transaction(&self) -> Result<Option<AnchorRecord>> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .last_key_value()
            .map(|(_, record)| record.clone()))
    }

    async fn remove_transactions_later_than(&self, transaction_number: Option<u64>) -> Result<()> {
        let mut guard = self.records.lock().unwrap();
        match transaction_number {
            Some(number) => {
                guard.split_off(&(number + 1));
            }
            None => guard.clear(),
        }
        Ok(())
    }

    async fn get_exponentially_spaced_transactions(&self) -> Result<Vec<AnchorRecord>> {
        let guard = self.records.lock().unwrap();
        let all: Vec<_> = guard.values().cloned().collect();
        let mut sample = Vec::new();
        let mut offset = 1usize;
        while offset <= all.len() {
            sample.push(all[all.len() - offset].clone());
            offset *= 2;
        }
        Ok(sample)
    }
}

/// Operation store backed by a plain vector.
#[derive(Debug, Default)]
pub struct InMemoryOperationStore {
    operations: Mutex<Vec<AnchoredOperation>>,
}

impl InMemoryOperationStore {
    /// All stored operations.
    pub fn operations(&self) -> Vec<AnchoredOperation> {
        self.operations.lock().unwrap().clone()
    }

    /// Seed the store outside of the observer path.
    pub fn seed(&self, operations: impl IntoIterator<Item = AnchoredOperation>) {
        self.operations.lock().unwrap().extend(operations);
    }
}

#[async_trait]
impl OperationStore for InMemoryOperationStore {
    async fn insert_or_replace(&self, operations: &[AnchoredOperation]) -> Result<()> {
        let mut guard = self.operations.lock().unwrap();
        for operation in operations {
            guard.retain(|existing| {
                (
                    &existing.did_suffix,
                    existing.transaction_number,
                    existing.operation_index,
                ) != (
                    &operation.did_suffix,
                    operation.transaction_number,
                    operation.operation_index,
                )
            });
            guard.push(operation.clone());
        }
        Ok(())
    }

    async fn delete(&self, transaction_number: Option<u64>) -> Result<()> {
        let mut guard = self.operations.lock().unwrap();
        match transaction_number {
            Some(number) => guard.retain(|op| op.transaction_number <= number),
            None => guard.clear(),
        }
        Ok(())
    }

    async fn delete_updates_earlier_than(&self, transaction_number: u64) -> Result<()> {
        self.operations
            .lock()
            .unwrap()
            .retain(|op| op.transaction_number >= transaction_number);
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct UnresolvableEntry {
    record: AnchorRecord,
    attempts: u32,
    due: bool,
}

/// Unresolvable store whose due-for-retry policy is driven manually by the
/// test (`mark_all_due`) instead of a clock.
#[derive(Debug, Default)]
pub struct InMemoryUnresolvableStore {
    entries: Mutex<BTreeMap<u64, UnresolvableEntry>>,
}

impl InMemoryUnresolvableStore {
    /// Transaction numbers currently tracked.
    pub fn numbers(&self) -> Vec<u64> {
        self.entries.lock().unwrap().keys().copied().collect()
    }

    /// Fetch-attempt count for one transaction number.
    pub fn attempts(&self, transaction_number: u64) -> u32 {
        self.entries
            .lock()
            .unwrap()
            .get(&transaction_number)
            .map(|entry| entry.attempts)
            .unwrap_or(0)
    }

    /// Make every tracked entry due for retry.
    pub fn mark_all_due(&self) {
        for entry in self.entries.lock().unwrap().values_mut() {
            entry.due = true;
        }
    }

    /// Seed the store outside of the observer path.
    pub fn seed(&self, records: impl IntoIterator<Item = AnchorRecord>) {
        let mut guard = self.entries.lock().unwrap();
        for record in records {
            guard.insert(
                record.transaction_number,
                UnresolvableEntry {
                    record,
                    attempts: 1,
                    due: false,
                },
            );
        }
    }
}

#[async_trait]
impl UnresolvableTransactionStore for InMemoryUnresolvableStore {
    async fn record_unresolvable_transaction_fetch_attempt(
        &self,
        record: &AnchorRecord,
    ) -> Result<()> {
        let mut guard = self.entries.lock().unwrap();
        let entry = guard
            .entry(record.transaction_number)
            .or_insert_with(|| UnresolvableEntry {
                record: record.clone(),
                attempts: 0,
                due: false,
            });
        entry.attempts += 1;
        entry.due = false;
        Ok(())
    }

    async fn remove_unresolvable_transaction(&self, record: &AnchorRecord) -> Result<()> {
        self.entries.lock().unwrap().remove(&record.transaction_number);
        Ok(())
    }

    async fn get_unresolvable_transactions_due_for_retry(
        &self,
        max_count: usize,
    ) -> Result<Vec<AnchorRecord>> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .values()
            .filter(|entry| entry.due)
            .take(max_count)
            .map(|entry| entry.record.clone())
            .collect())
    }

    async fn remove_unresolvable_transactions_later_than(
        &self,
        transaction_number: Option<u64>,
    ) -> Result<()> {
        let mut guard = self.entries.lock().unwrap();
        match transaction_number {
            Some(number) => {
                guard.split_off(&(number + 1));
            }
            None => guard.clear(),
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use anchorage_core::{AnchorLog, H160, H256, U256};

    use super::*;

    fn record(number: u64) -> AnchorRecord {
        AnchorLog {
            anchor_file_hash: H256::repeat_byte(1),
            number_of_operations: 1,
            transaction_number: number,
            writer: H160::zero(),
            transaction_fee_paid: U256::zero(),
            block_number: number,
            block_hash: H256::from_low_u64_be(number),
            log_index: 0,
        }
        .into_record(None)
    }

    fn operation(number: u64) -> AnchoredOperation {
        AnchoredOperation {
            did_suffix: format!("did-{number}"),
            transaction_number: number,
            operation_index: 0,
            operation_buffer: vec![1],
        }
    }

    #[tokio::test]
    async fn exponential_sample_walks_back_from_the_tail() {
        let store = InMemoryTransactionStore::default();
        store.seed((0..=10).map(record));

        let sample = store.get_exponentially_spaced_transactions().await.unwrap();
        let numbers: Vec<_> = sample.iter().map(|r| r.transaction_number).collect();
        // Offsets 1, 2, 4, 8 from the tail of an 11-entry store.
        assert_eq!(numbers, vec![10, 9, 7, 3]);
    }

    #[tokio::test]
    async fn remove_later_than_keeps_the_boundary() {
        let store = InMemoryTransactionStore::default();
        store.seed((0..5).map(record));
        store.remove_transactions_later_than(Some(2)).await.unwrap();
        assert_eq!(store.numbers(), vec![0, 1, 2]);

        store.remove_transactions_later_than(None).await.unwrap();
        assert!(store.numbers().is_empty());
        assert!(store.get_last_transaction().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn insert_or_replace_deduplicates_by_key() {
        let store = InMemoryOperationStore::default();
        store.insert_or_replace(&[operation(1)]).await.unwrap();
        store
            .insert_or_replace(&[operation(1), operation(2)])
            .await
            .unwrap();
        assert_eq!(store.operations().len(), 2);
    }

    #[tokio::test]
    async fn update_compaction_prunes_older_operations() {
        let store = InMemoryOperationStore::default();
        store.seed((0..5).map(operation));
        store.delete_updates_earlier_than(3).await.unwrap();
        let numbers: Vec<_> = store
            .operations()
            .iter()
            .map(|op| op.transaction_number)
            .collect();
        assert_eq!(numbers, vec![3, 4]);
    }

    #[tokio::test]
    async fn fetch_attempts_accumulate_and_reset_dueness() {
        let store = InMemoryUnresolvableStore::default();
        let rec = record(6);
        store
            .record_unresolvable_transaction_fetch_attempt(&rec)
            .await
            .unwrap();
        store
            .record_unresolvable_transaction_fetch_attempt(&rec)
            .await
            .unwrap();
        assert_eq!(store.attempts(6), 2);
        assert!(store
            .get_unresolvable_transactions_due_for_retry(10)
            .await
            .unwrap()
            .is_empty());

        store.mark_all_due();
        let due = store
            .get_unresolvable_transactions_due_for_retry(10)
            .await
            .unwrap();
        assert_eq!(due.len(), 1);

        store.remove_unresolvable_transaction(&rec).await.unwrap();
        assert!(store.numbers().is_empty());
    }
}
