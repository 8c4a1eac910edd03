//! In-memory table client for tests and sessionless operation.

use async_trait::async_trait;
use log::{debug, warn};
use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

use crate::client::{ClientError, ClientResult, TableClient};
use crate::entry::{ActionSpec, MatchValue, TableEntry};

type MatchKey = BTreeMap<String, MatchValue>;

/// An in-memory [`TableClient`] that records entries per table.
///
/// Inserting over an existing key replaces it and deleting an absent key is
/// a no-op, matching the idempotency expectation of the trait. Failures can
/// be injected per table to exercise error paths.
#[derive(Debug, Default)]
pub struct MockTableClient {
    tables: Mutex<BTreeMap<String, BTreeMap<MatchKey, ActionSpec>>>,
    fail_tables: Mutex<HashSet<String>>,
}

impl MockTableClient {
    /// Creates an empty mock client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every mutation against `table` fail with an RPC error.
    pub fn fail_table(&self, table: impl Into<String>) {
        self.fail_tables.lock().unwrap().insert(table.into());
    }

    /// Clears all injected failures.
    pub fn clear_failures(&self) {
        self.fail_tables.lock().unwrap().clear();
    }

    /// Returns the number of entries in a table.
    pub fn entry_count(&self, table: &str) -> usize {
        self.tables
            .lock()
            .unwrap()
            .get(table)
            .map_or(0, |t| t.len())
    }

    /// Returns the total number of entries across all tables.
    pub fn total_entries(&self) -> usize {
        self.tables.lock().unwrap().values().map(|t| t.len()).sum()
    }

    /// Returns all entries of a table, reconstructed with their actions.
    pub fn entries(&self, table: &str) -> Vec<TableEntry> {
        self.tables
            .lock()
            .unwrap()
            .get(table)
            .map(|t| {
                t.iter()
                    .map(|(matches, action)| TableEntry {
                        table: table.to_string(),
                        matches: matches.clone(),
                        action: Some(action.clone()),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Returns the action stored for an exact match key, if present.
    pub fn action_for(&self, entry: &TableEntry) -> Option<ActionSpec> {
        self.tables
            .lock()
            .unwrap()
            .get(&entry.table)
            .and_then(|t| t.get(&entry.matches))
            .cloned()
    }

    /// Returns true if an entry with the same table and match key exists.
    pub fn contains(&self, entry: &TableEntry) -> bool {
        self.action_for(entry).is_some()
    }

    fn check_failure(&self, table: &str) -> ClientResult<()> {
        if self.fail_tables.lock().unwrap().contains(table) {
            return Err(ClientError::rpc(format!("injected failure on {}", table)));
        }
        Ok(())
    }
}

#[async_trait]
impl TableClient for MockTableClient {
    async fn insert_entry(&self, entry: &TableEntry) -> ClientResult<()> {
        self.check_failure(&entry.table)?;
        let action = entry.action.clone().ok_or_else(|| {
            ClientError::invalid_entry(entry.table.clone(), "insert without action")
        })?;

        let mut tables = self.tables.lock().unwrap();
        let table = tables.entry(entry.table.clone()).or_default();
        if table.insert(entry.matches.clone(), action).is_some() {
            debug!("insert replaced existing entry: {}", entry);
        }
        Ok(())
    }

    async fn modify_entry(&self, entry: &TableEntry) -> ClientResult<()> {
        self.check_failure(&entry.table)?;
        let action = entry.action.clone().ok_or_else(|| {
            ClientError::invalid_entry(entry.table.clone(), "modify without action")
        })?;

        let mut tables = self.tables.lock().unwrap();
        let table = tables
            .entry(entry.table.clone())
            .or_default();
        match table.get_mut(&entry.matches) {
            Some(existing) => {
                *existing = action;
                Ok(())
            }
            None => Err(ClientError::EntryNotFound {
                table: entry.table.clone(),
            }),
        }
    }

    async fn delete_entry(&self, entry: &TableEntry) -> ClientResult<()> {
        self.check_failure(&entry.table)?;
        let mut tables = self.tables.lock().unwrap();
        let removed = tables
            .get_mut(&entry.table)
            .and_then(|t| t.remove(&entry.matches));
        if removed.is_none() {
            warn!("delete of absent entry: {}", entry);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_entry() -> TableEntry {
        TableEntry::new("t")
            .exact_match("k", vec![0, 1])
            .action("a", vec![vec![7]])
    }

    #[tokio::test]
    async fn test_insert_and_lookup() {
        let client = MockTableClient::new();
        client.insert_entry(&sample_entry()).await.unwrap();

        assert_eq!(client.entry_count("t"), 1);
        let stored = client.action_for(&sample_entry()).unwrap();
        assert_eq!(stored.action, "a");
        assert_eq!(stored.params, vec![vec![7]]);
    }

    #[tokio::test]
    async fn test_insert_without_action_rejected() {
        let client = MockTableClient::new();
        let entry = TableEntry::new("t").exact_match("k", vec![1]);
        assert!(matches!(
            client.insert_entry(&entry).await,
            Err(ClientError::InvalidEntry { .. })
        ));
    }

    #[tokio::test]
    async fn test_modify_requires_existing() {
        let client = MockTableClient::new();
        let entry = sample_entry();

        assert!(matches!(
            client.modify_entry(&entry).await,
            Err(ClientError::EntryNotFound { .. })
        ));

        client.insert_entry(&entry).await.unwrap();
        let updated = TableEntry::new("t")
            .exact_match("k", vec![0, 1])
            .action("a", vec![vec![8]]);
        client.modify_entry(&updated).await.unwrap();
        assert_eq!(client.action_for(&entry).unwrap().params, vec![vec![8]]);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let client = MockTableClient::new();
        let entry = sample_entry();

        client.insert_entry(&entry).await.unwrap();
        client.delete_entry(&entry).await.unwrap();
        assert_eq!(client.entry_count("t"), 0);

        // Deleting again is tolerated.
        client.delete_entry(&entry).await.unwrap();
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let client = MockTableClient::new();
        client.fail_table("t");
        assert!(matches!(
            client.insert_entry(&sample_entry()).await,
            Err(ClientError::Rpc { .. })
        ));

        client.clear_failures();
        client.insert_entry(&sample_entry()).await.unwrap();
    }
}
