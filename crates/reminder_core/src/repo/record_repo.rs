//! Notification record list persistence.
//!
//! # Responsibility
//! - Persist the ordered record list as one JSON array under a single key.
//! - Provide index- and id-addressed read-modify-write helpers.
//!
//! # Invariants
//! - A missing key reads as an empty list.
//! - List order is insertion order; `replace_at` keeps the position.
//! - Positional helpers work on raw stored elements, so elements that do not
//!   decode as a record keep their slot and survive every rewrite.
//! - Read-modify-write sequences are not atomic across callers.

use crate::model::record::NotificationRecord;
use crate::repo::{RepoError, RepoResult};
use crate::store::KeyValueStore;
use serde_json::Value;
use std::sync::Arc;

/// Store key holding the record list.
pub const RECORDS_KEY: &str = "notifications";

/// One element of the stored list, kept exactly as persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord(Value);

impl StoredRecord {
    pub fn from_json(value: Value) -> Self {
        Self(value)
    }

    /// Record id; older lists store it as a number.
    pub fn id(&self) -> Option<String> {
        match self.0.get("id")? {
            Value::String(id) => Some(id.clone()),
            Value::Number(id) => Some(id.to_string()),
            _ => None,
        }
    }

    pub fn title(&self) -> Option<&str> {
        self.0.get("title").and_then(Value::as_str)
    }

    /// Decodes the element as a full record.
    pub fn decode(&self) -> RepoResult<NotificationRecord> {
        serde_json::from_value(self.0.clone())
            .map_err(|err| RepoError::InvalidData(format!("record element: {err}")))
    }

    pub fn as_json(&self) -> &Value {
        &self.0
    }

    pub fn into_json(self) -> Value {
        self.0
    }

    fn encode(record: &NotificationRecord) -> RepoResult<Self> {
        serde_json::to_value(record)
            .map(Self)
            .map_err(|err| RepoError::InvalidData(format!("record encode: {err}")))
    }
}

/// Typed access to the persisted record list.
pub struct RecordRepository<K: KeyValueStore> {
    store: Arc<K>,
    key: String,
}

impl<K: KeyValueStore> Clone for RecordRepository<K> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            key: self.key.clone(),
        }
    }
}

impl<K: KeyValueStore> RecordRepository<K> {
    pub fn new(store: Arc<K>) -> Self {
        Self::with_key(store, RECORDS_KEY)
    }

    pub fn with_key(store: Arc<K>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    /// Loads every stored element in order, decoded or not.
    pub async fn load_entries(&self) -> RepoResult<Vec<StoredRecord>> {
        let Some(raw) = self.store.get(self.key.as_str()).await? else {
            return Ok(Vec::new());
        };
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        let entries: Vec<Value> = serde_json::from_str(raw.as_str()).map_err(|err| {
            RepoError::InvalidData(format!("record list under `{}`: {err}", self.key))
        })?;
        Ok(entries.into_iter().map(StoredRecord).collect())
    }

    /// Loads decodable records paired with their stored position.
    pub async fn load_indexed(&self) -> RepoResult<Vec<(usize, NotificationRecord)>> {
        let entries = self.load_entries().await?;
        let mut records = Vec::with_capacity(entries.len());
        for (index, entry) in entries.iter().enumerate() {
            match entry.decode() {
                Ok(record) => records.push((index, record)),
                Err(err) => log::warn!(
                    "event=record_decode module=repo status=skipped key={} index={index} error={err}",
                    self.key
                ),
            }
        }
        Ok(records)
    }

    /// Loads decodable records in stored order.
    pub async fn load(&self) -> RepoResult<Vec<NotificationRecord>> {
        let records = self.load_indexed().await?;
        Ok(records.into_iter().map(|(_, record)| record).collect())
    }

    /// Returns the raw element at `index`, if any.
    pub async fn entry_at(&self, index: usize) -> RepoResult<Option<StoredRecord>> {
        let mut entries = self.load_entries().await?;
        if index >= entries.len() {
            return Ok(None);
        }
        Ok(Some(entries.swap_remove(index)))
    }

    async fn write_entries(&self, entries: &[StoredRecord]) -> RepoResult<()> {
        let values: Vec<&Value> = entries.iter().map(StoredRecord::as_json).collect();
        let encoded = serde_json::to_string(&values)
            .map_err(|err| RepoError::InvalidData(format!("record list encode: {err}")))?;
        self.store.set(self.key.as_str(), encoded.as_str()).await?;
        Ok(())
    }

    /// Appends one record at the end of the list.
    ///
    /// A stored list that is not valid JSON is replaced by a fresh list
    /// holding only `record`; store failures still propagate.
    pub async fn append(&self, record: &NotificationRecord) -> RepoResult<()> {
        record.validate()?;
        let mut entries = match self.load_entries().await {
            Ok(entries) => entries,
            Err(RepoError::InvalidData(detail)) => {
                log::warn!(
                    "event=record_append module=repo status=reset key={} error={detail}",
                    self.key
                );
                Vec::new()
            }
            Err(err) => return Err(err),
        };
        entries.push(StoredRecord::encode(record)?);
        self.write_entries(&entries).await
    }

    /// Removes the element at `index`, keeping the others in order.
    pub async fn remove_at(&self, index: usize) -> RepoResult<StoredRecord> {
        let mut entries = self.load_entries().await?;
        if index >= entries.len() {
            return Err(RepoError::IndexOutOfRange {
                index,
                len: entries.len(),
            });
        }
        let removed = entries.remove(index);
        self.write_entries(&entries).await?;
        Ok(removed)
    }

    /// Replaces the element at `index` in place.
    pub async fn replace_at(&self, index: usize, record: &NotificationRecord) -> RepoResult<()> {
        record.validate()?;
        let mut entries = self.load_entries().await?;
        let len = entries.len();
        let slot = entries
            .get_mut(index)
            .ok_or(RepoError::IndexOutOfRange { index, len })?;
        *slot = StoredRecord::encode(record)?;
        self.write_entries(&entries).await
    }

    /// Applies `update` to every decodable record with `id`. Returns the
    /// number of records rewritten.
    pub async fn update_by_id(
        &self,
        id: &str,
        mut update: impl FnMut(&mut NotificationRecord),
    ) -> RepoResult<usize> {
        let mut entries = self.load_entries().await?;
        let mut matched = 0;
        for entry in entries
            .iter_mut()
            .filter(|entry| entry.id().as_deref() == Some(id))
        {
            let Ok(mut record) = entry.decode() else {
                continue;
            };
            update(&mut record);
            *entry = StoredRecord::encode(&record)?;
            matched += 1;
        }
        if matched > 0 {
            self.write_entries(&entries).await?;
        }
        Ok(matched)
    }

    /// Removes every element with `id`. Returns the removed count.
    pub async fn remove_by_id(&self, id: &str) -> RepoResult<usize> {
        let mut entries = self.load_entries().await?;
        let before = entries.len();
        entries.retain(|entry| entry.id().as_deref() != Some(id));
        let removed = before - entries.len();
        if removed > 0 {
            self.write_entries(&entries).await?;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::{RecordRepository, RECORDS_KEY};
    use crate::model::record::{NotificationKind, NotificationRecord};
    use crate::repo::RepoError;
    use crate::store::InMemoryKeyValueStore;
    use chrono::Utc;
    use serde_json::{json, Value};
    use std::sync::Arc;

    fn record(id: &str, title: &str) -> NotificationRecord {
        NotificationRecord::with_id(id, title, "msg", Utc::now(), NotificationKind::Reminder)
    }

    fn stored(store: &InMemoryKeyValueStore) -> Value {
        serde_json::from_str(&store.raw(RECORDS_KEY).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn empty_store_loads_empty_list() {
        let repo = RecordRepository::new(Arc::new(InMemoryKeyValueStore::new()));
        assert!(repo.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn malformed_json_is_reported_as_invalid_data() {
        let store = Arc::new(InMemoryKeyValueStore::new());
        store.insert_raw(RECORDS_KEY, "{not json");
        let repo = RecordRepository::new(store);
        assert!(matches!(
            repo.load().await.unwrap_err(),
            RepoError::InvalidData(_)
        ));
    }

    #[tokio::test]
    async fn undecodable_elements_are_skipped_when_listing() {
        let store = Arc::new(InMemoryKeyValueStore::new());
        let repo = RecordRepository::new(Arc::clone(&store));
        repo.append(&record("1", "A")).await.unwrap();
        let mut list = stored(&store);
        list.as_array_mut().unwrap().insert(0, json!({"title": "partial"}));
        store.insert_raw(RECORDS_KEY, &list.to_string());

        let indexed = repo.load_indexed().await.unwrap();

        assert_eq!(indexed.len(), 1);
        assert_eq!(indexed[0].0, 1);
        assert_eq!(indexed[0].1.title, "A");
        assert_eq!(repo.load_entries().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn positional_helpers_keep_partial_elements() {
        let store = Arc::new(InMemoryKeyValueStore::new());
        store.insert_raw(
            RECORDS_KEY,
            r#"[{"title":"A"},{"title":"B","extra":true},{"title":"C"}]"#,
        );
        let repo = RecordRepository::new(Arc::clone(&store));

        let removed = repo.remove_at(1).await.unwrap();
        assert_eq!(removed.title(), Some("B"));
        assert_eq!(removed.id(), None);
        assert_eq!(stored(&store), json!([{"title": "A"}, {"title": "C"}]));

        repo.replace_at(0, &record("9", "Z")).await.unwrap();
        let list = stored(&store);
        assert_eq!(list[0]["id"], "9");
        assert_eq!(list[1], json!({"title": "C"}));
    }

    #[tokio::test]
    async fn append_over_corrupt_list_starts_fresh() {
        let store = Arc::new(InMemoryKeyValueStore::new());
        store.insert_raw(RECORDS_KEY, "[{\"id\":");
        let repo = RecordRepository::new(Arc::clone(&store));

        repo.append(&record("1", "A")).await.unwrap();

        let records = repo.load().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "1");
    }

    #[tokio::test]
    async fn replace_at_keeps_position() {
        let repo = RecordRepository::new(Arc::new(InMemoryKeyValueStore::new()));
        for (id, title) in [("1", "A"), ("2", "B"), ("3", "C")] {
            repo.append(&record(id, title)).await.unwrap();
        }

        repo.replace_at(1, &record("2", "B2")).await.unwrap();

        let titles: Vec<_> = repo
            .load()
            .await
            .unwrap()
            .into_iter()
            .map(|record| record.title)
            .collect();
        assert_eq!(titles, vec!["A", "B2", "C"]);
    }

    #[tokio::test]
    async fn index_errors_leave_list_untouched() {
        let repo = RecordRepository::new(Arc::new(InMemoryKeyValueStore::new()));
        repo.append(&record("1", "A")).await.unwrap();

        let err = repo.remove_at(3).await.unwrap_err();
        assert!(matches!(err, RepoError::IndexOutOfRange { index: 3, len: 1 }));
        let err = repo.replace_at(1, &record("9", "Z")).await.unwrap_err();
        assert!(matches!(err, RepoError::IndexOutOfRange { index: 1, len: 1 }));
        assert!(repo.entry_at(1).await.unwrap().is_none());
        assert_eq!(repo.load().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn append_rejects_invalid_record() {
        let repo = RecordRepository::new(Arc::new(InMemoryKeyValueStore::new()));
        let err = repo.append(&record("1", " ")).await.unwrap_err();
        assert!(matches!(err, RepoError::Validation(_)));
    }

    #[tokio::test]
    async fn id_helpers_report_match_counts() {
        let repo = RecordRepository::new(Arc::new(InMemoryKeyValueStore::new()));
        repo.append(&record("1", "A")).await.unwrap();
        repo.append(&record("2", "B")).await.unwrap();

        let updated = repo
            .update_by_id("2", |record| record.title = "B!".to_string())
            .await
            .unwrap();
        assert_eq!(updated, 1);
        assert_eq!(repo.remove_by_id("missing").await.unwrap(), 0);
        assert_eq!(repo.remove_by_id("1").await.unwrap(), 1);

        let records = repo.load().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title, "B!");
    }

    #[tokio::test]
    async fn numeric_ids_match_id_helpers() {
        let store = Arc::new(InMemoryKeyValueStore::new());
        store.insert_raw(RECORDS_KEY, r#"[{"id":1714809600000,"title":"old"}]"#);
        let repo = RecordRepository::new(Arc::clone(&store));

        assert_eq!(
            repo.entry_at(0).await.unwrap().unwrap().id().as_deref(),
            Some("1714809600000")
        );
        assert_eq!(repo.remove_by_id("1714809600000").await.unwrap(), 1);
        assert_eq!(stored(&store), json!([]));
    }
}
