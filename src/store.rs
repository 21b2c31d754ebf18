// File: src/store.rs
//! Generic record access shared by the remote entity API and the local store.
//!
//! Every workflow in the controller is written against `EntityStore`, so the same
//! code path runs online (hosted backend) and offline (JSON files on disk).
use crate::model::{Entity, User};
use anyhow::Result;
use serde_json::{Map, Value};
use std::future::Future;

/// Equality predicates on record fields (`{"task_id": "abc"}`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter(pub Map<String, Value>);

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Self::new().and(field, value)
    }

    pub fn and(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.0.insert(field.to_string(), value.into());
        self
    }

    /// Whether a serialized record satisfies every predicate.
    /// A missing field only matches a `null` predicate.
    pub fn matches(&self, record: &Value) -> bool {
        self.0.iter().all(|(field, expected)| {
            let actual = record.get(field).unwrap_or(&Value::Null);
            actual == expected
        })
    }

    pub fn to_json(&self) -> Value {
        Value::Object(self.0.clone())
    }
}

/// Merges the top-level fields of `patch` into `record`.
pub fn merge_patch(record: &mut Value, patch: &Value) {
    if let (Some(target), Some(fields)) = (record.as_object_mut(), patch.as_object()) {
        for (key, value) in fields {
            target.insert(key.clone(), value.clone());
        }
    }
}

pub trait EntityStore: Send + Sync {
    fn list<E: Entity>(&self) -> impl Future<Output = Result<Vec<E>>> + Send;

    fn filter<E: Entity>(&self, filter: &Filter) -> impl Future<Output = Result<Vec<E>>> + Send;

    /// Creates a record; the store assigns the id and metadata.
    fn create<E: Entity>(&self, record: &E) -> impl Future<Output = Result<E>> + Send;

    /// Applies a partial update and returns the stored record.
    fn update<E: Entity>(&self, id: &str, patch: &Value)
    -> impl Future<Output = Result<E>> + Send;

    fn delete<E: Entity>(&self, id: &str) -> impl Future<Output = Result<()>> + Send;

    /// The signed-in user.
    fn me(&self) -> impl Future<Output = Result<User>> + Send;

    fn update_me(&self, patch: &Value) -> impl Future<Output = Result<User>> + Send;

    fn get<E: Entity>(&self, id: &str) -> impl Future<Output = Result<Option<E>>> + Send {
        async move {
            let found: Vec<E> = self.filter(&Filter::eq("id", id)).await?;
            Ok(found.into_iter().next())
        }
    }
}
