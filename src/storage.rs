// File: ./src/storage.rs
// Local file storage: one JSON file per entity collection, used when no
// remote backend is configured.
//
// ⚠️ VERSION BUMP REQUIRED:
// Breaking changes to how records are serialized require incrementing
// LOCAL_STORAGE_VERSION below.
use crate::context::{AppContext, SharedContext};
use crate::model::{Entity, User};
use crate::store::{EntityStore, Filter, merge_patch};
use anyhow::{Context, Result, anyhow, bail};
use chrono::{SecondsFormat, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

// Version history:
// - v1: records stored as raw JSON objects inside a versioned wrapper
const LOCAL_STORAGE_VERSION: u32 = 1;

/// Wrapper struct for versioned local storage
#[derive(Serialize, Deserialize, Default)]
struct CollectionFile {
    #[serde(default)]
    version: u32,
    #[serde(default)]
    records: Vec<Value>,
}

pub struct LocalStorage;

impl LocalStorage {
    fn get_lock_path(file_path: &Path) -> PathBuf {
        let mut name = file_path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".lock");
        file_path.with_file_name(name)
    }

    /// Runs `f` while holding an exclusive advisory lock next to `file_path`.
    pub fn with_lock<F, T>(file_path: &Path, f: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        let lock_path = Self::get_lock_path(file_path);
        let file = fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .with_context(|| format!("Failed to open lock file {:?}", lock_path))?;

        file.lock_exclusive()?;
        let result = f();
        FileExt::unlock(&file)?;
        result
    }

    /// Writes to a temp file first so readers never observe a half-written file.
    pub fn atomic_write<P: AsRef<Path>, C: AsRef<[u8]>>(path: P, contents: C) -> Result<()> {
        let path = path.as_ref();
        let tmp_path = path.with_extension("tmp");
        fs::write(&tmp_path, contents)?;
        fs::rename(tmp_path, path)?;
        Ok(())
    }

    /// Reads a collection without locking. A missing file is an empty collection;
    /// an unreadable one is an error so that it never gets overwritten.
    fn load_records(path: &Path) -> Result<Vec<Value>> {
        if !path.exists() {
            return Ok(Vec::new());
        }
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        if json.trim().is_empty() {
            return Ok(Vec::new());
        }
        let data: CollectionFile = serde_json::from_str(&json)
            .with_context(|| format!("Corrupt local data in {}", path.display()))?;
        if data.version > LOCAL_STORAGE_VERSION {
            bail!(
                "{} was written by a newer version (v{}, this build reads v{})",
                path.display(),
                data.version,
                LOCAL_STORAGE_VERSION
            );
        }
        Ok(data.records)
    }

    pub fn read_collection(path: &Path) -> Result<Vec<Value>> {
        Self::with_lock(path, || Self::load_records(path))
    }

    /// Load, mutate and write back a collection under one lock.
    pub fn modify_collection<F, T>(path: &Path, f: F) -> Result<T>
    where
        F: FnOnce(&mut Vec<Value>) -> Result<T>,
    {
        Self::with_lock(path, || {
            let mut records = Self::load_records(path)?;
            let out = f(&mut records)?;
            let data = CollectionFile {
                version: LOCAL_STORAGE_VERSION,
                records,
            };
            let json = serde_json::to_string_pretty(&data)?;
            Self::atomic_write(path, json)?;
            Ok(out)
        })
    }
}

fn now_stamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn decode<E: Entity>(value: Value) -> Result<E> {
    serde_json::from_value(value).with_context(|| format!("Malformed {} record", E::NAME))
}

fn decode_all<E: Entity>(values: Vec<Value>) -> Result<Vec<E>> {
    values.into_iter().map(decode::<E>).collect()
}

fn record_id(value: &Value) -> Option<&str> {
    value.get("id").and_then(Value::as_str)
}

fn find_user<'a>(records: &'a [Value], email: &str) -> Option<&'a Value> {
    records.iter().find(|r| {
        r.get("email")
            .and_then(Value::as_str)
            .is_some_and(|e| e.eq_ignore_ascii_case(email))
    })
}

/// `EntityStore` backed by JSON files in the data directory.
#[derive(Clone, Debug)]
pub struct LocalStore {
    ctx: SharedContext,
    user_email: String,
}

impl LocalStore {
    pub fn new(ctx: SharedContext, user_email: &str) -> Self {
        Self {
            ctx,
            user_email: user_email.trim().to_string(),
        }
    }

    fn path<E: Entity>(&self) -> Result<PathBuf> {
        self.ctx.get_collection_path(E::COLLECTION)
    }
}

impl EntityStore for LocalStore {
    async fn list<E: Entity>(&self) -> Result<Vec<E>> {
        let records = LocalStorage::read_collection(&self.path::<E>()?)?;
        decode_all(records)
    }

    async fn filter<E: Entity>(&self, filter: &Filter) -> Result<Vec<E>> {
        let records = LocalStorage::read_collection(&self.path::<E>()?)?;
        decode_all(records.into_iter().filter(|r| filter.matches(r)).collect())
    }

    async fn create<E: Entity>(&self, record: &E) -> Result<E> {
        let mut record = record.clone();
        if record.id().is_empty() {
            record.set_id(Uuid::new_v4().to_string());
        }
        let stamp = now_stamp();
        let meta = record.meta_mut();
        meta.created_date = Some(stamp.clone());
        meta.updated_date = Some(stamp);
        meta.created_by = Some(self.user_email.clone());

        let value = serde_json::to_value(&record)?;
        let id = record.id().to_string();
        LocalStorage::modify_collection(&self.path::<E>()?, |records| {
            if records.iter().any(|r| record_id(r) == Some(id.as_str())) {
                bail!("{} '{}' already exists", E::NAME, id);
            }
            records.push(value);
            Ok(())
        })?;
        log::debug!("Created local {} {}", E::NAME, id);
        Ok(record)
    }

    async fn update<E: Entity>(&self, id: &str, patch: &Value) -> Result<E> {
        let updated = LocalStorage::modify_collection(&self.path::<E>()?, |records| {
            let record = records
                .iter_mut()
                .find(|r| record_id(r) == Some(id))
                .ok_or_else(|| anyhow!("{} '{}' not found", E::NAME, id))?;
            merge_patch(record, patch);
            // Identity is not patchable.
            record["id"] = Value::String(id.to_string());
            record["updated_date"] = Value::String(now_stamp());
            // Validate before the write so a bad patch never reaches disk.
            decode::<E>(record.clone())
        })?;
        log::debug!("Updated local {} {}", E::NAME, id);
        Ok(updated)
    }

    async fn delete<E: Entity>(&self, id: &str) -> Result<()> {
        LocalStorage::modify_collection(&self.path::<E>()?, |records| {
            records.retain(|r| record_id(r) != Some(id));
            Ok(())
        })?;
        log::debug!("Deleted local {} {}", E::NAME, id);
        Ok(())
    }

    async fn me(&self) -> Result<User> {
        let path = self.path::<User>()?;
        let email = self.user_email.clone();
        if let Some(existing) = find_user(&LocalStorage::read_collection(&path)?, &email) {
            return decode(existing.clone());
        }

        let value = LocalStorage::modify_collection(&path, |records| {
            // Another process may have added the user since the read.
            if let Some(existing) = find_user(records, &email) {
                return Ok(existing.clone());
            }
            let stamp = now_stamp();
            let user = User {
                id: Uuid::new_v4().to_string(),
                email: email.clone(),
                meta: crate::model::RecordMeta {
                    created_date: Some(stamp.clone()),
                    updated_date: Some(stamp),
                    created_by: None,
                },
                ..Default::default()
            };
            let value = serde_json::to_value(&user)?;
            records.push(value.clone());
            log::info!("Created local user {}", email);
            Ok(value)
        })?;
        decode(value)
    }

    async fn update_me(&self, patch: &Value) -> Result<User> {
        let me = self.me().await?;
        self.update::<User>(&me.id, patch).await
    }
}
