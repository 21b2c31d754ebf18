// File: ./src/model/entities.rs
// Remote record types (Subtask, Tag, TaskList, User) and the `Entity` trait
// shared by every collection the entity store knows about.
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

/// Server-side bookkeeping attached to every record.
///
/// Kept as opaque strings: the backend owns the format and the client never
/// computes with these values.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct RecordMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
}

/// A record type stored in a named remote collection.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Entity name as used by the remote API (`/entities/{NAME}`).
    const NAME: &'static str;
    /// File stem used by the local store.
    const COLLECTION: &'static str;

    fn id(&self) -> &str;
    fn set_id(&mut self, id: String);
    fn meta_mut(&mut self) -> &mut RecordMeta;
}

/// Treats an explicit JSON `null` like a missing field.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Subtask {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub task_id: String,
    pub title: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub order: i64,
    #[serde(flatten)]
    pub meta: RecordMeta,
}

impl Subtask {
    pub fn new(task_id: &str, title: &str, order: i64) -> Self {
        Self {
            task_id: task_id.to_string(),
            title: title.trim().to_string(),
            order,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub name: String,
    pub color: String,
    #[serde(default)]
    pub owner_email: String,
    #[serde(flatten)]
    pub meta: RecordMeta,
}

#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct TaskList {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub owner_email: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub shared_with: Vec<String>,
    #[serde(default)]
    pub is_personal: bool,
    #[serde(flatten)]
    pub meta: RecordMeta,
}

impl TaskList {
    pub fn is_owned_by(&self, email: &str) -> bool {
        self.owner_email.eq_ignore_ascii_case(email)
    }

    pub fn is_shared_with(&self, email: &str) -> bool {
        self.shared_with.iter().any(|e| e.eq_ignore_ascii_case(email))
    }

    /// A user sees a list when they own it or it was shared with them.
    pub fn is_visible_to(&self, email: &str) -> bool {
        self.is_owned_by(email) || self.is_shared_with(email)
    }
}

#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub default_list_id: Option<String>,
    #[serde(flatten)]
    pub meta: RecordMeta,
}

macro_rules! impl_entity {
    ($ty:ty, $name:literal, $collection:literal) => {
        impl Entity for $ty {
            const NAME: &'static str = $name;
            const COLLECTION: &'static str = $collection;

            fn id(&self) -> &str {
                &self.id
            }

            fn set_id(&mut self, id: String) {
                self.id = id;
            }

            fn meta_mut(&mut self) -> &mut RecordMeta {
                &mut self.meta
            }
        }
    };
}

impl_entity!(crate::model::item::Task, "Task", "tasks");
impl_entity!(Subtask, "Subtask", "subtasks");
impl_entity!(Tag, "Tag", "tags");
impl_entity!(TaskList, "TaskList", "task_lists");
impl_entity!(User, "User", "users");
