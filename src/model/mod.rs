// File: ./src/model/mod.rs
pub mod display;
pub mod entities;
pub mod item;
pub mod parser;
pub mod priority;
pub mod recurrence;

pub use entities::{Entity, RecordMeta, Subtask, Tag, TaskList, User};
pub use item::{Recurrence, Task, TaskDraft};
pub use priority::{EscalationRules, MoveDirection, SortMode, TaskSummary};
pub use recurrence::RecurrenceEngine;
