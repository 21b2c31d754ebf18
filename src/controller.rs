// File: src/controller.rs
//! Central logic controller for task, list, tag and subtask workflows.
//! Every front end (currently the CLI) delegates to this controller, so the
//! same rules apply whether the store is the hosted API or the local files.
use crate::client::calendar::{CalendarClient, ConnectionStatus, SyncAction};
use crate::color_utils;
use crate::model::priority::{self, EscalationRules, MoveDirection, SortMode, TaskSummary};
use crate::model::{RecurrenceEngine, Subtask, Tag, Task, TaskDraft, TaskList, User};
use crate::store::{EntityStore, Filter};
use anyhow::{Result, anyhow, bail};
use chrono::Utc;
use futures::future::try_join_all;
use serde_json::json;

/// Result of a save: the stored task plus anything that went wrong on the side
/// (calendar sync) without failing the save itself.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveOutcome {
    pub task: Task,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToggleOutcome {
    pub task: Task,
    /// Next instance created when a recurring task was completed.
    pub spawned: Option<Task>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    TaskNotFound,
    NotRequired,
    Synced {
        event_id: Option<String>,
        event_link: Option<String>,
    },
}

/// Sorted tasks plus the counters shown above them.
#[derive(Debug, Clone, PartialEq)]
pub struct Overview {
    pub tasks: Vec<Task>,
    pub summary: TaskSummary,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListGroups {
    pub mine: Vec<TaskList>,
    pub shared_with_me: Vec<TaskList>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubtaskProgress {
    pub done: usize,
    pub total: usize,
}

impl SubtaskProgress {
    pub fn of(subtasks: &[Subtask]) -> Self {
        Self {
            done: subtasks.iter().filter(|s| s.completed).count(),
            total: subtasks.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}

fn validate_email(email: &str) -> Result<String> {
    let email = email.trim();
    let valid = match email.split_once('@') {
        Some((user, domain)) => {
            !user.is_empty() && !domain.is_empty() && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if !valid {
        bail!("'{}' is not a valid email address", email);
    }
    Ok(email.to_string())
}

fn validate_name(kind: &str, name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        bail!("{} name cannot be empty", kind);
    }
    Ok(name.to_string())
}

pub struct TaskController<S: EntityStore> {
    store: S,
    calendar: Option<CalendarClient>,
    rules: EscalationRules,
    mode: SortMode,
}

impl<S: EntityStore> TaskController<S> {
    pub fn new(store: S, calendar: Option<CalendarClient>) -> Self {
        Self {
            store,
            calendar,
            rules: EscalationRules::default(),
            mode: SortMode::default(),
        }
    }

    pub fn with_rules(mut self, rules: EscalationRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_sort_mode(mut self, mode: SortMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn sort_mode(&self) -> SortMode {
        self.mode
    }

    pub fn rules(&self) -> &EscalationRules {
        &self.rules
    }

    pub async fn me(&self) -> Result<User> {
        self.store.me().await
    }

    // --- Tasks ---

    /// Tasks of `list_id`, or every task the store returns when `None`.
    pub async fn tasks_in(&self, list_id: Option<&str>) -> Result<Vec<Task>> {
        match list_id {
            Some(id) => self.store.filter(&Filter::eq("list_id", id)).await,
            None => self.store.list().await,
        }
    }

    pub async fn overview(&self, list_id: Option<&str>) -> Result<Overview> {
        let mut tasks = self.tasks_in(list_id).await?;
        priority::sort_tasks(&mut tasks, Utc::now(), &self.rules, self.mode);
        let summary = TaskSummary::of(&tasks);
        Ok(Overview { tasks, summary })
    }

    /// Completed tasks, most recently completed first.
    pub async fn completed_tasks(&self, list_id: Option<&str>) -> Result<Vec<Task>> {
        let mut tasks: Vec<Task> = self
            .tasks_in(list_id)
            .await?
            .into_iter()
            .filter(|t| t.completed)
            .collect();
        tasks.sort_by(|a, b| {
            b.completed_date
                .cmp(&a.completed_date)
                .then_with(|| a.title.to_lowercase().cmp(&b.title.to_lowercase()))
        });
        Ok(tasks)
    }

    pub async fn get_task(&self, id: &str) -> Result<Option<Task>> {
        self.store.get(id).await
    }

    async fn require_task(&self, id: &str) -> Result<Task> {
        self.get_task(id)
            .await?
            .ok_or_else(|| anyhow!("Task not found: {}", id))
    }

    /// Creates a task from the form. Without an explicit list the task goes to
    /// the current list.
    pub async fn create_task(&self, draft: TaskDraft) -> Result<SaveOutcome> {
        draft.validate()?;
        let mut task = draft.into_new_task();
        if task.list_id.is_none() {
            task.list_id = self.current_list().await?.map(|l| l.id);
        }
        let created = self.store.create(&task).await?;
        log::info!("Created task {} '{}'", created.id, created.title);
        Ok(self.sync_quietly(created, SyncAction::Create).await)
    }

    pub async fn update_task(&self, id: &str, draft: TaskDraft) -> Result<SaveOutcome> {
        draft.validate()?;
        self.require_task(id).await?;
        let updated: Task = self.store.update(id, &draft.to_patch()).await?;
        log::info!("Updated task {}", id);
        Ok(self.sync_quietly(updated, SyncAction::Update).await)
    }

    /// Deletes a task together with its subtasks and calendar event.
    /// Returns warnings for side effects that failed.
    pub async fn delete_task(&self, id: &str) -> Result<Vec<String>> {
        let task = self.require_task(id).await?;
        let mut warnings = Vec::new();

        if let (Some(calendar), Some(_)) = (&self.calendar, &task.calendar_event_id)
            && let Err(e) = calendar.push_event(&task, SyncAction::Delete).await
        {
            log::warn!("Could not delete calendar event of task {}: {:#}", id, e);
            warnings.push(format!("Calendar event not deleted: {:#}", e));
        }

        let subtasks = self.subtasks(id).await?;
        try_join_all(subtasks.iter().map(|s| self.store.delete::<Subtask>(&s.id))).await?;
        self.store.delete::<Task>(id).await?;
        log::info!("Deleted task {} and {} subtask(s)", id, subtasks.len());
        Ok(warnings)
    }

    /// Flips completion. Completing a recurring task also creates its next
    /// instance, with the checklist copied over unchecked. A task reopened and
    /// completed again keeps the instance it already spawned.
    pub async fn toggle_complete(&self, id: &str) -> Result<ToggleOutcome> {
        let task = self.require_task(id).await?;
        let now = Utc::now();

        if task.completed {
            let patch = json!({ "completed": false, "completed_date": null });
            let reopened: Task = self.store.update(id, &patch).await?;
            log::info!("Reopened task {}", id);
            return Ok(ToggleOutcome {
                task: reopened,
                spawned: None,
                warnings: Vec::new(),
            });
        }

        let already_spawned = match &task.next_instance_id {
            Some(next_id) => self.store.get::<Task>(next_id).await?.is_some(),
            None => false,
        };
        let next = if already_spawned {
            None
        } else {
            RecurrenceEngine::next_occurrence(&task, now)
        };
        let Some(mut next) = next else {
            let patch = json!({ "completed": true, "completed_date": now });
            let done: Task = self.store.update(id, &patch).await?;
            log::info!("Completed task {}", id);
            return Ok(ToggleOutcome {
                task: done,
                spawned: None,
                warnings: Vec::new(),
            });
        };

        // The calendar event is a recurring series; it follows the open instance.
        next.calendar_event_id = task.calendar_event_id.clone();
        let created = self.spawn_instance(&next, id).await?;

        let patch = json!({
            "completed": true,
            "completed_date": now,
            "calendar_event_id": null,
            "next_instance_id": created.id,
        });
        let done: Task = match self.store.update(id, &patch).await {
            Ok(done) => done,
            Err(e) => {
                self.discard_instance(&created.id).await;
                return Err(e);
            }
        };
        log::info!(
            "Completed task {}, next occurrence {} (due {:?})",
            id,
            created.id,
            created.deadline
        );

        let SaveOutcome { task: spawned, warnings } =
            self.sync_quietly(created, SyncAction::Update).await;
        Ok(ToggleOutcome {
            task: done,
            spawned: Some(spawned),
            warnings,
        })
    }

    /// Stores `next` and copies the checklist of `source_id` onto it, unchecked.
    /// On failure nothing of the new instance is left behind.
    async fn spawn_instance(&self, next: &Task, source_id: &str) -> Result<Task> {
        let created = self.store.create(next).await?;
        let copied: Result<Vec<Subtask>> = async {
            let checklist = self.subtasks(source_id).await?;
            try_join_all(checklist.iter().map(|s| {
                let copy = Subtask::new(&created.id, &s.title, s.order);
                async move { self.store.create(&copy).await }
            }))
            .await
        }
        .await;
        if let Err(e) = copied {
            self.discard_instance(&created.id).await;
            return Err(e.context(format!("Could not copy the checklist of task {}", source_id)));
        }
        Ok(created)
    }

    async fn discard_instance(&self, id: &str) {
        let cleanup: Result<()> = async {
            let subtasks = self.subtasks(id).await?;
            try_join_all(subtasks.iter().map(|s| self.store.delete::<Subtask>(&s.id))).await?;
            self.store.delete::<Task>(id).await
        }
        .await;
        if let Err(e) = cleanup {
            log::warn!("Could not remove partial task {}: {:#}", id, e);
        }
    }

    /// Moves a task one step in the manual order of `list_id`.
    /// Returns `false` when the task is already at that edge.
    pub async fn move_task(
        &self,
        list_id: Option<&str>,
        id: &str,
        direction: MoveDirection,
    ) -> Result<bool> {
        if self.mode != SortMode::Manual {
            bail!("Tasks can only be reordered in manual sort mode");
        }
        let tasks = self.overview(list_id).await?.tasks;
        if !tasks.iter().any(|t| t.id == id && !t.completed) {
            bail!("Task not found among open tasks: {}", id);
        }
        let changes = priority::move_task(&tasks, id, direction);
        if changes.is_empty() {
            return Ok(false);
        }
        for (task_id, order) in &changes {
            self.store
                .update::<Task>(task_id, &json!({ "sort_order": order }))
                .await?;
        }
        log::debug!("Reordered {} task(s)", changes.len());
        Ok(true)
    }

    // --- Subtasks ---

    pub async fn subtasks(&self, task_id: &str) -> Result<Vec<Subtask>> {
        let mut subtasks: Vec<Subtask> = self.store.filter(&Filter::eq("task_id", task_id)).await?;
        subtasks.sort_by(|a, b| {
            a.order
                .cmp(&b.order)
                .then_with(|| a.meta.created_date.cmp(&b.meta.created_date))
        });
        Ok(subtasks)
    }

    pub async fn subtask_progress(&self, task_id: &str) -> Result<SubtaskProgress> {
        Ok(SubtaskProgress::of(&self.subtasks(task_id).await?))
    }

    /// Appends a checklist item to a task.
    pub async fn add_subtask(&self, task_id: &str, title: &str) -> Result<Subtask> {
        if title.trim().is_empty() {
            bail!("Subtask title cannot be empty");
        }
        self.require_task(task_id).await?;
        let order = self.subtasks(task_id).await?.len() as i64;
        self.store
            .create(&Subtask::new(task_id, title, order))
            .await
    }

    pub async fn set_subtask_completed(&self, id: &str, completed: bool) -> Result<Subtask> {
        self.store
            .update(id, &json!({ "completed": completed }))
            .await
    }

    pub async fn delete_subtask(&self, id: &str) -> Result<()> {
        self.store.delete::<Subtask>(id).await
    }

    // --- Tags ---

    /// Tags owned by the signed-in user, by name.
    pub async fn tags(&self) -> Result<Vec<Tag>> {
        let me = self.store.me().await?;
        let mut tags: Vec<Tag> = self
            .store
            .list::<Tag>()
            .await?
            .into_iter()
            .filter(|t| t.owner_email.eq_ignore_ascii_case(&me.email))
            .collect();
        tags.sort_by_key(|t| t.name.to_lowercase());
        Ok(tags)
    }

    /// Creates a tag. Without a color, one not yet used by the user's tags is
    /// picked from the palette.
    pub async fn create_tag(&self, name: &str, color: Option<&str>) -> Result<Tag> {
        let name = validate_name("Tag", name)?;
        let me = self.store.me().await?;
        let color = match color {
            Some(c) => color_utils::normalize_hex(c)
                .ok_or_else(|| anyhow!("'{}' is not a #RRGGBB color", c))?,
            None => {
                let existing = self.tags().await?;
                let used: Vec<&str> = existing.iter().map(|t| t.color.as_str()).collect();
                color_utils::pick_tag_color(&used).to_string()
            }
        };
        let tag = Tag {
            name,
            color,
            owner_email: me.email,
            ..Default::default()
        };
        self.store.create(&tag).await
    }

    pub async fn set_task_tags(&self, task_id: &str, tag_ids: &[String]) -> Result<Task> {
        self.require_task(task_id).await?;
        let mut ids: Vec<String> = Vec::with_capacity(tag_ids.len());
        for id in tag_ids {
            if !ids.contains(id) {
                ids.push(id.clone());
            }
        }
        self.store
            .update(task_id, &json!({ "tag_ids": ids }))
            .await
    }

    /// The user's tags attached to `task`, in the task's order.
    /// Ids that no longer resolve are skipped.
    pub async fn tags_for(&self, task: &Task) -> Result<Vec<Tag>> {
        let tags = self.tags().await?;
        Ok(task
            .tag_ids
            .iter()
            .filter_map(|id| tags.iter().find(|t| &t.id == id).cloned())
            .collect())
    }

    // --- Lists ---

    async fn lists_for(&self, email: &str) -> Result<Vec<TaskList>> {
        let mut lists: Vec<TaskList> = self
            .store
            .list::<TaskList>()
            .await?
            .into_iter()
            .filter(|l| l.is_visible_to(email))
            .collect();
        lists.sort_by_key(|l| l.name.to_lowercase());
        Ok(lists)
    }

    pub async fn visible_lists(&self) -> Result<ListGroups> {
        let me = self.store.me().await?;
        let (mine, others): (Vec<_>, Vec<_>) = self
            .lists_for(&me.email)
            .await?
            .into_iter()
            .partition(|l| l.is_owned_by(&me.email));
        Ok(ListGroups {
            mine: mine.into_iter().filter(|l| !l.is_personal).collect(),
            shared_with_me: others,
        })
    }

    /// Fetches a list the signed-in user owns.
    async fn owned_list(&self, id: &str) -> Result<(TaskList, User)> {
        let me = self.store.me().await?;
        let list: TaskList = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| anyhow!("List not found: {}", id))?;
        if !list.is_owned_by(&me.email) {
            bail!("Only the owner of '{}' can change it", list.name);
        }
        Ok((list, me))
    }

    pub async fn create_list(&self, name: &str) -> Result<TaskList> {
        let name = validate_name("List", name)?;
        let me = self.store.me().await?;
        let list = TaskList {
            name,
            owner_email: me.email,
            shared_with: Vec::new(),
            is_personal: false,
            ..Default::default()
        };
        let created = self.store.create(&list).await?;
        log::info!("Created list {} '{}'", created.id, created.name);
        Ok(created)
    }

    pub async fn rename_list(&self, id: &str, name: &str) -> Result<TaskList> {
        let name = validate_name("List", name)?;
        self.owned_list(id).await?;
        self.store.update(id, &json!({ "name": name })).await
    }

    pub async fn share_list(&self, id: &str, email: &str) -> Result<TaskList> {
        let email = validate_email(email)?;
        let (list, me) = self.owned_list(id).await?;
        if email.eq_ignore_ascii_case(&me.email) {
            bail!("You already own '{}'", list.name);
        }
        if list.is_shared_with(&email) {
            return Ok(list);
        }
        let mut shared_with = list.shared_with;
        shared_with.push(email.clone());
        let updated = self
            .store
            .update(id, &json!({ "shared_with": shared_with }))
            .await?;
        log::info!("Shared list {} with {}", id, email);
        Ok(updated)
    }

    pub async fn unshare_list(&self, id: &str, email: &str) -> Result<TaskList> {
        let email = email.trim();
        let (list, _) = self.owned_list(id).await?;
        let shared_with: Vec<String> = list
            .shared_with
            .into_iter()
            .filter(|e| !e.eq_ignore_ascii_case(email))
            .collect();
        self.store
            .update(id, &json!({ "shared_with": shared_with }))
            .await
    }

    /// Deletes a list with all of its tasks. Returns warnings from the task deletions.
    pub async fn delete_list(&self, id: &str) -> Result<Vec<String>> {
        let (list, me) = self.owned_list(id).await?;
        let tasks = self.tasks_in(Some(id)).await?;
        let mut warnings = Vec::new();
        for task in &tasks {
            warnings.extend(self.delete_task(&task.id).await?);
        }
        self.store.delete::<TaskList>(id).await?;
        if me.default_list_id.as_deref() == Some(id) {
            self.store
                .update_me(&json!({ "default_list_id": null }))
                .await?;
        }
        log::info!("Deleted list '{}' and {} task(s)", list.name, tasks.len());
        Ok(warnings)
    }

    /// Makes `id` the default list, or clears the default when it already is.
    /// Returns the new default.
    pub async fn toggle_default_list(&self, id: &str) -> Result<Option<String>> {
        let me = self.store.me().await?;
        let new_default = if me.default_list_id.as_deref() == Some(id) {
            None
        } else {
            let visible = self.lists_for(&me.email).await?;
            if !visible.iter().any(|l| l.id == id) {
                bail!("List not found: {}", id);
            }
            Some(id.to_string())
        };
        let updated = self
            .store
            .update_me(&json!({ "default_list_id": new_default }))
            .await?;
        Ok(updated.default_list_id)
    }

    /// The default list when it is still visible, else the personal list.
    pub async fn current_list(&self) -> Result<Option<TaskList>> {
        let me = self.store.me().await?;
        let lists = self.lists_for(&me.email).await?;
        if let Some(default_id) = me.default_list_id.as_deref()
            && let Some(list) = lists.iter().find(|l| l.id == default_id)
        {
            return Ok(Some(list.clone()));
        }
        Ok(lists
            .into_iter()
            .find(|l| l.is_personal && l.is_owned_by(&me.email)))
    }

    /// List shown by the task views: the requested one, nothing (every task)
    /// with `all`, otherwise the current list that new tasks go to.
    pub async fn view_list(&self, requested: Option<&str>, all: bool) -> Result<Option<String>> {
        match requested {
            Some(id) => Ok(Some(id.to_string())),
            None if all => Ok(None),
            None => Ok(self.current_list().await?.map(|l| l.id)),
        }
    }

    // --- Calendar ---

    pub fn calendar_enabled(&self) -> bool {
        self.calendar.is_some()
    }

    pub async fn calendar_status(&self) -> ConnectionStatus {
        match &self.calendar {
            Some(calendar) => calendar.connection_status().await,
            None => ConnectionStatus::default(),
        }
    }

    /// Mirrors the stored task to the calendar after a save.
    pub async fn sync_task_after_save(&self, id: &str, action: SyncAction) -> Result<SyncOutcome> {
        match self.get_task(id).await? {
            Some(task) => Ok(self.sync_task(&task, action).await?.0),
            None => Ok(SyncOutcome::TaskNotFound),
        }
    }

    /// Returns the outcome and, when a new event id was saved back, the updated task.
    async fn sync_task(&self, task: &Task, action: SyncAction) -> Result<(SyncOutcome, Option<Task>)> {
        let Some(calendar) = &self.calendar else {
            return Ok((SyncOutcome::NotRequired, None));
        };
        if !task.wants_calendar_sync() {
            return Ok((SyncOutcome::NotRequired, None));
        }

        let result = calendar.push_event(task, action).await?;
        let mut updated = None;
        if let Some(event_id) = &result.event_id
            && task.calendar_event_id.is_none()
        {
            let saved: Task = self
                .store
                .update(&task.id, &json!({ "calendar_event_id": event_id }))
                .await?;
            updated = Some(saved);
        }
        Ok((
            SyncOutcome::Synced {
                event_id: result.event_id,
                event_link: result.event_link,
            },
            updated,
        ))
    }

    /// Syncs without failing the surrounding save.
    async fn sync_quietly(&self, task: Task, action: SyncAction) -> SaveOutcome {
        match self.sync_task(&task, action).await {
            Ok((_, Some(updated))) => SaveOutcome {
                task: updated,
                warnings: Vec::new(),
            },
            Ok((_, None)) => SaveOutcome {
                task,
                warnings: Vec::new(),
            },
            Err(e) => {
                log::warn!("Calendar sync failed for task {}: {:#}", task.id, e);
                SaveOutcome {
                    warnings: vec![format!("Calendar sync failed: {:#}", e)],
                    task,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_validation() {
        assert_eq!(
            validate_email("  bob@example.com ").unwrap(),
            "bob@example.com"
        );
        assert!(validate_email("bob").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("bob@").is_err());
        assert!(validate_email("bo b@example.com").is_err());
    }

    #[test]
    fn test_subtask_progress() {
        let mut a = Subtask::new("t", "a", 0);
        a.completed = true;
        let b = Subtask::new("t", "b", 1);
        let p = SubtaskProgress::of(&[a, b]);
        assert_eq!(p, SubtaskProgress { done: 1, total: 2 });
        assert!(SubtaskProgress::of(&[]).is_empty());
    }
}
