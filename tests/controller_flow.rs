// End-to-end workflows of the task controller over the local store.
use bigrocks::context::TestContext;
use bigrocks::controller::{SubtaskProgress, SyncOutcome, TaskController};
use bigrocks::client::SyncAction;
use bigrocks::model::{
    Entity, MoveDirection, Recurrence, SortMode, Subtask, Task, TaskDraft, User,
};
use bigrocks::storage::LocalStore;
use bigrocks::store::{EntityStore, Filter};
use chrono::{TimeZone, Utc};
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

fn controller(ctx: &Arc<TestContext>) -> TaskController<LocalStore> {
    TaskController::new(LocalStore::new(ctx.clone(), "ann@example.com"), None)
}

fn draft(title: &str, urgency: u8, importance: u8) -> TaskDraft {
    TaskDraft {
        urgency,
        importance,
        ..TaskDraft::new(title)
    }
}

#[tokio::test]
async fn test_create_validates_and_stores_open_task() {
    let ctx = Arc::new(TestContext::new());
    let ctrl = controller(&ctx);

    assert!(ctrl.create_task(TaskDraft::new("   ")).await.is_err());
    assert!(ctrl.create_task(draft("Bad", 0, 3)).await.is_err());

    let outcome = ctrl.create_task(draft("  Plan trip ", 4, 5)).await.unwrap();
    assert!(outcome.warnings.is_empty());
    let task = outcome.task;
    assert_eq!(task.title, "Plan trip");
    assert!(!task.completed);
    assert_eq!(task.list_id, None);

    let fetched = ctrl.get_task(&task.id).await.unwrap().unwrap();
    assert_eq!(fetched.urgency, 4);
    assert_eq!(fetched.importance, 5);
    assert!(ctrl.get_task("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn test_new_task_goes_to_default_list() {
    let ctx = Arc::new(TestContext::new());
    let ctrl = controller(&ctx);
    let list = ctrl.create_list("Home").await.unwrap();
    ctrl.toggle_default_list(&list.id).await.unwrap();

    let task = ctrl.create_task(TaskDraft::new("Fix sink")).await.unwrap().task;
    assert_eq!(task.list_id.as_deref(), Some(list.id.as_str()));
    assert_eq!(ctrl.tasks_in(Some(&list.id)).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_task_view_defaults_to_current_list() {
    let ctx = Arc::new(TestContext::new());
    let ctrl = controller(&ctx);
    assert_eq!(ctrl.view_list(None, false).await.unwrap(), None);

    let home = ctrl.create_list("Home").await.unwrap();
    let work = ctrl.create_list("Work").await.unwrap();
    ctrl.toggle_default_list(&home.id).await.unwrap();

    assert_eq!(ctrl.view_list(None, false).await.unwrap(), Some(home.id.clone()));
    assert_eq!(ctrl.view_list(None, true).await.unwrap(), None);
    assert_eq!(
        ctrl.view_list(Some(&work.id), true).await.unwrap(),
        Some(work.id.clone())
    );

    let added = ctrl.create_task(TaskDraft::new("Fix sink")).await.unwrap().task;
    let shown = ctrl.view_list(None, false).await.unwrap();
    let overview = ctrl.overview(shown.as_deref()).await.unwrap();
    assert!(overview.tasks.iter().any(|t| t.id == added.id));
}

#[tokio::test]
async fn test_update_keeps_list_and_completion() {
    let ctx = Arc::new(TestContext::new());
    let ctrl = controller(&ctx);
    let mut d = TaskDraft::new("Read book");
    d.list_id = Some("L1".to_string());
    let task = ctrl.create_task(d).await.unwrap().task;
    ctrl.toggle_complete(&task.id).await.unwrap();

    let mut edit = TaskDraft::from_task(&ctrl.get_task(&task.id).await.unwrap().unwrap());
    edit.title = "Read two books".to_string();
    edit.list_id = Some("L2".to_string());
    edit.notes = "Fiction first".to_string();
    let updated = ctrl.update_task(&task.id, edit).await.unwrap().task;

    assert_eq!(updated.title, "Read two books");
    assert_eq!(updated.list_id.as_deref(), Some("L1"));
    assert!(updated.completed);
    assert_eq!(updated.notes.as_deref(), Some("Fiction first"));

    assert!(
        ctrl.update_task("missing", TaskDraft::new("x"))
            .await
            .is_err()
    );
}

#[tokio::test]
async fn test_toggle_twice_restores_open_state() {
    let ctx = Arc::new(TestContext::new());
    let ctrl = controller(&ctx);
    let task = ctrl.create_task(TaskDraft::new("Call bank")).await.unwrap().task;

    let done = ctrl.toggle_complete(&task.id).await.unwrap();
    assert!(done.task.completed);
    assert!(done.task.completed_date.is_some());
    assert!(done.spawned.is_none());

    let reopened = ctrl.toggle_complete(&task.id).await.unwrap();
    assert!(!reopened.task.completed);
    assert_eq!(reopened.task.completed_date, None);
    assert!(reopened.spawned.is_none());
}

#[tokio::test]
async fn test_completing_recurring_task_spawns_next_with_checklist() {
    let ctx = Arc::new(TestContext::new());
    let ctrl = controller(&ctx);

    let due = Utc.with_ymd_and_hms(2030, 9, 2, 8, 0, 0).unwrap();
    let mut d = draft("Weekly review", 3, 4);
    d.recurrence = Recurrence::Weekly;
    d.deadline = Some(due);
    let task = ctrl.create_task(d).await.unwrap().task;

    let inbox = ctrl.add_subtask(&task.id, "Empty inbox").await.unwrap();
    ctrl.add_subtask(&task.id, "Plan week").await.unwrap();
    ctrl.set_subtask_completed(&inbox.id, true).await.unwrap();

    let outcome = ctrl.toggle_complete(&task.id).await.unwrap();
    assert!(outcome.task.completed);
    let next = outcome.spawned.expect("recurring task should spawn");
    assert_ne!(next.id, task.id);
    assert!(!next.completed);
    assert_eq!(next.recurrence, Recurrence::Weekly);
    assert_eq!(
        next.deadline,
        Some(Utc.with_ymd_and_hms(2030, 9, 9, 8, 0, 0).unwrap())
    );

    let copied = ctrl.subtasks(&next.id).await.unwrap();
    let titles: Vec<&str> = copied.iter().map(|s| s.title.as_str()).collect();
    assert_eq!(titles, vec!["Empty inbox", "Plan week"]);
    assert!(copied.iter().all(|s| !s.completed));

    // The original checklist is untouched.
    let original = ctrl.subtask_progress(&task.id).await.unwrap();
    assert_eq!(original, SubtaskProgress { done: 1, total: 2 });

    // Re-opening the completed instance does not spawn again.
    let reopened = ctrl.toggle_complete(&task.id).await.unwrap();
    assert!(reopened.spawned.is_none());
    assert_eq!(ctrl.tasks_in(None).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_completing_again_after_reopen_keeps_one_next_instance() {
    let ctx = Arc::new(TestContext::new());
    let ctrl = controller(&ctx);

    let mut d = draft("Water plants", 2, 3);
    d.recurrence = Recurrence::Weekly;
    d.deadline = Some(Utc.with_ymd_and_hms(2030, 1, 1, 12, 0, 0).unwrap());
    let task = ctrl.create_task(d).await.unwrap().task;
    ctrl.add_subtask(&task.id, "Fern").await.unwrap();

    let first = ctrl.toggle_complete(&task.id).await.unwrap();
    let next = first.spawned.unwrap();
    assert_eq!(first.task.next_instance_id.as_deref(), Some(next.id.as_str()));

    ctrl.toggle_complete(&task.id).await.unwrap();
    let again = ctrl.toggle_complete(&task.id).await.unwrap();
    assert!(again.task.completed);
    assert!(again.spawned.is_none());

    let open: Vec<Task> = ctrl
        .tasks_in(None)
        .await
        .unwrap()
        .into_iter()
        .filter(|t| !t.completed)
        .collect();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].id, next.id);
    assert_eq!(ctrl.subtasks(&next.id).await.unwrap().len(), 1);

    // Once the next instance is gone, completing spawns a fresh one.
    ctrl.delete_task(&next.id).await.unwrap();
    ctrl.toggle_complete(&task.id).await.unwrap();
    let respawn = ctrl.toggle_complete(&task.id).await.unwrap();
    let fresh = respawn.spawned.unwrap();
    assert_ne!(fresh.id, next.id);
    assert_eq!(
        fresh.deadline,
        Some(Utc.with_ymd_and_hms(2030, 1, 8, 12, 0, 0).unwrap())
    );
}

/// Local store whose subtask inserts can be made to fail.
struct FailingChecklistStore {
    inner: LocalStore,
    fail_subtasks: AtomicBool,
}

impl EntityStore for FailingChecklistStore {
    async fn list<E: Entity>(&self) -> anyhow::Result<Vec<E>> {
        self.inner.list().await
    }

    async fn filter<E: Entity>(&self, filter: &Filter) -> anyhow::Result<Vec<E>> {
        self.inner.filter(filter).await
    }

    async fn create<E: Entity>(&self, record: &E) -> anyhow::Result<E> {
        if E::NAME == Subtask::NAME && self.fail_subtasks.load(Ordering::SeqCst) {
            anyhow::bail!("disk full");
        }
        self.inner.create(record).await
    }

    async fn update<E: Entity>(&self, id: &str, patch: &Value) -> anyhow::Result<E> {
        self.inner.update(id, patch).await
    }

    async fn delete<E: Entity>(&self, id: &str) -> anyhow::Result<()> {
        self.inner.delete::<E>(id).await
    }

    async fn me(&self) -> anyhow::Result<User> {
        self.inner.me().await
    }

    async fn update_me(&self, patch: &Value) -> anyhow::Result<User> {
        self.inner.update_me(patch).await
    }
}

#[tokio::test]
async fn test_failed_checklist_copy_leaves_task_open() {
    let ctx = Arc::new(TestContext::new());
    let store = FailingChecklistStore {
        inner: LocalStore::new(ctx.clone(), "ann@example.com"),
        fail_subtasks: AtomicBool::new(false),
    };
    let ctrl = TaskController::new(store, None);

    let mut d = draft("Stand-up notes", 3, 3);
    d.recurrence = Recurrence::Daily;
    d.deadline = Some(Utc.with_ymd_and_hms(2030, 3, 1, 9, 0, 0).unwrap());
    let task = ctrl.create_task(d).await.unwrap().task;
    ctrl.add_subtask(&task.id, "Blockers").await.unwrap();

    ctrl.store().fail_subtasks.store(true, Ordering::SeqCst);
    let err = ctrl.toggle_complete(&task.id).await.unwrap_err();
    assert!(format!("{:#}", err).contains("disk full"));

    let tasks = ctrl.tasks_in(None).await.unwrap();
    assert_eq!(tasks.len(), 1);
    assert!(!tasks[0].completed);
    assert_eq!(tasks[0].next_instance_id, None);

    ctrl.store().fail_subtasks.store(false, Ordering::SeqCst);
    let outcome = ctrl.toggle_complete(&task.id).await.unwrap();
    assert!(outcome.spawned.is_some());
    assert_eq!(ctrl.tasks_in(None).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_delete_task_removes_checklist() {
    let ctx = Arc::new(TestContext::new());
    let ctrl = controller(&ctx);
    let task = ctrl.create_task(TaskDraft::new("Pack")).await.unwrap().task;
    ctrl.add_subtask(&task.id, "Socks").await.unwrap();
    ctrl.add_subtask(&task.id, "Charger").await.unwrap();

    let warnings = ctrl.delete_task(&task.id).await.unwrap();
    assert!(warnings.is_empty());
    assert!(ctrl.get_task(&task.id).await.unwrap().is_none());
    let left: Vec<Subtask> = ctrl.store().list().await.unwrap();
    assert!(left.is_empty());
    assert!(ctrl.delete_task(&task.id).await.is_err());
}

#[tokio::test]
async fn test_subtask_rules() {
    let ctx = Arc::new(TestContext::new());
    let ctrl = controller(&ctx);
    let task = ctrl.create_task(TaskDraft::new("Garden")).await.unwrap().task;

    assert!(ctrl.add_subtask(&task.id, "  ").await.is_err());
    assert!(ctrl.add_subtask("missing", "Weed").await.is_err());

    let a = ctrl.add_subtask(&task.id, " Weed ").await.unwrap();
    let b = ctrl.add_subtask(&task.id, "Mow").await.unwrap();
    assert_eq!(a.title, "Weed");
    assert_eq!((a.order, b.order), (0, 1));

    ctrl.set_subtask_completed(&b.id, true).await.unwrap();
    assert_eq!(
        ctrl.subtask_progress(&task.id).await.unwrap(),
        SubtaskProgress { done: 1, total: 2 }
    );
    ctrl.delete_subtask(&a.id).await.unwrap();
    assert_eq!(ctrl.subtasks(&task.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_overview_and_completed_views() {
    let ctx = Arc::new(TestContext::new());
    let ctrl = controller(&ctx);
    let low = ctrl.create_task(draft("Low", 1, 1)).await.unwrap().task;
    let high = ctrl.create_task(draft("High", 5, 5)).await.unwrap().task;
    let mid = ctrl.create_task(draft("Mid", 3, 3)).await.unwrap().task;
    ctrl.toggle_complete(&high.id).await.unwrap();

    let overview = ctrl.overview(None).await.unwrap();
    let order: Vec<&str> = overview.tasks.iter().map(|t| t.title.as_str()).collect();
    assert_eq!(order, vec!["Mid", "Low", "High"]);
    assert_eq!(overview.summary.pending, 2);
    assert_eq!(overview.summary.done, 1);

    let completed = ctrl.completed_tasks(None).await.unwrap();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].id, high.id);
    assert_ne!(completed[0].id, low.id);
    assert_ne!(completed[0].id, mid.id);
}

#[tokio::test]
async fn test_manual_reordering() {
    let ctx = Arc::new(TestContext::new());
    let priority_ctrl = controller(&ctx);
    let a = priority_ctrl.create_task(draft("A", 5, 5)).await.unwrap().task;
    priority_ctrl.create_task(draft("B", 4, 4)).await.unwrap();
    let c = priority_ctrl.create_task(draft("C", 3, 3)).await.unwrap().task;

    assert!(
        priority_ctrl
            .move_task(None, &c.id, MoveDirection::Up)
            .await
            .is_err()
    );

    let ctrl = controller(&ctx).with_sort_mode(SortMode::Manual);
    assert!(ctrl.move_task(None, &c.id, MoveDirection::Up).await.unwrap());
    let order: Vec<String> = ctrl
        .overview(None)
        .await
        .unwrap()
        .tasks
        .into_iter()
        .map(|t| t.title)
        .collect();
    assert_eq!(order, vec!["A", "C", "B"]);

    assert!(!ctrl.move_task(None, &a.id, MoveDirection::Up).await.unwrap());
}

#[tokio::test]
async fn test_tags_with_palette_and_validation() {
    let ctx = Arc::new(TestContext::new());
    let ctrl = controller(&ctx);

    let work = ctrl.create_tag("Work", Some("#3b82f6")).await.unwrap();
    assert_eq!(work.color, "#3B82F6");
    assert_eq!(work.owner_email, "ann@example.com");
    let home = ctrl.create_tag("Home", None).await.unwrap();
    assert_ne!(home.color, work.color);
    assert!(home.color.starts_with('#'));
    assert!(ctrl.create_tag("Bad", Some("blue")).await.is_err());
    assert!(ctrl.create_tag(" ", None).await.is_err());

    let task = ctrl.create_task(TaskDraft::new("Taxes")).await.unwrap().task;
    let ids = vec![home.id.clone(), work.id.clone(), home.id.clone()];
    let tagged = ctrl.set_task_tags(&task.id, &ids).await.unwrap();
    assert_eq!(tagged.tag_ids, vec![home.id.clone(), work.id.clone()]);

    let names: Vec<String> = ctrl
        .tags_for(&tagged)
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.name)
        .collect();
    assert_eq!(names, vec!["Home", "Work"]);

    // Another user's tags stay private.
    let bob = TaskController::new(LocalStore::new(ctx.clone(), "bob@example.com"), None);
    assert!(bob.tags().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_sync_without_calendar_is_not_required() {
    let ctx = Arc::new(TestContext::new());
    let ctrl = controller(&ctx);
    let mut d = TaskDraft::new("Dentist");
    d.sync_to_calendar = true;
    d.deadline = Some(Utc.with_ymd_and_hms(2030, 1, 1, 9, 0, 0).unwrap());
    let task: Task = ctrl.create_task(d).await.unwrap().task;

    assert_eq!(
        ctrl.sync_task_after_save(&task.id, SyncAction::Create)
            .await
            .unwrap(),
        SyncOutcome::NotRequired
    );
    assert_eq!(
        ctrl.sync_task_after_save("missing", SyncAction::Create)
            .await
            .unwrap(),
        SyncOutcome::TaskNotFound
    );
    assert!(!ctrl.calendar_status().await.connected);
}
