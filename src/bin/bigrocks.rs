// File: ./src/bin/bigrocks.rs
use anyhow::Result;
use bigrocks::cli::{self, Command, Invocation, ListCommand, SubCommand};
use bigrocks::client::{CalendarClient, RemoteStore};
use bigrocks::color_utils;
use bigrocks::config::Config;
use bigrocks::context::{AppContext, SharedContext, StandardContext};
use bigrocks::controller::{SubtaskProgress, TaskController};
use bigrocks::model::display::{TaskDisplay, describe_task};
use bigrocks::model::priority::effective_urgency;
use bigrocks::model::{Task, TaskDraft, TaskList};
use bigrocks::storage::LocalStore;
use bigrocks::store::EntityStore;
use chrono::Utc;
use simplelog::{ColorChoice, TermLogger, TerminalMode, WriteLogger};
use std::env;
use std::fs::File;
use std::sync::Arc;

fn init_logging(ctx: &dyn AppContext, config: &Config, verbose: bool) -> Result<()> {
    let level = config.log_level_filter();
    let log_config = simplelog::ConfigBuilder::new()
        .set_time_format_rfc3339()
        .build();
    if verbose {
        TermLogger::init(level, log_config, TerminalMode::Stderr, ColorChoice::Auto)?;
    } else {
        let file = File::create(ctx.get_log_file_path()?)?;
        WriteLogger::init(level, log_config, file)?;
    }
    Ok(())
}

fn print_warnings(warnings: &[String]) {
    for w in warnings {
        eprintln!("warning: {}", w);
    }
}

fn print_task_rows<S: EntityStore>(ctrl: &TaskController<S>, tasks: &[Task]) {
    let now = Utc::now();
    for task in tasks {
        let eff = effective_urgency(task, now, ctrl.rules());
        println!("{}  {}", task.id, task.to_row(eff, now));
    }
}

fn print_lists(title: &str, lists: &[TaskList], default_id: Option<&str>) {
    println!("{}:", title);
    if lists.is_empty() {
        println!("  (none)");
    }
    for list in lists {
        let star = if default_id == Some(list.id.as_str()) {
            " *"
        } else {
            ""
        };
        let shared = if list.shared_with.is_empty() {
            String::new()
        } else {
            format!("  shared with {}", list.shared_with.join(", "))
        };
        println!("  {}  {}{}{}", list.id, list.name, star, shared);
    }
}

async fn run<S: EntityStore>(
    ctrl: TaskController<S>,
    command: Command,
    config: &Config,
    ctx: &SharedContext,
) -> Result<()> {
    match command {
        Command::Help => cli::print_help("bigrocks"),
        Command::Tasks { list, all } => {
            let list = ctrl.view_list(list.as_deref(), all).await?;
            let overview = ctrl.overview(list.as_deref()).await?;
            let shown: Vec<Task> = overview
                .tasks
                .into_iter()
                .filter(|t| all || config.show_completed || !t.completed)
                .collect();
            print_task_rows(&ctrl, &shown);
            let s = overview.summary;
            println!();
            println!("{} pending, {} done, {} total", s.pending, s.done, s.total);
        }
        Command::Completed { list } => {
            let tasks = ctrl.completed_tasks(list.as_deref()).await?;
            if tasks.is_empty() {
                println!("No completed tasks yet.");
            }
            print_task_rows(&ctrl, &tasks);
        }
        Command::Show { id } => {
            let Some(task) = ctrl.get_task(&id).await? else {
                anyhow::bail!("Task not found: {}", id);
            };
            let tags = ctrl.tags_for(&task).await?;
            let subtasks = ctrl.subtasks(&task.id).await?;
            print!("{}", describe_task(&task, &tags, &subtasks));
        }
        Command::Add { title, options } => {
            let mut draft = TaskDraft::new(&title);
            draft.sync_to_calendar = config.calendar.sync_new_tasks;
            options.apply(&mut draft);
            let outcome = ctrl.create_task(draft).await?;
            print_warnings(&outcome.warnings);
            println!("Created {}  {}", outcome.task.id, outcome.task.title);
        }
        Command::Edit { id, options } => {
            let Some(task) = ctrl.get_task(&id).await? else {
                anyhow::bail!("Task not found: {}", id);
            };
            let mut draft = TaskDraft::from_task(&task);
            options.apply(&mut draft);
            let outcome = ctrl.update_task(&id, draft).await?;
            print_warnings(&outcome.warnings);
            println!("Updated {}  {}", outcome.task.id, outcome.task.title);
        }
        Command::Done { id } => {
            let outcome = ctrl.toggle_complete(&id).await?;
            print_warnings(&outcome.warnings);
            let state = if outcome.task.completed {
                "Completed"
            } else {
                "Reopened"
            };
            println!("{}: {}", state, outcome.task.title);
            if let Some(next) = outcome.spawned {
                let due = next
                    .format_deadline_short()
                    .unwrap_or_else(|| "no deadline".to_string());
                println!("Next occurrence {} due {}", next.id, due);
            }
        }
        Command::Remove { id } => {
            print_warnings(&ctrl.delete_task(&id).await?);
            println!("Deleted {}", id);
        }
        Command::Move {
            id,
            direction,
            list,
        } => {
            if !ctrl.move_task(list.as_deref(), &id, direction).await? {
                println!("Already at the edge.");
            }
        }
        Command::Sub(sub) => match sub {
            SubCommand::Add { task_id, title } => {
                let s = ctrl.add_subtask(&task_id, &title).await?;
                let progress: SubtaskProgress = ctrl.subtask_progress(&task_id).await?;
                println!(
                    "Added {}  {} ({}/{})",
                    s.id, s.title, progress.done, progress.total
                );
            }
            SubCommand::Done { id } => {
                let s = ctrl.set_subtask_completed(&id, true).await?;
                println!("[✔] {}", s.title);
            }
            SubCommand::Undo { id } => {
                let s = ctrl.set_subtask_completed(&id, false).await?;
                println!("[ ] {}", s.title);
            }
            SubCommand::Remove { id } => {
                ctrl.delete_subtask(&id).await?;
                println!("Deleted subtask {}", id);
            }
        },
        Command::Tags => {
            for tag in ctrl.tags().await? {
                println!(
                    "{}  {}  {}",
                    tag.id,
                    tag.color,
                    color_utils::ansi_badge(&format!("#{}", tag.name), &tag.color)
                );
            }
        }
        Command::TagNew { name, color } => {
            let tag = ctrl.create_tag(&name, color.as_deref()).await?;
            println!("Created tag {}  #{} ({})", tag.id, tag.name, tag.color);
        }
        Command::TagSet { task_id, tag_ids } => {
            let task = ctrl.set_task_tags(&task_id, &tag_ids).await?;
            let names: Vec<String> = ctrl
                .tags_for(&task)
                .await?
                .into_iter()
                .map(|t| format!("#{}", t.name))
                .collect();
            println!("{}: {}", task.title, names.join(" "));
        }
        Command::Lists => {
            let me = ctrl.me().await?;
            let groups = ctrl.visible_lists().await?;
            let default_id = me.default_list_id.as_deref();
            print_lists("My lists", &groups.mine, default_id);
            print_lists("Shared with me", &groups.shared_with_me, default_id);
            if let Some(current) = ctrl.current_list().await? {
                println!();
                println!("Current list: {}", current.name);
            }
        }
        Command::List(cmd) => match cmd {
            ListCommand::New { name } => {
                let list = ctrl.create_list(&name).await?;
                println!("Created list {}  {}", list.id, list.name);
            }
            ListCommand::Rename { id, name } => {
                let list = ctrl.rename_list(&id, &name).await?;
                println!("Renamed to {}", list.name);
            }
            ListCommand::Share { id, email } => {
                let list = ctrl.share_list(&id, &email).await?;
                println!("{} is shared with {}", list.name, list.shared_with.join(", "));
            }
            ListCommand::Unshare { id, email } => {
                let list = ctrl.unshare_list(&id, &email).await?;
                println!("Removed {} from {}", email.trim(), list.name);
            }
            ListCommand::Remove { id } => {
                print_warnings(&ctrl.delete_list(&id).await?);
                println!("Deleted list {}", id);
            }
            ListCommand::Default { id } => match ctrl.toggle_default_list(&id).await? {
                Some(new_id) => println!("Default list set to {}", new_id),
                None => println!("Default list cleared"),
            },
        },
        Command::CalendarStatus => {
            if !ctrl.calendar_enabled() {
                println!("Calendar sync is disabled. Set [calendar] enabled and access_token in the config.");
                return Ok(());
            }
            let status = ctrl.calendar_status().await;
            if status.connected {
                println!(
                    "Connected: {} ({})",
                    status.calendar_name.unwrap_or_default(),
                    status.email.unwrap_or_default()
                );
            } else {
                println!("Not connected.");
            }
        }
        Command::CalendarSync { id, action } => {
            println!("{:?}", ctrl.sync_task_after_save(&id, action).await?);
        }
        Command::Config => {
            println!("Config file: {}", Config::get_path_string(ctx.as_ref())?);
            println!("Data dir:    {}", ctx.get_data_dir()?.display());
            println!("Log file:    {}", ctx.get_log_file_path()?.display());
            if config.is_local() {
                println!("Mode:        local ({})", config.user_email);
            } else {
                println!("Mode:        remote ({})", config.url);
            }
            println!("Sort mode:   {}", config.sort_mode);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();
    let Invocation {
        root,
        verbose,
        command,
    } = cli::parse_args(&args)?;

    if command == Command::Help {
        cli::print_help("bigrocks");
        return Ok(());
    }

    let ctx: SharedContext = Arc::new(StandardContext::new(root));
    let config = Config::load_or_default(ctx.as_ref())?;
    init_logging(ctx.as_ref(), &config, verbose)?;
    log::debug!("Running {:?}", command);

    let calendar = CalendarClient::from_config(&config.calendar)?;
    if config.is_local() {
        let store = LocalStore::new(ctx.clone(), &config.user_email);
        let ctrl = TaskController::new(store, calendar)
            .with_rules(config.escalation)
            .with_sort_mode(config.sort_mode);
        run(ctrl, command, &config, &ctx).await
    } else {
        let store = RemoteStore::new(&config.url, &config.token)?;
        let ctrl = TaskController::new(store, calendar)
            .with_rules(config.escalation)
            .with_sort_mode(config.sort_mode);
        run(ctrl, command, &config, &ctx).await
    }
}
