// File: ./src/cli.rs
//! Command-line parsing and help text for the `bigrocks` binary.
use crate::client::calendar::SyncAction;
use crate::model::parser::{parse_deadline, parse_rating};
use crate::model::{MoveDirection, Recurrence, TaskDraft};
use anyhow::{Result, anyhow, bail};
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::str::FromStr;

/// Field overrides collected from `add`/`edit` flags.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskOptions {
    pub title: Option<String>,
    pub urgency: Option<u8>,
    pub importance: Option<u8>,
    /// `Some(None)` clears the deadline.
    pub deadline: Option<Option<DateTime<Utc>>>,
    pub notes: Option<String>,
    pub recurrence: Option<Recurrence>,
    pub list: Option<String>,
    pub tags: Option<Vec<String>>,
    pub calendar: Option<bool>,
}

impl TaskOptions {
    pub fn apply(&self, draft: &mut TaskDraft) {
        if let Some(title) = &self.title {
            draft.title = title.clone();
        }
        if let Some(u) = self.urgency {
            draft.urgency = u;
        }
        if let Some(i) = self.importance {
            draft.importance = i;
        }
        if let Some(d) = self.deadline {
            draft.deadline = d;
        }
        if let Some(n) = &self.notes {
            draft.notes = n.clone();
        }
        if let Some(r) = self.recurrence {
            draft.recurrence = r;
        }
        if let Some(l) = &self.list {
            draft.list_id = Some(l.clone());
        }
        if let Some(t) = &self.tags {
            draft.tag_ids = t.clone();
        }
        if let Some(c) = self.calendar {
            draft.sync_to_calendar = c;
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubCommand {
    Add { task_id: String, title: String },
    Done { id: String },
    Undo { id: String },
    Remove { id: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListCommand {
    New { name: String },
    Rename { id: String, name: String },
    Share { id: String, email: String },
    Unshare { id: String, email: String },
    Remove { id: String },
    Default { id: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    /// Task overview of the current list. `all` shows every list and includes
    /// completed tasks regardless of config.
    Tasks { list: Option<String>, all: bool },
    Completed { list: Option<String> },
    Show { id: String },
    Add { title: String, options: TaskOptions },
    Edit { id: String, options: TaskOptions },
    Done { id: String },
    Remove { id: String },
    Move {
        id: String,
        direction: MoveDirection,
        list: Option<String>,
    },
    Sub(SubCommand),
    Tags,
    TagNew { name: String, color: Option<String> },
    TagSet { task_id: String, tag_ids: Vec<String> },
    Lists,
    List(ListCommand),
    CalendarStatus,
    CalendarSync { id: String, action: SyncAction },
    Config,
}

/// Global flags plus the command.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub root: Option<PathBuf>,
    pub verbose: bool,
    pub command: Command,
}

fn take_value(args: &[String], i: &mut usize, flag: &str) -> Result<String> {
    *i += 1;
    args.get(*i)
        .cloned()
        .ok_or_else(|| anyhow!("Missing value for {}", flag))
}

fn positional(args: &[String], idx: usize, what: &str) -> Result<String> {
    args.get(idx)
        .cloned()
        .ok_or_else(|| anyhow!("Missing {}", what))
}

fn parse_rating_flag(value: &str, flag: &str) -> Result<u8> {
    parse_rating(value).ok_or_else(|| anyhow!("{} must be a number from 1 to 5 (got '{}')", flag, value))
}

/// Parses task flags; words that are not flags are returned as the free text.
fn parse_task_options(args: &[String]) -> Result<(Vec<String>, TaskOptions)> {
    let mut words = Vec::new();
    let mut opts = TaskOptions::default();
    let mut i = 0;
    while i < args.len() {
        let arg = args[i].as_str();
        match arg {
            "--title" => opts.title = Some(take_value(args, &mut i, arg)?),
            "-u" | "--urgency" => {
                opts.urgency = Some(parse_rating_flag(&take_value(args, &mut i, arg)?, "Urgency")?)
            }
            "-i" | "--importance" => {
                opts.importance =
                    Some(parse_rating_flag(&take_value(args, &mut i, arg)?, "Importance")?)
            }
            "-d" | "--due" => {
                let value = take_value(args, &mut i, arg)?;
                opts.deadline = if value.eq_ignore_ascii_case("none") {
                    Some(None)
                } else {
                    let due = parse_deadline(&value).ok_or_else(|| {
                        anyhow!(
                            "Could not understand deadline '{}' (try 2026-05-01, 'tomorrow 9am' or 'today 14:30')",
                            value
                        )
                    })?;
                    Some(Some(due))
                };
            }
            "-n" | "--notes" => opts.notes = Some(take_value(args, &mut i, arg)?),
            "-r" | "--repeat" => {
                let value = take_value(args, &mut i, arg)?;
                let rec = Recurrence::from_str(&value).map_err(|_| {
                    anyhow!("Unknown recurrence '{}' (none, daily, weekly, monthly, yearly)", value)
                })?;
                opts.recurrence = Some(rec);
            }
            "-l" | "--list" => opts.list = Some(take_value(args, &mut i, arg)?),
            "-t" | "--tags" => {
                let value = take_value(args, &mut i, arg)?;
                opts.tags = Some(split_ids(&value));
            }
            "--cal" => opts.calendar = Some(true),
            "--no-cal" => opts.calendar = Some(false),
            other if other.starts_with('-') && other.len() > 1 => {
                bail!("Unknown option '{}'", other)
            }
            other => words.push(other.to_string()),
        }
        i += 1;
    }
    Ok((words, opts))
}

fn split_ids(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// `[--list <id>] [--all]` style flags of the read-only commands.
fn parse_view_flags(args: &[String]) -> Result<(Option<String>, bool)> {
    let mut list = None;
    let mut all = false;
    let mut i = 0;
    while i < args.len() {
        let arg = args[i].as_str();
        match arg {
            "-l" | "--list" => list = Some(take_value(args, &mut i, arg)?),
            "-a" | "--all" => all = true,
            other => bail!("Unexpected argument '{}'", other),
        }
        i += 1;
    }
    Ok((list, all))
}

fn parse_list_command(args: &[String]) -> Result<Option<ListCommand>> {
    let Some(sub) = args.first() else {
        return Ok(None);
    };
    let cmd = match sub.as_str() {
        "new" => ListCommand::New {
            name: args[1..].join(" "),
        },
        "rename" => ListCommand::Rename {
            id: positional(args, 1, "list id")?,
            name: args.get(2..).map(|w| w.join(" ")).unwrap_or_default(),
        },
        "share" => ListCommand::Share {
            id: positional(args, 1, "list id")?,
            email: positional(args, 2, "email")?,
        },
        "unshare" => ListCommand::Unshare {
            id: positional(args, 1, "list id")?,
            email: positional(args, 2, "email")?,
        },
        "rm" | "delete" => ListCommand::Remove {
            id: positional(args, 1, "list id")?,
        },
        "default" => ListCommand::Default {
            id: positional(args, 1, "list id")?,
        },
        _ => return Ok(None),
    };
    Ok(Some(cmd))
}

fn parse_command(args: &[String]) -> Result<Command> {
    let Some(name) = args.first() else {
        return Ok(Command::Tasks {
            list: None,
            all: false,
        });
    };
    let rest = &args[1..];

    let command = match name.as_str() {
        "help" | "-h" | "--help" => Command::Help,
        "list" | "ls" => match parse_list_command(rest)? {
            Some(cmd) => Command::List(cmd),
            None => {
                let (list, all) = parse_view_flags(rest)?;
                Command::Tasks { list, all }
            }
        },
        "completed" => {
            let (list, _) = parse_view_flags(rest)?;
            Command::Completed { list }
        }
        "show" => Command::Show {
            id: positional(rest, 0, "task id")?,
        },
        "add" => {
            let (words, options) = parse_task_options(rest)?;
            let title = words.join(" ");
            if title.trim().is_empty() {
                bail!("Usage: bigrocks add <title> [options]");
            }
            Command::Add { title, options }
        }
        "edit" => {
            let id = positional(rest, 0, "task id")?;
            let (words, options) = parse_task_options(&rest[1..])?;
            if let Some(extra) = words.first() {
                bail!("Unexpected argument '{}' (use --title to rename)", extra);
            }
            Command::Edit { id, options }
        }
        "done" | "toggle" => Command::Done {
            id: positional(rest, 0, "task id")?,
        },
        "rm" | "delete" => Command::Remove {
            id: positional(rest, 0, "task id")?,
        },
        "up" | "down" => {
            let direction = if name == "up" {
                MoveDirection::Up
            } else {
                MoveDirection::Down
            };
            let id = positional(rest, 0, "task id")?;
            let (list, _) = parse_view_flags(&rest[1..])?;
            Command::Move {
                id,
                direction,
                list,
            }
        }
        "sub" => {
            let action = positional(rest, 0, "subtask action (add, done, undo, rm)")?;
            let sub = match action.as_str() {
                "add" => SubCommand::Add {
                    task_id: positional(rest, 1, "task id")?,
                    title: rest.get(2..).map(|w| w.join(" ")).unwrap_or_default(),
                },
                "done" => SubCommand::Done {
                    id: positional(rest, 1, "subtask id")?,
                },
                "undo" => SubCommand::Undo {
                    id: positional(rest, 1, "subtask id")?,
                },
                "rm" | "delete" => SubCommand::Remove {
                    id: positional(rest, 1, "subtask id")?,
                },
                other => bail!("Unknown subtask action '{}'", other),
            };
            Command::Sub(sub)
        }
        "tags" => Command::Tags,
        "tag" => {
            let action = positional(rest, 0, "tag action (new, set)")?;
            match action.as_str() {
                "new" => {
                    let mut words = Vec::new();
                    let mut color = None;
                    let mut i = 1;
                    while i < rest.len() {
                        match rest[i].as_str() {
                            "-c" | "--color" => color = Some(take_value(rest, &mut i, "--color")?),
                            w => words.push(w.to_string()),
                        }
                        i += 1;
                    }
                    Command::TagNew {
                        name: words.join(" "),
                        color,
                    }
                }
                "set" => Command::TagSet {
                    task_id: positional(rest, 1, "task id")?,
                    tag_ids: rest.get(2).map(|v| split_ids(v)).unwrap_or_default(),
                },
                other => bail!("Unknown tag action '{}'", other),
            }
        }
        "lists" => Command::Lists,
        "calendar" | "cal" => match rest.first().map(String::as_str) {
            Some("status") | None => Command::CalendarStatus,
            Some("sync") => {
                let id = positional(rest, 1, "task id")?;
                let action = match rest.get(2) {
                    Some(a) => SyncAction::from_str(a)
                        .map_err(|_| anyhow!("Unknown sync action '{}'", a))?,
                    None => SyncAction::Update,
                };
                Command::CalendarSync { id, action }
            }
            Some(other) => bail!("Unknown calendar action '{}'", other),
        },
        "config" => Command::Config,
        other => bail!("Unknown command '{}'. Run 'bigrocks help' for usage.", other),
    };
    Ok(command)
}

/// Parses the arguments after the binary name.
pub fn parse_args(args: &[String]) -> Result<Invocation> {
    let mut root = None;
    let mut verbose = false;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "-r" | "--root" if root.is_none() => {
                root = Some(PathBuf::from(take_value(args, &mut i, "--root")?));
            }
            "-v" | "--verbose" => verbose = true,
            _ => break,
        }
        i += 1;
    }
    let command = parse_command(&args[i..])?;
    Ok(Invocation {
        root,
        verbose,
        command,
    })
}

pub fn print_help(binary_name: &str) {
    println!(
        "Big Rocks v{} - put the big rocks in first (urgency x importance task manager)",
        env!("CARGO_PKG_VERSION")
    );
    println!();
    println!("USAGE:");
    println!("    {} [--root <path>] [--verbose] <command>", binary_name);
    println!();
    println!("OPTIONS:");
    println!("    -r, --root <path>     Use a different directory for config and data.");
    println!("    -v, --verbose         Log to the terminal instead of the log file.");
    println!("    -h, --help            Show this help message.");
    println!();
    println!("TASKS:");
    println!("    list [--list <id>] [--all]         Prioritized tasks of the current list (default command)");
    println!("                                       --all: every list, completed included");
    println!("    completed [--list <id>]            Completed tasks, newest first");
    println!("    show <id>                          Task details, tags and checklist");
    println!("    add <title> [task options]         Create a task");
    println!("    edit <id> [task options]           Change a task");
    println!("    done <id>                          Toggle completion");
    println!("    rm <id>                            Delete a task and its checklist");
    println!("    up|down <id> [--list <id>]         Reorder (manual sort mode only)");
    println!();
    println!("TASK OPTIONS:");
    println!("    -u, --urgency <1-5>       How soon it needs attention");
    println!("    -i, --importance <1-5>    How much it matters");
    println!("    -d, --due <when>          2026-05-01, today, tomorrow, with optional time");
    println!("                              ('tomorrow 9am', '2026-05-01 14:30'); 'none' clears");
    println!("    -r, --repeat <rule>       none, daily, weekly, monthly, yearly");
    println!("    -n, --notes <text>        Free-form notes");
    println!("    -l, --list <id>           Target list (add only)");
    println!("    -t, --tags <id,id>        Tag ids");
    println!("    --cal | --no-cal          Mirror to the calendar (needs a deadline)");
    println!("    --title <text>            New title (edit only)");
    println!();
    println!("CHECKLISTS:");
    println!("    sub add <task-id> <title>");
    println!("    sub done|undo|rm <subtask-id>");
    println!();
    println!("TAGS:");
    println!("    tags                               Your tags");
    println!("    tag new <name> [--color #RRGGBB]   Create a tag (random color by default)");
    println!("    tag set <task-id> <id,id,...>      Replace the tags of a task");
    println!();
    println!("LISTS:");
    println!("    lists                              Your lists and lists shared with you");
    println!("    list new <name>");
    println!("    list rename <id> <name>");
    println!("    list share|unshare <id> <email>");
    println!("    list default <id>                  Set or clear your default list");
    println!("    list rm <id>                       Delete a list and all its tasks");
    println!();
    println!("CALENDAR:");
    println!("    calendar status                    Check the calendar connection");
    println!("    calendar sync <id> [create|update|delete]");
    println!();
    println!("    config                             Show the config file location");
}
