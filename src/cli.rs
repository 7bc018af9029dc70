//! Interactive console and table printing

use crate::actions::{ActionId, Modus};
use crate::error::MapperError;
use crate::mapping::{MappedAction, MappingStore};
use crate::queue::{animations_in_folder, AnimationQueue};
use crate::router::LearnTarget;
use anyhow::{anyhow, bail, Context, Result};
use colored::*;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::Path;
use tokio::sync::mpsc;
use tracing::debug;

/// Queue operations shared by the console and the `queue` subcommand
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueCommand {
    List,
    Add(Vec<String>),
    /// Every animation under a content folder, recursively
    AddFolder(String),
    Remove(usize),
    Clear,
    Next,
    Prune,
}

/// One parsed console line, applied by the main loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Learn(LearnTarget),
    Cancel,
    Unbind { device: String, control_id: i32 },
    Mappings(Option<String>),
    Queue(QueueCommand),
    Next,
    Bake,
    Rig(String),
    Mesh(String),
    Output(String),
    Status,
    Help,
    Quit,
}

const HELP: &[(&str, &str)] = &[
    ("learn <row> <action> [target] [modus]", "bind the next control to an action"),
    ("cancel", "leave learn mode"),
    ("unbind <device> <id>", "remove a mapping"),
    ("mappings [device]", "list mappings"),
    ("queue list|add <path>..|remove <i>|clear|prune", "edit the animation queue"),
    ("queue add-folder <folder>", "queue every animation under a folder"),
    ("next", "load the next queued animation"),
    ("bake", "bake the current animation"),
    ("rig <name>", "select the control rig"),
    ("mesh <path>", "select the skeletal mesh"),
    ("output <folder>", "set the output folder"),
    ("status", "show session state"),
    ("quit", "exit"),
];

fn parse_index(arg: Option<&str>, what: &str) -> Result<usize> {
    let arg = arg.ok_or_else(|| anyhow!("missing {}", what))?;
    arg.parse()
        .with_context(|| format!("invalid {}: {}", what, arg))
}

/// Parse queue arguments (after the `queue` word)
pub fn parse_queue(args: &[&str]) -> Result<QueueCommand> {
    match args.first().copied().unwrap_or("list") {
        "list" | "ls" => Ok(QueueCommand::List),
        "add" => {
            let paths: Vec<String> = args[1..].iter().map(|s| s.to_string()).collect();
            if paths.is_empty() {
                bail!("queue add needs at least one asset path");
            }
            Ok(QueueCommand::Add(paths))
        }
        "add-folder" if args.len() > 1 => Ok(QueueCommand::AddFolder(args[1..].join(" "))),
        "add-folder" => bail!("queue add-folder needs a content folder"),
        "remove" | "rm" => Ok(QueueCommand::Remove(parse_index(args.get(1).copied(), "index")?)),
        "clear" => Ok(QueueCommand::Clear),
        "next" => Ok(QueueCommand::Next),
        "prune" => Ok(QueueCommand::Prune),
        other => bail!("unknown queue command: {}", other),
    }
}

/// Parse one console line; blank lines yield `None`
pub fn parse_line(line: &str) -> Result<Option<ConsoleCommand>> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let Some((&head, args)) = words.split_first() else {
        return Ok(None);
    };

    let rest = || args.join(" ");
    let command = match head.to_lowercase().as_str() {
        "learn" => {
            let row = parse_index(args.first().copied(), "row")?;
            let action: ActionId = args
                .get(1)
                .ok_or_else(|| anyhow!("missing action name"))?
                .parse()?;
            let target = args.get(2).copied().unwrap_or("");
            let modus = args.get(3).map(|m| Modus::parse_lenient(m)).unwrap_or_default();
            let mapped = if target.is_empty() {
                MappedAction::for_action(action)
            } else {
                MappedAction::new(action.name(), target, modus.as_str())
            };
            ConsoleCommand::Learn(LearnTarget::new(row, mapped))
        }
        "cancel" => ConsoleCommand::Cancel,
        "unbind" => {
            let [device, id] = args else {
                bail!("usage: unbind <device> <id>");
            };
            let control_id = id
                .parse()
                .with_context(|| format!("invalid control id: {}", id))?;
            ConsoleCommand::Unbind { device: device.to_string(), control_id }
        }
        "mappings" => ConsoleCommand::Mappings(args.first().map(|d| d.to_string())),
        "queue" | "q" => ConsoleCommand::Queue(parse_queue(args)?),
        "next" => ConsoleCommand::Next,
        "bake" => ConsoleCommand::Bake,
        "rig" if !args.is_empty() => ConsoleCommand::Rig(rest()),
        "mesh" if !args.is_empty() => ConsoleCommand::Mesh(rest()),
        "output" if !args.is_empty() => ConsoleCommand::Output(rest()),
        "rig" | "mesh" | "output" => bail!("{} needs an argument", head),
        "status" => ConsoleCommand::Status,
        "help" | "?" => ConsoleCommand::Help,
        "quit" | "exit" => ConsoleCommand::Quit,
        other => bail!("unknown command: {} (type 'help')", other),
    };
    Ok(Some(command))
}

/// Read console lines on a blocking thread and forward parsed commands
///
/// Runs on its own thread; Ctrl-D / Ctrl-C send `Quit`.
pub fn spawn_repl(tx: mpsc::Sender<ConsoleCommand>) -> Result<std::thread::JoinHandle<()>> {
    let handle = std::thread::Builder::new().name("console".into()).spawn(move || {
        let mut rl = match DefaultEditor::new() {
            Ok(rl) => rl,
            Err(e) => {
                eprintln!("{} {}", "Console unavailable:".red(), e);
                return;
            }
        };

        loop {
            match rl.readline("toucan> ") {
                Ok(line) => {
                    let _ = rl.add_history_entry(line.as_str());
                    match parse_line(&line) {
                        Ok(Some(ConsoleCommand::Help)) => print_help(),
                        Ok(Some(command)) => {
                            let quit = command == ConsoleCommand::Quit;
                            if tx.blocking_send(command).is_err() || quit {
                                break;
                            }
                        }
                        Ok(None) => {}
                        Err(e) => println!("{} {:#}", "✗".red(), e),
                    }
                }
                Err(ReadlineError::Interrupted | ReadlineError::Eof) => {
                    let _ = tx.blocking_send(ConsoleCommand::Quit);
                    break;
                }
                Err(e) => {
                    debug!("Console read error: {}", e);
                    break;
                }
            }
        }
    })?;
    Ok(handle)
}

pub fn print_help() {
    println!("\n{}", "Commands:".bold());
    for (usage, description) in HELP {
        println!("  {:<48} {}", usage.cyan(), description);
    }
}

/// Print the typed action catalog
pub fn print_actions() {
    println!("\n{}", "=== Actions ===".bold().cyan());
    println!("  {:<26} {:<32} {}", "Name".bold(), "Label".bold(), "Kind".bold());
    for action in ActionId::all() {
        println!(
            "  {:<26} {:<32} {}",
            action.name().green(),
            action.label(),
            action.kind().to_string().yellow()
        );
    }
}

/// Print mappings of every active device, or of one device
pub fn print_mappings(store: &MappingStore, device: Option<&str>) {
    let devices = match device {
        Some(d) => vec![d.to_string()],
        None => store.devices(),
    };
    if devices.is_empty() {
        println!("{}", "No active devices".yellow());
        return;
    }

    for device in devices {
        let rig = store.rig_for(&device).unwrap_or("");
        println!("\n{} {}", device.bold().cyan(), format!("(rig: {})", rig).dimmed());
        match store.mappings(&device) {
            Some(controls) if !controls.is_empty() => {
                for (id, mapped) in controls {
                    let target = if mapped.target_control.is_empty() {
                        String::new()
                    } else {
                        format!(" → {} [{}]", mapped.target_control, mapped.modus())
                    };
                    println!(
                        "  {:>5}  {}{}",
                        id.to_string().yellow(),
                        mapped.action_name.green(),
                        target
                    );
                }
            }
            _ => println!("  {}", "no mappings".dimmed()),
        }
    }
}

/// Print queue entries, marking the cursor and processed assets
pub fn print_queue(queue: &AnimationQueue) {
    if queue.is_empty() {
        println!("{}", "Queue is empty".yellow());
        return;
    }
    for (i, anim) in queue.items().iter().enumerate() {
        let cursor = if queue.current_index() == Some(i) { "▶".green() } else { " ".normal() };
        let done = if queue.is_processed(&anim.path) { "✓".green() } else { " ".normal() };
        println!(
            "{} {} {:>3}  {:<24} {}",
            cursor,
            done,
            i,
            anim.display_name.bold(),
            anim.path.dimmed()
        );
    }
}

/// Apply a queue command; folders resolve against `content_root`
pub fn apply_queue(queue: &mut AnimationQueue, command: &QueueCommand, content_root: &Path) {
    match command {
        QueueCommand::List => {}
        QueueCommand::Add(paths) => {
            for path in paths {
                if !queue.add(path) {
                    println!("{} already queued: {}", "•".yellow(), path);
                }
            }
        }
        QueueCommand::AddFolder(folder) => match animations_in_folder(content_root, folder) {
            Ok(paths) => {
                let added = paths.iter().filter(|path| queue.add(path)).count();
                println!("Queued {} of {} animation(s) from {}", added, paths.len(), folder);
            }
            Err(e) => println!("{} {}", "✗".red(), e),
        },
        QueueCommand::Remove(index) => {
            let len = queue.len();
            if !queue.remove_at(*index) {
                println!("{} {}", "✗".red(), MapperError::IndexOutOfRange { index: *index, len });
            }
        }
        QueueCommand::Clear => queue.clear(),
        QueueCommand::Next => {
            queue.next();
        }
        QueueCommand::Prune => {
            let removed = queue.remove_processed();
            let noun = if removed == 1 { "entry" } else { "entries" };
            println!("Removed {} processed {}", removed, noun);
        }
    }
    print_queue(queue);
}
