//! # keynav
//!
//! Command-line companion for keynav settings: feed key sequences through a
//! mode's chord mapper, validate a settings file, list bindable commands.

#![deny(unsafe_code)]

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use keynav_chord::{DroppedBinding, Keymaps, parse_sequence};
use keynav_coordinator::CommandRegistry;
use keynav_core::Mode;
use keynav_core::logging::init_subscriber;
use keynav_frame::FRAME_COMMANDS;
use keynav_settings::{KeynavSettings, SettingsWatcher, load_settings_from_path, settings_path};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Inspect and validate keynav key bindings.
#[derive(Parser, Debug)]
#[command(name = "keynav", about = "Inspect and validate keynav key bindings")]
struct Cli {
    /// Settings file (defaults to `~/.keynav/settings.json`).
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Feed key sequences through one mode's chord mapper.
    Resolve {
        /// Mode whose bindings apply.
        #[arg(long, default_value = "default")]
        mode: Mode,

        /// Key sequences in settings notation, e.g. `gg` or `<C-f>`.
        #[arg(required = true)]
        keys: Vec<String>,
    },
    /// Validate the settings file and list bindings that would be dropped.
    Check {
        /// Keep running and check again whenever the file changes.
        #[arg(long)]
        watch: bool,
    },
    /// List every command a binding may name.
    Commands,
}

/// Where a command runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Scope {
    Frame,
    Coordinator,
}

impl Scope {
    fn as_str(self) -> &'static str {
        match self {
            Self::Frame => "frame",
            Self::Coordinator => "coordinator",
        }
    }
}

/// Every bindable command name with where it runs, sorted by name.
fn command_table() -> Vec<(String, Scope)> {
    let mut table: Vec<(String, Scope)> = FRAME_COMMANDS
        .iter()
        .map(|c| ((*c).to_string(), Scope::Frame))
        .chain(
            CommandRegistry::with_builtins()
                .names()
                .into_iter()
                .map(|c| (c, Scope::Coordinator)),
        )
        .collect();
    table.sort();
    table
}

fn known_commands() -> HashSet<String> {
    command_table().into_iter().map(|(name, _)| name).collect()
}

/// One token fed to the mapper and what came out.
#[derive(Clone, Debug, PartialEq, Eq)]
struct Step {
    token: String,
    consumed: bool,
    commands: Vec<String>,
}

/// Feed every token of `sequences` through `mode`'s mapper. Returns the
/// steps and the tokens still pending at the end.
fn resolve(keymaps: &Keymaps, mode: Mode, sequences: &[String]) -> Result<(Vec<Step>, Vec<String>)> {
    let mut mapper = keymaps.mapper(mode);
    let mut steps = Vec::new();
    for sequence in sequences {
        let tokens = parse_sequence(sequence).with_context(|| format!("bad key sequence '{sequence}'"))?;
        for token in tokens {
            let outcome = mapper.feed(&token);
            steps.push(Step {
                commands: outcome.commands().map(ToString::to_string).collect(),
                consumed: outcome.consumed,
                token,
            });
        }
    }
    Ok((steps, mapper.pending().to_vec()))
}

fn check(settings: &KeynavSettings) -> Vec<DroppedBinding> {
    Keymaps::build(&settings.keymaps, &known_commands()).1
}

fn report(dropped: &[DroppedBinding]) {
    if dropped.is_empty() {
        println!("all bindings ok");
        return;
    }
    for d in dropped {
        println!("{}\t{}\t{}\t{}", d.mode, d.sequence, d.command, d.reason);
    }
}

fn load(path: &Path) -> Result<KeynavSettings> {
    load_settings_from_path(path).with_context(|| format!("failed to load {}", path.display()))
}

async fn watch(path: PathBuf) -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let _watcher = SettingsWatcher::spawn(&path, move |settings| {
        let _ = tx.send(settings);
    })
    .with_context(|| format!("failed to watch {}", path.display()))?;
    info!(path = %path.display(), "watching settings");

    loop {
        tokio::select! {
            Some(settings) = rx.recv() => report(&check(&settings)),
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    warn!(error = %e, "ctrl-c handler failed");
                }
                return Ok(());
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    let path = args.settings.unwrap_or_else(settings_path);
    let settings = load(&path)?;
    init_subscriber(&settings.logging.level, settings.logging.format);

    match args.command {
        Command::Resolve { mode, keys } => {
            let (keymaps, dropped) = Keymaps::build(&settings.keymaps, &known_commands());
            if !dropped.is_empty() {
                warn!(count = dropped.len(), "some bindings were dropped, run `keynav check`");
            }
            let (steps, pending) = resolve(&keymaps, mode, &keys)?;
            for step in steps {
                let marker = if step.consumed { "consumed" } else { "passed" };
                println!("{}\t{marker}\t{}", step.token, step.commands.join(" "));
            }
            if !pending.is_empty() {
                println!("pending\t{}", pending.concat());
            }
        }
        Command::Check { watch: true } => {
            report(&check(&settings));
            watch(path).await?;
        }
        Command::Check { watch: false } => {
            let dropped = check(&settings);
            report(&dropped);
            if !dropped.is_empty() {
                bail!("{} binding(s) dropped from {}", dropped.len(), path.display());
            }
        }
        Command::Commands => {
            for (name, scope) in command_table() {
                println!("{name}\t{}", scope.as_str());
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_keymaps() -> Keymaps {
        let (keymaps, dropped) = Keymaps::build(&KeynavSettings::default().keymaps, &known_commands());
        assert!(dropped.is_empty(), "{dropped:?}");
        keymaps
    }

    #[test]
    fn cli_parses() {
        let cli = Cli::parse_from(["keynav", "resolve", "--mode", "hint", "<Tab>", "<CR>"]);
        match cli.command {
            Command::Resolve { mode, keys } => {
                assert_eq!(mode, Mode::Hint);
                assert_eq!(keys, vec!["<Tab>", "<CR>"]);
            }
            other => panic!("unexpected {other:?}"),
        }
        let cli = Cli::parse_from(["keynav", "check", "--watch", "--settings", "/tmp/s.json"]);
        assert_eq!(cli.settings, Some(PathBuf::from("/tmp/s.json")));
        assert!(matches!(cli.command, Command::Check { watch: true }));
    }

    #[test]
    fn command_table_covers_both_scopes() {
        let table = command_table();
        assert!(table.contains(&("scrollDown".to_string(), Scope::Frame)));
        assert!(table.contains(&("enterHintMode".to_string(), Scope::Coordinator)));
        let names: Vec<&str> = table.iter().map(|(n, _)| n.as_str()).collect();
        let mut sorted = names.clone();
        sorted.sort_unstable();
        assert_eq!(names, sorted);
    }

    #[test]
    fn resolve_reports_each_token() {
        let keymaps = default_keymaps();
        let (steps, pending) = resolve(&keymaps, Mode::Default, &["gg".to_string(), "q".to_string()]).unwrap();
        assert_eq!(steps.len(), 3);
        assert!(steps[0].consumed && steps[0].commands.is_empty());
        assert_eq!(steps[1].commands, vec!["scrollTop"]);
        assert!(!steps[2].consumed);
        assert!(pending.is_empty());
    }

    #[test]
    fn resolve_leaves_prefix_pending() {
        let keymaps = default_keymaps();
        let (_, pending) = resolve(&keymaps, Mode::Default, &["g".to_string()]).unwrap();
        assert_eq!(pending, vec!["g"]);
    }

    #[test]
    fn resolve_rejects_bad_sequence() {
        let keymaps = default_keymaps();
        assert!(resolve(&keymaps, Mode::Default, &["<C-".to_string()]).is_err());
    }

    #[test]
    fn check_finds_unknown_commands() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"keymaps": {"default": {"zz": "teleport", "j": "scrollDown"}}}"#,
        )
        .unwrap();
        let settings = load(&path).unwrap();
        let dropped = check(&settings);
        assert_eq!(dropped.len(), 1);
        assert_eq!(dropped[0].command, "teleport");
        assert_eq!(dropped[0].mode, Mode::Default);
    }

    #[test]
    fn missing_file_means_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load(&dir.path().join("absent.json")).unwrap();
        assert!(check(&settings).is_empty());
    }
}
