//! Operator command surface
//!
//! Parses chat or console lines into [`Command`]s and runs them against a
//! [`WhitelistManager`], returning the reply lines for the invoker.
//!
//! | Command | Aliases |
//! |---|---|
//! | `refresh-whitelist` | `whitelist refresh`, `tw refresh` |
//! | `whitelist add <identifier>` | `tw add <identifier>` |
//! | `whitelist status` | `tw status` |
//! | `whitelist reload` | `tw reload` |
//!
//! All commands require [`AuthLevel::Moderator`] or above.

use crate::error::{Error, Result};
use crate::manager::{AddOutcome, WhitelistManager};
use crate::traits::{IdKind, Plugin};
use std::sync::Arc;
use tracing::info;

const USAGE: &str =
    "Usage: refresh-whitelist | whitelist add <identifier> | whitelist status | whitelist reload";

/// Privilege of whoever issued a command
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AuthLevel {
    User,
    Moderator,
    Admin,
}

/// Whoever issued a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invoker {
    pub name: String,
    pub level: AuthLevel,
}

impl Invoker {
    pub fn new(name: impl Into<String>, level: AuthLevel) -> Self {
        Self {
            name: name.into(),
            level,
        }
    }
}

/// A parsed operator command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run a pass now
    Refresh,
    /// Add a player to the manual whitelist
    Add(String),
    /// Show manager status
    Status,
    /// Re-read the configuration from its store
    Reload,
}

impl Command {
    /// Parse a command line
    ///
    /// A leading `/` is ignored; the identifier of `add` is everything after
    /// the keyword, so names with spaces survive.
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim();
        let line = line.strip_prefix('/').unwrap_or(line);

        let mut words = line.split_whitespace();
        let head = words.next().map(str::to_ascii_lowercase);

        match head.as_deref() {
            Some("refresh-whitelist") if words.next().is_none() => Ok(Command::Refresh),
            Some("whitelist") | Some("tw") => {
                let sub = words.next().map(str::to_ascii_lowercase);
                match sub.as_deref() {
                    Some("refresh") => Ok(Command::Refresh),
                    Some("status") => Ok(Command::Status),
                    Some("reload") => Ok(Command::Reload),
                    Some("add") => {
                        let identifier = remainder_after(line, 2);
                        if identifier.is_empty() {
                            Err(Error::invalid_input("whitelist add needs an identifier"))
                        } else {
                            Ok(Command::Add(identifier.to_string()))
                        }
                    }
                    _ => Err(Error::invalid_input(USAGE)),
                }
            }
            _ => Err(Error::invalid_input(USAGE)),
        }
    }
}

/// Text after the first `n` whitespace separated words
fn remainder_after(line: &str, n: usize) -> &str {
    let mut rest = line.trim_start();
    for _ in 0..n {
        rest = match rest.find(char::is_whitespace) {
            Some(pos) => rest[pos..].trim_start(),
            None => "",
        };
    }
    rest.trim_end()
}

/// Runs commands against a manager
#[derive(Clone)]
pub struct CommandHandler {
    manager: Arc<WhitelistManager>,
}

impl CommandHandler {
    pub fn new(manager: Arc<WhitelistManager>) -> Self {
        Self { manager }
    }

    /// Parse and run a command line
    pub async fn handle_line(&self, invoker: &Invoker, line: &str) -> Result<Vec<String>> {
        let command = Command::parse(line)?;
        self.execute(invoker, command).await
    }

    /// Run a parsed command and return the reply lines
    pub async fn execute(&self, invoker: &Invoker, command: Command) -> Result<Vec<String>> {
        if invoker.level < AuthLevel::Moderator {
            return Err(Error::permission_denied(format!(
                "{} is not allowed to manage the whitelist",
                invoker.name
            )));
        }

        match command {
            Command::Refresh => {
                info!("{} requested a whitelist refresh", invoker.name);
                let report = self.manager.refresh().await;

                let mut reply = vec!["Refreshing whitelist ids...".to_string(), report.to_string()];
                reply.extend(
                    report
                        .failed_sources
                        .iter()
                        .map(|(_, error)| format!("  {}", error)),
                );
                Ok(reply)
            }
            Command::Add(identifier) => {
                let outcome = self.manager.add(&invoker.name, &identifier).await?;
                Ok(vec![add_reply(&outcome)])
            }
            Command::Status => Ok(vec![self.manager.status()]),
            Command::Reload => {
                info!("{} requested a whitelist config reload", invoker.name);
                self.manager.reload().await?;

                let mut reply = vec!["Reloaded whitelist config.".to_string()];
                reply.extend(self.manager.last_report().map(|report| report.to_string()));
                Ok(reply)
            }
        }
    }
}

fn add_reply(outcome: &AddOutcome) -> String {
    match outcome {
        AddOutcome::Resolved { user, added }
            if added.is_empty() && user.whitelist_ids().is_empty() =>
        {
            format!("{} has no steamid or slgid to whitelist.", user.name)
        }
        AddOutcome::Resolved { user, added } if added.is_empty() => {
            format!("{} is already whitelisted.", user.name)
        }
        AddOutcome::Resolved { user, .. } => format!("You have whitelisted {}.", user.name),
        AddOutcome::Unresolved { input, kind, .. } if *kind == IdKind::Username => format!(
            "There is no existing citizen with username, steamid, or slgid '{0}'. \
             Added '{0}' to the whitelist. If '{0}' is a username, this will not do anything.",
            input
        ),
        AddOutcome::Unresolved { input, .. } => format!(
            "There is no existing citizen with id '{0}'. Added '{0}' to the whitelist.",
            input
        ),
    }
}
