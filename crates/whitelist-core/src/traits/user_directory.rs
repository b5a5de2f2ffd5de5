// # User Directory Trait
//
// Resolves the loosely typed identifier an operator types into a known
// player. The input may be a display name, a SteamID64, an SLG id or an
// account id.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Kind of identifier an input was matched or classified as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdKind {
    /// SteamID64 (17 digits)
    SteamId,
    /// Strange Loop Games id (`slg` prefix)
    SlgId,
    /// Numeric account id
    AccountId,
    /// Display name
    Username,
}

impl IdKind {
    /// Guess the kind of a raw input from its shape
    pub fn classify(input: &str) -> Self {
        let input = input.trim();
        if input.get(..3).is_some_and(|p| p.eq_ignore_ascii_case("slg")) {
            IdKind::SlgId
        } else if !input.is_empty() && input.chars().all(|c| c.is_ascii_digit()) {
            if input.len() == 17 {
                IdKind::SteamId
            } else {
                IdKind::AccountId
            }
        } else {
            IdKind::Username
        }
    }
}

impl std::fmt::Display for IdKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            IdKind::SteamId => "steamid",
            IdKind::SlgId => "slgid",
            IdKind::AccountId => "account id",
            IdKind::Username => "username",
        };
        f.write_str(name)
    }
}

/// A player known to the directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryUser {
    /// Display name
    pub name: String,
    /// SteamID64, if linked
    #[serde(default)]
    pub steam_id: Option<String>,
    /// SLG id, if linked
    #[serde(default)]
    pub slg_id: Option<String>,
    /// Account id, if known
    #[serde(default)]
    pub account_id: Option<String>,
}

impl DirectoryUser {
    /// Create a user with only a display name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steam_id: None,
            slg_id: None,
            account_id: None,
        }
    }

    /// Set the SteamID64
    pub fn with_steam_id(mut self, id: impl Into<String>) -> Self {
        self.steam_id = Some(id.into());
        self
    }

    /// Set the SLG id
    pub fn with_slg_id(mut self, id: impl Into<String>) -> Self {
        self.slg_id = Some(id.into());
        self
    }

    /// Set the account id
    pub fn with_account_id(mut self, id: impl Into<String>) -> Self {
        self.account_id = Some(id.into());
        self
    }

    /// Ids the whitelist accepts for this user
    ///
    /// The server whitelist matches on SteamID64 and SLG id only; account
    /// ids and names are never whitelisted directly.
    pub fn whitelist_ids(&self) -> Vec<String> {
        [&self.steam_id, &self.slg_id]
            .into_iter()
            .flatten()
            .map(|id| id.trim())
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Outcome of a directory lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// The matched user, if any
    pub user: Option<DirectoryUser>,
    /// What the input matched, or what it looks like when nothing matched
    pub kind: IdKind,
}

impl Resolution {
    /// A successful match
    pub fn found(user: DirectoryUser, kind: IdKind) -> Self {
        Self {
            user: Some(user),
            kind,
        }
    }

    /// No match; `kind` is classified from the input
    pub fn not_found(input: &str) -> Self {
        Self {
            user: None,
            kind: IdKind::classify(input),
        }
    }
}

/// Trait for user directory implementations
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Resolve a name or id to a known user
    ///
    /// A miss is `Ok` with `user: None`; `Err` is reserved for lookup
    /// failures.
    async fn resolve(&self, input: &str) -> Result<Resolution, crate::Error>;
}
