// # Static User Directory
//
// In-memory UserDirectory over a fixed list of users, optionally loaded
// from a JSON array:
//
// ```json
// [
//   { "name": "alice", "steam_id": "76561198000000000", "slg_id": "slgAlice" }
// ]
// ```

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Error;
use crate::traits::{DirectoryUser, IdKind, Resolution, UserDirectory};

/// User directory backed by an in-memory list
#[derive(Debug, Clone, Default)]
pub struct StaticUserDirectory {
    users: Arc<RwLock<Vec<DirectoryUser>>>,
}

impl StaticUserDirectory {
    /// Create an empty directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a directory with the given users
    pub fn with_users(users: Vec<DirectoryUser>) -> Self {
        Self {
            users: Arc::new(RwLock::new(users)),
        }
    }

    /// Load users from a JSON file
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            Error::directory(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let users: Vec<DirectoryUser> = serde_json::from_str(&content).map_err(|e| {
            Error::directory(format!("Failed to parse {}: {}", path.display(), e))
        })?;

        tracing::debug!("Loaded {} directory users from {}", users.len(), path.display());
        Ok(Self::with_users(users))
    }

    /// Add or replace a user (matched by name)
    pub async fn upsert(&self, user: DirectoryUser) {
        let mut users = self.users.write().await;
        match users.iter_mut().find(|u| u.name.eq_ignore_ascii_case(&user.name)) {
            Some(existing) => *existing = user,
            None => users.push(user),
        }
    }
}

fn matches(id: &Option<String>, input: &str) -> bool {
    id.as_deref().is_some_and(|id| id == input)
}

#[async_trait]
impl UserDirectory for StaticUserDirectory {
    async fn resolve(&self, input: &str) -> Result<Resolution, Error> {
        let input = input.trim();
        let users = self.users.read().await;

        // Ids are exact; names are matched case-insensitively
        for user in users.iter() {
            if matches(&user.account_id, input) {
                return Ok(Resolution::found(user.clone(), IdKind::AccountId));
            }
            if matches(&user.steam_id, input) {
                return Ok(Resolution::found(user.clone(), IdKind::SteamId));
            }
            if matches(&user.slg_id, input) {
                return Ok(Resolution::found(user.clone(), IdKind::SlgId));
            }
        }

        if let Some(user) = users.iter().find(|u| u.name.eq_ignore_ascii_case(input)) {
            return Ok(Resolution::found(user.clone(), IdKind::Username));
        }

        Ok(Resolution::not_found(input))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory() -> StaticUserDirectory {
        StaticUserDirectory::with_users(vec![
            DirectoryUser::new("Alice")
                .with_steam_id("76561198000000001")
                .with_slg_id("slgAlice")
                .with_account_id("1001"),
            DirectoryUser::new("bob").with_slg_id("slgBob"),
        ])
    }

    #[tokio::test]
    async fn test_resolve_by_each_kind() {
        let dir = directory();

        let r = dir.resolve("alice").await.unwrap();
        assert_eq!(r.kind, IdKind::Username);
        assert_eq!(r.user.unwrap().name, "Alice");

        let r = dir.resolve("76561198000000001").await.unwrap();
        assert_eq!(r.kind, IdKind::SteamId);

        let r = dir.resolve("slgBob").await.unwrap();
        assert_eq!(r.kind, IdKind::SlgId);
        assert_eq!(r.user.unwrap().name, "bob");

        let r = dir.resolve(" 1001 ").await.unwrap();
        assert_eq!(r.kind, IdKind::AccountId);
    }

    #[tokio::test]
    async fn test_resolve_miss_classifies_input() {
        let dir = directory();

        let r = dir.resolve("76561198999999999").await.unwrap();
        assert!(r.user.is_none());
        assert_eq!(r.kind, IdKind::SteamId);

        let r = dir.resolve("carol").await.unwrap();
        assert!(r.user.is_none());
        assert_eq!(r.kind, IdKind::Username);
    }

    #[tokio::test]
    async fn test_from_file_and_upsert() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.json");
        tokio::fs::write(&path, r#"[{"name": "dave", "slg_id": "slgDave"}]"#)
            .await
            .unwrap();

        let directory = StaticUserDirectory::from_file(&path).await.unwrap();
        assert!(directory.resolve("dave").await.unwrap().user.is_some());

        directory
            .upsert(DirectoryUser::new("Dave").with_slg_id("slgDave2"))
            .await;
        let user = directory.resolve("dave").await.unwrap().user.unwrap();
        assert_eq!(user.slg_id.as_deref(), Some("slgDave2"));
    }
}
