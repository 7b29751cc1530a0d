//! Client-side cache of the active palette plus all remote mutations.
//!
//! The server is the sole source of truth: the cached tree is a disposable
//! copy that is replaced wholesale on every successful load and cleared on
//! any load failure. No client mutation ever touches the cache directly —
//! mutations go to the server and the caller re-fetches afterwards
//! (reload-then-reconcile).

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::AppError;
use crate::model::{CommandTree, Palette};
use crate::service::PaletteService;

pub struct PaletteStore<S: PaletteService> {
    service: S,
    active_palette: Option<String>,
    tree: CommandTree,
}

impl<S: PaletteService> PaletteStore<S> {
    pub fn new(service: S) -> Self {
        Self {
            service,
            active_palette: None,
            tree: CommandTree::new(),
        }
    }

    /// Name of the currently cached palette, if any.
    pub fn active_palette(&self) -> Option<&str> {
        self.active_palette.as_deref()
    }

    /// The cached command tree. Empty when nothing is loaded.
    pub fn tree(&self) -> &CommandTree {
        &self.tree
    }

    #[cfg(test)]
    pub fn service(&self) -> &S {
        &self.service
    }

    pub async fn list_palettes(&self) -> Result<Vec<String>, AppError> {
        self.service.list().await
    }

    /// Fetch a palette and make it the active cache. On any failure the
    /// cache is cleared — a half-applied or stale tree is worse than an
    /// empty one.
    pub async fn load_palette(&mut self, name: &str) -> Result<&CommandTree, AppError> {
        match self.service.fetch(name).await {
            Ok(palette) => {
                debug!(
                    palette = palette.name,
                    categories = palette.commands.len(),
                    "palette loaded"
                );
                self.active_palette = Some(palette.name);
                self.tree = palette.commands;
                Ok(&self.tree)
            }
            Err(e) => {
                warn!(palette = name, error = %e, "palette load failed; clearing cache");
                self.clear();
                Err(e)
            }
        }
    }

    /// Drop the cached palette without touching the server.
    pub fn clear(&mut self) {
        self.active_palette = None;
        self.tree = CommandTree::new();
    }

    pub async fn create_palette(&self, name: &str, initial: CommandTree) -> Result<(), AppError> {
        self.service.create(&Palette::new(name, initial)).await
    }

    /// Delete a palette server-side. Caller must have confirmed with the
    /// user, and must pick a new active palette afterwards. If the deleted
    /// palette was the cached one, the cache is cleared.
    pub async fn delete_palette(&mut self, name: &str) -> Result<(), AppError> {
        self.service.delete(name).await?;
        if self.active_palette.as_deref() == Some(name) {
            self.clear();
        }
        Ok(())
    }

    /// Full overwrite of a palette's tree (PUT semantics). The cache is NOT
    /// updated from the request body — server-side normalization may differ,
    /// so callers re-fetch via `load_palette` to resync.
    pub async fn replace_palette(&self, name: &str, tree: CommandTree) -> Result<(), AppError> {
        self.service.replace(&Palette::new(name, tree)).await
    }

    /// Add a command to a palette's default bucket. A name collision
    /// surfaces as `AppError::Conflict`; the caller confirms with the user
    /// and falls back to `update_command` for a forced overwrite (there is
    /// no force endpoint).
    pub async fn add_command(
        &self,
        palette: &str,
        command_name: &str,
        command_data: &Value,
    ) -> Result<(), AppError> {
        self.service
            .add_command(palette, command_name, command_data)
            .await
    }

    /// Remove one command: fetch the current tree, drop the entry, prune
    /// the category if it became empty, and PUT the result back. When the
    /// category or command does not exist there is nothing to write and
    /// the server copy is left untouched.
    pub async fn remove_command(
        &self,
        palette: &str,
        category: &str,
        command: &str,
    ) -> Result<(), AppError> {
        let mut remote = self.service.fetch(palette).await?;
        let Some(commands) = remote.commands.get_mut(category) else {
            return Ok(());
        };
        if commands.shift_remove(command).is_none() {
            return Ok(());
        }
        if commands.is_empty() {
            remote.commands.shift_remove(category);
        }
        self.service.replace(&remote).await
    }

    /// Overwrite one command's template: fetch, set (creating the category
    /// when absent), and PUT the result back.
    pub async fn update_command(
        &self,
        palette: &str,
        category: &str,
        command: &str,
        new_data: Value,
    ) -> Result<(), AppError> {
        let mut remote = self.service.fetch(palette).await?;
        remote
            .commands
            .entry(category.to_string())
            .or_default()
            .insert(command.to_string(), new_data);
        self.service.replace(&remote).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::model::{CommandMap, SAVED_COMMANDS};
    use crate::service::testing::InMemoryPalettes;

    fn sample_palette() -> Palette {
        let mut ops = CommandMap::new();
        ops.insert("Ping".to_string(), json!({"cmd": "ping", "id": "%ID%"}));
        ops.insert("Reset".to_string(), json!({"cmd": "reset"}));
        let mut misc = CommandMap::new();
        misc.insert("Echo".to_string(), json!({"cmd": "echo"}));
        let mut tree = CommandTree::new();
        tree.insert("Ops".to_string(), ops);
        tree.insert("Misc".to_string(), misc);
        Palette::new("Default", tree)
    }

    #[tokio::test]
    async fn test_load_replaces_cache() {
        let mut store = PaletteStore::new(InMemoryPalettes::with_palette(sample_palette()));
        let tree = store.load_palette("Default").await.unwrap();
        assert_eq!(tree.len(), 2);
        assert_eq!(store.active_palette(), Some("Default"));
    }

    #[tokio::test]
    async fn test_load_failure_clears_cache() {
        let mut store = PaletteStore::new(InMemoryPalettes::with_palette(sample_palette()));
        store.load_palette("Default").await.unwrap();

        let err = store.load_palette("Missing").await.unwrap_err();
        assert!(matches!(err, AppError::Service { status: 404, .. }));
        assert_eq!(store.active_palette(), None);
        assert!(store.tree().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_fetch_clears_cache() {
        let service = InMemoryPalettes::with_palette(sample_palette());
        let mut store = PaletteStore::new(service);
        store.load_palette("Default").await.unwrap();

        *store.service.fail_next.lock() = Some(AppError::MalformedData {
            message: "missing commands key".into(),
        });
        let err = store.load_palette("Default").await.unwrap_err();
        assert!(matches!(err, AppError::MalformedData { .. }));
        assert!(store.tree().is_empty());
    }

    #[tokio::test]
    async fn test_remove_command_prunes_empty_category() {
        let store = PaletteStore::new(InMemoryPalettes::with_palette(sample_palette()));
        store.remove_command("Default", "Misc", "Echo").await.unwrap();

        let remote = store.service.palettes.lock().get("Default").cloned().unwrap();
        assert!(!remote.commands.contains_key("Misc"));
        // Other categories untouched.
        assert_eq!(remote.commands.get("Ops").unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_remove_command_keeps_nonempty_category() {
        let store = PaletteStore::new(InMemoryPalettes::with_palette(sample_palette()));
        store.remove_command("Default", "Ops", "Ping").await.unwrap();

        let remote = store.service.palettes.lock().get("Default").cloned().unwrap();
        let ops = remote.commands.get("Ops").unwrap();
        assert!(!ops.contains_key("Ping"));
        assert!(ops.contains_key("Reset"));
    }

    #[tokio::test]
    async fn test_remove_missing_command_issues_no_write() {
        let store = PaletteStore::new(InMemoryPalettes::with_palette(sample_palette()));
        store
            .remove_command("Default", "Ops", "NoSuchCommand")
            .await
            .unwrap();
        store
            .remove_command("Default", "NoSuchCategory", "Ping")
            .await
            .unwrap();
        assert!(store.service.write_log().is_empty());
    }

    #[tokio::test]
    async fn test_update_command_creates_category() {
        let store = PaletteStore::new(InMemoryPalettes::with_palette(sample_palette()));
        store
            .update_command("Default", "Brand New", "Hello", json!({"cmd": "hello"}))
            .await
            .unwrap();

        let remote = store.service.palettes.lock().get("Default").cloned().unwrap();
        assert_eq!(
            remote.commands.get("Brand New").unwrap().get("Hello"),
            Some(&json!({"cmd": "hello"}))
        );
    }

    #[tokio::test]
    async fn test_add_command_conflict_surfaces() {
        let mut palette = sample_palette();
        let mut saved = CommandMap::new();
        saved.insert("Ping".to_string(), json!({"cmd": "old"}));
        palette.commands.insert(SAVED_COMMANDS.to_string(), saved);

        let store = PaletteStore::new(InMemoryPalettes::with_palette(palette));
        let err = store
            .add_command("Default", "Ping", &json!({"cmd": "new"}))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_delete_active_palette_clears_cache() {
        let mut store = PaletteStore::new(InMemoryPalettes::with_palette(sample_palette()));
        store.load_palette("Default").await.unwrap();
        store.delete_palette("Default").await.unwrap();
        assert_eq!(store.active_palette(), None);
        assert!(store.tree().is_empty());
    }
}
