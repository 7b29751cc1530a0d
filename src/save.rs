//! SaveWorkflow: resolve "save this filled command" into a concrete
//! palette mutation, including collision handling and the post-save
//! reload/reconcile round-trip.

use serde_json::Value;
use tracing::debug;

use crate::error::AppError;
use crate::model::{CommandMap, CommandTree, SAVED_COMMANDS};
use crate::notify::{with_retry, Confirm, Notifier, NotifyKind};
use crate::selection::{ReloadToken, SelectionController};
use crate::service::PaletteService;
use crate::store::PaletteStore;

/// Where the command should land.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveTarget {
    ExistingPalette(String),
    NewPalette(String),
}

impl SaveTarget {
    pub fn palette_name(&self) -> &str {
        match self {
            SaveTarget::ExistingPalette(name) | SaveTarget::NewPalette(name) => name,
        }
    }
}

/// A user declining an overwrite is a normal abort, not a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved { palette: String },
    Cancelled,
}

/// Save a filled command into a palette.
///
/// Existing-palette path: POST the command; if the server reports the name
/// already taken (in the `Saved Commands` bucket), ask the user and, on
/// confirmation, force the overwrite via read-modify-write. New-palette
/// path: create the palette seeded with `{"Saved Commands": {name: cmd}}`.
///
/// Validation failures return before any network call. Network-class
/// failures offer a confirm-to-retry that re-invokes the same call;
/// service errors propagate for the caller's notify handling.
pub async fn save_command<S: PaletteService>(
    store: &PaletteStore<S>,
    confirm: &dyn Confirm,
    notifier: &dyn Notifier,
    command_name: &str,
    target: &SaveTarget,
    filled: &Value,
) -> Result<SaveOutcome, AppError> {
    let command_name = command_name.trim();
    if command_name.is_empty() {
        return Err(AppError::validation("Command name is required."));
    }
    if target.palette_name().trim().is_empty() {
        return Err(AppError::validation("Target palette is required."));
    }

    match target {
        SaveTarget::ExistingPalette(palette) => {
            let added =
                with_retry(confirm, || store.add_command(palette, command_name, filled)).await;
            match added {
                Ok(()) => {}
                Err(AppError::Conflict { .. }) => {
                    let prompt = format!(
                        "Command \"{command_name}\" already exists in \"{palette}\". Overwrite?"
                    );
                    if !confirm.confirm(&prompt) {
                        notifier.notify("Save cancelled.", NotifyKind::Info);
                        return Ok(SaveOutcome::Cancelled);
                    }
                    debug!(palette, command = command_name, "overwriting after confirm");
                    with_retry(confirm, || {
                        store.update_command(palette, SAVED_COMMANDS, command_name, filled.clone())
                    })
                    .await?;
                }
                Err(e) => return Err(e),
            }
            notifier.notify(
                &format!("Command \"{command_name}\" saved to palette \"{palette}\"."),
                NotifyKind::Success,
            );
            Ok(SaveOutcome::Saved {
                palette: palette.clone(),
            })
        }
        SaveTarget::NewPalette(palette) => {
            let mut bucket = CommandMap::new();
            bucket.insert(command_name.to_string(), filled.clone());
            let mut tree = CommandTree::new();
            tree.insert(SAVED_COMMANDS.to_string(), bucket);

            with_retry(confirm, || store.create_palette(palette, tree.clone())).await?;
            notifier.notify(
                &format!("Palette \"{palette}\" created with command \"{command_name}\"."),
                NotifyKind::Success,
            );
            Ok(SaveOutcome::Saved {
                palette: palette.clone(),
            })
        }
    }
}

/// Category to steer the UI to after a save: the default bucket when it
/// exists, otherwise the first category.
pub fn landing_category(tree: &CommandTree) -> Option<&str> {
    if tree.contains_key(SAVED_COMMANDS) {
        return Some(SAVED_COMMANDS);
    }
    tree.keys().next().map(String::as_str)
}

/// Shared postcondition of every mutating workflow (save, edit, delete):
/// resolve which palette to redisplay, reload it, and reconcile the prior
/// selection against the fresh tree. Returns the palette now shown, or
/// `None` when no palettes remain (cache and selection cleared).
///
/// Any failure leaves the selection empty rather than stale.
pub async fn refresh_after_mutation<S: PaletteService>(
    store: &mut PaletteStore<S>,
    selection: &mut SelectionController,
    token: ReloadToken,
    fallback_palette: Option<&str>,
) -> Result<Option<String>, AppError> {
    let available = match store.list_palettes().await {
        Ok(names) => names,
        Err(e) => {
            selection.reload_failed(token);
            return Err(e);
        }
    };

    let Some(target) = selection.resolve_return_palette(&available, fallback_palette) else {
        store.clear();
        selection.reload_failed(token);
        return Ok(None);
    };

    match store.load_palette(&target).await {
        Ok(tree) => {
            selection.reconcile_after_reload(token, &target, tree);
            Ok(Some(target))
        }
        Err(e) => {
            selection.reload_failed(token);
            Err(e)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::model::{CommandInfo, Palette};
    use crate::notify::testing::{FixedConfirm, RecordingNotifier};
    use crate::service::testing::InMemoryPalettes;

    fn store_with_default() -> PaletteStore<InMemoryPalettes> {
        let mut saved = CommandMap::new();
        saved.insert("Ping".to_string(), json!({"cmd": "ping", "id": "1"}));
        let mut tree = CommandTree::new();
        tree.insert(SAVED_COMMANDS.to_string(), saved);
        PaletteStore::new(InMemoryPalettes::with_palette(Palette::new("Default", tree)))
    }

    #[tokio::test]
    async fn test_empty_name_fails_before_network() {
        let store = store_with_default();
        let notifier = RecordingNotifier::default();
        let err = save_command(
            &store,
            &FixedConfirm(true),
            &notifier,
            "   ",
            &SaveTarget::ExistingPalette("Default".into()),
            &json!({}),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
        assert!(store.service().write_log().is_empty());
    }

    #[tokio::test]
    async fn test_empty_target_fails_before_network() {
        let store = store_with_default();
        let err = save_command(
            &store,
            &FixedConfirm(true),
            &RecordingNotifier::default(),
            "Ping",
            &SaveTarget::NewPalette("  ".into()),
            &json!({}),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
        assert!(store.service().write_log().is_empty());
    }

    #[tokio::test]
    async fn test_save_to_existing_palette() {
        let store = store_with_default();
        let notifier = RecordingNotifier::default();
        let outcome = save_command(
            &store,
            &FixedConfirm(false),
            &notifier,
            "Status",
            &SaveTarget::ExistingPalette("Default".into()),
            &json!({"cmd": "status"}),
        )
        .await
        .unwrap();
        assert_eq!(
            outcome,
            SaveOutcome::Saved {
                palette: "Default".into()
            }
        );
        let remote = store.service().palettes.lock().get("Default").cloned().unwrap();
        assert!(remote.commands[SAVED_COMMANDS].contains_key("Status"));
        assert_eq!(notifier.messages.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_conflict_declined_leaves_everything_unchanged() {
        let store = store_with_default();
        let notifier = RecordingNotifier::default();
        let outcome = save_command(
            &store,
            &FixedConfirm(false),
            &notifier,
            "Ping",
            &SaveTarget::ExistingPalette("Default".into()),
            &json!({"cmd": "ping", "id": "2"}),
        )
        .await
        .unwrap();
        assert_eq!(outcome, SaveOutcome::Cancelled);

        // Conflict was discovered via the POST, but no overwrite followed.
        let writes = store.service().write_log();
        assert!(writes.iter().all(|w| !w.starts_with("replace")));

        let remote = store.service().palettes.lock().get("Default").cloned().unwrap();
        assert_eq!(
            remote.commands[SAVED_COMMANDS]["Ping"],
            json!({"cmd": "ping", "id": "1"})
        );
    }

    #[tokio::test]
    async fn test_conflict_confirmed_overwrites() {
        let store = store_with_default();
        let outcome = save_command(
            &store,
            &FixedConfirm(true),
            &RecordingNotifier::default(),
            "Ping",
            &SaveTarget::ExistingPalette("Default".into()),
            &json!({"cmd": "ping", "id": "2"}),
        )
        .await
        .unwrap();
        assert!(matches!(outcome, SaveOutcome::Saved { .. }));

        let remote = store.service().palettes.lock().get("Default").cloned().unwrap();
        assert_eq!(
            remote.commands[SAVED_COMMANDS]["Ping"],
            json!({"cmd": "ping", "id": "2"})
        );
    }

    #[tokio::test]
    async fn test_network_failure_retried_after_confirm() {
        let store = store_with_default();
        *store.service().fail_next.lock() = Some(AppError::Network {
            message: "connection refused".into(),
        });
        let outcome = save_command(
            &store,
            &FixedConfirm(true),
            &RecordingNotifier::default(),
            "Status",
            &SaveTarget::ExistingPalette("Default".into()),
            &json!({"cmd": "status"}),
        )
        .await
        .unwrap();
        assert!(matches!(outcome, SaveOutcome::Saved { .. }));

        let remote = store.service().palettes.lock().get("Default").cloned().unwrap();
        assert!(remote.commands[SAVED_COMMANDS].contains_key("Status"));
    }

    #[tokio::test]
    async fn test_network_failure_not_retried_when_declined() {
        let store = store_with_default();
        *store.service().fail_next.lock() = Some(AppError::Timeout {
            operation: "the palette service".into(),
        });
        let err = save_command(
            &store,
            &FixedConfirm(false),
            &RecordingNotifier::default(),
            "Status",
            &SaveTarget::ExistingPalette("Default".into()),
            &json!({"cmd": "status"}),
        )
        .await
        .unwrap_err();
        assert!(err.is_network_class());
        assert!(store.service().write_log().is_empty());
    }

    #[tokio::test]
    async fn test_new_palette_gets_seed_tree() {
        let store = store_with_default();
        let outcome = save_command(
            &store,
            &FixedConfirm(false),
            &RecordingNotifier::default(),
            "Hello",
            &SaveTarget::NewPalette("Fresh".into()),
            &json!({"cmd": "hello"}),
        )
        .await
        .unwrap();
        assert_eq!(
            outcome,
            SaveOutcome::Saved {
                palette: "Fresh".into()
            }
        );
        let remote = store.service().palettes.lock().get("Fresh").cloned().unwrap();
        assert_eq!(
            remote.commands[SAVED_COMMANDS]["Hello"],
            json!({"cmd": "hello"})
        );
    }

    #[tokio::test]
    async fn test_refresh_steers_back_to_previous_palette() {
        let mut store = store_with_default();
        store.service().palettes.lock().insert(
            "Other".to_string(),
            Palette::new("Other", CommandTree::new()),
        );
        store.load_palette("Other").await.unwrap();

        let mut selection = SelectionController::new();
        selection.snapshot_palette_context(store.active_palette());
        let token = selection.begin_mutation();

        let shown = refresh_after_mutation(&mut store, &mut selection, token, Some("Default"))
            .await
            .unwrap();
        assert_eq!(shown.as_deref(), Some("Other"));
        assert_eq!(store.active_palette(), Some("Other"));
    }

    #[tokio::test]
    async fn test_refresh_with_no_palettes_left_clears_state() {
        let mut store = store_with_default();
        store.load_palette("Default").await.unwrap();
        let mut selection = SelectionController::new();
        selection.select(CommandInfo {
            palette_name: "Default".into(),
            category_name: SAVED_COMMANDS.into(),
            command_name: "Ping".into(),
            command_data: json!({"cmd": "ping"}),
        });
        let token = selection.begin_mutation();
        store.delete_palette("Default").await.unwrap();

        let shown = refresh_after_mutation(&mut store, &mut selection, token, None)
            .await
            .unwrap();
        assert_eq!(shown, None);
        assert!(selection.is_empty());
        assert!(store.tree().is_empty());
    }

    #[tokio::test]
    async fn test_delete_selected_command_empties_selection() {
        let mut store = store_with_default();
        store.load_palette("Default").await.unwrap();

        let mut selection = SelectionController::new();
        selection.select(CommandInfo {
            palette_name: "Default".into(),
            category_name: SAVED_COMMANDS.into(),
            command_name: "Ping".into(),
            command_data: json!({"cmd": "ping", "id": "1"}),
        });
        selection.snapshot_palette_context(store.active_palette());
        let token = selection.begin_mutation();

        store
            .remove_command("Default", SAVED_COMMANDS, "Ping")
            .await
            .unwrap();
        let shown = refresh_after_mutation(&mut store, &mut selection, token, None)
            .await
            .unwrap();

        assert_eq!(shown.as_deref(), Some("Default"));
        assert!(selection.is_empty());
        // The now-empty category was pruned server-side.
        assert!(!store.tree().contains_key(SAVED_COMMANDS));
    }

    #[test]
    fn test_landing_category_prefers_saved_commands() {
        let mut tree = CommandTree::new();
        tree.insert("Ops".to_string(), CommandMap::new());
        assert_eq!(landing_category(&tree), Some("Ops"));
        tree.insert(SAVED_COMMANDS.to_string(), CommandMap::new());
        assert_eq!(landing_category(&tree), Some(SAVED_COMMANDS));
        assert_eq!(landing_category(&CommandTree::new()), None);
    }
}
