//! Selection tracking across the destructive reload-on-every-mutation
//! pattern used by the palette store.
//!
//! Every remote mutation is followed by a full reload of the palette, so
//! whatever was selected has to be re-matched against the fresh tree
//! (same category name + command name) or dropped. The controller is a
//! small state machine: `Empty`, `Selected`, and `PendingReconciliation`
//! between triggering a mutation and the reload completing. A reload that
//! fails, or that finds no match, always ends in `Empty` — stale selection
//! UI against unknown server state is never shown.

use tracing::debug;

use crate::model::{CommandInfo, CommandTree};
use crate::template::FillSession;

/// Handed out when a mutation begins; a reconciliation carrying an
/// outdated token is discarded, so the last reload to complete wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReloadToken(u64);

/// The selected command and its live fill state.
#[derive(Debug, Clone)]
pub struct ActiveSelection {
    pub info: CommandInfo,
    pub session: FillSession,
}

#[derive(Debug, Clone)]
enum SelectionState {
    Empty,
    Selected(ActiveSelection),
    /// A mutation is in flight; holds the prior descriptor for re-matching.
    PendingReconciliation(CommandInfo),
}

/// Result of applying a reload to the selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The previously selected command still exists; selection was rebuilt
    /// fresh from the reloaded tree (unsaved fills are discarded).
    Reselected,
    /// No match in the reloaded tree; selection is now empty.
    Cleared,
    /// The token was superseded by a newer user action; state untouched.
    Stale,
}

pub struct SelectionController {
    state: SelectionState,
    /// Palette that was active when a destructive operation started; used
    /// as the preferred restore target afterwards.
    previous_palette: Option<String>,
    generation: u64,
}

impl Default for SelectionController {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectionController {
    pub fn new() -> Self {
        Self {
            state: SelectionState::Empty,
            previous_palette: None,
            generation: 0,
        }
    }

    pub fn current(&self) -> Option<&ActiveSelection> {
        match &self.state {
            SelectionState::Selected(active) => Some(active),
            _ => None,
        }
    }

    /// Mutable access to the fill session, for variable input edits.
    pub fn session_mut(&mut self) -> Option<&mut FillSession> {
        match &mut self.state {
            SelectionState::Selected(active) => Some(&mut active.session),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.state, SelectionState::Empty)
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, SelectionState::PendingReconciliation(_))
    }

    /// Select a command. The only way selection becomes non-empty.
    /// Atomically replaces template, filled copy, and variable paths, and
    /// supersedes any reload still in flight.
    pub fn select(&mut self, info: CommandInfo) {
        let session = FillSession::new(&info.command_data);
        self.generation += 1;
        self.state = SelectionState::Selected(ActiveSelection { info, session });
    }

    /// Drop the selection. Also supersedes any reload still in flight.
    pub fn clear(&mut self) {
        self.generation += 1;
        self.state = SelectionState::Empty;
    }

    /// Record the palette active right now, before a destructive operation
    /// that may redirect elsewhere (e.g. a save targeting another palette).
    pub fn snapshot_palette_context(&mut self, palette: Option<&str>) {
        self.previous_palette = palette.map(String::from);
    }

    pub fn previous_palette(&self) -> Option<&str> {
        self.previous_palette.as_deref()
    }

    /// Which palette to redisplay after a mutation round-trip. Priority:
    /// the snapshotted previous palette if it still exists, then the
    /// operation's own target, then the first palette, then nothing.
    pub fn resolve_return_palette(
        &self,
        available: &[String],
        fallback: Option<&str>,
    ) -> Option<String> {
        if let Some(previous) = &self.previous_palette {
            if available.iter().any(|name| name == previous) {
                return Some(previous.clone());
            }
        }
        if let Some(fallback) = fallback {
            if available.iter().any(|name| name == fallback) {
                return Some(fallback.to_string());
            }
        }
        available.first().cloned()
    }

    /// Mark the start of a mutation affecting the current selection. Moves
    /// `Selected` to `PendingReconciliation` and returns the token the
    /// eventual reload must present.
    pub fn begin_mutation(&mut self) -> ReloadToken {
        self.generation += 1;
        if let SelectionState::Selected(active) = &self.state {
            self.state = SelectionState::PendingReconciliation(active.info.clone());
        }
        ReloadToken(self.generation)
    }

    /// Apply a freshly reloaded tree. If a command matching the prior
    /// selection (category + name) still exists, re-select it with a fresh
    /// fill session built from the tree's copy; otherwise clear.
    pub fn reconcile_after_reload(
        &mut self,
        token: ReloadToken,
        palette_name: &str,
        tree: &CommandTree,
    ) -> ReconcileOutcome {
        if token.0 != self.generation {
            debug!("discarding stale reload completion");
            return ReconcileOutcome::Stale;
        }

        let prior = match &self.state {
            SelectionState::PendingReconciliation(info) => info.clone(),
            SelectionState::Selected(active) => active.info.clone(),
            SelectionState::Empty => return ReconcileOutcome::Cleared,
        };

        match crate::model::find_command(tree, &prior.category_name, &prior.command_name) {
            Some(data) => {
                let info = CommandInfo {
                    palette_name: palette_name.to_string(),
                    category_name: prior.category_name,
                    command_name: prior.command_name,
                    command_data: data.clone(),
                };
                let session = FillSession::new(&info.command_data);
                self.state = SelectionState::Selected(ActiveSelection { info, session });
                ReconcileOutcome::Reselected
            }
            None => {
                self.state = SelectionState::Empty;
                ReconcileOutcome::Cleared
            }
        }
    }

    /// The reload behind `token` failed. Fail safe: never show a selection
    /// against unknown server state.
    pub fn reload_failed(&mut self, token: ReloadToken) {
        if token.0 == self.generation {
            self.state = SelectionState::Empty;
        }
    }
}
