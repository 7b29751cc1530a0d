//! EditWorkflow: whole-palette editing over per-category JSON source text.
//!
//! Opening a palette snapshots its tree into one pretty-printed JSON blob
//! per category. The user edits raw text; nothing is validated until the
//! session serializes back to a tree for the PUT. That keeps half-typed
//! JSON editable without fighting the parser, at the cost of reporting
//! errors only at commit time (naming the offending category).

use indexmap::IndexMap;
use tracing::debug;

use crate::error::AppError;
use crate::model::{CommandMap, CommandTree};
use crate::notify::Confirm;
use crate::service::PaletteService;
use crate::store::PaletteStore;

pub struct EditSession {
    palette_name: String,
    /// Category name -> JSON source for that category's command map.
    /// Document order here is the order the PUT will carry.
    sources: IndexMap<String, String>,
    dirty: bool,
}

impl EditSession {
    /// Snapshot a palette tree into editable per-category sources. The
    /// session starts clean; only explicit edits mark it dirty.
    pub fn open(palette_name: &str, tree: &CommandTree) -> Result<Self, AppError> {
        let mut sources = IndexMap::new();
        for (category, commands) in tree {
            let source = serde_json::to_string_pretty(commands)
                .map_err(|e| AppError::MalformedData { message: e.to_string() })?;
            sources.insert(category.clone(), source);
        }
        debug!(palette = palette_name, categories = sources.len(), "edit session opened");
        Ok(Self {
            palette_name: palette_name.to_string(),
            sources,
            dirty: false,
        })
    }

    pub fn palette_name(&self) -> &str {
        &self.palette_name
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.sources.keys().map(String::as_str)
    }

    pub fn source(&self, category: &str) -> Option<&str> {
        self.sources.get(category).map(String::as_str)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Replace one category's JSON source. The text is taken as-is; it is
    /// only parsed at serialize time.
    pub fn set_source(&mut self, category: &str, source: &str) -> Result<(), AppError> {
        let Some(slot) = self.sources.get_mut(category) else {
            return Err(AppError::validation(format!(
                "No category named \"{category}\"."
            )));
        };
        if slot != source {
            *slot = source.to_string();
            self.dirty = true;
        }
        Ok(())
    }

    /// Add an empty category at the end.
    pub fn add_category(&mut self, name: &str) -> Result<(), AppError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::validation("Category name is required."));
        }
        if self.sources.contains_key(name) {
            return Err(AppError::validation(format!(
                "Category \"{name}\" already exists."
            )));
        }
        self.sources.insert(name.to_string(), "{}".to_string());
        self.dirty = true;
        Ok(())
    }

    /// Rename a category, keeping its position and contents. Renaming to
    /// the current name is a no-op, not an error; renaming onto a different
    /// existing category is rejected and the session is left unchanged.
    pub fn rename_category(&mut self, from: &str, to: &str) -> Result<(), AppError> {
        let to = to.trim();
        if to.is_empty() {
            return Err(AppError::validation("Category name is required."));
        }
        if !self.sources.contains_key(from) {
            return Err(AppError::validation(format!(
                "No category named \"{from}\"."
            )));
        }
        if from == to {
            return Ok(());
        }
        if self.sources.contains_key(to) {
            return Err(AppError::validation(format!(
                "Category \"{to}\" already exists."
            )));
        }
        let old = std::mem::take(&mut self.sources);
        self.sources = old
            .into_iter()
            .map(|(key, source)| {
                if key == from {
                    (to.to_string(), source)
                } else {
                    (key, source)
                }
            })
            .collect();
        self.dirty = true;
        Ok(())
    }

    /// Remove a category and its commands. Destructive; the caller asks the
    /// user first. The last category may be deleted — the empty-palette
    /// check happens at serialize time, so the user can still add a
    /// replacement before committing.
    pub fn delete_category(&mut self, name: &str) -> Result<(), AppError> {
        if self.sources.shift_remove(name).is_none() {
            return Err(AppError::validation(format!(
                "No category named \"{name}\"."
            )));
        }
        self.dirty = true;
        Ok(())
    }

    /// Parse every category source back into a command tree. Fails on the
    /// first invalid blob, naming the category, and on an empty palette.
    pub fn serialize(&self) -> Result<CommandTree, AppError> {
        if self.sources.is_empty() {
            return Err(AppError::validation("Palette content cannot be empty."));
        }
        let mut tree = CommandTree::new();
        for (category, source) in &self.sources {
            let commands: CommandMap = serde_json::from_str(source).map_err(|e| {
                AppError::validation(format!("Invalid JSON in category \"{category}\": {e}"))
            })?;
            tree.insert(category.clone(), commands);
        }
        Ok(tree)
    }

    /// PUT the serialized tree back to the server. A clean session commits
    /// as a no-op without a network call. On success the session is clean
    /// again; the caller still reloads to pick up the server's copy as
    /// the new truth.
    pub async fn commit<S: PaletteService>(
        &mut self,
        store: &PaletteStore<S>,
    ) -> Result<(), AppError> {
        if !self.dirty {
            return Ok(());
        }
        let tree = self.serialize()?;
        store.replace_palette(&self.palette_name, tree).await?;
        self.dirty = false;
        Ok(())
    }

    /// Whether the session may close. Clean sessions close silently; dirty
    /// ones ask the user to confirm discarding the edits.
    pub fn attempt_close(&self, confirm: &dyn Confirm) -> bool {
        if !self.dirty {
            return true;
        }
        confirm.confirm("Discard unsaved palette changes?")
    }
}
