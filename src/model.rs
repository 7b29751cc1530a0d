use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Category that ad hoc saves default into.
pub const SAVED_COMMANDS: &str = "Saved Commands";

/// Commands of one category, keyed by command name. Insertion order is
/// display order.
pub type CommandMap = IndexMap<String, Value>;

/// Full command tree of a palette: category name → command map.
/// Category names are unique; insertion order is display order.
pub type CommandTree = IndexMap<String, CommandMap>;

/// A named, server-persisted collection of command categories.
/// Wire shape of `GET /api/palettes/{name}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Palette {
    pub name: String,
    pub commands: CommandTree,
}

impl Palette {
    pub fn new(name: impl Into<String>, commands: CommandTree) -> Self {
        Self {
            name: name.into(),
            commands,
        }
    }
}

/// Denormalized descriptor of a selected command, kept alongside the
/// selection so it can be re-matched against a freshly reloaded tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandInfo {
    pub palette_name: String,
    pub category_name: String,
    pub command_name: String,
    pub command_data: Value,
}

impl CommandInfo {
    /// Two infos denote the same command iff category and command name
    /// match. The palette may legitimately differ (a save can redirect
    /// to a different palette than the one being viewed).
    pub fn same_command(&self, other: &CommandInfo) -> bool {
        self.category_name == other.category_name && self.command_name == other.command_name
    }
}

/// Look up a command's template in a tree.
pub fn find_command<'a>(tree: &'a CommandTree, category: &str, command: &str) -> Option<&'a Value> {
    tree.get(category).and_then(|cat| cat.get(command))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_same_command_ignores_palette_name() {
        let a = CommandInfo {
            palette_name: "Default".into(),
            category_name: "Ops".into(),
            command_name: "Ping".into(),
            command_data: json!({}),
        };
        let mut b = a.clone();
        b.palette_name = "Other".into();
        assert!(a.same_command(&b));

        b.command_name = "Pong".into();
        assert!(!a.same_command(&b));
    }

    #[test]
    fn test_palette_round_trip_preserves_category_order() {
        let raw = r#"{"name":"p","commands":{"Zeta":{"a":1},"Alpha":{"b":2}}}"#;
        let palette: Palette = serde_json::from_str(raw).unwrap();
        let keys: Vec<&String> = palette.commands.keys().collect();
        assert_eq!(keys, ["Zeta", "Alpha"]);
    }
}
