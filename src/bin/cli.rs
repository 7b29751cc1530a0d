// CLI binary — panicking on unrecoverable errors is standard for CLI tools.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::unreachable, clippy::indexing_slicing)]

use std::io::Write as _;
use std::process;

use clap::{Parser, Subcommand};
use serde_json::Value;

use commander::edit::EditSession;
use commander::error::AppError;
use commander::model;
use commander::notify::{with_retry, Confirm, Notifier, NotifyKind};
use commander::relay::{ConnectionService, HttpRelay, RelayEvent, RelayEventKind};
use commander::save::{self, SaveOutcome, SaveTarget};
use commander::selection::SelectionController;
use commander::service::HttpPaletteService;
use commander::settings::{self, AppSettings};
use commander::store::PaletteStore;
use commander::template::{FillSession, VariablePath};

// ── CLI argument parsing ─────────────────────────────────────────

#[derive(Parser)]
#[command(name = "commander-cli", about = "Command palette headless CLI", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Server base URL override (default from settings)
    #[arg(long, global = true)]
    server: Option<String>,

    /// Answer yes to every confirmation prompt
    #[arg(long, global = true)]
    yes: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Palette management
    Palettes {
        #[command(subcommand)]
        action: PaletteAction,
    },
    /// Category management within a palette
    Categories {
        #[command(subcommand)]
        action: CategoryAction,
    },
    /// Show a command's template and its variable slots
    Inspect {
        palette: String,
        category: String,
        command: String,
    },
    /// Fill a command's variables and send it to the device
    Send {
        palette: String,
        category: String,
        command: String,
        /// Variable assignment, `path=value` (repeatable)
        #[arg(long = "set")]
        sets: Vec<String>,
        /// Delimiter appended after the command (default from settings)
        #[arg(long)]
        delimiter: Option<String>,
    },
    /// Save a filled command into a palette
    Save {
        palette: String,
        category: String,
        command: String,
        /// Variable assignment, `path=value` (repeatable)
        #[arg(long = "set")]
        sets: Vec<String>,
        /// Save into this existing palette
        #[arg(long, conflicts_with = "new")]
        to: Option<String>,
        /// Create this palette and save into it
        #[arg(long)]
        new: Option<String>,
        /// Name for the saved command (defaults to the source name)
        #[arg(long = "as")]
        as_name: Option<String>,
    },
    /// Send a raw text line to the device
    SendText { text: String },
    /// Open the device TCP link
    Connect { socket_path: String },
    /// Close the device TCP link
    Disconnect,
    /// Settings management
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

#[derive(Subcommand)]
enum PaletteAction {
    /// List all palettes
    List,
    /// Print a palette's command tree
    Show { name: String },
    /// Create a new empty palette
    Create { name: String },
    /// Delete a palette
    Delete { name: String },
}

#[derive(Subcommand)]
enum CategoryAction {
    /// Add an empty category
    Add { palette: String, name: String },
    /// Rename a category, keeping its commands
    Rename {
        palette: String,
        from: String,
        to: String,
    },
    /// Delete a category and all its commands
    Delete { palette: String, name: String },
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Print the current settings
    Show,
    /// Set the server base URL
    SetServer { url: String },
    /// Set the send delimiter (omit the value to clear it)
    SetDelimiter { delimiter: Option<String> },
}

// ── Console notifier / confirm ───────────────────────────────────

struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, message: &str, kind: NotifyKind) {
        match kind {
            NotifyKind::Info | NotifyKind::Success => println!("{message}"),
            NotifyKind::Warn => eprintln!("warning: {message}"),
            NotifyKind::Error => eprintln!("error: {message}"),
        }
    }
}

struct ConsoleConfirm {
    assume_yes: bool,
}

impl Confirm for ConsoleConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        if self.assume_yes {
            return true;
        }
        print!("{prompt} [y/N] ");
        std::io::stdout().flush().ok();
        let mut line = String::new();
        if std::io::stdin().read_line(&mut line).is_err() {
            return false;
        }
        matches!(line.trim(), "y" | "Y" | "yes")
    }
}

// ── Helpers ──────────────────────────────────────────────────────

fn print_event(event: &RelayEvent) {
    let prefix = match event.kind {
        RelayEventKind::Sent => ">>",
        RelayEventKind::Received => "<<",
        RelayEventKind::SystemInfo => "--",
        RelayEventKind::SystemWarn | RelayEventKind::SystemError => "!!",
    };
    println!("{prefix} {}", event.message);
}

fn apply_sets(session: &mut FillSession, sets: &[String]) -> Result<(), AppError> {
    for assignment in sets {
        let Some((path, value)) = assignment.split_once('=') else {
            return Err(AppError::validation(format!(
                "Invalid --set \"{assignment}\": expected path=value."
            )));
        };
        session.set(&VariablePath::parse(path), value);
    }
    Ok(())
}

fn require_all_filled(session: &FillSession) -> Result<(), AppError> {
    let unfilled = session.unfilled();
    if unfilled.is_empty() {
        return Ok(());
    }
    let names: Vec<String> = unfilled.iter().map(ToString::to_string).collect();
    Err(AppError::validation(format!(
        "Unfilled variables: {}",
        names.join(", ")
    )))
}

async fn fetch_command(
    store: &mut PaletteStore<HttpPaletteService>,
    palette: &str,
    category: &str,
    command: &str,
) -> Result<Value, AppError> {
    let tree = store.load_palette(palette).await?;
    model::find_command(tree, category, command)
        .cloned()
        .ok_or_else(|| {
            AppError::validation(format!(
                "No command \"{command}\" in \"{palette}\" / \"{category}\"."
            ))
        })
}

fn load_or_default_settings() -> AppSettings {
    match settings::config_dir().and_then(|dir| settings::load_settings(&dir)) {
        Ok(Some(loaded)) => loaded,
        Ok(None) => AppSettings::default(),
        Err(e) => {
            eprintln!("warning: {e}; using default settings");
            AppSettings::default()
        }
    }
}

fn save_updated_settings(current: AppSettings) -> Result<(), Box<dyn std::error::Error>> {
    let dir = settings::config_dir()?;
    settings::save_settings(&dir, &current)?;
    println!("Settings saved.");
    Ok(())
}

// ── Command execution ────────────────────────────────────────────

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let loaded = load_or_default_settings();
    let server = cli.server.clone().unwrap_or_else(|| loaded.server_url.clone());
    let notifier = ConsoleNotifier;
    let confirm = ConsoleConfirm { assume_yes: cli.yes };

    match cli.command {
        Commands::Palettes { action } => {
            let mut store = PaletteStore::new(HttpPaletteService::new(&server)?);
            match action {
                PaletteAction::List => {
                    for name in store.list_palettes().await? {
                        println!("{name}");
                    }
                }
                PaletteAction::Show { name } => {
                    let tree = store.load_palette(&name).await?;
                    println!("{}", serde_json::to_string_pretty(tree)?);
                }
                PaletteAction::Create { name } => {
                    let mut tree = model::CommandTree::new();
                    tree.insert(model::SAVED_COMMANDS.to_string(), model::CommandMap::new());
                    store.create_palette(&name, tree).await?;
                    notifier.notify(&format!("Palette \"{name}\" created."), NotifyKind::Success);
                }
                PaletteAction::Delete { name } => {
                    if !confirm.confirm(&format!("Delete palette \"{name}\" and all its commands?")) {
                        notifier.notify("Delete cancelled.", NotifyKind::Info);
                        return Ok(());
                    }
                    store.delete_palette(&name).await?;
                    notifier.notify(&format!("Palette \"{name}\" deleted."), NotifyKind::Success);
                }
            }
        }

        Commands::Categories { action } => {
            let mut store = PaletteStore::new(HttpPaletteService::new(&server)?);
            let palette = match &action {
                CategoryAction::Add { palette, .. }
                | CategoryAction::Rename { palette, .. }
                | CategoryAction::Delete { palette, .. } => palette.clone(),
            };
            let tree = store.load_palette(&palette).await?;
            let mut session = EditSession::open(&palette, tree)?;
            match action {
                CategoryAction::Add { name, .. } => {
                    session.add_category(&name)?;
                    session.commit(&store).await?;
                    notifier.notify(&format!("Category \"{name}\" added."), NotifyKind::Success);
                }
                CategoryAction::Rename { from, to, .. } => {
                    session.rename_category(&from, &to)?;
                    if session.is_dirty() {
                        session.commit(&store).await?;
                        notifier.notify(
                            &format!("Category \"{from}\" renamed to \"{to}\"."),
                            NotifyKind::Success,
                        );
                    } else {
                        notifier.notify("Nothing to rename.", NotifyKind::Info);
                    }
                }
                CategoryAction::Delete { name, .. } => {
                    if !confirm.confirm(&format!(
                        "Delete category \"{name}\" and all its commands?"
                    )) {
                        notifier.notify("Delete cancelled.", NotifyKind::Info);
                        return Ok(());
                    }
                    session.delete_category(&name)?;
                    session.commit(&store).await?;
                    notifier.notify(&format!("Category \"{name}\" deleted."), NotifyKind::Success);
                }
            }
        }

        Commands::Inspect {
            palette,
            category,
            command,
        } => {
            let mut store = PaletteStore::new(HttpPaletteService::new(&server)?);
            let data = fetch_command(&mut store, &palette, &category, &command).await?;
            let session = FillSession::new(&data);
            println!("{}", serde_json::to_string_pretty(session.template())?);
            if session.has_placeholders() {
                println!("\nVariables:");
                for path in session.paths() {
                    println!("  {path}");
                }
            } else {
                println!("\nNo variables; ready to send as-is.");
            }
        }

        Commands::Send {
            palette,
            category,
            command,
            sets,
            delimiter,
        } => {
            let mut store = PaletteStore::new(HttpPaletteService::new(&server)?);
            let data = fetch_command(&mut store, &palette, &category, &command).await?;
            let mut session = FillSession::new(&data);
            apply_sets(&mut session, &sets)?;
            require_all_filled(&session)?;

            let relay = HttpRelay::new(&server)?;
            let delimiter = delimiter.or(loaded.send_delimiter);
            let response = with_retry(&confirm, || {
                relay.send_command(session.filled(), delimiter.as_deref())
            })
            .await?;
            print_event(&RelayEvent::new(
                RelayEventKind::Sent,
                serde_json::to_string(session.filled())?,
            ));
            print_event(&RelayEvent::new(RelayEventKind::SystemInfo, response));
        }

        Commands::Save {
            palette,
            category,
            command,
            sets,
            to,
            new,
            as_name,
        } => {
            let target = match (to, new) {
                (Some(existing), None) => SaveTarget::ExistingPalette(existing),
                (None, Some(fresh)) => SaveTarget::NewPalette(fresh),
                _ => {
                    return Err(Box::new(AppError::validation(
                        "Pass exactly one of --to <palette> or --new <palette>.",
                    )))
                }
            };
            let mut store = PaletteStore::new(HttpPaletteService::new(&server)?);
            let data = fetch_command(&mut store, &palette, &category, &command).await?;
            let mut session = FillSession::new(&data);
            apply_sets(&mut session, &sets)?;
            require_all_filled(&session)?;

            let mut selection = SelectionController::new();
            selection.snapshot_palette_context(store.active_palette());
            let token = selection.begin_mutation();

            let name = as_name.unwrap_or(command);
            let outcome =
                save::save_command(&store, &confirm, &notifier, &name, &target, session.filled())
                    .await?;
            if let SaveOutcome::Saved { palette: saved_to } = outcome {
                let shown =
                    save::refresh_after_mutation(&mut store, &mut selection, token, Some(&saved_to))
                        .await?;
                if let Some(shown) = shown {
                    if let Some(landing) = save::landing_category(store.tree()) {
                        println!("Now viewing \"{shown}\" / \"{landing}\".");
                    }
                }
            }
        }

        Commands::SendText { text } => {
            let relay = HttpRelay::new(&server)?;
            let response = with_retry(&confirm, || relay.send_text(&text)).await?;
            print_event(&RelayEvent::new(RelayEventKind::Sent, text));
            print_event(&RelayEvent::new(RelayEventKind::SystemInfo, response));
        }

        Commands::Connect { socket_path } => {
            let relay = HttpRelay::new(&server)?;
            let response = relay.connect(&socket_path).await?;
            print_event(&RelayEvent::new(
                RelayEventKind::SystemInfo,
                format!("Connected to {socket_path}: {response}"),
            ));
        }

        Commands::Disconnect => {
            let relay = HttpRelay::new(&server)?;
            let response = relay.disconnect().await?;
            print_event(&RelayEvent::new(RelayEventKind::SystemInfo, response));
        }

        Commands::Settings { action } => match action {
            SettingsAction::Show => {
                println!("{}", serde_json::to_string_pretty(&loaded)?);
            }
            SettingsAction::SetServer { url } => {
                let updated = AppSettings {
                    server_url: url.trim_end_matches('/').to_string(),
                    ..loaded
                };
                save_updated_settings(updated)?;
            }
            SettingsAction::SetDelimiter { delimiter } => {
                let updated = AppSettings {
                    send_delimiter: delimiter,
                    ..loaded
                };
                save_updated_settings(updated)?;
            }
        },
    }

    Ok(())
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        if let Some(app) = e.downcast_ref::<AppError>() {
            if app.is_network_class() {
                eprintln!("Error: {app}");
                eprintln!("The server may be unreachable; check the connection and retry.");
                process::exit(1);
            }
        }
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
