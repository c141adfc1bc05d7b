//! Operator command line over a scriptorium library.
//!
//! # Responsibility
//! - Expose document, folder, link and integrity operations for one namespace.
//! - Print every result as JSON on stdout.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use scriptorium_core::api;
use scriptorium_core::{
    default_log_level, init_logging, Library, Namespace, NamespaceKind, VaultConfig,
    WriteDurability,
};
use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "scriptorium",
    version,
    about = "Inspect and maintain a markdown document vault"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Library root holding the vault and pattern namespaces.
    #[arg(long, global = true, env = "SCRIPTORIUM_ROOT")]
    root: Option<PathBuf>,

    /// TOML config file; overrides --root.
    #[arg(long, global = true, env = "SCRIPTORIUM_CONFIG")]
    config: Option<PathBuf>,

    /// Operate on the pattern namespace instead of the vault.
    #[arg(long, global = true)]
    patterns: bool,

    /// Fsync every write.
    #[arg(long, global = true)]
    durable: bool,

    /// Log level (trace|debug|info|warn|error).
    #[arg(long, global = true, default_value_t = default_log_level().to_string())]
    log_level: String,

    /// Absolute directory for log files; logging is off when omitted.
    #[arg(long, global = true, env = "SCRIPTORIUM_LOG_DIR")]
    log_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// List documents, most recently updated first.
    List,
    /// List folders.
    Folders,
    /// Show one document.
    Show { id: String },
    /// Create a document.
    New {
        name: String,
        #[arg(long, default_value = "")]
        content: String,
        #[arg(long)]
        folder: Option<String>,
    },
    /// Create a folder.
    Mkdir {
        name: String,
        #[arg(long)]
        parent: Option<String>,
    },
    /// Documents linking to a document.
    Backlinks { id: String },
    /// Rename a document and rewrite links to its old name.
    Rename { id: String, name: String },
    /// Rename a folder.
    RenameFolder { id: String, name: String },
    /// Rewrite links from one name to another across all documents.
    Relink { old_name: String, new_name: String },
    /// Move a document; omit --to for root.
    Move {
        id: String,
        #[arg(long)]
        to: Option<String>,
    },
    /// Move a folder; omit --to for root.
    MoveFolder {
        id: String,
        #[arg(long)]
        to: Option<String>,
    },
    /// Deep-copy a folder subtree.
    Copy {
        id: String,
        #[arg(long)]
        to: Option<String>,
        #[arg(long)]
        name: Option<String>,
    },
    /// Delete a document.
    Delete { id: String },
    /// Delete a folder; non-empty folders need --recursive.
    DeleteFolder {
        id: String,
        #[arg(long)]
        recursive: bool,
    },
    /// Direct children of a folder, or of root.
    Children { folder: Option<String> },
    /// Ancestor chain of a folder.
    Path { id: String },
    /// Version history of a document.
    Versions { id: String },
    /// Make an old version current again.
    Restore { id: String, index: usize },
    /// Rebuild the backlink index from disk.
    Reindex,
    /// Report orphans, cycles and index drift.
    Check,
    /// Move orphaned records to root.
    Repair,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(log_dir) = &cli.log_dir {
        init_logging(&cli.log_level, log_dir).context("failed to initialize logging")?;
    }

    let library = Library::open(resolve_config(&cli)?).context("failed to open library")?;
    let kind = if cli.patterns {
        NamespaceKind::Patterns
    } else {
        NamespaceKind::Vault
    };
    info!("event=cli_start module=vault status=ok namespace={}", kind);
    run(cli.command, library.namespace(kind))
}

fn resolve_config(cli: &Cli) -> Result<VaultConfig> {
    let mut config = match (&cli.config, &cli.root) {
        (Some(path), _) => VaultConfig::from_toml_file(path)
            .with_context(|| format!("failed to load config `{}`", path.display()))?,
        (None, Some(root)) => VaultConfig::new(root.clone()),
        (None, None) => bail!("either --root or --config is required"),
    };
    if cli.durable {
        config = config.with_durability(WriteDurability::Durable);
    }
    Ok(config)
}

fn run(command: Command, namespace: &Namespace) -> Result<()> {
    let documents = namespace.documents();
    let tree = namespace.tree();
    match command {
        Command::List => print(&documents.list_documents()?),
        Command::Folders => print(&tree.list_folders()?),
        Command::Show { id } => print(&documents.get_document(&id)?),
        Command::New {
            name,
            content,
            folder,
        } => print(&documents.create_document(name, content, folder.as_deref())?),
        Command::Mkdir { name, parent } => print(&tree.create_folder(name, parent.as_deref())?),
        Command::Backlinks { id } => print(&api::backlinks_of(namespace, &id)?),
        Command::Rename { id, name } => print(&api::rename_and_relink(namespace, &id, &name)),
        Command::RenameFolder { id, name } => print(&tree.rename_folder(&id, &name)?),
        Command::Relink { old_name, new_name } => {
            print(&api::update_links(namespace, &old_name, &new_name))
        }
        Command::Move { id, to } => print(&documents.move_document(&id, to.as_deref())?),
        Command::MoveFolder { id, to } => print(&tree.move_folder(&id, to.as_deref())?),
        Command::Copy { id, to, name } => print(&api::copy_folder(
            namespace,
            &id,
            to.as_deref(),
            name.as_deref(),
        )),
        Command::Delete { id } => print(&api::ActionResponse::from_result(
            &documents.delete_document(&id),
        )),
        Command::DeleteFolder { id, recursive } => {
            print(&api::delete_folder(namespace, &id, recursive))
        }
        Command::Children { folder } => {
            let children = tree.list_children(folder.as_deref())?;
            print(&json!({ "folders": children.folders, "documents": children.documents }))
        }
        Command::Path { id } => print(&tree.folder_path(&id)?),
        Command::Versions { id } => print(&documents.document_versions(&id)?),
        Command::Restore { id, index } => print(&documents.restore_version(&id, index)?),
        Command::Reindex => print(&json!({ "indexed": documents.rebuild_backlinks()? })),
        Command::Check => print(&namespace.integrity().check_integrity()?),
        Command::Repair => print(&namespace.integrity().repair_orphans()?),
    }
}

fn print<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
