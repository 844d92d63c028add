//! Line-oriented autosave driver.
//!
//! Each line typed on stdin is appended to the document as a paragraph and
//! reported as a mutation. Lines starting with `:` are commands:
//!
//! ```text
//! :offline            simulate losing connectivity
//! :online             restore connectivity (replays queued saves)
//! :save               save immediately
//! :retry              replay the offline queue
//! :checkpoint <text>  create a named revision
//! :revisions          list stored revisions
//! :status             print the save state
//! :quit               flush pending work and exit
//! ```

use std::sync::{Arc, RwLock};

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info, warn};
use tokio::io::{AsyncBufReadExt, BufReader};
use uuid::Uuid;

use quire_core::{Block, Document, Edit};
use quire_sync::{NotificationLevel, Session, SessionEvent, SessionHandle, SyncConfig};

#[derive(Parser)]
#[command(name = "quire-autosave")]
#[command(about = "Edit a Quire document from the terminal with autosave")]
#[command(version)]
struct Cli {
    /// Document to edit (a new id is generated when omitted)
    #[arg(short, long)]
    document: Option<Uuid>,

    /// Document title
    #[arg(short, long, default_value = "Untitled Paper")]
    title: String,

    /// Start from the IEEE paper template
    #[arg(long)]
    ieee: bool,

    /// Fetch the stored content from this JSON file before editing
    #[arg(long)]
    load: Option<std::path::PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();

    let cli = Cli::parse();
    let config = SyncConfig::from_env().context("reading QUIRE_* configuration")?;

    let id = cli.document.unwrap_or_else(Uuid::new_v4);
    let document = if cli.ieee {
        Document {
            id,
            title: cli.title.clone(),
            ..Document::ieee_template(config.user_id)
        }
    } else {
        Document::with_id(id, config.user_id, cli.title.clone())
    };

    let document = Arc::new(RwLock::new(document));
    let mut handle = Session::open_remote(&config, document.clone())?;
    info!("Editing document {}", handle.document_id());

    match &cli.load {
        Some(path) => {
            let raw = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("reading {}", path.display()))?;
            let content = serde_json::from_str(&raw).context("parsing stored content")?;
            handle.load_content(content).await??;
        }
        None => handle.content_loaded().await?,
    }

    if let Some(mut events) = handle.take_event_rx() {
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match event {
                    SessionEvent::Notification { level, message } => match level {
                        NotificationLevel::Info => info!("{message}"),
                        NotificationLevel::Warning => warn!("{message}"),
                        NotificationLevel::Error => error!("{message}"),
                    },
                    SessionEvent::CheckpointCreated(c) => {
                        info!("Revision {} created: {}", c.revision_number, c.summary)
                    }
                    SessionEvent::QueueDrained { replayed } => {
                        info!("Synced {replayed} offline save(s)")
                    }
                }
            }
        });
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match line.strip_prefix(':') {
            Some(command) => {
                if !run_command(&handle, command.trim()).await? {
                    break;
                }
            }
            None => {
                {
                    let mut doc = document.write().unwrap_or_else(|e| e.into_inner());
                    let index = doc.content.len();
                    doc.apply(Edit::InsertBlock {
                        index,
                        block: Block::paragraph(line),
                    })?;
                }
                handle.notify_mutation().await?;
            }
        }
    }

    let report = handle.close().await?;
    print_state(&report.state)?;
    if report.discarded > 0 {
        anyhow::bail!("{} offline save(s) were never synced", report.discarded);
    }
    Ok(())
}

/// Returns `false` when the driver should exit.
async fn run_command(handle: &SessionHandle, command: &str) -> Result<bool> {
    let (name, arg) = command.split_once(' ').unwrap_or((command, ""));
    match name {
        "offline" => handle.set_online(false).await?,
        "online" => handle.set_online(true).await?,
        "save" => print_state(&handle.save_now().await?)?,
        "retry" => print_state(&handle.retry_queue().await?)?,
        "status" => {
            print_state(&handle.state())?;
            println!("queued: {}", handle.queue_len().await?);
        }
        "checkpoint" => {
            let summary = if arg.is_empty() { "Manual checkpoint" } else { arg };
            match handle.create_checkpoint(summary).await? {
                Ok(c) => println!("revision {}", c.revision_number),
                Err(e) => error!("Checkpoint failed: {e}"),
            }
        }
        "revisions" => match handle.list_revisions().await {
            Ok(history) => {
                for c in history.iter() {
                    println!("{:>4}  {}  {}", c.revision_number, c.created_at, c.summary);
                }
            }
            Err(e) => error!("Could not list revisions: {e}"),
        },
        "quit" | "q" => return Ok(false),
        other => warn!("Unknown command :{other}"),
    }
    Ok(true)
}

fn print_state(state: &quire_sync::SaveState) -> Result<()> {
    println!("{}", serde_json::to_string(state)?);
    Ok(())
}
