use anyhow::{bail, Context};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use ledger_notes::present::{self, PREVIEW_LEN};
use ledger_notes::{
    DeleteOutcome, DeletePrompt, Note, NotesConfig, NotesError, SessionController, SortKey,
};

#[derive(Parser)]
#[command(name = "ledger-notes")]
#[command(about = "Personal notes stored in a ledger contract")]
#[command(version)]
struct Cli {
    /// JSON-RPC endpoint of the node holding your account
    #[arg(long, global = true)]
    rpc_url: Option<String>,

    /// Address of the deployed notes contract
    #[arg(long, global = true)]
    contract: Option<String>,

    /// Account to use when the signer exposes several
    #[arg(long, global = true)]
    account: Option<String>,

    /// Compiled contract artifact (JSON with an `abi` array)
    #[arg(long, global = true)]
    abi: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List notes of the connected account
    List {
        /// Only notes whose title or content contains this text
        #[arg(long, short, default_value = "")]
        search: String,

        /// newest, oldest or title
        #[arg(long, default_value_t = SortKey::Newest)]
        sort: SortKey,
    },
    /// Show one note in full
    Show {
        position: u64,

        /// Print the content as HTML
        #[arg(long)]
        html: bool,
    },
    /// Create a note and wait for it to be confirmed
    Add { title: String, content: String },
    /// Delete a note and wait for it to be confirmed
    Delete {
        position: u64,

        /// Do not ask for confirmation
        #[arg(long, short)]
        yes: bool,
    },
    /// Print the connected account
    Account,
}

/// Asks on the terminal before deleting
struct TerminalPrompt {
    assume_yes: bool,
}

#[async_trait]
impl DeletePrompt for TerminalPrompt {
    async fn confirm_delete(&self, note: &Note) -> bool {
        if self.assume_yes {
            return true;
        }

        let question = format!("Delete \"{}\"? [y/N] ", note.title);
        let answer = tokio::task::spawn_blocking(move || {
            print!("{}", question);
            io::stdout().flush().ok();
            let mut line = String::new();
            io::stdin().lock().read_line(&mut line).map(|_| line)
        })
        .await;

        match answer {
            Ok(Ok(line)) => matches!(line.trim().to_lowercase().as_str(), "y" | "yes"),
            _ => false,
        }
    }
}

impl Cli {
    fn config(&self) -> NotesConfig {
        let mut config = NotesConfig::from_env();
        if let Some(url) = &self.rpc_url {
            config.rpc_url = url.clone();
        }
        if let Some(contract) = &self.contract {
            config.contract_address = Some(contract.clone());
        }
        if let Some(account) = &self.account {
            config.account = Some(account.clone());
        }
        if let Some(abi) = &self.abi {
            config.abi_path = Some(abi.clone());
        }
        config
    }
}

fn print_note_row(note: &Note, now: chrono::DateTime<chrono::Utc>) {
    println!(
        "[{}] {}  ({})",
        note.position,
        note.title,
        present::relative_time(note.timestamp, now)
    );
    println!("    {}", present::preview(&note.content, PREVIEW_LEN).replace('\n', " "));
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let result = run(Cli::parse()).await;
    if let Err(e) = &result {
        let retryable = e
            .chain()
            .filter_map(|cause| cause.downcast_ref::<NotesError>())
            .any(|cause| cause.is_retryable());
        if retryable {
            eprintln!("💡 This may succeed if you run the command again");
        }
    }
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = cli.config();

    let mut session =
        SessionController::from_config(&config).context("Invalid notes configuration")?;
    let account = session
        .connect()
        .await
        .context("Failed to connect to the notes contract")?;

    // Commands that read the collection need the initial load to have worked
    let load_error = session
        .repository()
        .and_then(|repo| repo.status().last_error);

    match cli.command {
        Commands::Account => {
            println!("{}", account);
            println!("short:    {}", present::short_address(&account));
            println!("contract: {}", session.contract_address());
        }

        Commands::List { search, sort } => {
            if let Some(e) = load_error {
                bail!(e);
            }
            session.set_search(search);
            session.set_sort(sort);

            let notes = session.visible_notes();
            println!(
                "{} · {} note(s)",
                present::short_address(&account),
                session.snapshot().len()
            );
            if notes.is_empty() {
                println!("{}", present::empty_state(session.view()));
            }
            let now = chrono::Utc::now();
            for note in &notes {
                print_note_row(note, now);
            }
        }

        Commands::Show { position, html } => {
            if let Some(e) = load_error {
                bail!(e);
            }
            let note = session.select(position)?;
            println!("{}", note.title);
            println!("{}", present::full_time(note.timestamp));
            println!();
            if html {
                println!("{}", present::render_markdown(&note.content));
            } else {
                println!("{}", note.content);
            }
        }

        Commands::Add { title, content } => {
            session.open_editor();
            let snapshot = session.add_note(&title, &content).await?;
            println!("✅ Note added ({} total)", snapshot.len());
        }

        Commands::Delete { position, yes } => {
            if let Some(e) = load_error {
                bail!(e);
            }
            let prompt = TerminalPrompt { assume_yes: yes };
            match session.delete_note(position, &prompt).await? {
                DeleteOutcome::Deleted(snapshot) => {
                    println!("✅ Note deleted ({} left)", snapshot.len())
                }
                DeleteOutcome::Declined => println!("Cancelled"),
            }
        }
    }

    session.disconnect();
    Ok(())
}
