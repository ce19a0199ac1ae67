use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use dotenvy::dotenv;
use tracing::{error, info, warn};

mod cli;
mod config;
mod credentials;
mod db;
mod error;
mod export;
mod llm;
mod models;
mod pipeline;
mod session;
mod state;
mod utils;

use cli::{Command, IdentitySource, KeyCommand, RunArgs, RunStep};
use config::CONFIG;
use credentials::CredentialProvider;
use db::database::Database;
use llm::{GeminiClient, GeminiSettings};
use models::{Persona, ReferenceImage, StoryBatch};
use session::Session;
use utils::logging::{init_logging, read_recent_log_lines, LogStream};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    let args: Vec<String> = std::env::args().collect();
    let command = cli::parse_args(&args)?;
    if command == Command::Help {
        println!("{}", cli::usage());
        return Ok(());
    }
    if let Command::Logs { stream, lines } = command {
        return print_logs(stream, lines);
    }

    let _guards = init_logging();
    let db = Database::init(&CONFIG.database_url).await?;
    db.health_check().await?;
    let credentials = CredentialProvider::load(db, &CONFIG.gemini_api_key).await?;
    let client = GeminiClient::new(credentials.clone(), GeminiSettings::from_config(&CONFIG));
    let session = Session::new(Arc::new(client), credentials.clone(), CONFIG.success_hold());

    match command {
        Command::Key(key) => run_key_command(&session, &credentials, key).await,
        Command::Run(run) => run_session(&session, run).await,
        Command::Logs { .. } | Command::Help => Ok(()),
    }
}

fn print_logs(stream: LogStream, lines: usize) -> Result<()> {
    match read_recent_log_lines(stream, lines)? {
        Some(tail) => {
            println!("== {} ==", tail.path.display());
            for line in tail.lines {
                println!("{line}");
            }
        }
        None => println!("No log files found."),
    }
    Ok(())
}

async fn run_key_command(
    session: &Session,
    credentials: &CredentialProvider,
    command: KeyCommand,
) -> Result<()> {
    let present = match command {
        KeyCommand::Status => session.check_credential(),
        KeyCommand::Set(value) => session.save_credential(&value).await?,
        KeyCommand::Clear => session.clear_credential().await?,
    };

    let status = if credentials.has_stored_credential() {
        "stored user key"
    } else if present {
        "environment key"
    } else {
        "missing"
    };
    println!("API key: {status}");
    Ok(())
}

fn print_persona(persona: &Persona) {
    println!("{} ({}, {})", persona.nickname, persona.age, persona.occupation);
    println!("  Personality: {}", persona.personality);
    println!("  Lifestyle:   {}", persona.lifestyle);
    println!("  Vibe:        {}", persona.vibe);
    println!("  {}", persona.description);
    println!("  {}", persona.hashtags.join(" "));
}

fn print_batch(batch: &StoryBatch) {
    println!(
        "[{}] {} - {} image(s)",
        batch.id,
        batch.scenario,
        batch.images.len()
    );
    for frame in &batch.dropped {
        println!("  dropped frame {}: {} ({})", frame.index + 1, frame.prompt, frame.reason);
    }
}

async fn run_session(session: &Session, run: RunArgs) -> Result<()> {
    if !session.snapshot().has_credential {
        return Err(anyhow!(
            "Valid API Key is required to generate content. Run `persona_studio key set <value>` or set GEMINI_API_KEY."
        ));
    }
    let out_dir = run.out_dir.unwrap_or_else(|| CONFIG.output_dir.clone());
    info!(steps = run.steps.len(), out_dir = %out_dir.display(), "Starting session run");

    let outcome = run_steps(session, &run.source, &run.steps, &out_dir).await;
    let snapshot = session.snapshot();
    let images: usize = snapshot.stories.iter().map(|batch| batch.images.len()).sum();
    info!(
        phase = ?snapshot.phase,
        batches = snapshot.stories.len(),
        images,
        "Session run finished"
    );
    if let Err(err) = &outcome {
        if let Some(notice) = snapshot.error.as_ref() {
            error!(error = %err, "Session run failed");
            eprintln!("{}", notice.message);
            if snapshot.needs_credential_update() {
                eprintln!("Update the API key with `persona_studio key set <value>`.");
            }
        }
    }
    outcome
}

async fn save_reference(reference: &ReferenceImage, out_dir: &Path) -> Result<()> {
    let path = export::export_reference(reference, out_dir).await?;
    println!("Reference portrait saved to {}", path.display());
    Ok(())
}

async fn run_steps(
    session: &Session,
    source: &IdentitySource,
    steps: &[RunStep],
    out_dir: &Path,
) -> Result<()> {
    let persona = match source {
        IdentitySource::Photo(path) => session.upload_photo_file(path).await?,
        IdentitySource::Create(attrs) => match session.create_persona(attrs).await {
            Ok((reference, persona)) => {
                save_reference(&reference, out_dir).await?;
                persona
            }
            Err(err) => {
                // The portrait may have been generated before analysis failed.
                if let Some(reference) = session.snapshot().reference {
                    save_reference(&reference, out_dir).await?;
                }
                return Err(err.into());
            }
        },
    };
    print_persona(&persona);

    if steps.is_empty() {
        warn!("No --story or --studio steps requested");
    }
    for step in steps {
        let batch = match step {
            RunStep::Story { scenario } => session.generate_story(scenario.as_deref()).await?,
            RunStep::Studio(settings) => session.generate_studio(settings).await?,
        };
        print_batch(&batch);
        for path in export::export_batch(&batch, None, out_dir).await? {
            println!("  saved {}", path.display());
        }
    }
    Ok(())
}
