mod cli;

use std::path::Path;

use anyhow::Result;
use clap::Parser;

use cli::{Cli, Commands, SessionCommands};
use confab::chat;
use confab::config::Config;
use confab::transcript;

#[tokio::main]
async fn main() {
    init_tracing();

    if let Err(e) = run().await {
        eprintln!("{:#}", e); // pretty anyhow chain
        std::process::exit(1);
    }
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
}

async fn run() -> Result<()> {
    let Cli {
        command,
        backend_url,
        model,
    } = Cli::parse();
    let config = Config::load()?;
    let backend_url = backend_url.as_deref();

    match command.unwrap_or(Commands::Chat) {
        Commands::Chat => chat::run_interactive_chat(&config, backend_url, model).await,
        Commands::Exec { prompt, session } => {
            chat::run_exec(&config, backend_url, session.as_deref(), &prompt, model).await
        }
        Commands::Sessions {
            command: SessionCommands::List,
        } => sessions_list(&config, backend_url).await,
        Commands::Models => models_list(&config, backend_url).await,
        Commands::Import { session, file } => {
            import(&config, backend_url, session.as_deref(), &file).await
        }
        Commands::Export { session, file } => {
            export(&config, backend_url, session.as_deref(), &file).await
        }
    }
}

async fn sessions_list(config: &Config, backend_url: Option<&str>) -> Result<()> {
    let controller = chat::build_controller(config, backend_url)?;
    let sessions = controller.refresh_sessions().await?;
    let current = controller.current_session_id();

    for session in sessions {
        let marker = if current.as_deref() == Some(session.id.as_str()) {
            "*"
        } else {
            " "
        };
        println!("{} {}  {}", marker, session.id, session.name);
    }
    Ok(())
}

async fn models_list(config: &Config, backend_url: Option<&str>) -> Result<()> {
    let controller = chat::build_controller(config, backend_url)?;
    for model in controller.models().await? {
        println!("{}", model.describe());
    }
    Ok(())
}

async fn import(
    config: &Config,
    backend_url: Option<&str>,
    session: Option<&str>,
    file: &Path,
) -> Result<()> {
    // Validate the payload before anything touches the bridge.
    let messages = transcript::read_transcript(file)?;

    let controller = chat::build_controller(config, backend_url)?;
    controller.refresh_sessions().await?;
    if let Some(id) = session {
        controller.switch_session(id).await?;
    }
    controller.import_messages(messages).await
}

async fn export(
    config: &Config,
    backend_url: Option<&str>,
    session: Option<&str>,
    file: &Path,
) -> Result<()> {
    let controller = chat::build_controller(config, backend_url)?;
    controller.refresh_sessions().await?;
    if let Some(id) = session {
        controller.switch_session(id).await?;
    }

    let messages = controller.export_messages().await?;
    transcript::write_transcript(file, &messages)?;
    println!("Exported {} messages to {}", messages.len(), file.display());
    Ok(())
}
