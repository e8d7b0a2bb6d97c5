//! Interactive chat module for confab.
//!
//! Provides a REPL-style chat interface over the controller. Responses are
//! streamed token-by-token through the CLI renderer; session management is
//! exposed as `:commands` on the same input line.

use std::io::{BufRead, Write};

use anyhow::Result;

use crate::backend::{BackendClient, BackendConfig};
use crate::config::Config;
use crate::controller::Controller;
use crate::log::LogState;
use crate::renderer::CliRenderer;
use crate::stream::{SendOptions, StreamStatus};
use crate::transcript;

const QUIT_COMMAND: &str = ":q";
const PROMPT_PREFIX: &str = "you> ";

/// Builds a controller wired to the CLI renderer.
pub fn build_controller(config: &Config, backend_url: Option<&str>) -> Result<Controller> {
    let backend_config =
        BackendConfig::resolve(backend_url.or_else(|| config.effective_backend_url()))?;
    let client = BackendClient::new(backend_config);
    let sink = CliRenderer::new().into_sink();
    Ok(Controller::new(client, sink))
}

/// Picks a usable model: explicit override, configured default, or the first
/// model the bridge reports.
async fn resolve_model<W: Write>(
    output: &mut W,
    controller: &Controller,
    opts: &mut SendOptions,
    model_override: Option<String>,
) -> Result<()> {
    if let Some(model) = model_override {
        opts.model = model;
    }
    if !opts.model.trim().is_empty() {
        return Ok(());
    }

    match controller.models().await {
        Ok(models) if !models.is_empty() => {
            opts.model = models[0].name.clone();
            writeln!(output, "Using model: {}", opts.model)?;
        }
        Ok(_) => {
            writeln!(output, "Warning: the bridge reports no models.")?;
        }
        Err(e) => {
            writeln!(output, "Warning: could not load models: {}", e)?;
        }
    }
    Ok(())
}

/// Runs the chat loop with stdin/stdout.
pub async fn run_interactive_chat(
    config: &Config,
    backend_url: Option<&str>,
    model_override: Option<String>,
) -> Result<()> {
    let controller = build_controller(config, backend_url)?;
    let mut opts = SendOptions::from_config(config);

    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();

    controller.refresh_sessions().await?;
    resolve_model(&mut stdout, &controller, &mut opts, model_override).await?;

    writeln!(stdout, "confab chat (type :q to quit)")?;
    if let Some(session) = controller.current_session() {
        writeln!(stdout, "Session: {}", session.name)?;
    } else {
        writeln!(stdout, "No sessions yet. Use :new to create one.")?;
    }

    run_chat(stdin.lock(), &mut stdout, &controller, opts).await
}

/// Runs the interactive chat loop.
///
/// Reads user input from `input`, writes prompts and status to `output`;
/// streamed assistant text goes through the controller's event sink. Exits
/// on `:q` or EOF.
pub async fn run_chat<R, W>(
    input: R,
    output: &mut W,
    controller: &Controller,
    mut opts: SendOptions,
) -> Result<()>
where
    R: BufRead,
    W: Write,
{
    let mut lines = input.lines();

    write!(output, "{}", PROMPT_PREFIX)?;
    output.flush()?;

    while let Some(line) = lines.next() {
        let line = line?;
        let trimmed = line.trim();

        if trimmed == QUIT_COMMAND {
            writeln!(output, "Goodbye!")?;
            break;
        }

        if trimmed.is_empty() {
            write!(output, "{}", PROMPT_PREFIX)?;
            output.flush()?;
            continue;
        }

        if let Some(command) = trimmed.strip_prefix(':') {
            let (name, arg) = split_command(command);
            match name {
                "new" => report(output, controller.create_session().await.map(|_| ()))?,
                "rename" => {
                    if arg.is_empty() {
                        writeln!(output, "Usage: :rename <name>")?;
                    } else {
                        report(output, controller.rename_session(arg).await)?;
                    }
                }
                "delete" => {
                    // Destructive; confirm on the same input stream.
                    write!(output, "Delete this session? [y/N] ")?;
                    output.flush()?;
                    let confirm = lines.next().transpose()?.unwrap_or_default();
                    if confirm.trim().eq_ignore_ascii_case("y") {
                        report(output, controller.delete_session().await)?;
                    } else {
                        writeln!(output, "Cancelled.")?;
                    }
                }
                "reset" => report(output, controller.reset_session().await)?,
                "sessions" => {
                    let current = controller.current_session_id();
                    for session in controller.sessions() {
                        let marker = if current.as_deref() == Some(session.id.as_str()) {
                            "*"
                        } else {
                            " "
                        };
                        writeln!(output, "{} {}  {}", marker, session.id, session.name)?;
                    }
                }
                "switch" => {
                    if arg.is_empty() {
                        writeln!(output, "Usage: :switch <session-id>")?;
                    } else {
                        match controller.switch_session(arg).await {
                            Ok(()) => writeln!(output, "{}", format_log(controller))?,
                            Err(e) => writeln!(output, "Error: {}", e)?,
                        }
                    }
                }
                "models" => match controller.models().await {
                    Ok(models) => {
                        for model in models {
                            writeln!(output, "{}", model.describe())?;
                        }
                    }
                    Err(e) => writeln!(output, "Error: {}", e)?,
                },
                "model" => {
                    if arg.is_empty() {
                        writeln!(output, "Model: {}", opts.model)?;
                    } else {
                        // The bridge 404s on unknown models, so this doubles
                        // as validation.
                        match controller.model_info(arg).await {
                            Ok(info) => {
                                opts.model = info.name.clone();
                                writeln!(output, "Model set to {}", info.describe())?;
                            }
                            Err(e) => writeln!(output, "Error: {}", e)?,
                        }
                    }
                }
                "system" => {
                    let prompt = (!arg.is_empty()).then(|| arg.to_string());
                    let cleared = prompt.is_none();
                    controller.set_session_system_prompt(prompt);
                    if cleared {
                        writeln!(output, "System prompt override cleared.")?;
                    } else {
                        writeln!(output, "System prompt set for this session.")?;
                    }
                }
                "regen" => match controller.last_assistant_index() {
                    Some(index) => {
                        report(output, controller.regenerate(index, &opts).await.map(|_| ()))?;
                    }
                    None => writeln!(output, "Nothing to regenerate.")?,
                },
                "import" => {
                    if arg.is_empty() {
                        writeln!(output, "Usage: :import <file>")?;
                    } else {
                        // Validate the file before the bridge sees anything.
                        match transcript::read_transcript(std::path::Path::new(arg)) {
                            Ok(messages) => {
                                report(output, controller.import_messages(messages).await)?;
                            }
                            Err(e) => writeln!(output, "Error: {}", e)?,
                        }
                    }
                }
                "export" => {
                    if arg.is_empty() {
                        writeln!(output, "Usage: :export <file>")?;
                    } else {
                        match controller.export_messages().await {
                            Ok(messages) => {
                                let path = std::path::Path::new(arg);
                                match transcript::write_transcript(path, &messages) {
                                    Ok(()) => writeln!(
                                        output,
                                        "Exported {} messages to {}",
                                        messages.len(),
                                        arg
                                    )?,
                                    Err(e) => writeln!(output, "Error: {}", e)?,
                                }
                            }
                            Err(e) => writeln!(output, "Error: {}", e)?,
                        }
                    }
                }
                _ => writeln!(output, "Unknown command: :{}", name)?,
            }
        } else if let Err(e) = controller.send(trimmed, &opts).await {
            writeln!(output, "Error: {}", e)?;
        }

        write!(output, "{}", PROMPT_PREFIX)?;
        output.flush()?;
    }

    Ok(())
}

/// One-shot prompt execution: stream a single exchange and exit.
pub async fn run_exec(
    config: &Config,
    backend_url: Option<&str>,
    session: Option<&str>,
    prompt: &str,
    model_override: Option<String>,
) -> Result<()> {
    let controller = build_controller(config, backend_url)?;
    let mut opts = SendOptions::from_config(config);

    controller.refresh_sessions().await?;
    if let Some(id) = session {
        controller.switch_session(id).await?;
    } else if controller.current_session().is_none() {
        controller.create_session().await?;
    }

    let mut status_out = std::io::stderr();
    resolve_model(&mut status_out, &controller, &mut opts, model_override).await?;

    match controller.send(prompt, &opts).await? {
        Some(state) if state.status == StreamStatus::Complete => Ok(()),
        Some(state) => {
            let detail = state
                .error
                .unwrap_or_else(|| "stream did not complete".to_string());
            anyhow::bail!("{}", detail)
        }
        None => anyhow::bail!("Empty prompt"),
    }
}

/// Formats the cached log for display, marking provisional entries.
pub fn format_log(controller: &Controller) -> String {
    match controller.log_state() {
        LogState::NotLoaded => "(history not loaded)".to_string(),
        LogState::Empty => "(no messages yet)".to_string(),
        LogState::Loaded => {
            let mut out = String::new();
            for entry in controller.log_entries() {
                let role = match entry.message.role {
                    crate::log::Role::User => "you",
                    crate::log::Role::Assistant => "assistant",
                };
                let marker = if entry.provisional { "~" } else { " " };
                out.push_str(&format!("{}{}> {}\n", marker, role, entry.message.content));
            }
            out.trim_end().to_string()
        }
    }
}

/// Splits `name arg...` into the command name and its argument remainder.
fn split_command(command: &str) -> (&str, &str) {
    match command.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (command, ""),
    }
}

/// Writes an operation failure to the output without aborting the REPL.
fn report<W: Write>(output: &mut W, result: Result<()>) -> Result<()> {
    if let Err(e) = result {
        writeln!(output, "Error: {}", e)?;
    }
    Ok(())
}
