//! `sightline ask` and `sightline chat`.

use std::path::{Path, PathBuf};

use anyhow::Result;
use serde_json::json;
use sightline_agent::{FinalAnswer, Orchestrator};
use sightline_core::{ActiveImage, OrchestratorError};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::session::load_image;
use crate::terminal_output::{
    detections_table, footnote, ledger_table, note_error, note_info, note_success, note_warn,
};

/// Run one exchange; Ctrl-C cancels it instead of killing the process.
async fn exchange(
    orchestrator: &Orchestrator,
    text: &str,
    image: Option<ActiveImage>,
) -> Result<FinalAnswer, OrchestratorError> {
    let cancel = CancellationToken::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };
    let result = orchestrator.handle_user_message(text, image, &cancel).await;
    watcher.abort();
    result
}

pub async fn ask(orchestrator: &Orchestrator, question: &str, image: Option<&Path>, as_json: bool) -> Result<()> {
    let image = match image {
        Some(path) => Some(load_image(path).await?),
        None => None,
    };
    let answer = exchange(orchestrator, question, image).await?;

    if as_json {
        let out = json!({
            "answer": answer,
            "detections": orchestrator.detections().await,
            "invocations": orchestrator.ledger().await,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("{}", answer.text);
        println!("{}", footnote(&rounds_footnote(&answer)));
    }
    Ok(())
}

fn rounds_footnote(answer: &FinalAnswer) -> String {
    format!(
        "[{} tool round(s), {} invocation(s)]",
        answer.tool_rounds, answer.invocations
    )
}

#[derive(Debug, PartialEq)]
enum ReplCommand {
    Say(String),
    Image(PathBuf),
    Detections,
    Ledger,
    Tools,
    Help,
    Quit,
    Empty,
    Unknown(String),
}

fn parse_command(line: &str) -> ReplCommand {
    let line = line.trim();
    if line.is_empty() {
        return ReplCommand::Empty;
    }
    let Some(rest) = line.strip_prefix('/') else {
        return ReplCommand::Say(line.to_string());
    };
    let (cmd, arg) = match rest.split_once(char::is_whitespace) {
        Some((cmd, arg)) => (cmd, arg.trim()),
        None => (rest, ""),
    };
    match cmd {
        "image" | "img" if !arg.is_empty() => ReplCommand::Image(PathBuf::from(arg)),
        "detections" | "dets" => ReplCommand::Detections,
        "ledger" => ReplCommand::Ledger,
        "tools" => ReplCommand::Tools,
        "help" | "?" => ReplCommand::Help,
        "quit" | "exit" | "q" => ReplCommand::Quit,
        _ => ReplCommand::Unknown(line.to_string()),
    }
}

const HELP: &str = "\
  /image <path>   attach a new image (clears detections)
  /detections     list detections for the current image
  /ledger         list every tool call so far
  /tools          list registered perception tools
  /quit           leave
Anything else is sent to the agent. Ctrl-C cancels a running exchange.";

pub async fn chat(orchestrator: &Orchestrator, image: Option<&Path>) -> Result<()> {
    if let Some(path) = image {
        let img = load_image(path).await?;
        note_info(&format!("Image attached: {} ({})", path.display(), img.dimensions));
        orchestrator.upload_image(img).await?;
    }
    note_info("Type a question, or /help for commands.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };

        match parse_command(&line) {
            ReplCommand::Empty => {}
            ReplCommand::Quit => break,
            ReplCommand::Help => println!("{HELP}"),
            ReplCommand::Unknown(cmd) => note_warn(&format!("Unknown command: {cmd} (try /help)")),
            ReplCommand::Tools => {
                let tools = orchestrator.dispatcher().tool_names();
                if tools.is_empty() {
                    note_warn("No perception tools are configured.");
                } else {
                    note_info(&format!("Tools: {}", tools.join(", ")));
                }
            }
            ReplCommand::Detections => {
                let dets = orchestrator.detections().await;
                if dets.is_empty() {
                    note_info("No detections for the current image yet.");
                } else {
                    print!("{}", detections_table(&dets));
                }
            }
            ReplCommand::Ledger => {
                let entries = orchestrator.ledger().await;
                if entries.is_empty() {
                    note_info("No tool calls yet.");
                } else {
                    print!("{}", ledger_table(&entries));
                }
            }
            ReplCommand::Image(path) => match load_image(&path).await {
                Ok(img) => {
                    let dims = img.dimensions;
                    orchestrator.upload_image(img).await?;
                    note_success(&format!("Now looking at {} ({dims})", path.display()));
                }
                Err(e) => note_error(&format!("{e:#}")),
            },
            ReplCommand::Say(text) => match exchange(orchestrator, &text, None).await {
                Ok(answer) => {
                    println!("{}", answer.text);
                    println!("{}", footnote(&rounds_footnote(&answer)));
                }
                Err(OrchestratorError::Cancelled) => note_warn("Cancelled."),
                Err(e) => note_error(&e.to_string()),
            },
        }
    }
    debug!("Chat session ended");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_repl_commands() {
        assert_eq!(parse_command("  what is this? "), ReplCommand::Say("what is this?".into()));
        assert_eq!(parse_command("/image  ./cat.png"), ReplCommand::Image(PathBuf::from("./cat.png")));
        assert_eq!(parse_command("/dets"), ReplCommand::Detections);
        assert_eq!(parse_command("/q"), ReplCommand::Quit);
        assert_eq!(parse_command(""), ReplCommand::Empty);
    }

    #[test]
    fn image_without_path_is_unknown() {
        assert_eq!(parse_command("/image"), ReplCommand::Unknown("/image".into()));
        assert_eq!(parse_command("/zoom 2"), ReplCommand::Unknown("/zoom 2".into()));
    }

    #[test]
    fn footnote_counts_rounds() {
        let answer = FinalAnswer {
            text: "hi".into(),
            tool_rounds: 2,
            invocations: 3,
        };
        assert_eq!(rounds_footnote(&answer), "[2 tool round(s), 3 invocation(s)]");
    }
}
