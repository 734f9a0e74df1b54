use anyhow::{Context, Result};
use std::io::Write;
use tracing::debug;

use crate::config::Config;
use crate::gateway::ChatGateway;
use crate::history::HistoryLog;
use crate::model::Message;

pub fn build_messages(
    history: Vec<Message>,
    system_prompt: Option<&str>,
    prompt: &str,
) -> Vec<Message> {
    let mut messages = history;
    if let Some(system_prompt) = system_prompt.filter(|value| !value.is_empty()) {
        messages.push(Message::system(system_prompt));
    }
    messages.push(Message::user(prompt));
    messages
}

/// Runs one turn: optional history load, a single chat call, print, optional append.
pub async fn run_once<G: ChatGateway>(
    gateway: &G,
    cfg: &Config,
    out: &mut impl Write,
) -> Result<()> {
    let log = cfg
        .history_path
        .as_deref()
        .filter(|_| cfg.continue_conversation)
        .map(HistoryLog::new);

    let history = match &log {
        Some(log) => {
            log.ensure_dir()?;
            log.load()
        }
        None => Vec::new(),
    };
    debug!(history_len = history.len(), "prepared conversation");

    let messages = build_messages(history, cfg.system_prompt.as_deref(), &cfg.prompt);
    let reply = gateway.chat(&messages).await?;

    writeln!(out, "{reply}").context("Failed to write reply to stdout")?;
    out.flush().context("Failed to flush stdout")?;

    if let Some(log) = &log {
        log.append(&cfg.prompt, &reply)?;
    }
    Ok(())
}
