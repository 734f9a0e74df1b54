use std::error::Error as StdError;
use std::io::ErrorKind;

use crate::error::ChatError;

fn error_chain_matches(
    err: &(dyn StdError + 'static),
    kind: ErrorKind,
    needle: &str,
) -> bool {
    let mut current: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(source) = current {
        if let Some(io_err) = source.downcast_ref::<std::io::Error>()
            && io_err.kind() == kind
        {
            return true;
        }

        if source.to_string().to_ascii_lowercase().contains(needle) {
            return true;
        }

        current = source.source();
    }

    false
}

fn error_chain_has_connection_refused(err: &(dyn StdError + 'static)) -> bool {
    error_chain_matches(err, ErrorKind::ConnectionRefused, "connection refused")
}

fn error_chain_has_timeout(err: &(dyn StdError + 'static)) -> bool {
    error_chain_matches(err, ErrorKind::TimedOut, "timed out")
}

pub(crate) fn transport_error(
    err: reqwest::Error,
    api_url: &str,
    timeout_secs: Option<u64>,
) -> ChatError {
    if err.is_timeout() || error_chain_has_timeout(&err) {
        let after = timeout_secs
            .map(|secs| format!(" after {secs}s"))
            .unwrap_or_default();
        return ChatError::Transport(format!(
            "Chat request timed out{after} while calling '{api_url}': {err}. \
             Set SLM_TIMEOUT_SECS or check API responsiveness."
        ));
    }

    if err.is_connect() {
        if error_chain_has_connection_refused(&err) {
            return ChatError::Transport(format!(
                "Connection refused by chat API at '{api_url}': {err}. \
                 Check OPENAI_BASE_URL."
            ));
        }

        return ChatError::Transport(format!(
            "Failed to connect to chat API at '{api_url}': {err}. \
             Check OPENAI_BASE_URL and network connectivity."
        ));
    }

    ChatError::Transport(format!("Failed to call chat API at '{api_url}': {err}"))
}
