use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("OPENAI_API_KEY not set")]
    MissingCredential,
    #[error("prompt could not be read from stdin")]
    PromptRead(#[source] io::Error),
    #[error("prompt is empty")]
    EmptyPrompt,
    #[error("could not determine history location; set SLM_HISTORY_FILE or HOME")]
    HistoryLocation,
}

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("creating history directory '{}'", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("opening history file '{}'", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("writing history file '{}'", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("encoding chat request")]
    Encode(#[source] serde_json::Error),
    #[error("encoding chat request: temperature must be a finite number, got {0}")]
    InvalidTemperature(f64),
    #[error("{0}")]
    Transport(String),
    #[error("reading chat response body")]
    Body(#[source] reqwest::Error),
    #[error("API error: status {status}, body: {body}")]
    Status { status: u16, body: String },
    #[error("API error: {0}")]
    Api(String),
    #[error("decoding chat response")]
    Decode(#[source] serde_json::Error),
    #[error("no choices in response")]
    EmptyResponse,
}
