pub mod ndb;

use chrono::{SecondsFormat, Utc};
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::HistoryError;
use crate::model::{Message, MessageRole};
use ndb::{Record, RecordError, RecordReader};

const RECORD_TAG: &str = "message";
const ROLE_ATTR: &str = "role";
const CONTENT_ATTR: &str = "content";
const TIMESTAMP_ATTR: &str = "at";

/// Append-only conversation log backed by an ndb-style record file.
#[derive(Debug, Clone)]
pub struct HistoryLog {
    path: PathBuf,
}

impl HistoryLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn ensure_dir(&self) -> Result<(), HistoryError> {
        let Some(dir) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) else {
            return Ok(());
        };
        fs::create_dir_all(dir).map_err(|source| HistoryError::CreateDir {
            path: dir.to_path_buf(),
            source,
        })
    }

    /// Messages in file order. A missing or unparsable file yields no history.
    pub fn load(&self) -> Vec<Message> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no history file yet");
                return Vec::new();
            }
            Err(err) => {
                warn!(
                    path = %self.path.display(),
                    error = %err,
                    "failed to open history file; continuing without history"
                );
                return Vec::new();
            }
        };

        let records: Result<Vec<Record>, RecordError> =
            RecordReader::new(BufReader::new(file)).collect();
        match records {
            Ok(records) => {
                let messages: Vec<Message> =
                    records.iter().filter_map(message_from_record).collect();
                debug!(
                    path = %self.path.display(),
                    record_count = records.len(),
                    message_count = messages.len(),
                    "loaded conversation history"
                );
                messages
            }
            Err(err) => {
                warn!(
                    path = %self.path.display(),
                    error = %err,
                    "failed to parse history file; continuing without history"
                );
                Vec::new()
            }
        }
    }

    pub fn append(&self, prompt: &str, reply: &str) -> Result<(), HistoryError> {
        let at = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let entry = format!(
            "{}\n{}\n",
            message_record(MessageRole::User, prompt, &at),
            message_record(MessageRole::Assistant, reply, &at),
        );

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| HistoryError::Open {
                path: self.path.clone(),
                source,
            })?;
        file.write_all(entry.as_bytes())
            .map_err(|source| HistoryError::Write {
                path: self.path.clone(),
                source,
            })?;
        debug!(path = %self.path.display(), "appended conversation turn");
        Ok(())
    }
}

fn message_record(role: MessageRole, content: &str, at: &str) -> Record {
    Record::new()
        .with(RECORD_TAG, "")
        .with(ROLE_ATTR, role.as_str())
        .with(CONTENT_ATTR, content)
        .with(TIMESTAMP_ATTR, at)
}

fn message_from_record(record: &Record) -> Option<Message> {
    let raw_role = record.get(ROLE_ATTR).filter(|role| !role.is_empty())?;
    let content = record.get(CONTENT_ATTR).filter(|content| !content.is_empty())?;
    let Some(role) = MessageRole::parse(raw_role) else {
        debug!(role = %raw_role, "skipping history record with unknown role");
        return None;
    };
    Some(Message {
        role,
        content: content.to_string(),
    })
}
