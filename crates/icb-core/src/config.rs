use std::{
    fmt,
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::{commands::CommandRegistry, domain::User, errors::Error, Result};

/// Chat server socket endpoint used when the config file does not name one.
pub const DEFAULT_SOCKET_URL: &str = "wss://api.id3.fm/chat/socket.io/?EIO=3&transport=websocket";

/// Root key every config file nests the bot settings under.
const ROOT_KEY: &str = "id3chatbot";

/// Bot configuration: identity, commands, timed messages and moderators.
///
/// Loaded once at startup, mutated in place by admin chat commands and written
/// back to disk at shutdown.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Chat mountpoint; the same mountpoint used when streaming.
    pub mountpoint: String,
    /// The bot account's authentication token.
    pub auth_token: String,
    pub commands: CommandRegistry,
    pub timed_messages: Vec<TimedMessage>,
    /// Either a user id (decimal) or a username.
    pub mod_users: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub socket_url: Option<String>,
}

/// A message sent to the channel every `interval` milliseconds.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimedMessage {
    pub interval: u64,
    pub message: String,
}

impl fmt::Display for TimedMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\" every {} ms", self.message, self.interval)
    }
}

#[derive(Deserialize)]
struct ConfigFile {
    id3chatbot: Config,
}

#[derive(Serialize)]
struct ConfigFileRef<'a> {
    id3chatbot: &'a Config,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let txt = fs::read_to_string(path).map_err(|e| Error::ConfigUnreadable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let file: ConfigFile =
            serde_json::from_str(&txt).map_err(|e| Error::ConfigMalformed {
                path: path.to_path_buf(),
                reason: format!("expected a `{ROOT_KEY}` object: {e}"),
            })?;

        Ok(file.id3chatbot)
    }

    /// Write the config to `path` without ever leaving a half-written file.
    ///
    /// The JSON is written to a temporary file next to `path`, synced, then
    /// renamed over the destination.
    pub fn save(&self, path: &Path) -> Result<()> {
        let persistence = |reason: String| Error::Persistence {
            path: path.to_path_buf(),
            reason,
        };

        let mut txt = serde_json::to_string_pretty(&ConfigFileRef { id3chatbot: self })
            .map_err(|e| persistence(e.to_string()))?;
        txt.push('\n');

        let dir = parent_dir(path);
        let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| persistence(e.to_string()))?;
        tmp.write_all(txt.as_bytes())
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| persistence(e.to_string()))?;
        tmp.persist(path)
            .map_err(|e| persistence(e.error.to_string()))?;

        Ok(())
    }

    /// True if the moderator list holds the user's id or username (exact match).
    pub fn is_moderator(&self, user: &User) -> bool {
        let id = user.id.to_string();
        self.mod_users
            .iter()
            .any(|m| *m == id || *m == user.username)
    }

    /// Names of the mandatory settings that are still empty.
    pub fn missing_mandatory(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.mountpoint.trim().is_empty() {
            missing.push("mountpoint");
        }
        if self.auth_token.trim().is_empty() {
            missing.push("authToken");
        }
        missing
    }

    pub fn socket_url(&self) -> &str {
        self.socket_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or(DEFAULT_SOCKET_URL)
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
