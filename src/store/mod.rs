use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::LLMError;
use crate::history::{ConversationState, Turn};

/// Colour scheme preference of the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    #[default]
    Dark,
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Theme::Light => f.write_str("light"),
            Theme::Dark => f.write_str("dark"),
        }
    }
}

impl FromStr for Theme {
    type Err = LLMError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            _ => Err(LLMError::InvalidRequest(format!("Unknown theme: {s}"))),
        }
    }
}

/// A stored conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationRecord {
    pub id: String,
    pub title: String,
    pub messages: Vec<Turn>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoreData {
    #[serde(default)]
    conversations: Vec<ConversationRecord>,
    #[serde(default)]
    custom_instructions: String,
    #[serde(default)]
    voice: Option<String>,
    #[serde(default)]
    theme: Theme,
}

/// Client-local state kept in a JSON file.
///
/// Read once on open and written back after every change. Holds the conversation list
/// (most recently saved first), custom instructions, the selected voice and the theme.
#[derive(Debug)]
pub struct ConversationStore {
    data: StoreData,
    file_path: PathBuf,
}

impl ConversationStore {
    /// `~/.llm-dispatch/state.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".llm-dispatch").join("state.json"))
    }

    /// Opens the store at [`ConversationStore::default_path`].
    pub fn open_default() -> io::Result<Self> {
        let path = Self::default_path().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "Could not find home directory")
        })?;
        Self::open(path)
    }

    /// Opens the store at `path`, creating its directory. A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> io::Result<Self> {
        let file_path = path.into();
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut store = ConversationStore {
            data: StoreData::default(),
            file_path,
        };
        store.load_file()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    fn load_file(&mut self) -> io::Result<()> {
        match File::open(&self.file_path) {
            Ok(mut file) => {
                let mut contents = String::new();
                file.read_to_string(&mut contents)?;
                self.data = serde_json::from_str(&contents).unwrap_or_else(|e| {
                    log::warn!(
                        "ignoring unreadable store {}: {e}",
                        self.file_path.display()
                    );
                    StoreData::default()
                });
                Ok(())
            }
            Err(ref e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn persist(&self) -> io::Result<()> {
        let contents = serde_json::to_string_pretty(&self.data)?;
        let mut file = File::create(&self.file_path)?;
        file.write_all(contents.as_bytes())?;
        log::trace!("saved store to {}", self.file_path.display());
        Ok(())
    }

    pub fn list(&self) -> &[ConversationRecord] {
        &self.data.conversations
    }

    pub fn get(&self, id: &str) -> Option<&ConversationRecord> {
        self.data.conversations.iter().find(|c| c.id == id)
    }

    /// Loads a stored conversation with the store's preferences applied.
    pub fn load(&self, id: &str) -> Option<ConversationState> {
        let record = self.get(id)?;
        let mut state = self.new_conversation();
        state.id = record.id.clone();
        state.title = record.title.clone();
        state.turns = record.messages.clone();
        Some(state)
    }

    /// A fresh conversation carrying the stored instructions and voice.
    pub fn new_conversation(&self) -> ConversationState {
        let mut state = ConversationState::new();
        state.custom_instructions = self.custom_instructions().map(str::to_owned);
        state.voice = self.data.voice.clone();
        state
    }

    /// Inserts or replaces the conversation and moves it to the front.
    ///
    /// Conversations without turns are not stored.
    pub fn save(&mut self, state: &ConversationState) -> io::Result<()> {
        if state.turns.is_empty() {
            return Ok(());
        }
        self.data.conversations.retain(|c| c.id != state.id);
        self.data.conversations.insert(
            0,
            ConversationRecord {
                id: state.id.clone(),
                title: state.title.clone(),
                messages: state.turns.clone(),
                updated_at: Utc::now(),
            },
        );
        self.persist()
    }

    /// Removes a conversation. Returns whether it existed.
    pub fn delete(&mut self, id: &str) -> io::Result<bool> {
        let before = self.data.conversations.len();
        self.data.conversations.retain(|c| c.id != id);
        if self.data.conversations.len() == before {
            return Ok(false);
        }
        self.persist()?;
        Ok(true)
    }

    pub fn custom_instructions(&self) -> Option<&str> {
        Some(self.data.custom_instructions.as_str()).filter(|s| !s.trim().is_empty())
    }

    pub fn set_custom_instructions(&mut self, instructions: impl Into<String>) -> io::Result<()> {
        self.data.custom_instructions = instructions.into();
        self.persist()
    }

    pub fn voice(&self) -> Option<&str> {
        self.data.voice.as_deref()
    }

    pub fn set_voice(&mut self, voice: Option<String>) -> io::Result<()> {
        self.data.voice = voice.filter(|v| !v.trim().is_empty());
        self.persist()
    }

    pub fn theme(&self) -> Theme {
        self.data.theme
    }

    pub fn set_theme(&mut self, theme: Theme) -> io::Result<()> {
        self.data.theme = theme;
        self.persist()
    }
}
