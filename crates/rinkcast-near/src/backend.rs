// The seam between a match session and the game contract.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use rinkcast_core::event::LogRecord;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// The backend could not be reached or answered with something that is
    /// not a usable payload. Transient: the caller retries later.
    #[error("backend unavailable: {0}")]
    RemoteUnavailable(String),

    #[error("not supported: {0}")]
    Unsupported(String),
}

// ---------------------------------------------------------------------------
// Domain types
// ---------------------------------------------------------------------------

/// An ongoing match between two accounts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameSession {
    pub game_id: u64,
    pub players: (String, String),
}

impl GameSession {
    pub fn includes(&self, account_id: &str) -> bool {
        self.players.0 == account_id || self.players.1 == account_id
    }

    /// The other participant, if `account_id` plays in this game.
    pub fn opponent_of(&self, account_id: &str) -> Option<&str> {
        if self.players.0 == account_id {
            Some(self.players.1.as_str())
        } else if self.players.1 == account_id {
            Some(self.players.0.as_str())
        } else {
            None
        }
    }
}

/// Commands a manager can issue to their team during a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeamCommand {
    TakeTimeout,
    CoachSpeech,
    GoalieOut,
    GoalieBack,
}

impl TeamCommand {
    /// Contract change method carrying this command.
    pub fn method_name(self) -> &'static str {
        match self {
            TeamCommand::TakeTimeout => "take_to",
            TeamCommand::CoachSpeech => "coach_speech",
            TeamCommand::GoalieOut => "goalie_out",
            TeamCommand::GoalieBack => "goalie_back",
        }
    }
}

// ---------------------------------------------------------------------------
// Backend trait
// ---------------------------------------------------------------------------

#[async_trait]
pub trait GameBackend: Send + Sync {
    /// Games currently in progress, with their participants.
    async fn available_games(&self) -> Result<Vec<GameSession>, BackendError>;

    /// The full event log of `game_id`, from the first event.
    async fn fetch_events(&self, game_id: u64) -> Result<Vec<LogRecord>, BackendError>;

    async fn submit_command(&self, game_id: u64, command: TeamCommand)
        -> Result<(), BackendError>;
}

// ---------------------------------------------------------------------------
// Payload parsing
// ---------------------------------------------------------------------------

/// Parse the contract's game listing.
///
/// Expected shape: `[[game_id, ["player_1", "player_2"]], ...]`
pub fn parse_available_games(value: &Value) -> Result<Vec<GameSession>, BackendError> {
    let entries = value.as_array().ok_or_else(|| {
        BackendError::RemoteUnavailable("game listing is not an array".to_string())
    })?;

    entries
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            parse_game_entry(entry).ok_or_else(|| {
                BackendError::RemoteUnavailable(format!("malformed game listing entry {i}: {entry}"))
            })
        })
        .collect()
}

fn parse_game_entry(entry: &Value) -> Option<GameSession> {
    let game_id = entry.get(0)?.as_u64()?;
    let players = entry.get(1)?;
    let first = players.get(0)?.as_str()?;
    let second = players.get(1)?.as_str()?;
    Some(GameSession {
        game_id,
        players: (first.to_string(), second.to_string()),
    })
}
