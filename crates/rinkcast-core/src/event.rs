// Match event model and decoding.
//
// The game contract returns its event log as a JSON array of loosely typed
// records. Each record is decoded exactly once, here, into a closed
// `MatchEvent`. A record that fits no known shape becomes a `MalformedEvent`
// that keeps its position in the log, so local indices stay aligned with the
// backend's.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedEvent {
    #[error("event record has an invalid shape: {message}")]
    InvalidShape { message: String },

    #[error("unknown action `{action}`")]
    UnknownAction { action: String },

    #[error("action `{action}` has no puck holder")]
    MissingPossession { action: String },
}

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

/// A player card as it appears inside an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRef {
    /// Id of the manager that fields the card. Every card of a team carries
    /// the same `user_id`, which is what possession is decided on.
    pub user_id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub number: Option<u8>,
}

/// Score and on-ice roster of one team at the moment an event was produced.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TeamSnapshot {
    pub score: u32,
    #[serde(default)]
    pub goalie: Option<PlayerRef>,
    #[serde(default, alias = "field_players")]
    pub skaters: Vec<PlayerRef>,
}

impl TeamSnapshot {
    /// The manager id this team plays under. Falls back to the skaters when
    /// the goalie has been pulled.
    pub fn owner_id(&self) -> Option<i64> {
        self.goalie
            .as_ref()
            .or_else(|| self.skaters.first())
            .map(|p| p.user_id)
    }
}

/// Which side of the matchup, seen from the local account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Own,
    Opponent,
}

// ---------------------------------------------------------------------------
// Event kinds
// ---------------------------------------------------------------------------

/// In-play actions the contract can emit besides the structural events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionKind {
    Pass,
    Shot,
    Move,
    Hit,
    Dump,
    Battle,
    Save,
    Rebound,
    Takeaway,
    Giveaway,
    Penalty,
    TakeTimeout,
    CoachSpeech,
    GoalieOut,
    GoalieBack,
}

impl ActionKind {
    /// Parse the contract's action tag.
    pub fn from_name(name: &str) -> Option<Self> {
        let kind = match name {
            "Pass" => ActionKind::Pass,
            "Shot" => ActionKind::Shot,
            "Move" => ActionKind::Move,
            "Hit" => ActionKind::Hit,
            "Dump" => ActionKind::Dump,
            "Battle" => ActionKind::Battle,
            "Save" => ActionKind::Save,
            "Rebound" => ActionKind::Rebound,
            "Takeaway" => ActionKind::Takeaway,
            "Giveaway" => ActionKind::Giveaway,
            "Penalty" => ActionKind::Penalty,
            "TakeTO" => ActionKind::TakeTimeout,
            "CoachSpeech" => ActionKind::CoachSpeech,
            "GoalieOut" => ActionKind::GoalieOut,
            "GoalieBack" => ActionKind::GoalieBack,
            _ => return None,
        };
        Some(kind)
    }

    /// The contract's action tag for this kind.
    pub fn name(self) -> &'static str {
        match self {
            ActionKind::Pass => "Pass",
            ActionKind::Shot => "Shot",
            ActionKind::Move => "Move",
            ActionKind::Hit => "Hit",
            ActionKind::Dump => "Dump",
            ActionKind::Battle => "Battle",
            ActionKind::Save => "Save",
            ActionKind::Rebound => "Rebound",
            ActionKind::Takeaway => "Takeaway",
            ActionKind::Giveaway => "Giveaway",
            ActionKind::Penalty => "Penalty",
            ActionKind::TakeTimeout => "TakeTO",
            ActionKind::CoachSpeech => "CoachSpeech",
            ActionKind::GoalieOut => "GoalieOut",
            ActionKind::GoalieBack => "GoalieBack",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    StartGame,
    FaceOff,
    Overtime,
    EndOfPeriod,
    Goal {
        /// Puck holder at the time of the goal, when the contract reports one.
        scorer: Option<PlayerRef>,
    },
    GameFinished,
    Action {
        action: ActionKind,
        puck_holder: PlayerRef,
        possession: Side,
    },
}

/// One decoded entry of a match's event log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchEvent {
    pub kind: EventKind,
    pub own: TeamSnapshot,
    pub opponent: TeamSnapshot,
    pub zone: Option<i8>,
    pub time: Option<u32>,
}

impl MatchEvent {
    /// `GameFinished` ends the match; nothing after it is rendered.
    pub fn is_terminal(&self) -> bool {
        matches!(self.kind, EventKind::GameFinished)
    }

    /// (own, opponent) score carried by this event.
    pub fn score(&self) -> (u32, u32) {
        (self.own.score, self.opponent.score)
    }

    /// Short human-readable tag for logs and feeds.
    pub fn label(&self) -> &'static str {
        match &self.kind {
            EventKind::StartGame => "StartGame",
            EventKind::FaceOff => "FaceOff",
            EventKind::Overtime => "Overtime",
            EventKind::EndOfPeriod => "EndOfPeriod",
            EventKind::Goal { .. } => "Goal",
            EventKind::GameFinished => "GameFinished",
            EventKind::Action { action, .. } => action.name(),
        }
    }
}

/// A log position: either a decoded event or the reason it could not be
/// decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogRecord {
    Event(MatchEvent),
    Malformed(MalformedEvent),
}

impl LogRecord {
    pub fn decode(value: Value) -> Self {
        match decode_event(value) {
            Ok(event) => LogRecord::Event(event),
            Err(e) => LogRecord::Malformed(e),
        }
    }

    pub fn as_event(&self) -> Option<&MatchEvent> {
        match self {
            LogRecord::Event(event) => Some(event),
            LogRecord::Malformed(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Wire shape of a single record.
#[derive(Debug, Deserialize)]
struct RawEvent {
    action: String,
    my_team: TeamSnapshot,
    opponent_team: TeamSnapshot,
    #[serde(default)]
    player_with_puck: Option<PlayerRef>,
    #[serde(default)]
    zone_number: Option<i8>,
    #[serde(default)]
    time: Option<u32>,
}

/// Decode one record of the event log.
pub fn decode_event(value: Value) -> Result<MatchEvent, MalformedEvent> {
    let raw: RawEvent =
        serde_json::from_value(value).map_err(|e| MalformedEvent::InvalidShape {
            message: e.to_string(),
        })?;

    let kind = match raw.action.as_str() {
        "StartGame" => EventKind::StartGame,
        "FaceOff" => EventKind::FaceOff,
        "Overtime" => EventKind::Overtime,
        "EndOfPeriod" => EventKind::EndOfPeriod,
        "GameFinished" => EventKind::GameFinished,
        "Goal" => EventKind::Goal {
            scorer: raw.player_with_puck.clone(),
        },
        other => {
            let action =
                ActionKind::from_name(other).ok_or_else(|| MalformedEvent::UnknownAction {
                    action: other.to_string(),
                })?;
            let puck_holder =
                raw.player_with_puck
                    .clone()
                    .ok_or_else(|| MalformedEvent::MissingPossession {
                        action: other.to_string(),
                    })?;
            let possession = if raw.my_team.owner_id() == Some(puck_holder.user_id) {
                Side::Own
            } else {
                Side::Opponent
            };
            EventKind::Action {
                action,
                puck_holder,
                possession,
            }
        }
    };

    Ok(MatchEvent {
        kind,
        own: raw.my_team,
        opponent: raw.opponent_team,
        zone: raw.zone_number,
        time: raw.time,
    })
}

/// Decode a full event log. Fails only when the payload is not an array;
/// bad individual records are kept as `LogRecord::Malformed`.
pub fn decode_log(value: Value) -> Result<Vec<LogRecord>, MalformedEvent> {
    match value {
        Value::Array(items) => Ok(items.into_iter().map(LogRecord::decode).collect()),
        other => Err(MalformedEvent::InvalidShape {
            message: format!("expected an array of events, got {}", json_type(&other)),
        }),
    }
}

/// Decode a full event log from raw JSON bytes.
pub fn decode_log_bytes(bytes: &[u8]) -> Result<Vec<LogRecord>, MalformedEvent> {
    let value: Value = serde_json::from_slice(bytes).map_err(|e| MalformedEvent::InvalidShape {
        message: e.to_string(),
    })?;
    decode_log(value)
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
