// Messages exchanged between the match session task and the presentation
// layer, plus the observable session snapshot.

use chrono::{DateTime, Utc};

use rinkcast_core::display::DisplayState;
use rinkcast_core::log::LogRegression;
use rinkcast_core::render::RenderFrame;
use rinkcast_near::backend::TeamCommand;

use crate::replay::ReplayPhase;

// ---------------------------------------------------------------------------
// Session -> UI
// ---------------------------------------------------------------------------

/// Reachability of the game backend as seen by the poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Online,
    /// The most recent fetch failed; polling continues.
    Degraded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinalScore {
    pub own: u32,
    pub opponent: u32,
}

/// Updates pushed from the session task to the UI.
#[derive(Debug, Clone, PartialEq)]
pub enum UiUpdate {
    ConnectionStatus(ConnectionStatus),
    /// The replay driver picked up log records `[from, to)`.
    ReplayStarted { from: usize, to: usize },
    Rendered(Box<RenderFrame>),
    /// A log record could not be decoded and was passed over.
    Skipped { index: usize, reason: String },
    CommandResult {
        command: TeamCommand,
        result: Result<(), String>,
    },
    /// The terminal event was rendered. Sent once per session.
    Finished(FinalScore),
    /// The backend served a shorter log than already seen; the session stopped.
    Halted(LogRegression),
}

// ---------------------------------------------------------------------------
// UI -> Session
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    Team(TeamCommand),
}

// ---------------------------------------------------------------------------
// Snapshot and outcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedEvent {
    pub frame: RenderFrame,
    pub rendered_at: DateTime<Utc>,
}

/// Point-in-time view of a running session, published on every change.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub game_id: u64,
    pub opponent: Option<String>,
    pub display: DisplayState,
    pub render_cursor: usize,
    pub known_log_length: usize,
    pub phase: ReplayPhase,
    pub connection: ConnectionStatus,
    /// Rendered feed entries, oldest first.
    pub history: Vec<RenderedEvent>,
    /// Set when the session stopped because the backend log shrank.
    pub halted: Option<LogRegression>,
}

impl SessionSnapshot {
    pub fn new(game_id: u64, opponent: Option<String>) -> Self {
        SessionSnapshot {
            game_id,
            opponent,
            display: DisplayState::new(),
            render_cursor: 0,
            known_log_length: 0,
            phase: ReplayPhase::Idle,
            connection: ConnectionStatus::Online,
            history: Vec::new(),
            halted: None,
        }
    }
}

/// How a session task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    Finished(FinalScore),
    Halted(LogRegression),
    Cancelled,
}
