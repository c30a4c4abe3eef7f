// Display state derived from rendered events.

use serde::Serialize;

use crate::event::{EventKind, MatchEvent, Side};

/// Number of regulation periods. The period counter never goes past it;
/// overtime is flagged separately.
pub const REGULATION_PERIODS: u8 = 3;

/// What the game screen shows: a fold over every event rendered so far.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayState {
    pub own_score: u32,
    pub opponent_score: u32,
    pub period: u8,
    pub overtime: bool,
    pub finished: bool,
    /// Side holding the puck as of the last in-play action.
    pub possession: Option<Side>,
}

impl Default for DisplayState {
    fn default() -> Self {
        DisplayState {
            own_score: 0,
            opponent_score: 0,
            period: 1,
            overtime: false,
            finished: false,
            possession: None,
        }
    }
}

impl DisplayState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a sequence of events from the initial state.
    pub fn fold<'a>(events: impl IntoIterator<Item = &'a MatchEvent>) -> Self {
        let mut state = DisplayState::new();
        for event in events {
            state.apply(event);
        }
        state
    }

    /// Apply one event. Scores always come from the event's snapshot, never
    /// from local arithmetic.
    pub fn apply(&mut self, event: &MatchEvent) {
        let (own, opponent) = event.score();
        self.own_score = own;
        self.opponent_score = opponent;

        match &event.kind {
            EventKind::EndOfPeriod => {
                if self.period < REGULATION_PERIODS {
                    self.period += 1;
                }
            }
            EventKind::Overtime => self.overtime = true,
            EventKind::GameFinished => self.finished = true,
            EventKind::Action { possession, .. } => self.possession = Some(*possession),
            EventKind::StartGame | EventKind::FaceOff | EventKind::Goal { .. } => {}
        }
    }

    pub fn own_score_text(&self) -> String {
        pad_score(self.own_score)
    }

    pub fn opponent_score_text(&self) -> String {
        pad_score(self.opponent_score)
    }
}

/// Scores are shown with at least two digits ("03", "12", "104").
pub fn pad_score(score: u32) -> String {
    format!("{score:02}")
}
