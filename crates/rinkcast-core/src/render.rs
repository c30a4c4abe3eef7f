// Render frame selection: which visual template an event uses and the derived
// fields the presentation layer needs to draw it.

use serde::Serialize;

use crate::display::{pad_score, DisplayState};
use crate::event::{EventKind, MatchEvent, PlayerRef, Side};

/// Visual template for one feed entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Template {
    /// Structural events: start, face-off, overtime, end of period, final.
    Default,
    Goal,
    /// In-play action with the local team on the puck.
    OwnAction,
    /// In-play action with the opponent on the puck.
    OpponentAction,
}

impl Template {
    pub fn for_event(event: &MatchEvent) -> Self {
        match &event.kind {
            EventKind::StartGame
            | EventKind::FaceOff
            | EventKind::Overtime
            | EventKind::EndOfPeriod
            | EventKind::GameFinished => Template::Default,
            EventKind::Goal { .. } => Template::Goal,
            EventKind::Action {
                possession: Side::Own,
                ..
            } => Template::OwnAction,
            EventKind::Action {
                possession: Side::Opponent,
                ..
            } => Template::OpponentAction,
        }
    }
}

/// Everything the presentation layer needs to draw one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderFrame {
    /// Position of the event in the match log.
    pub index: usize,
    pub template: Template,
    pub label: &'static str,
    pub own_score: String,
    pub opponent_score: String,
    pub period: u8,
    pub overtime: bool,
    pub possessor: Option<PlayerRef>,
    pub zone: Option<i8>,
    pub time: Option<u32>,
}

impl RenderFrame {
    /// Build the frame for `event`, with `state` already updated by it.
    pub fn new(index: usize, event: &MatchEvent, state: &DisplayState) -> Self {
        let possessor = match &event.kind {
            EventKind::Action { puck_holder, .. } => Some(puck_holder.clone()),
            EventKind::Goal { scorer } => scorer.clone(),
            _ => None,
        };

        RenderFrame {
            index,
            template: Template::for_event(event),
            label: event.label(),
            own_score: pad_score(state.own_score),
            opponent_score: pad_score(state.opponent_score),
            period: state.period,
            overtime: state.overtime,
            possessor,
            zone: event.zone,
            time: event.time,
        }
    }
}
