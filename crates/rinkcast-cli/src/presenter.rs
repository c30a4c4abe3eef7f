// Plain-text rendering of session updates for the terminal feed.

use rinkcast_app::protocol::{ConnectionStatus, FinalScore, UiUpdate};
use rinkcast_core::event::PlayerRef;
use rinkcast_core::render::{RenderFrame, Template};

/// Score header shown at the start of every feed line, e.g. `[02:01 P3]`.
pub fn score_header(frame: &RenderFrame) -> String {
    let period = if frame.overtime {
        "OT".to_string()
    } else {
        format!("P{}", frame.period)
    };
    format!("[{}:{} {}]", frame.own_score, frame.opponent_score, period)
}

fn player_name(player: &PlayerRef) -> String {
    match (&player.name, player.number) {
        (Some(name), Some(number)) => format!("#{number} {name}"),
        (Some(name), None) => name.clone(),
        (None, Some(number)) => format!("#{number}"),
        (None, None) => format!("player {}", player.user_id),
    }
}

/// One feed line for a rendered event.
pub fn feed_line(frame: &RenderFrame, opponent: Option<&str>) -> String {
    let header = score_header(frame);
    let body = match frame.template {
        Template::Default => frame.label.to_string(),
        Template::Goal => match &frame.possessor {
            Some(scorer) => format!("GOAL! {}", player_name(scorer)),
            None => "GOAL!".to_string(),
        },
        Template::OwnAction | Template::OpponentAction => {
            let side = if frame.template == Template::OwnAction {
                "us".to_string()
            } else {
                opponent.unwrap_or("them").to_string()
            };
            match &frame.possessor {
                Some(holder) => format!("{} by {} ({})", frame.label, player_name(holder), side),
                None => format!("{} ({})", frame.label, side),
            }
        }
    };

    let mut line = format!("{header} {body}");
    if let Some(zone) = frame.zone {
        line.push_str(&format!(" | zone {zone}"));
    }
    line
}

pub fn final_line(score: FinalScore) -> String {
    let verdict = match score.own.cmp(&score.opponent) {
        std::cmp::Ordering::Greater => "You win",
        std::cmp::Ordering::Less => "You lose",
        std::cmp::Ordering::Equal => "Draw",
    };
    format!("Final score {:02}:{:02}. {}", score.own, score.opponent, verdict)
}

/// Terminal line for an update, or `None` for updates that print nothing.
pub fn format_update(update: &UiUpdate, opponent: Option<&str>) -> Option<String> {
    match update {
        UiUpdate::Rendered(frame) => Some(feed_line(frame, opponent)),
        UiUpdate::Skipped { index, reason } => {
            Some(format!("(event {index} could not be read: {reason})"))
        }
        UiUpdate::ConnectionStatus(ConnectionStatus::Degraded) => {
            Some("(connection lost, retrying...)".to_string())
        }
        UiUpdate::ConnectionStatus(ConnectionStatus::Online) => {
            Some("(connection restored)".to_string())
        }
        UiUpdate::CommandResult { command, result } => Some(match result {
            Ok(()) => format!("> {} sent", command.method_name()),
            Err(e) => format!("> {} failed: {e}", command.method_name()),
        }),
        UiUpdate::Finished(score) => Some(final_line(*score)),
        UiUpdate::Halted(regression) => Some(format!("Session stopped: {regression}")),
        UiUpdate::ReplayStarted { .. } => None,
    }
}
