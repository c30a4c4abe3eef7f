// Keyboard commands read from stdin during a match.

use rinkcast_near::backend::TeamCommand;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputCommand {
    Team(TeamCommand),
    Quit,
}

pub const HELP: &str = "commands: t = timeout, s = coach speech, g = goalie out, b = goalie back, q = quit";

/// Parse one input line. Unknown input yields `None`.
pub fn parse_line(line: &str) -> Option<InputCommand> {
    match line.trim().to_ascii_lowercase().as_str() {
        "t" => Some(InputCommand::Team(TeamCommand::TakeTimeout)),
        "s" => Some(InputCommand::Team(TeamCommand::CoachSpeech)),
        "g" => Some(InputCommand::Team(TeamCommand::GoalieOut)),
        "b" => Some(InputCommand::Team(TeamCommand::GoalieBack)),
        "q" | "quit" => Some(InputCommand::Quit),
        _ => None,
    }
}
