// Replay driver: paces the rendering of pending log records, one at a time,
// folding each into the display state.
//
// The driver is single-flight. While it is `Rendering` it refuses new
// batches; whatever arrived in the meantime is picked up by the next
// `start` once it is back to `Idle`.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use rinkcast_core::display::DisplayState;
use rinkcast_core::event::{LogRecord, MalformedEvent};
use rinkcast_core::log::EventLog;
use rinkcast_core::render::RenderFrame;

use crate::protocol::FinalScore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayPhase {
    Idle,
    Rendering,
    Finished,
}

/// Result of rendering one queued record.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Rendered(RenderFrame),
    /// The record could not be decoded; nothing was drawn for it.
    Skipped {
        index: usize,
        reason: MalformedEvent,
    },
    /// `GameFinished` was rendered; the driver accepts nothing further.
    Finished {
        frame: RenderFrame,
        score: FinalScore,
    },
}

pub struct ReplayDriver {
    phase: ReplayPhase,
    /// Number of log records consumed so far.
    cursor: usize,
    queue: VecDeque<LogRecord>,
    display: DisplayState,
    pacing: Duration,
    next_due: Option<Instant>,
}

impl ReplayDriver {
    pub fn new(pacing: Duration) -> Self {
        ReplayDriver {
            phase: ReplayPhase::Idle,
            cursor: 0,
            queue: VecDeque::new(),
            display: DisplayState::new(),
            pacing,
            next_due: None,
        }
    }

    pub fn phase(&self) -> ReplayPhase {
        self.phase
    }

    pub fn is_rendering(&self) -> bool {
        self.phase == ReplayPhase::Rendering
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn display(&self) -> &DisplayState {
        &self.display
    }

    /// Queue every record of `log` past the cursor and start rendering.
    ///
    /// Returns `false`, changing nothing, when the driver is not idle or the
    /// cursor has already caught up with the log.
    pub fn start(&mut self, log: &EventLog) -> bool {
        if self.phase != ReplayPhase::Idle {
            return false;
        }

        let pending = log.tail_from(self.cursor);
        if pending.is_empty() {
            return false;
        }

        debug!(
            "Replay starting at {} with {} pending records",
            self.cursor,
            pending.len()
        );
        self.queue = pending.iter().cloned().collect();
        self.phase = ReplayPhase::Rendering;
        self.next_due = Some(Instant::now() + self.pacing);
        true
    }

    /// Resolves when the next queued record is due. Never resolves while the
    /// driver is not rendering.
    pub async fn due(&self) {
        match (self.phase, self.next_due) {
            (ReplayPhase::Rendering, Some(at)) => tokio::time::sleep_until(at).await,
            _ => std::future::pending().await,
        }
    }

    /// Render the next queued record. The cursor moves past it only once the
    /// display state has been updated and the frame built.
    pub fn step(&mut self) -> Option<Step> {
        if self.phase != ReplayPhase::Rendering {
            return None;
        }
        let record = self.queue.pop_front()?;
        let index = self.cursor;

        let step = match record {
            LogRecord::Malformed(reason) => {
                warn!("Skipping malformed event {}: {}", index, reason);
                Step::Skipped { index, reason }
            }
            LogRecord::Event(event) => {
                self.display.apply(&event);
                let frame = RenderFrame::new(index, &event, &self.display);
                if event.is_terminal() {
                    let (own, opponent) = event.score();
                    Step::Finished {
                        frame,
                        score: FinalScore { own, opponent },
                    }
                } else {
                    Step::Rendered(frame)
                }
            }
        };

        self.cursor += 1;

        if let Step::Finished { score, .. } = &step {
            info!(
                "Game finished at event {}: {}-{}",
                index, score.own, score.opponent
            );
            let dropped = self.queue.len();
            if dropped > 0 {
                warn!("Discarding {} records queued after the final event", dropped);
            }
            self.queue.clear();
            self.phase = ReplayPhase::Finished;
            self.next_due = None;
        } else if self.queue.is_empty() {
            self.phase = ReplayPhase::Idle;
            self.next_due = None;
        } else {
            self.next_due = Some(Instant::now() + self.pacing);
        }

        Some(step)
    }
}
