// Match session task: polls the backend for the event log, reconciles each
// fetch into the local cache and paces the replay of new records.
//
// All session state is owned by one task. Fetches and team commands run as
// spawned tasks, so the select loop never blocks on the network. A fetch is
// collected through its join handle, which also surfaces a task that panicked.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use rinkcast_core::config::TimingConfig;
use rinkcast_core::event::LogRecord;
use rinkcast_core::log::{EventLog, LogRegression};
use rinkcast_core::render::RenderFrame;
use rinkcast_near::backend::{BackendError, GameBackend, GameSession, TeamCommand};

use crate::protocol::{
    ConnectionStatus, FinalScore, RenderedEvent, SessionCommand, SessionOutcome, SessionSnapshot,
    UiUpdate,
};
use crate::replay::{ReplayDriver, Step};

const COMMAND_CHANNEL_CAPACITY: usize = 16;

type FetchResult = Result<Vec<LogRecord>, BackendError>;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("match session is no longer running")]
    Closed,
}

// ---------------------------------------------------------------------------
// SessionHandle
// ---------------------------------------------------------------------------

/// Owner's handle on a running match session.
///
/// Dropping the handle cancels the session.
#[derive(Debug)]
pub struct SessionHandle {
    game: GameSession,
    cancel_tx: watch::Sender<bool>,
    cmd_tx: mpsc::Sender<SessionCommand>,
    snapshot_rx: watch::Receiver<SessionSnapshot>,
    task: JoinHandle<SessionOutcome>,
}

impl SessionHandle {
    pub fn game(&self) -> &GameSession {
        &self.game
    }

    /// Ask the session to stop. Idempotent.
    pub fn cancel(&self) {
        let _ = self.cancel_tx.send(true);
    }

    /// Forward a team command to the session.
    pub async fn command(&self, command: TeamCommand) -> Result<(), SessionError> {
        self.cmd_tx
            .send(SessionCommand::Team(command))
            .await
            .map_err(|_| SessionError::Closed)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_rx.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the session task to end.
    pub async fn join(self) -> anyhow::Result<SessionOutcome> {
        let SessionHandle { task, cancel_tx, .. } = self;
        let outcome = task.await?;
        drop(cancel_tx);
        Ok(outcome)
    }
}

/// Spawn the session task for `game`, starting from an empty log.
pub fn spawn(
    game: GameSession,
    opponent: Option<String>,
    backend: Arc<dyn GameBackend>,
    timing: &TimingConfig,
    ui_tx: mpsc::Sender<UiUpdate>,
) -> SessionHandle {
    let (cancel_tx, cancel_rx) = watch::channel(false);
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
    let (snapshot_tx, snapshot_rx) =
        watch::channel(SessionSnapshot::new(game.game_id, opponent));

    let state = SessionState::new(game.clone(), backend, timing);
    let task = tokio::spawn(run(
        state,
        timing.clone(),
        cmd_rx,
        cancel_rx,
        ui_tx,
        snapshot_tx,
    ));

    SessionHandle {
        game,
        cancel_tx,
        cmd_tx,
        snapshot_rx,
        task,
    }
}

// ---------------------------------------------------------------------------
// Session state
// ---------------------------------------------------------------------------

struct SessionState {
    game: GameSession,
    backend: Arc<dyn GameBackend>,
    log: EventLog,
    replay: ReplayDriver,
    connection: ConnectionStatus,
    /// The fetch currently in flight, if any. At most one at a time.
    fetch_task: Option<JoinHandle<FetchResult>>,
}

impl SessionState {
    fn new(game: GameSession, backend: Arc<dyn GameBackend>, timing: &TimingConfig) -> Self {
        SessionState {
            game,
            backend,
            log: EventLog::new(),
            replay: ReplayDriver::new(timing.pacing_interval()),
            connection: ConnectionStatus::Online,
            fetch_task: None,
        }
    }

    fn cancel_fetch(&mut self) {
        if let Some(handle) = self.fetch_task.take() {
            handle.abort();
        }
    }
}

// ---------------------------------------------------------------------------
// Main loop
// ---------------------------------------------------------------------------

/// Run a match session until the game finishes, the log regresses or the
/// session is cancelled.
///
/// Listens, in priority order, on:
/// 1. the cancellation signal
/// 2. completed fetches
/// 3. team commands
/// 4. the replay pacing deadline
/// 5. the poll interval
async fn run(
    mut state: SessionState,
    timing: TimingConfig,
    mut cmd_rx: mpsc::Receiver<SessionCommand>,
    mut cancel_rx: watch::Receiver<bool>,
    ui_tx: mpsc::Sender<UiUpdate>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
) -> SessionOutcome {
    info!("Match session started for game {}", state.game.game_id);

    if *cancel_rx.borrow() {
        return SessionOutcome::Cancelled;
    }

    let mut commands_open = true;
    let mut poll = tokio::time::interval(timing.poll_interval());
    poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let outcome = loop {
        tokio::select! {
            biased;

            // --- Cancellation ---
            changed = cancel_rx.changed() => {
                if changed.is_err() || *cancel_rx.borrow() {
                    info!("Match session cancelled");
                    break SessionOutcome::Cancelled;
                }
            }

            // --- Completed fetches ---
            joined = join_fetch(&mut state.fetch_task), if state.fetch_task.is_some() => {
                state.fetch_task = None;
                let result = joined.unwrap_or_else(|e| {
                    Err(BackendError::RemoteUnavailable(format!("fetch task failed: {e}")))
                });
                if let Err(regression) = handle_fetch_result(&mut state, result, &ui_tx, &snapshot_tx).await {
                    snapshot_tx.send_modify(|snapshot| snapshot.halted = Some(regression));
                    let _ = ui_tx.send(UiUpdate::Halted(regression)).await;
                    break SessionOutcome::Halted(regression);
                }
            }

            // --- Team commands ---
            cmd = cmd_rx.recv(), if commands_open => {
                match cmd {
                    Some(SessionCommand::Team(command)) => submit_command(&state, command, &ui_tx),
                    None => {
                        debug!("Command channel closed");
                        commands_open = false;
                    }
                }
            }

            // --- Replay pacing ---
            _ = state.replay.due(), if state.replay.is_rendering() => {
                if let Some(score) = render_next(&mut state, &ui_tx, &snapshot_tx).await {
                    let _ = ui_tx.send(UiUpdate::Finished(score)).await;
                    break SessionOutcome::Finished(score);
                }
            }

            // --- Poll interval ---
            _ = poll.tick() => {
                start_fetch(&mut state);
            }
        }
    };

    state.cancel_fetch();
    publish_snapshot(&state, &snapshot_tx);
    info!("Match session for game {} ended: {:?}", state.game.game_id, outcome);
    outcome
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Spawn a fetch of the full event log unless one is already in flight.
fn start_fetch(state: &mut SessionState) {
    if state.fetch_task.is_some() {
        debug!("Previous fetch still in flight, skipping this poll");
        return;
    }

    let backend = Arc::clone(&state.backend);
    let game_id = state.game.game_id;
    state.fetch_task = Some(tokio::spawn(async move {
        backend.fetch_events(game_id).await
    }));
}

/// Wait for the in-flight fetch. Never resolves when there is none.
async fn join_fetch(
    task: &mut Option<JoinHandle<FetchResult>>,
) -> Result<FetchResult, JoinError> {
    match task {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

/// Reconcile a completed fetch into the cache and start the replay driver if
/// it is idle and there is something new to render.
async fn handle_fetch_result(
    state: &mut SessionState,
    result: FetchResult,
    ui_tx: &mpsc::Sender<UiUpdate>,
    snapshot_tx: &watch::Sender<SessionSnapshot>,
) -> Result<(), LogRegression> {
    let records = match result {
        Ok(records) => records,
        Err(e) => {
            warn!("Fetching events for game {} failed: {}", state.game.game_id, e);
            set_connection(state, ConnectionStatus::Degraded, ui_tx).await;
            publish_snapshot(state, snapshot_tx);
            return Ok(());
        }
    };
    set_connection(state, ConnectionStatus::Online, ui_tx).await;

    let appended = state.log.absorb(records).map_err(|regression| {
        error!(
            "Event log for game {} shrank: {}",
            state.game.game_id, regression
        );
        regression
    })?;
    if appended > 0 {
        debug!("{} new events, log length {}", appended, state.log.len());
    }

    let from = state.replay.cursor();
    if state.replay.start(&state.log) {
        let to = state.log.len();
        let _ = ui_tx.send(UiUpdate::ReplayStarted { from, to }).await;
    }

    publish_snapshot(state, snapshot_tx);
    Ok(())
}

/// Render one queued record. Returns the final score once the terminal event
/// has been drawn.
async fn render_next(
    state: &mut SessionState,
    ui_tx: &mpsc::Sender<UiUpdate>,
    snapshot_tx: &watch::Sender<SessionSnapshot>,
) -> Option<FinalScore> {
    let step = state.replay.step()?;

    let finished = match step {
        Step::Rendered(frame) => {
            record_frame(snapshot_tx, &frame);
            let _ = ui_tx.send(UiUpdate::Rendered(Box::new(frame))).await;
            None
        }
        Step::Skipped { index, reason } => {
            let _ = ui_tx
                .send(UiUpdate::Skipped {
                    index,
                    reason: reason.to_string(),
                })
                .await;
            None
        }
        Step::Finished { frame, score } => {
            record_frame(snapshot_tx, &frame);
            let _ = ui_tx.send(UiUpdate::Rendered(Box::new(frame))).await;
            Some(score)
        }
    };

    publish_snapshot(state, snapshot_tx);
    finished
}

fn submit_command(state: &SessionState, command: TeamCommand, ui_tx: &mpsc::Sender<UiUpdate>) {
    let backend = Arc::clone(&state.backend);
    let ui_tx = ui_tx.clone();
    let game_id = state.game.game_id;
    info!("Submitting {} for game {}", command.method_name(), game_id);

    tokio::spawn(async move {
        let result = backend
            .submit_command(game_id, command)
            .await
            .map_err(|e| {
                warn!("{} failed: {}", command.method_name(), e);
                e.to_string()
            });
        let _ = ui_tx.send(UiUpdate::CommandResult { command, result }).await;
    });
}

async fn set_connection(
    state: &mut SessionState,
    status: ConnectionStatus,
    ui_tx: &mpsc::Sender<UiUpdate>,
) {
    if state.connection == status {
        return;
    }
    info!("Backend connection {:?}", status);
    state.connection = status;
    let _ = ui_tx.send(UiUpdate::ConnectionStatus(status)).await;
}

fn record_frame(snapshot_tx: &watch::Sender<SessionSnapshot>, frame: &RenderFrame) {
    let entry = RenderedEvent {
        frame: frame.clone(),
        rendered_at: chrono::Utc::now(),
    };
    snapshot_tx.send_modify(|snapshot| snapshot.history.push(entry));
}

fn publish_snapshot(state: &SessionState, snapshot_tx: &watch::Sender<SessionSnapshot>) {
    snapshot_tx.send_modify(|snapshot| {
        snapshot.display = state.replay.display().clone();
        snapshot.render_cursor = state.replay.cursor();
        snapshot.known_log_length = state.log.len();
        snapshot.phase = state.replay.phase();
        snapshot.connection = state.connection;
    });
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use rinkcast_core::event::{EventKind, MatchEvent, TeamSnapshot};
    use tokio::time::sleep;

    use crate::replay::ReplayPhase;

    // -- Scripted backend --

    /// Serves scripted fetch results in order, then keeps repeating the last
    /// successful log. The first `panics` fetches panic instead.
    struct ScriptedBackend {
        script: Mutex<VecDeque<FetchResult>>,
        panics: AtomicUsize,
        last_ok: Mutex<Vec<LogRecord>>,
        fetches: AtomicUsize,
        commands: Mutex<Vec<TeamCommand>>,
        command_result: Result<(), BackendError>,
    }

    impl ScriptedBackend {
        fn new(script: Vec<FetchResult>) -> Arc<Self> {
            Self::panicking(0, script)
        }

        fn panicking(panics: usize, script: Vec<FetchResult>) -> Arc<Self> {
            Arc::new(ScriptedBackend {
                script: Mutex::new(script.into()),
                panics: AtomicUsize::new(panics),
                last_ok: Mutex::new(Vec::new()),
                fetches: AtomicUsize::new(0),
                commands: Mutex::new(Vec::new()),
                command_result: Ok(()),
            })
        }

        fn fetch_count(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl GameBackend for ScriptedBackend {
        async fn available_games(&self) -> Result<Vec<GameSession>, BackendError> {
            Ok(vec![game()])
        }

        async fn fetch_events(&self, _game_id: u64) -> Result<Vec<LogRecord>, BackendError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if self
                .panics
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                panic!("backend blew up mid-fetch");
            }
            let next = self.script.lock().unwrap().pop_front();
            match next {
                Some(Ok(records)) => {
                    *self.last_ok.lock().unwrap() = records.clone();
                    Ok(records)
                }
                Some(Err(e)) => Err(e),
                None => Ok(self.last_ok.lock().unwrap().clone()),
            }
        }

        async fn submit_command(
            &self,
            _game_id: u64,
            command: TeamCommand,
        ) -> Result<(), BackendError> {
            self.commands.lock().unwrap().push(command);
            self.command_result.clone()
        }
    }

    // -- Helpers --

    fn game() -> GameSession {
        GameSession {
            game_id: 7,
            players: ("alice.testnet".into(), "bob.testnet".into()),
        }
    }

    fn timing() -> TimingConfig {
        TimingConfig {
            poll_interval_ms: 2000,
            pacing_interval_ms: 1000,
        }
    }

    fn ev(kind: EventKind, own: u32, opp: u32) -> LogRecord {
        LogRecord::Event(MatchEvent {
            kind,
            own: TeamSnapshot {
                score: own,
                ..Default::default()
            },
            opponent: TeamSnapshot {
                score: opp,
                ..Default::default()
            },
            zone: None,
            time: None,
        })
    }

    fn face_offs(n: usize) -> Vec<LogRecord> {
        (0..n).map(|_| ev(EventKind::FaceOff, 0, 0)).collect()
    }

    fn start(backend: Arc<ScriptedBackend>) -> (SessionHandle, mpsc::Receiver<UiUpdate>) {
        let (ui_tx, ui_rx) = mpsc::channel(256);
        let handle = spawn(game(), Some("bob.testnet".into()), backend, &timing(), ui_tx);
        (handle, ui_rx)
    }

    fn drain(ui_rx: &mut mpsc::Receiver<UiUpdate>) -> Vec<UiUpdate> {
        let mut updates = Vec::new();
        while let Ok(update) = ui_rx.try_recv() {
            updates.push(update);
        }
        updates
    }

    fn rendered_indices(updates: &[UiUpdate]) -> Vec<usize> {
        updates
            .iter()
            .filter_map(|u| match u {
                UiUpdate::Rendered(frame) => Some(frame.index),
                _ => None,
            })
            .collect()
    }

    fn replay_starts(updates: &[UiUpdate]) -> Vec<(usize, usize)> {
        updates
            .iter()
            .filter_map(|u| match u {
                UiUpdate::ReplayStarted { from, to } => Some((*from, *to)),
                _ => None,
            })
            .collect()
    }

    // -- Tests --

    #[tokio::test(start_paused = true)]
    async fn full_game_renders_in_order_and_finishes() {
        let backend = ScriptedBackend::new(vec![Ok(vec![
            ev(EventKind::StartGame, 0, 0),
            ev(EventKind::FaceOff, 0, 0),
            ev(EventKind::Goal { scorer: None }, 1, 0),
            ev(EventKind::EndOfPeriod, 1, 0),
            ev(EventKind::GameFinished, 1, 0),
        ])]);
        let (handle, mut ui_rx) = start(backend.clone());
        let snapshots = handle.subscribe();

        let outcome = handle.join().await.unwrap();
        let final_score = FinalScore { own: 1, opponent: 0 };
        assert_eq!(outcome, SessionOutcome::Finished(final_score));

        let updates = drain(&mut ui_rx);
        assert_eq!(rendered_indices(&updates), vec![0, 1, 2, 3, 4]);
        let finished: Vec<_> = updates
            .iter()
            .filter(|u| matches!(u, UiUpdate::Finished(_)))
            .collect();
        assert_eq!(finished, vec![&UiUpdate::Finished(final_score)]);

        let snapshot = snapshots.borrow().clone();
        assert_eq!(snapshot.phase, ReplayPhase::Finished);
        assert_eq!(snapshot.render_cursor, 5);
        assert_eq!(snapshot.display.period, 2);
        assert!(snapshot.display.finished);
        assert_eq!(snapshot.history.len(), 5);

        // No polling after the terminal event.
        let fetches = backend.fetch_count();
        sleep(Duration::from_secs(10)).await;
        assert_eq!(backend.fetch_count(), fetches);
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_identical_fetches_render_once() {
        let backend = ScriptedBackend::new(vec![Ok(face_offs(3))]);
        let (handle, mut ui_rx) = start(backend.clone());

        sleep(Duration::from_secs(10)).await;
        assert!(backend.fetch_count() >= 4);

        let snapshot = handle.snapshot();
        assert_eq!(snapshot.known_log_length, 3);
        assert_eq!(snapshot.render_cursor, 3);
        assert_eq!(snapshot.phase, ReplayPhase::Idle);

        handle.cancel();
        assert_eq!(handle.join().await.unwrap(), SessionOutcome::Cancelled);

        let updates = drain(&mut ui_rx);
        assert_eq!(replay_starts(&updates), vec![(0, 3)]);
        assert_eq!(rendered_indices(&updates), vec![0, 1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn growth_during_replay_is_picked_up_after_the_batch() {
        let backend = ScriptedBackend::new(vec![Ok(face_offs(3)), Ok(face_offs(5))]);
        let (handle, mut ui_rx) = start(backend);

        // Still rendering the first batch; the second fetch has landed.
        sleep(Duration::from_millis(2500)).await;
        let snapshot = handle.snapshot();
        assert_eq!(snapshot.known_log_length, 5);
        assert_eq!(snapshot.render_cursor, 2);
        assert_eq!(snapshot.phase, ReplayPhase::Rendering);

        // First batch done; the new records wait for the next poll.
        sleep(Duration::from_secs(1)).await;
        let snapshot = handle.snapshot();
        assert_eq!(snapshot.render_cursor, 3);
        assert_eq!(snapshot.phase, ReplayPhase::Idle);

        sleep(Duration::from_secs(6)).await;
        assert_eq!(handle.snapshot().render_cursor, 5);

        handle.cancel();
        handle.join().await.unwrap();

        let updates = drain(&mut ui_rx);
        assert_eq!(replay_starts(&updates), vec![(0, 3), (3, 5)]);
        assert_eq!(rendered_indices(&updates), vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test(start_paused = true)]
    async fn records_are_paced_one_per_interval() {
        let backend = ScriptedBackend::new(vec![Ok(face_offs(3))]);
        let (handle, _ui_rx) = start(backend);

        sleep(Duration::from_millis(500)).await;
        assert_eq!(handle.snapshot().render_cursor, 0);
        sleep(Duration::from_secs(1)).await;
        assert_eq!(handle.snapshot().render_cursor, 1);
        sleep(Duration::from_secs(1)).await;
        assert_eq!(handle.snapshot().render_cursor, 2);

        handle.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn failed_fetch_keeps_cache_and_polling() {
        let backend = ScriptedBackend::new(vec![
            Ok(face_offs(3)),
            Err(BackendError::RemoteUnavailable("timeout".into())),
            Ok(face_offs(3)),
        ]);
        let (handle, mut ui_rx) = start(backend.clone());

        sleep(Duration::from_millis(2500)).await;
        let snapshot = handle.snapshot();
        assert_eq!(snapshot.connection, ConnectionStatus::Degraded);
        assert_eq!(snapshot.known_log_length, 3);

        sleep(Duration::from_secs(4)).await;
        let snapshot = handle.snapshot();
        assert_eq!(snapshot.connection, ConnectionStatus::Online);
        assert_eq!(snapshot.known_log_length, 3);
        assert_eq!(snapshot.render_cursor, 3);
        assert!(backend.fetch_count() >= 3);

        handle.cancel();
        handle.join().await.unwrap();

        let updates = drain(&mut ui_rx);
        let statuses: Vec<_> = updates
            .iter()
            .filter_map(|u| match u {
                UiUpdate::ConnectionStatus(s) => Some(*s),
                _ => None,
            })
            .collect();
        assert_eq!(
            statuses,
            vec![ConnectionStatus::Degraded, ConnectionStatus::Online]
        );
        assert_eq!(replay_starts(&updates), vec![(0, 3)]);
    }

    #[tokio::test(start_paused = true)]
    async fn shrinking_log_halts_the_session() {
        // Polls at 0s and 2s serve two records, the poll at 4s serves one.
        let backend = ScriptedBackend::new(vec![
            Ok(face_offs(2)),
            Ok(face_offs(2)),
            Ok(face_offs(1)),
        ]);
        let (handle, mut ui_rx) = start(backend.clone());
        let snapshots = handle.subscribe();

        sleep(Duration::from_secs(3)).await;
        let before = handle.snapshot();
        assert_eq!(before.render_cursor, 2);
        assert_eq!(before.known_log_length, 2);
        assert_eq!(before.halted, None);

        let outcome = handle.join().await.unwrap();
        let regression = LogRegression {
            known: 2,
            fetched: 1,
        };
        assert_eq!(outcome, SessionOutcome::Halted(regression));

        let after = snapshots.borrow().clone();
        assert_eq!(after.halted, Some(regression));
        assert_eq!(after.render_cursor, before.render_cursor);
        assert_eq!(after.known_log_length, before.known_log_length);
        assert_eq!(after.display, before.display);

        let updates = drain(&mut ui_rx);
        assert_eq!(updates.last(), Some(&UiUpdate::Halted(regression)));

        let fetches = backend.fetch_count();
        sleep(Duration::from_secs(10)).await;
        assert_eq!(backend.fetch_count(), fetches);
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_fetch_does_not_stop_polling() {
        let backend = ScriptedBackend::panicking(1, vec![Ok(face_offs(2))]);
        let (handle, mut ui_rx) = start(backend.clone());

        sleep(Duration::from_millis(500)).await;
        assert_eq!(handle.snapshot().connection, ConnectionStatus::Degraded);

        sleep(Duration::from_secs(5)).await;
        assert!(backend.fetch_count() >= 3);
        let snapshot = handle.snapshot();
        assert_eq!(snapshot.connection, ConnectionStatus::Online);
        assert_eq!(snapshot.known_log_length, 2);
        assert_eq!(snapshot.render_cursor, 2);
        assert_eq!(snapshot.halted, None);

        handle.cancel();
        assert_eq!(handle.join().await.unwrap(), SessionOutcome::Cancelled);

        let updates = drain(&mut ui_rx);
        let statuses: Vec<_> = updates
            .iter()
            .filter_map(|u| match u {
                UiUpdate::ConnectionStatus(s) => Some(*s),
                _ => None,
            })
            .collect();
        assert_eq!(
            statuses,
            vec![ConnectionStatus::Degraded, ConnectionStatus::Online]
        );
        assert_eq!(replay_starts(&updates), vec![(0, 2)]);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_rendering_and_polling() {
        let backend = ScriptedBackend::new(vec![Ok(face_offs(5))]);
        let (handle, _ui_rx) = start(backend.clone());
        let snapshots = handle.subscribe();

        sleep(Duration::from_millis(2500)).await;
        handle.cancel();
        assert_eq!(handle.join().await.unwrap(), SessionOutcome::Cancelled);

        let cursor = snapshots.borrow().render_cursor;
        let fetches = backend.fetch_count();
        sleep(Duration::from_secs(10)).await;
        assert_eq!(snapshots.borrow().render_cursor, cursor);
        assert_eq!(backend.fetch_count(), fetches);
    }

    #[tokio::test(start_paused = true)]
    async fn team_command_is_submitted_and_reported() {
        let backend = ScriptedBackend::new(vec![Ok(face_offs(1))]);
        let (handle, mut ui_rx) = start(backend.clone());

        handle.command(TeamCommand::GoalieOut).await.unwrap();
        let update = loop {
            match ui_rx.recv().await {
                Some(UiUpdate::CommandResult { command, result }) => break (command, result),
                Some(_) => continue,
                None => panic!("ui channel closed"),
            }
        };
        assert_eq!(update, (TeamCommand::GoalieOut, Ok(())));
        assert_eq!(*backend.commands.lock().unwrap(), vec![TeamCommand::GoalieOut]);

        handle.cancel();
        handle.join().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn commands_after_the_session_ends_are_rejected() {
        let backend = ScriptedBackend::new(vec![Ok(vec![ev(EventKind::GameFinished, 2, 2)])]);
        let (ui_tx, _ui_rx) = mpsc::channel(16);
        let handle = spawn(game(), None, backend.clone(), &timing(), ui_tx);

        while !handle.is_finished() {
            sleep(Duration::from_millis(100)).await;
        }
        let err = handle.command(TeamCommand::CoachSpeech).await.unwrap_err();
        assert!(matches!(err, SessionError::Closed));
        assert!(backend.commands.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_handle_cancels_the_session() {
        let backend = ScriptedBackend::new(vec![Ok(face_offs(5))]);
        let (handle, mut ui_rx) = start(backend.clone());

        sleep(Duration::from_millis(1500)).await;
        drop(handle);

        // The session task exits and drops its ui sender.
        while ui_rx.recv().await.is_some() {}
        let fetches = backend.fetch_count();
        sleep(Duration::from_secs(10)).await;
        assert_eq!(backend.fetch_count(), fetches);
    }
}
