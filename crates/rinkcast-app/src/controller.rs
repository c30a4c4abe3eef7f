// Match session controller: finds the local account's game and starts a
// fresh session for it.

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::mpsc;
use tracing::info;

use rinkcast_core::config::TimingConfig;
use rinkcast_near::backend::{BackendError, GameBackend, GameSession};

use crate::protocol::UiUpdate;
use crate::session::{self, SessionHandle};

/// The first listed game the account takes part in, if any.
pub async fn resolve_game(
    backend: &dyn GameBackend,
    account_id: &str,
) -> Result<Option<GameSession>, BackendError> {
    let games = backend.available_games().await?;
    Ok(games.into_iter().find(|game| game.includes(account_id)))
}

pub struct MatchSessionController {
    backend: Arc<dyn GameBackend>,
    account_id: String,
    timing: TimingConfig,
}

impl MatchSessionController {
    pub fn new(backend: Arc<dyn GameBackend>, account_id: String, timing: TimingConfig) -> Self {
        MatchSessionController {
            backend,
            account_id,
            timing,
        }
    }

    /// Resolve the account's current game and start a session for it.
    ///
    /// Returns `Ok(None)` when the account is not in any listed game; no
    /// polling happens in that case.
    pub async fn start(
        &self,
        ui_tx: mpsc::Sender<UiUpdate>,
    ) -> anyhow::Result<Option<SessionHandle>> {
        let game = resolve_game(self.backend.as_ref(), &self.account_id)
            .await
            .context("failed to list available games")?;

        let Some(game) = game else {
            info!("No game in progress for {}", self.account_id);
            return Ok(None);
        };

        Ok(Some(self.start_session(game, ui_tx)))
    }

    /// Start a session for a known game. Cursor and cache start empty.
    pub fn start_session(&self, game: GameSession, ui_tx: mpsc::Sender<UiUpdate>) -> SessionHandle {
        let opponent = game.opponent_of(&self.account_id).map(str::to_string);
        info!(
            "Joining game {} against {}",
            game.game_id,
            opponent.as_deref().unwrap_or("unknown")
        );
        session::spawn(game, opponent, Arc::clone(&self.backend), &self.timing, ui_tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use rinkcast_core::event::LogRecord;
    use rinkcast_near::backend::TeamCommand;

    struct ListingBackend {
        games: Result<Vec<GameSession>, BackendError>,
        fetches: AtomicUsize,
    }

    impl ListingBackend {
        fn new(games: Result<Vec<GameSession>, BackendError>) -> Arc<Self> {
            Arc::new(ListingBackend {
                games,
                fetches: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl GameBackend for ListingBackend {
        async fn available_games(&self) -> Result<Vec<GameSession>, BackendError> {
            self.games.clone()
        }

        async fn fetch_events(&self, _game_id: u64) -> Result<Vec<LogRecord>, BackendError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        }

        async fn submit_command(
            &self,
            _game_id: u64,
            _command: TeamCommand,
        ) -> Result<(), BackendError> {
            Ok(())
        }
    }

    fn game(id: u64, a: &str, b: &str) -> GameSession {
        GameSession {
            game_id: id,
            players: (a.into(), b.into()),
        }
    }

    fn controller(backend: Arc<ListingBackend>) -> MatchSessionController {
        MatchSessionController::new(backend, "alice.testnet".into(), TimingConfig::default())
    }

    #[tokio::test]
    async fn resolves_first_game_with_the_account() {
        let backend = ListingBackend::new(Ok(vec![
            game(1, "carol.testnet", "dave.testnet"),
            game(2, "bob.testnet", "alice.testnet"),
            game(3, "alice.testnet", "erin.testnet"),
        ]));
        let found = resolve_game(backend.as_ref(), "alice.testnet").await.unwrap();
        assert_eq!(found.map(|g| g.game_id), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn no_game_means_no_session_and_no_polling() {
        let backend = ListingBackend::new(Ok(vec![game(1, "carol.testnet", "dave.testnet")]));
        let (ui_tx, _ui_rx) = mpsc::channel(8);

        let handle = controller(backend.clone()).start(ui_tx).await.unwrap();
        assert!(handle.is_none());

        tokio::time::sleep(std::time::Duration::from_secs(10)).await;
        assert_eq!(backend.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn listing_failure_is_an_error() {
        let backend = ListingBackend::new(Err(BackendError::RemoteUnavailable("down".into())));
        let (ui_tx, _ui_rx) = mpsc::channel(8);
        let err = controller(backend).start(ui_tx).await.unwrap_err();
        assert!(err.to_string().contains("available games"));
    }

    #[tokio::test(start_paused = true)]
    async fn started_session_starts_from_the_beginning() {
        let backend = ListingBackend::new(Ok(vec![game(9, "alice.testnet", "bob.testnet")]));
        let (ui_tx, _ui_rx) = mpsc::channel(8);

        let handle = controller(backend.clone())
            .start(ui_tx)
            .await
            .unwrap()
            .expect("alice plays in game 9");

        let snapshot = handle.snapshot();
        assert_eq!(snapshot.game_id, 9);
        assert_eq!(snapshot.opponent.as_deref(), Some("bob.testnet"));
        assert_eq!(snapshot.render_cursor, 0);
        assert_eq!(snapshot.known_log_length, 0);

        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        assert_eq!(backend.fetches.load(Ordering::SeqCst), 1);

        handle.cancel();
        handle.join().await.unwrap();
    }
}
