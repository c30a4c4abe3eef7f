// rinkcast entry point.
//
// Startup sequence:
// 1. Initialize tracing (log to file, the terminal carries the match feed)
// 2. Load config
// 3. Build the NEAR RPC backend
// 4. Resolve the account's game and start the session
// 5. Print the feed, forward stdin commands, cancel on `q` or Ctrl+C
// 6. Report the outcome

use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};

use rinkcast_app::controller::MatchSessionController;
use rinkcast_app::protocol::SessionOutcome;
use rinkcast_cli::input::{self, InputCommand};
use rinkcast_cli::presenter;
use rinkcast_core::config;
use rinkcast_near::rpc::NearRpcBackend;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize tracing
    init_tracing()?;
    info!("rinkcast starting up");

    // 2. Load config
    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "Config loaded: contract={}, account={}, poll every {}ms",
        config.backend.contract_id, config.account.account_id, config.timing.poll_interval_ms
    );

    // 3. Build the backend
    let backend =
        NearRpcBackend::from_config(&config).context("failed to build the NEAR RPC backend")?;
    if config.backend.relayer_url.is_none() {
        info!("No relayer configured, team commands are disabled");
    }

    // 4. Resolve and start the session
    let account_id = config.account.account_id.clone();
    let controller =
        MatchSessionController::new(Arc::new(backend), account_id.clone(), config.timing.clone());
    let (ui_tx, mut ui_rx) = mpsc::channel(256);

    let Some(handle) = controller.start(ui_tx).await? else {
        println!("{account_id} is not playing in any game right now.");
        return Ok(());
    };

    let opponent = handle.snapshot().opponent;
    println!(
        "Game {}: {} vs {}",
        handle.game().game_id,
        account_id,
        opponent.as_deref().unwrap_or("unknown")
    );
    println!("{}", input::HELP);

    // 5. Feed and input loop. Ends once the session task has dropped its
    // side of the UI channel.
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            update = ui_rx.recv() => {
                match update {
                    Some(update) => {
                        if let Some(line) = presenter::format_update(&update, opponent.as_deref()) {
                            println!("{line}");
                        }
                    }
                    None => break,
                }
            }

            line = lines.next_line(), if stdin_open => {
                match line {
                    Ok(Some(line)) => match input::parse_line(&line) {
                        Some(InputCommand::Quit) => {
                            info!("Quit requested");
                            handle.cancel();
                        }
                        Some(InputCommand::Team(command)) => {
                            if let Err(e) = handle.command(command).await {
                                println!("> {e}");
                            }
                        }
                        None if line.trim().is_empty() => {}
                        None => println!("{}", input::HELP),
                    },
                    Ok(None) => stdin_open = false,
                    Err(e) => {
                        warn!("Failed to read stdin: {}", e);
                        stdin_open = false;
                    }
                }
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl+C received");
                handle.cancel();
            }
        }
    }

    // 6. Outcome
    match handle.join().await.context("match session task failed")? {
        SessionOutcome::Finished(score) => {
            info!("Game over {}:{}", score.own, score.opponent);
        }
        SessionOutcome::Cancelled => println!("Left the game."),
        SessionOutcome::Halted(regression) => {
            return Err(anyhow::Error::new(regression).context("match session halted"));
        }
    }

    info!("rinkcast shut down cleanly");
    Ok(())
}

/// Initialize tracing to log to a file (not the terminal, which shows the feed).
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = std::env::current_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::File::create(log_dir.join("rinkcast.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("rinkcast=info,warn")),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
