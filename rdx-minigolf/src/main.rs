use anyhow::Result;
use minigolf::common::horizontal_distance;
use minigolf::prelude::*;
use minigolf::sandbox::physics::ROLLING_FRICTION;
use minigolf::{ENGINE_NAME, VERSION};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// How long the caddie looks at the green between checks.
const CADDIE_PAUSE: Duration = Duration::from_millis(250);

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    // 2. Load configuration: optional TOML path as the first argument, then MINIGOLF_* env.
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = GameConfig::load(config_path.as_deref())?;
    let max_impulse = config.ball.max_hit_impulse;

    // 3. Assemble the game over the sandbox collaborators.
    let game = Game::sandbox(config);
    info!("{} v{} autoplaying a round", ENGINE_NAME, VERSION);

    // 4. Stop the loop when the course is finished.
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let done_tx = shutdown_tx.clone();
    let _done = game
        .bus()
        .subscribe(EventKind::GameCompleted, "golfdev.shutdown", move |_| {
            done_tx.send(()).ok();
            Ok(())
        });

    // 5. Load the first hole, start ticking and let the caddie play.
    game.start().await?;
    let runner = game.clone();
    let mut loop_task = tokio::spawn(async move { runner.run(shutdown_rx).await });
    let caddie = tokio::spawn(play(game.clone(), max_impulse));

    tokio::select! {
        result = &mut loop_task => result??,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received.");
            shutdown_tx.send(()).ok();
            loop_task.await??;
        }
    }
    caddie.abort();
    game.shutdown();

    info!(
        strokes = game.scorer().total_strokes(),
        holes = game.scorer().card().len(),
        "round over"
    );
    Ok(())
}

/// Aims every shot straight at the cup. The first shot on each hole comes up short.
async fn play(game: Game, max_impulse: f32) {
    loop {
        tokio::time::sleep(CADDIE_PAUSE).await;
        if game.state().is_in_state(GameState::GameCompleted) {
            return;
        }
        if !game.input().is_enabled() || !game.state().is_in_state(GameState::Aiming) {
            continue;
        }
        let (Some(ball), Some(cup)) = (game.ball().position(), game.course().hole_position()) else {
            continue;
        };
        // Already down; waiting for the completion check.
        if ball.y < cup.y {
            continue;
        }
        let distance = horizontal_distance(ball, cup);
        let aim = Vec3::new(cup.x - ball.x, 0.0, cup.z - ball.z);
        // v^2 = 2 * friction * distance, plus a little to carry over the lip.
        let speed = (2.0 * ROLLING_FRICTION * (distance + 0.3)).sqrt();
        let short = if game.scorer().current_strokes() == 0 { 0.7 } else { 1.0 };
        let power = (speed * short / max_impulse).clamp(0.05, 1.0);

        info!(
            hole = game.state().current_hole(),
            distance = %format!("{distance:.2}"),
            power = %format!("{power:.2}"),
            "caddie lines up a shot"
        );
        if !game.hit(aim, power) {
            warn!("shot was refused");
        }
    }
}
