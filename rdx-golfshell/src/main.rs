use anyhow::Result;
use colored::Colorize;
use minigolf::interfaces::{AudioCue, AudioCues, UiNotifier};
use minigolf::prelude::*;
use minigolf::engine::Collaborators;
use minigolf::{ENGINE_NAME, VERSION as LIB_VERSION};
use rustyline::highlight::Highlighter;
use rustyline::Editor;
use rustyline_derive::{Completer, Helper, Hinter, Validator};
use std::borrow::Cow;
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::info;
use tracing_subscriber::EnvFilter;

const SHELL_VERSION: &str = env!("CARGO_PKG_VERSION");

const LOGO_TEXT: &str = r"
            _       _            _  __     _          _ _
  _ __ ___ (_)_ __ (_)  __ _  __| |/ _|___| |__   ___| | |
 | '_ ` _ \| | '_ \| | / _` |/ _ \ | |_/ __| '_ \ / _ \ | |
 | | | | | | | | | | || (_| | (_) | |  _\__ \ | | |  __/ | |
 |_| |_| |_|_|_| |_|_| \__, |\___/|_|_| |___/_| |_|\___|_|_|
                       |___/
";

/// A custom helper struct for rustyline that enables syntax highlighting.
#[derive(Completer, Helper, Hinter, Validator)]
struct ShellHighlighter;

impl Highlighter for ShellHighlighter {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if let Some((command, rest)) = line.split_once(' ') {
            Cow::Owned(format!("{} {}", command.green().bold(), rest.green()))
        } else {
            Cow::Owned(line.green().bold().to_string())
        }
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

/// Prints UI notifications between prompts.
struct ShellUi;

impl UiNotifier for ShellUi {
    fn update_hole_info(&self, hole: u32, total_holes: u32, par: u32) {
        println!("\n<-- {} {hole}/{total_holes}  par {par}", "HOLE".cyan().bold());
    }

    fn update_score(&self, strokes: u32, total_strokes: u32) {
        println!("<-- strokes {strokes} (round {total_strokes})");
    }

    fn show_message(&self, text: &str) {
        println!("\n<-- {}", text.yellow().bold());
    }

    fn show_final_scorecard(&self, card: &[HoleScore]) {
        println!("\n{}", "  FINAL SCORECARD".cyan().bold());
        for score in card {
            let relative = match score.relative_to_par() {
                0 => "E".to_string(),
                n if n > 0 => format!("+{n}"),
                n => n.to_string(),
            };
            println!(
                "  hole {:>2}  par {}  strokes {:>2}  {:>3}  {}",
                score.hole,
                score.par,
                score.strokes,
                relative,
                score.label().dimmed()
            );
        }
    }
}

struct ShellAudio;

impl AudioCues for ShellAudio {
    fn play(&self, cue: AudioCue) {
        let sound = match cue {
            AudioCue::Hit => "*tock*",
            AudioCue::Success => "*clunk* *applause*",
            AudioCue::OutOfBounds => "*splash*",
        };
        println!("<-- {}", sound.dimmed());
    }
}

fn print_banner() {
    if env::var("QUIET_MODE").is_ok() {
        return;
    }
    println!("{}", LOGO_TEXT.green());
    println!("{}", "-".repeat(64).dimmed());
    println!(
        "          Shell   v{:<8} Library   v{:<8}",
        SHELL_VERSION, LIB_VERSION
    );
    println!(
        "{}",
        "    Distributed under the MIT OR Apache-2.0 license.".dimmed()
    );
    println!("{}", "-".repeat(64).dimmed());
}

fn print_help() {
    println!("Available commands:");
    println!("  hit <DEG> <POWER>     - Shoots at DEG degrees (0 = towards the cup line) with POWER 0..1.");
    println!("  status                - Shows hole, state, ball and strokes.");
    println!("  reset                 - Puts the ball back on its last safe spot.");
    println!("  retry                 - Retries a failed hole transition.");
    println!("  cancel                - Cancels the hole transition in flight.");
    println!("  history [N]           - Shows the last N events (default 10).");
    println!("  debug <draw|hazards|events>  - Toggles a debug flag.");
    println!("  exit                  - Quits the shell.");
}

fn print_status(game: &Game) {
    let progress = game.state().progress();
    println!(
        "--> hole {}/{}  state {}  strokes {} (round {})",
        progress.current_hole,
        progress.total_holes,
        game.state().state().to_string().cyan(),
        game.scorer().current_strokes(),
        game.scorer().total_strokes()
    );
    match (game.ball().ball_state(), game.course().hole_position()) {
        (Some(ball), Some(cup)) => println!(
            "--> ball ({:.2}, {:.2}, {:.2}){}  cup ({:.2}, {:.2}, {:.2})",
            ball.position.x,
            ball.position.y,
            ball.position.z,
            if ball.is_moving { " moving" } else { "" },
            cup.x,
            cup.y,
            cup.z
        ),
        _ => println!("--> no ball on the course"),
    }
    let flags = game.debug_flags();
    println!(
        "--> debug draw {}  hazards {}  events {}",
        flags.physics_debug_draw, flags.show_hazards, flags.verbose_events
    );
    for zone in game.hazard_overlay() {
        let (min, max) = (zone.volume.min, zone.volume.max);
        println!(
            "    {:?} ({:.1}, {:.1}, {:.1}) .. ({:.1}, {:.1}, {:.1})",
            zone.kind, min.x, min.y, min.z, max.x, max.y, max.z
        );
    }
}

// The fairways run along +z, so 0 degrees points down the hole.
fn aim(degrees: f32) -> Vec3 {
    let radians = degrees.to_radians();
    Vec3::new(radians.sin(), 0.0, radians.cos())
}

#[tokio::main]
async fn main() -> Result<()> {
    print_banner();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_target(false)
        .init();

    let config = GameConfig::load(env::var("GOLFSHELL_CONFIG").ok().as_deref().map(std::path::Path::new))?;
    let mut collaborators = Collaborators::sandbox(&config);
    collaborators.ui = Arc::new(ShellUi);
    collaborators.audio = Arc::new(ShellAudio);
    let game = Game::new(config, collaborators);

    info!("Spawning {} in the background...", ENGINE_NAME);
    game.start().await?;
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let runner = game.clone();
    tokio::spawn(async move {
        if let Err(e) = runner.run(shutdown_rx).await {
            eprintln!("\nGame loop stopped with an error: {}", e);
        }
    });

    tokio::time::sleep(Duration::from_millis(100)).await;

    let mut rl = Editor::new()?;
    rl.set_helper(Some(ShellHighlighter));

    println!("{} is running. Type 'help' for commands or 'exit' to quit.", ENGINE_NAME.green());

    loop {
        let prompt = format!("{}", "⛳ ".green().bold());
        let readline = rl.readline(&prompt);
        match readline {
            Ok(line) => {
                rl.add_history_entry(line.as_str())?;
                let args = line.split_whitespace().collect::<Vec<_>>();
                let Some(command) = args.first() else {
                    continue;
                };
                match *command {
                    "hit" => {
                        let degrees = args.get(1).and_then(|s| s.parse::<f32>().ok());
                        let power = args.get(2).and_then(|s| s.parse::<f32>().ok());
                        match (degrees, power) {
                            (Some(degrees), Some(power)) => {
                                if !game.hit(aim(degrees), power) {
                                    println!("--> Can't shoot right now ({}).", game.state().state());
                                }
                            }
                            _ => println!("Usage: hit <DEGREES> <POWER>"),
                        }
                    }
                    "status" => print_status(&game),
                    "reset" => match game.reset_ball() {
                        Some(at) => println!("--> Ball placed at ({:.2}, {:.2}, {:.2}).", at.x, at.y, at.z),
                        None => println!("--> Nothing to reset."),
                    },
                    "retry" => {
                        if game.retry_transition().await {
                            println!("--> Moved on to hole {}.", game.state().current_hole());
                        } else {
                            let reason = game
                                .coordinator()
                                .last_failure()
                                .unwrap_or_else(|| "not applicable".to_string());
                            println!("--> Retry did not advance: {}", reason);
                        }
                    }
                    "cancel" => {
                        if game.coordinator().is_active() || game.completion().is_transitioning() {
                            game.cancel_handle().cancel();
                            println!("--> Cancellation requested.");
                        } else {
                            println!("--> No transition in flight.");
                        }
                    }
                    "history" => {
                        let count = args.get(1).and_then(|s| s.parse::<usize>().ok()).unwrap_or(10);
                        let history = game.bus().history();
                        for event in history.iter().rev().take(count).rev() {
                            println!(
                                "  {} {:<16} {}",
                                event.timestamp.format("%H:%M:%S%.3f").to_string().dimmed(),
                                event.kind().to_string().cyan(),
                                event.summary()
                            );
                        }
                    }
                    "debug" => match args.get(1).copied() {
                        Some("draw") => game.set_debug(|d| d.physics_debug_draw = !d.physics_debug_draw),
                        Some("hazards") => game.set_debug(|d| d.show_hazards = !d.show_hazards),
                        Some("events") => game.set_debug(|d| d.verbose_events = !d.verbose_events),
                        _ => println!("Usage: debug <draw|hazards|events>"),
                    },
                    "help" => print_help(),
                    "exit" => break,
                    _ => println!("Unknown command: '{}'. Type 'help'.", line),
                }
            }
            Err(_) => {
                println!("Exiting golfshell...");
                break;
            }
        }
    }

    shutdown_tx.send(()).ok();
    game.shutdown();
    Ok(())
}
