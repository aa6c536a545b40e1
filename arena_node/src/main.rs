use anyhow::{Context, Result, bail};
use arena_core::{
    ArenaConfig, ArenaError, ArenaHandle, ArenaService, ItemLog, Pose, RetryPolicy,
    RetryingBackend, SimBackend, ZoneFlags,
};
use clap::{ArgAction, Parser};
use std::sync::Arc;
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, BufReader},
    task::JoinHandle,
};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(version, about = "Item economy for a multi-robot collection arena", long_about = None)]
struct Args {
    /// Seed for cluster colours and item placement
    #[arg(long, value_name = "RANDOM_SEED")]
    random_seed: u64,

    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    zone_top_left: bool,

    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    zone_top_right: bool,

    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    zone_bottom_left: bool,

    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    zone_bottom_right: bool,

    /// Tick period of the sync loop in milliseconds
    #[arg(long, default_value_t = 100)]
    tick_ms: u64,

    /// Number of simulated robots (robot1..robotN)
    #[arg(long, default_value_t = 1)]
    robots: usize,

    /// Attempts per backend call before it counts as unavailable
    #[arg(long, default_value_t = 5)]
    backend_attempts: u32,
}

impl Args {
    fn config(&self) -> ArenaConfig {
        ArenaConfig {
            random_seed: self.random_seed,
            zones: ZoneFlags {
                top_left: self.zone_top_left,
                top_right: self.zone_top_right,
                bottom_left: self.zone_bottom_left,
                bottom_right: self.zone_bottom_right,
            },
            tick_period_ms: self.tick_ms,
            retry: RetryPolicy {
                max_attempts: self.backend_attempts,
                ..RetryPolicy::default()
            },
            ..ArenaConfig::default()
        }
    }
}

/// One operator command read from stdin.
#[derive(Debug, PartialEq)]
enum Command {
    Pick(String),
    Offload(String),
    Move { robot_id: String, x: f64, y: f64 },
    Status,
    Quit,
}

fn parse_command(line: &str) -> Result<Command> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let command = match tokens.as_slice() {
        ["pick", robot_id] => Command::Pick(robot_id.to_string()),
        ["offload", robot_id] => Command::Offload(robot_id.to_string()),
        ["move", robot_id, x, y] => Command::Move {
            robot_id: robot_id.to_string(),
            x: x.parse().with_context(|| format!("invalid x '{x}'"))?,
            y: y.parse().with_context(|| format!("invalid y '{y}'"))?,
        },
        ["status"] => Command::Status,
        ["quit"] | ["exit"] => Command::Quit,
        _ => bail!("unknown command '{}'", line.trim()),
    };
    Ok(command)
}

struct App {
    /// Client of the arena service.
    arena: ArenaHandle,
    /// Backend the robots live in.
    sim: SimBackend,
    /// Flag to control the main loop.
    should_quit: bool,
}

impl App {
    async fn execute(&mut self, command: Command) -> Result<()> {
        match command {
            Command::Pick(robot_id) => {
                let response = self.arena.pick_up_item(&robot_id).await?;
                println!("{}", serde_json::to_string(&response)?);
            }
            Command::Offload(robot_id) => match self.arena.offload_item(&robot_id).await {
                Ok(response) => println!("{}", serde_json::to_string(&response)?),
                Err(error) if error.is_backend_unavailable() => {
                    warn!(%robot_id, %error, "offload deferred, backend unavailable");
                    println!("backend unavailable, try again");
                }
                Err(error) => return Err(error.into()),
            },
            Command::Move { robot_id, x, y } => {
                if !self.sim.move_entity(&robot_id, x, y) {
                    println!("no entity named '{robot_id}'");
                }
            }
            Command::Status => {
                let telemetry = self.arena.telemetry().borrow().clone();
                println!("{}", serde_json::to_string_pretty(&telemetry)?);
            }
            Command::Quit => self.should_quit = true,
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let config = args.config();

    let sim = SimBackend::new();
    for index in 1..=args.robots {
        sim.add_entity(&format!("robot{index}"), Pose::default());
    }
    let backend = RetryingBackend::new(sim.clone(), config.retry.clone());
    let (service, arena) = ArenaService::new(&config, Arc::new(backend));
    let service = service.spawn();

    info!(seed = config.random_seed, robots = args.robots, "arena node running");
    tokio::spawn(print_item_log(arena.clone()));

    let mut app = App {
        arena,
        sim,
        should_quit: false,
    };
    serve(&mut app, BufReader::new(tokio::io::stdin()), service).await
}

/// Runs the console until it ends, or until the arena service stops on its own.
async fn serve<R>(
    app: &mut App,
    input: R,
    mut service: JoinHandle<Result<(), ArenaError>>,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let stopped = tokio::select! {
        console = run_console(app, input) => {
            console?;
            None
        }
        finished = &mut service => Some(finished),
    };

    match stopped {
        Some(finished) => {
            finished.context("arena service panicked")??;
            warn!("arena service stopped");
        }
        None => {
            app.arena.shutdown().await.ok();
            service.await.context("arena service panicked")??;
        }
    }
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

/// Reads commands until `quit` or end of input.
async fn run_console<R>(app: &mut App, input: R) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        match parse_command(&line) {
            Ok(command) => app.execute(command).await?,
            Err(error) => println!("{error:#}"),
        }
        if app.should_quit {
            break;
        }
    }
    Ok(())
}

/// Prints the item log as JSON whenever the score changes.
async fn print_item_log(arena: ArenaHandle) {
    let mut telemetry = arena.telemetry();
    let mut last = ItemLog::default();
    while telemetry.changed().await.is_ok() {
        let log = telemetry.borrow_and_update().log;
        if log != last {
            if let Ok(json) = serde_json::to_string(&log) {
                println!("{json}");
            }
            last = log;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arena_core::PlacementError;

    #[test]
    fn commands_parse() {
        assert_eq!(parse_command("pick robot1").unwrap(), Command::Pick("robot1".into()));
        assert_eq!(
            parse_command("  move robot2 1.5 -2 ").unwrap(),
            Command::Move {
                robot_id: "robot2".into(),
                x: 1.5,
                y: -2.0
            }
        );
        assert_eq!(parse_command("exit").unwrap(), Command::Quit);
        assert!(parse_command("move robot1 up 2").is_err());
        assert!(parse_command("dance").is_err());
    }

    #[test]
    fn zone_flags_come_from_args() {
        let args = Args::parse_from([
            "arena_node",
            "--random-seed",
            "7",
            "--zone-top-right",
            "false",
        ]);
        let config = args.config();
        assert_eq!(config.random_seed, 7);
        assert!(config.zones.top_left);
        assert!(!config.zones.top_right);
        assert_eq!(config.tick_period_ms, 100);
    }

    #[test]
    fn seed_is_required() {
        assert!(Args::try_parse_from(["arena_node"]).is_err());
    }

    fn app(sim: &SimBackend) -> (ArenaService, App) {
        let (service, arena) =
            ArenaService::new(&ArenaConfig::with_seed(3), Arc::new(sim.clone()));
        let app = App {
            arena,
            sim: sim.clone(),
            should_quit: false,
        };
        (service, app)
    }

    #[tokio::test]
    async fn failed_service_ends_the_node_without_input() {
        let (_service, mut app) = app(&SimBackend::new());
        let failed = tokio::spawn(async {
            Err(ArenaError::Placement(PlacementError::UnknownCluster(
                "cluster0".to_string(),
            )))
        });
        // The writer stays open, so the console never sees end of input.
        let (_writer, reader) = tokio::io::duplex(64);

        let result = serve(&mut app, BufReader::new(reader), failed).await;
        let error = result.unwrap_err();
        assert_eq!(
            error.downcast_ref::<ArenaError>(),
            Some(&ArenaError::Placement(PlacementError::UnknownCluster(
                "cluster0".to_string()
            )))
        );
    }

    #[tokio::test]
    async fn quit_shuts_the_service_down() {
        let sim = SimBackend::new();
        let (service, mut app) = app(&sim);
        let service = service.spawn();

        let input: &[u8] = b"status\nquit\n";
        serve(&mut app, input, service).await.unwrap();
        assert!(app.should_quit);
    }
}
