use clap::Parser;
use client::input::{self, Command};
use client::network::GameClient;
use client::rendering::{self, TerminalGuard};
use log::{info, LevelFilter};
use shared::bot::Bots;
use shared::{
    timestamp_millis, Game, GameConfig, GameMap, LaserAction, MoveAction, Player, DEFAULT_PORT,
    MAX_NAME_LEN,
};
use std::error::Error;
use std::fs::File;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use uuid::Uuid;

const FRAME_INTERVAL: Duration = Duration::from_millis(50);

/// Local changes buffered for the network loop
const CLIENT_CHANGE_CAPACITY: usize = 16;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value_t = format!("127.0.0.1:{}", DEFAULT_PORT))]
    server: String,

    /// Player name shown to everyone
    #[arg(short = 'n', long, default_value = "Player")]
    name: String,

    /// Server password
    #[arg(short = 'p', long, default_value = "")]
    password: String,

    /// Play offline against bots instead of joining a server
    #[arg(long)]
    local: bool,

    /// Number of bots in a local game
    #[arg(short = 'b', long, default_value = "3")]
    bots: usize,

    /// Join the server as a headless bot
    #[arg(long)]
    bot: bool,

    /// Write logs to this file. The terminal is busy with the game.
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn init_logging(log_file: Option<&Path>, headless: bool) -> io::Result<()> {
    let mut builder = env_logger::Builder::from_default_env();
    match log_file {
        Some(path) => {
            let file = File::create(path)?;
            builder.target(env_logger::Target::Pipe(Box::new(file)));
        }
        // Log lines would tear the frame apart.
        None if !headless => {
            builder.filter_level(LevelFilter::Off);
        }
        None => {}
    }
    builder.init();
    Ok(())
}

/// Reads input and draws frames until the player quits, the engine stops or
/// `stop` completes. Returns the output of `stop` when it ended the game.
async fn play<F>(
    game: &Game,
    player_id: Uuid,
    stop: &mut F,
) -> Result<Option<F::Output>, Box<dyn Error>>
where
    F: Future + Unpin,
{
    let _terminal = TerminalGuard::new()?;
    let mut commands = input::spawn_input_reader();
    let mut frames = interval(FRAME_INTERVAL);
    frames.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut shutdown = game.shutdown_signal();
    let mut out = io::stdout();

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Move(direction)) => {
                    let action = MoveAction::new(player_id, direction, timestamp_millis());
                    game.submit_action(action.into()).await;
                }
                Some(Command::Fire(direction)) => {
                    let action =
                        LaserAction::new(Uuid::new_v4(), player_id, direction, timestamp_millis());
                    game.submit_action(action.into()).await;
                }
                Some(Command::Quit) | None => return Ok(None),
            },

            _ = frames.tick() => {
                let state = game.read().await;
                rendering::render(&mut out, &state, Some(player_id), timestamp_millis())?;
            }

            output = &mut *stop => return Ok(Some(output)),

            _ = shutdown.changed() => return Ok(None),
        }
    }
}

async fn run_local(args: &Args) -> Result<(), Box<dyn Error>> {
    let mut game = Game::new(GameMap::default_arena(), GameConfig::default());
    let player = Player::new(Uuid::new_v4(), args.name.as_str(), game.map().random_spawn_point());
    let player_id = player.id;
    game.write().await.add_entity(player.into());

    let mut bots = Bots::new(&game);
    for i in 0..args.bots {
        bots.add_bot(&format!("Bot{}", i + 1)).await;
    }
    game.start();
    if !bots.is_empty() {
        bots.start();
    }

    info!("Local game started with {} bots", args.bots);
    play(&game, player_id, &mut std::future::pending::<()>()).await?;
    game.shutdown();
    Ok(())
}

async fn run_remote(args: &Args) -> Result<(), Box<dyn Error>> {
    let config = GameConfig {
        change_channel_capacity: CLIENT_CHANGE_CAPACITY,
        ..GameConfig::mirror()
    };
    let mut game = Game::new(GameMap::default_arena(), config);
    let player_id = Uuid::new_v4();

    let (client, entities) =
        GameClient::connect(&args.server, player_id, &args.name, &args.password).await?;
    {
        let mut state = game.write().await;
        for entity in entities {
            state.update_entity(entity);
        }
    }

    let changes = game
        .take_changes()
        .ok_or("change stream already taken")?;
    game.start();
    let mut network = tokio::spawn(client.run(game.state(), changes, game.shutdown_signal()));

    let finished = if args.bot {
        let mut bots = Bots::new(&game);
        bots.control(player_id);
        bots.start();
        info!("Playing as a bot, press Ctrl+C to leave");

        tokio::select! {
            result = &mut network => Some(result),
            _ = tokio::signal::ctrl_c() => None,
        }
    } else {
        play(&game, player_id, &mut network).await?
    };

    game.shutdown();
    let result = match finished {
        Some(result) => result,
        None => network.await,
    };
    result??;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_logging(args.log_file.as_deref(), args.bot)?;

    if args.name.is_empty() || args.name.chars().count() > MAX_NAME_LEN {
        return Err(format!("name must be 1 to {} characters", MAX_NAME_LEN).into());
    }

    if args.local {
        run_local(&args).await
    } else {
        run_remote(&args).await
    }
}
