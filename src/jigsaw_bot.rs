// src/jigsaw_bot.rs
//
// Headless jigsaw player. Connects to the arena, plays a number of rounds by
// pulling pieces and reporting a made-up tally, then leaves cleanly.
//
// CLI Options:
// - --name: display name (defaults to client_name from conf/client.conf)
// - --rounds: how many rounds to play
// - --top: print the leaderboard before playing

use std::error::Error;
use std::time::Duration;

use clap::Parser;

use jigsaw_arena::arbiter::Outcome;
use jigsaw_arena::client::ArenaClient;
use jigsaw_arena::config::ClientConfig;
use jigsaw_arena::defs::MIN_ROUND_SECONDS;

#[derive(Parser)]
#[command(name = env!("CARGO_BIN_NAME"))]
#[command(about = "Jigsaw Bot - plays unattended rounds against the arena server")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Args {
    /// Server host (overrides the config file)
    #[arg(long)]
    host: Option<String>,

    /// Server port (overrides the config file)
    #[arg(long)]
    port: Option<u16>,

    /// Display name
    #[arg(long)]
    name: Option<String>,

    /// Number of rounds to play
    #[arg(long)]
    rounds: Option<u32>,

    /// Print the leaderboard before playing
    #[arg(long)]
    top: bool,

    /// Pause between piece requests, in milliseconds
    #[arg(long, default_value_t = 200)]
    pace_ms: u64,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    match run_bot(args).await {
        Ok(_) => {
            println!("Bot finished successfully.");
        }
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

async fn run_bot(args: Args) -> Result<(), Box<dyn Error>> {
    let mut config = ClientConfig::load_or_default();
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(name) = args.name {
        config.client_name = name;
    }
    if let Some(rounds) = args.rounds {
        config.rounds = rounds;
    }

    let server_addr = config.server_addr();
    print!("Connecting to arena at {server_addr}...");
    let mut client = match ArenaClient::connect(server_addr.as_str(), &config.client_name).await {
        Ok(client) => {
            println!("Ok.");
            client
        }
        Err(e) => {
            println!("Error.");
            eprintln!("Make sure the jigsaw server is running on {server_addr}");
            return Err(e.into());
        }
    };

    if args.top {
        print_leaderboard(&mut client).await?;
    }

    let pace = Duration::from_millis(args.pace_ms);
    let mut wins = 0;
    for round in 1..=config.rounds {
        println!("Round {round}/{}: waiting for a room...", config.rounds);
        let start = client.begin().await?;
        match &start.opponent {
            Some(opponent) => println!("Playing against {opponent} for {}s", start.time_limit_seconds),
            None => println!("Playing solo for {}s", start.time_limit_seconds),
        }

        let planned = rand::random_range(1..=8u32);
        let mut placed = 0;
        let mut forfeited = false;
        for _ in 0..planned {
            let piece = client.figure().await?;
            if rand::random_bool(0.8) {
                placed += 1;
            }
            println!("  piece #{} covers {} cell(s)", piece.index(), piece.occupied_cells());
            tokio::time::sleep(pace).await;
            if client.opponent_vanished().await? {
                println!("  opponent left the round");
                forfeited = true;
                break;
            }
        }

        let elapsed = rand::random_range(MIN_ROUND_SECONDS..=start.time_limit_seconds.max(MIN_ROUND_SECONDS));
        let outcome = client.end(placed, elapsed).await?;
        if outcome == Outcome::Won {
            wins += 1;
        }
        println!(
            "Round {round}: {placed} piece(s) in {elapsed}s -> {outcome:?}{}",
            if forfeited { " (forfeit)" } else { "" }
        );
    }

    println!("Won {wins} of {} round(s)", config.rounds);
    if args.top {
        print_leaderboard(&mut client).await?;
    }
    client.exit().await?;
    Ok(())
}

async fn print_leaderboard(client: &mut ArenaClient) -> Result<(), Box<dyn Error>> {
    let entries = client.top().await?;
    println!("Leaderboard:");
    if entries.is_empty() {
        println!("  (no results yet)");
    }
    for (rank, entry) in entries.iter().enumerate() {
        println!(
            "  {:>2}. {:<20} {:>4} moves {:>5}s  {}",
            rank + 1,
            entry.login,
            entry.moves_done,
            entry.elapsed_seconds,
            entry.end_time.format("%Y-%m-%d %H:%M:%S")
        );
    }
    Ok(())
}
