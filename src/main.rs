use std::time::Duration;

use clap::{Parser, Subcommand};
use planning_poker::config::{
    DEFAULT_GRACE_SECS, DEFAULT_MAX_PARTICIPANTS, DEFAULT_MAX_ROOMS, ServerConfig,
};
use planning_poker::protocol::DEFAULT_PORT;
use planning_poker::{client, server};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Host planning poker rooms
    Serve {
        /// Address to listen on
        #[arg(long, env = "POKER_HOST", default_value = "0.0.0.0")]
        host: String,

        /// Port to listen on
        #[arg(short, long, env = "POKER_PORT", default_value_t = DEFAULT_PORT)]
        port: u16,

        /// Seconds a dropped participant may take to reconnect
        #[arg(long, env = "POKER_GRACE_SECS", default_value_t = DEFAULT_GRACE_SECS)]
        grace_secs: u64,

        /// Maximum number of open rooms
        #[arg(long, env = "POKER_MAX_ROOMS", default_value_t = DEFAULT_MAX_ROOMS)]
        max_rooms: usize,

        /// Maximum participants per room
        #[arg(long, env = "POKER_MAX_PARTICIPANTS", default_value_t = DEFAULT_MAX_PARTICIPANTS)]
        max_participants: usize,
    },

    /// Join a room from the terminal
    Join {
        /// Server host
        #[arg(long, env = "POKER_SERVER", default_value = "127.0.0.1")]
        host: String,

        /// Server port
        #[arg(short, long, env = "POKER_PORT", default_value_t = DEFAULT_PORT)]
        port: u16,

        /// Room to join (created if it does not exist)
        #[arg(short, long)]
        room: String,

        /// Your display name
        #[arg(short, long)]
        name: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let result = match args.command {
        Commands::Serve {
            host,
            port,
            grace_secs,
            max_rooms,
            max_participants,
        } => {
            let config = ServerConfig {
                host,
                port,
                grace_period: Duration::from_secs(grace_secs),
                max_rooms,
                max_participants,
            };
            server::run(config).await
        }
        Commands::Join {
            host,
            port,
            room,
            name,
        } => client::run(host, port, room, name).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
