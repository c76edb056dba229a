//! XMPP SASL CLI binary.
//!
//! # Commands
//!
//! - `connect` - Negotiate against a server up to the first challenge
//! - `replay` - Feed a recorded server transcript through a session
//! - `select` - Show which mechanism would be chosen from an offer
//! - `encode` - Base64-encode a SASL payload
//! - `decode` - Decode a base64 challenge

use std::io::{self, Read};
use std::path::PathBuf;

use bytes::Bytes;
use clap::{Parser, Subcommand};
use xmppsasl::{
    codec::base64,
    protocol::{select, Challenge, Credentials, MechanismSet, Session},
    transport::{MemoryTransport, TcpClient, TransportEvent},
    Config, VERSION,
};

#[derive(Parser)]
#[command(name = "xmpp-sasl")]
#[command(version = VERSION)]
#[command(about = "XMPP SASL negotiation engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect and negotiate up to the first server challenge
    Connect {
        /// Config file (default: <config_dir>/xmpp-sasl/config.toml if present)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Server domain
        #[arg(long)]
        host: Option<String>,

        /// Server port
        #[arg(short, long)]
        port: Option<u16>,

        /// Username
        #[arg(short, long)]
        username: Option<String>,

        /// Read timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Output as JSON
        #[arg(long)]
        json: bool,

        /// Verbose logging
        #[arg(short, long)]
        verbose: bool,

        /// Emit logs as JSON lines
        #[arg(long)]
        json_logs: bool,
    },

    /// Replay a recorded server transcript through a session
    Replay {
        /// File with the raw bytes the server sent
        file: PathBuf,

        /// Server domain for the stream header
        #[arg(long, default_value = "localhost")]
        host: String,

        /// Username for the SCRAM initial message
        #[arg(short, long, default_value = "user")]
        username: String,

        /// Fixed client nonce (random if omitted)
        #[arg(long)]
        nonce: Option<String>,

        /// Deliver the transcript in chunks of this many bytes
        #[arg(long, default_value = "16")]
        chunk_size: usize,

        /// Verbose logging
        #[arg(short, long)]
        verbose: bool,
    },

    /// Show the mechanism selected from an offer
    Select {
        /// Offered mechanism names
        mechanisms: Vec<String>,
    },

    /// Base64-encode a payload
    Encode {
        /// Payload (or - for stdin)
        input: Option<String>,

        /// Input file path
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Decode a base64 challenge
    Decode {
        /// Base64 text (or - for stdin)
        input: Option<String>,

        /// Input file path
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Print parsed key=value parameters
        #[arg(long)]
        params: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Connect {
            config,
            host,
            port,
            username,
            timeout,
            json,
            verbose,
            json_logs,
        } => cmd_connect(config, host, port, username, timeout, json, verbose, json_logs),

        Commands::Replay {
            file,
            host,
            username,
            nonce,
            chunk_size,
            verbose,
        } => cmd_replay(file, &host, &username, nonce, chunk_size, verbose),

        Commands::Select { mechanisms } => cmd_select(mechanisms),

        Commands::Encode { input, file } => cmd_encode(input, file),

        Commands::Decode {
            input,
            file,
            params,
        } => cmd_decode(input, file, params),
    }
}

fn init_logging(verbose: bool, json: bool) {
    let log_level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .init();
    }
}

#[allow(clippy::too_many_arguments, clippy::fn_params_excessive_bools)]
fn cmd_connect(
    config_path: Option<PathBuf>,
    host: Option<String>,
    port: Option<u16>,
    username: Option<String>,
    timeout: Option<u64>,
    json: bool,
    verbose: bool,
    json_logs: bool,
) -> anyhow::Result<()> {
    init_logging(verbose, json_logs);

    // File, then environment, then flags
    let file_config = match config_path {
        Some(path) => Config::from_file(path)?,
        None => match Config::default_path().filter(|p| p.exists()) {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        },
    };
    let mut config = file_config.merge(Config::from_env());
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    if let Some(username) = username {
        config.credentials.username = username;
    }
    if let Some(timeout) = timeout {
        config.session.read_timeout_secs = timeout;
    }

    let session = Session::new(config.credentials()?);
    let client = TcpClient::from_config(&config);

    let runtime = tokio::runtime::Runtime::new()?;
    let negotiation = runtime.block_on(client.negotiate(session))?;

    if json {
        let output = serde_json::json!({
            "mechanism": negotiation.mechanism.name(),
            "challenge": negotiation.challenge.as_str(),
            "params": negotiation.challenge.params(),
            "stats": negotiation.stats,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("Mechanism: {}", negotiation.mechanism);
        print_challenge(&negotiation.challenge);
        println!(
            "Received {} bytes, sent {} bytes",
            negotiation.stats.bytes_received, negotiation.stats.bytes_written
        );
    }

    Ok(())
}

fn cmd_replay(
    file: PathBuf,
    host: &str,
    username: &str,
    nonce: Option<String>,
    chunk_size: usize,
    verbose: bool,
) -> anyhow::Result<()> {
    init_logging(verbose, false);

    let transcript = std::fs::read(&file)?;
    let credentials = Credentials::new(host, username, "");
    let mut session = match nonce {
        Some(nonce) => Session::with_nonce(credentials, nonce),
        None => Session::new(credentials),
    };
    let mut transport = MemoryTransport::new();

    session.dispatch(TransportEvent::Connected, &mut transport)?;
    print_writes(&mut transport);

    for chunk in transcript.chunks(chunk_size.max(1)) {
        let challenges = session.dispatch(
            TransportEvent::DataReceived(Bytes::copy_from_slice(chunk)),
            &mut transport,
        )?;
        print_writes(&mut transport);
        for challenge in &challenges {
            print_challenge(challenge);
        }
    }

    println!("Final state: {:?}", session.state());
    if !session.buffered().is_empty() {
        println!(
            "Unconsumed: {}",
            String::from_utf8_lossy(session.buffered())
        );
    }
    Ok(())
}

fn cmd_select(mechanisms: Vec<String>) -> anyhow::Result<()> {
    let offered: MechanismSet = mechanisms.into_iter().collect();
    println!("{}", select(&offered));
    Ok(())
}

fn cmd_encode(input: Option<String>, file: Option<PathBuf>) -> anyhow::Result<()> {
    let content = read_input(input, file)?;
    println!("{}", base64::encode(content.trim_end_matches(['\r', '\n'])));
    Ok(())
}

fn cmd_decode(input: Option<String>, file: Option<PathBuf>, params: bool) -> anyhow::Result<()> {
    let content = read_input(input, file)?;
    let challenge = Challenge::new(base64::decode(content.trim())?);

    if params {
        for (key, value) in challenge.params() {
            println!("{key} = {value}");
        }
    } else {
        println!("{}", String::from_utf8_lossy(challenge.payload()));
    }
    Ok(())
}

fn print_writes(transport: &mut MemoryTransport) {
    for bytes in transport.take_writes() {
        println!("C: {}", String::from_utf8_lossy(&bytes));
    }
}

fn print_challenge(challenge: &Challenge) {
    match challenge.as_str() {
        Some(text) => println!("S: challenge {text}"),
        None => println!("S: challenge ({} binary bytes)", challenge.payload().len()),
    }
}

fn read_input(input: Option<String>, file: Option<PathBuf>) -> anyhow::Result<String> {
    if let Some(path) = file {
        Ok(std::fs::read_to_string(path)?)
    } else if let Some(s) = input {
        if s == "-" {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            Ok(buffer)
        } else {
            Ok(s)
        }
    } else {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    }
}
