//! Fedkit Demo CLI
//!
//! Command-line interface for inspecting and producing federation payloads.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use fedkit_lib::crypto;
use fedkit_lib::{FederationConfig, Protocol};

mod commands;
mod ui;

#[derive(Parser)]
#[command(name = "fedkit-demo")]
#[command(about = "Fedkit Demo CLI - Inspect and build Diaspora and ActivityPub payloads", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Federation config file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate an RSA key pair
    Keygen {
        /// Key size in bits
        #[arg(long, default_value_t = crypto::DEFAULT_KEY_BITS)]
        bits: usize,

        /// Directory to write `<name>.pem` and `<name>.pub.pem` to (prints otherwise)
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// File name stem
        #[arg(short, long, default_value = "fedkit")]
        name: String,
    },

    /// Identify the protocol of a payload or identifier
    Identify {
        /// Payload file, or `-` for stdin
        #[arg(required_unless_present = "id")]
        input: Option<String>,

        /// Identify an id or handle instead of a payload
        #[arg(long)]
        id: Option<String>,
    },

    /// Magic Envelope operations
    Envelope {
        #[command(subcommand)]
        action: EnvelopeAction,
    },

    /// Encrypt a Magic Envelope for one recipient
    Encrypt {
        /// Envelope file, or `-` for stdin
        input: String,

        /// Recipient public key (PEM file)
        #[arg(short, long)]
        key: PathBuf,
    },

    /// Decrypt a private Diaspora payload
    Decrypt {
        /// Encrypted JSON file, or `-` for stdin
        input: String,

        /// Recipient private key (PEM file)
        #[arg(short, long)]
        key: PathBuf,
    },

    /// Decode a message to entities without verifying it
    Decode {
        /// Diaspora XML message, Magic Envelope or ActivityPub JSON; `-` for stdin
        input: String,

        /// Protocol of the message (detected when omitted)
        #[arg(short, long)]
        protocol: Option<ProtocolArg>,

        /// Sender the message is attributed to (taken from the payload when omitted)
        #[arg(short, long)]
        sender: Option<String>,
    },

    /// Fetch an ActivityPub actor or key document
    Resolve {
        /// Actor or key id
        id: String,
    },
}

#[derive(Subcommand)]
enum EnvelopeAction {
    /// Sign a Diaspora XML message
    Sign {
        /// Message file, or `-` for stdin
        input: String,

        /// Signer private key (PEM file)
        #[arg(short, long)]
        key: PathBuf,

        /// Signer handle (user@host)
        #[arg(long)]
        handle: String,

        /// Wrap in the legacy <XML><post> container
        #[arg(long)]
        legacy: bool,
    },

    /// Verify an envelope and print its message
    Verify {
        /// Envelope file, or `-` for stdin
        input: String,

        /// Signer public key (PEM file)
        #[arg(short, long)]
        key: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ProtocolArg {
    Diaspora,
    Activitypub,
}

impl From<ProtocolArg> for Protocol {
    fn from(value: ProtocolArg) -> Self {
        match value {
            ProtocolArg::Diaspora => Protocol::Diaspora,
            ProtocolArg::Activitypub => Protocol::ActivityPub,
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<FederationConfig> {
    match path {
        Some(path) => Ok(FederationConfig::from_json(&std::fs::read_to_string(path)?)?),
        None => Ok(FederationConfig::default()),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing; RUST_LOG wins over --verbose
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            tracing_subscriber::EnvFilter::new("fedkit_demo_cli=debug,fedkit_lib=debug")
        } else {
            tracing_subscriber::EnvFilter::new("fedkit_demo_cli=info,fedkit_lib=warn")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = load_config(cli.config.as_ref()).and_then(|config| match cli.command {
        Commands::Keygen { bits, out, name } => commands::keygen::run(bits, out.as_deref(), &name),
        Commands::Identify { input, id } => commands::identify::run(input.as_deref(), id.as_deref()),
        Commands::Envelope { action } => match action {
            EnvelopeAction::Sign {
                input,
                key,
                handle,
                legacy,
            } => commands::envelope::sign(&input, &key, &handle, legacy),
            EnvelopeAction::Verify { input, key } => commands::envelope::verify(&input, &key),
        },
        Commands::Encrypt { input, key } => commands::encrypt::encrypt(&input, &key),
        Commands::Decrypt { input, key } => commands::encrypt::decrypt(&input, &key),
        Commands::Decode {
            input,
            protocol,
            sender,
        } => commands::decode::run(&input, protocol.map(Protocol::from), sender.as_deref()),
        Commands::Resolve { id } => commands::resolve::run(&id, &config),
    });

    if let Err(err) = &result {
        ui::error(&format!("{:#}", err));
        std::process::exit(1);
    }
    Ok(())
}
