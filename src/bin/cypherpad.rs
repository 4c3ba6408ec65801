//! Cypherpad CLI - one-time-pad message encryption
//!
//! Command-line interface for generating password-sealed key pairs and
//! encrypting messages for, or decrypting messages with, those keys.

use clap::{Parser, Subcommand};
use std::error::Error;
use std::path::PathBuf;
use std::process;

use cypherpad::config::{self, Config};
use cypherpad::file_ops;
use cypherpad::password::{PasswordReader, ReaderPasswordReader, TerminalPasswordReader};

#[derive(Parser)]
#[command(name = "cypherpad")]
#[command(version)]
#[command(about = "One-time-pad message encryption with RSA-wrapped pads.", long_about = None)]
struct Cli {
    /// Read passwords from stdin (one per line) instead of from terminal
    #[arg(long, global = true)]
    password_stdin: bool,

    /// Log engine activity to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// RSA modulus size for new keys
    #[arg(long, global = true, value_name = "BITS", env = "CYPHERPAD_MODULUS_BITS",
          default_value_t = config::DEFAULT_MODULUS_BITS)]
    modulus_bits: usize,

    /// PBKDF2 iterations for sealing and unsealing private keys (not stored in
    /// the key file; unsealing must use the count the key was sealed with)
    #[arg(long, global = true, value_name = "N", env = "CYPHERPAD_KDF_ITERATIONS",
          default_value_t = config::DEFAULT_KDF_ITERATIONS)]
    kdf_iterations: u32,

    /// Threads used to wrap and unwrap pads [default: available cores, at most 8]
    #[arg(long, global = true, value_name = "N", env = "CYPHERPAD_WORKERS")]
    workers: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a key pair; the private key is sealed under a password
    #[command(alias = "k")]
    Keygen {
        /// Path to write the sealed private key to
        #[arg(long, value_name = "FILE")]
        private: PathBuf,

        /// Path to write the public key to
        #[arg(long, value_name = "FILE")]
        public: PathBuf,
    },

    /// Encrypt a text file for the owner of a public key
    #[command(alias = "e")]
    Encrypt {
        /// Recipient's public key file
        #[arg(short, long, value_name = "FILE")]
        key: PathBuf,

        /// Path to the file whose contents is to be encrypted
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// Path to the file to write the encrypted message to
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,

        /// Drop characters the alphabet cannot represent instead of failing
        #[arg(long)]
        strip_unsupported: bool,
    },

    /// Decrypt a message with a sealed private key
    #[command(alias = "d")]
    Decrypt {
        /// Sealed private key file
        #[arg(short, long, value_name = "FILE")]
        key: PathBuf,

        /// Path to the encrypted message
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// Path to the file to write the decrypted text to
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
    },

    /// Change the password of a sealed private key
    Passwd {
        /// Sealed private key file to re-seal in place
        #[arg(short, long, value_name = "FILE")]
        key: PathBuf,
    },

    /// Recover the public key from a sealed private key
    Pubkey {
        /// Sealed private key file
        #[arg(short, long, value_name = "FILE")]
        key: PathBuf,

        /// Path to write the public key to
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = Config::default()
        .with_modulus_bits(cli.modulus_bits)
        .with_kdf_iterations(cli.kdf_iterations);
    if let Some(workers) = cli.workers {
        config = config.with_wrap_workers(workers);
    }

    let result = match cli.command {
        Commands::Keygen { private, public } => {
            let mut reader = get_password_reader(cli.password_stdin, "Password (cypherpad): ");
            file_ops::generate_keys(&private, &public, &mut *reader, &config)
        }
        Commands::Encrypt {
            key,
            input,
            output,
            strip_unsupported,
        } => file_ops::encrypt_message(&key, &input, &output, strip_unsupported, &config).map(
            |dropped| {
                if dropped > 0 {
                    eprintln!("Dropped {} unsupported character(s)", dropped);
                }
            },
        ),
        Commands::Decrypt { key, input, output } => {
            let mut reader = get_password_reader(cli.password_stdin, "Password (cypherpad): ");
            file_ops::decrypt_message(&key, &input, &output, &mut *reader, &config)
        }
        Commands::Passwd { key } => {
            let mut old = get_password_reader(cli.password_stdin, "Old password (cypherpad): ");
            let mut new = get_password_reader(cli.password_stdin, "New password (cypherpad): ");
            file_ops::change_password(&key, &mut *old, &mut *new, &config)
        }
        Commands::Pubkey { key, output } => {
            let mut reader = get_password_reader(cli.password_stdin, "Password (cypherpad): ");
            file_ops::export_public_key_from_private(&key, &output, &mut *reader, &config)
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", error_chain(&e));
        process::exit(1);
    }
}

/// The error message followed by each of its causes, separated by ": "
fn error_chain(err: &dyn Error) -> String {
    let mut rendered = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        tracing_subscriber::EnvFilter::new("cypherpad=debug")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("cypherpad=warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn get_password_reader(use_stdin: bool, prompt: &'static str) -> Box<dyn PasswordReader> {
    if use_stdin {
        // Stdin handles share one buffer, so successive readers see successive lines.
        Box::new(ReaderPasswordReader::new(Box::new(std::io::stdin())))
    } else {
        Box::new(TerminalPasswordReader::with_prompt(prompt))
    }
}
