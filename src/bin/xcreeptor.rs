//! xcreeptor CLI - personal text encryption
//!
//! Command-line front end for the layered substitution + AES-256-CBC
//! cipher. Secrets come from the environment (or the matching flags); the
//! PIN is read from the terminal, or from stdin with `--pin-stdin`.

use std::error::Error as StdError;
use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use zeroize::Zeroizing;

use xcreeptor::account::Account;
use xcreeptor::config::{CipherSecrets, Config, DEFAULT_ACCOUNT_FILE, DEFAULT_KEY_FILE};
use xcreeptor::layered;
use xcreeptor::password::{self, DEFAULT_PASSWORD_LENGTH};
use xcreeptor::pin::{PinReader, ReaderPinReader, TerminalPinReader};
use xcreeptor::session::Session;
use xcreeptor::{ErrorCategory, ErrorKind, Result, XcreeptorError};

#[derive(Parser)]
#[command(name = "xcreeptor")]
#[command(version)]
#[command(about = "Personal text encryption.", long_about = None)]
struct Cli {
    /// Read the PIN from stdin instead of from the terminal
    #[arg(long, global = true)]
    pin_stdin: bool,

    /// Account username
    #[arg(short, long, global = true, env = "XCREEPTOR_USER")]
    username: Option<String>,

    /// Path to the encrypted substitution key file
    #[arg(long, global = true, value_name = "FILE", default_value = DEFAULT_KEY_FILE)]
    key_file: PathBuf,

    /// Path to the account record
    #[arg(long, global = true, value_name = "FILE", default_value = DEFAULT_ACCOUNT_FILE)]
    account_file: PathBuf,

    /// Password protecting the key file
    #[arg(long, global = true, env = "XCREEPTOR_PASS_KEY", hide_env_values = true)]
    key_password: Option<String>,

    /// AES-256 key (exactly 32 bytes)
    #[arg(long, global = true, env = "XCREEPTOR_AES_KEY", hide_env_values = true)]
    aes_key: Option<String>,

    /// CBC initialization vector (exactly 16 bytes)
    #[arg(long, global = true, env = "XCREEPTOR_VI_KEY", hide_env_values = true)]
    iv: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the account, replacing any existing one
    CreateAccount,

    /// Encrypt a line of text
    #[command(alias = "e")]
    Encrypt {
        /// Text to encrypt (no spaces; keyboard symbols only)
        text: String,
    },

    /// Decrypt text produced by `encrypt`
    #[command(alias = "d")]
    Decrypt {
        /// Encrypted text
        text: String,
    },

    /// Generate a random password
    #[command(alias = "g")]
    GeneratePassword {
        /// Number of characters
        #[arg(short, long, default_value_t = DEFAULT_PASSWORD_LENGTH, value_parser = password::parse_length)]
        length: usize,
    },

    /// Replace the substitution key. Everything encrypted so far becomes
    /// unreadable.
    RegenerateKey,

    /// Print the account username
    Whoami,
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        report(&e);
        process::exit(1);
    }
}

/// Log to stderr, filtered by `RUST_LOG` (default `warn`).
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let account = Account::new(&cli.account_file);

    match &cli.command {
        Commands::CreateAccount => {
            let username = require_username(&cli)?;
            let pin = read_new_pin(cli.pin_stdin)?;
            account.create_account(username.trim(), &pin)?;
            eprintln!("Account created for {}", username.trim());
            Ok(())
        }
        Commands::Encrypt { text } => {
            let session = open_session(&cli)?;
            println!("{}", session.encrypt(text)?);
            Ok(())
        }
        Commands::Decrypt { text } => {
            let session = open_session(&cli)?;
            println!("{}", session.decrypt(text)?);
            Ok(())
        }
        Commands::GeneratePassword { length } => {
            authenticate(&cli, &account)?;
            println!("{}", password::generate_password(*length));
            Ok(())
        }
        Commands::RegenerateKey => {
            let mut session = open_session(&cli)?;
            session.regenerate_key()?;
            eprintln!("Key regenerated. Previously encrypted text can no longer be decrypted.");
            Ok(())
        }
        Commands::Whoami => {
            println!("{}", account.load_account()?);
            Ok(())
        }
    }
}

fn require_username(cli: &Cli) -> Result<&str> {
    cli.username.as_deref().ok_or_else(|| {
        XcreeptorError::with_kind(
            ErrorCategory::User,
            ErrorKind::InvalidArgument,
            "--username is required (or set XCREEPTOR_USER)",
        )
    })
}

fn pin_reader(use_stdin: bool, prompt: &'static str) -> Box<dyn PinReader> {
    if use_stdin {
        Box::new(ReaderPinReader::new(Box::new(std::io::stdin())))
    } else {
        Box::new(TerminalPinReader::new(prompt))
    }
}

fn read_pin(use_stdin: bool) -> Result<Zeroizing<Vec<u8>>> {
    pin_reader(use_stdin, "PIN (xcreeptor): ").read_pin()
}

/// Read a new PIN, asking twice on a terminal.
fn read_new_pin(use_stdin: bool) -> Result<Zeroizing<Vec<u8>>> {
    let pin = pin_reader(use_stdin, "New PIN (xcreeptor): ").read_pin()?;
    if pin.is_empty() {
        return Err(XcreeptorError::with_kind(
            ErrorCategory::User,
            ErrorKind::InvalidArgument,
            "PIN must not be empty",
        ));
    }
    if !use_stdin {
        let confirm = pin_reader(false, "Confirm PIN (xcreeptor): ").read_pin()?;
        if *confirm != *pin {
            return Err(XcreeptorError::with_kind(
                ErrorCategory::User,
                ErrorKind::InvalidArgument,
                "PINs do not match",
            ));
        }
    }
    Ok(pin)
}

fn authenticate(cli: &Cli, account: &Account) -> Result<()> {
    let username = require_username(cli)?;
    if !account.exists() {
        return Err(no_account());
    }
    let pin = read_pin(cli.pin_stdin)?;
    if !account.verify_account(username, &pin) {
        return Err(XcreeptorError::with_kind(
            ErrorCategory::User,
            ErrorKind::AuthenticationFailed,
            "invalid username or PIN",
        ));
    }
    Ok(())
}

fn open_session(cli: &Cli) -> Result<Session> {
    let username = require_username(cli)?;
    let config = build_config(cli)?;
    if !Account::new(&config.account_file).exists() {
        return Err(no_account());
    }
    let pin = read_pin(cli.pin_stdin)?;
    Session::open(config, username, &pin)
}

fn build_config(cli: &Cli) -> Result<Config> {
    let key_password = required_secret(&cli.key_password, "XCREEPTOR_PASS_KEY")?;
    let aes_key = required_secret(&cli.aes_key, "XCREEPTOR_AES_KEY")?;
    let iv = required_secret(&cli.iv, "XCREEPTOR_VI_KEY")?;
    let secrets = CipherSecrets::new(aes_key, iv)?;
    Ok(Config::new(key_password, secrets)
        .with_key_file(&cli.key_file)
        .with_account_file(&cli.account_file))
}

fn required_secret(value: &Option<String>, env_name: &str) -> Result<Vec<u8>> {
    value
        .as_ref()
        .map(|v| v.as_bytes().to_vec())
        .ok_or_else(|| {
            XcreeptorError::with_kind(
                ErrorCategory::User,
                ErrorKind::Misconfiguration,
                format!("{} is not set", env_name),
            )
        })
}

fn no_account() -> XcreeptorError {
    XcreeptorError::with_kind(
        ErrorCategory::User,
        ErrorKind::NoAccount,
        "no account found; run `xcreeptor create-account --username <NAME>` first",
    )
}

fn report(e: &XcreeptorError) {
    // Decryption failures get one message regardless of which stage failed.
    if layered::is_decryption_failure(e) {
        eprintln!("Error: decryption failed");
        return;
    }

    let mut msg = e.to_string();
    let mut source = e.source();
    while let Some(cause) = source {
        msg.push_str(": ");
        msg.push_str(&cause.to_string());
        source = cause.source();
    }
    eprintln!("Error: {}", msg);
}
