//! Command-line interface for sign-guard.
//!
//! Uses lexopt: global options may appear anywhere, the first positional
//! word selects the subcommand and the rest are its operands.

use std::ffi::OsString;
use std::path::PathBuf;

/// Default token size in bytes for the `token` subcommand.
pub const DEFAULT_TOKEN_BYTES: usize = 32;
/// Largest token size the `token` subcommand accepts.
pub const MAX_TOKEN_BYTES: usize = 1024;

/// Command-line arguments.
#[derive(Debug, Clone, Default)]
pub struct Args {
    /// Path to configuration file.
    pub config: Option<PathBuf>,
    /// Log level (error, warn, info, debug, trace).
    pub log_level: Option<String>,
    /// Subcommand to run.
    pub command: Option<Command>,
    /// Show version and exit.
    pub version: bool,
    /// Show help and exit.
    pub help: bool,
}

/// Subcommands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print a random hex token of the given byte length.
    Token { bytes: usize },
    /// Print a fresh document ID.
    DocumentId,
    /// Print a 64-byte signature token.
    SignatureToken,
    /// Print the digest of a password.
    HashPassword { password: String },
    /// Check a password against a digest.
    VerifyPassword { password: String, digest: String },
    CheckEmail { value: String },
    CheckPhone { value: String },
    CheckId { value: String },
    /// Print the HTML-escaped form of the input.
    Sanitize { value: String },
    /// Print the Content-Security-Policy.
    Csp,
}

impl Command {
    fn from_words(name: &str, mut operands: Vec<String>) -> Result<Self, ArgsError> {
        let expected = match name {
            "token" => {
                if operands.len() > 1 {
                    return Err(ArgsError::UnexpectedArgument(operands.swap_remove(1)));
                }
                let bytes = match operands.pop() {
                    Some(value) => value
                        .parse::<usize>()
                        .ok()
                        .filter(|n| (1..=MAX_TOKEN_BYTES).contains(n))
                        .ok_or(ArgsError::InvalidValue("bytes", value))?,
                    None => DEFAULT_TOKEN_BYTES,
                };
                return Ok(Self::Token { bytes });
            }
            "document-id" | "signature-token" | "csp" => 0,
            "hash-password" | "check-email" | "check-phone" | "check-id" | "sanitize" => 1,
            "verify-password" => 2,
            other => return Err(ArgsError::UnknownCommand(other.to_string())),
        };

        if operands.len() < expected {
            return Err(ArgsError::MissingOperand(name.to_string()));
        }
        if operands.len() > expected {
            return Err(ArgsError::UnexpectedArgument(operands.swap_remove(expected)));
        }

        let mut operands = operands.into_iter();
        let mut next = || operands.next().unwrap_or_default();

        Ok(match name {
            "document-id" => Self::DocumentId,
            "signature-token" => Self::SignatureToken,
            "csp" => Self::Csp,
            "hash-password" => Self::HashPassword { password: next() },
            "check-email" => Self::CheckEmail { value: next() },
            "check-phone" => Self::CheckPhone { value: next() },
            "check-id" => Self::CheckId { value: next() },
            "sanitize" => Self::Sanitize { value: next() },
            _ => Self::VerifyPassword {
                password: next(),
                digest: next(),
            },
        })
    }
}

/// Parse command-line arguments.
pub fn parse_args() -> Result<Args, ArgsError> {
    parse_args_from(std::env::args_os())
}

/// Parse arguments from an iterator (for testing).
pub fn parse_args_from<I>(args: I) -> Result<Args, ArgsError>
where
    I: IntoIterator<Item = OsString>,
{
    use lexopt::prelude::*;

    let mut result = Args::default();
    let mut words: Vec<String> = Vec::new();
    let mut parser = lexopt::Parser::from_iter(args);

    while let Some(arg) = parser.next()? {
        match arg {
            Short('h') | Long("help") => {
                result.help = true;
            }
            Short('V') | Long("version") => {
                result.version = true;
            }
            Short('c') | Long("config") => {
                result.config = Some(parser.value()?.parse()?);
            }
            Short('l') | Long("log-level") => {
                result.log_level = Some(parser.value()?.parse()?);
            }
            Value(val) => {
                words.push(val.string()?);
            }
            _ => return Err(arg.unexpected().into()),
        }
    }

    if !words.is_empty() {
        let name = words.remove(0);
        result.command = Some(Command::from_words(&name, words)?);
    }

    Ok(result)
}

/// Print help message.
pub fn print_help() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        r#"sign-guard {version}
Security toolkit for a document-signing service

USAGE:
    sign-guard [OPTIONS] <COMMAND> [ARGS]

COMMANDS:
    token [BYTES]                  Random hex token (1-1024 bytes) [default: 32]
    document-id                    New document ID (DOC-<millis>-<hex>)
    signature-token                64-byte signature token
    hash-password <PW>             SHA-256 digest of a password
    verify-password <PW> <DIGEST>  Check a password against a digest
    check-email <S>                Validate an email address
    check-phone <S>                Validate an Israeli phone number
    check-id <S>                   Validate an Israeli ID number
    sanitize <S>                   HTML-escape the input
    csp                            Print the Content-Security-Policy

OPTIONS:
    -c, --config <FILE>     Path to configuration file (JSON)
    -l, --log-level <LVL>   Log level (error, warn, info, debug, trace)
    -h, --help              Print help
    -V, --version           Print version

ENVIRONMENT VARIABLES:
    SIGN_GUARD_MAX_PER_MINUTE      Requests per minute (overrides config)
    SIGN_GUARD_MAX_PER_HOUR        Requests per hour (overrides config)
    SIGN_GUARD_SESSION_TIMEOUT_MS  Session lifetime (overrides config)
    SIGN_GUARD_LOG_LEVEL           Log level (overrides config)
    RUST_LOG                       Alternative log level setting

EXIT STATUS:
    check-* and verify-password exit 1 when the input is rejected.

EXAMPLES:
    sign-guard token 16
    sign-guard check-id 123456782
    sign-guard -c /etc/sign-guard/config.json document-id
"#
    );
}

/// Print version.
pub fn print_version() {
    println!("sign-guard {}", env!("CARGO_PKG_VERSION"));
}

/// Argument parsing errors.
#[derive(Debug)]
pub enum ArgsError {
    /// Lexopt parsing error.
    Lexopt(lexopt::Error),
    /// Invalid argument value.
    InvalidValue(&'static str, String),
    /// Unexpected positional argument.
    UnexpectedArgument(String),
    /// Subcommand name not recognized.
    UnknownCommand(String),
    /// Subcommand given too few operands.
    MissingOperand(String),
}

impl std::fmt::Display for ArgsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lexopt(e) => write!(f, "{}", e),
            Self::InvalidValue(name, value) => {
                write!(f, "invalid value for {}: '{}'", name, value)
            }
            Self::UnexpectedArgument(arg) => {
                write!(f, "unexpected argument: '{}'", arg)
            }
            Self::UnknownCommand(name) => write!(f, "unknown command: '{}'", name),
            Self::MissingOperand(name) => write!(f, "missing argument for '{}'", name),
        }
    }
}

impl std::error::Error for ArgsError {}

impl From<lexopt::Error> for ArgsError {
    fn from(e: lexopt::Error) -> Self {
        Self::Lexopt(e)
    }
}
