//! sign-guard binary entry point.

use std::process::ExitCode;

use sign_guard::cli::{self, Command};
use sign_guard::security::validation;
use sign_guard::{logging, Config, SecurityManager};
use tracing::{debug, error};

fn main() -> ExitCode {
    let args = match cli::parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("error: {}", e);
            eprintln!("Run with --help for usage.");
            return ExitCode::from(2);
        }
    };

    if args.help {
        cli::print_help();
        return ExitCode::SUCCESS;
    }

    if args.version {
        cli::print_version();
        return ExitCode::SUCCESS;
    }

    let config = match Config::load(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::from(2);
        }
    };

    // Logs go to stderr so command output stays pipeable
    let _ = logging::init_with(config.log_filter());

    let Some(command) = args.command else {
        cli::print_help();
        return ExitCode::from(2);
    };

    match run(&config, command) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{}", e);
            eprintln!("error: {}", e);
            ExitCode::from(2)
        }
    }
}

/// Run one subcommand. `Ok(false)` means the input was rejected.
fn run(config: &Config, command: Command) -> Result<bool, Box<dyn std::error::Error>> {
    let manager = SecurityManager::new(config.to_settings()?)?;
    debug!(?command, "running command");

    match command {
        Command::Token { bytes } => println!("{}", manager.secure_token(bytes)?),
        Command::DocumentId => println!("{}", manager.document_id()?),
        Command::SignatureToken => println!("{}", manager.signature_token()?),
        Command::HashPassword { password } => println!("{}", manager.hash_password(&password)),
        Command::VerifyPassword { password, digest } => {
            return Ok(report(manager.verify_password(&password, &digest)));
        }
        Command::CheckEmail { value } => return Ok(report(validation::is_valid_email(&value))),
        Command::CheckPhone { value } => {
            return Ok(report(validation::is_valid_israeli_phone(&value)));
        }
        Command::CheckId { value } => return Ok(report(validation::is_valid_israeli_id(&value))),
        Command::Sanitize { value } => println!("{}", validation::sanitize(&value)),
        Command::Csp => println!("{}", manager.content_security_policy()),
    }

    Ok(true)
}

fn report(valid: bool) -> bool {
    println!("{}", if valid { "valid" } else { "invalid" });
    valid
}
