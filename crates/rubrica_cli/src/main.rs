//! Rubrica CLI
//!
//! Command-line front end for the contact directory.
//!
//! # Commands
//!
//! - `list` - Print every contact sorted by name
//! - `add` - Insert a contact from separate fields
//! - `import` - Insert a contact from a `first;last;address;phone;age` line
//! - `edit` - Change one field of a contact
//! - `remove` - Delete a contact by phone

use clap::{Parser, Subcommand};
use log::{info, warn};
use rubrica_core::config::executable_dir;
use rubrica_core::store::dbms_store::DbmsContactStore;
use rubrica_core::{
    default_log_level, init_logging, open_directory, open_procedures, BackendKind,
    ContactDirectory, ContactError, ContactStore, InMemorySessionStore, LoadedConfig,
};
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

/// Personal contact directory.
#[derive(Parser)]
#[command(name = "rubrica")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Caller identity; scopes storage to this user
    #[arg(global = true, short, long)]
    user: Option<String>,

    /// Configuration file (defaults to conf/rubrica.json beside the binary)
    #[arg(global = true, short, long)]
    config: Option<PathBuf>,

    /// Directory for rolling log files
    #[arg(global = true, long)]
    log_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(global = true, long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print every contact sorted by first and last name
    List,

    /// Insert a contact
    Add {
        first_name: String,
        last_name: String,
        address: String,
        phone: String,
        #[arg(allow_negative_numbers = true)]
        age: i64,
    },

    /// Insert a contact from a semicolon-separated line
    Import {
        /// `first;last;address;phone;age`
        line: String,
    },

    /// Change one field of the contact owning PHONE
    Edit {
        phone: String,
        /// first_name, last_name, address, phone or age
        field: String,
        value: String,
    },

    /// Delete the contact owning PHONE
    Remove { phone: String },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_dir = absolute(
        cli.log_dir
            .clone()
            .unwrap_or_else(|| executable_dir().join("logs")),
    );
    let log_level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| default_log_level().to_string());
    if let Err(err) = init_logging(&log_level, &log_dir) {
        eprintln!("warning: file logging disabled: {err}");
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let config = match &cli.config {
        Some(path) => LoadedConfig::load_file(path, executable_dir()),
        None => LoadedConfig::load_beside_executable(),
    };
    let user = cli.user.as_deref();

    match config.backend() {
        BackendKind::Fs => {
            let directory = open_directory(&config, user, Arc::new(InMemorySessionStore::new()))?;
            execute(directory, cli.command)
        }
        BackendKind::Dbms => {
            let user = user.ok_or_else(|| {
                ContactError::InvalidSession("the dbms backend requires --user".to_string())
            })?;
            let procedures = open_procedures(&config)?;
            let token = procedures.open_session(user, config.session_ttl()?)?;
            let sessions = InMemorySessionStore::new();
            sessions.register(user, token);

            let store = DbmsContactStore::new(procedures, Arc::new(sessions), user);
            execute(ContactDirectory::new(store, Some(user))?, cli.command)
        }
    }
}

fn execute<S: ContactStore>(
    directory: ContactDirectory<S>,
    command: Commands,
) -> Result<(), Box<dyn Error>> {
    if let Some(user) = directory.current_user() {
        info!("event=cli_run module=cli status=ok scoped=true user_len={}", user.len());
    }

    let outcome = match command {
        Commands::List => {
            let contacts = directory.list();
            if contacts.is_empty() {
                println!("no contacts");
            }
            for contact in &contacts {
                println!(
                    "{:<30} {:<30} {:<16} {}",
                    contact.display_name(),
                    contact.address,
                    contact.phone,
                    contact.age
                );
            }
            Ok(())
        }
        Commands::Add {
            first_name,
            last_name,
            address,
            phone,
            age,
        } => directory
            .insert(&first_name, &last_name, &address, &phone, age)
            .map(|()| println!("added {phone}")),
        Commands::Import { line } => directory
            .insert_delimited(&line)
            .map(|()| println!("imported 1 contact")),
        Commands::Edit {
            phone,
            field,
            value,
        } => directory
            .modify(&phone, &field, &value)
            .map(|contact| println!("updated {contact}")),
        Commands::Remove { phone } => directory
            .remove(&phone)
            .map(|removed| println!("removed={removed}")),
    };

    if let Err(err) = directory.close() {
        warn!("event=cli_close module=cli status=error");
        outcome?;
        return Err(err.into());
    }
    outcome.map_err(Into::into)
}

fn absolute(path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        return path;
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(&path))
        .unwrap_or(path)
}
