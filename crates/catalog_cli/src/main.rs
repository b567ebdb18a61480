//! Command-line boundary for the library catalog.
//!
//! # Responsibility
//! - Parse one command plus the acting identity and grants.
//! - Print exactly one JSON response envelope per invocation.
//!
//! # Invariants
//! - Exit code is 0 only when the envelope reports `ok = true`.

mod api;
mod config;

use catalog_core::{
    default_log_level, init_logging, AuthorId, BookId, BookInstanceId, LoanStatus, UserId,
};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use config::{CliConfig, DB_PATH_ENV, GRANTS_ENV, LOG_DIR_ENV, LOG_LEVEL_ENV, USER_ENV};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "catalog")]
#[command(about = "Local library catalog: books, copies, loans and reading totals", long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct GlobalArgs {
    /// SQLite database file
    #[arg(long, env = DB_PATH_ENV, global = true)]
    db: Option<String>,
    /// trace|debug|info|warn|error
    #[arg(long, env = LOG_LEVEL_ENV, global = true)]
    log_level: Option<String>,
    /// Absolute directory for rolling log files; logging is off when unset
    #[arg(long, env = LOG_DIR_ENV, global = true)]
    log_dir: Option<String>,
    /// Acting user id; omit to act anonymously
    #[arg(long, env = USER_ENV, global = true)]
    user: Option<UserId>,
    /// Capability codename held by the acting user (repeatable)
    #[arg(long = "grant", env = GRANTS_ENV, value_delimiter = ',', global = true)]
    grants: Vec<String>,
}

/// Book form fields shared by create and update.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub(crate) struct BookFields {
    pub title: String,
    pub isbn: String,
    #[arg(long)]
    pub author: Option<AuthorId>,
    #[arg(long, default_value = "")]
    pub summary: String,
    /// Genre id (repeatable)
    #[arg(long = "genre")]
    pub genres: Vec<i64>,
    #[arg(long)]
    pub language: Option<i64>,
    #[arg(long)]
    pub pages: Option<u32>,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub(crate) struct AuthorFields {
    pub first_name: String,
    pub last_name: String,
    #[arg(long)]
    pub born: Option<NaiveDate>,
    #[arg(long)]
    pub died: Option<NaiveDate>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub(crate) enum Command {
    /// Index counts, optionally narrowing the book count by title
    Summary {
        #[arg(long)]
        q: Option<String>,
    },
    /// Count books whose title contains a term
    Search { term: String },
    /// List books a page at a time
    Books {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long)]
        page_size: Option<u32>,
    },
    /// List authors a page at a time
    Authors {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long)]
        page_size: Option<u32>,
    },
    Genres,
    Languages,
    /// Show one book with its copies
    Book { id: BookId },
    /// Show one author with their books
    Author { id: AuthorId },
    /// Copies the acting user has on loan
    MyLoans,
    /// Every copy on loan (needs can_mark_returned)
    AllLoans,
    /// Set a new due date on a copy; defaults to the proposed date
    Renew {
        instance: BookInstanceId,
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Credit the copy's pages to the acting user and return it
    MarkRead { instance: BookInstanceId },
    /// Reading leaderboard
    Rank,
    RegisterUser { username: String },
    AddGenre { name: String },
    AddLanguage { name: String },
    AddAuthor {
        #[command(flatten)]
        fields: AuthorFields,
    },
    UpdateAuthor {
        id: AuthorId,
        #[command(flatten)]
        fields: AuthorFields,
    },
    DeleteAuthor { id: AuthorId },
    AddBook {
        #[command(flatten)]
        fields: BookFields,
    },
    UpdateBook {
        id: BookId,
        #[command(flatten)]
        fields: BookFields,
    },
    DeleteBook { id: BookId },
    /// Register a physical copy of a book
    AddCopy {
        book: BookId,
        imprint: String,
        /// m|o|a|r
        #[arg(long, value_parser = parse_status, default_value = "m")]
        status: LoanStatus,
        #[arg(long)]
        due: Option<NaiveDate>,
    },
    /// Put a copy on loan
    Lend {
        instance: BookInstanceId,
        borrower: UserId,
        #[arg(long)]
        due: NaiveDate,
    },
}

fn parse_status(raw: &str) -> Result<LoanStatus, String> {
    LoanStatus::from_code(raw.trim())
        .ok_or_else(|| format!("unknown status `{raw}`; expected m|o|a|r"))
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let global = cli.global;
    let log_level = global
        .log_level
        .unwrap_or_else(|| default_log_level().to_string());

    let config = match CliConfig::resolve(
        global.db.as_deref(),
        &log_level,
        global.log_dir.as_deref(),
        global.user,
        &global.grants,
    ) {
        Ok(config) => config,
        Err(message) => return emit(&api::ActionResponse::failure("invalid_config", message)),
    };

    if let Some(log_dir) = &config.log_dir {
        if let Err(err) = init_logging(&config.log_level, &log_dir.to_string_lossy()) {
            eprintln!("logging disabled: {err}");
        }
    }

    let today = chrono::Local::now().date_naive();
    emit(&api::execute(&config, cli.command, today))
}

fn emit(response: &api::ActionResponse) -> ExitCode {
    match serde_json::to_string_pretty(response) {
        Ok(json) => println!("{json}"),
        Err(err) => {
            eprintln!("failed to encode response: {err}");
            return ExitCode::FAILURE;
        }
    }
    if response.ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

#[cfg(test)]
mod tests {
    use super::{Cli, Command};
    use catalog_core::LoanStatus;
    use clap::Parser;

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "catalog",
            "all-loans",
            "--user",
            "3",
            "--grant",
            "can_mark_returned,add_book",
        ])
        .unwrap();
        assert_eq!(cli.command, Command::AllLoans);
        assert_eq!(cli.global.user, Some(3));
        assert_eq!(cli.global.grants, vec!["can_mark_returned", "add_book"]);
    }

    #[test]
    fn add_copy_parses_status_code() {
        let cli = Cli::try_parse_from(["catalog", "add-copy", "7", "Ace, 1990", "--status", "a"])
            .unwrap();
        match cli.command {
            Command::AddCopy { book, status, .. } => {
                assert_eq!(book, 7);
                assert_eq!(status, LoanStatus::Available);
            }
            other => panic!("unexpected command: {other:?}"),
        }
        assert!(Cli::try_parse_from(["catalog", "add-copy", "7", "x", "--status", "z"]).is_err());
    }

    #[test]
    fn renew_rejects_malformed_date() {
        let id = "67e55044-10b1-426f-9247-bb680e5fe0c8";
        assert!(Cli::try_parse_from(["catalog", "renew", id, "--date", "2024-11-30"]).is_ok());
        assert!(Cli::try_parse_from(["catalog", "renew", id, "--date", "30/11/2024"]).is_err());
    }
}
