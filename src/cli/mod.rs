//! CLI entry point for Portcullis.

pub mod auth;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Portcullis admin-console session CLI
#[derive(Parser, Debug)]
#[command(name = "portcullis", version, about = "Admin console sessions from the terminal")]
pub struct Cli {
    /// Directory holding the persisted session (overrides PORTCULLIS_STORAGE_DIR)
    #[arg(long, global = true)]
    pub storage_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sign in with email and password
    Login(LoginArgs),
    /// Validate the stored session and show its state
    Status,
    /// Print the signed-in principal as JSON
    Whoami,
    /// Forget the stored session
    Logout,
    /// Print the identity provider URL for an external login
    ExternalLogin(ExternalLoginArgs),
    /// Resume a session from the URL the identity provider returned to
    Complete(CompleteArgs),
    /// Show how the console would route a path
    Check(CheckArgs),
    /// Managed-user administration
    Users(UsersArgs),
}

/// Arguments for `portcullis login`.
#[derive(Parser, Debug)]
pub struct LoginArgs {
    pub email: String,

    /// Password (prompted on stdin when omitted)
    #[arg(short, long)]
    pub password: Option<String>,
}

/// Arguments for `portcullis external-login`.
#[derive(Parser, Debug)]
pub struct ExternalLoginArgs {
    /// Third-party URL to hand the session to once login completes
    #[arg(long)]
    pub redirect_uri: Option<String>,

    /// Scope the third-party caller requires
    #[arg(long)]
    pub scope: Option<String>,
}

/// Arguments for `portcullis complete`.
#[derive(Parser, Debug)]
pub struct CompleteArgs {
    /// Landing URL, including its `#access_token=...` fragment
    pub url: String,
}

/// Arguments for `portcullis check`.
#[derive(Parser, Debug)]
pub struct CheckArgs {
    /// In-app path, e.g. /admin/users
    pub path: String,
}

/// Arguments for the `users` subcommand group.
#[derive(Parser, Debug)]
pub struct UsersArgs {
    #[command(subcommand)]
    pub command: UsersCommands,
}

#[derive(Subcommand, Debug)]
pub enum UsersCommands {
    /// List users
    List {
        #[arg(long, default_value_t = 0)]
        skip: u32,
        #[arg(long, default_value_t = 100)]
        limit: u32,
    },
}

impl Cli {
    /// Parse CLI arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn parse_login_with_password() {
        let cli = Cli::try_parse_from(["portcullis", "login", "ops@example.com", "-p", "secret"]).unwrap();
        match cli.command {
            Commands::Login(args) => {
                assert_eq!(args.email, "ops@example.com");
                assert_eq!(args.password.as_deref(), Some("secret"));
            }
            other => panic!("expected Login, got {other:?}"),
        }
    }

    #[test]
    fn parse_external_login_options() {
        let cli = Cli::try_parse_from([
            "portcullis",
            "external-login",
            "--redirect-uri",
            "https://reports.example.com/cb",
            "--scope",
            "reports",
        ])
        .unwrap();
        match cli.command {
            Commands::ExternalLogin(args) => {
                assert_eq!(args.redirect_uri.as_deref(), Some("https://reports.example.com/cb"));
                assert_eq!(args.scope.as_deref(), Some("reports"));
            }
            other => panic!("expected ExternalLogin, got {other:?}"),
        }
    }

    #[test]
    fn parse_users_list_defaults() {
        let cli = Cli::try_parse_from(["portcullis", "users", "list"]).unwrap();
        match cli.command {
            Commands::Users(users) => match users.command {
                UsersCommands::List { skip, limit } => assert_eq!((skip, limit), (0, 100)),
            },
            other => panic!("expected Users, got {other:?}"),
        }
    }

    #[test]
    fn parse_global_storage_dir() {
        let cli = Cli::try_parse_from(["portcullis", "status", "--storage-dir", "/tmp/pc"]).unwrap();
        assert_eq!(cli.storage_dir, Some(PathBuf::from("/tmp/pc")));
        assert!(matches!(cli.command, Commands::Status));
    }

    #[test]
    fn parse_missing_subcommand_is_error() {
        assert!(Cli::try_parse_from(["portcullis"]).is_err());
    }

    #[test]
    fn parse_login_missing_email_is_error() {
        assert!(Cli::try_parse_from(["portcullis", "login"]).is_err());
    }
}
