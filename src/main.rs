//! Portcullis CLI binary entry point.

use clap::Parser;
use portcullis::cli::{Cli, Commands, UsersCommands};

#[tokio::main]
async fn main() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();

    let cli = Cli::parse();
    let dir = cli.storage_dir;

    let result = match cli.command {
        Commands::Login(args) => portcullis::cli::auth::handle_login(dir, &args.email, args.password).await,
        Commands::Status => portcullis::cli::auth::handle_status(dir).await,
        Commands::Whoami => portcullis::cli::auth::handle_whoami(dir).await,
        Commands::Logout => portcullis::cli::auth::handle_logout(dir).await,
        Commands::ExternalLogin(args) => {
            portcullis::cli::auth::handle_external_login(
                dir,
                args.redirect_uri.as_deref(),
                args.scope.as_deref(),
            )
            .await
        }
        Commands::Complete(args) => portcullis::cli::auth::handle_complete(dir, &args.url).await,
        Commands::Check(args) => portcullis::cli::auth::handle_check(dir, &args.path).await,
        Commands::Users(users) => match users.command {
            UsersCommands::List { skip, limit } => {
                portcullis::cli::auth::handle_users_list(dir, skip, limit).await
            }
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
