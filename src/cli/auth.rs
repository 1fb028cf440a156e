//! CLI command handlers.
//!
//! Each command opens the session persisted under the storage directory,
//! drives it through a headless navigator, and prints every navigation the
//! console would have performed.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use crate::auth::{AuthError, HttpSessionTransport, SessionTransport, TokenStore};
use crate::config::SessionConfig;
use crate::host::{FileStorage, Location, MemoryNavigator, NavigationRecord, PageLoad, Storage};
use crate::routing::RouteTable;
use crate::session::{BootOutcome, SessionManager, SessionState};

type CliResult = Result<(), Box<dyn std::error::Error>>;

const STORAGE_NAMESPACE: &str = "session";

/// A session wired to file storage and a recording navigator.
struct Console {
    config: SessionConfig,
    transport: Arc<HttpSessionTransport>,
    navigator: Arc<MemoryNavigator>,
    session: SessionManager,
}

impl Console {
    fn open(storage_dir: Option<PathBuf>, start: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let mut config = SessionConfig::from_env()?;
        if let Some(dir) = storage_dir {
            config = config.with_storage_dir(dir);
        }
        let storage: Arc<dyn Storage> =
            Arc::new(FileStorage::new(config.storage_dir(), STORAGE_NAMESPACE));
        let transport = Arc::new(HttpSessionTransport::new(
            &config,
            TokenStore::new(storage.clone()),
        )?);
        let navigator = Arc::new(MemoryNavigator::at(start));
        let session = SessionManager::new(
            config.clone(),
            transport.clone(),
            storage,
            navigator.clone(),
        );
        Ok(Self {
            config,
            transport,
            navigator,
            session,
        })
    }

    fn print_navigations(&self) {
        for record in self.navigator.history() {
            match record {
                NavigationRecord::ReplaceState(location) => println!("   ↺ {location}"),
                NavigationRecord::Route(path) => println!("   → {path}"),
                NavigationRecord::FullPage { url, load } => {
                    let verb = match load {
                        PageLoad::Assign => "open",
                        PageLoad::Replace => "replace",
                    };
                    println!("   ⇒ {verb} {}", redact_fragment(&url));
                }
            }
        }
    }
}

/// Hide a credential-carrying fragment.
fn redact_fragment(url: &str) -> String {
    match url.split_once('#') {
        Some((base, fragment)) if fragment.contains("access_token=") => format!("{base}#<credential>"),
        _ => url.to_string(),
    }
}

fn read_password() -> io::Result<String> {
    eprint!("Password: ");
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// Handle `portcullis login <email>`.
pub async fn handle_login(storage_dir: Option<PathBuf>, email: &str, password: Option<String>) -> CliResult {
    let password = match password {
        Some(password) => password,
        None => read_password()?,
    };
    let console = Console::open(storage_dir, "/login")?;
    console.session.boot().await;

    match console.session.try_login(email, &password).await {
        Ok(principal) => {
            println!("✅ Logged in as {} <{}>", principal.display_name(), principal.email);
            if !principal.scopes.is_empty() {
                let scopes: Vec<_> = principal.scopes.iter().map(String::as_str).collect();
                println!("   Scopes: {}", scopes.join(", "));
            }
            console.print_navigations();
            Ok(())
        }
        Err(AuthError::InvalidCredentials(detail)) => {
            Err(format!("Login failed: {detail}").into())
        }
        Err(err) => Err(err.into()),
    }
}

/// Handle `portcullis status`.
pub async fn handle_status(storage_dir: Option<PathBuf>) -> CliResult {
    let console = Console::open(storage_dir, "/")?;
    console.session.boot().await;
    let snapshot = console.session.snapshot();

    match (snapshot.state, snapshot.display_principal()) {
        (SessionState::Authenticated, Some(principal)) => {
            println!("✅ Authenticated as {} <{}>", principal.display_name(), principal.email);
        }
        (_, Some(hint)) => println!("⚠️  Anonymous (last seen as {})", hint.email),
        _ => println!("❌ Anonymous"),
    }
    if let Some(reason) = snapshot.last_sign_out {
        println!("   Signed out: {reason}");
    }
    println!("   Backend: {}", console.config.api_base_url());
    console.print_navigations();
    Ok(())
}

/// Handle `portcullis whoami`.
pub async fn handle_whoami(storage_dir: Option<PathBuf>) -> CliResult {
    let console = Console::open(storage_dir, "/")?;
    console.session.boot().await;
    if !console.session.snapshot().is_authenticated() {
        return Err(AuthError::NotLoggedIn.into());
    }
    let principal = console.transport.fetch_principal().await?;
    println!("{}", serde_json::to_string_pretty(&principal)?);
    Ok(())
}

/// Handle `portcullis logout`.
pub async fn handle_logout(storage_dir: Option<PathBuf>) -> CliResult {
    let console = Console::open(storage_dir, "/")?;
    console.session.logout();
    println!("✅ Logged out");
    Ok(())
}

/// Handle `portcullis external-login`.
pub async fn handle_external_login(
    storage_dir: Option<PathBuf>,
    redirect_uri: Option<&str>,
    scope: Option<&str>,
) -> CliResult {
    let console = Console::open(storage_dir, "/login")?;
    console.session.begin_external_login(redirect_uri, scope)?;
    let (url, _) = console
        .navigator
        .last_full_page()
        .ok_or("no identity provider navigation was made")?;
    println!("🔗 Visit: {url}");
    println!(
        "⏳ Then run: portcullis complete '<the {} URL you land on>'",
        console.config.app_origin()
    );
    Ok(())
}

/// Handle `portcullis complete <url>`.
pub async fn handle_complete(storage_dir: Option<PathBuf>, url: &str) -> CliResult {
    Location::parse(url)?;
    let console = Console::open(storage_dir, url)?;
    let outcome = console.session.boot().await;
    match &outcome {
        BootOutcome::Authenticated { .. } => println!("✅ Session established"),
        BootOutcome::HandedOff { target } => println!("✅ Session handed to {target}"),
        BootOutcome::AccessDenied { required_scope } => println!(
            "❌ Access denied{}",
            required_scope
                .as_deref()
                .map(|scope| format!(": '{scope}' is required"))
                .unwrap_or_default()
        ),
        BootOutcome::Anonymous { .. } => println!("❌ The landing URL did not yield a session"),
    }
    console.print_navigations();
    Ok(())
}

/// Handle `portcullis check <path>`.
pub async fn handle_check(storage_dir: Option<PathBuf>, path: &str) -> CliResult {
    let location = Location::parse(path)?;
    let console = Console::open(storage_dir, path)?;
    console.session.boot().await;
    let routes = RouteTable::console(&console.config);
    let resolution = routes.resolve(&console.session.snapshot(), &location, None);
    println!("{}", serde_json::to_string(&resolution)?);
    Ok(())
}

/// Handle `portcullis users list`.
pub async fn handle_users_list(storage_dir: Option<PathBuf>, skip: u32, limit: u32) -> CliResult {
    let console = Console::open(storage_dir, "/admin")?;
    console.session.boot().await;
    if !console.session.snapshot().is_authenticated() {
        return Err(AuthError::NotLoggedIn.into());
    }
    let users = console.transport.list_users(skip, limit).await?;
    for user in &users {
        let scopes: Vec<_> = user.scopes.iter().map(String::as_str).collect();
        println!(
            "{:>5}  {:<32}  {:<8}  {}",
            user.id,
            user.email,
            if user.is_active { "active" } else { "inactive" },
            scopes.join(",")
        );
    }
    println!("{} user(s)", users.len());
    Ok(())
}
