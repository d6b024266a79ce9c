use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use secrecy::SecretString;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

use ninet::api::ApiClient;
use ninet::app::{build_http_client, load_preferences, App, AppEvent, Services};
use ninet::auth::{
    clear_session, load_session, prompt_password, restore_session, save_session, AuthClient,
    AuthError, SharedSession, SignUpOutcome,
};
use ninet::config::Config;
use ninet::feed::ViewMode;
use ninet::interactions::{run_sync_worker, sync_channel, InteractionStore, RemoteInteractions};
use ninet::storage::{Database, DatabaseError};
use ninet::ui;

/// How long shutdown waits for queued writes to drain.
const SYNC_FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

/// Environment variable read by `login`/`signup` before prompting.
const PASSWORD_ENV: &str = "NINET_PASSWORD";

/// Get the data directory path (~/.config/ninet/)
fn get_data_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("ninet"))
}

#[derive(Parser, Debug)]
#[command(name = "ninet", about = "NineT - AI Briefed by AI, in your terminal")]
struct Args {
    /// Configuration file (defaults to ~/.config/ninet/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Reset the local database (delete and recreate)
    #[arg(long)]
    reset_db: bool,

    /// Start in the bookmarks view
    #[arg(long)]
    bookmarks: bool,

    /// Open the feed on this article id
    #[arg(long, value_name = "ID")]
    article: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in with email and password (prompted, or read from NINET_PASSWORD)
    Login {
        #[arg(long)]
        email: String,
    },
    /// Create an account (password prompted, or read from NINET_PASSWORD)
    Signup {
        #[arg(long)]
        email: String,
        /// Display name stored on the profile
        #[arg(long)]
        name: Option<String>,
    },
    /// Sign out and forget the stored session
    Logout,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let data_dir = get_data_dir()?;
    if !data_dir.exists() {
        std::fs::create_dir_all(&data_dir).context("Failed to create data directory")?;
    }

    // SEC-007: Set directory permissions on Unix (user-only access)
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) =
            std::fs::set_permissions(&data_dir, std::fs::Permissions::from_mode(0o700))
        {
            eprintln!("Warning: failed to restrict {}: {}", data_dir.display(), e);
        }
    }

    init_tracing(&data_dir)?;

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| data_dir.join("config.toml"));
    let config = Config::load_with_env(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    let db_path = data_dir.join("ninet.db");
    if args.reset_db && db_path.exists() {
        std::fs::remove_file(&db_path).context("Failed to delete database")?;
        println!("Database reset.");
    }

    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    let db = match Database::open(db_path_str).await {
        Ok(db) => db,
        Err(DatabaseError::InstanceLocked) => {
            eprintln!(
                "Error: Another instance of ninet appears to be running. Please close it and try again."
            );
            std::process::exit(1);
        }
        Err(e) => {
            return Err(anyhow::anyhow!("Failed to open database: {}", e));
        }
    };

    let http = build_http_client().context("Failed to build HTTP client")?;
    let supabase = config.supabase().context("Invalid Supabase settings")?;
    let auth = supabase
        .as_ref()
        .map(|s| AuthClient::new(http.clone(), s, config.request_timeout()));

    let result = match args.command {
        Some(Command::Login { email }) => login(&db, auth.as_ref(), &email).await,
        Some(Command::Signup { email, name }) => {
            signup(&db, auth.as_ref(), &email, name.as_deref()).await
        }
        Some(Command::Logout) => logout(&db, auth.as_ref()).await,
        None => {
            let view_mode = if args.bookmarks {
                ViewMode::BookmarksOnly
            } else {
                ViewMode::All
            };
            run_tui(&db, &config, http, auth, view_mode, args.article).await
        }
    };

    db.close().await;
    result
}

/// Log to a file so tracing output never lands on the alternate screen.
fn init_tracing(data_dir: &std::path::Path) -> Result<()> {
    let log_path = data_dir.join("ninet.log");
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file {}", log_path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(Mutex::new(log_file))
        .with_ansi(false)
        .init();
    Ok(())
}

async fn run_tui(
    db: &Database,
    config: &Config,
    http: reqwest::Client,
    auth: Option<AuthClient>,
    view_mode: ViewMode,
    linked_article: Option<String>,
) -> Result<()> {
    let api = ApiClient::new(http.clone(), config.api_base()?, config.request_timeout());

    // An expired session that could not be refreshed still names the user;
    // remote calls refresh it before they go out.
    let session = restore_session(db, auth.as_ref(), Utc::now())
        .await
        .map(|session| match &auth {
            Some(auth) => SharedSession::with_refresh(session, auth.clone(), db.clone()),
            None => SharedSession::new(session),
        });
    let user_id: Option<Arc<str>> = session.as_ref().map(|s| Arc::from(s.user().id.as_str()));
    let remote = match (config.supabase()?, &session) {
        (Some(settings), Some(session)) => Some(RemoteInteractions::new(
            http.clone(),
            &settings,
            session.clone(),
            config.request_timeout(),
        )),
        _ => None,
    };
    tracing::info!(
        signed_in = session.is_some(),
        remote = remote.is_some(),
        api = %api.base_url(),
        "Starting ninet"
    );

    // Writes are queued here and drained in the background
    let (sync_tx, sync_rx) = sync_channel();
    let worker = tokio::spawn(run_sync_worker(db.clone(), remote.clone(), sync_rx));

    let store = InteractionStore::load(db, user_id.clone(), sync_tx.clone()).await;
    let preferences = load_preferences(db, user_id.as_deref()).await;

    let services = Services {
        db: db.clone(),
        api,
        auth,
        remote,
        sync_tx,
    };
    let mut app = App::new(services, config, store, session, preferences, view_mode);
    app.linked_article = linked_article.map(Arc::from);

    let (event_tx, event_rx) = mpsc::channel::<AppEvent>(32);
    let result = ui::run(&mut app, event_tx, event_rx).await;

    // Dropping the app drops the last sync sender, which lets the worker finish
    drop(app);
    match tokio::time::timeout(SYNC_FLUSH_TIMEOUT, worker).await {
        Ok(Ok(stats)) => tracing::info!(?stats, "Sync worker finished"),
        Ok(Err(e)) => tracing::warn!(error = %e, "Sync worker failed"),
        Err(_) => tracing::warn!("Timed out flushing pending writes"),
    }

    result?;
    println!("Goodbye!");
    Ok(())
}

fn require_auth(auth: Option<&AuthClient>) -> Result<&AuthClient> {
    auth.context(
        "Accounts are not configured: set supabase_url and supabase_anon_key \
         (or SUPABASE_URL and SUPABASE_ANON_KEY)",
    )
}

async fn login(db: &Database, auth: Option<&AuthClient>, email: &str) -> Result<()> {
    let auth = require_auth(auth)?;
    let password = read_password()?;
    let session = match auth.sign_in_with_password(email, &password).await {
        Ok(session) => session,
        Err(AuthError::InvalidCredentials) => anyhow::bail!("Invalid email or password"),
        Err(e) => return Err(e).context("Sign in failed"),
    };
    save_session(db, &session).await?;
    println!("Signed in as {}", session.user.display_name());
    Ok(())
}

async fn signup(
    db: &Database,
    auth: Option<&AuthClient>,
    email: &str,
    name: Option<&str>,
) -> Result<()> {
    let auth = require_auth(auth)?;
    let password = read_password()?;
    match auth
        .sign_up(email, &password, name)
        .await
        .context("Sign up failed")?
    {
        SignUpOutcome::SignedIn(session) => {
            save_session(db, &session).await?;
            println!("Account created. Signed in as {}", session.user.display_name());
        }
        SignUpOutcome::ConfirmationRequired(user) => {
            println!(
                "Account created. Check {} for a confirmation link, then run `ninet login`.",
                user.email
            );
        }
    }
    Ok(())
}

async fn logout(db: &Database, auth: Option<&AuthClient>) -> Result<()> {
    let Some(session) = load_session(db).await else {
        println!("Not signed in.");
        return Ok(());
    };
    if let Some(auth) = auth {
        // The local session is cleared even if the server call fails
        if let Err(e) = auth.sign_out(&session).await {
            tracing::warn!(error = %e, "Remote sign out failed");
        }
    }
    clear_session(db).await?;
    println!("Signed out.");
    Ok(())
}

/// Password from `NINET_PASSWORD`, otherwise prompted without echo.
fn read_password() -> Result<SecretString> {
    if let Ok(password) = std::env::var(PASSWORD_ENV) {
        if !password.is_empty() {
            return Ok(SecretString::from(password));
        }
    }
    prompt_password("Password: ")
}
