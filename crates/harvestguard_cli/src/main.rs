//! harvestguard CLI: login, signup, logout, status, scan, results.

use clap::{Parser, Subcommand};
use harvestguard::scan::ValidationError;
use harvestguard::{
    ApiClient, ClientConfig, ImageFile, ResultsView, ScanForm, ScanMode, ServerStatus, Session,
    SessionStore, StatusProbe, SubmitOutcome,
};
use harvestguard_report::{build_text, render_results};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()))
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(1);
        }
    }
}

#[derive(Parser)]
#[command(name = "harvestguard")]
#[command(about = "HarvestGuard client: authenticate and scan product images for authenticity")]
#[command(version)]
struct Cli {
    /// Config file (JSON). Defaults to the usual lookup chain.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Backend origin, overrides config.
    #[arg(long, global = true)]
    server: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Log in and store the session token.
    Login(LoginArgs),
    /// Create an account and store the session token.
    Signup(SignupArgs),
    /// Forget the stored session.
    Logout,
    /// Show the stored session.
    Whoami,
    /// Check whether the backend is reachable.
    Status(StatusArgs),
    /// Scan one image, or several in one batch request.
    Scan(ScanArgs),
    /// Show the results of the last scan.
    Results(ResultsArgs),
}

#[derive(Parser)]
struct LoginArgs {
    #[arg(long)]
    username: String,
    #[arg(long)]
    password: String,
}

#[derive(Parser)]
struct SignupArgs {
    #[arg(long)]
    username: String,
    #[arg(long)]
    email: String,
    #[arg(long)]
    password: String,
}

#[derive(Parser)]
struct StatusArgs {
    /// Keep probing and print every change until interrupted.
    #[arg(long)]
    watch: bool,
    /// Probe interval in seconds (defaults to config).
    #[arg(long)]
    interval: Option<u64>,
}

#[derive(Parser)]
struct ScanArgs {
    /// JPG/PNG images.
    #[arg(required = true)]
    files: Vec<PathBuf>,
    /// Use the batch endpoint even for a single file.
    #[arg(long)]
    batch: bool,
    /// Also write the results page as HTML.
    #[arg(long)]
    html: Option<PathBuf>,
}

#[derive(Parser)]
struct ResultsArgs {
    /// Write the results page as HTML instead of printing a table.
    #[arg(long)]
    html: Option<PathBuf>,
}

fn load_config(cli: &Cli) -> ClientConfig {
    let mut config = ClientConfig::load_with_path(cli.config.as_deref());
    if let Some(server) = &cli.server {
        config.server_url = server.clone();
    }
    config
}

fn run(cli: Cli) -> CliResult<i32> {
    let config = load_config(&cli);
    let session = Arc::new(SessionStore::open(&config.session_path)?);
    let client = Arc::new(ApiClient::new(config)?);
    let rt = tokio::runtime::Runtime::new()?;
    match cli.command {
        Command::Login(args) => rt.block_on(run_login(&client, &session, args)),
        Command::Signup(args) => rt.block_on(run_signup(&client, &session, args)),
        Command::Logout => run_logout(&session),
        Command::Whoami => run_whoami(&session),
        Command::Status(args) => rt.block_on(run_status(client, args)),
        Command::Scan(args) => rt.block_on(run_scan(client, session, args)),
        Command::Results(args) => run_results(&session, args),
    }
}

fn require_session(store: &SessionStore) -> CliResult<Session> {
    store
        .session()?
        .ok_or_else(|| "not logged in; run `harvestguard login` first".into())
}

fn print_session(session: &Session, verb: &str, username: &str) {
    println!(
        "{} as {} (role: {})",
        verb,
        username,
        session.role.as_deref().unwrap_or("unknown")
    );
}

async fn run_login(client: &ApiClient, store: &SessionStore, args: LoginArgs) -> CliResult<i32> {
    let token = client.login(&args.username, &args.password).await?;
    let session = store.begin(&token)?;
    print_session(&session, "Logged in", &args.username);
    Ok(0)
}

async fn run_signup(client: &ApiClient, store: &SessionStore, args: SignupArgs) -> CliResult<i32> {
    if client.check_status().await == ServerStatus::Offline {
        return Err("Cannot sign up: Server is offline. Please try again later.".into());
    }
    let token = client
        .register(&args.username, &args.password, &args.email)
        .await?;
    let session = store.begin(&token)?;
    print_session(&session, "Registered", &args.username);
    Ok(0)
}

fn run_logout(store: &SessionStore) -> CliResult<i32> {
    store.clear_token()?;
    println!("Logged out");
    Ok(0)
}

fn run_whoami(store: &SessionStore) -> CliResult<i32> {
    match store.session()? {
        Some(session) => {
            println!(
                "Logged in (role: {})",
                session.role.as_deref().unwrap_or("unknown")
            );
            Ok(0)
        }
        None => {
            println!("Not logged in");
            Ok(1)
        }
    }
}

async fn run_status(client: Arc<ApiClient>, args: StatusArgs) -> CliResult<i32> {
    if !args.watch {
        let status = client.check_status().await;
        println!("Server status: {}", status);
        return Ok(if status == ServerStatus::Online { 0 } else { 1 });
    }
    let interval = args
        .interval
        .map(Duration::from_secs)
        .unwrap_or_else(|| client.config().probe_interval());
    let probe = StatusProbe::spawn(client, interval);
    let mut rx = probe.subscribe();
    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let status = *rx.borrow_and_update();
                println!("Server status: {}", status);
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    Ok(0)
}

async fn load_files(paths: &[PathBuf]) -> Result<Vec<ImageFile>, ValidationError> {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        files.push(ImageFile::from_path(path).await?);
    }
    Ok(files)
}

async fn run_scan(
    client: Arc<ApiClient>,
    store: Arc<SessionStore>,
    args: ScanArgs,
) -> CliResult<i32> {
    require_session(&store)?;
    let files = load_files(&args.files).await?;
    let mode = if args.batch || files.len() > 1 {
        ScanMode::Batch
    } else {
        ScanMode::Single
    };

    let probe = StatusProbe::spawn(client.clone(), client.config().probe_interval());
    let status = probe.first_reading().await;
    info!(%status, "server status");

    let form = ScanForm::new(mode, client, store.clone()).with_status(probe.subscribe());
    form.select(files);
    match form.submit().await {
        SubmitOutcome::Success(outcome) => {
            let view = ResultsView::from_outcome(&outcome);
            store.save_results(&view)?;
            print!("{}", build_text(&view));
            if let Some(path) = &args.html {
                render_results(&view, path)?;
                info!(path = %path.display(), "results page written");
            }
            Ok(if outcome.partial_failure { 2 } else { 0 })
        }
        SubmitOutcome::Failed(message) => Err(message.into()),
        SubmitOutcome::Ignored => Err("a scan is already in progress".into()),
    }
}

fn run_results(store: &SessionStore, args: ResultsArgs) -> CliResult<i32> {
    require_session(store)?;
    let Some(view) = store.last_results()? else {
        println!("No results available. Please upload images to scan.");
        return Ok(0);
    };
    match &args.html {
        Some(path) => {
            render_results(&view, path)?;
            println!("Results page written to {}", path.display());
        }
        None => print!("{}", build_text(&view)),
    }
    Ok(0)
}
