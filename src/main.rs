// src/main.rs
use clap::Parser;
use env_logger::Builder;
use log::{error, info, warn, LevelFilter};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tradelab::cli::{self, Cli, Command, Commands};
use tradelab::dashboard::Snapshot;
use tradelab::models::QuoteEntry;
use tradelab::{ApiClient, Backend, Config, Dashboard, Route, SessionMode, SessionStore};

fn init_logging() {
    Builder::new()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .format_timestamp_secs()
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    init_logging();

    let cli = Cli::parse();
    let mut config = Config::from_env();
    cli.apply(&mut config);
    info!("Using API at {}", config.api_base_url);

    let backend: Arc<dyn Backend> = Arc::new(ApiClient::new(&config)?);
    let mode = match &config.session_file {
        Some(path) => SessionMode::Persisted(path.clone()),
        None => SessionMode::Server,
    };
    let session = Arc::new(SessionStore::new(backend.clone(), mode));

    let route = match cli.command.unwrap_or(Commands::Dashboard) {
        Commands::SignIn(credentials) => {
            match session.sign_in(&credentials.email, &credentials.password).await {
                Ok(user) => {
                    println!("Signed in as {}", user.display_name());
                    Route::Dashboard
                }
                Err(e) => {
                    error!("Sign-in failed: {}", e);
                    Route::SignIn
                }
            }
        }
        Commands::SignUp(args) => {
            let credentials = &args.credentials;
            match session
                .sign_up(&credentials.email, &credentials.password, args.full_name.as_deref())
                .await
            {
                Ok(user) => {
                    println!("Welcome, {}", user.display_name());
                    Route::Dashboard
                }
                Err(e) => {
                    error!("Sign-up failed: {}", e);
                    Route::SignIn
                }
            }
        }
        Commands::Dashboard => session.resolve().await,
        Commands::SignOut => {
            session.sign_out().await;
            println!("Signed out.");
            return Ok(());
        }
        Commands::Health => {
            println!("API status: {}", backend.health().await);
            return Ok(());
        }
    };

    if route == Route::SignIn {
        println!("Not signed in. Run `tradelab sign-in --email <EMAIL>` first.");
        return Ok(());
    }

    run_dashboard(backend, session, &config).await;
    Ok(())
}

async fn run_dashboard(backend: Arc<dyn Backend>, session: Arc<SessionStore>, config: &Config) {
    let mut dashboard = Dashboard::start(backend, config).await;
    let (route_tx, mut route_rx) = watch::channel(Route::Dashboard);
    let session_check = session
        .clone()
        .spawn_check(config.session_check_interval, route_tx);

    if let Some(user) = session.current() {
        println!("Welcome back, {}", user.display_name());
    }
    println!("{}", cli::HELP);
    println!("{}", render(&dashboard.snapshot(), &dashboard));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        warn!("Failed to read input: {}", e);
                        break;
                    }
                };
                match cli::parse_command(&line) {
                    Ok(Command::Dispatch(action)) => {
                        if let Err(e) = dashboard.dispatch(action).await {
                            warn!("Action failed: {}", e);
                        }
                        println!("{}", render(&dashboard.snapshot(), &dashboard));
                    }
                    Ok(Command::Show) => println!("{}", render(&dashboard.snapshot(), &dashboard)),
                    Ok(Command::Help) => println!("{}", cli::HELP),
                    Ok(Command::SignOut) => {
                        session.sign_out().await;
                        println!("Signed out.");
                        break;
                    }
                    Ok(Command::Quit) => break,
                    Err(message) => println!("{}", message),
                }
            }
            changed = route_rx.changed() => {
                // the check task only stops after redirecting
                if changed.is_err() || *route_rx.borrow() == Route::SignIn {
                    println!("Session expired. Sign in again.");
                    break;
                }
            }
        }
    }

    session_check.abort();
    dashboard.shutdown();
}

fn render(snapshot: &Snapshot, dashboard: &Dashboard) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "API: {}   delayed data, paper trading\n",
        snapshot.health
    ));
    if let Some(notice) = &snapshot.notice {
        out.push_str(&format!("! {}\n", notice));
    }

    let rows = dashboard.visible_rows();
    if rows.is_empty() {
        if snapshot.watchlist.is_empty() {
            out.push_str("Your watchlist is empty. Search and add a symbol to begin.\n");
        } else {
            out.push_str(&format!("No rows match {:?}\n", snapshot.filter));
        }
    }
    for row in &rows {
        let marker = if snapshot.selected.as_deref() == Some(row.item.symbol.as_str()) {
            '>'
        } else {
            ' '
        };
        out.push_str(&format!(
            "{} {:<8} {:>12} {:>9} {:>10}  {}\n",
            marker,
            row.item.symbol,
            price(&row.quote),
            change(&row.quote),
            updated(&row.quote),
            row.item.name.as_deref().unwrap_or("")
        ));
    }

    if let Some(series) = &snapshot.chart.series {
        match series.close_range() {
            Some((low, high)) => out.push_str(&format!(
                "{}: {} bars, low ${:.2}, high ${:.2}\n",
                series.symbol,
                series.points.len(),
                low,
                high
            )),
            None => out.push_str(&format!("{}: no chart data\n", series.symbol)),
        }
    } else if let Some(message) = snapshot.chart.stream.error() {
        out.push_str(&format!("chart unavailable: {}\n", message));
    }

    for (position, result) in snapshot.search.results.iter().enumerate() {
        out.push_str(&format!("  [{}] {:<8} {}\n", position + 1, result.symbol, result.name));
    }
    out
}

fn price(quote: &QuoteEntry) -> String {
    quote
        .last
        .map(|last| format!("${:.2}", last))
        .unwrap_or_else(|| "-".to_string())
}

fn change(quote: &QuoteEntry) -> String {
    match quote.change_pct {
        Some(pct) if pct >= 0.0 => format!("+{:.2}%", pct),
        Some(pct) => format!("{:.2}%", pct),
        None => "-".to_string(),
    }
}

fn updated(quote: &QuoteEntry) -> String {
    quote
        .updated_at
        .map(|at| at.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string())
}
