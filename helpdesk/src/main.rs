// Help Desk Mefasa - command-line client
// Entry point and command dispatch

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use helpdesk::app::{self, AppState};
use helpdesk::config::ClientConfig;
use helpdesk::models::{Credentials, DashboardStats, FilterDraft};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Help Desk Mefasa command-line client.
#[derive(Parser, Debug)]
#[command(name = "helpdesk", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Log in and store the session.
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        /// One-time code when two-factor authentication is enabled.
        #[arg(long)]
        code: Option<String>,
    },
    /// Drop the stored session.
    Logout,
    /// Show the logged-in user.
    Whoami,
    /// List tickets, or show one with its history and comments.
    Tickets {
        #[arg(long)]
        id: Option<i64>,
    },
    /// List saved filters, favorites first.
    Filters,
    /// Toggle a filter as favorite.
    Favorite { filter_id: i64 },
    /// Check a filter definition without saving it.
    ValidateFilter { file: PathBuf },
    /// Show ticket statistics.
    Dashboard {
        #[arg(long)]
        days: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "helpdesk=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    // Offline command, no session or backend needed
    if let Commands::ValidateFilter { file } = &cli.command {
        return validate_filter(file);
    }

    let config = ClientConfig::from_env().context("invalid configuration")?;
    let state = app::setup(config).await?;

    match cli.command {
        Commands::Login {
            email,
            password,
            code,
        } => {
            let mut credentials = Credentials::new(email, password);
            if let Some(code) = code {
                credentials = credentials.with_code(code);
            }
            let session = state.session.login(&credentials).await?;
            println!("Logged in as {} ({})", session.user.name, session.user.role);
        }
        Commands::Logout => {
            state.session.logout().await;
            println!("Logged out");
        }
        Commands::Whoami => match state.session.current_user() {
            Some(user) => println!("{} <{}> - {}", user.name, user.email, user.role),
            None => println!("Not logged in"),
        },
        Commands::Tickets { id } => {
            require_session(&state)?;
            show_tickets(&state, id).await?;
        }
        Commands::Filters => {
            require_session(&state)?;
            show_filters(&state).await?;
        }
        Commands::Favorite { filter_id } => {
            require_session(&state)?;
            state.favorites.load().await?;
            let favorite = state.favorites.toggle(filter_id).await?;
            println!(
                "Filter {} {} favorites",
                filter_id,
                if favorite { "added to" } else { "removed from" }
            );
        }
        Commands::Dashboard { days } => {
            require_session(&state)?;
            let settings = state.settings.get_dashboard().await?;
            let dashboard = state
                .dashboard
                .clone()
                .with_days(days.unwrap_or(settings.days));
            let stats = dashboard.refresh().await?;
            print_stats(&stats);

            if let Some(auto) = dashboard.auto_refresh(&settings) {
                let period = auto.interval().as_duration();
                println!("Refreshing every {}s, Ctrl+C to stop", auto.interval().as_secs());

                let mut ticker = tokio::time::interval(period);
                ticker.tick().await;
                loop {
                    tokio::select! {
                        _ = tokio::signal::ctrl_c() => break,
                        _ = ticker.tick() => {
                            if let Some(stats) = dashboard.latest().await {
                                print_stats(&stats);
                            }
                        }
                    }
                }
            }
        }
        Commands::ValidateFilter { .. } => {}
    }

    Ok(())
}

fn print_stats(stats: &DashboardStats) {
    println!("Total tickets: {}", stats.total_tickets);
    for entry in &stats.by_status {
        println!("  {:<20} {}", entry.label, entry.count);
    }
    for point in &stats.tickets_per_day {
        println!("  {} {}", point.date, point.count);
    }
}

fn require_session(state: &AppState) -> anyhow::Result<()> {
    if !state.session.is_authenticated() {
        bail!("not logged in, run `helpdesk login` first");
    }
    Ok(())
}

async fn show_tickets(state: &AppState, id: Option<i64>) -> anyhow::Result<()> {
    match id {
        Some(id) => {
            let detail = state.tickets.detail(id).await?;
            let ticket = &detail.ticket;
            println!("#{} {} [{} / {}]", ticket.id, ticket.title, ticket.status, ticket.priority);
            for change in &detail.history {
                println!(
                    "  {} {}: {} -> {}",
                    change.created_at,
                    change.field_name,
                    change.old_value.as_deref().unwrap_or("-"),
                    change.new_value.as_deref().unwrap_or("-")
                );
            }
            for comment in &detail.comments {
                println!("  > {}", comment.content);
            }
        }
        None => {
            for ticket in state.tickets.list().fetch().await? {
                println!(
                    "#{:<5} {:<12} {:<8} {}",
                    ticket.id, ticket.status, ticket.priority, ticket.title
                );
            }
        }
    }
    Ok(())
}

async fn show_filters(state: &AppState) -> anyhow::Result<()> {
    state.favorites.load().await?;
    let filters = state.filters.filters().fetch().await?;

    let mut favorites = Vec::with_capacity(filters.len());
    for filter in &filters {
        favorites.push(state.favorites.is_favorite(filter.id).await);
    }
    let mut rows: Vec<_> = filters.into_iter().zip(favorites).collect();
    rows.sort_by_key(|(filter, favorite)| (!favorite, filter.filter_name.clone()));

    for (filter, favorite) in rows {
        println!(
            "{} {:<4} {:<30} {}",
            if favorite { "*" } else { " " },
            filter.id,
            filter.filter_name,
            filter.describe()
        );
    }
    Ok(())
}

fn validate_filter(file: &Path) -> anyhow::Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let draft: FilterDraft = serde_json::from_str(&content).context("not a filter definition")?;

    match draft.validate() {
        Ok(()) => {
            println!("Valid: {}", draft.normalized().describe());
            Ok(())
        }
        Err(errors) => {
            for error in errors.errors() {
                eprintln!("{}: {}", error.field, error.message);
            }
            bail!("filter has {} error(s)", errors.len())
        }
    }
}
