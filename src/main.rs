//! Command-line front end for the money-transfer client.

use std::io::{self, BufRead, Write};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use rust_decimal::Decimal;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use money_transfer_client::app::{
    ClientConfig, ClientContext, NotificationCenter, SubmitOutcome, TransferOrchestrator,
    TransferStep,
};
use money_transfer_client::domain::types::parse_amount;
use money_transfer_client::domain::{AppError, Navigator, Route, Severity, ValidationPhase};
use money_transfer_client::infra::{FileKeyValueStore, ReqwestTransport};

/// How long to wait for the destination account check
const DESTINATION_TIMEOUT: Duration = Duration::from_secs(15);

/// Money transfer client
#[derive(Parser)]
#[command(name = "money-transfer", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in and store the session
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "MONEY_TRANSFER_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Forget the stored session
    Logout,

    /// Show the signed-in user
    Whoami,

    /// List your accounts
    Accounts,

    /// Show your transfer history
    History,

    /// Send money to another account
    Transfer {
        /// Source account number
        #[arg(long)]
        from: Option<String>,
        /// Destination account number
        #[arg(long)]
        to: String,
        /// Amount, e.g. 42.50
        #[arg(long, value_parser = parse_amount_arg)]
        amount: Option<Decimal>,
        /// Send the whole balance of the source account
        #[arg(long, conflicts_with = "amount")]
        max: bool,
        #[arg(long)]
        description: Option<String>,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

fn parse_amount_arg(raw: &str) -> Result<Decimal, String> {
    parse_amount(raw).ok_or_else(|| format!("`{raw}` is not a valid amount"))
}

/// Navigation requests are shown to the user and logged
struct CliNavigator;

impl Navigator for CliNavigator {
    fn navigate(&self, route: Route) {
        info!(route = %route.path(), "Navigation requested");
        eprintln!("-> {}", route.path());
    }
}

fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,reqwest=warn"));
    let registry = tracing_subscriber::registry().with(env_filter);

    // stdout is reserved for command output
    if std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
            .init();
    }
}

/// Print notifications as they are raised
fn spawn_notification_printer(center: &NotificationCenter) {
    let mut receiver = center.subscribe();
    tokio::spawn(async move {
        while let Ok(active) = receiver.recv().await {
            let n = active.notification;
            let tag = match n.severity {
                Severity::Success => "ok",
                Severity::Error => "error",
                Severity::Warning => "warning",
                Severity::Info => "info",
            };
            eprintln!("[{tag}] {}: {}", n.title, n.message);
        }
    });
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{prompt} [y/N] ");
    io::stdout().flush().context("Failed to flush stdout")?;
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read confirmation")?;
    Ok(matches!(line.trim(), "y" | "Y" | "yes"))
}

fn require_session(ctx: &ClientContext, route: &str) -> Result<()> {
    if !ctx.auth_guard().can_activate(route) {
        return Err(AppError::NotAuthenticated).context("Run `money-transfer login` first");
    }
    Ok(())
}

/// One-line progress such as `[x] Source account > [ ] Recipient`
fn render_steps(steps: &[TransferStep]) -> String {
    steps
        .iter()
        .map(|step| {
            let mark = match (step.completed, step.has_error) {
                (_, true) => "!",
                (true, false) => "x",
                (false, false) => " ",
            };
            format!("[{mark}] {}", step.kind.label())
        })
        .collect::<Vec<_>>()
        .join(" > ")
}

async fn run_transfer(
    ctx: &ClientContext,
    from: Option<String>,
    to: String,
    amount: Option<Decimal>,
    max: bool,
    description: Option<String>,
    yes: bool,
) -> Result<()> {
    let orchestrator: TransferOrchestrator = ctx.transfer_orchestrator();

    let sources = orchestrator.load_accounts().await?;
    if sources.is_empty() {
        bail!("No account can fund a transfer");
    }

    let from = from.unwrap_or_else(|| sources[0].account_number.clone());
    let amount = amount.map(|a| a.to_string());
    orchestrator.prefill(Some(&from), Some(&to), amount.as_deref());
    if max && !orchestrator.set_max_amount() {
        bail!("Unknown source account {from}");
    }
    if let Some(description) = description {
        orchestrator.set_description(&description);
    }

    eprintln!("Checking destination account...");
    let destination = tokio::time::timeout(DESTINATION_TIMEOUT, orchestrator.destination_settled())
        .await
        .context("Destination check timed out")?;
    debug!(?destination, "Destination settled");
    if destination.phase != ValidationPhase::Valid {
        bail!(
            "{}",
            destination
                .error
                .unwrap_or_else(|| "Destination account is not valid".to_string())
        );
    }

    let outcome = orchestrator.submit().await;
    eprintln!("{}", render_steps(&orchestrator.steps()));
    match outcome {
        SubmitOutcome::AwaitingConfirmation => {}
        SubmitOutcome::Incomplete { errors, .. } => {
            for (field, issue) in errors.iter() {
                eprintln!("{field}: {issue}");
            }
            bail!("The transfer form is incomplete");
        }
        other => bail!("Unexpected state: {other:?}"),
    }

    if let Some(summary) = orchestrator.summary() {
        println!("From:        {}", summary.from_account);
        println!("To:          {}", summary.to_account);
        println!("Amount:      {:.2}", summary.amount);
        println!("Description: {}", summary.description);
        println!("Fees:        {:.2}", summary.fees);
        println!("Total:       {:.2}", summary.total_amount);
    }

    if !yes && !confirm("Send this transfer?")? {
        orchestrator.cancel();
        println!("Cancelled");
        return Ok(());
    }

    match orchestrator.submit().await {
        SubmitOutcome::Completed(transfer) => {
            println!("Transfer #{} {}", transfer.id, transfer.status);
            Ok(())
        }
        SubmitOutcome::FinalValidationFailed(problems) => bail!(problems.join("; ")),
        SubmitOutcome::Failed(e) => bail!(e.user_message()),
        other => bail!("Unexpected state: {other:?}"),
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = ClientConfig::from_env();
    info!(api = %config.api_base_url, "Starting money transfer client");

    let transport = Arc::new(
        ReqwestTransport::new(config.http_timeout).context("Failed to build HTTP client")?,
    );
    let storage = Arc::new(
        FileKeyValueStore::open(&config.session_file).context("Failed to open session file")?,
    );
    let center = Arc::new(NotificationCenter::new());
    spawn_notification_printer(&center);

    let ctx = ClientContext::new(config, transport, storage, center, Arc::new(CliNavigator))
        .context("Failed to initialise client")?;

    match cli.command {
        Commands::Login { email, password } => {
            let user = ctx.auth.login(&email, &password).await?;
            println!("Signed in as {} {}", user.first_name, user.last_name);
        }
        Commands::Logout => {
            ctx.auth.logout();
            println!("Signed out");
        }
        Commands::Whoami => match ctx.session.profile() {
            Some(profile) => {
                println!("{} ({}) <{}>", profile.full_name, profile.initials, profile.email);
                if let Some(expiry) = ctx.session.token_expiry() {
                    println!("Session valid until {expiry}");
                }
            }
            None => println!("Not signed in"),
        },
        Commands::Accounts => {
            require_session(&ctx, Route::Accounts.path().as_str())?;
            for account in ctx.accounts.list_accounts().await? {
                println!(
                    "{:<22} {:>14.2} {}",
                    account.account_number, account.balance, account.currency
                );
            }
        }
        Commands::History => {
            require_session(&ctx, Route::History.path().as_str())?;
            for transfer in ctx.transfers.list_transfers().await? {
                println!(
                    "#{:<6} {} -> {} {:>12.2} {:<9} {}",
                    transfer.id,
                    transfer.from_account.account_number,
                    transfer.to_account.account_number,
                    transfer.amount,
                    transfer.status,
                    transfer.description.as_deref().unwrap_or("")
                );
            }
        }
        Commands::Transfer {
            from,
            to,
            amount,
            max,
            description,
            yes,
        } => {
            require_session(&ctx, Route::Transfer.path().as_str())?;
            run_transfer(&ctx, from, to, amount, max, description, yes).await?;
        }
    }

    // Let the notification printer drain
    tokio::task::yield_now().await;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();
    init_tracing();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
