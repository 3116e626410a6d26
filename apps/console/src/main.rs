use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use client_core::{
    config::normalize_service_url, load_settings, session_from_settings, Completion,
    SessionController, SessionEvent,
};
use tokio::{
    io::{stdin, AsyncBufReadExt, BufReader},
    sync::broadcast,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod commands;
mod render;

use commands::{parse_command, ConsoleCommand, HELP};
use render::{render_closing, render_snapshot, render_tenant_summary};

#[derive(Parser, Debug)]
#[command(about = "Operator console for shipment orders")]
struct Args {
    /// Settings file; `console.toml` in the working directory is used when present.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Overrides the order service URL from settings and environment.
    #[arg(long)]
    service_url: Option<String>,
    /// Initial tenant view.
    #[arg(long, default_value = "ALL")]
    view: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut settings = load_settings(args.config.as_deref())?;
    if let Some(url) = &args.service_url {
        settings.service_url = normalize_service_url(url)?;
    }
    info!(service_url = %settings.service_url, "starting order console");

    let mut session = session_from_settings(&settings)?;
    let mut events = session.subscribe();
    session.switch_view(&args.view);
    if session.start().await != Completion::Applied {
        warn!("initial order list could not be loaded");
    }
    print!("{}", render_snapshot(&session.snapshot(), session.tenants()));

    let mut lines = BufReader::new(stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let command = match parse_command(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(err) => {
                println!("{err}");
                continue;
            }
        };
        if command == ConsoleCommand::Quit {
            break;
        }
        if let Some(output) = dispatch(&mut session, command).await {
            print!("{output}");
        }
        if drain_updates(&mut events) {
            session.refresh_orders().await;
        }
        print!("{}", render_snapshot(&session.snapshot(), session.tenants()));
    }

    Ok(())
}

/// Applies one operator command. Returns extra output beyond the state dump.
async fn dispatch(session: &mut SessionController, command: ConsoleCommand) -> Option<String> {
    match command {
        ConsoleCommand::Search { code } => {
            session.search(&code).await;
        }
        ConsoleCommand::Select { code } => {
            let row = session
                .visible_orders()
                .into_iter()
                .find(|order| order.tracking_code.as_str().eq_ignore_ascii_case(code.trim()))
                .cloned();
            match row {
                Some(row) => {
                    session.select_order(&row).await;
                }
                None => return Some(format!("'{code}' is not in the visible list\n")),
            }
        }
        ConsoleCommand::SetStatus { value } => session.set_status(&value),
        ConsoleCommand::SetLocation { value } => session.set_location(&value),
        ConsoleCommand::Submit => {
            session.submit_update().await;
        }
        ConsoleCommand::Address { value } => {
            session.submit_address(&value).await;
        }
        ConsoleCommand::Clear => session.clear_focus(),
        ConsoleCommand::View { label } => session.switch_view(&label),
        ConsoleCommand::Refresh => {
            session.refresh_orders().await;
        }
        ConsoleCommand::Closing => {
            if session.load_daily_closing().await == Completion::Applied {
                return session.snapshot().closing_report.as_ref().map(render_closing);
            }
        }
        ConsoleCommand::Tenants => {
            return Some(render_tenant_summary(
                &session.tenant_summary(),
                session.tenants(),
            ))
        }
        ConsoleCommand::Help => return Some(format!("{HELP}\n")),
        ConsoleCommand::Show | ConsoleCommand::Quit => {}
    }
    None
}

/// True when the service accepted an update since the last drain.
fn drain_updates(events: &mut broadcast::Receiver<SessionEvent>) -> bool {
    let mut updated = false;
    loop {
        match events.try_recv() {
            Ok(SessionEvent::OrderUpdated(_)) => updated = true,
            Ok(SessionEvent::Changed(_)) => {}
            Err(broadcast::error::TryRecvError::Lagged(_)) => updated = true,
            Err(_) => break,
        }
    }
    updated
}
