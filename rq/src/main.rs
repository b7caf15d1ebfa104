//! rq - CLI entry point for the rentquery roles

use std::time::Duration;

use clap::Parser;
use eyre::{Context, Result};
use tracing::{debug, info, warn};

use rentquery::bus::{LocalBus, TcpCoordinatorBus, TcpProviderBus};
use rentquery::cli::{Cli, Command};
use rentquery::config::Config;
use rentquery::coordinator::Coordinator;
use rentquery::protocol::CollectionResult;
use rentquery::provider::{Provider, sample_fleet_airport, sample_fleet_downtown};

fn setup_logging(cli_log_level: Option<&str>) -> Result<()> {
    // Priority: CLI --log-level > RUST_LOG > default (INFO)
    let level = match cli_log_level {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    Ok(())
}

/// Log the consolidated view of one collection round
fn report_summary(result: &CollectionResult) {
    info!(
        providers = result.reply_count(),
        total_offers = result.total_offers,
        discarded = result.discarded,
        "Consolidated availability"
    );

    for reply in &result.replies {
        info!(
            provider = %reply.provider_name,
            contact = %reply.contact_uri,
            offers = reply.count,
            "Provider inventory"
        );
        for offer in &reply.offers {
            info!(unit = %offer.name, daily_rate = %offer.daily_rate, "  offer");
        }
    }

    match &result.cheapest {
        Some(best) => {
            info!(
                provider = %best.provider_name,
                unit = %best.offer.name,
                daily_rate = %best.offer.daily_rate,
                "Best offer"
            );
        }
        None => {
            warn!("No offers collected this round");
        }
    }
}

async fn run_collect(
    config: &Config,
    expected: Option<usize>,
    timeout_ms: Option<u64>,
    settle_ms: Option<u64>,
) -> Result<()> {
    let expected = expected.unwrap_or(config.collect.expected_replies);
    let timeout = Duration::from_millis(timeout_ms.unwrap_or(config.collect.reply_timeout_ms));
    let settle = Duration::from_millis(settle_ms.unwrap_or(config.collect.settle_ms));

    let bus = TcpCoordinatorBus::bind(&config.bus.broadcast_addr, &config.bus.reply_addr)
        .await
        .context("Failed to bind the coordinator bus endpoints")?;

    info!(
        broadcast = %bus.broadcast_addr(),
        reply = %bus.reply_addr()?,
        "Coordinator bus bound, waiting for providers to connect"
    );
    tokio::time::sleep(settle).await;
    debug!(subscribers = bus.subscriber_count().await, "run_collect: settle elapsed");

    let mut coordinator = Coordinator::new(bus);

    tokio::select! {
        result = coordinator.request_availability(expected, timeout) => {
            report_summary(&result?);
            Ok(())
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupt received, abandoning collection round");
            Ok(())
        }
    }
}

async fn run_provide(config: &Config, name: Option<String>, contact_uri: Option<String>, once: bool) -> Result<()> {
    let name = name.unwrap_or_else(|| config.provider.name.clone());
    let contact_uri = contact_uri.unwrap_or_else(|| config.provider.contact_uri.clone());

    let mut bus = TcpProviderBus::connect(&config.bus.broadcast_addr, &config.bus.reply_addr)
        .await
        .context("Failed to connect to the coordinator bus endpoints")?;

    let provider = Provider::new(name, contact_uri, config.provider.fleet.clone());
    info!(
        provider = provider.name(),
        available = provider.fleet().available_count(),
        "Provider connected"
    );

    if once {
        let outcome = provider.await_and_respond(&mut bus, config.provider.ack_timeout()).await?;
        debug!(?outcome, "run_provide: single cycle finished");
        Ok(())
    } else {
        provider.serve(&mut bus, config.provider.ack_timeout()).await
    }
}

/// One collection round against two in-process sample providers
async fn run_demo(config: &Config) -> Result<()> {
    let bus = LocalBus::default();
    let ack_timeout = config.provider.ack_timeout();

    let downtown = Provider::new(
        "Downtown Rentals",
        "http://api.downtown.example/rental",
        sample_fleet_downtown(),
    );
    let airport = Provider::new("Airport Rentals", "http://api.airport.example/rental", sample_fleet_airport());

    let mut tasks = Vec::new();
    for provider in [downtown, airport] {
        let mut endpoint = bus.provider_side();
        tasks.push(tokio::spawn(async move {
            provider.await_and_respond(&mut endpoint, ack_timeout).await
        }));
    }

    let mut coordinator = Coordinator::new(bus.into_coordinator_side());
    let result = coordinator
        .request_availability(2, config.collect.reply_timeout())
        .await?;
    report_summary(&result);

    for task in tasks {
        task.await??;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.log_level.as_deref())?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    config.validate()?;

    match cli.command.unwrap_or(Command::Demo) {
        Command::Collect {
            expected,
            timeout_ms,
            settle_ms,
        } => run_collect(&config, expected, timeout_ms, settle_ms).await,
        Command::Provide {
            name,
            contact_uri,
            once,
        } => run_provide(&config, name, contact_uri, once).await,
        Command::Demo => run_demo(&config).await,
    }
}
