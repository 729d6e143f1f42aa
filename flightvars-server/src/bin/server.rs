use anyhow::Context;
use clap::{App, Arg};
use flightvars_bus::LocalBus;
use flightvars_core::api::FlightVars;
use flightvars_core::codec::VariableGroup;
use flightvars_fsuipc::{DomainSettings, DummyOffsetAdapter, Offset, OffsetDomain, OFFSETS_GROUP};
use flightvars_server::{server, Router, Settings};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::try_init().map_err(|e| anyhow::anyhow!(e))?;

    let matches = App::new("flightvars-server")
        .version("0.1.0")
        .about("Exposes flight simulator state as a stream of named variables")
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .takes_value(true)
                .help("Path of the configuration file"),
        )
        .arg(
            Arg::with_name("port")
                .short("p")
                .long("port")
                .takes_value(true)
                .help("TCP port to listen on"),
        )
        .get_matches();

    let mut settings =
        Settings::load(matches.value_of("config")).context("cannot load settings")?;
    if let Some(port) = matches.value_of("port") {
        settings.port = port.parse().context("invalid port")?;
    }
    let exports = settings
        .exports
        .iter()
        .map(|export| export.parse::<Offset>())
        .collect::<Result<Vec<_>, _>>()
        .context("invalid offset export")?;
    if let Some(broker) = &settings.broker {
        info!(
            "external broker at {}:{} is not wired in this build, using the in-process bus",
            broker.host, broker.port
        );
    }

    let bus = Arc::new(LocalBus::new());
    let domain = OffsetDomain::new(
        DomainSettings {
            exports,
            poll_interval: Duration::from_millis(settings.poll_interval_ms),
        },
        bus,
        Box::new(DummyOffsetAdapter::new()),
    )
    .context("cannot initialize the FSUIPC offsets domain")?;

    let router = Arc::new(Router::new());
    router.register_group_master(
        VariableGroup::new(OFFSETS_GROUP),
        domain.clone() as Arc<dyn FlightVars>,
    )?;

    let (notify_shutdown, _) = broadcast::channel(1);
    let domain_task = domain.start(notify_shutdown.subscribe());

    let listener = TcpListener::bind(&format!("0.0.0.0:{}", settings.port)).await?;
    info!("FlightVars server listening on port {}", settings.port);
    server::run(listener, router, tokio::signal::ctrl_c())
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    drop(notify_shutdown);
    domain_task.await?;
    Ok(())
}
