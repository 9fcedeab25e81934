use std::{future, path::PathBuf, sync::Arc};

use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use greenlane::{
    api::{self, RemoteSignalController},
    config::AppConfig,
    controller::{SignalCommander, SignalController, SignalControllerEngine},
    decision::DecisionEngine,
    error::Result,
    notify::NotificationCoordinator,
    sink::{
        Actuator, BlynkNotifier, EventDispatcher, EventLog, GpioActuator, JsonlEventLog,
        NotificationSink, SimulatedActuator, TracingEventLog, TracingNotifier,
    },
};

/// Emergency-vehicle signal priority for a two-phase intersection.
#[derive(Parser, Debug)]
#[command(name = "greenlane")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Read environment variables from this file instead of `./.env`
    #[arg(long, global = true, env = "GREENLANE_ENV_FILE")]
    env_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, Default)]
enum Command {
    /// Run the decision server and the signal controller in one process (default)
    #[default]
    Run,
    /// Run only the signal controller service
    Controller,
    /// Run only the decision server, commanding a remote signal controller
    Server,
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("greenlane=info"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn build_actuator(config: &AppConfig) -> Arc<dyn Actuator> {
    if config.simulate() {
        info!("simulation mode, signal outputs are only logged");
        return Arc::new(SimulatedActuator);
    }

    let gpio = GpioActuator::new(config.gpio_root(), config.gpio_pins());
    match gpio.init().await {
        Ok(()) => Arc::new(gpio),
        Err(e) => {
            warn!(error = %e, "GPIO unavailable, falling back to simulation");
            Arc::new(SimulatedActuator)
        }
    }
}

fn build_notifier(config: &AppConfig) -> Result<Arc<dyn NotificationSink>> {
    match config.blynk() {
        Some(blynk) => {
            info!(base_url = blynk.base_url(), "alerts pushed to Blynk");
            Ok(Arc::new(BlynkNotifier::new(blynk.clone())?))
        }
        None => Ok(Arc::new(TracingNotifier)),
    }
}

fn build_events(config: &AppConfig) -> Arc<EventDispatcher> {
    let log: Arc<dyn EventLog> = match config.event_log_path() {
        Some(path) => {
            info!(path = %path.display(), "events appended to JSON lines log");
            Arc::new(JsonlEventLog::new(path))
        }
        None => Arc::new(TracingEventLog),
    };

    EventDispatcher::spawn_with_capacity(
        log,
        config.event_log_timeout(),
        config.event_log_capacity(),
    )
}

async fn start_controller(
    config: &AppConfig,
    events: Arc<EventDispatcher>,
) -> Arc<SignalController> {
    let actuator = build_actuator(config).await;
    SignalControllerEngine::new(config.controller().clone(), actuator, events).start()
}

fn build_decision_engine(
    config: &AppConfig,
    commander: Arc<dyn SignalCommander>,
    events: Arc<EventDispatcher>,
) -> Result<Arc<DecisionEngine>> {
    let notifier =
        NotificationCoordinator::new(config.notification().clone(), build_notifier(config)?);

    Ok(DecisionEngine::new(
        config.policy().clone(),
        commander,
        notifier,
        events,
    ))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for ctrl-c, running until killed");
        future::pending::<()>().await;
    }

    info!("shutdown requested");
}

async fn stop_controller(controller: &SignalController) {
    if let Err(e) = controller.shutdown().await {
        warn!(error = %e, "signal controller did not shut down cleanly");
    }
}

async fn run_all(config: AppConfig) -> Result<()> {
    let events = build_events(&config);
    let controller = start_controller(&config, events.clone()).await;
    let engine = build_decision_engine(&config, controller.clone(), events)?;

    let app = api::report_router(engine.clone())
        .merge(api::controller_router(
            controller.clone(),
            config.policy().default_priority(),
        ))
        .merge(api::health_router());

    let listener = api::bind(config.listen_addr()).await?;
    let serve_res = api::serve(listener, app, shutdown_signal()).await;

    engine.shutdown().await;
    stop_controller(&controller).await;

    Ok(serve_res?)
}

async fn run_controller(config: AppConfig) -> Result<()> {
    let events = build_events(&config);
    let controller = start_controller(&config, events).await;

    let app = api::controller_router(controller.clone(), config.policy().default_priority())
        .merge(api::health_router());

    let listener = api::bind(config.controller_listen_addr()).await?;
    let serve_res = api::serve(listener, app, shutdown_signal()).await;

    stop_controller(&controller).await;

    Ok(serve_res?)
}

async fn run_server(config: AppConfig) -> Result<()> {
    let events = build_events(&config);
    let remote = RemoteSignalController::new(
        config.controller_url(),
        config.controller_request_timeout(),
    )?;
    info!(controller_url = remote.base_url(), "commanding remote signal controller");

    let engine = build_decision_engine(&config, Arc::new(remote), events)?;
    let app = api::report_router(engine.clone()).merge(api::health_router());

    let listener = api::bind(config.listen_addr()).await?;
    let serve_res = api::serve(listener, app, shutdown_signal()).await;

    engine.shutdown().await;

    Ok(serve_res?)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.env_file {
        Some(path) => {
            dotenvy::from_path(path)?;
        }
        None => {
            dotenvy::dotenv().ok();
        }
    }

    init_tracing();

    let config = AppConfig::from_env()?;

    match cli.command.unwrap_or_default() {
        Command::Run => run_all(config).await,
        Command::Controller => run_controller(config).await,
        Command::Server => run_server(config).await,
    }
}
