use crate::ui;
use chrono::Utc;
use color_eyre::eyre::{
    Result,
    WrapErr,
};
use rolls_client::{
    AppConfig,
    api::ApiClient,
    controller::AppController,
    events::{
        Flow,
        dispatch,
    },
    worker::{
        WorkerEvent,
        WorkerLimits,
        run_worker,
    },
};
use std::time::Duration;
use tokio::{
    sync::mpsc,
    time::{
        self,
        MissedTickBehavior,
    },
};
use tracing::{
    info,
    warn,
};

const TICK: Duration = Duration::from_secs(1);

pub async fn run_app(config: AppConfig) -> Result<()> {
    let api = ApiClient::new(config.api_url.clone(), config.identity.clone())
        .wrap_err("Failed to build the HTTP client")?;
    info!(backend = %api, "using backend");

    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let worker = tokio::spawn(run_worker(
        api,
        WorkerLimits::from(&config.sync),
        cmd_rx,
        event_tx,
    ));
    let controller = AppController::new(&config, cmd_tx);

    let mut ui_state = ui::UiState::default();
    let mut input_events = ui::input_event_stream();

    info!("Starting UI");
    ui::terminal_enter(&mut ui_state)?;
    let res = run_loop(controller, event_rx, &mut ui_state, &mut input_events).await;
    ui::terminal_exit()?;

    if let Err(err) = worker.await {
        warn!(%err, "worker task ended abnormally");
    }
    res
}

async fn run_loop(
    mut controller: AppController,
    mut worker_events: mpsc::UnboundedReceiver<WorkerEvent>,
    ui_state: &mut ui::UiState,
    input_events: &mut ui::InputEventReceiver,
) -> Result<()> {
    info!("Running app loop");
    controller.startup();
    ui::draw(ui_state, &controller.snapshot()).wrap_err("initial draw failed")?;

    let mut ticker = time::interval(TICK);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // the first tick completes immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                controller.tick();
            }
            maybe_event = worker_events.recv() => {
                let Some(event) = maybe_event else {
                    warn!("worker channel closed");
                    break;
                };
                controller.handle_worker_event(event, Utc::now());
            }
            _ = tokio::signal::ctrl_c() => {
                break;
            }
            raw_ev = ui::next_raw_event(input_events) => {
                let event = raw_ev?;
                let Some(ev) = ui::interpret_event(ui_state, &event) else {
                    continue;
                };
                if dispatch(&mut controller, ev) == Flow::Quit {
                    break;
                }
            }
        }
        ui::draw(ui_state, &controller.snapshot()).wrap_err("draw failed")?;
    }

    controller.shutdown();
    info!("app loop stopped");
    Ok(())
}
