use std::{
    net::SocketAddr,
    sync::{Arc, OnceLock},
    time::{Duration, Instant},
};

use anyhow::Context;
use chrono::{DateTime, FixedOffset, Offset, Utc};
use chrono_tz::Tz;
use rumqttc::{AsyncClient, QoS};
use tokio::{net::TcpListener, sync::Mutex};
use tracing::{debug, info, warn};

use fireplace_common::{
    PendingSave, Schedule, ThermostatEngine, TOPIC_CONTROLLER_SCHEDULE_STATE,
    TOPIC_CONTROLLER_STATE,
};

use crate::{
    http,
    ir::HostIrSender,
    mqtt,
    store::{DataDir, RuntimeConfig},
};

/// Everything the control path mutates. One lock serializes engine access
/// from the control loop, HTTP handlers and MQTT commands.
pub struct Core {
    pub engine: ThermostatEngine,
    pub sender: HostIrSender,
    pub schedule: Schedule,
    pub timezone: String,
    pub time_synced: bool,
    applied_slot: Option<i64>,
}

impl Core {
    pub fn new(
        engine: ThermostatEngine,
        sender: HostIrSender,
        schedule: Schedule,
        timezone: String,
    ) -> Self {
        Self {
            engine,
            sender,
            schedule,
            timezone,
            time_synced: false,
            applied_slot: None,
        }
    }

    /// One control period: schedule slot, then engine tick. Returns the
    /// settings snapshot to write once the save debounce has run out.
    pub fn control_tick(
        &mut self,
        now_ms: u64,
        local_now: Option<DateTime<FixedOffset>>,
    ) -> Option<PendingSave> {
        self.time_synced = local_now.is_some();
        if let Some(local_now) = local_now {
            self.apply_schedule(now_ms, local_now);
        }

        self.engine.tick(now_ms, &mut self.sender);
        self.engine.due_save(now_ms)
    }

    pub fn replace_schedule(&mut self, mut schedule: Schedule) -> &Schedule {
        schedule.normalize();
        self.schedule = schedule;
        self.applied_slot = None;
        &self.schedule
    }

    /// A slot is applied once when it becomes active, so edits made inside the
    /// slot stick. Slots reached during a hold are applied when the hold ends.
    fn apply_schedule(&mut self, now_ms: u64, local_now: DateTime<FixedOffset>) {
        let Some(action) = self.schedule.current_action(local_now) else {
            self.applied_slot = None;
            return;
        };
        if self.applied_slot == Some(action.started_at) || self.engine.is_in_hold() {
            return;
        }

        match self
            .engine
            .apply_schedule_action(action.mode, action.target_temp_f, now_ms)
        {
            Ok(changed) => {
                info!(
                    mode = action.mode.as_str(),
                    target_f = action.target_temp_f,
                    changed,
                    "schedule slot applied"
                );
            }
            Err(err) => warn!("schedule slot rejected: {err}"),
        }
        self.applied_slot = Some(action.started_at);
    }
}

#[derive(Clone)]
pub struct AppState {
    pub core: Arc<Mutex<Core>>,
    pub mqtt: AsyncClient,
    pub data_dir: DataDir,
}

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let data_dir = DataDir::from_env();
    let mut runtime = data_dir.load_runtime_config().await.unwrap_or_else(|err| {
        warn!("failed to load runtime config: {err:#}");
        RuntimeConfig::default()
    });
    runtime.apply_env(|key| std::env::var(key).ok());

    let schedule = data_dir.load_schedule().await.unwrap_or_else(|err| {
        warn!("failed to load schedule: {err:#}");
        Schedule::default()
    });

    let thermostat = runtime.thermostat.clone();
    let engine = ThermostatEngine::new(thermostat.clone(), runtime.settings.clone());
    let core = Core::new(
        engine,
        HostIrSender::new(thermostat.light_default_level),
        schedule,
        runtime.timezone.clone(),
    );

    let (client, eventloop) = AsyncClient::new(mqtt::options(&runtime.mqtt), 64);
    let app_state = AppState {
        core: Arc::new(Mutex::new(core)),
        mqtt: client,
        data_dir,
    };

    mqtt::subscribe_topics(&app_state.mqtt)
        .await
        .context("failed to queue mqtt subscriptions")?;
    mqtt::spawn_event_loop(app_state.clone(), eventloop);
    spawn_control_loop(
        app_state.clone(),
        Duration::from_millis(thermostat.dispatch_poll_ms.max(1)),
        thermostat.control_tick_ms,
    );
    spawn_state_publish_loop(
        app_state.clone(),
        Duration::from_millis(thermostat.state_publish_interval_ms.max(1)),
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], runtime.http_port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind controller server at {addr}"))?;

    info!("controller listening on http://{addr}");
    axum::serve(listener, http::router(app_state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server failed")?;
    Ok(())
}

/// Drains the IR queue every poll and runs a full control tick every `tick_ms`.
fn spawn_control_loop(app_state: AppState, poll: Duration, tick_ms: u64) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(poll);
        let mut next_tick_ms = 0;

        loop {
            interval.tick().await;
            let now_ms = monotonic_ms();

            let pending = {
                let mut core = app_state.core.lock().await;
                if now_ms >= next_tick_ms {
                    let local_now = now_in_timezone(&core.timezone);
                    next_tick_ms = now_ms.saturating_add(tick_ms);
                    core.control_tick(now_ms, local_now)
                } else {
                    let Core { engine, sender, .. } = &mut *core;
                    if engine.dispatch_due(now_ms, sender) > 0 {
                        debug!("dispatched queued ir command");
                    }
                    None
                }
            };

            if let Some(pending) = pending {
                persist_settings(&app_state.core, &app_state.data_dir, pending).await;
            }
        }
    });
}

/// Writes a settings snapshot without holding the core lock, then reports
/// the outcome back to the engine.
async fn persist_settings(core: &Mutex<Core>, data_dir: &DataDir, pending: PendingSave) {
    let result = data_dir.save_settings(&pending.settings).await;
    core.lock()
        .await
        .engine
        .finish_save(&pending, result, monotonic_ms());
}

fn spawn_state_publish_loop(app_state: AppState, period: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;

            let now_ms = monotonic_ms();
            let (state_payload, schedule_payload) = {
                let core = app_state.core.lock().await;
                (
                    serde_json::to_vec(&core.engine.state_payload(now_ms)),
                    serde_json::to_vec(&core.schedule),
                )
            };

            publish_retained(&app_state.mqtt, TOPIC_CONTROLLER_STATE, state_payload).await;
            publish_retained(&app_state.mqtt, TOPIC_CONTROLLER_SCHEDULE_STATE, schedule_payload)
                .await;
        }
    });
}

async fn publish_retained(
    mqtt: &AsyncClient,
    topic: &str,
    payload: Result<Vec<u8>, serde_json::Error>,
) {
    match payload {
        Ok(body) => {
            if let Err(err) = mqtt.publish(topic, QoS::AtLeastOnce, true, body).await {
                warn!("publish to {topic} failed: {err}");
            }
        }
        Err(err) => warn!("serializing {topic} payload failed: {err}"),
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

pub fn now_in_timezone(timezone: &str) -> Option<DateTime<FixedOffset>> {
    let tz: Tz = timezone.parse().ok()?;
    let local = Utc::now().with_timezone(&tz);
    Some(local.with_timezone(&local.offset().fix()))
}

pub fn monotonic_ms() -> u64 {
    static START: OnceLock<Instant> = OnceLock::new();
    START
        .get_or_init(Instant::now)
        .elapsed()
        .as_millis()
        .try_into()
        .unwrap_or(u64::MAX)
}
