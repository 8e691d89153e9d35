use std::time::Duration;

use anyhow::{anyhow, Context};
use rumqttc::{AsyncClient, Event, EventLoop, Incoming, MqttOptions, QoS};
use tracing::{info, warn};

use fireplace_common::{
    Schedule, ThermostatMode, COMMAND_TOPICS, TOPIC_CMD_HOLD, TOPIC_CMD_MODE, TOPIC_CMD_POWER,
    TOPIC_CMD_SCHEDULE, TOPIC_CMD_TARGET, TOPIC_SENSOR_HUMIDITY, TOPIC_SENSOR_TEMP,
};

use crate::{
    app::{monotonic_ms, AppState, Core},
    store::MqttConfig,
};

const MAX_MQTT_PAYLOAD_BYTES: usize = 512;

/// Decoded inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum MqttCommand {
    Temperature(f32),
    Humidity(f32),
    Power(bool),
    Target(f32),
    Mode(ThermostatMode),
    HoldEnter(Option<u64>),
    HoldExit,
    Schedule(Schedule),
}

pub fn options(config: &MqttConfig) -> MqttOptions {
    let mut options = MqttOptions::new(config.client_id.clone(), config.host.clone(), config.port);
    options.set_keep_alive(Duration::from_secs(30));
    if !config.user.is_empty() {
        options.set_credentials(config.user.clone(), config.pass.clone());
    }
    options
}

pub async fn subscribe_topics(mqtt: &AsyncClient) -> anyhow::Result<()> {
    let sensor_topics = [TOPIC_SENSOR_TEMP, TOPIC_SENSOR_HUMIDITY];
    for topic in sensor_topics.into_iter().chain(COMMAND_TOPICS) {
        mqtt.subscribe(topic, QoS::AtMostOnce)
            .await
            .with_context(|| format!("subscribe to {topic}"))?;
    }
    Ok(())
}

pub fn spawn_event_loop(app_state: AppState, mut eventloop: EventLoop) {
    tokio::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::Publish(message))) => {
                    let command = match decode(&message.topic, &message.payload) {
                        Ok(Some(command)) => command,
                        Ok(None) => continue,
                        Err(err) => {
                            warn!(topic = %message.topic, "mqtt message rejected: {err:#}");
                            continue;
                        }
                    };
                    let applied = {
                        let mut core = app_state.core.lock().await;
                        apply(&mut core, command, monotonic_ms())
                    };
                    match applied {
                        Ok(Some(schedule)) => {
                            if let Err(err) = app_state.data_dir.save_schedule(&schedule).await {
                                warn!("failed to persist mqtt schedule update: {err:#}");
                            }
                        }
                        Ok(None) => {}
                        Err(err) => {
                            warn!(topic = %message.topic, "mqtt command failed: {err:#}");
                        }
                    }
                }
                Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                    info!("mqtt connected");
                }
                Ok(_) => {}
                Err(err) => {
                    // Local control keeps running while the broker is away.
                    warn!("mqtt poll error: {err}");
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
            }
        }
    });
}

/// Oversized and non-UTF-8 payloads are dropped; unknown topics are ignored.
pub fn decode(topic: &str, payload: &[u8]) -> anyhow::Result<Option<MqttCommand>> {
    if payload.len() > MAX_MQTT_PAYLOAD_BYTES {
        warn!(topic, bytes = payload.len(), "dropping oversized mqtt payload");
        return Ok(None);
    }
    let Ok(message) = std::str::from_utf8(payload) else {
        warn!(topic, "dropping non utf8 mqtt payload");
        return Ok(None);
    };
    let message = message.trim();

    let command = match topic {
        TOPIC_SENSOR_TEMP => MqttCommand::Temperature(parse_number(message)?),
        TOPIC_SENSOR_HUMIDITY => MqttCommand::Humidity(parse_number(message)?),
        TOPIC_CMD_POWER => match message.to_ascii_lowercase().as_str() {
            "on" => MqttCommand::Power(true),
            "off" => MqttCommand::Power(false),
            other => return Err(anyhow!("unknown power command '{other}'")),
        },
        TOPIC_CMD_TARGET => MqttCommand::Target(parse_number(message)?),
        TOPIC_CMD_MODE => MqttCommand::Mode(message.parse()?),
        TOPIC_CMD_HOLD => match message.to_ascii_lowercase().as_str() {
            "on" | "enter" => MqttCommand::HoldEnter(None),
            "off" | "exit" => MqttCommand::HoldExit,
            minutes => {
                let minutes: u64 = minutes
                    .parse()
                    .with_context(|| format!("invalid hold value '{minutes}'"))?;
                MqttCommand::HoldEnter(Some(minutes))
            }
        },
        TOPIC_CMD_SCHEDULE => {
            MqttCommand::Schedule(serde_json::from_str(message).context("invalid schedule json")?)
        }
        _ => return Ok(None),
    };
    Ok(Some(command))
}

fn parse_number(message: &str) -> anyhow::Result<f32> {
    message
        .parse::<f32>()
        .with_context(|| format!("invalid number '{message}'"))
}

/// Applies `command` to the core. A replaced schedule is handed back so the
/// caller can write it once the lock is released.
fn apply(core: &mut Core, command: MqttCommand, now_ms: u64) -> anyhow::Result<Option<Schedule>> {
    let engine = &mut core.engine;
    match command {
        MqttCommand::Temperature(temp_f) => {
            let humidity = engine.current_humidity();
            engine.update_sensor_data(temp_f, humidity, now_ms)?;
        }
        MqttCommand::Humidity(humidity) => engine.update_humidity(humidity)?,
        MqttCommand::Power(true) => engine.manual_on(now_ms, &mut core.sender),
        MqttCommand::Power(false) => engine.manual_off(now_ms, &mut core.sender),
        MqttCommand::Target(target_f) => {
            engine.set_target_temp(target_f, now_ms)?;
        }
        MqttCommand::Mode(mode) => {
            engine.set_mode(mode, now_ms);
        }
        MqttCommand::HoldEnter(minutes) => {
            let max_minutes = u64::from(engine.config.max_hold_minutes);
            match minutes {
                Some(minutes) if minutes == 0 || minutes > max_minutes => {
                    return Err(anyhow!("hold minutes must be 1-{max_minutes}"));
                }
                minutes => engine.enter_hold(minutes.map(|m| m * 60_000), now_ms),
            }
        }
        MqttCommand::HoldExit => {
            engine.exit_hold();
        }
        MqttCommand::Schedule(schedule) => {
            return Ok(Some(core.replace_schedule(schedule).clone()));
        }
    }
    Ok(None)
}
