use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tokio::{fs, sync::Mutex};
use tracing::debug;

use fireplace_common::{PersistedSettings, Schedule, StoreError, ThermostatConfig};

const DEFAULT_DATA_DIR: &str = "./.thermostat";
const RUNTIME_FILE: &str = "runtime.json";
const SCHEDULE_FILE: &str = "schedule.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub pass: String,
    pub client_id: String,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: "192.168.1.100".to_string(),
            port: 1883,
            user: String::new(),
            pass: String::new(),
            client_id: "fireplace-controller".to_string(),
        }
    }
}

/// Everything the host reads from `runtime.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub thermostat: ThermostatConfig,
    pub settings: PersistedSettings,
    pub timezone: String,
    pub mqtt: MqttConfig,
    pub http_port: u16,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            thermostat: ThermostatConfig::default(),
            settings: PersistedSettings::default(),
            timezone: "America/Los_Angeles".to_string(),
            mqtt: MqttConfig::default(),
            http_port: 8080,
        }
    }
}

impl RuntimeConfig {
    /// Environment wins over the file for connection settings.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("MQTT_HOST") {
            self.mqtt.host = host;
        }
        if let Some(port) = lookup("MQTT_PORT").and_then(|value| value.parse().ok()) {
            self.mqtt.port = port;
        }
        if let Some(user) = lookup("MQTT_USER") {
            self.mqtt.user = user;
        }
        if let Some(pass) = lookup("MQTT_PASS") {
            self.mqtt.pass = pass;
        }
        if let Some(port) = lookup("CONTROLLER_HTTP_PORT").and_then(|value| value.parse().ok()) {
            self.http_port = port;
        }
    }
}

/// Files under the data directory. Clones share one write lock, so every
/// writer of a file goes through the same owner.
#[derive(Debug, Clone)]
pub struct DataDir {
    runtime_path: PathBuf,
    schedule_path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl DataDir {
    pub fn from_env() -> Self {
        let root = std::env::var("THERMOSTAT_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_DATA_DIR));
        Self::new(root)
    }

    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            runtime_path: root.join(RUNTIME_FILE),
            schedule_path: root.join(SCHEDULE_FILE),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// A missing file yields defaults; a corrupt one is an error.
    pub async fn load_runtime_config(&self) -> anyhow::Result<RuntimeConfig> {
        read_json_or_default(&self.runtime_path)
            .await
            .with_context(|| format!("failed to load {}", self.runtime_path.display()))
    }

    pub async fn save_runtime_config(&self, runtime: &RuntimeConfig) -> anyhow::Result<()> {
        let _guard = self.write_lock.lock().await;
        write_json(&self.runtime_path, runtime)
            .await
            .with_context(|| format!("failed to write {}", self.runtime_path.display()))
    }

    pub async fn load_schedule(&self) -> anyhow::Result<Schedule> {
        let mut schedule: Schedule = read_json_or_default(&self.schedule_path)
            .await
            .with_context(|| format!("failed to load {}", self.schedule_path.display()))?;
        schedule.normalize();
        Ok(schedule)
    }

    pub async fn save_schedule(&self, schedule: &Schedule) -> anyhow::Result<()> {
        let _guard = self.write_lock.lock().await;
        write_json(&self.schedule_path, schedule)
            .await
            .with_context(|| format!("failed to write {}", self.schedule_path.display()))
    }

    pub async fn save_timezone(&self, timezone: &str) -> anyhow::Result<()> {
        self.update_runtime(|runtime| runtime.timezone = timezone.to_string())
            .await
            .with_context(|| format!("failed to update {}", self.runtime_path.display()))
    }

    /// Stores [`PersistedSettings`] inside `runtime.json`, leaving the other sections alone.
    pub async fn save_settings(&self, settings: &PersistedSettings) -> Result<(), StoreError> {
        self.update_runtime(|runtime| runtime.settings = settings.clone()).await?;
        debug!(path = %self.runtime_path.display(), "settings written");
        Ok(())
    }

    /// Read-modify-write of `runtime.json`. A file that cannot be read is left
    /// untouched and the error returned.
    async fn update_runtime<F>(&self, update: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut RuntimeConfig),
    {
        let _guard = self.write_lock.lock().await;
        let mut runtime: RuntimeConfig = read_json_or_default(&self.runtime_path).await?;
        update(&mut runtime);
        write_json(&self.runtime_path, &runtime).await
    }
}

async fn read_json_or_default<T>(path: &Path) -> Result<T, StoreError>
where
    T: Default + for<'de> Deserialize<'de>,
{
    match fs::read(path).await {
        Ok(raw) => Ok(serde_json::from_slice(&raw)?),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(T::default()),
        Err(err) => Err(err.into()),
    }
}

/// Replaces `path` through a sibling temp file. Callers hold the write lock.
async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let payload = serde_json::to_vec_pretty(value)?;
    let staging = path.with_extension("json.tmp");
    fs::write(&staging, payload).await?;
    fs::rename(&staging, path).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use fireplace_common::{DayOfWeek, ScheduleEntry, ThermostatMode};
    use pretty_assertions::assert_eq;

    use super::*;

    #[tokio::test]
    async fn missing_files_load_as_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = DataDir::new(tmp.path());

        let runtime = dir.load_runtime_config().await.unwrap();
        assert_eq!(runtime.settings, PersistedSettings::default());
        assert_eq!(runtime.http_port, 8080);
        assert_eq!(dir.load_schedule().await.unwrap(), Schedule::default());
    }

    #[tokio::test]
    async fn settings_save_keeps_other_sections() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = DataDir::new(tmp.path().join("nested"));

        let mut runtime = RuntimeConfig::default();
        runtime.timezone = "Europe/Berlin".to_string();
        runtime.mqtt.host = "broker.local".to_string();
        dir.save_runtime_config(&runtime).await.unwrap();

        let settings = PersistedSettings {
            target_temp_f: 72.0,
            mode: ThermostatMode::Heat,
            ..PersistedSettings::default()
        };
        dir.save_settings(&settings).await.unwrap();

        let reloaded = dir.load_runtime_config().await.unwrap();
        assert_eq!(reloaded.settings, settings);
        assert_eq!(reloaded.timezone, "Europe/Berlin");
        assert_eq!(reloaded.mqtt.host, "broker.local");
    }

    #[tokio::test]
    async fn corrupt_runtime_file_is_never_overwritten() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(RUNTIME_FILE);
        std::fs::write(&path, b"{ not json").unwrap();
        let dir = DataDir::new(tmp.path());

        assert!(dir.load_runtime_config().await.is_err());
        assert!(matches!(
            dir.save_settings(&PersistedSettings::default()).await,
            Err(StoreError::Encoding(_))
        ));
        assert!(dir.save_timezone("Europe/Berlin").await.is_err());
        assert_eq!(std::fs::read(&path).unwrap(), b"{ not json");
    }

    #[tokio::test]
    async fn concurrent_runtime_updates_are_all_kept() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = DataDir::new(tmp.path());
        dir.save_runtime_config(&RuntimeConfig::default()).await.unwrap();

        let settings = PersistedSettings {
            target_temp_f: 66.0,
            ..PersistedSettings::default()
        };
        let settings_dir = dir.clone();
        let timezone_dir = dir.clone();
        let (saved, zoned) = tokio::join!(
            tokio::spawn(async move { settings_dir.save_settings(&settings).await }),
            tokio::spawn(async move { timezone_dir.save_timezone("America/Denver").await }),
        );
        saved.unwrap().unwrap();
        zoned.unwrap().unwrap();

        let runtime = dir.load_runtime_config().await.unwrap();
        assert_eq!(runtime.settings.target_temp_f, 66.0);
        assert_eq!(runtime.timezone, "America/Denver");
    }

    #[tokio::test]
    async fn partial_runtime_file_fills_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join(RUNTIME_FILE),
            br#"{ "timezone": "America/Denver", "thermostat": { "min_cycle_ms": 60000 } }"#,
        )
        .unwrap();

        let runtime = DataDir::new(tmp.path()).load_runtime_config().await.unwrap();
        assert_eq!(runtime.timezone, "America/Denver");
        assert_eq!(runtime.thermostat.min_cycle_ms, 60_000);
        assert_eq!(runtime.thermostat.max_runtime_ms, 14_400_000);
    }

    #[tokio::test]
    async fn schedule_round_trips_and_normalizes() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = DataDir::new(tmp.path());
        let schedule = Schedule {
            enabled: true,
            entries: vec![
                ScheduleEntry {
                    day: DayOfWeek::Fri,
                    start_minutes: 22 * 60,
                    mode: ThermostatMode::Off,
                    target_temp_f: 68.0,
                },
                ScheduleEntry {
                    day: DayOfWeek::Mon,
                    start_minutes: 6 * 60,
                    mode: ThermostatMode::Heat,
                    target_temp_f: 71.0,
                },
            ],
        };
        dir.save_schedule(&schedule).await.unwrap();

        let loaded = dir.load_schedule().await.unwrap();
        assert_eq!(loaded.entries[0].day, DayOfWeek::Mon);
        assert_eq!(loaded.entries.len(), 2);
    }

    #[test]
    fn env_overrides_connection_settings() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("MQTT_HOST", "10.0.0.5"),
            ("MQTT_PORT", "8883"),
            ("MQTT_USER", "fireplace"),
            ("CONTROLLER_HTTP_PORT", "not-a-port"),
        ]);
        let mut runtime = RuntimeConfig::default();
        runtime.apply_env(|key| env.get(key).map(|value| value.to_string()));

        assert_eq!(runtime.mqtt.host, "10.0.0.5");
        assert_eq!(runtime.mqtt.port, 8883);
        assert_eq!(runtime.mqtt.user, "fireplace");
        assert_eq!(runtime.mqtt.pass, "");
        assert_eq!(runtime.http_port, 8080);
    }
}
