pub const TOPIC_SENSOR_TEMP: &str = "fireplace/sensor/temperature";
pub const TOPIC_SENSOR_HUMIDITY: &str = "fireplace/sensor/humidity";

pub const TOPIC_CONTROLLER_STATE: &str = "fireplace/controller/state";
pub const TOPIC_CONTROLLER_SCHEDULE_STATE: &str = "fireplace/controller/schedule/state";

pub const TOPIC_CMD_POWER: &str = "fireplace/cmnd/power";
pub const TOPIC_CMD_TARGET: &str = "fireplace/cmnd/target";
pub const TOPIC_CMD_MODE: &str = "fireplace/cmnd/mode";
pub const TOPIC_CMD_HOLD: &str = "fireplace/cmnd/hold";
pub const TOPIC_CMD_SCHEDULE: &str = "fireplace/cmnd/schedule";

pub const COMMAND_TOPICS: [&str; 5] = [
    TOPIC_CMD_POWER,
    TOPIC_CMD_TARGET,
    TOPIC_CMD_MODE,
    TOPIC_CMD_HOLD,
    TOPIC_CMD_SCHEDULE,
];
