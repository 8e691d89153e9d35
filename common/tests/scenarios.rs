mod support;

use fireplace_common::{
    ControlState, HoldReason, IrCommand, SettingsStore, ThermostatMode, ValidationError,
};
use pretty_assertions::assert_eq;

use support::{drain_queue, heating_engine, run_steady, MemoryStore, RecordingSender};

const MIN_CYCLE_MS: u64 = 300_000;
const MAX_RUNTIME_MS: u64 = 14_400_000;
const COOLDOWN_MS: u64 = 1_800_000;

#[test]
fn cold_room_issues_full_heat_on_sequence() {
    let mut engine = heating_engine(70.0, 2.0);
    let mut sender = RecordingSender::default();

    engine.update_sensor_data(67.0, 40.0, 0).unwrap();
    engine.tick(0, &mut sender);
    assert_eq!(engine.state(), ControlState::Heating);
    assert!(engine.is_heater_on());

    drain_queue(&mut engine, &mut sender, 0, 2_050);
    assert_eq!(
        sender.sent,
        vec![
            IrCommand::PowerOn,
            IrCommand::HeatOn,
            IrCommand::SetTemperature(74),
            IrCommand::LightToggle,
            IrCommand::LightToggle,
            IrCommand::LightToggle,
            IrCommand::LightToggle,
        ]
    );
    assert_eq!(sender.device.light_level, 0);
}

#[test]
fn warm_room_turns_heater_off() {
    let mut engine = heating_engine(70.0, 2.0);
    let mut sender = RecordingSender::default();

    engine.update_sensor_data(67.0, 40.0, 0).unwrap();
    engine.tick(0, &mut sender);
    drain_queue(&mut engine, &mut sender, 0, 2_050);

    engine.update_sensor_data(73.0, 40.0, MIN_CYCLE_MS).unwrap();
    engine.tick(MIN_CYCLE_MS, &mut sender);

    assert_eq!(sender.sent.last(), Some(&IrCommand::PowerOff));
    assert_eq!(engine.state(), ControlState::Satisfied);
    assert!(!engine.is_heater_on());
    assert_eq!(engine.runtime_ms(MIN_CYCLE_MS), 0);
}

#[test]
fn warm_room_inside_min_cycle_keeps_heating() {
    let mut engine = heating_engine(70.0, 2.0);
    let mut sender = RecordingSender::default();

    engine.update_sensor_data(67.0, 40.0, 0).unwrap();
    engine.tick(0, &mut sender);

    engine.update_sensor_data(73.0, 40.0, 60_000).unwrap();
    engine.tick(60_000, &mut sender);

    assert_eq!(sender.count(IrCommand::PowerOff), 0);
    assert_eq!(engine.state(), ControlState::Heating);
}

#[test]
fn late_drain_through_rate_limited_sender_keeps_every_frame() {
    let mut engine = heating_engine(70.0, 2.0);
    let mut sender = RecordingSender::paced(200);

    engine.update_sensor_data(65.0, 40.0, 0).unwrap();
    engine.tick(0, &mut sender);

    // The host loop stalls for a second before it drains again.
    drain_queue(&mut engine, &mut sender, 1_000, 5_000);

    assert_eq!(sender.rejected, 0);
    assert_eq!(sender.count(IrCommand::SetTemperature(74)), 1);
    assert_eq!(sender.count(IrCommand::LightToggle), 4);
    assert_eq!(sender.device.fireplace_temp_f, 74);
    assert_eq!(sender.device.light_level, 0);
    assert!(engine.pending_commands().is_empty());
}

#[test]
fn runtime_limit_heat_off_survives_rate_limit() {
    let mut engine = heating_engine(70.0, 2.0);
    let mut sender = RecordingSender::paced(200);
    engine.manual_on(0, &mut sender);

    let trip_ms = MAX_RUNTIME_MS + 1;
    sender.now_ms = trip_ms - 100;
    engine.manual_light_toggle(trip_ms - 100, &mut sender);

    sender.now_ms = trip_ms;
    engine.tick(trip_ms, &mut sender);
    assert_eq!(sender.rejected, 1);
    assert_eq!(sender.count(IrCommand::HeatOff), 0);
    assert!(engine.is_in_cooldown());
    assert_eq!(engine.pending_commands().len(), 1);

    drain_queue(&mut engine, &mut sender, trip_ms + 50, trip_ms + 500);
    assert_eq!(sender.count(IrCommand::HeatOff), 1);
    assert!(engine.pending_commands().is_empty());
}

#[test]
fn runtime_limit_forces_one_heat_off_then_cooldown_clears() {
    let mut engine = heating_engine(70.0, 2.0);
    let mut sender = RecordingSender::default();

    engine.update_sensor_data(67.0, 40.0, 0).unwrap();
    engine.tick(0, &mut sender);
    assert_eq!(engine.heating_start_ms(), Some(0));

    // In-band temperature: the hysteresis loop never turns the heater off.
    run_steady(&mut engine, &mut sender, 69.0, 10_000, MAX_RUNTIME_MS, 10_000);
    assert_eq!(sender.count(IrCommand::HeatOff), 0);
    assert!(engine.is_heater_on());

    let trip_ms = MAX_RUNTIME_MS + 1;
    engine.update_sensor_data(69.0, 40.0, trip_ms).unwrap();
    engine.tick(trip_ms, &mut sender);
    assert_eq!(sender.count(IrCommand::HeatOff), 1);
    assert_eq!(engine.state(), ControlState::Cooldown);
    assert!(engine.is_in_cooldown());
    assert!(!engine.is_heater_on());

    let cleared_ms = trip_ms + COOLDOWN_MS + 1;
    let cooldown_end_ms = trip_ms + COOLDOWN_MS;
    run_steady(&mut engine, &mut sender, 69.0, trip_ms + 10_000, cooldown_end_ms, 10_000);
    assert!(engine.is_in_cooldown());

    engine.update_sensor_data(69.0, 40.0, cleared_ms).unwrap();
    engine.tick(cleared_ms, &mut sender);
    assert!(!engine.is_in_cooldown());
    assert_eq!(engine.state(), ControlState::Satisfied);
    assert_eq!(sender.count(IrCommand::HeatOff), 1);
}

#[test]
fn mode_off_clears_hold_and_waits_for_min_cycle() {
    let mut engine = heating_engine(70.0, 2.0);
    let mut sender = RecordingSender::default();

    engine.update_sensor_data(67.0, 40.0, 0).unwrap();
    engine.tick(0, &mut sender);
    engine.enter_hold(Some(3_600_000), 1_000);
    assert!(engine.is_in_hold());

    assert!(engine.set_mode(ThermostatMode::Off, 2_000));
    assert!(!engine.is_in_hold());
    assert_eq!(engine.state(), ControlState::Idle);

    engine.tick(2_000, &mut sender);
    assert_eq!(sender.count(IrCommand::PowerOff), 0);
    assert!(engine.is_heater_on());
    drain_queue(&mut engine, &mut sender, 2_050, 5_000);

    engine.tick(MIN_CYCLE_MS, &mut sender);
    assert_eq!(sender.count(IrCommand::PowerOff), 1);
    assert!(!engine.is_heater_on());
    assert_eq!(engine.state(), ControlState::Idle);
}

#[test]
fn mode_off_with_heater_off_is_idle_immediately() {
    let mut engine = heating_engine(70.0, 2.0);
    let mut sender = RecordingSender::default();

    engine.enter_hold(None, 0);
    engine.set_mode(ThermostatMode::Off, 0);
    engine.tick(0, &mut sender);

    assert_eq!(engine.state(), ControlState::Idle);
    assert!(!engine.is_in_hold());
    assert!(sender.sent.is_empty());
}

#[test]
fn external_remote_turn_on_enters_hold_once() {
    // Target 60 keeps the hysteresis loop from turning the heater on itself.
    let mut engine = heating_engine(60.0, 2.0);
    let mut sender = RecordingSender::default();

    let temps = [66.0, 66.5, 67.0, 67.5, 68.0, 68.5, 69.0];
    for (i, temp_f) in temps.iter().enumerate() {
        let now_ms = i as u64 * 30_000;
        engine.update_sensor_data(*temp_f, 40.0, now_ms).unwrap();
        engine.tick(now_ms, &mut sender);
    }

    assert!(engine.is_heater_on());
    let hold = engine.hold_state().unwrap();
    assert_eq!(hold.reason, HoldReason::ExternalRemote);
    assert_eq!(hold.start_ms, 90_000);
    assert_eq!(engine.heating_start_ms(), Some(90_000));
    assert_eq!(engine.state(), ControlState::Hold);
    // The remote did the work; nothing was transmitted.
    assert!(sender.sent.is_empty());
}

#[test]
fn target_round_trip_rejects_out_of_range() {
    let mut engine = heating_engine(70.0, 2.0);

    assert_eq!(engine.set_target_temp(72.0, 0), Ok(true));
    assert_eq!(engine.target_temp_f(), 72.0);

    assert_eq!(
        engine.set_target_temp(200.0, 1),
        Err(ValidationError::TargetOutOfRange(200.0))
    );
    assert_eq!(engine.target_temp_f(), 72.0);
}

#[test]
fn exit_hold_when_inactive_is_a_no_op() {
    let mut engine = heating_engine(70.0, 2.0);

    assert!(!engine.exit_hold());
    assert_eq!(engine.state(), ControlState::Idle);

    engine.enter_hold(Some(60_000), 0);
    assert!(engine.exit_hold());
    assert!(!engine.exit_hold());
    assert!(!engine.is_in_hold());
}

#[test]
fn settings_are_saved_once_after_debounce() {
    let mut engine = heating_engine(70.0, 2.0);
    let mut store = MemoryStore::default();
    assert!(engine.persist_if_due(5_000, &mut store));
    store.saved.clear();

    engine.set_target_temp(72.0, 10_000).unwrap();
    engine.set_hysteresis(1.5, 13_000).unwrap();
    assert!(!engine.persist_if_due(17_999, &mut store));
    assert!(engine.persist_if_due(18_000, &mut store));

    assert_eq!(store.saved.len(), 1);
    assert_eq!(store.saved[0].target_temp_f, 72.0);
    assert_eq!(store.saved[0].hysteresis_f, 1.5);
    assert!(!engine.settings_dirty());
}

#[test]
fn failed_save_is_retried_after_another_window() {
    let mut engine = heating_engine(70.0, 2.0);
    let mut store = MemoryStore {
        failures: 1,
        ..MemoryStore::default()
    };

    engine.set_fireplace_offset(6, 10_000).unwrap();
    assert!(!engine.persist_if_due(15_000, &mut store));
    assert!(engine.settings_dirty());

    assert!(!engine.persist_if_due(19_999, &mut store));
    assert!(engine.persist_if_due(20_000, &mut store));
    assert_eq!(store.load().unwrap().fireplace_offset_f, 6);
}

#[test]
fn change_during_in_flight_save_stays_dirty() {
    let mut engine = heating_engine(70.0, 2.0);
    let mut store = MemoryStore::default();
    assert!(engine.persist_if_due(5_000, &mut store));

    engine.set_target_temp(72.0, 10_000).unwrap();
    let pending = engine.due_save(15_000).unwrap();
    assert_eq!(pending.settings.target_temp_f, 72.0);

    engine.set_hysteresis(1.5, 16_000).unwrap();
    assert!(engine.finish_save(&pending, Ok(()), 16_500));
    assert!(engine.settings_dirty());

    assert_eq!(engine.due_save(20_999), None);
    let pending = engine.due_save(21_000).unwrap();
    assert_eq!(pending.settings.hysteresis_f, 1.5);
    assert!(engine.finish_save(&pending, Ok(()), 21_000));
    assert!(!engine.settings_dirty());
}
