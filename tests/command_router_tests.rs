use adcs::commands::{JSON_FORMAT_REPLY, UNKNOWN_COMMAND_REPLY, UNSUPPORTED_COMMAND_REPLY};
use adcs::subsystems::{
    Direction, ImuReading, Magnetometer, PowerMode, PowerSystem, ReactionWheels, SunSensors,
    PWM_MAX,
};
use adcs::{
    AdcsConfig, AdcsController, Axis, EmulatedHardware, MemoryTransport, FW_VERSION, HW_VERSION,
};

type Controller = AdcsController<MemoryTransport, EmulatedHardware>;

fn create_test_controller() -> (MemoryTransport, Controller) {
    let transport = MemoryTransport::new();
    let controller =
        AdcsController::new(transport.clone(), EmulatedHardware::new(), AdcsConfig::default())
            .expect("controller should start");
    (transport, controller)
}

/// Send one command and return its reply with the delimiter stripped.
fn exchange(transport: &MemoryTransport, controller: &mut Controller, body: &str) -> String {
    transport.inject(body.as_bytes());
    transport.inject(b"!");
    assert_eq!(controller.run_pending().unwrap(), 1, "{}", body);

    let sent = transport.take_sent_string();
    assert!(sent.ends_with('!'), "reply not delimited: {:?}", sent);
    sent.trim_end_matches('!').to_string()
}

fn assert_json(reply: &str) {
    assert!(
        serde_json::from_str::<serde_json::Value>(reply).is_ok(),
        "reply is not valid JSON: {}",
        reply
    );
}

#[test]
fn test_version_reads() {
    let (transport, mut controller) = create_test_controller();
    let before = controller.hardware().get_state();

    let reply = exchange(&transport, &mut controller, r#"{"fwVersion":"read"}"#);
    assert_eq!(reply, format!(r#"{{"fwVersion":"{}"}}"#, FW_VERSION));

    let reply = exchange(&transport, &mut controller, r#"{"hwVersion":"read"}"#);
    assert_eq!(reply, format!(r#"{{"hwVersion":"{}"}}"#, HW_VERSION));

    assert_eq!(controller.hardware().get_state(), before);
}

#[test]
fn test_configured_versions_are_reported() {
    let transport = MemoryTransport::new();
    let config = AdcsConfig {
        fw_version: "9.9.9".to_string(),
        hw_version: "rev-c".to_string(),
        ..AdcsConfig::default()
    };
    let mut controller =
        AdcsController::new(transport.clone(), EmulatedHardware::new(), config).unwrap();

    assert_eq!(
        exchange(&transport, &mut controller, r#"{"fwVersion":"read"}"#),
        r#"{"fwVersion":"9.9.9"}"#
    );
    assert_eq!(
        exchange(&transport, &mut controller, r#"{"hwVersion":"read"}"#),
        r#"{"hwVersion":"rev-c"}"#
    );
}

#[test]
fn test_pwm_write_then_read() {
    let (transport, mut controller) = create_test_controller();

    for value in [0u16, 1, 1234, PWM_MAX - 1, PWM_MAX] {
        let write = format!(r#"{{"pwm_rw_x":"write","value":{}}}"#, value);
        assert_eq!(exchange(&transport, &mut controller, &write), r#"{"pwm_rw_x":"written"}"#);

        let reply = exchange(&transport, &mut controller, r#"{"pwm_rw_x":"read"}"#);
        assert_eq!(reply, format!(r#"{{"pwm_rw_x":{}}}"#, value));
        assert_json(&reply);
    }

    // Other axes untouched
    assert_eq!(controller.hardware().reaction_wheels.pwm(Axis::Y), 0);
    assert_eq!(controller.hardware().reaction_wheels.pwm(Axis::Z), 0);
}

#[test]
fn test_pwm_out_of_range_is_rejected() {
    let (transport, mut controller) = create_test_controller();
    exchange(&transport, &mut controller, r#"{"pwm_rw_z":"write","value":77}"#);

    for bad in ["65535", "70000", "-1", "12.5", "true", "0x10"] {
        let write = format!(r#"{{"pwm_rw_z":"write","value":{}}}"#, bad);
        let reply = exchange(&transport, &mut controller, &write);
        assert_eq!(reply, UNSUPPORTED_COMMAND_REPLY, "{}", bad);
        assert_eq!(controller.hardware().reaction_wheels.pwm(Axis::Z), 77, "{}", bad);
    }
}

#[test]
fn test_quoted_scalar_is_accepted() {
    let (transport, mut controller) = create_test_controller();
    let reply = exchange(&transport, &mut controller, r#"{"pwm_rw_y":"write","value":"42"}"#);
    assert_eq!(reply, r#"{"pwm_rw_y":"written"}"#);
    assert_eq!(controller.hardware().reaction_wheels.pwm(Axis::Y), 42);
}

#[test]
fn test_write_without_value_changes_nothing() {
    let (transport, mut controller) = create_test_controller();
    exchange(&transport, &mut controller, r#"{"rw_speed":"write","value":[10,20,30]}"#);
    let before = controller.hardware().get_state();

    for body in [
        r#"{"rw_speed":"write"}"#,
        r#"{"rw_speed":"write","val":[1,2,3]}"#,
        r#"{"rw_speed":"write","valueX":[1,2,3]}"#,
        r#"{"rw_speed":"write","value":[1,2]}"#,
        r#"{"rw_speed":"write","value":[1,2,3,4]}"#,
        r#"{"rw_speed":"write","value":[1,"x",3]}"#,
        r#"{"rw_speed":"write","value":5}"#,
        r#"{"rw_speed":"write","value":[1,9000,3]}"#,
    ] {
        let reply = exchange(&transport, &mut controller, body);
        assert_eq!(reply, UNSUPPORTED_COMMAND_REPLY, "{}", body);
        assert_eq!(controller.hardware().get_state(), before, "{}", body);
    }
}

#[test]
fn test_rw_speed_round_trip() {
    let (transport, mut controller) = create_test_controller();
    assert_eq!(
        exchange(&transport, &mut controller, r#"{"rw_speed":"read"}"#),
        r#"{"rw_speed":[0,0,0]}"#
    );

    assert_eq!(
        exchange(&transport, &mut controller, r#"{"rw_speed":"write","value":[100,-250,8000]}"#),
        r#"{"rw_speed":"written"}"#
    );
    let reply = exchange(&transport, &mut controller, r#"{"rw_speed":"read"}"#);
    assert_eq!(reply, r#"{"rw_speed":[100,-250,8000]}"#);
    assert_json(&reply);
}

#[test]
fn test_unknown_and_near_miss_keys() {
    let (transport, mut controller) = create_test_controller();
    let before = controller.hardware().get_state();

    for body in [
        r#"{"foo":"read"}"#,
        r#"{"pwm_rw":"read"}"#,
        r#"{"pwm_rw_xx":"read"}"#,
        r#"{"fwversion":"read"}"#,
        r#"{"imu ":"read"}"#,
        r#"{"":"read"}"#,
    ] {
        assert_eq!(exchange(&transport, &mut controller, body), UNKNOWN_COMMAND_REPLY, "{}", body);
    }

    assert_eq!(controller.hardware().get_state(), before);
    assert_eq!(controller.get_stats().unknown_commands, 6);
}

#[test]
fn test_wheel_direction() {
    let (transport, mut controller) = create_test_controller();

    assert_eq!(
        exchange(&transport, &mut controller, r#"{"dir_rw_y":"read"}"#),
        r#"{"dir_rw_y":"clock"}"#
    );
    assert_eq!(
        exchange(&transport, &mut controller, r#"{"dir_rw_y":"write","value":"antiClock"}"#),
        r#"{"dir_rw_y":"written"}"#
    );
    assert_eq!(
        exchange(&transport, &mut controller, r#"{"dir_rw_y":"read"}"#),
        r#"{"dir_rw_y":"antiClock"}"#
    );

    assert_eq!(
        exchange(&transport, &mut controller, r#"{"dir_rw_y":"write","value":"sideways"}"#),
        UNSUPPORTED_COMMAND_REPLY
    );
    assert_eq!(
        controller.hardware().reaction_wheels.direction(Axis::Y),
        Direction::AntiClockwise
    );
    assert_eq!(
        controller.hardware().reaction_wheels.direction(Axis::X),
        Direction::Clockwise
    );
}

#[test]
fn test_wheel_current_tracks_pwm() {
    let (transport, mut controller) = create_test_controller();
    exchange(
        &transport,
        &mut controller,
        &format!(r#"{{"pwm_rw_x":"write","value":{}}}"#, PWM_MAX),
    );

    let reply = exchange(&transport, &mut controller, r#"{"rw_current":"read"}"#);
    assert_eq!(reply, r#"{"rw_current":[450,0,0]}"#);
    assert_json(&reply);
}

#[test]
fn test_magnetorquer_voltages() {
    let (transport, mut controller) = create_test_controller();

    assert_eq!(
        exchange(&transport, &mut controller, r#"{"mqtr_volts":"write","value":[1,-2,3300]}"#),
        r#"{"mqtr_volts":"written"}"#
    );
    assert_eq!(
        exchange(&transport, &mut controller, r#"{"mqtr_volts":"read"}"#),
        r#"{"mqtr_volts":[1,-2,3300]}"#
    );

    // One coil out of range rejects the whole write
    assert_eq!(
        exchange(&transport, &mut controller, r#"{"mqtr_volts":"write","value":[0,0,4000]}"#),
        UNSUPPORTED_COMMAND_REPLY
    );
    assert_eq!(controller.hardware().magnetorquers.get_state().coil_mv, [1, -2, 3300]);
}

#[test]
fn test_sun_sensor_read_and_reset() {
    let (transport, mut controller) = create_test_controller();

    let reply = exchange(&transport, &mut controller, r#"{"sunSen":"read"}"#);
    assert_eq!(
        reply,
        r#"{"sunSen":{"lux":[1200,0,860,0,310,0],"temp":[21,18,20,17,19,16]}}"#
    );
    assert_json(&reply);

    let mut reading = controller.hardware().sun_sensors.read();
    reading.lux = [5; 6];
    controller.hardware_mut().sun_sensors.set_reading(reading);

    assert_eq!(
        exchange(&transport, &mut controller, r#"{"sunSen":"reset"}"#),
        r#"{"sunSen":"reset"}"#
    );
    assert_eq!(controller.hardware().sun_sensors.reset_count(), 1);
    assert_eq!(controller.hardware().sun_sensors.read().lux, [1200, 0, 860, 0, 310, 0]);

    assert_eq!(
        exchange(&transport, &mut controller, r#"{"sunSen":"write","value":1}"#),
        UNSUPPORTED_COMMAND_REPLY
    );
}

#[test]
fn test_magnetometer_read_and_reset() {
    let (transport, mut controller) = create_test_controller();

    assert_eq!(
        exchange(&transport, &mut controller, r#"{"magSen":"read"}"#),
        r#"{"magSen":[212,-87,395]}"#
    );

    controller.hardware_mut().magnetometer.set_field([1, 2, 3]);
    assert_eq!(
        exchange(&transport, &mut controller, r#"{"magSen":"read"}"#),
        r#"{"magSen":[1,2,3]}"#
    );

    assert_eq!(
        exchange(&transport, &mut controller, r#"{"magSen":"reset"}"#),
        r#"{"magSen":"reset"}"#
    );
    assert_eq!(controller.hardware().magnetometer.reset_count(), 1);
    assert_eq!(controller.hardware().magnetometer.field_mgauss(), [212, -87, 395]);
}

#[test]
fn test_imu_read() {
    let (transport, mut controller) = create_test_controller();

    assert_eq!(
        exchange(&transport, &mut controller, r#"{"imu":"read"}"#),
        r#"{"imu":{"gyro":[0,0,0],"accel":[0,0,0]}}"#
    );

    controller.hardware_mut().imu.set_reading(ImuReading {
        gyro_mdps: [10, -20, 30],
        accel_mg: [0, 0, 1000],
    });
    let reply = exchange(&transport, &mut controller, r#"{"imu":"read"}"#);
    assert_eq!(reply, r#"{"imu":{"gyro":[10,-20,30],"accel":[0,0,1000]}}"#);
    assert_json(&reply);
}

#[test]
fn test_power_mode_and_current() {
    let (transport, mut controller) = create_test_controller();

    assert_eq!(
        exchange(&transport, &mut controller, r#"{"current":"read"}"#),
        r#"{"current":180}"#
    );
    assert_eq!(
        exchange(&transport, &mut controller, r#"{"powerMode":"read"}"#),
        r#"{"powerMode":"nominal"}"#
    );

    assert_eq!(
        exchange(&transport, &mut controller, r#"{"powerMode":"write","value":"lowPower"}"#),
        r#"{"powerMode":"written"}"#
    );
    assert_eq!(
        exchange(&transport, &mut controller, r#"{"current":"read"}"#),
        r#"{"current":90}"#
    );

    assert_eq!(
        exchange(&transport, &mut controller, r#"{"powerMode":"write","value":"blah"}"#),
        UNSUPPORTED_COMMAND_REPLY
    );
    assert_eq!(controller.hardware().power.mode(), PowerMode::LowPower);
}

#[test]
fn test_unsupported_verbs() {
    let (transport, mut controller) = create_test_controller();
    let before = controller.hardware().get_state();

    for body in [
        r#"{"fwVersion":"write","value":"1.0"}"#,
        r#"{"hwVersion":"reset"}"#,
        r#"{"imu":"write","value":[1,2,3]}"#,
        r#"{"rw_current":"reset"}"#,
        r#"{"current":"write","value":5}"#,
        r#"{"pwm_rw_x":"reset"}"#,
        r#"{"pwm_rw_x":"spin"}"#,
        r#"{"pwm_rw_x":"READ"}"#,
        r#"{"pwm_rw_x"}"#,
        r#"{"imu":1}"#,
    ] {
        let reply = exchange(&transport, &mut controller, body);
        assert_eq!(reply, UNSUPPORTED_COMMAND_REPLY, "{}", body);
    }

    assert_eq!(controller.hardware().get_state(), before);
}

#[test]
fn test_malformed_messages_get_format_error() {
    let (transport, mut controller) = create_test_controller();

    for body in [
        r#"{"imu":"read""#,
        r#"{"imu":"read"}}"#,
        "hello",
        "[1,2]",
        "{}",
        "",
        r#"{"a":"\q"}"#,
        r#"{1:"read"}"#,
    ] {
        assert_eq!(exchange(&transport, &mut controller, body), JSON_FORMAT_REPLY, "{:?}", body);
    }

    let stats = controller.get_stats();
    assert_eq!(stats.parse_errors + stats.gate_rejections, 8);
    assert_eq!(stats.replies, 0);
}

#[test]
fn test_several_messages_in_one_burst() {
    let (transport, mut controller) = create_test_controller();

    transport.inject(br#"{"pwm_rw_x":"write","value":5}!{"pwm_rw_x":"read"}!"#);
    transport.inject(br#"{"nope":"read"}!{"current":"read"}!"#);
    assert_eq!(controller.run_pending().unwrap(), 4);

    let sent = transport.take_sent_string();
    let replies: Vec<&str> = sent.split_terminator('!').collect();
    assert_eq!(
        replies,
        vec![
            r#"{"pwm_rw_x":"written"}"#,
            r#"{"pwm_rw_x":5}"#,
            UNKNOWN_COMMAND_REPLY,
            r#"{"current":180}"#,
        ]
    );
    for reply in replies {
        assert_json(reply);
    }
}

#[test]
fn test_whitespace_between_tokens() {
    let (transport, mut controller) = create_test_controller();
    let reply = exchange(
        &transport,
        &mut controller,
        "{ \"pwm_rw_y\" :\t\"write\",\r\n \"value\" : 300 }",
    );
    assert_eq!(reply, r#"{"pwm_rw_y":"written"}"#);
    assert_eq!(controller.hardware().reaction_wheels.pwm(Axis::Y), 300);
}
