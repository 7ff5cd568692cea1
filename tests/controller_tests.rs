use adcs::commands::{CommandError, JSON_FORMAT_REPLY, UNSUPPORTED_COMMAND_REPLY};
use adcs::config::{ConfigError, MAX_VERSION_LEN};
use adcs::controller::ControllerError;
use adcs::interface::{InterfaceError, TransportError};
use adcs::subsystems::ReactionWheels;
use adcs::{
    AdcsConfig, AdcsController, Axis, EmulatedHardware, FrameProducer, FramingError,
    MemoryTransport, ObcInterface, ParseError, PollOutcome, Transport, TX_BUFFER_SIZE,
};
use std::thread;

type Controller = AdcsController<MemoryTransport, EmulatedHardware>;

fn create_test_controller(config: AdcsConfig) -> (MemoryTransport, Controller) {
    let transport = MemoryTransport::new();
    let controller = AdcsController::new(transport.clone(), EmulatedHardware::new(), config)
        .expect("controller should start");
    (transport, controller)
}

/// Accepts at most `limit` bytes per transmit.
struct ThrottledTransport {
    limit: usize,
    sent: Vec<u8>,
}

impl Transport for ThrottledTransport {
    fn init(&mut self, _rx: FrameProducer) -> Result<(), TransportError> {
        Ok(())
    }

    fn deinit(&mut self) {}

    fn transmit(&mut self, bytes: &[u8]) -> usize {
        let n = bytes.len().min(self.limit);
        self.sent.extend_from_slice(&bytes[..n]);
        n
    }
}

#[test]
fn test_poll_without_input() {
    let (transport, mut controller) = create_test_controller(AdcsConfig::default());

    assert_eq!(controller.poll().unwrap(), None);
    transport.inject(br#"{"imu":"read"}"#);
    assert_eq!(controller.poll().unwrap(), None);
    assert!(transport.sent().is_empty());

    transport.inject(b"!");
    assert_eq!(controller.poll().unwrap(), Some(PollOutcome::Replied));
    assert_eq!(controller.poll().unwrap(), None);
}

#[test]
fn test_outcomes_and_stats() {
    let (transport, mut controller) = create_test_controller(AdcsConfig::default());

    let cases = [
        (r#"{"current":"read"}!"#, PollOutcome::Replied),
        (r#"{"current":"read"!"#, PollOutcome::ParseFailed(ParseError::Incomplete)),
        (r#"{"a":[1}!"#, PollOutcome::ParseFailed(ParseError::Invalid)),
        ("[1]!", PollOutcome::NotACommand),
        (r#"{"warp":"read"}!"#, PollOutcome::CommandFailed(CommandError::UnknownCommand)),
        (r#"{"imu":"reset"}!"#, PollOutcome::CommandFailed(CommandError::UnsupportedVerb)),
        (
            r#"{"pwm_rw_x":"write"}!"#,
            PollOutcome::CommandFailed(CommandError::MissingValue),
        ),
        (
            r#"{"mqtr_volts":"write","value":[1]}!"#,
            PollOutcome::CommandFailed(CommandError::AxisCount { expected: 3, found: 1 }),
        ),
    ];

    for (input, expected) in cases {
        transport.inject(input.as_bytes());
        assert_eq!(controller.poll().unwrap(), Some(expected), "{}", input);
    }

    let stats = *controller.get_stats();
    assert_eq!(stats.messages, 8);
    assert_eq!(stats.replies, 1);
    assert_eq!(stats.parse_errors, 2);
    assert_eq!(stats.gate_rejections, 1);
    assert_eq!(stats.unknown_commands, 1);
    assert_eq!(stats.rejected_commands, 3);
    assert_eq!(stats.framing_errors, 0);
    assert_eq!(stats.transmit_errors, 0);

    // Every message got exactly one reply
    let sent = transport.take_sent_string();
    assert_eq!(sent.matches('!').count(), 8);
}

#[test]
fn test_oversized_message_is_dropped_and_next_is_served() {
    let config = AdcsConfig {
        max_message_len: 16,
        ..AdcsConfig::default()
    };
    let (transport, mut controller) = create_test_controller(config);

    transport.inject(br#"{"pwm_rw_x":"write","value":1}!{"imu":"read"}!"#);

    assert_eq!(
        controller.poll().unwrap(),
        Some(PollOutcome::FramingFailed(FramingError::Truncated(16)))
    );
    assert_eq!(controller.poll().unwrap(), Some(PollOutcome::Replied));
    assert_eq!(controller.poll().unwrap(), None);

    let sent = transport.take_sent_string();
    assert_eq!(
        sent,
        format!(r#"{}!{{"imu":{{"gyro":[0,0,0],"accel":[0,0,0]}}}}!"#, JSON_FORMAT_REPLY)
    );
    assert_eq!(controller.hardware().reaction_wheels.pwm(Axis::X), 0);
    assert_eq!(controller.get_stats().framing_errors, 1);
}

#[test]
fn test_message_at_length_limit() {
    // 15 payload bytes plus the terminator slot
    let config = AdcsConfig {
        max_message_len: 16,
        ..AdcsConfig::default()
    };
    let (transport, mut controller) = create_test_controller(config);

    let body = r#"{"imu" : "read"}"#;
    assert_eq!(body.len(), 16);
    transport.inject(body.as_bytes());
    transport.inject(b"!");
    assert!(matches!(
        controller.poll().unwrap(),
        Some(PollOutcome::FramingFailed(FramingError::Truncated(16)))
    ));

    let body = r#"{"imu":"read"} "#;
    assert_eq!(body.len(), 15);
    transport.inject(body.as_bytes());
    transport.inject(b"!");
    assert_eq!(controller.poll().unwrap(), Some(PollOutcome::Replied));
}

#[test]
fn test_producer_thread_feeds_controller() {
    let (transport, mut controller) = create_test_controller(AdcsConfig::default());
    let producer = controller.producer();
    let count = 50u16;

    let handle = thread::spawn(move || {
        for i in 0..count {
            let command = format!(r#"{{"pwm_rw_y":"write","value":{}}}!"#, i);
            producer.receive(command.as_bytes());
            if i % 5 == 4 {
                thread::yield_now();
            }
        }
    });

    let mut handled = 0;
    while handled < usize::from(count) {
        match controller.poll().unwrap() {
            Some(outcome) => {
                assert_eq!(outcome, PollOutcome::Replied);
                handled += 1;
            }
            None => thread::yield_now(),
        }
    }
    handle.join().unwrap();

    assert_eq!(controller.hardware().reaction_wheels.pwm(Axis::Y), count - 1);
    let sent = transport.take_sent_string();
    assert_eq!(sent.matches(r#"{"pwm_rw_y":"written"}!"#).count(), usize::from(count));
}

#[test]
fn test_process_message_bypasses_framing() {
    let (transport, mut controller) = create_test_controller(AdcsConfig::default());

    assert_eq!(
        controller.process_message(br#"{"current":"read"}"#).unwrap(),
        PollOutcome::Replied
    );
    assert_eq!(transport.take_sent_string(), r#"{"current":180}!"#);

    assert_eq!(
        controller.process_message(b"nope").unwrap(),
        PollOutcome::ParseFailed(ParseError::Incomplete)
    );
    assert_eq!(transport.take_sent_string(), format!("{}!", JSON_FORMAT_REPLY));

    // NUL ends the message like the framer's terminator
    assert_eq!(
        controller.process_message(b"{\"current\":\"read\"}\0trailing").unwrap(),
        PollOutcome::Replied
    );
}

#[test]
fn test_shutdown_releases_transport() {
    let transport = MemoryTransport::new();
    let controller =
        AdcsController::new(transport.clone(), EmulatedHardware::new(), AdcsConfig::default())
            .unwrap();
    assert!(transport.is_active());

    // Only one interface may own the link
    let second =
        AdcsController::new(transport.clone(), EmulatedHardware::new(), AdcsConfig::default());
    assert!(matches!(
        second,
        Err(ControllerError::Interface(InterfaceError::Transport(
            TransportError::AlreadyInitialised
        )))
    ));

    let (_transport, hardware) = controller.shutdown();
    assert!(!transport.is_active());
    assert_eq!(hardware.reaction_wheels.pwm(Axis::X), 0);

    // Bytes injected after teardown go nowhere
    transport.inject(br#"{"imu":"read"}!"#);

    let mut controller =
        AdcsController::new(transport.clone(), hardware, AdcsConfig::default()).unwrap();
    assert_eq!(transport.init_count(), 2);
    assert_eq!(controller.poll().unwrap(), None);
}

#[test]
fn test_invalid_config_leaves_transport_idle() {
    let transport = MemoryTransport::new();
    let config = AdcsConfig {
        max_message_len: 10_000,
        ..AdcsConfig::default()
    };

    let result = AdcsController::new(transport.clone(), EmulatedHardware::new(), config);
    assert!(matches!(
        result,
        Err(ControllerError::Config(ConfigError::MessageLength(10_000)))
    ));
    assert!(!transport.is_active());
}

#[test]
fn test_short_transmit_is_counted_not_fatal() {
    let transport = ThrottledTransport {
        limit: 8,
        sent: Vec::new(),
    };
    let mut controller =
        AdcsController::new(transport, EmulatedHardware::new(), AdcsConfig::default()).unwrap();

    assert_eq!(
        controller.process_message(br#"{"imu":"write"}"#).unwrap(),
        PollOutcome::CommandFailed(CommandError::UnsupportedVerb)
    );
    assert_eq!(controller.get_stats().transmit_errors, 1);

    let (transport, _) = controller.shutdown();
    assert_eq!(transport.sent, &UNSUPPORTED_COMMAND_REPLY.as_bytes()[..8]);
}

#[test]
fn test_send_raw_frame_limits() {
    let transport = MemoryTransport::new();
    let mut interface = ObcInterface::configure(transport.clone(), b'!').unwrap();

    let fits = "x".repeat(TX_BUFFER_SIZE);
    assert_eq!(interface.send_raw(&fits).unwrap(), TX_BUFFER_SIZE + 1);
    assert_eq!(transport.take_sent().last(), Some(&b'!'));

    let too_long = "x".repeat(TX_BUFFER_SIZE + 1);
    assert!(matches!(
        interface.send_raw(&too_long),
        Err(InterfaceError::FrameOverflow(n)) if n == TX_BUFFER_SIZE + 1
    ));
    assert!(transport.sent().is_empty());

    let transport = interface.teardown();
    assert!(!transport.is_active());
}

#[test]
fn test_stats_serialize_for_telemetry() {
    let (transport, mut controller) = create_test_controller(AdcsConfig::default());
    transport.inject(br#"{"current":"read"}!"#);
    controller.run_pending().unwrap();

    let json = serde_json::to_value(controller.get_stats()).unwrap();
    assert_eq!(json["messages"], 1);
    assert_eq!(json["replies"], 1);
}

#[test]
fn test_version_strings_must_fit_a_json_reply() {
    let transport = MemoryTransport::new();
    let config = AdcsConfig {
        fw_version: r#"1.0"}{"x"#.to_string(),
        ..AdcsConfig::default()
    };
    let result = AdcsController::new(transport.clone(), EmulatedHardware::new(), config);
    assert!(matches!(
        result,
        Err(ControllerError::Config(ConfigError::Version("fw_version")))
    ));
    assert!(!transport.is_active());

    let config = AdcsConfig {
        hw_version: "r".repeat(MAX_VERSION_LEN),
        ..AdcsConfig::default()
    };
    let (transport, mut controller) = create_test_controller(config);
    transport.inject(br#"{"hwVersion":"read"}!"#);
    assert_eq!(controller.poll().unwrap(), Some(PollOutcome::Replied));

    let sent = transport.take_sent_string();
    let reply: serde_json::Value = serde_json::from_str(sent.trim_end_matches('!')).unwrap();
    assert_eq!(reply["hwVersion"].as_str().map(str::len), Some(MAX_VERSION_LEN));
}
