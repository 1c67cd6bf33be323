use heapless::Vec as HVec;
use lorawan_session::{
    config::{
        device::{Activation, ActivationMode, DeviceClass, SYSTEM_MAX_RX_ERROR_MS},
        DataFormat, SessionConfig,
    },
    engine::{
        ContinuousWave, DataRate, Downlink, EventStatus, MacEvent, MacStatus, McpsKind,
        MlmeConfirm, MlmeKind, EVENT_QUEUE_LEN,
    },
    error::Error,
    identity::{generate_dev_addr, PRIVATE_DEV_ADDR_BASE},
    notify::NetworkEvent,
    nvm::{crc, GroupFlags, NvmGroup, DEV_EUI_FIELD},
    signals::SleepLock,
};
use pretty_assertions::assert_eq;

use mock::{
    patterned_state, session_with, started_session, MockEngine, MockPlatform, Recorded,
    SentUplink, Trace,
};

fn downlink(status: EventStatus, port: u8, payload: &[u8], rx_data: bool) -> MacEvent {
    MacEvent::McpsIndication(Downlink {
        status,
        port,
        payload: HVec::from_slice(payload).unwrap(),
        rx_data,
        uplink_pending: false,
        rssi: -87,
    })
}

#[test]
fn init_on_empty_flash_generates_identity() {
    let trace = Trace::default();
    let mut platform = MockPlatform::new(&trace);
    platform.random.push_back(0xFFFF_FFFF);
    let (mut session, _signals) =
        session_with(MockEngine::new(&trace), platform, SessionConfig::default());

    session.init().unwrap();

    let engine = session.engine();
    assert!(session.is_initialized());
    assert_eq!(engine.initialized, Some(SessionConfig::default().default_region));
    assert_eq!(engine.dev_eui, session.platform().unique_id);
    assert_eq!(engine.dev_addr, 0x03FF_FFFF);
    assert_eq!(engine.max_rx_error, Some(SYSTEM_MAX_RX_ERROR_MS));
    assert_eq!(engine.activation, Activation::Abp);
    let defaults = engine.defaults.as_ref().unwrap();
    assert_eq!(defaults.join_eui, [0x01; 8]);
    assert!(defaults.adr);
    assert_eq!(defaults.tx_power, 1);
    assert!(!defaults.cert_port);
}

#[test]
fn init_keeps_persisted_identity() {
    let trace = Trace::default();
    let platform = MockPlatform::with_state(&trace, &patterned_state());
    let mut engine = MockEngine::new(&trace);
    engine.dev_addr = 0x2601_1234;
    let (mut session, _signals) = session_with(engine, platform, SessionConfig::default());

    session.init().unwrap();

    let expected = patterned_state();
    assert_eq!(
        &session.engine().dev_eui[..],
        DEV_EUI_FIELD.get(&expected.secure_element.0)
    );
    assert_eq!(session.engine().dev_addr, 0x2601_1234);
    assert_eq!(session.engine().nvm, expected);
}

#[test]
fn dev_eui_preserved_in_field_survives_factory_reset() {
    let trace = Trace::default();
    let mut state = lorawan_session::nvm::NvmState::new();
    let dev_eui = [0x00, 0x80, 0xE1, 0x15, 0x00, 0x0A, 0x8B, 0x42];
    DEV_EUI_FIELD.write(&mut state.secure_element.0, &dev_eui);
    crc::seal_field::<MockPlatform>(&mut state.secure_element.0, DEV_EUI_FIELD);
    let platform = MockPlatform::with_state(&trace, &state);
    let (mut session, _signals) =
        session_with(MockEngine::new(&trace), platform, SessionConfig::default());

    session.init().unwrap();

    assert_eq!(session.engine().dev_eui, dev_eui);
}

#[test]
fn zero_dev_eui_with_valid_field_checksum_is_replaced() {
    let trace = Trace::default();
    let mut state = lorawan_session::nvm::NvmState::new();
    crc::seal_field::<MockPlatform>(&mut state.secure_element.0, DEV_EUI_FIELD);
    let platform = MockPlatform::with_state(&trace, &state);
    let (mut session, _signals) =
        session_with(MockEngine::new(&trace), platform, SessionConfig::default());

    session.init().unwrap();

    let unique_id = session.platform().unique_id;
    assert_ne!(unique_id, [0; 8]);
    assert_eq!(session.engine().dev_eui, unique_id);
}

#[test]
fn generated_dev_addr_in_private_prefix() {
    let trace = Trace::default();
    let mut platform = MockPlatform::new(&trace);
    platform.random.extend([0, 1, 0x0200_0000, 0x7FFF_FFFF, 0xFFFF_FFFF]);
    for _ in 0..5 {
        let addr = generate_dev_addr(&mut platform);
        assert!((PRIVATE_DEV_ADDR_BASE..=0x03FF_FFFF).contains(&addr));
    }
    platform.random.push_back(0);
    assert_eq!(generate_dev_addr(&mut platform), 0x0200_0000);
}

#[test]
#[should_panic(expected = "Invalid initialization parameter")]
fn invalid_init_parameters_halt() {
    let trace = Trace::default();
    let mut engine = MockEngine::new(&trace);
    engine.init_error = Some(MacStatus::ParameterInvalid);
    let (mut session, _signals) =
        session_with(engine, MockPlatform::new(&trace), SessionConfig::default());

    let _ = session.init();
}

#[test]
fn send_uses_configured_retransmissions() {
    let config = SessionConfig {
        confirmed_retransmissions: 4,
        unconfirmed_retransmissions: 2,
        ..SessionConfig::default()
    };
    let (mut session, _signals, _) = started_session(config);
    session.engine_mut().data_rate = DataRate(5);

    session.send(2, b"hello", false).unwrap();
    session.send(3, b"world", true).unwrap();

    assert_eq!(
        session.engine().uplinks,
        vec![
            SentUplink {
                port: 2,
                payload: b"hello".to_vec(),
                confirmed: false,
                data_rate: DataRate(5),
                retransmissions: Some(2),
            },
            SentUplink {
                port: 3,
                payload: b"world".to_vec(),
                confirmed: true,
                data_rate: DataRate(5),
                retransmissions: Some(4),
            },
        ]
    );
}

#[test]
fn oversized_payload_sends_flush_frame() {
    let (mut session, _signals, _) = started_session(SessionConfig::default());
    session.engine_mut().tx_possible = Err(MacStatus::LengthError);

    assert_eq!(session.send(1, &[0xAB; 40], true), Err(Error::LengthError));
    assert_eq!(
        session.engine().uplinks,
        vec![SentUplink {
            port: 0,
            payload: Vec::new(),
            confirmed: false,
            data_rate: session.engine().data_rate,
            retransmissions: Some(1),
        }]
    );
}

#[test]
fn failed_flush_frame_still_reports_length_error() {
    let (mut session, _signals, _) = started_session(SessionConfig::default());
    session.engine_mut().tx_possible = Err(MacStatus::LengthError);
    session.engine_mut().send_error = Some(MacStatus::DutyCycleRestricted);

    assert_eq!(session.send(1, b"x", false), Err(Error::LengthError));
}

#[test]
fn empty_payload_on_application_port_rejected() {
    let (mut session, _signals, _) = started_session(SessionConfig::default());

    assert_eq!(session.send(10, &[], false), Err(Error::LengthError));
    assert!(session.engine().uplinks.is_empty());

    session.send(0, &[], false).unwrap();
    assert_eq!(session.engine().uplinks.len(), 1);
}

#[test]
fn engine_send_errors_are_returned() {
    let (mut session, _signals, _) = started_session(SessionConfig::default());
    session.engine_mut().send_error = Some(MacStatus::NoNetworkJoined);

    assert_eq!(
        session.send(1, b"data", false),
        Err(Error::Engine(MacStatus::NoNetworkJoined))
    );
}

#[test]
fn link_check_with_and_without_piggyback() {
    let (mut session, _signals, _) = started_session(SessionConfig::default());

    session.check_link(true).unwrap();
    assert_eq!(session.engine().link_checks, 1);
    assert!(session.engine().uplinks.is_empty());

    session.check_link(false).unwrap();
    assert_eq!(session.engine().link_checks, 2);
    let frame = &session.engine().uplinks[0];
    assert_eq!((frame.port, frame.payload.len(), frame.confirmed), (0, 0, false));
    assert_eq!(frame.retransmissions, None);

    session.engine_mut().link_check_error = Some(MacStatus::Busy);
    assert_eq!(session.check_link(false), Err(Error::Busy));
    assert_eq!(session.engine().uplinks.len(), 1);
}

#[test]
fn link_check_answers_are_forwarded() {
    let (mut session, _signals, _) = started_session(SessionConfig::default());
    session.engine_mut().push(MacEvent::MlmeConfirm(MlmeConfirm {
        kind: MlmeKind::LinkCheck,
        status: EventStatus::Ok,
        margin: 12,
        gateways: 3,
    }));
    session.engine_mut().push(MacEvent::MlmeConfirm(MlmeConfirm::new(
        MlmeKind::LinkCheck,
        EventStatus::Rx2Timeout,
    )));

    session.process();

    assert_eq!(
        session.notifier().events,
        vec![
            Recorded::Network(NetworkEvent::Answer {
                margin: 12,
                gateways: 3
            }),
            Recorded::Network(NetworkEvent::NoAnswer),
        ]
    );
    assert_eq!(session.last_tx_status(), Some(EventStatus::Rx2Timeout));
}

#[test]
fn uplink_confirms_notify_ack_and_retransmission() {
    let (mut session, _signals, _) = started_session(SessionConfig::default());
    let engine = session.engine_mut();
    engine.push(MacEvent::McpsRetransmit);
    engine.push(MacEvent::McpsConfirm {
        kind: McpsKind::Confirmed,
        ack_received: true,
        status: EventStatus::Ok,
    });
    engine.push(MacEvent::McpsConfirm {
        kind: McpsKind::Confirmed,
        ack_received: false,
        status: EventStatus::Rx2Timeout,
    });
    engine.push(MacEvent::McpsConfirm {
        kind: McpsKind::Unconfirmed,
        ack_received: false,
        status: EventStatus::Ok,
    });

    session.process();

    assert_eq!(
        session.notifier().events,
        vec![
            Recorded::Network(NetworkEvent::Retransmission),
            Recorded::Network(NetworkEvent::Ack),
            Recorded::Network(NetworkEvent::NoAck),
        ]
    );
    assert_eq!(session.last_tx_status(), Some(EventStatus::Ok));
}

#[test]
fn downlinks_use_configured_format() {
    let (mut hex, _signals, _) = started_session(SessionConfig {
        data_format: DataFormat::Hex,
        ..SessionConfig::default()
    });
    hex.engine_mut().push(downlink(EventStatus::Ok, 7, &[0xDE, 0xAD], true));
    hex.process();
    assert_eq!(hex.notifier().events, vec![Recorded::Hex(7, vec![0xDE, 0xAD])]);

    let (mut raw, _signals, _) = started_session(SessionConfig::default());
    raw.engine_mut().push(downlink(EventStatus::Ok, 9, b"on", true));
    raw.process();
    assert_eq!(raw.notifier().events, vec![Recorded::Raw(9, b"on".to_vec())]);
}

#[test]
fn downlinks_without_data_or_with_errors_are_dropped() {
    let (mut session, _signals, _) = started_session(SessionConfig::default());
    session.engine_mut().push(downlink(EventStatus::MicFail, 7, b"bad", true));
    session.engine_mut().push(downlink(EventStatus::Ok, 0, &[], false));

    session.process();

    assert!(session.notifier().events.is_empty());
}

#[test]
fn continuous_wave_end_is_notified() {
    let (mut session, _signals, _) = started_session(SessionConfig::default());

    session.start_continuous_wave(10, 868_100_000, 14).unwrap();
    assert_eq!(
        session.engine().continuous_waves,
        vec![ContinuousWave {
            timeout_s: 10,
            frequency: 868_100_000,
            power: 14,
        }]
    );

    session.engine_mut().push(MacEvent::MlmeConfirm(MlmeConfirm::new(
        MlmeKind::ContinuousWave,
        EventStatus::Ok,
    )));
    session.engine_mut().push(MacEvent::MlmeConfirm(MlmeConfirm::new(
        MlmeKind::ContinuousWave,
        EventStatus::TxTimeout,
    )));
    session.process();

    assert_eq!(session.notifier().events, vec![Recorded::ContinuousWaveEnd]);
}

#[test]
fn state_changes_are_flushed_one_per_step() {
    let (mut session, signals, _) = started_session(SessionConfig::default());
    session
        .engine_mut()
        .change_state(GroupFlags::MAC_GROUP1 | GroupFlags::CRYPTO);

    session.process();
    assert_eq!(session.platform().writes, vec![NvmGroup::Crypto]);
    assert!(signals.sleep_lock().contains(SleepLock::NVM));

    session.process();
    assert_eq!(
        session.platform().writes,
        vec![NvmGroup::Crypto, NvmGroup::MacGroup1]
    );

    session.process();
    assert!(!signals.sleep_inhibited());
}

#[test]
fn state_changes_survive_a_full_event_queue() {
    let (mut session, signals, _) = started_session(SessionConfig::default());
    for port in 1..=EVENT_QUEUE_LEN as u8 + 1 {
        session.engine_mut().push(downlink(EventStatus::Ok, port, &[port], true));
    }
    session.engine_mut().change_state(GroupFlags::CRYPTO);

    session.process();

    assert_eq!(session.notifier().events.len(), EVENT_QUEUE_LEN);
    assert_eq!(session.platform().writes, vec![NvmGroup::Crypto]);
    assert!(signals.dirty().is_empty());
}

#[test]
fn process_runs_radio_engine_then_flash() {
    let trace = Trace::default();
    let (mut session, signals) = session_with(
        MockEngine::new(&trace).with_radio(),
        MockPlatform::new(&trace),
        SessionConfig::default(),
    );
    session.init().unwrap();
    trace.borrow_mut().clear();

    signals.request_processing();
    session.mark_dirty(GroupFlags::CLASS_B);
    assert!(signals.sleep_inhibited());

    session.process();

    assert_eq!(*trace.borrow(), vec!["radio", "engine", "flash"]);
    assert_eq!(session.engine().radio.as_ref().unwrap().irq_calls, 1);
    assert!(!signals.sleep_lock().contains(SleepLock::LORA));
}

#[test]
fn busy_engine_holds_back_flush() {
    let (mut session, signals, _) = started_session(SessionConfig::default());
    session.engine_mut().busy = true;
    session.mark_dirty(GroupFlags::REGION_GROUP1);

    session.process();
    assert!(session.platform().writes.is_empty());
    assert_eq!(signals.dirty(), GroupFlags::REGION_GROUP1);

    session.engine_mut().busy = false;
    session.process();
    assert_eq!(session.platform().writes, vec![NvmGroup::RegionGroup1]);
}

#[test]
fn eirp_and_dwell_reseal_mac_group2() {
    let (mut session, signals, _) = started_session(SessionConfig::default());

    session.set_max_eirp(16);
    let block = &session.engine().nvm.mac_group2.0;
    assert_eq!(block[8], 16);
    assert!(crc::whole_block_ok::<MockPlatform>(block));
    assert_eq!(signals.dirty(), GroupFlags::MAC_GROUP2);

    session.flush_one();
    session.set_dwell(true, false);
    let block = &session.engine().nvm.mac_group2.0;
    assert_eq!((block[10], block[11]), (1, 0));
    assert!(crc::whole_block_ok::<MockPlatform>(block));
    assert_eq!(signals.dirty(), GroupFlags::MAC_GROUP2);
}

#[test]
fn class_change_marks_config_modified() {
    let (mut session, _signals, _) = started_session(SessionConfig::default());
    assert!(!session.take_config_modified());

    session.set_class(DeviceClass::C).unwrap();

    assert_eq!(session.class(), DeviceClass::C);
    assert_eq!(session.engine().class, DeviceClass::C);
    assert!(session.take_config_modified());
    assert!(!session.take_config_modified());
}

#[test]
fn mode_switching() {
    let (mut session, _signals, _) = started_session(SessionConfig::default());
    assert_eq!(session.mode(), ActivationMode::Abp);

    session.set_mode(ActivationMode::Otaa).unwrap();
    assert_eq!(session.engine().activation, Activation::None);
    assert_eq!(session.mode(), ActivationMode::Otaa);
    assert!(session.engine().joins.is_empty());

    session.set_mode(ActivationMode::Abp).unwrap();
    assert_eq!(session.engine().activation, Activation::Abp);
    assert_eq!(session.engine().joins.len(), 1);

    // Already ABP: no second activation
    session.set_mode(ActivationMode::Abp).unwrap();
    assert_eq!(session.engine().joins.len(), 1);
}
