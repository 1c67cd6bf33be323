//! High-level LoRaWAN session interface
//!
//! [`Session`] ties the MAC engine to the board: it restores the engine's state
//! from flash at start-up, runs the join lifecycle, switches regions, forwards
//! engine callbacks to the application and writes changed state back to flash
//! one group at a time from the main loop.
//!
//! Interrupt handlers never call into the session. They go through the shared
//! [`Signals`] instead, and [`Session::process`] picks the work up.

use embedded_hal::timer::{Cancel, CountDown};

use crate::{
    config::{
        device::{Activation, ActivationMode, DeviceClass, SYSTEM_MAX_RX_ERROR_MS},
        DataFormat, SessionConfig,
    },
    engine::{
        self, ContinuousWave, EventQueue, EventStatus, MacEngine, MacEvent, MacStatus, McpsKind,
        MlmeConfirm, MlmeKind, Uplink,
    },
    error::Error,
    identity,
    join::{JoinOrchestrator, JoinState},
    notify::{NetworkEvent, Notification, Notifier, Payload},
    nvm::{crc, Flush, GroupFlags, Persistence},
    platform::Platform,
    region::{self, ChannelList, Region, RegionChange},
    signals::{Events, Signals},
};

/// LoRaWAN device session
pub struct Session<'s, E, P, T, N> {
    engine: E,
    platform: P,
    notifier: N,
    signals: &'s Signals,
    persistence: Persistence<'s>,
    join: JoinOrchestrator<T>,
    config: SessionConfig,
    config_modified: bool,
    initialized: bool,
    region: Region,
    queue: EventQueue,
    last_tx_status: Option<EventStatus>,
}

impl<'s, E, P, T, N> Session<'s, E, P, T, N>
where
    E: MacEngine,
    P: Platform,
    T: CountDown + Cancel,
    T::Time: From<u32>,
    N: Notifier,
{
    /// Create a session. Nothing is touched until [`Session::init`].
    pub fn new(
        engine: E,
        platform: P,
        timer: T,
        notifier: N,
        signals: &'s Signals,
        config: SessionConfig,
    ) -> Self {
        Self {
            engine,
            platform,
            notifier,
            signals,
            persistence: Persistence::new(signals),
            join: JoinOrchestrator::new(timer),
            region: config.default_region,
            config,
            config_modified: false,
            initialized: false,
            queue: EventQueue::new(),
            last_tx_status: None,
        }
    }

    /// Bring up the engine from the state persisted in flash.
    ///
    /// An unsupported region leaves the engine uninitialized and returns
    /// [`Error::RegionNotSupported`]; the session can still switch regions.
    ///
    /// # Panics
    ///
    /// If the engine rejects its initialization parameters. This is a firmware
    /// build error the device cannot recover from.
    pub fn init(&mut self) -> Result<(), Error> {
        let restored = Persistence::load(&self.platform);
        let region = restored
            .region_id()
            .and_then(Region::from_id)
            .unwrap_or(self.config.default_region);
        self.region = region;

        #[cfg(feature = "defmt")]
        defmt::debug!("LoRaMac: Initializing for region {}", region);
        match self.engine.init(region) {
            Ok(()) => {}
            Err(MacStatus::RegionNotSupported) => {
                #[cfg(feature = "defmt")]
                defmt::error!("LoRaMac: Unsupported region {}", region);
                self.initialized = false;
                return Err(Error::RegionNotSupported);
            }
            Err(MacStatus::ParameterInvalid) => {
                panic!("LoRaMac: Invalid initialization parameter(s)")
            }
            Err(_) => panic!("LoRaMac: Initialization error"),
        }

        if let Err(_status) = self.engine.apply_defaults(&self.config.mac_defaults) {
            #[cfg(feature = "defmt")]
            defmt::error!("LoRaMac: Error while applying defaults: {}", _status);
        }

        // Restore failures are logged by the persistence manager, the engine
        // keeps its defaults.
        let _ = Persistence::restore_all(&mut self.engine, &restored);

        if let Err(_status) = self.engine.set_max_rx_error(SYSTEM_MAX_RX_ERROR_MS) {
            #[cfg(feature = "defmt")]
            defmt::error!("LoRaMac: Error while setting max RX error: {}", _status);
        }
        self.sync_device_class();

        let dev_eui = identity::resolve_dev_eui(&restored, &self.platform);
        if let Err(_status) = self.engine.set_dev_eui(dev_eui) {
            #[cfg(feature = "defmt")]
            defmt::error!("LoRaMac: Error while setting DevEUI: {}", _status);
        }

        if self.engine.dev_addr() == 0 {
            let dev_addr = identity::generate_dev_addr(&mut self.platform);
            if let Err(_status) = self.engine.set_dev_addr(dev_addr) {
                #[cfg(feature = "defmt")]
                defmt::error!("LoRaMac: Error while setting DevAddr: {}", _status);
            }
        }

        #[cfg(feature = "defmt")]
        defmt::debug!(
            "LoRaMac: DevEUI: {:02x} DevAddr: {:08x} Class: {}",
            self.engine.dev_eui(),
            self.engine.dev_addr(),
            self.config.device_class
        );

        self.initialized = true;
        Ok(())
    }

    /// Main loop step.
    ///
    /// Handles a due join retransmission, the radio's deferred interrupt, one
    /// engine processing step and its callbacks, then writes at most one dirty
    /// NVM group.
    pub fn process(&mut self) {
        let events = self.signals.take_events();

        if events.contains(Events::RETRANSMIT_JOIN) {
            self.join
                .retransmit(&mut self.engine, &mut self.notifier, &self.config);
        }

        if let Some(radio) = self.engine.radio() {
            radio.irq_process();
        }

        if let Err(_overflow) = self.engine.process(&mut self.queue, self.signals) {
            #[cfg(feature = "defmt")]
            defmt::warn!("LoRaMac: {} callbacks dropped, event queue full", _overflow.0);
        }
        while let Some(event) = self.queue.pop_front() {
            self.handle_event(event);
        }

        self.persistence.flush_one(&mut self.platform, &self.engine);
    }

    fn handle_event(&mut self, event: MacEvent) {
        match event {
            MacEvent::McpsConfirm {
                kind,
                ack_received,
                status,
            } => {
                #[cfg(feature = "defmt")]
                defmt::debug!("mcps_confirm: {} ack: {} status: {}", kind, ack_received, status);
                self.last_tx_status = Some(status);
                if kind == McpsKind::Confirmed {
                    let event = if ack_received {
                        NetworkEvent::Ack
                    } else {
                        NetworkEvent::NoAck
                    };
                    self.notifier.notify(Notification::Network(event));
                }
            }
            MacEvent::McpsRetransmit => {
                self.notifier
                    .notify(Notification::Network(NetworkEvent::Retransmission));
            }
            MacEvent::McpsIndication(downlink) => {
                #[cfg(feature = "defmt")]
                defmt::debug!("mcps_indication: status: {} rssi: {}", downlink.status, downlink.rssi);
                if downlink.status != EventStatus::Ok || !downlink.rx_data {
                    return;
                }
                let payload = match self.config.data_format {
                    DataFormat::Hex => Payload::Hex(&downlink.payload),
                    DataFormat::Raw => Payload::Raw(&downlink.payload),
                };
                self.notifier.notify(Notification::Received {
                    port: downlink.port,
                    payload,
                });
            }
            MacEvent::MlmeConfirm(confirm) => self.handle_mlme_confirm(confirm),
            MacEvent::MlmeIndication { kind: _kind, status: _status } => {
                #[cfg(feature = "defmt")]
                defmt::debug!("mlme_indication: {} status: {}", _kind, _status);
            }
        }
    }

    fn handle_mlme_confirm(&mut self, confirm: MlmeConfirm) {
        #[cfg(feature = "defmt")]
        defmt::debug!("mlme_confirm: {} status: {}", confirm.kind, confirm.status);
        self.last_tx_status = Some(confirm.status);

        match confirm.kind {
            MlmeKind::Join => self.join.on_confirm(
                &mut self.engine,
                &mut self.platform,
                &mut self.notifier,
                &self.config,
                confirm.status,
            ),
            MlmeKind::LinkCheck => {
                let event = if confirm.status == EventStatus::Ok {
                    NetworkEvent::Answer {
                        margin: confirm.margin,
                        gateways: confirm.gateways,
                    }
                } else {
                    NetworkEvent::NoAnswer
                };
                self.notifier.notify(Notification::Network(event));
            }
            MlmeKind::ContinuousWave => {
                if confirm.status == EventStatus::TxTimeout {
                    self.notifier.notify(Notification::ContinuousWaveEnd);
                }
            }
            MlmeKind::Other(_) => {}
        }
    }

    /// Activate with the engine's current activation type. OTAA retransmits
    /// the join request up to `retries` times when it goes unanswered.
    pub fn request_join(&mut self, retries: u8) -> Result<(), Error> {
        self.join.request(&mut self.engine, &self.config, retries)
    }

    /// Switch to another region.
    ///
    /// The engine is stopped and the session must be re-initialized, usually by
    /// rebooting once the new state has been flushed. A join in flight is
    /// reported as failed.
    pub fn set_region(&mut self, region: Region) -> Result<RegionChange, Error> {
        let change =
            region::set_region::<E, P>(&mut self.engine, &self.persistence, self.region, region)?;
        if change == RegionChange::Switched {
            self.join.abort(&mut self.notifier);
            self.initialized = false;
            self.region = region;
        }
        Ok(change)
    }

    /// Region the persisted state belongs to. Set by [`Session::init`] even
    /// when the engine rejected it, and by every region switch.
    pub fn region(&self) -> Region {
        self.region
    }

    /// Send an uplink on `port`.
    ///
    /// If pending MAC commands leave no room for the payload, an empty frame is
    /// sent instead to flush them and [`Error::LengthError`] is returned.
    pub fn send(&mut self, port: u8, payload: &[u8], confirmed: bool) -> Result<(), Error> {
        let data_rate = self.engine.data_rate();

        if let Err(MacStatus::LengthError) = self.engine.query_tx_possible(payload.len()) {
            #[cfg(feature = "defmt")]
            defmt::info!("Payload too long. Sending empty frame to flush MAC commands");
            let flush = Uplink {
                port: 0,
                payload: &[],
                confirmed: false,
                data_rate,
                retransmissions: Some(1),
            };
            if let Err(_status) = self.engine.send(&flush) {
                #[cfg(feature = "defmt")]
                defmt::error!("Error while sending flush frame: {}", _status);
            }
            return Err(Error::LengthError);
        }

        // Pending MAC commands would take over an empty frame and move it to port 0
        if port != 0 && payload.is_empty() {
            #[cfg(feature = "defmt")]
            defmt::warn!("LoRaMac cannot reliably send empty payload to non-zero port");
            return Err(Error::LengthError);
        }

        self.engine.send(&Uplink {
            port,
            payload,
            confirmed,
            data_rate,
            retransmissions: Some(self.config.retransmissions(confirmed)),
        })?;
        Ok(())
    }

    /// Request a link check. Unless `piggyback` is set, an empty frame carrying
    /// the request is sent right away.
    pub fn check_link(&mut self, piggyback: bool) -> Result<(), Error> {
        self.engine.link_check().map_err(|status| {
            #[cfg(feature = "defmt")]
            defmt::debug!("Link check request failed: {}", status);
            Error::from(status)
        })?;

        if !piggyback {
            let frame = Uplink {
                port: 0,
                payload: &[],
                confirmed: false,
                data_rate: self.engine.data_rate(),
                retransmissions: None,
            };
            self.engine.send(&frame).map_err(|status| {
                #[cfg(feature = "defmt")]
                defmt::debug!("Empty frame TX failed: {}", status);
                Error::from(status)
            })?;
        }
        Ok(())
    }

    /// Activation mode. OTAA before the first join reports as OTAA.
    pub fn mode(&self) -> ActivationMode {
        match self.engine.activation() {
            Activation::Abp => ActivationMode::Abp,
            Activation::None | Activation::Otaa => ActivationMode::Otaa,
        }
    }

    /// Change the activation mode.
    ///
    /// Switching to ABP activates right away. Switching to OTAA leaves the
    /// device without activation until [`Session::request_join`] succeeds.
    pub fn set_mode(&mut self, mode: ActivationMode) -> Result<(), Error> {
        let current = self.engine.activation();
        match mode {
            ActivationMode::Abp if current != Activation::Abp => {
                self.engine.set_activation(Activation::Abp)?;
                self.request_join(0)
            }
            ActivationMode::Otaa if current != Activation::Otaa => {
                self.engine.set_activation(Activation::None)?;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Configured device class
    pub fn class(&self) -> DeviceClass {
        self.config.device_class
    }

    /// Change the device class. The configuration is marked modified so the
    /// application can persist it.
    pub fn set_class(&mut self, class: DeviceClass) -> Result<(), Error> {
        self.config.device_class = class;
        self.config_modified = true;
        engine::sync_device_class(&mut self.engine, class)?;
        Ok(())
    }

    /// Set the maximum EIRP in dBm
    pub fn set_max_eirp(&mut self, eirp: u8) {
        self.engine.set_max_eirp(eirp);
        self.reseal_mac_group2();
    }

    /// Enable or disable uplink and downlink dwell time limits
    pub fn set_dwell(&mut self, uplink: bool, downlink: bool) {
        self.engine.set_dwell(uplink, downlink);
        self.reseal_mac_group2();
    }

    fn reseal_mac_group2(&mut self) {
        crc::seal::<P>(&mut self.engine.nvm_mut().mac_group2.0);
        self.persistence.mark_dirty(GroupFlags::MAC_GROUP2);
    }

    /// Number of channel mask words used by the current region
    pub fn channel_mask_len(&self) -> usize {
        self.region.channel_mask_len()
    }

    /// Channel list length and masks of the current region
    pub fn channel_list(&self) -> ChannelList {
        ChannelList {
            length: self.region.max_channels(),
            mask_len: self.region.channel_mask_len(),
            mask: self.engine.channels_mask(),
            default_mask: self.engine.channels_default_mask(),
        }
    }

    /// Start a continuous wave test transmission. The application is notified
    /// when it ends.
    pub fn start_continuous_wave(
        &mut self,
        timeout_s: u16,
        frequency: u32,
        power: i8,
    ) -> Result<(), Error> {
        self.engine.continuous_wave(ContinuousWave {
            timeout_s,
            frequency,
            power,
        })?;
        Ok(())
    }

    /// Status of the last uplink or management confirm
    pub fn last_tx_status(&self) -> Option<EventStatus> {
        self.last_tx_status
    }

    /// Poll the join retry timer, for hosts that do not run the timer from an
    /// interrupt. Raises the retry event when the timer expired.
    pub fn poll_retry_timer(&mut self) {
        if self.join.poll_timer() {
            self.signals.on_retry_timer();
        }
    }

    /// Write at most one dirty NVM group
    pub fn flush_one(&mut self) -> Flush {
        self.persistence.flush_one(&mut self.platform, &self.engine)
    }

    /// Mark NVM groups as changed
    pub fn mark_dirty(&self, flags: GroupFlags) {
        self.persistence.mark_dirty(flags);
    }

    /// Join state
    pub fn join_state(&self) -> JoinState {
        self.join.state()
    }

    /// True once [`Session::init`] succeeded and no region switch happened since
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Returns true once after the configuration was changed
    pub fn take_config_modified(&mut self) -> bool {
        core::mem::take(&mut self.config_modified)
    }

    /// Session configuration
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// MAC engine
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// MAC engine, mutable
    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    /// Board services
    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// Board services, mutable
    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    /// Notification receiver
    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    /// Join retry timer
    pub fn timer(&self) -> &T {
        self.join.timer()
    }

    /// Join retry timer, mutable. Hosts servicing the timer hardware go through here.
    pub fn timer_mut(&mut self) -> &mut T {
        self.join.timer_mut()
    }

    /// Shared signals
    pub fn signals(&self) -> &'s Signals {
        self.signals
    }

    fn sync_device_class(&mut self) {
        if let Err(_status) = engine::sync_device_class(&mut self.engine, self.config.device_class) {
            #[cfg(feature = "defmt")]
            defmt::error!("LoRaMac: Error while setting device class: {}", _status);
        }
    }
}
