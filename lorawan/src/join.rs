//! Join orchestration
//!
//! ABP activation is a single internal request to the engine, no radio traffic is
//! involved. OTAA sends a join request at DR0 and, when the network stays silent
//! (RX2 timeout), retransmits it up to `retries` times. Each retransmission waits
//! a random 100-500 ms so devices powered up together do not keep colliding.
//!
//! The retry timer's expiry handler runs in interrupt context. It only raises
//! [`Events::RETRANSMIT_JOIN`](crate::signals::Events::RETRANSMIT_JOIN); the
//! retransmission itself happens in [`Session::process`](crate::device::Session::process).

use embedded_hal::timer::{Cancel, CountDown};
use rand_core::RngCore;

use crate::config::device::Activation;
use crate::config::SessionConfig;
use crate::engine::{self, DataRate, EventStatus, JoinRequest, MacEngine, MacStatus};
use crate::error::Error;
use crate::notify::{JoinResult, Notification, Notifier};
use crate::region::{ChannelMask, CHANNEL_MASK_WORDS};

/// Maximum number of OTAA join retransmissions
pub const MAX_JOIN_RETRIES: u8 = 15;

/// Shortest delay before a join retransmission, in milliseconds
pub const RETRY_DELAY_MIN_MS: u32 = 100;

/// Longest delay before a join retransmission, in milliseconds
pub const RETRY_DELAY_MAX_MS: u32 = 500;

/// Join session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum JoinState {
    /// No join in flight
    Idle,
    /// ABP activation submitted, waiting for the confirm
    ActivatingAbp,
    /// OTAA join request submitted, waiting for the confirm
    Activating {
        /// Join requests left, including the one in flight
        attempts_remaining: u8,
    },
    /// Retry timer armed
    RetryPending {
        /// Join requests left
        attempts_remaining: u8,
    },
}

/// Drives network activation on top of the engine
pub struct JoinOrchestrator<T> {
    timer: T,
    state: JoinState,
    saved_chmask: ChannelMask,
}

impl<T> JoinOrchestrator<T>
where
    T: CountDown + Cancel,
    T::Time: From<u32>,
{
    /// Create an idle orchestrator using `timer` for retransmission delays
    pub fn new(timer: T) -> Self {
        Self {
            timer,
            state: JoinState::Idle,
            saved_chmask: [0; CHANNEL_MASK_WORDS],
        }
    }

    /// Current state
    pub fn state(&self) -> JoinState {
        self.state
    }

    /// True while a join is in flight
    pub fn is_active(&self) -> bool {
        self.state != JoinState::Idle
    }

    /// Join requests left in the current OTAA session
    pub fn attempts_remaining(&self) -> u8 {
        match self.state {
            JoinState::Activating { attempts_remaining }
            | JoinState::RetryPending { attempts_remaining } => attempts_remaining,
            _ => 0,
        }
    }

    /// Retry timer
    pub fn timer(&self) -> &T {
        &self.timer
    }

    /// Retry timer, mutable
    pub fn timer_mut(&mut self) -> &mut T {
        &mut self.timer
    }

    /// Start an activation using the engine's current activation type.
    ///
    /// ABP accepts only `retries == 0`; OTAA accepts up to [`MAX_JOIN_RETRIES`].
    pub fn request<E: MacEngine>(
        &mut self,
        engine: &mut E,
        config: &SessionConfig,
        retries: u8,
    ) -> Result<(), Error> {
        // Also refuse while OTAA is in flight so the application can't switch to ABP mid-join
        if self.is_active() {
            return Err(Error::Busy);
        }

        if engine.activation() == Activation::Abp {
            if retries != 0 {
                return Err(Error::InvalidParameter);
            }
            engine.join(JoinRequest {
                activation: Activation::Abp,
                data_rate: DataRate::DR0,
            })?;
            self.state = JoinState::ActivatingAbp;
            return Ok(());
        }

        if retries > MAX_JOIN_RETRIES {
            return Err(Error::InvalidParameter);
        }
        if config.restore_chmask_after_join {
            self.saved_chmask = engine.channels_default_mask();
        }
        send_join(engine)?;
        self.state = JoinState::Activating {
            attempts_remaining: retries + 1,
        };
        Ok(())
    }

    /// Handle the engine's join confirm
    pub fn on_confirm<E: MacEngine, R: RngCore, N: Notifier>(
        &mut self,
        engine: &mut E,
        rng: &mut R,
        notifier: &mut N,
        config: &SessionConfig,
        status: EventStatus,
    ) {
        match self.state {
            JoinState::ActivatingAbp => {
                self.state = JoinState::Idle;
                if status == EventStatus::Ok {
                    if let Some(version) = config.abp_mac_version {
                        if let Err(_status) = engine.set_abp_version(version) {
                            #[cfg(feature = "defmt")]
                            defmt::error!("LoRaMac: Error while setting ABP version: {}", _status);
                        }
                    }
                }
                reapply_class(engine, config);
            }
            JoinState::Activating { attempts_remaining } => {
                let attempts_remaining = attempts_remaining.saturating_sub(1);
                if attempts_remaining > 0 && status == EventStatus::Rx2Timeout {
                    let delay = random_delay(rng);
                    #[cfg(feature = "defmt")]
                    defmt::debug!("Join timed out, retrying in {} ms", delay);
                    self.timer.start(delay);
                    self.state = JoinState::RetryPending { attempts_remaining };
                } else {
                    let result = if status == EventStatus::Ok {
                        JoinResult::Succeeded
                    } else {
                        JoinResult::Failed
                    };
                    self.stop(engine, notifier, config, result);
                }
            }
            JoinState::Idle | JoinState::RetryPending { .. } => {
                #[cfg(feature = "defmt")]
                defmt::debug!("Ignoring join confirm in state {}", self.state);
            }
        }
    }

    /// Retransmit the join request after the retry timer expired
    pub fn retransmit<E: MacEngine, N: Notifier>(
        &mut self,
        engine: &mut E,
        notifier: &mut N,
        config: &SessionConfig,
    ) {
        let JoinState::RetryPending { attempts_remaining } = self.state else {
            return;
        };

        #[cfg(feature = "defmt")]
        defmt::debug!("Retransmitting Join");
        self.state = JoinState::Activating { attempts_remaining };
        if let Err(_status) = send_join(engine) {
            #[cfg(feature = "defmt")]
            defmt::error!("Error while retransmitting Join ({})", _status);
            self.stop(engine, notifier, config, JoinResult::Failed);
        }
    }

    /// Terminate an in-flight join without touching the engine, e.g. after it
    /// was deinitialized.
    pub fn abort<N: Notifier>(&mut self, notifier: &mut N) {
        if !self.is_active() {
            return;
        }
        let _ = self.timer.cancel();
        self.state = JoinState::Idle;
        notifier.notify(Notification::Join(JoinResult::Failed));
    }

    /// Poll the retry timer. Returns true once when a pending retry is due.
    pub fn poll_timer(&mut self) -> bool {
        if !matches!(self.state, JoinState::RetryPending { .. }) {
            return false;
        }
        match self.timer.wait() {
            Ok(()) => true,
            Err(nb::Error::WouldBlock) => false,
            Err(nb::Error::Other(never)) => match never {},
        }
    }

    fn stop<E: MacEngine, N: Notifier>(
        &mut self,
        engine: &mut E,
        notifier: &mut N,
        config: &SessionConfig,
        result: JoinResult,
    ) {
        // Cancelling a stopped timer is harmless
        let _ = self.timer.cancel();
        self.state = JoinState::Idle;

        notifier.notify(Notification::Join(result));
        reapply_class(engine, config);

        if config.restore_chmask_after_join && engine.activation() == Activation::Otaa {
            let mask = self.saved_chmask;
            if engine.set_channels_default_mask(&mask).is_err() || engine.set_channels_mask(&mask).is_err() {
                #[cfg(feature = "defmt")]
                defmt::error!("LoRaMac: Error while restoring channel mask");
            }
        }
    }
}

fn send_join<E: MacEngine>(engine: &mut E) -> Result<(), MacStatus> {
    engine.join(JoinRequest {
        activation: Activation::Otaa,
        data_rate: DataRate::DR0,
    })
}

// The engine forces class A during any activation
fn reapply_class<E: MacEngine>(engine: &mut E, config: &SessionConfig) {
    if let Err(_status) = engine::sync_device_class(engine, config.device_class) {
        #[cfg(feature = "defmt")]
        defmt::error!("LoRaMac: Error while restoring device class: {}", _status);
    }
}

fn random_delay<R: RngCore>(rng: &mut R) -> u32 {
    RETRY_DELAY_MIN_MS + rng.next_u32() % (RETRY_DELAY_MAX_MS - RETRY_DELAY_MIN_MS + 1)
}
