//! Signals shared between interrupt handlers and the main loop
//!
//! Three small bitmasks cross execution contexts: the NVM dirty flags, the
//! sleep-inhibit lock and the internal event set. Every access goes through
//! `critical_section::with`, which saves and restores the interrupt state and
//! therefore nests. The sections only read or modify a single `Cell`.
//!
//! `Signals::new` is `const`, so the host can keep one instance in a `static`
//! and hand it to interrupt handlers:
//!
//! ```ignore
//! static SIGNALS: Signals = Signals::new();
//!
//! fn on_rtc_alarm() {
//!     SIGNALS.on_retry_timer();
//! }
//! ```

use core::cell::Cell;

use critical_section::Mutex;

use crate::nvm::GroupFlags;

/// Modules that can keep the MCU out of low-power mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SleepLock(u8);

impl SleepLock {
    /// Nothing holds the lock
    pub const NONE: Self = Self(0);
    /// Engine processing or an internal event is pending
    pub const LORA: Self = Self(1 << 0);
    /// NVM groups are waiting to be written
    pub const NVM: Self = Self(1 << 1);

    /// True if no module holds the lock
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True if every module in `other` holds the lock
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

/// Internal events raised from interrupt context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Events(u8);

impl Events {
    /// No event
    pub const NONE: Self = Self(0);
    /// The join retry timer expired
    pub const RETRANSMIT_JOIN: Self = Self(1 << 0);

    /// True if no event is set
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True if every event in `other` is set
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

/// Interrupt-safe state shared with the session
pub struct Signals {
    dirty: Mutex<Cell<GroupFlags>>,
    sleep_lock: Mutex<Cell<SleepLock>>,
    events: Mutex<Cell<Events>>,
}

impl Default for Signals {
    fn default() -> Self {
        Self::new()
    }
}

impl Signals {
    /// Empty signal set
    pub const fn new() -> Self {
        Self {
            dirty: Mutex::new(Cell::new(GroupFlags::NONE)),
            sleep_lock: Mutex::new(Cell::new(SleepLock::NONE)),
            events: Mutex::new(Cell::new(Events::NONE)),
        }
    }

    /// Mark NVM groups as changed. Callable from any context.
    pub fn mark_dirty(&self, flags: GroupFlags) {
        critical_section::with(|cs| {
            let dirty = self.dirty.borrow(cs);
            dirty.set(dirty.get() | flags);
        });
    }

    /// Groups waiting to be written
    pub fn dirty(&self) -> GroupFlags {
        critical_section::with(|cs| self.dirty.borrow(cs).get())
    }

    /// Clear the given groups only. Bits set concurrently for other groups are kept.
    pub fn clear_dirty(&self, flags: GroupFlags) {
        critical_section::with(|cs| {
            let dirty = self.dirty.borrow(cs);
            dirty.set(dirty.get().without(flags));
        });
    }

    /// Engine processing is needed. Callable from interrupt context.
    pub fn request_processing(&self) {
        self.lock_sleep(SleepLock::LORA);
    }

    /// Join retry timer expiry handler. Runs in interrupt context and only records the event.
    pub fn on_retry_timer(&self) {
        critical_section::with(|cs| {
            let lock = self.sleep_lock.borrow(cs);
            lock.set(SleepLock(lock.get().0 | SleepLock::LORA.0));
            let events = self.events.borrow(cs);
            events.set(Events(events.get().0 | Events::RETRANSMIT_JOIN.0));
        });
    }

    /// Keep the MCU awake on behalf of `module`
    pub fn lock_sleep(&self, module: SleepLock) {
        critical_section::with(|cs| {
            let lock = self.sleep_lock.borrow(cs);
            lock.set(SleepLock(lock.get().0 | module.0));
        });
    }

    /// Release the sleep lock held by `module`
    pub fn unlock_sleep(&self, module: SleepLock) {
        critical_section::with(|cs| {
            let lock = self.sleep_lock.borrow(cs);
            lock.set(SleepLock(lock.get().0 & !module.0));
        });
    }

    /// Modules currently holding the sleep lock
    pub fn sleep_lock(&self) -> SleepLock {
        critical_section::with(|cs| self.sleep_lock.borrow(cs).get())
    }

    /// True if the platform idle routine must not suspend the MCU
    pub fn sleep_inhibited(&self) -> bool {
        !self.sleep_lock().is_empty()
    }

    /// Snapshot and clear pending events, releasing the processing sleep lock.
    pub(crate) fn take_events(&self) -> Events {
        critical_section::with(|cs| {
            let lock = self.sleep_lock.borrow(cs);
            lock.set(SleepLock(lock.get().0 & !SleepLock::LORA.0));
            self.events.borrow(cs).replace(Events::NONE)
        })
    }
}
