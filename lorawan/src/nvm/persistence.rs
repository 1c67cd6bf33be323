use strum::{EnumCount, IntoEnumIterator};

use super::crc::{self, Validity};
use super::{GroupFlags, NvmGroup, NvmState};
use crate::config::device::EUI64;
use crate::engine::{MacEngine, MacStatus};
use crate::nvm::DEV_EUI_FIELD;
use crate::platform::{Crc, PartitionStore};
use crate::signals::{Signals, SleepLock};

/// NVM state read back from flash at start-up
#[derive(Debug, Clone)]
pub struct Restored {
    /// Composite state handed to the engine. Invalid groups are zeroed, groups
    /// valid only in their key field keep that field and its trailer.
    pub state: NvmState,
    validity: [Validity; NvmGroup::COUNT],
}

impl Restored {
    /// Validation outcome of one group
    pub fn validity(&self, group: NvmGroup) -> Validity {
        self.validity[group as usize]
    }

    /// Persisted region identifier, if `MacGroup2` is valid as a whole or in its region field
    pub fn region_id(&self) -> Option<u32> {
        match self.validity(NvmGroup::MacGroup2) {
            Validity::Whole | Validity::Field => Some(self.state.region_id()),
            Validity::Invalid => None,
        }
    }

    /// Persisted DevEUI, if `SecureElement` is valid as a whole or in its DevEUI field
    pub fn dev_eui(&self) -> Option<EUI64> {
        match self.validity(NvmGroup::SecureElement) {
            Validity::Whole | Validity::Field => {
                let mut dev_eui = [0u8; 8];
                dev_eui.copy_from_slice(DEV_EUI_FIELD.get(&self.state.secure_element.0));
                Some(dev_eui)
            }
            Validity::Invalid => None,
        }
    }
}

/// Result of one flush step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Flush {
    /// Nothing was dirty
    Clean,
    /// The engine was busy, the group stays dirty
    Deferred(NvmGroup),
    /// The group was written and its flag cleared
    Written(NvmGroup),
    /// The flash write failed, the group stays dirty
    Failed(NvmGroup),
}

/// Incremental save and restore of the engine's NVM groups
pub struct Persistence<'s> {
    signals: &'s Signals,
}

impl<'s> Persistence<'s> {
    /// Create a persistence manager tracking dirty groups in `signals`
    pub fn new(signals: &'s Signals) -> Self {
        Self { signals }
    }

    /// Read all seven partitions and validate each group.
    ///
    /// Missing or undersized partitions leave their group zeroed.
    pub fn load<P: PartitionStore + Crc>(store: &P) -> Restored {
        let mut restored = Restored {
            state: NvmState::new(),
            validity: [Validity::Invalid; NvmGroup::COUNT],
        };

        for group in NvmGroup::iter() {
            let size = group.size();
            let Some(block) = store.map(group).and_then(|bytes| bytes.get(..size)) else {
                #[cfg(feature = "defmt")]
                defmt::debug!("No {} state in NVM", group);
                continue;
            };

            let validity = crc::validate::<P>(block, group.key_field());
            let target = restored.state.group_mut(group);
            match (validity, group.key_field()) {
                (Validity::Whole, _) => target.copy_from_slice(block),
                (Validity::Field, Some(field)) => {
                    field.write(target, field.get(block));
                    let trailer = size - crc::TRAILER_SIZE;
                    target[trailer..].copy_from_slice(&block[trailer..]);
                }
                _ => {
                    #[cfg(feature = "defmt")]
                    defmt::debug!("{} state in NVM failed validation", group);
                }
            }
            restored.validity[group as usize] = validity;
        }

        restored
    }

    /// Hand the restored composite to the engine in one request
    pub fn restore_all<E: MacEngine>(engine: &mut E, restored: &Restored) -> Result<(), MacStatus> {
        engine.restore_nvm(&restored.state).map_err(|status| {
            #[cfg(feature = "defmt")]
            defmt::error!("LoRaMac: Error while restoring NVM state: {}", status);
            status
        })
    }

    /// Mark groups as changed. Callable from any context.
    pub fn mark_dirty(&self, flags: GroupFlags) {
        self.signals.mark_dirty(flags);
    }

    /// Groups waiting to be written
    pub fn dirty(&self) -> GroupFlags {
        self.signals.dirty()
    }

    /// Write at most one dirty group, highest priority first.
    ///
    /// Nothing is written while the engine is busy, so a transaction in progress
    /// never produces a torn group on flash.
    pub fn flush_one<P: PartitionStore, E: MacEngine>(&self, store: &mut P, engine: &E) -> Flush {
        let Some(group) = self.signals.dirty().iter().next() else {
            self.signals.unlock_sleep(SleepLock::NVM);
            return Flush::Clean;
        };
        self.signals.lock_sleep(SleepLock::NVM);

        if engine.is_busy() {
            return Flush::Deferred(group);
        }

        #[cfg(feature = "defmt")]
        defmt::debug!("Saving {} state to NVM", group);
        if store.write(group, 0, engine.nvm().group(group)).is_err() {
            #[cfg(feature = "defmt")]
            defmt::error!("Error while writing {} state to NVM", group);
            return Flush::Failed(group);
        }

        self.signals.clear_dirty(group.flag());
        Flush::Written(group)
    }
}
