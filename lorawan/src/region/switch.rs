use super::Region;
use crate::engine::MacEngine;
use crate::error::Error;
use crate::nvm::{crc, GroupFlags, NvmGroup, Persistence, REGION_FIELD};
use crate::platform::Crc;

/// Groups rewritten by a region switch. The `SecureElement` group keeps the
/// keys and EUIs and is left alone.
pub const RESET_GROUPS: GroupFlags = GroupFlags::ALL.without(GroupFlags::SECURE_ELEMENT);

/// Outcome of [`set_region`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegionChange {
    /// The region was already active, nothing changed
    Unchanged,
    /// The engine was stopped and its state reset for the new region. The
    /// switch takes effect after a reboot.
    Switched,
}

/// Switch the engine from `current`, the region its persisted state belongs
/// to, to `region`.
///
/// Performs a partial factory reset of the engine's NVM state:
/// - `Crypto` is reset to defaults except for the DevNonce, which must never repeat
/// - `MacGroup1`, `RegionGroup1`, `RegionGroup2` and `ClassB` are zeroed and fail validation on the next boot
/// - `MacGroup2` is zeroed except for the new region, protected by a narrow-field checksum
///
/// The reset groups are marked dirty so the main loop writes them out.
pub fn set_region<E: MacEngine, C: Crc>(
    engine: &mut E,
    persistence: &Persistence<'_>,
    current: Region,
    region: Region,
) -> Result<RegionChange, Error> {
    if !engine.is_region_active(region) {
        return Err(Error::RegionNotSupported);
    }
    if current == region {
        return Ok(RegionChange::Unchanged);
    }

    engine.deinit().map_err(|status| {
        #[cfg(feature = "defmt")]
        defmt::error!("LoRaMac: Error while stopping the MAC: {}", status);
        Error::from(status)
    })?;

    let nonce = engine.nvm().dev_nonce();
    engine.reset_crypto();
    let state = engine.nvm_mut();
    state.set_dev_nonce(nonce);
    crc::seal::<C>(&mut state.crypto.0);

    for group in RESET_GROUPS.without(GroupFlags::CRYPTO).iter() {
        state.group_mut(group).fill(0);
    }

    state.set_region_id(region.id());
    crc::seal_field::<C>(state.group_mut(NvmGroup::MacGroup2), REGION_FIELD);

    persistence.mark_dirty(RESET_GROUPS);

    #[cfg(feature = "defmt")]
    defmt::debug!("LoRaMac: Switched to region {}, reboot to apply", region);
    Ok(RegionChange::Switched)
}
