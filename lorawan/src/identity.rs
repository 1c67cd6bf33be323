//! Device identity
//!
//! The DevEUI comes from NVM when the `SecureElement` group carries one, either
//! as a fully valid group or preserved through a factory reset in its DevEUI
//! field. A missing or all-zero DevEUI is replaced by one derived from the MCU's
//! unique id. A zero DevAddr is replaced by a random address from a prefix
//! reserved for experimental and private nodes.

use rand_core::RngCore;

use crate::config::device::{DevAddr, EUI64};
use crate::nvm::Restored;
use crate::platform::UniqueId;

/// First address of the private `02000000/7` prefix. The prefix is chosen over
/// `00000000/7` so a generated address is never zero.
pub const PRIVATE_DEV_ADDR_BASE: DevAddr = 0x0200_0000;

/// Number of addresses in the private prefix
pub const PRIVATE_DEV_ADDR_SPAN: u32 = 0x0200_0000;

/// DevEUI to configure at start-up
pub fn resolve_dev_eui<U: UniqueId>(restored: &Restored, hardware: &U) -> EUI64 {
    match restored.dev_eui() {
        Some(dev_eui) if dev_eui != [0; 8] => dev_eui,
        _ => hardware.unique_id(),
    }
}

/// Random DevAddr in `0x02000000..=0x03FFFFFF`
pub fn generate_dev_addr<R: RngCore>(rng: &mut R) -> DevAddr {
    PRIVATE_DEV_ADDR_BASE + rng.next_u32() % PRIVATE_DEV_ADDR_SPAN
}
