use rand_core::RngCore;

use crate::config::device::EUI64;
use crate::nvm::NvmGroup;

/// Everything the session needs from the board.
pub trait Platform: Crc + PartitionStore + UniqueId + RngCore {}

impl<T: Crc + PartitionStore + UniqueId + RngCore> Platform for T {}

/// CRC-32 (IEEE 802.3) as used in the NVM group trailers.
pub trait Crc {
    /// Checksum of `data`
    fn crc32(data: &[u8]) -> u32;
}

/// Flash partitions holding the NVM groups, one partition per group.
pub trait PartitionStore {
    /// Flash write error
    type Error;

    /// Memory-mapped contents of a partition, or `None` if the partition does not exist.
    fn map(&self, partition: NvmGroup) -> Option<&[u8]>;

    /// Write `data` at `offset` into the partition
    fn write(&mut self, partition: NvmGroup, offset: usize, data: &[u8]) -> Result<(), Self::Error>;
}

/// Source of the MCU's unique identifier.
pub trait UniqueId {
    /// 8-byte identifier derived from the MCU unique id
    fn unique_id(&self) -> EUI64;
}
