use crate::consts::BROADCAST_UID;
use crate::types::DeserializationError;

/// The unique id of one responder on the bus. There shouldn't be multiple
/// devices with same unique id. The manufacturer uids are assigned by the
/// esta. [more information](https://tsp.esta.org/tsp/working_groups/CP/mfctrIDs.php)
///
/// Ordering is lexicographic over the 6 big-endian bytes, which the field
/// order reproduces.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd)]
pub struct UniqueIdentifier {
    manufacturer_uid: u16,
    device_uid: u32,
}

impl core::fmt::Display for UniqueIdentifier {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:04X}:{:08X}", self.manufacturer_uid, self.device_uid)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for UniqueIdentifier {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "{:04X}:{:08X}", self.manufacturer_uid, self.device_uid);
    }
}

impl UniqueIdentifier {
    /// The all-zero uid. A responder with no active model reports this
    /// instead of claiming an identity.
    pub const NULL: UniqueIdentifier = UniqueIdentifier {
        manufacturer_uid: 0,
        device_uid: 0,
    };

    pub fn new(manufacturer_uid: u16, device_uid: u32) -> Result<Self, DeserializationError> {
        if device_uid == u32::MAX || manufacturer_uid == u16::MAX {
            return Err(DeserializationError);
        }

        Ok(UniqueIdentifier {
            manufacturer_uid,
            device_uid,
        })
    }

    pub fn manufacturer_uid(&self) -> u16 {
        self.manufacturer_uid
    }

    pub fn device_uid(&self) -> u32 {
        self.device_uid
    }

    pub fn to_bytes(&self) -> [u8; 6] {
        let mut buffer = [0u8; 6];

        buffer[..2].copy_from_slice(&self.manufacturer_uid.to_be_bytes());
        buffer[2..].copy_from_slice(&self.device_uid.to_be_bytes());

        buffer
    }
}

/// The destination field of a request, classified. Vendorcast and broadcast
/// destinations demand action from every matching responder but forbid a
/// reply; [PackageAddress::requires_action] and
/// [PackageAddress::requires_response] encode that asymmetry.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PackageAddress {
    /// Addressed to all devices.
    Broadcast,
    /// Addressed to all devices of the manufacturer identified by the u16.
    ManufacturerBroadcast(u16),
    /// Addressed to a specific device.
    Device(UniqueIdentifier),
}

impl PackageAddress {
    pub fn from_bytes(buffer: &[u8; 6]) -> Self {
        let manufacturer_uid = u16::from_be_bytes(buffer[0..2].try_into().unwrap());
        let device_uid = u32::from_be_bytes(buffer[2..].try_into().unwrap());

        if device_uid == u32::MAX {
            if manufacturer_uid == u16::MAX {
                Self::Broadcast
            } else {
                Self::ManufacturerBroadcast(manufacturer_uid)
            }
        } else {
            Self::Device(UniqueIdentifier {
                manufacturer_uid,
                device_uid,
            })
        }
    }

    pub fn to_bytes(&self) -> [u8; 6] {
        match self {
            Self::Broadcast => [0xFFu8; 6],
            Self::ManufacturerBroadcast(manufacturer_uid) => {
                let mut buffer = [0xFFu8; 6];
                buffer[..2].copy_from_slice(&manufacturer_uid.to_be_bytes());

                buffer
            },
            Self::Device(uid) => uid.to_bytes(),
        }
    }

    pub fn is_broadcast(&self) -> bool {
        match self {
            PackageAddress::Broadcast => true,
            PackageAddress::ManufacturerBroadcast(_) => true,
            PackageAddress::Device(_) => false,
        }
    }

    /// True if a responder owning `device_uid` must process a request sent
    /// to this destination. Covers the exact match, the full broadcast and a
    /// vendorcast with matching manufacturer id. Processing includes silent
    /// state changes; whether a reply goes out is decided separately by
    /// [PackageAddress::requires_response].
    pub fn requires_action(&self, device_uid: UniqueIdentifier) -> bool {
        match self {
            PackageAddress::Broadcast => true,
            PackageAddress::ManufacturerBroadcast(manufacturer_uid) => {
                *manufacturer_uid == device_uid.manufacturer_uid()
            },
            PackageAddress::Device(uid) => *uid == device_uid,
        }
    }

    /// True only on an exact uid match. A responder that replied to a
    /// broadcast or vendorcast destination would collide with every other
    /// responder on the line.
    pub fn requires_response(&self, device_uid: UniqueIdentifier) -> bool {
        matches!(self, PackageAddress::Device(uid) if *uid == device_uid)
    }
}

impl From<PackageAddress> for u64 {
    fn from(value: PackageAddress) -> Self {
        match value {
            PackageAddress::Broadcast => BROADCAST_UID,
            PackageAddress::ManufacturerBroadcast(manufacturer_uid) => {
                ((manufacturer_uid as u64) << u32::BITS) | u32::MAX as u64
            },
            PackageAddress::Device(uid) => {
                ((uid.manufacturer_uid as u64) << u32::BITS) | uid.device_uid as u64
            },
        }
    }
}
