//! Detector module identifiers and topology lookup.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Raw identifier of one strip detector module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(transparent))]
pub struct ModuleId(pub u32);

impl ModuleId {
    /// Creates a module id from its raw value.
    #[inline]
    #[must_use]
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw id value.
    #[inline]
    #[must_use]
    pub fn raw(self) -> u32 {
        self.0
    }

    /// Returns the subdetector encoded in bits 25..27 of the raw id.
    #[must_use]
    pub fn subdetector(self) -> Option<Subdetector> {
        Subdetector::from_code((self.0 >> 25) & 0x7)
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Strip tracker subassembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Subdetector {
    /// Inner barrel.
    Tib,
    /// Inner disks.
    Tid,
    /// Outer barrel.
    Tob,
    /// Endcaps.
    Tec,
}

impl Subdetector {
    /// All subdetectors in id order.
    pub const ALL: [Subdetector; 4] = [Self::Tib, Self::Tid, Self::Tob, Self::Tec];

    /// Maps the 3-bit subdetector code of a raw id.
    #[must_use]
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            3 => Some(Self::Tib),
            4 => Some(Self::Tid),
            5 => Some(Self::Tob),
            6 => Some(Self::Tec),
            _ => None,
        }
    }

    /// Position in [`Subdetector::ALL`].
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            Self::Tib => 0,
            Self::Tid => 1,
            Self::Tob => 2,
            Self::Tec => 3,
        }
    }

    /// Short upper-case name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tib => "TIB",
            Self::Tid => "TID",
            Self::Tob => "TOB",
            Self::Tec => "TEC",
        }
    }

    /// Barrel subdetectors are organised in layers, endcaps in side/wheel.
    #[must_use]
    pub fn is_barrel(self) -> bool {
        matches!(self, Self::Tib | Self::Tob)
    }
}

impl fmt::Display for Subdetector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Layer within a subdetector.
///
/// Barrel layers use `side == 0`; endcap wheels carry the side (1 or 2)
/// and the wheel number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LayerId {
    /// Endcap side, 0 for barrel layers.
    pub side: u8,
    /// Layer or wheel number.
    pub number: u8,
}

impl LayerId {
    /// A barrel layer.
    #[must_use]
    pub fn layer(number: u8) -> Self {
        Self { side: 0, number }
    }

    /// An endcap wheel on a given side.
    #[must_use]
    pub fn wheel(side: u8, number: u8) -> Self {
        Self { side, number }
    }
}

/// Maps modules to their place in the detector.
///
/// Geometry is owned by the surrounding framework; the monitor only needs
/// the subdetector and layer of each module.
pub trait ModuleTopology: Send + Sync {
    /// Returns the subdetector and layer of `module`, or `None` if unknown.
    fn locate(&self, module: ModuleId) -> Option<(Subdetector, LayerId)>;
}

/// Decodes the standard strip tracker raw-id bit layout.
///
/// | subdetector | field | bits |
/// |---|---|---|
/// | TIB, TOB | layer | 14..16 |
/// | TID | side, wheel | 13..14, 11..12 |
/// | TEC | side, wheel | 18..19, 14..17 |
#[derive(Debug, Clone, Copy, Default)]
pub struct StripDetIdTopology;

impl ModuleTopology for StripDetIdTopology {
    #[allow(clippy::cast_possible_truncation)]
    fn locate(&self, module: ModuleId) -> Option<(Subdetector, LayerId)> {
        let raw = module.raw();
        let subdet = module.subdetector()?;
        let layer = match subdet {
            Subdetector::Tib | Subdetector::Tob => LayerId::layer(((raw >> 14) & 0x7) as u8),
            Subdetector::Tid => {
                LayerId::wheel(((raw >> 13) & 0x3) as u8, ((raw >> 11) & 0x3) as u8)
            }
            Subdetector::Tec => {
                LayerId::wheel(((raw >> 18) & 0x3) as u8, ((raw >> 14) & 0xF) as u8)
            }
        };
        Some((subdet, layer))
    }
}
