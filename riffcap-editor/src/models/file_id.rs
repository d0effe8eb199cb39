/// Composite identifier for an entry in the file-set list.
///
/// ```text
/// bits 31..16        bits 15..0
/// 0x0000             set id        → Set
/// 0xFFFF             set id        → Metadata (labels of the set)
/// 1 | index (15 bit) set id        → Extension
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileSetId {
    Set(u16),
    Extension { set: u16, index: u16 },
    Metadata(u16),
}

const METADATA_MARK: u32 = 0xFFFF_0000;
const EXTENSION_BIT: u32 = 0x8000_0000;

impl FileSetId {
    /// Decode a raw id. Returns `None` for a zero set id or a malformed upper half.
    pub fn from_raw(raw: u32) -> Option<Self> {
        let set = (raw & 0xFFFF) as u16;
        if set == 0 {
            return None;
        }
        let upper = raw & 0xFFFF_0000;
        if upper == METADATA_MARK {
            Some(Self::Metadata(set))
        } else if upper & EXTENSION_BIT != 0 {
            Some(Self::Extension { set, index: ((upper & !EXTENSION_BIT) >> 16) as u16 })
        } else if upper == 0 {
            Some(Self::Set(set))
        } else {
            None
        }
    }

    pub fn to_raw(self) -> u32 {
        match self {
            Self::Set(set) => set as u32,
            Self::Metadata(set) => METADATA_MARK | set as u32,
            Self::Extension { set, index } => EXTENSION_BIT | ((index as u32 & 0x7FFF) << 16) | set as u32,
        }
    }

    /// The owning set.
    pub fn set(self) -> u16 {
        match self {
            Self::Set(set) | Self::Metadata(set) | Self::Extension { set, .. } => set,
        }
    }
}
