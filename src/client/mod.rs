use crate::item::{Area, BitItem, ByteItem, DataItem};

pub(crate) mod create;
pub(crate) mod pool;
pub(crate) mod read;
pub(crate) mod triggers;
pub(crate) mod write;

/// Describes one value to read in a `*_read`/`*_read_multi` call.
#[derive(Debug, Clone, Copy)]
pub enum S7ReadAccess {
    Bytes {
        db_number: u16,
        start: u32,
        length: u32,
    },
    Bit {
        db_number: u16,
        byte: u32,
        bit: u32,
    },
}

/// Describes one value to write in a `*_write`/`*_write_multi` call.
#[derive(Debug, Clone)]
pub enum S7WriteAccess {
    Bytes {
        db_number: u16,
        start: u32,
        data: Vec<u8>,
    },
    Bit {
        db_number: u16,
        byte: u32,
        bit: u32,
        value: bool,
    },
}

/// Either built-in [`DataItem`] kind, used by the `*_multi` convenience
/// methods to batch a mix of byte ranges and bits behind one uniform
/// `Vec<u8>` result per item.
pub(crate) enum BatchItem {
    Byte(ByteItem),
    Bit(BitItem),
}

impl BatchItem {
    pub(crate) fn for_read(access: S7ReadAccess, area: Area) -> Self {
        match access {
            S7ReadAccess::Bytes {
                db_number,
                start,
                length,
            } => Self::Byte(ByteItem::for_read(area, db_number, start, length as u16)),
            S7ReadAccess::Bit {
                db_number,
                byte,
                bit,
            } => Self::Bit(BitItem::new(area, db_number, byte, bit as u8, false)),
        }
    }

    pub(crate) fn for_write(access: S7WriteAccess, area: Area) -> Self {
        match access {
            S7WriteAccess::Bytes {
                db_number,
                start,
                data,
            } => Self::Byte(ByteItem::for_write(area, db_number, start, data)),
            S7WriteAccess::Bit {
                db_number,
                byte,
                bit,
                value,
            } => Self::Bit(BitItem::new(area, db_number, byte, bit as u8, value)),
        }
    }

    pub(crate) fn as_data_item_mut(&mut self) -> &mut dyn DataItem {
        match self {
            Self::Byte(item) => item,
            Self::Bit(item) => item,
        }
    }

    /// Value bytes after a read, uniform across both kinds: a bit becomes a
    /// single `0`/`1` byte.
    pub(crate) fn into_bytes(self) -> Vec<u8> {
        match self {
            Self::Byte(item) => item.into_data(),
            Self::Bit(item) => vec![u8::from(item.value())],
        }
    }
}
