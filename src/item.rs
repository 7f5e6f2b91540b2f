//! The `DataItem` capability: the interface the wire codec consumes to
//! address and (de)serialize a single value inside a batched read or write.
//!
//! The codec (`s7_protocol::read_area`, `s7_protocol::write_area`) never
//! knows about concrete PLC data types; it only calls through this trait.
//! [`ByteItem`] and [`BitItem`] are the two built-in implementors needed to
//! keep the crate's own `db_read`/`db_write`/bit-access convenience methods
//! working — richer typed converters are an external concern.

use bytes::{BufMut, BytesMut};

/// Memory area a [`DataItem`] addresses inside the PLC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Area {
    /// Process input image
    Input = 0x81,
    /// Process output image
    Output = 0x82,
    /// Merker / flag memory
    Marker = 0x83,
    /// Data block memory
    DataBlock = 0x84,
    /// Counter memory
    Counter = 0x1C,
    /// Timer memory
    Timer = 0x1D,
}

/// `var_type` field of a [`RequestItem`](crate::s7_protocol::segments::request_item::RequestItem):
/// determines the type and length of the addressed variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableType {
    /// Single bit
    Bit = 1,
    /// 8-bit byte
    Byte = 2,
    /// 8-bit signed char
    Char = 3,
    /// 16-bit word
    Word = 4,
    /// 16-bit signed integer
    Int = 5,
    /// 32-bit double word
    DWord = 6,
    /// 32-bit signed integer
    DInt = 7,
    /// 32-bit IEEE-754 float
    Real = 8,
    /// S7 counter
    Counter = 0x1C,
    /// S7 timer
    Timer = 0x1D,
}

impl VariableType {
    /// Whether addresses of this type are given as a byte offset that the
    /// codec must multiply by 8 to obtain the wire bit address, as opposed
    /// to counter/timer/bit addressing, which is already in the target
    /// unit.
    pub(crate) fn is_byte_addressed(self) -> bool {
        !matches!(self, Self::Bit | Self::Counter | Self::Timer)
    }
}

/// `transport_size` field of the response-side
/// [`DataItemBlock`](crate::s7_protocol::segments::data_item::DataItemBlock):
/// the wire-level transport class, independent from [`VariableType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportSize {
    /// No data
    Null = 0x00,
    /// Bit-granular transport; `count` on the wire already denotes bytes
    /// (always 1 for a single bit value).
    Bit = 0x03,
    /// Byte/word/dword-granular transport; `count` on the wire is in bits
    /// and must be divided by 8 to get the payload length in bytes.
    Byte = 0x04,
    /// Integer transport.
    Integer = 0x05,
    /// Real (float) transport.
    Real = 0x07,
    /// Octet string transport.
    OctetString = 0x09,
}

impl TransportSize {
    /// `true` only for [`TransportSize::Bit`], where the wire `count` field
    /// already denotes bytes rather than bits. Confirmed against the
    /// worked read-response example: `transport_size=0x04` (Byte) with
    /// `count=16` carries exactly 2 bytes of payload (`16 / 8 = 2`).
    pub fn is_size_in_bytes(self) -> bool {
        matches!(self, Self::Bit)
    }
}

impl From<u8> for TransportSize {
    fn from(value: u8) -> Self {
        match value {
            0x03 => Self::Bit,
            0x04 => Self::Byte,
            0x05 => Self::Integer,
            0x07 => Self::Real,
            0x09 => Self::OctetString,
            _ => Self::Null,
        }
    }
}

/// Capability a caller implements to describe one addressable value inside
/// a batched read or write request.
///
/// The codec calls `area`/`db_number`/`address`/`read_count`/
/// `transport_size`/`variable_type` while building the request parameters,
/// and `write_value`/`read_value` while (de)serializing the payload.
pub trait DataItem {
    /// Memory area this item addresses.
    fn area(&self) -> Area;
    /// Data block number; ignored unless `area()` is [`Area::DataBlock`].
    fn db_number(&self) -> u16;
    /// Address of the item within its area. For byte-addressed variable
    /// types this is the starting byte offset; for bit/counter/timer types
    /// it is already the final wire unit (see [`VariableType::is_byte_addressed`]).
    fn address(&self) -> u32;
    /// Number of units (bytes, or 1 for a bit) this item asks to be read.
    fn read_count(&self) -> u16;
    /// Wire-level transport class used when this item appears in a
    /// response or write payload.
    fn transport_size(&self) -> TransportSize;
    /// `var_type` used when addressing this item in a request.
    fn variable_type(&self) -> VariableType;
    /// Serialize this item's value into `out`, returning the number of
    /// bytes written. Called while building a write request.
    fn write_value(&self, out: &mut BytesMut) -> usize;
    /// Deserialize this item's value from `data`. Called while parsing a
    /// read response.
    fn read_value(&mut self, data: &[u8]);
}

/// Built-in [`DataItem`] for a contiguous run of bytes.
#[derive(Debug, Clone)]
pub struct ByteItem {
    area: Area,
    db_number: u16,
    start: u32,
    data: Vec<u8>,
}

impl ByteItem {
    /// Build an item for reading `length` bytes starting at `start`.
    pub fn for_read(area: Area, db_number: u16, start: u32, length: u16) -> Self {
        Self {
            area,
            db_number,
            start,
            data: vec![0; length as usize],
        }
    }

    /// Build an item for writing `data` starting at `start`.
    pub fn for_write(area: Area, db_number: u16, start: u32, data: Vec<u8>) -> Self {
        Self {
            area,
            db_number,
            start,
            data,
        }
    }

    /// Bytes currently held by this item (the value read, or about to be
    /// written).
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Consume the item, returning its bytes.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}

impl DataItem for ByteItem {
    fn area(&self) -> Area {
        self.area
    }

    fn db_number(&self) -> u16 {
        self.db_number
    }

    fn address(&self) -> u32 {
        self.start
    }

    fn read_count(&self) -> u16 {
        self.data.len() as u16
    }

    fn transport_size(&self) -> TransportSize {
        TransportSize::Byte
    }

    fn variable_type(&self) -> VariableType {
        VariableType::Byte
    }

    fn write_value(&self, out: &mut BytesMut) -> usize {
        out.put_slice(&self.data);
        self.data.len()
    }

    fn read_value(&mut self, data: &[u8]) {
        self.data = data.to_vec();
    }
}

/// Built-in [`DataItem`] for a single bit.
#[derive(Debug, Clone, Copy)]
pub struct BitItem {
    area: Area,
    db_number: u16,
    byte: u32,
    bit: u8,
    value: bool,
}

impl BitItem {
    /// Build an item addressing bit `bit` (0..7) of `byte`, with an initial
    /// value used only when writing.
    pub fn new(area: Area, db_number: u16, byte: u32, bit: u8, value: bool) -> Self {
        Self {
            area,
            db_number,
            byte,
            bit,
            value,
        }
    }

    /// The bit's current value.
    pub fn value(&self) -> bool {
        self.value
    }
}

impl DataItem for BitItem {
    fn area(&self) -> Area {
        self.area
    }

    fn db_number(&self) -> u16 {
        self.db_number
    }

    fn address(&self) -> u32 {
        self.byte * 8 + u32::from(self.bit)
    }

    fn read_count(&self) -> u16 {
        1
    }

    fn transport_size(&self) -> TransportSize {
        TransportSize::Bit
    }

    fn variable_type(&self) -> VariableType {
        VariableType::Bit
    }

    fn write_value(&self, out: &mut BytesMut) -> usize {
        out.put_u8(u8::from(self.value));
        1
    }

    fn read_value(&mut self, data: &[u8]) {
        self.value = data.first().is_some_and(|b| *b > 0);
    }
}
