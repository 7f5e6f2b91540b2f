use bytes::{Buf, BufMut, BytesMut};

use crate::errors::Error;
use crate::item::TransportSize;

const HEADER_LEN: usize = 4;
/// `return_code` signaling the item was read/written successfully.
const RETURN_CODE_SUCCESS: u8 = 0xFF;

/// Wire-level response/write payload block: `return_code`, `transport_size`,
/// `count` and the raw value bytes (§4, "DataItem"). Not to be confused with
/// [`crate::item::DataItem`], the external capability trait callers
/// implement to describe what to read or write.
#[derive(Debug)]
pub(in crate::s7_protocol) struct DataItemBlock {
    pub(in crate::s7_protocol) return_code: u8,
    pub(in crate::s7_protocol) transport_size: u8,
    pub(in crate::s7_protocol) count: u16,
    pub(in crate::s7_protocol) data: BytesMut,
}

impl DataItemBlock {
    pub(in crate::s7_protocol) fn header_len() -> usize {
        HEADER_LEN
    }

    /// Build a block carrying a value to write. `count` on the wire is the
    /// byte length as-is for [`TransportSize::Bit`], and the bit length
    /// (byte length × 8) for every other transport size (spec.md §3, §8
    /// Scenario B).
    pub(in crate::s7_protocol) fn build_write(transport_size: TransportSize, data: BytesMut) -> Self {
        let count = if transport_size.is_size_in_bytes() {
            data.len() as u16
        } else {
            data.len() as u16 * 8
        };
        Self {
            return_code: 0,
            transport_size: transport_size as u8,
            count,
            data,
        }
    }

    /// Parse `item_count` consecutive data items out of a read-response
    /// payload, skipping the single padding byte S7 inserts after an
    /// odd-length item's data when more items follow (never after the last
    /// item).
    pub(in crate::s7_protocol) fn parse_many(
        bytes: &mut BytesMut,
        item_count: usize,
    ) -> Vec<Result<Self, Error>> {
        (0..item_count)
            .map(|index| {
                let item = Self::try_from(&mut *bytes);
                if index + 1 < item_count {
                    if let Ok(ref item) = item {
                        if item.data.len() % 2 == 1 && bytes.has_remaining() {
                            bytes.advance(1);
                        }
                    }
                }
                item
            })
            .collect()
    }

    /// Resolve this block's own `return_code` into the value bytes or the
    /// per-item error it reports (spec.md §6/§8 Scenario D: item failures
    /// are keyed by their position in the request batch).
    pub(in crate::s7_protocol) fn into_result(self, item_index: usize) -> Result<BytesMut, Error> {
        if self.return_code == RETURN_CODE_SUCCESS {
            Ok(self.data)
        } else {
            Err(Error::S7ItemError {
                item_index,
                code: self.return_code,
            })
        }
    }
}

impl TryFrom<&mut BytesMut> for DataItemBlock {
    type Error = Error;

    fn try_from(bytes: &mut BytesMut) -> Result<Self, Self::Error> {
        if bytes.len() < HEADER_LEN {
            return Err(Error::PartialRead);
        }

        let return_code = bytes.get_u8();
        let transport_size = bytes.get_u8();
        let raw_count = bytes.get_u16();
        let byte_len = if TransportSize::from(transport_size).is_size_in_bytes() {
            raw_count
        } else {
            raw_count.div_ceil(8)
        } as usize;

        if bytes.len() < byte_len {
            return Err(Error::PartialRead);
        }

        Ok(Self {
            return_code,
            transport_size,
            count: raw_count,
            data: bytes.split_to(byte_len),
        })
    }
}

impl From<DataItemBlock> for BytesMut {
    fn from(item: DataItemBlock) -> BytesMut {
        let mut bytes = BytesMut::with_capacity(HEADER_LEN + item.data.len());
        bytes.put_u8(item.return_code);
        bytes.put_u8(item.transport_size);
        bytes.put_u16(item.count);
        bytes.put(item.data);
        bytes
    }
}

/// Concatenate write-request data items, inserting the even-byte padding
/// required between items (never after the last one).
pub(in crate::s7_protocol) fn encode_many(items: Vec<DataItemBlock>) -> BytesMut {
    let mut bytes = BytesMut::new();
    let last_index = items.len().saturating_sub(1);
    for (index, item) in items.into_iter().enumerate() {
        let odd_length = item.data.len() % 2 == 1;
        bytes.put(BytesMut::from(item));
        if odd_length && index != last_index {
            bytes.put_u8(0);
        }
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_byte_transport_item() {
        let mut bytes = BytesMut::from(&[0xFFu8, 0x04, 0x00, 0x20, 0xAA, 0xBB, 0xCC, 0xDD][..]);
        let item = DataItemBlock::try_from(&mut bytes).unwrap();
        assert_eq!(item.data.as_ref(), &[0xAA, 0xBB, 0xCC, 0xDD]);
    }

    #[test]
    fn parse_many_skips_padding_between_odd_length_items() {
        // item 0: 1 byte of data (odd) -> followed by 1 padding byte
        // item 1: 2 bytes of data
        let mut bytes = BytesMut::from(
            &[
                0xFFu8, 0x04, 0x00, 0x01, 0x11, // item 0 (1 byte) + no explicit pad here...
                0x00, // ...the padding byte
                0xFF, 0x04, 0x00, 0x02, 0x22, 0x33, // item 1 (2 bytes)
            ][..],
        );
        let items = DataItemBlock::parse_many(&mut bytes, 2);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap().data.as_ref(), &[0x11]);
        assert_eq!(items[1].as_ref().unwrap().data.as_ref(), &[0x22, 0x33]);
    }

    #[test]
    fn into_result_surfaces_per_item_error() {
        let mut bytes = BytesMut::from(&[0x05u8, 0x04, 0x00, 0x00][..]);
        let item = DataItemBlock::try_from(&mut bytes).unwrap();
        assert!(matches!(
            item.into_result(2),
            Err(Error::S7ItemError { item_index: 2, code: 0x05 })
        ));
    }
}
