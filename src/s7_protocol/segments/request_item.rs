use bytes::{BufMut, BytesMut};

use crate::errors::Error;
use crate::item::{Area, VariableType};

pub(in crate::s7_protocol) const SPEC_TYPE_READ_WRITE: u8 = 0x12;
pub(in crate::s7_protocol) const SYNTAX_ID_ANY_TYPE: u8 = 0x10;

/// Addresses are encoded on 3 bytes in the wire format (§4, RequestItem):
/// the bit address must fit inside `2^24`.
const MAX_BIT_ADDRESS: u32 = 1 << 24;

#[derive(Debug, Copy, Clone)]
pub(in crate::s7_protocol) struct RequestItem {
    pub(crate) specification_type: u8, // Always 0x12, Variable Specification.
    pub(crate) item_length: u8, // Length of the rest of this item. 10 bytes for Request Items.
    pub(crate) syntax_id: u8, // 0x10 for any-type addressing.
    pub(crate) var_type: u8, // Type and length of the variable (REAL, BIT, BYTE, WORD, DWORD, COUNTER, ...).
    pub(crate) data_length: u16, // Number of consecutive variables of the same type addressed by this item.
    pub(crate) db_number: u16, // Data block number; ignored unless area is DB.
    pub(crate) area: u8, // Memory area of the addressed variable.
    pub(crate) address: u32, // Bit offset of the addressed variable, network byte order, 3 bytes on the wire.
                             // As an example DBX40.3 would be 0x000143 which is 40 * 8 + 3.
}

impl RequestItem {
    pub(in crate::s7_protocol) fn len() -> usize {
        // address is only 3 bytes long (not u32 as in struct)
        12
    }

    pub(in crate::s7_protocol) fn build(
        area: Area,
        db_number: u16,
        address: u32,
        variable_type: VariableType,
        read_count: u16,
    ) -> Result<Self, Error> {
        let bit_address = if variable_type.is_byte_addressed() {
            address.checked_mul(8).ok_or(Error::DataItemTooLarge)?
        } else {
            address
        };

        if bit_address >= MAX_BIT_ADDRESS {
            return Err(Error::DataItemTooLarge);
        }

        Ok(Self {
            specification_type: SPEC_TYPE_READ_WRITE,
            item_length: 10,
            syntax_id: SYNTAX_ID_ANY_TYPE,
            var_type: variable_type as u8,
            data_length: read_count,
            area: area as u8,
            db_number,
            address: bit_address,
        })
    }

    pub(in crate::s7_protocol) fn address_to_bytes(&self) -> BytesMut {
        let mut address = self.address;
        let address_byte3 = (address & 0x0FF) as u8;
        address >>= 8;
        let address_byte2 = (address & 0x0FF) as u8;
        address >>= 8;
        let address_byte1 = (address & 0x0FF) as u8;

        let mut bytes = BytesMut::with_capacity(3);
        bytes.extend_from_slice(&[address_byte1, address_byte2, address_byte3]);
        bytes
    }
}

impl From<RequestItem> for BytesMut {
    fn from(req_item: RequestItem) -> BytesMut {
        let mut bytes = BytesMut::with_capacity(12);
        bytes.put_u8(req_item.specification_type);
        bytes.put_u8(req_item.item_length);
        bytes.put_u8(req_item.syntax_id);
        bytes.put_u8(req_item.var_type);
        bytes.put_u16(req_item.data_length);
        bytes.put_u16(req_item.db_number);
        bytes.put_u8(req_item.area);
        bytes.put(req_item.address_to_bytes());

        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_addressed_items_multiply_by_eight() {
        let item = RequestItem::build(Area::DataBlock, 1, 40, VariableType::Byte, 4).unwrap();
        assert_eq!(item.address, 40 * 8);
    }

    #[test]
    fn bit_addressed_items_are_not_multiplied() {
        let item = RequestItem::build(Area::DataBlock, 1, 0x143, VariableType::Bit, 1).unwrap();
        assert_eq!(item.address, 0x143);
    }

    #[test]
    fn rejects_addresses_that_overflow_24_bits() {
        let item = RequestItem::build(Area::DataBlock, 1, 1 << 22, VariableType::Byte, 1);
        assert!(matches!(item, Err(Error::DataItemTooLarge)));
    }
}
