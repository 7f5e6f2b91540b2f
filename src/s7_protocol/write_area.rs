//! Batched S7 write requests (spec.md §4.1 "Write request encoder" /
//! "Write response parser"): mirrors `read_area`, but the value bytes travel
//! in the request instead of the response, and the ack only carries one
//! return-code byte per item.

use std::time::Duration;

use bytes::{Buf, BufMut, BytesMut};

use super::header::S7Header;
use super::segments::{
    data_item::{self, DataItemBlock},
    parameters::ReadWriteParams,
    request_item::RequestItem,
};
use crate::errors::Error;
use crate::executor::{CancelToken, Executor};
use crate::item::{Area, ByteItem, DataItem};

const WRITE_FUNCTION_CODE: u8 = 0x05;
const MAX_ITEMS_PER_REQUEST: usize = 255;
const REQUEST_HEADER_LEN: usize = 10;
const ACK_HEADER_LEN: usize = 12;
/// One return-code byte per item, no padding, in the write ack (spec.md §4.1).
const WRITE_ACK_ITEM_LEN: usize = 1;

impl ReadWriteParams {
    pub(super) fn build_write(items: Vec<RequestItem>) -> Self {
        Self {
            function_code: WRITE_FUNCTION_CODE,
            item_count: items.len() as u8,
            request_item: Some(items),
        }
    }
}

fn serialize_values(items: &[&mut dyn DataItem]) -> Vec<BytesMut> {
    items
        .iter()
        .map(|item| {
            let mut buf = BytesMut::new();
            item.write_value(&mut buf);
            buf
        })
        .collect()
}

fn assert_pdu_budget(
    items: &[&mut dyn DataItem],
    values: &[BytesMut],
    pdu_size: u16,
) -> Result<(), Error> {
    if items.is_empty() || items.len() > MAX_ITEMS_PER_REQUEST {
        return Err(Error::TooManyItemsInOneRequest);
    }

    let max_pdu = usize::from(pdu_size);
    let data_len = data_item::encode_many(
        items
            .iter()
            .zip(values)
            .map(|(item, value)| DataItemBlock::build_write(item.transport_size(), value.clone()))
            .collect(),
    )
    .len();

    let request_size =
        REQUEST_HEADER_LEN + ReadWriteParams::len() + items.len() * RequestItem::len() + data_len;
    if request_size > max_pdu {
        return Err(Error::TooMuchDataToWrite);
    }

    let response_size = ACK_HEADER_LEN + ReadWriteParams::len() + items.len() * WRITE_ACK_ITEM_LEN;
    if response_size > max_pdu {
        return Err(Error::ResponseDataWouldBeTooLarge {
            req_size: response_size,
            max_pdu,
        });
    }

    Ok(())
}

fn build_request(items: &[&mut dyn DataItem], values: Vec<BytesMut>) -> Result<BytesMut, Error> {
    let request_items = items
        .iter()
        .zip(&values)
        .map(|(item, value)| {
            RequestItem::build(
                item.area(),
                item.db_number(),
                item.address(),
                item.variable_type(),
                value.len() as u16,
            )
        })
        .collect::<Result<Vec<_>, Error>>()?;

    let blocks = items
        .iter()
        .zip(values)
        .map(|(item, value)| DataItemBlock::build_write(item.transport_size(), value))
        .collect();
    let data = data_item::encode_many(blocks);

    let params = BytesMut::from(ReadWriteParams::build_write(request_items));
    let header = S7Header::build_request(0, params.len() as u16, data.len() as u16);

    let mut frame = BytesMut::with_capacity(REQUEST_HEADER_LEN + params.len() + data.len());
    frame.put(BytesMut::from(header));
    frame.put(params);
    frame.put(data);
    Ok(frame)
}

/// Send a batched write request for `items`, serializing each item's
/// current value via [`DataItem::write_value`]. Returns one `Result` per
/// item, in request order.
pub(crate) async fn write_items(
    executor: &Executor,
    pdu_size: u16,
    items: &mut [&mut dyn DataItem],
    deadline: Duration,
) -> Result<Vec<Result<(), Error>>, Error> {
    let values = serialize_values(items);
    assert_pdu_budget(items, &values, pdu_size)?;
    let requested = items.len();
    let frame = build_request(items, values)?;

    let mut response = executor.perform(&frame, deadline, &CancelToken::new()).await?;

    let write_params = ReadWriteParams::from(&mut response);
    if write_params.function_code != WRITE_FUNCTION_CODE {
        return Err(Error::UnexpectedFunctionCode {
            expected: WRITE_FUNCTION_CODE,
            got: write_params.function_code,
        });
    }
    if usize::from(write_params.item_count) != requested {
        return Err(Error::ItemCountMismatch {
            requested,
            got: usize::from(write_params.item_count),
        });
    }

    let mut results = Vec::with_capacity(requested);
    for item_index in 0..requested {
        if !response.has_remaining() {
            return Err(Error::PartialRead);
        }
        let return_code = response.get_u8();
        results.push(if return_code == 0xFF {
            Ok(())
        } else {
            Err(Error::S7ItemError {
                item_index,
                code: return_code,
            })
        });
    }
    Ok(results)
}

fn max_byte_chunk(pdu_size: u16) -> usize {
    usize::from(pdu_size).saturating_sub(
        REQUEST_HEADER_LEN + ReadWriteParams::len() + RequestItem::len() + DataItemBlock::header_len(),
    )
}

/// Convenience write of a contiguous byte range, splitting into multiple
/// sequential requests when `data` would not fit in one PDU.
pub(crate) async fn write_bytes(
    executor: &Executor,
    pdu_size: u16,
    area: Area,
    db_number: u16,
    start: u32,
    data: &[u8],
    deadline: Duration,
) -> Result<(), Error> {
    let max_chunk = max_byte_chunk(pdu_size).max(1);

    for (chunk_index, chunk) in data.chunks(max_chunk).enumerate() {
        let offset = (chunk_index * max_chunk) as u32;
        let mut item = ByteItem::for_write(area, db_number, start + offset, chunk.to_vec());
        let mut results =
            write_items(executor, pdu_size, &mut [&mut item as &mut dyn DataItem], deadline).await?;
        results.remove(0)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::BitItem;

    #[test]
    fn request_data_length_matches_header_data_length_field() {
        let mut item = ByteItem::for_write(Area::DataBlock, 1, 0, vec![0xAA, 0xBB, 0xCC]);
        let values = serialize_values(&[&mut item as &mut dyn DataItem]);
        let frame = build_request(&[&mut item as &mut dyn DataItem], values).unwrap();

        let mut header_bytes = BytesMut::from(&frame[..10]);
        let header = S7Header::try_from(&mut header_bytes).unwrap();
        assert_eq!(header.data_length(), 3 + 4); // 3 value bytes + 4-byte DataItemBlock header
    }

    #[test]
    fn write_ack_budget_is_one_byte_per_item_no_padding() {
        let mut a = BitItem::new(Area::DataBlock, 1, 0, 0, true);
        let mut b = BitItem::new(Area::DataBlock, 1, 0, 1, false);
        let items: Vec<&mut dyn DataItem> = vec![&mut a, &mut b];
        let values = serialize_values(&items);
        assert!(assert_pdu_budget(&items, &values, 1024).is_ok());
    }

    #[test]
    fn rejects_empty_batch() {
        let empty: Vec<&mut dyn DataItem> = Vec::new();
        let values: Vec<BytesMut> = Vec::new();
        assert!(matches!(
            assert_pdu_budget(&empty, &values, 1024),
            Err(Error::TooManyItemsInOneRequest)
        ));
    }
}
