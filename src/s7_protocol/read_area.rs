//! Batched S7 read requests (spec.md §4.1 "Read request encoder" /
//! "Read response parser"): builds one job request covering 1..255
//! [`DataItem`]s and distributes the ack-data response back into them.

use std::time::Duration;

use bytes::{BufMut, BytesMut};

use super::header::S7Header;
use super::segments::{
    data_item::DataItemBlock, parameters::ReadWriteParams, request_item::RequestItem,
};
use crate::errors::Error;
use crate::executor::{CancelToken, Executor};
use crate::item::{Area, ByteItem, DataItem};

const READ_FUNCTION_CODE: u8 = 0x04;
const MAX_ITEMS_PER_REQUEST: usize = 255;
/// S7 header wire length for a job request (no error bytes, spec.md §3).
const REQUEST_HEADER_LEN: usize = 10;
/// S7 header wire length for an ack-data response (includes error bytes).
const ACK_HEADER_LEN: usize = 12;

impl ReadWriteParams {
    pub(super) fn build_read(items: Vec<RequestItem>) -> Self {
        Self {
            function_code: READ_FUNCTION_CODE,
            item_count: items.len() as u8,
            request_item: Some(items),
        }
    }
}

/// Exact size of the response's data region, including the per-item
/// `DataItem` header and the even-byte padding inserted between items
/// (never after the last one, spec.md §8 Scenario C).
fn response_payload_len(items: &[&mut dyn DataItem]) -> usize {
    let last = items.len().saturating_sub(1);
    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let payload = usize::from(item.read_count());
            let pad = usize::from(payload % 2 == 1 && index != last);
            DataItemBlock::header_len() + payload + pad
        })
        .sum()
}

fn assert_pdu_budget(items: &[&mut dyn DataItem], pdu_size: u16) -> Result<(), Error> {
    if items.is_empty() || items.len() > MAX_ITEMS_PER_REQUEST {
        return Err(Error::TooManyItemsInOneRequest);
    }

    let max_pdu = usize::from(pdu_size);
    let request_size =
        REQUEST_HEADER_LEN + ReadWriteParams::len() + items.len() * RequestItem::len();
    if request_size > max_pdu {
        return Err(Error::TooManyItemsInOneRequest);
    }

    let response_size = ACK_HEADER_LEN + ReadWriteParams::len() + response_payload_len(items);
    if response_size > max_pdu {
        return Err(Error::ResponseDataWouldBeTooLarge {
            req_size: response_size,
            max_pdu,
        });
    }

    Ok(())
}

fn build_request(items: &[&mut dyn DataItem]) -> Result<BytesMut, Error> {
    let request_items = items
        .iter()
        .map(|item| {
            RequestItem::build(
                item.area(),
                item.db_number(),
                item.address(),
                item.variable_type(),
                item.read_count(),
            )
        })
        .collect::<Result<Vec<_>, Error>>()?;

    let params = BytesMut::from(ReadWriteParams::build_read(request_items));
    let header = S7Header::build_request(0, params.len() as u16, 0);

    let mut frame = BytesMut::with_capacity(REQUEST_HEADER_LEN + params.len());
    frame.put(BytesMut::from(header));
    frame.put(params);
    Ok(frame)
}

/// Send a batched read request for `items`, delivering each item's value
/// back via [`DataItem::read_value`]. Returns one `Result` per item, in
/// request order — a failure on one item doesn't prevent the rest of the
/// batch from being delivered (spec.md §7: item errors are recoverable at
/// the caller level).
pub(crate) async fn read_items(
    executor: &Executor,
    pdu_size: u16,
    items: &mut [&mut dyn DataItem],
    deadline: Duration,
) -> Result<Vec<Result<(), Error>>, Error> {
    assert_pdu_budget(items, pdu_size)?;
    let requested = items.len();
    let frame = build_request(items)?;

    let mut response = executor.perform(&frame, deadline, &CancelToken::new()).await?;

    let read_params = ReadWriteParams::from(&mut response);
    if read_params.function_code != READ_FUNCTION_CODE {
        return Err(Error::UnexpectedFunctionCode {
            expected: READ_FUNCTION_CODE,
            got: read_params.function_code,
        });
    }
    if usize::from(read_params.item_count) != requested {
        return Err(Error::ItemCountMismatch {
            requested,
            got: usize::from(read_params.item_count),
        });
    }

    let blocks = DataItemBlock::parse_many(&mut response, requested);
    Ok(items
        .iter_mut()
        .zip(blocks)
        .enumerate()
        .map(|(item_index, (item, block))| {
            match block.and_then(|b| b.into_result(item_index)) {
                Ok(data) => {
                    item.read_value(&data);
                    Ok(())
                }
                Err(e) => Err(e),
            }
        })
        .collect())
}

/// Largest byte payload a single [`ByteItem`] read can ask for without the
/// response overflowing `pdu_size`.
fn max_byte_chunk(pdu_size: u16) -> usize {
    usize::from(pdu_size).saturating_sub(ACK_HEADER_LEN + ReadWriteParams::len() + DataItemBlock::header_len())
}

/// Convenience read of a contiguous byte range, transparently splitting
/// into multiple sequential requests when `length` would not fit in one
/// PDU (backs the `db_read`/`mb_read`/... convenience methods).
pub(crate) async fn read_bytes(
    executor: &Executor,
    pdu_size: u16,
    area: Area,
    db_number: u16,
    start: u32,
    length: u32,
    deadline: Duration,
) -> Result<Vec<u8>, Error> {
    let max_chunk = max_byte_chunk(pdu_size).max(1);
    let mut out = Vec::with_capacity(length as usize);
    let mut offset = 0u32;

    while offset < length {
        let chunk_len = (length - offset).min(max_chunk as u32) as u16;
        let mut item = ByteItem::for_read(area, db_number, start + offset, chunk_len);
        let mut results =
            read_items(executor, pdu_size, &mut [&mut item as &mut dyn DataItem], deadline).await?;
        results.remove(0)?;
        out.extend_from_slice(item.data());
        offset += u32::from(chunk_len);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::BitItem;

    #[test]
    fn request_params_length_matches_2_plus_12n() {
        let mut a = ByteItem::for_read(Area::DataBlock, 9, 6, 2);
        let mut b = ByteItem::for_read(Area::DataBlock, 9, 10, 1);
        let items: Vec<&mut dyn DataItem> = vec![&mut a, &mut b];
        let frame = build_request(&items).unwrap();
        // S7 header (10) + params (2 + 12*2)
        assert_eq!(frame.len(), 10 + 2 + 12 * 2);
    }

    #[test]
    fn scenario_b_single_read_request_bytes() {
        let mut item = ByteItem::for_read(Area::DataBlock, 9, 6, 2);
        let items: Vec<&mut dyn DataItem> = vec![&mut item];
        let frame = build_request(&items).unwrap();
        // skip the 10-byte S7 header, compare the function parameters
        assert_eq!(
            &frame[10..],
            &[0x04, 0x01, 0x12, 0x0A, 0x10, 0x02, 0x00, 0x02, 0x00, 0x09, 0x84, 0x00, 0x00, 0x30]
        );
    }

    #[test]
    fn response_payload_len_counts_padding_except_after_last_item() {
        let mut a = ByteItem::for_read(Area::DataBlock, 1, 0, 1);
        let mut b = ByteItem::for_read(Area::DataBlock, 1, 1, 2);
        let items: Vec<&mut dyn DataItem> = vec![&mut a, &mut b];
        // item 0: header(4)+1 byte+1 pad = 6; item 1: header(4)+2 bytes = 6
        assert_eq!(response_payload_len(&items), 12);
    }

    #[test]
    fn rejects_batches_larger_than_255_items() {
        let mut items: Vec<BitItem> = (0u32..256)
            .map(|i| BitItem::new(Area::DataBlock, 1, i, 0, false))
            .collect();
        let refs: Vec<&mut dyn DataItem> = items
            .iter_mut()
            .map(|item| item as &mut dyn DataItem)
            .collect();
        assert!(matches!(
            assert_pdu_budget(&refs, 1024),
            Err(Error::TooManyItemsInOneRequest)
        ));
    }

    #[test]
    fn rejects_empty_batch() {
        let empty: Vec<&mut dyn DataItem> = Vec::new();
        assert!(matches!(
            assert_pdu_budget(&empty, 1024),
            Err(Error::TooManyItemsInOneRequest)
        ));
    }
}
