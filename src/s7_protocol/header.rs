use bytes::{Buf, BufMut, BytesMut};

use crate::errors::Error;

/// Constant `protocol_id` byte every S7 header starts with.
const PROTOCOL_ID: u8 = 0x32;

/// Job request sent by the client.
pub(crate) const MESSAGE_TYPE_JOB_REQUEST: u8 = 1;
/// Acknowledgement with data, sent by the PLC.
pub(crate) const MESSAGE_TYPE_ACK_DATA: u8 = 3;

/// Fixed size of a job-request header (no error bytes).
const REQUEST_HEADER_LEN: usize = 10;
/// Fixed size of an ack-data header (includes the 2 error bytes).
const ACK_HEADER_LEN: usize = 12;

/// Offset of the S7 header's own `pdu_reference` field, relative to the
/// start of the header itself (spec.md §4.3: "S7 header byte 4").
pub(crate) const PDU_REFERENCE_OFFSET_IN_HEADER: usize = 4;

/// S7 header framing every job request or ack-data message (spec.md §3).
#[derive(Debug, Clone, Copy)]
pub(crate) struct S7Header {
    message_type: u8,
    pdu_reference: u16,
    parameter_length: u16,
    data_length: u16,
    /// `(error_class, error_code)`, present only on ack-data headers.
    error: Option<(u8, u8)>,
}

impl S7Header {
    /// Build a job-request header. The caller fills in `pdu_reference`
    /// later (the executor patches it at a known byte offset).
    pub(crate) fn build_request(
        pdu_reference: u16,
        parameter_length: u16,
        data_length: u16,
    ) -> Self {
        Self {
            message_type: MESSAGE_TYPE_JOB_REQUEST,
            pdu_reference,
            parameter_length,
            data_length,
            error: None,
        }
    }

    pub(crate) fn pdu_reference(&self) -> u16 {
        self.pdu_reference
    }

    pub(crate) fn parameter_length(&self) -> u16 {
        self.parameter_length
    }

    pub(crate) fn data_length(&self) -> u16 {
        self.data_length
    }

    /// Size this header occupies on the wire (10 for a job, 12 for an ack).
    pub(crate) fn wire_len(&self) -> usize {
        if self.error.is_some() {
            ACK_HEADER_LEN
        } else {
            REQUEST_HEADER_LEN
        }
    }

    pub(crate) fn is_ack_data(&self) -> Result<&Self, Error> {
        if self.message_type == MESSAGE_TYPE_ACK_DATA {
            Ok(self)
        } else {
            Err(Error::UnexpectedMessageType {
                expected: MESSAGE_TYPE_ACK_DATA,
                got: self.message_type,
            })
        }
    }

    pub(crate) fn matches_reference(&self, expected: u16) -> Result<&Self, Error> {
        if self.pdu_reference == expected {
            Ok(self)
        } else {
            Err(Error::ResponseDoesNotBelongToCurrentPDU)
        }
    }

    /// `true` if the ack carries a non-zero error class or code.
    pub(crate) fn has_error(&self) -> bool {
        matches!(self.error, Some((class, code)) if class != 0 || code != 0)
    }

    pub(crate) fn error_codes(&self) -> (Option<u8>, Option<u8>) {
        match self.error {
            Some((class, code)) => (Some(class), Some(code)),
            None => (None, None),
        }
    }
}

impl TryFrom<&mut BytesMut> for S7Header {
    type Error = Error;

    fn try_from(bytes: &mut BytesMut) -> Result<Self, Self::Error> {
        if bytes.len() < REQUEST_HEADER_LEN {
            return Err(Error::PartialRead);
        }

        let protocol_id = bytes.get_u8();
        if protocol_id != PROTOCOL_ID {
            return Err(Error::FramingError(format!(
                "expected S7 protocol id {PROTOCOL_ID:#04x}, got {protocol_id:#04x}"
            )));
        }

        let message_type = bytes.get_u8();
        let _reserved = bytes.get_u16();
        let pdu_reference = bytes.get_u16();
        let parameter_length = bytes.get_u16();
        let data_length = bytes.get_u16();

        let error = if message_type == MESSAGE_TYPE_ACK_DATA {
            if bytes.len() < ACK_HEADER_LEN - REQUEST_HEADER_LEN {
                return Err(Error::PartialRead);
            }
            Some((bytes.get_u8(), bytes.get_u8()))
        } else {
            None
        };

        Ok(Self {
            message_type,
            pdu_reference,
            parameter_length,
            data_length,
            error,
        })
    }
}

impl From<S7Header> for BytesMut {
    fn from(header: S7Header) -> BytesMut {
        let mut bytes = BytesMut::with_capacity(header.wire_len());
        bytes.put_u8(PROTOCOL_ID);
        bytes.put_u8(header.message_type);
        bytes.put_u16(0); // reserved
        bytes.put_u16(header.pdu_reference);
        bytes.put_u16(header.parameter_length);
        bytes.put_u16(header.data_length);
        if let Some((class, code)) = header.error {
            bytes.put_u8(class);
            bytes.put_u8(code);
        }
        bytes
    }
}

/// Overwrite the `pdu_reference` field of an already-encoded frame in
/// place. `s7_header_offset` is the byte offset of the S7 header within
/// `frame` (TPKT + COTP-DT overhead, normally 7 bytes for a data frame).
pub(crate) fn patch_pdu_reference(frame: &mut [u8], s7_header_offset: usize, pdu_reference: u16) {
    let at = s7_header_offset + PDU_REFERENCE_OFFSET_IN_HEADER;
    frame[at..at + 2].copy_from_slice(&pdu_reference.to_be_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_job_request() {
        let header = S7Header::build_request(7, 8, 0);
        let mut bytes = BytesMut::from(header);
        assert_eq!(bytes.len(), REQUEST_HEADER_LEN);

        let parsed = S7Header::try_from(&mut bytes).unwrap();
        assert_eq!(parsed.pdu_reference(), 7);
        assert_eq!(parsed.parameter_length(), 8);
        assert_eq!(parsed.data_length(), 0);
    }

    #[test]
    fn patches_reference_at_byte_four_of_header() {
        let header = S7Header::build_request(0, 8, 0);
        let encoded = BytesMut::from(header);

        // Simulate the TPKT(4) + COTP-DT(3) prefix that precedes the header
        // on the wire.
        let mut frame = vec![0u8; 7];
        frame.extend_from_slice(&encoded);

        patch_pdu_reference(&mut frame, 7, 0x1234);
        assert_eq!(&frame[7 + PDU_REFERENCE_OFFSET_IN_HEADER..7 + PDU_REFERENCE_OFFSET_IN_HEADER + 2], &[0x12, 0x34]);
    }

    #[test]
    fn rejects_wrong_protocol_id() {
        let mut bytes = BytesMut::from(&[0x31u8, 1, 0, 0, 0, 1, 0, 8, 0, 0][..]);
        assert!(matches!(
            S7Header::try_from(&mut bytes),
            Err(Error::FramingError(_))
        ));
    }
}
