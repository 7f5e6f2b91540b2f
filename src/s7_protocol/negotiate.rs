//! Communication Setup: negotiates PDU size and job concurrency with the PLC.

use bytes::{Buf, BufMut, BytesMut};

use crate::errors::Error;

use super::header::S7Header;

const NEGOTIATE_FUNCTION_CODE: u8 = 0xf0;
const NEGOTIATE_PARAMS_LEN: u16 = 8;

/// A Communication Setup job request: S7 header + negotiation parameters.
#[derive(Debug)]
pub(crate) struct S7Negotiation {
    header: S7Header,
    params: NegotiatePDUParameters,
}

impl S7Negotiation {
    pub(crate) fn build(pdu_reference: u16, pdu_length_requested: u16) -> Self {
        Self {
            header: S7Header::build_request(pdu_reference, NEGOTIATE_PARAMS_LEN, 0),
            params: NegotiatePDUParameters::build(pdu_length_requested),
        }
    }
}

impl From<S7Negotiation> for BytesMut {
    fn from(negotiation: S7Negotiation) -> BytesMut {
        let mut bytes = BytesMut::with_capacity(10 + NEGOTIATE_PARAMS_LEN as usize);
        bytes.put(BytesMut::from(negotiation.header));
        bytes.put(BytesMut::from(negotiation.params));
        bytes
    }
}

/// Negotiated (request or response) Communication Setup parameters.
#[derive(Debug, Clone, Copy)]
pub(crate) struct NegotiatePDUParameters {
    function_code: u8,
    reserved: u8,
    /// Max outstanding requests the client is willing to accept from the
    /// PLC ("calling" = us).
    pub(crate) max_amq_calling: u16,
    /// Max outstanding requests the PLC is willing to accept from us
    /// ("called" = the PLC); used as `max_concurrent_jobs`.
    pub(crate) max_amq_called: u16,
    pub(crate) pdu_length: u16,
}

impl NegotiatePDUParameters {
    pub(crate) fn build(pdu_length_requested: u16) -> Self {
        Self {
            function_code: NEGOTIATE_FUNCTION_CODE,
            reserved: 0,
            max_amq_calling: 1,
            max_amq_called: 1,
            pdu_length: pdu_length_requested,
        }
    }
}

impl From<NegotiatePDUParameters> for BytesMut {
    fn from(params: NegotiatePDUParameters) -> BytesMut {
        let mut bytes = BytesMut::with_capacity(NEGOTIATE_PARAMS_LEN as usize);
        bytes.put_u8(params.function_code);
        bytes.put_u8(params.reserved);
        bytes.put_u16(params.max_amq_calling);
        bytes.put_u16(params.max_amq_called);
        bytes.put_u16(params.pdu_length);
        bytes
    }
}

impl TryFrom<&mut BytesMut> for NegotiatePDUParameters {
    type Error = Error;

    fn try_from(bytes: &mut BytesMut) -> Result<Self, Self::Error> {
        if bytes.len() < NEGOTIATE_PARAMS_LEN as usize {
            return Err(Error::PartialRead);
        }

        let function_code = bytes.get_u8();
        if function_code != NEGOTIATE_FUNCTION_CODE {
            return Err(Error::UnexpectedFunctionCode {
                expected: NEGOTIATE_FUNCTION_CODE,
                got: function_code,
            });
        }

        Ok(Self {
            function_code,
            reserved: bytes.get_u8(),
            max_amq_calling: bytes.get_u16(),
            max_amq_called: bytes.get_u16(),
            pdu_length: bytes.get_u16(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_scenario_a_request() {
        let negotiation = S7Negotiation::build(0, 1920);
        let bytes = BytesMut::from(negotiation);
        assert_eq!(
            &bytes[..],
            &[
                0x32, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x08, 0x00, 0x00, 0xF0, 0x00, 0x00,
                0x01, 0x00, 0x01, 0x07, 0x80,
            ]
        );
    }

    #[test]
    fn parses_negotiated_response() {
        let mut bytes = BytesMut::from(&[0xF0u8, 0x00, 0x00, 0x01, 0x00, 0x08, 0x04, 0x00][..]);
        let params = NegotiatePDUParameters::try_from(&mut bytes).unwrap();
        assert_eq!(params.max_amq_called, 8);
        assert_eq!(params.pdu_length, 1024);
    }
}
