use std::mem;
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use tracing::{debug, instrument};

use super::iso::{COTPConnection, COTPData, CoTp, IsoControlPDU, TTPKTHeader};
use crate::config::INITIAL_PDU_SIZE_HINT;
use crate::connection::iso::{COTPDisconnect, IsoDisconnect};
use crate::errors::{Error, IsoError};
use crate::s7_protocol::negotiate::{NegotiatePDUParameters, S7Negotiation};
use crate::S7Types;

const DATA_SEND_AND_RECEIVE_TIMEOUT: Duration = Duration::from_secs(4);

/// Open the TCP-level connection request and ISO-on-TCP (COTP) handshake,
/// then negotiate PDU parameters. Returns the negotiated parameters; the
/// caller is responsible for handing the connection off to an
/// [`crate::executor::Executor`] afterwards.
#[instrument(skip(tcp_client), fields(s7_type = ?s7_type))]
pub(crate) async fn connect(
    tcp_client: &mut TcpStream,
    s7_type: S7Types,
    pdu_length_requested: u16,
) -> Result<NegotiatePDUParameters, Error> {
    let iso: Vec<u8> = IsoControlPDU::build(INITIAL_PDU_SIZE_HINT, s7_type).into();
    tcp_client.write_all(&iso).await?;
    debug!("sent COTP connection request");

    let packet_header = read_tpkt_header(tcp_client).await?;
    let mut tpkt_data = read_tpkt_data(tcp_client, packet_header.length).await?;

    let cotp_connection = COTPConnection::try_from(&mut tpkt_data)?;
    cotp_connection.req_ok()?;
    debug!("COTP connection confirmed");

    negotiate_connection_params(tcp_client, pdu_length_requested).await
}

/// Build the ISO disconnect request frame. The caller sends it through
/// whatever transport it currently holds (raw socket before negotiation, the
/// executor's write half afterwards) and tears the connection down without
/// waiting for the COTP disconnect confirm.
pub(crate) fn build_disconnect_frame() -> BytesMut {
    let bytes: Vec<u8> = IsoDisconnect::build().into();
    BytesMut::from(&bytes[..])
}

#[instrument(skip(conn))]
pub(crate) async fn negotiate_connection_params(
    conn: &mut TcpStream,
    pdu_length_requested: u16,
) -> Result<NegotiatePDUParameters, Error> {
    let negotiation = BytesMut::from(S7Negotiation::build(0, pdu_length_requested));
    let mut exchanged_data = exchange_buffer(conn, &negotiation).await?;

    use crate::s7_protocol::header::S7Header;
    S7Header::try_from(&mut exchanged_data)?.is_ack_data()?;
    let params = NegotiatePDUParameters::try_from(&mut exchanged_data)?;
    debug!(
        pdu_size = params.pdu_length,
        max_amq_called = params.max_amq_called,
        "communication setup negotiated"
    );
    Ok(params)
}

/// Wrap `payload` (an S7 header + parameters + data block) in a TPKT +
/// COTP-DT frame and write it to `conn`.
pub(crate) async fn write_framed<W: AsyncWrite + Unpin>(
    conn: &mut W,
    payload: &[u8],
) -> Result<(), Error> {
    let iso_len = usize::from(TTPKTHeader::len()) + usize::from(COTPData::len()) + payload.len();
    let tpkt_header = TTPKTHeader::build(iso_len as u16);
    let cotp = COTPData::build();

    let mut bytes = BytesMut::with_capacity(iso_len);
    bytes.extend_from_slice(&BytesMut::from(tpkt_header));
    bytes.extend_from_slice(&BytesMut::from(cotp));
    bytes.extend_from_slice(payload);

    conn.write_all(&bytes).await?;
    Ok(())
}

/// Read one (possibly fragmented across multiple COTP-DT PDUs) S7 message
/// and return its payload with the TPKT/COTP framing stripped.
pub(crate) async fn read_one_frame<R: AsyncRead + Unpin>(conn: &mut R) -> Result<BytesMut, Error> {
    let mut bytes = BytesMut::new();
    let mut is_last = false;

    while !is_last {
        let header = read_tpkt_header(conn).await?;
        let mut iso_cotp_data = read_tpkt_data(conn, header.length).await?;
        let cotp = COTPData::try_from(&mut iso_cotp_data)?;

        cotp.req_ok()?;
        bytes.extend_from_slice(&iso_cotp_data);
        is_last = cotp.is_last();
    }

    Ok(bytes)
}

pub(crate) async fn exchange_buffer(conn: &mut TcpStream, data: &[u8]) -> Result<BytesMut, Error> {
    match timeout(DATA_SEND_AND_RECEIVE_TIMEOUT, write_framed(conn, data)).await {
        Ok(result) => result?,
        Err(_) => return Err(Error::DataExchangeTimedOut),
    };

    match timeout(DATA_SEND_AND_RECEIVE_TIMEOUT, read_one_frame(conn)).await {
        Ok(data) => Ok(data?),
        Err(_) => Err(Error::DataExchangeTimedOut),
    }
}

async fn read_tpkt_header<R: AsyncRead + Unpin>(conn: &mut R) -> Result<TTPKTHeader, Error> {
    let mut data = BytesMut::with_capacity(mem::size_of::<TTPKTHeader>());
    conn.read_buf(&mut data).await?;
    TTPKTHeader::try_from(&mut data)
}

async fn read_tpkt_data<R: AsyncRead + Unpin>(conn: &mut R, length: u16) -> Result<BytesMut, Error> {
    let mut data = BytesMut::with_capacity(length as usize - mem::size_of::<TTPKTHeader>());

    match conn.read_buf(&mut data).await {
        Ok(_) => Ok(data),
        Err(_) => Err(Error::ISOResponse(IsoError::InvalidDataSize)),
    }
}
