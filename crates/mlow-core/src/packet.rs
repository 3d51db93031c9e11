//! Packet framing
//!
//! ```text
//! 0      START_MARKER (0xA5)
//! 1      bitrate_sel << 4 | bandwidth_sel << 2 | policy << 1 | fec
//! 2..4   sequence number, big endian
//! 4..6   payload length, big endian
//! 6..    range coded payload
//!        [fec] redundancy length (u16 BE) + redundancy bytes
//! last   END_MARKER (0x5A)
//! ```
//!
//! The redundancy section is an opaque hook for forward error correction;
//! decoders skip it.

use crate::error::{CodecError, Result};
use crate::types::ModelPolicy;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// First byte of every packet
pub const START_MARKER: u8 = 0xA5;
/// Last byte of every packet
pub const END_MARKER: u8 = 0x5A;
/// Bytes before the payload
pub const HEADER_SIZE: usize = 6;
/// Smallest possible packet: header, empty payload, end marker
pub const MIN_PACKET_SIZE: usize = HEADER_SIZE + 1;

/// Fixed header fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub bitrate_sel: u8,
    pub bandwidth_sel: u8,
    pub policy: ModelPolicy,
    pub fec: bool,
    pub sequence: u16,
}

impl PacketHeader {
    /// Pack the configuration byte
    pub fn config_byte(&self) -> u8 {
        (self.bitrate_sel & 0x0F) << 4
            | (self.bandwidth_sel & 0x03) << 2
            | self.policy.bit() << 1
            | u8::from(self.fec)
    }

    /// Unpack the configuration byte
    pub fn from_config_byte(byte: u8, sequence: u16) -> Self {
        Self {
            bitrate_sel: byte >> 4,
            bandwidth_sel: (byte >> 2) & 0x03,
            policy: ModelPolicy::from_bit((byte >> 1) & 1),
            fec: byte & 1 == 1,
            sequence,
        }
    }
}

/// One byte on the packet bus with its delimiter flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketByte {
    pub data: u8,
    /// First byte of a packet
    pub start: bool,
    /// Last byte of a packet
    pub end: bool,
}

/// An encoded frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    header: PacketHeader,
    payload: Bytes,
    redundancy: Option<Bytes>,
}

impl Packet {
    /// Create a packet without redundancy
    pub fn new(mut header: PacketHeader, payload: impl Into<Bytes>) -> Self {
        header.fec = false;
        Self {
            header,
            payload: payload.into(),
            redundancy: None,
        }
    }

    /// Attach opaque redundancy bytes and set the FEC flag
    pub fn with_redundancy(mut self, redundancy: impl Into<Bytes>) -> Self {
        self.header.fec = true;
        self.redundancy = Some(redundancy.into());
        self
    }

    /// Header fields
    pub fn header(&self) -> &PacketHeader {
        &self.header
    }

    /// Range coded payload
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Redundancy section, if present
    pub fn redundancy(&self) -> Option<&Bytes> {
        self.redundancy.as_ref()
    }

    /// Size of the serialized packet
    pub fn encoded_len(&self) -> usize {
        HEADER_SIZE
            + self.payload.len()
            + self.redundancy.as_ref().map_or(0, |r| 2 + r.len())
            + 1
    }

    /// Serialize, markers included
    pub fn to_bytes(&self) -> Result<Bytes> {
        let payload_len = u16::try_from(self.payload.len()).map_err(|_| {
            CodecError::internal_error(format!("payload of {} bytes", self.payload.len()))
        })?;

        let mut buf = BytesMut::with_capacity(self.encoded_len());
        buf.put_u8(START_MARKER);
        buf.put_u8(self.header.config_byte());
        buf.put_u16(self.header.sequence);
        buf.put_u16(payload_len);
        buf.put_slice(&self.payload);
        if let Some(redundancy) = &self.redundancy {
            let len = u16::try_from(redundancy.len()).map_err(|_| {
                CodecError::internal_error(format!("redundancy of {} bytes", redundancy.len()))
            })?;
            buf.put_u16(len);
            buf.put_slice(redundancy);
        }
        buf.put_u8(END_MARKER);
        Ok(buf.freeze())
    }

    /// Parse exactly one packet occupying all of `data`
    pub fn parse(data: &[u8]) -> Result<Self> {
        let (packet, used) = Self::parse_prefix(data)?;
        if used != data.len() {
            return Err(CodecError::malformed_bitstream(format!(
                "{} trailing bytes after end marker",
                data.len() - used
            )));
        }
        Ok(packet)
    }

    /// Parse the packet at the start of `data`, returning it and its size
    pub fn parse_prefix(data: &[u8]) -> Result<(Self, usize)> {
        if data.len() < MIN_PACKET_SIZE {
            return Err(CodecError::malformed_bitstream(format!(
                "packet of {} bytes is shorter than the {} byte minimum",
                data.len(),
                MIN_PACKET_SIZE
            )));
        }

        let mut cursor = data;
        if cursor.get_u8() != START_MARKER {
            return Err(CodecError::malformed_bitstream("missing start marker"));
        }
        let config = cursor.get_u8();
        let sequence = cursor.get_u16();
        let payload_len = usize::from(cursor.get_u16());

        if cursor.remaining() < payload_len + 1 {
            return Err(CodecError::malformed_bitstream(format!(
                "payload length {} exceeds the {} bytes available",
                payload_len,
                cursor.remaining().saturating_sub(1)
            )));
        }
        let payload = Bytes::copy_from_slice(&cursor[..payload_len]);
        cursor.advance(payload_len);

        let header = PacketHeader::from_config_byte(config, sequence);
        let redundancy = if header.fec {
            if cursor.remaining() < 3 {
                return Err(CodecError::malformed_bitstream("truncated redundancy length"));
            }
            let len = usize::from(cursor.get_u16());
            if cursor.remaining() < len + 1 {
                return Err(CodecError::malformed_bitstream("truncated redundancy section"));
            }
            let section = Bytes::copy_from_slice(&cursor[..len]);
            cursor.advance(len);
            Some(section)
        } else {
            None
        };

        if cursor.get_u8() != END_MARKER {
            return Err(CodecError::malformed_bitstream("missing end marker"));
        }

        let used = data.len() - cursor.remaining();
        Ok((
            Self {
                header,
                payload,
                redundancy,
            },
            used,
        ))
    }

    /// Serialized bytes tagged with start/end flags, for byte-wise transfer
    pub fn framed_bytes(&self) -> Result<Vec<PacketByte>> {
        Ok(frame_bytes(&self.to_bytes()?))
    }
}

/// Tag a serialized packet's bytes with start/end flags
pub fn frame_bytes(data: &[u8]) -> Vec<PacketByte> {
    let last = data.len().saturating_sub(1);
    data.iter()
        .enumerate()
        .map(|(i, &b)| PacketByte {
            data: b,
            start: i == 0,
            end: i == last,
        })
        .collect()
}

/// Split a byte stream of back-to-back packets
pub fn split_stream(mut data: &[u8]) -> Result<Vec<Packet>> {
    let mut packets = Vec::new();
    while !data.is_empty() {
        let (packet, used) = Packet::parse_prefix(data)?;
        packets.push(packet);
        data = &data[used..];
    }
    Ok(packets)
}
