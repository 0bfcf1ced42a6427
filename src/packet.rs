// Copyright 2026 The relaymeter Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::api::PacketId;
use crate::transport::Payload;
use anyhow::Error;
use anyhow::ensure;
use rand::Rng;

/// Size of the sequence header at the front of every test packet.
pub(crate) const SEQUENCE_HEADER_SIZE: usize = 2;

/// Control token confirming the reverse path before the data phase.
pub(crate) const START_TOKEN: &str = "START";

/// Control token signalling that every test packet was handed to the send primitive.
pub(crate) const END_TOKEN: &str = "END";

macro_rules! read_u16_le {
    ($buf: expr) => {
        u16::from_le_bytes($buf[..2].try_into().unwrap())
    };
}

macro_rules! write_u16_le {
    ($buf: expr, $n: expr) => {
        $buf[..2].copy_from_slice(&($n as u16).to_le_bytes());
    };
}

pub(crate) use read_u16_le;
pub(crate) use write_u16_le;

#[derive(Debug, PartialEq, thiserror::Error)]
pub(crate) enum PacketParseError {
    #[error("payload length does not match the configured packet size")]
    InvalidLength,
}

/// Test packet layout
///
/// ```txt
/// +----------------+--------------------------------+
/// | id (u16, LE)   | padding to packet_size bytes   |
/// +----------------+--------------------------------+
/// ```
///
/// The single reusable send buffer of a session. Only the sequence header changes between
/// packets; the padding is randomized once so that a compressing link cannot flatter the
/// measurement.
pub(crate) struct TestPacket {
    buf: Vec<u8>,
}

impl TestPacket {
    pub fn new(packet_size: usize) -> Self {
        debug_assert!(packet_size >= SEQUENCE_HEADER_SIZE);
        let mut buf = vec![0; packet_size];
        rand::rng().fill(&mut buf[SEQUENCE_HEADER_SIZE..]);
        Self { buf }
    }

    pub fn set_id(&mut self, id: PacketId) {
        write_u16_le!(&mut self.buf, id.0);
    }

    pub fn to_payload(&self) -> Payload {
        Payload::Binary(self.buf.clone())
    }
}

pub(crate) fn parse_packet_id(data: &[u8], packet_size: usize) -> Result<PacketId, Error> {
    ensure!(data.len() == packet_size, PacketParseError::InvalidLength);
    Ok(PacketId(read_u16_le!(data)))
}

/// A received payload, classified by size and content.
#[derive(Debug, PartialEq)]
pub(crate) enum Inbound {
    /// A test packet of exactly the configured size.
    Data(PacketId),
    Start,
    End,
    /// Anything else; a protocol violation on this channel.
    Unexpected,
}

pub(crate) fn classify(payload: &Payload, packet_size: usize) -> Inbound {
    match payload {
        Payload::Binary(data) => match parse_packet_id(data, packet_size) {
            Ok(id) => Inbound::Data(id),
            Err(_) => Inbound::Unexpected,
        },
        Payload::Text(token) if token == START_TOKEN => Inbound::Start,
        Payload::Text(token) if token == END_TOKEN => Inbound::End,
        Payload::Text(_) => Inbound::Unexpected,
    }
}
