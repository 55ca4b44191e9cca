//! Packet framer (component A): length-prefixed packets with a rolling
//! sequence byte, fragmenting oversized payloads on write and
//! defragmenting them on read.
//!
//! Grounded on `connection::conn::packet_channel::PacketChannel` in the
//! teacher repo, generalised from a fixed `TcpStream` to any blocking
//! `Read + Write` transport and extended with the fragmentation the
//! teacher's version did not implement.

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{ProtoError, ProtoResult};

/// Header size: 3-byte little-endian length + 1-byte sequence number.
pub const PACKET_HEADER_SIZE: usize = 4;

/// Hard ceiling imposed by the 3-byte length field itself.
pub const MAX_BODY_LENGTH: usize = 0x00FF_FFFF;

/// Default `max_pkt_size`, per spec.md §3: 16 * 2^20 - 1.
pub const DEFAULT_MAX_PACKET_SIZE: u32 = 16 * 1024 * 1024 - 1;

/// Frames packets over a single blocking duplex stream.
///
/// One `PacketFramer` wraps exactly one connection's transport. The
/// sequence counter is reset to 0 at the start of every command (see
/// `start_command`) and mirrors whatever the server does: each packet
/// sent or received advances it by one, and a mismatch on read is fatal.
#[derive(Debug)]
pub struct PacketFramer<S> {
    stream: S,
    seq: u8,
    max_pkt_size: u32,
}

impl<S> PacketFramer<S>
where
    S: Read + Write,
{
    pub fn new(stream: S, max_pkt_size: u32) -> Self {
        Self {
            stream,
            seq: 0,
            max_pkt_size,
        }
    }

    pub fn max_packet_size(&self) -> u32 {
        self.max_pkt_size
    }

    pub fn set_max_packet_size(&mut self, size: u32) -> u32 {
        std::mem::replace(&mut self.max_pkt_size, size)
    }

    /// Resets the sequence counter. Every command starts a fresh
    /// conversation at sequence 0 (spec.md §3 invariant).
    pub fn start_command(&mut self) {
        self.seq = 0;
    }

    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    pub fn get_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    pub fn into_inner(self) -> S {
        self.stream
    }

    fn fragment_size(&self) -> usize {
        (self.max_pkt_size as usize).saturating_sub(1).max(1)
    }

    /// Writes one logical packet, splitting it into full-size fragments
    /// if it exceeds `max_pkt_size - 1` bytes. A final short fragment
    /// (possibly empty, when the payload is an exact multiple of the
    /// fragment size) signals the end of the message to the reader.
    pub fn write_packet(&mut self, payload: &[u8]) -> ProtoResult<()> {
        let fragment_size = self.fragment_size();
        let mut offset = 0;
        loop {
            let remaining = payload.len() - offset;
            let chunk_len = remaining.min(fragment_size);
            let chunk = &payload[offset..offset + chunk_len];
            self.write_one(chunk)?;
            offset += chunk_len;

            if chunk_len < fragment_size {
                // Short fragment: always terminates, including the
                // degenerate empty-payload case.
                break;
            }
            if offset == payload.len() {
                // Payload was an exact multiple of fragment_size: an
                // empty fragment must still be sent to signal the end.
                self.write_one(&[])?;
                break;
            }
        }
        Ok(())
    }

    fn write_one(&mut self, chunk: &[u8]) -> ProtoResult<()> {
        if chunk.len() > MAX_BODY_LENGTH {
            return Err(ProtoError::BadLengthEncoding("packet body exceeds 3-byte length field"));
        }
        self.stream.write_u24::<LittleEndian>(chunk.len() as u32)?;
        self.stream.write_u8(self.seq)?;
        self.stream.write_all(chunk)?;
        self.stream.flush()?;
        self.seq = self.seq.wrapping_add(1);
        Ok(())
    }

    /// Reads one logical packet, concatenating successive fragments
    /// whose length equals the fragment ceiling until a short (or
    /// empty) fragment appears.
    pub fn read_packet(&mut self) -> ProtoResult<Vec<u8>> {
        let fragment_size = self.fragment_size();
        let mut payload = Vec::new();
        loop {
            let chunk = self.read_one()?;
            let chunk_len = chunk.len();
            payload.extend_from_slice(&chunk);
            if chunk_len < fragment_size {
                break;
            }
        }
        Ok(payload)
    }

    fn read_one(&mut self) -> ProtoResult<Vec<u8>> {
        let mut header = [0u8; PACKET_HEADER_SIZE];
        self.stream.read_exact(&mut header)?;
        let body_len = (&header[0..3]).read_u24::<LittleEndian>()? as usize;
        let seq = header[3];

        if seq != self.seq {
            return Err(ProtoError::Desync {
                expected: self.seq,
                got: seq,
            });
        }
        self.seq = self.seq.wrapping_add(1);

        let mut body = vec![0u8; body_len];
        self.stream.read_exact(&mut body)?;
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// A `Read + Write` mock that serves pre-recorded packet bytes on
    /// read and swallows writes into a buffer for inspection.
    struct MockStream {
        input: Cursor<Vec<u8>>,
        output: Vec<u8>,
    }

    impl MockStream {
        fn new(input: Vec<u8>) -> Self {
            Self {
                input: Cursor::new(input),
                output: Vec::new(),
            }
        }
    }

    impl Read for MockStream {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for MockStream {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.output.write(buf)
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn single_packet_round_trip() {
        let mut framer = PacketFramer::new(MockStream::new(Vec::new()), DEFAULT_MAX_PACKET_SIZE);
        framer.write_packet(b"hello").unwrap();
        let written = framer.get_ref().output.clone();

        let mut reader = PacketFramer::new(MockStream::new(written), DEFAULT_MAX_PACKET_SIZE);
        let got = reader.read_packet().unwrap();
        assert_eq!(got, b"hello");
    }

    #[test]
    fn sequence_increments_across_packets() {
        let mut framer = PacketFramer::new(MockStream::new(Vec::new()), DEFAULT_MAX_PACKET_SIZE);
        framer.write_packet(b"a").unwrap();
        framer.write_packet(b"b").unwrap();
        let written = framer.get_ref().output.clone();
        // second packet's sequence byte is 1
        assert_eq!(written[PACKET_HEADER_SIZE + 1 + 3], 1);
    }

    #[test]
    fn desync_is_fatal() {
        // fabricate a packet whose sequence byte is wrong
        let bytes = vec![1, 0, 0, 5, b'x'];
        let mut reader = PacketFramer::new(MockStream::new(bytes), DEFAULT_MAX_PACKET_SIZE);
        let err = reader.read_packet().unwrap_err();
        assert!(matches!(err, ProtoError::Desync { expected: 0, got: 5 }));
    }

    #[test]
    fn fragmentation_round_trip() {
        let max_pkt_size = 8u32; // fragment_size = 7
        let payload = vec![7u8; 20];

        let mut writer = PacketFramer::new(MockStream::new(Vec::new()), max_pkt_size);
        writer.write_packet(&payload).unwrap();
        let written = writer.get_ref().output.clone();

        let mut reader = PacketFramer::new(MockStream::new(written), max_pkt_size);
        let got = reader.read_packet().unwrap();
        assert_eq!(got, payload);
    }

    #[test]
    fn fragmentation_exact_multiple_sends_empty_terminator() {
        let max_pkt_size = 4u32; // fragment_size = 3
        let payload = vec![1u8; 6]; // exactly 2 full fragments

        let mut writer = PacketFramer::new(MockStream::new(Vec::new()), max_pkt_size);
        writer.write_packet(&payload).unwrap();
        let written = writer.get_ref().output.clone();

        // 2 fragments of 3 bytes + 1 empty terminator = 3 packets
        let mut reader = PacketFramer::new(MockStream::new(written), max_pkt_size);
        let got = reader.read_packet().unwrap();
        assert_eq!(got, payload);
        assert_eq!(reader.seq, 3);
    }
}
