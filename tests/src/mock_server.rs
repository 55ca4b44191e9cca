//! A hand-rolled MySQL wire-protocol server for driving `client::Connection`
//! end to end without a real `mysqld`.
//!
//! Grounded on `connection/tests/integration_tests.rs` and the
//! fixture-driven harness in `binlog/src/row/parser_integration_test.rs`
//! (both spin up a stand-in server/byte stream and assert on what the
//! client produces); the packet bytes here are built independently of
//! `proto`/`client`'s own encoders so a bug shared between production code
//! and its test fixture can't hide a wire-format mistake from these tests.

use std::net::{TcpListener, TcpStream};
use std::thread::{self, JoinHandle};

use byteorder::{LittleEndian, WriteBytesExt};

use proto::{write_len_enc_bytes, write_len_enc_int, PacketFramer, DEFAULT_MAX_PACKET_SIZE};

/// Bits this harness needs out of the client capability flags (§4.C);
/// duplicated rather than imported since `client::capability_flags` is a
/// private module of the crate under test.
const CLIENT_PROTOCOL_41: u32 = 0x0000_0200;
const CLIENT_SECURE_CONNECTION: u32 = 0x0000_8000;
const CLIENT_PLUGIN_AUTH: u32 = 0x0008_0000;

pub const UTF8_GENERAL_CI: u8 = 33;
pub const AUTOCOMMIT: u16 = 0x0002;

/// One connection's worth of scripted server behaviour.
pub type ConnectionScript = Box<dyn FnOnce(PacketFramer<TcpStream>) + Send>;

/// Accepts connections on a loopback socket, one per entry in `scripts`,
/// running each to completion before accepting the next.
pub struct MockServer {
    pub host: String,
    pub port: u16,
    handle: Option<JoinHandle<()>>,
}

impl MockServer {
    pub fn start(scripts: Vec<ConnectionScript>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind mock server");
        let addr = listener.local_addr().expect("mock server local addr");
        let handle = thread::spawn(move || {
            for script in scripts {
                match listener.accept() {
                    Ok((stream, _)) => {
                        stream.set_nodelay(true).ok();
                        let framer = PacketFramer::new(stream, DEFAULT_MAX_PACKET_SIZE);
                        script(framer);
                    }
                    Err(_) => break,
                }
            }
        });
        Self {
            host: addr.ip().to_string(),
            port: addr.port(),
            handle: Some(handle),
        }
    }

    /// Blocks until every scripted connection has run to completion.
    pub fn join(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.join().expect("mock server thread panicked");
        }
    }
}

/// Runs the handshake half of a connection: sends Greeting v10 with
/// `thread_id`/`scramble`, reads the login packet (unexamined — none of
/// these scenarios test rejected credentials), and replies OK.
pub fn handshake(framer: &mut PacketFramer<TcpStream>, thread_id: u32, scramble: &[u8; 20]) {
    framer.start_command();
    framer.write_packet(&build_greeting(thread_id, scramble)).expect("write greeting");
    let _login = framer.read_packet().expect("read login packet");
    framer.write_packet(&build_ok_packet(0, 0, AUTOCOMMIT, 0, "")).expect("write login ok");
}

fn build_greeting(thread_id: u32, scramble: &[u8; 20]) -> Vec<u8> {
    let capabilities: u32 = CLIENT_PROTOCOL_41 | CLIENT_SECURE_CONNECTION | CLIENT_PLUGIN_AUTH;

    let mut buf = Vec::new();
    buf.push(10); // protocol version
    buf.extend_from_slice(b"8.0.34-mock");
    buf.push(0);
    buf.write_u32::<LittleEndian>(thread_id).unwrap();
    buf.extend_from_slice(&scramble[..8]);
    buf.push(0); // filler
    buf.write_u16::<LittleEndian>((capabilities & 0xFFFF) as u16).unwrap();
    buf.push(UTF8_GENERAL_CI);
    buf.write_u16::<LittleEndian>(AUTOCOMMIT).unwrap();
    buf.write_u16::<LittleEndian>((capabilities >> 16) as u16).unwrap();
    buf.push(21); // auth_plugin_data_len: 20-byte scramble + trailing NUL
    buf.extend_from_slice(&[0u8; 10]); // reserved
    buf.extend_from_slice(&scramble[8..20]);
    buf.push(0); // NUL terminating the scramble's second part
    buf.extend_from_slice(b"mysql_native_password");
    buf.push(0);
    buf
}

pub fn build_ok_packet(affected_rows: u64, last_insert_id: u64, status_flags: u16, warnings: u16, info: &str) -> Vec<u8> {
    let mut buf = vec![0x00];
    write_len_enc_int(&mut buf, affected_rows);
    write_len_enc_int(&mut buf, last_insert_id);
    buf.write_u16::<LittleEndian>(status_flags).unwrap();
    buf.write_u16::<LittleEndian>(warnings).unwrap();
    buf.extend_from_slice(info.as_bytes());
    buf
}

pub fn build_eof_packet(warnings: u16, status_flags: u16) -> Vec<u8> {
    let mut buf = vec![0xFE];
    buf.write_u16::<LittleEndian>(warnings).unwrap();
    buf.write_u16::<LittleEndian>(status_flags).unwrap();
    buf
}

/// One field descriptor packet (§3 "Field descriptor"), column/table
/// names left blank since none of these scenarios assert on them.
pub fn build_field_packet(name: &str, column_type: u8, flags: u16) -> Vec<u8> {
    let mut buf = Vec::new();
    write_len_enc_bytes(&mut buf, b"def");
    write_len_enc_bytes(&mut buf, b"");
    write_len_enc_bytes(&mut buf, b"");
    write_len_enc_bytes(&mut buf, b"");
    write_len_enc_bytes(&mut buf, name.as_bytes());
    write_len_enc_bytes(&mut buf, name.as_bytes());
    write_len_enc_int(&mut buf, 0x0c);
    buf.write_u16::<LittleEndian>(UTF8_GENERAL_CI as u16).unwrap();
    buf.write_u32::<LittleEndian>(11).unwrap();
    buf.push(column_type);
    buf.write_u16::<LittleEndian>(flags).unwrap();
    buf.push(0); // decimals
    buf.extend_from_slice(&[0, 0]); // filler
    buf
}

/// A text-protocol row: one length-encoded string per cell.
pub fn build_text_row(values: &[&str]) -> Vec<u8> {
    let mut buf = Vec::new();
    for v in values {
        write_len_enc_bytes(&mut buf, v.as_bytes());
    }
    buf
}

pub fn build_prepare_ok(statement_id: u32, column_count: u16, param_count: u16, warnings: u16) -> Vec<u8> {
    let mut buf = vec![0x00];
    buf.write_u32::<LittleEndian>(statement_id).unwrap();
    buf.write_u16::<LittleEndian>(column_count).unwrap();
    buf.write_u16::<LittleEndian>(param_count).unwrap();
    buf.push(0); // filler
    buf.write_u16::<LittleEndian>(warnings).unwrap();
    buf
}

/// A binary-protocol row with `field_count` columns, none of which are
/// null here (§4.E's null-bitmap offsets bits by 2; this harness never
/// needs to set any). `encode_values` appends each cell's per-type bytes
/// in column order.
pub fn build_binary_row(field_count: usize, encode_values: impl FnOnce(&mut Vec<u8>)) -> Vec<u8> {
    let mut buf = vec![0x00];
    let bitmap_len = (field_count + 2 + 7) / 8;
    buf.extend_from_slice(&vec![0u8; bitmap_len]);
    encode_values(&mut buf);
    buf
}
