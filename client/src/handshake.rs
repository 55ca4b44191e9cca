//! Handshake & auth (component C, §4.C).
//!
//! Grounded on `connection::packet::handshake_packet` (greeting layout)
//! and `connection::conn::connection::Connection::do_handshake` (scramble
//! computation), reduced to a blocking, non-SSL transport and
//! restructured as free functions plus a small `Greeting` value type
//! rather than methods scattered across `Connection`. Per spec.md §4.C,
//! the login response accepts only OK — this crate negotiates
//! `mysql_native_password` alone and fails the connection on anything
//! else, so `caching_sha2_password`/AUTH_SWITCH/RSA public-key exchange
//! has no counterpart here.

use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use sha1::Sha1;

use proto::{read_fixed_string, read_null_term_string, write_null_term_string, NULL_TERMINATOR};

use crate::capability_flags::{self, BASE_CLIENT_FLAGS};
use crate::error::{Error, Result};

pub const MYSQL_NATIVE_PASSWORD: &str = "mysql_native_password";

/// Collation id 33 (utf8_general_ci), per spec.md §4.C.
pub const UTF8_GENERAL_CI: u8 = 33;

/// The server's initial Greeting v10 packet.
#[derive(Debug, Clone)]
pub struct Greeting {
    pub protocol_version: u8,
    pub server_version: String,
    pub thread_id: u32,
    pub scramble: Vec<u8>,
    pub capability_flags: u32,
    pub server_collation: u8,
    pub status_flags: u16,
    pub auth_plugin_name: String,
}

/// Parses Greeting v10 per spec.md §4.C: protocol version, server
/// version string, thread id, first eight scramble bytes, capability
/// flags low word, default collation, server status, capability flags
/// high word (ignored), scramble-length byte, remaining scramble bytes.
/// The scramble is the first 20 bytes total, trimmed of a trailing NUL.
pub fn parse_greeting(packet: &[u8]) -> Result<Greeting> {
    let mut cursor = Cursor::new(packet);
    let protocol_version = cursor.read_u8()?;
    if protocol_version != 10 {
        return Err(Error::UnsupportedProtocol(format!(
            "protocol version {protocol_version}, only version 10 is supported"
        )));
    }

    let server_version = read_null_term_string(&mut cursor)?;
    let thread_id = cursor.read_u32::<LittleEndian>()?;

    let mut scramble = Vec::with_capacity(20);
    let mut first_part = [0u8; 8];
    std::io::Read::read_exact(&mut cursor, &mut first_part)?;
    scramble.extend_from_slice(&first_part);
    let _filler = cursor.read_u8()?; // 0x00

    let capabilities_low = cursor.read_u16::<LittleEndian>()? as u32;
    let server_collation = cursor.read_u8()?;
    let status_flags = cursor.read_u16::<LittleEndian>()?;
    let capabilities_high = cursor.read_u16::<LittleEndian>()? as u32;
    let capability_flags = capabilities_low | (capabilities_high << 16);

    let auth_plugin_data_len = cursor.read_u8()?;
    // 10 reserved bytes.
    let mut reserved = [0u8; 10];
    std::io::Read::read_exact(&mut cursor, &mut reserved)?;

    let remaining_len = (auth_plugin_data_len as usize).saturating_sub(8).max(13);
    let rest = read_fixed_string(&mut cursor, remaining_len)?;
    scramble.extend_from_slice(rest.as_bytes());
    scramble.truncate(20);
    while scramble.last() == Some(&0) {
        scramble.pop();
    }

    let auth_plugin_name = if capability_flags & capability_flags::CLIENT_PLUGIN_AUTH as u32 != 0 {
        read_null_term_string(&mut cursor).unwrap_or_default()
    } else {
        MYSQL_NATIVE_PASSWORD.to_string()
    };

    Ok(Greeting {
        protocol_version,
        server_version,
        thread_id,
        scramble,
        capability_flags,
        server_collation,
        status_flags,
        auth_plugin_name,
    })
}

fn sha1(data: &[u8]) -> Vec<u8> {
    let mut hasher = Sha1::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}

fn xor(a: &[u8], b: &[u8]) -> Vec<u8> {
    a.iter().enumerate().map(|(i, byte)| byte ^ b[i % b.len()]).collect()
}

/// `SHA1(pw) XOR SHA1(scramble || SHA1(SHA1(pw)))`, per spec.md §4.C.
/// Returns an empty vector for an empty password.
pub fn scramble_native_password(password: &str, scramble: &[u8]) -> Vec<u8> {
    if password.is_empty() {
        return Vec::new();
    }
    let stage1 = sha1(password.as_bytes());
    let stage2 = sha1(&stage1);
    let concat = [scramble, &stage2].concat();
    xor(&stage1, &sha1(&concat))
}

/// Builds the handshake response (login) packet described in spec.md
/// §4.C. `auth_plugin_name`, when set, additionally sets
/// `CLIENT_PLUGIN_AUTH` and appends the plugin name; this crate always
/// passes `None` since it negotiates `mysql_native_password` and nothing
/// else, but the parameter is kept so the packet layout stays correct
/// independent of which plugin is named.
pub fn build_login_packet(
    username: &str,
    scrambled_password: &[u8],
    database: Option<&str>,
    max_pkt_size: u32,
    auth_plugin_name: Option<&str>,
) -> Vec<u8> {
    let mut flags = BASE_CLIENT_FLAGS;
    if database.is_some() {
        flags |= capability_flags::CLIENT_CONNECT_WITH_DB;
    }
    if auth_plugin_name.is_some() {
        flags |= capability_flags::CLIENT_PLUGIN_AUTH;
    }

    let mut buf = Vec::new();
    buf.write_u32::<LittleEndian>(flags).unwrap();
    buf.write_u32::<LittleEndian>(max_pkt_size).unwrap();
    buf.write_u8(UTF8_GENERAL_CI).unwrap();
    buf.extend_from_slice(&[0u8; 23]);

    write_null_term_string(&mut buf, username).unwrap();

    buf.write_u8(scrambled_password.len() as u8).unwrap();
    buf.extend_from_slice(scrambled_password);

    if let Some(db) = database {
        write_null_term_string(&mut buf, db).unwrap();
    }
    if let Some(plugin) = auth_plugin_name {
        buf.extend_from_slice(plugin.as_bytes());
        buf.push(NULL_TERMINATOR);
    }

    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_password_scrambles_to_empty() {
        assert!(scramble_native_password("", b"abcdefghijklmnopqrst").is_empty());
    }

    #[test]
    fn native_scramble_is_20_bytes_for_nonempty_password() {
        let scrambled = scramble_native_password("secret", b"abcdefghijklmnopqrst");
        assert_eq!(scrambled.len(), 20);
    }

    #[test]
    fn login_packet_round_trip_shape() {
        let scrambled = scramble_native_password("secret", b"abcdefghijklmnopqrst");
        let packet = build_login_packet("root", &scrambled, Some("testdb"), 16 * 1024 * 1024 - 1, None);
        // flags(4) + max_pkt(4) + collation(1) + reserved(23) = 32 header bytes
        assert_eq!(packet[32..32 + 4].to_vec(), b"root".to_vec());
        assert!(packet.contains(&b't'));
    }
}
