//! The six end-to-end scenarios named in spec.md §8, driven against
//! [`crate::mock_server`] rather than a real `mysqld`.

use client::{Connection, ConnectionOptions, Error, Value};

use crate::mock_server::{
    build_binary_row, build_eof_packet, build_field_packet, build_ok_packet, build_prepare_ok, build_text_row,
    handshake, MockServer,
};

const SCRAMBLE: [u8; 20] = *b"abcdefghijklmnopqrst";

fn connect_options(server: &MockServer) -> ConnectionOptions {
    ConnectionOptions::new(server.host.clone(), server.port, "root", "secret")
}

/// Emits wire-level traces from `client`/`proto` on test failure. Safe to
/// call from every test: `tracing_subscriber` only lets the first call win.
fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

#[test]
fn handshake_establishes_thread_id_and_server_version() {
    init_tracing();
    let server = MockServer::start(vec![Box::new(|mut framer| {
        handshake(&mut framer, 42, &SCRAMBLE);
    })]);

    let conn = Connection::connect(connect_options(&server)).expect("connect");
    assert_eq!(conn.thread_id(), 42);
    assert_eq!(conn.server_version(), "8.0.34-mock");

    drop(conn);
    server.join();
}

#[test]
fn simple_text_query_drains_and_frees_the_connection() {
    init_tracing();
    let server = MockServer::start(vec![Box::new(|mut framer| {
        handshake(&mut framer, 1, &SCRAMBLE);

        framer.start_command();
        let query = framer.read_packet().expect("read query");
        assert_eq!(query[0], 0x03);
        assert_eq!(&query[1..], b"SELECT 1");

        framer.write_packet(&[1]).unwrap(); // field count = 1
        framer.write_packet(&build_field_packet("1", 3, 0)).unwrap(); // ColumnType::Long
        framer.write_packet(&build_eof_packet(0, 0x0002)).unwrap();
        framer.write_packet(&build_text_row(&["1"])).unwrap();
        framer.write_packet(&build_eof_packet(0, 0x0002)).unwrap();

        framer.start_command();
        let _ping = framer.read_packet().expect("read ping");
        assert_eq!(_ping[0], 0x0e);
        framer.write_packet(&build_ok_packet(0, 0, 0x0002, 0, "")).unwrap();
    })]);

    let mut conn = Connection::connect(connect_options(&server)).expect("connect");
    let mut result = conn.start("SELECT 1").expect("start query");
    assert_eq!(result.fields().len(), 1);

    let row = result.get_row(&mut conn).expect("row").expect("one row");
    assert_eq!(row, vec![Value::Int(1)]);
    assert_eq!(result.get_row(&mut conn).expect("eof"), None);

    conn.ping().expect("ping after full drain");
    server.join();
}

#[test]
fn unread_rows_guard_rejects_commands_until_drained() {
    init_tracing();
    let server = MockServer::start(vec![Box::new(|mut framer| {
        handshake(&mut framer, 2, &SCRAMBLE);

        framer.start_command();
        let _query = framer.read_packet().expect("read query");

        framer.write_packet(&[1]).unwrap();
        framer.write_packet(&build_field_packet("n", 3, 0)).unwrap();
        framer.write_packet(&build_eof_packet(0, 0x0002)).unwrap();
        framer.write_packet(&build_text_row(&["1"])).unwrap();
        framer.write_packet(&build_text_row(&["2"])).unwrap();
        framer.write_packet(&build_eof_packet(0, 0x0002)).unwrap();

        framer.start_command();
        let ping = framer.read_packet().expect("read ping");
        assert_eq!(ping[0], 0x0e);
        framer.write_packet(&build_ok_packet(0, 0, 0x0002, 0, "")).unwrap();
    })]);

    let mut conn = Connection::connect(connect_options(&server)).expect("connect");
    let mut result = conn.start("SELECT n FROM t").expect("start query");

    let first = result.get_row(&mut conn).expect("first row").expect("row present");
    assert_eq!(first, vec![Value::Int(1)]);

    // A guarded ping never touches the wire: if it had, the next read
    // below would desync against the still-buffered second row.
    match conn.ping() {
        Err(Error::UnreadRows) => {}
        other => panic!("expected UnreadRows, got {other:?}"),
    }

    let second = result.get_row(&mut conn).expect("second row").expect("row present");
    assert_eq!(second, vec![Value::Int(2)]);
    assert_eq!(result.get_row(&mut conn).expect("eof"), None);

    conn.ping().expect("ping after full drain");
    server.join();
}

#[test]
fn prepare_execute_binds_two_params_and_decodes_the_row() {
    init_tracing();
    let server = MockServer::start(vec![Box::new(|mut framer| {
        handshake(&mut framer, 3, &SCRAMBLE);

        framer.start_command();
        let prepare = framer.read_packet().expect("read prepare");
        assert_eq!(prepare[0], 0x16);
        assert_eq!(&prepare[1..], b"SELECT ?+?");

        framer.write_packet(&build_prepare_ok(1, 1, 2, 0)).unwrap();
        framer.write_packet(&build_field_packet("?", 3, 0)).unwrap();
        framer.write_packet(&build_field_packet("?", 3, 0)).unwrap();
        framer.write_packet(&build_eof_packet(0, 0x0002)).unwrap();
        framer.write_packet(&build_field_packet("?+?", 8, 0)).unwrap(); // ColumnType::LongLong
        framer.write_packet(&build_eof_packet(0, 0x0002)).unwrap();

        framer.start_command();
        let execute = framer.read_packet().expect("read execute");
        assert_eq!(execute[0], 0x17);
        assert_eq!(&execute[1..5], &1u32.to_le_bytes()); // statement id
        assert_eq!(execute[5], 0); // flags: no cursor
        assert_eq!(&execute[6..10], &1u32.to_le_bytes()); // iteration count
        let bitmap_offset = 10;
        assert_eq!(execute[bitmap_offset], 0x00); // neither param null
        assert_eq!(execute[bitmap_offset + 1], 1); // new-params-bound
        let types_offset = bitmap_offset + 2;
        assert_eq!(&execute[types_offset..types_offset + 2], &[8, 0]); // LongLong, signed
        assert_eq!(&execute[types_offset + 2..types_offset + 4], &[8, 0]);
        let values_offset = types_offset + 4;
        assert_eq!(&execute[values_offset..values_offset + 8], &3i64.to_le_bytes());
        assert_eq!(&execute[values_offset + 8..values_offset + 16], &4i64.to_le_bytes());

        framer.write_packet(&[1]).unwrap();
        framer.write_packet(&build_field_packet("?+?", 8, 0)).unwrap();
        framer.write_packet(&build_eof_packet(0, 0x0002)).unwrap();
        framer
            .write_packet(&build_binary_row(1, |buf| buf.extend_from_slice(&7i64.to_le_bytes())))
            .unwrap();
        framer.write_packet(&build_eof_packet(0, 0x0002)).unwrap();
    })]);

    let mut conn = Connection::connect(connect_options(&server)).expect("connect");
    let handle = conn.prepare("SELECT ?+?").expect("prepare");

    let mut result = conn
        .statement(handle)
        .bind_params((3i64, 4i64))
        .expect("bind")
        .run()
        .expect("execute");

    let row = result.get_row(&mut conn).expect("row").expect("one row");
    assert_eq!(row, vec![Value::Int(7)]);
    assert_eq!(result.get_row(&mut conn).expect("eof"), None);

    server.join();
}

#[test]
fn send_long_data_elides_the_value_from_execute_and_chunks_the_wire() {
    init_tracing();
    let server = MockServer::start(vec![Box::new(|mut framer| {
        handshake(&mut framer, 4, &SCRAMBLE);

        framer.start_command();
        let prepare = framer.read_packet().expect("read prepare");
        assert_eq!(prepare[0], 0x16);
        framer.write_packet(&build_prepare_ok(5, 0, 1, 0)).unwrap();
        framer.write_packet(&build_field_packet("?", 252, 0)).unwrap(); // Blob
        framer.write_packet(&build_eof_packet(0, 0x0002)).unwrap();

        framer.start_command();
        let chunk1 = framer.read_packet().expect("read first long-data chunk");
        assert_eq!(chunk1[0], 0x18);
        assert_eq!(&chunk1[1..5], &5u32.to_le_bytes());
        assert_eq!(&chunk1[5..7], &0u16.to_le_bytes());
        assert_eq!(&chunk1[7..], b"Hello, ");

        framer.start_command();
        let chunk2 = framer.read_packet().expect("read second long-data chunk");
        assert_eq!(chunk2[0], 0x18);
        assert_eq!(&chunk2[7..], b"world!");

        framer.start_command();
        let execute = framer.read_packet().expect("read execute");
        assert_eq!(execute[0], 0x17);
        let bitmap_offset = 10;
        assert_eq!(execute[bitmap_offset] & 0x01, 0); // not null, just elided
        let new_params_bound_offset = bitmap_offset + 1;
        assert_eq!(execute[new_params_bound_offset], 1);
        let type_block_end = new_params_bound_offset + 1 + 2;
        assert_eq!(execute.len(), type_block_end, "no value bytes beyond the type code");

        framer.write_packet(&build_ok_packet(1, 0, 0x0002, 0, "")).unwrap();
    })]);

    let mut conn = Connection::connect(connect_options(&server)).expect("connect");
    let handle = conn.prepare("INSERT INTO t VALUES(?)").expect("prepare");

    {
        let mut stmt = conn.statement(handle);
        stmt.send_long_data(0, std::io::Cursor::new(b"Hello, ".to_vec()), 14).expect("send chunk 1");
        stmt.send_long_data(0, std::io::Cursor::new(b"world!".to_vec()), 13).expect("send chunk 2");
    }
    let mut result = conn.statement(handle).run().expect("execute");
    assert_eq!(result.affected_rows(), 1);
    result.drain(&mut conn).expect("drain");

    server.join();
}

#[test]
fn reconnect_replays_prepared_statements_and_rebinds() {
    init_tracing();
    let server = MockServer::start(vec![
        Box::new(|mut framer| {
            handshake(&mut framer, 6, &SCRAMBLE);

            framer.start_command();
            let prepare = framer.read_packet().expect("read prepare");
            assert_eq!(&prepare[1..], b"SELECT ?");
            framer.write_packet(&build_prepare_ok(10, 1, 1, 0)).unwrap();
            framer.write_packet(&build_field_packet("?", 3, 0)).unwrap();
            framer.write_packet(&build_eof_packet(0, 0x0002)).unwrap();
            framer.write_packet(&build_field_packet("?", 8, 0)).unwrap();
            framer.write_packet(&build_eof_packet(0, 0x0002)).unwrap();
        }),
        Box::new(|mut framer| {
            handshake(&mut framer, 7, &SCRAMBLE);

            framer.start_command();
            let reprepare = framer.read_packet().expect("read re-prepare");
            assert_eq!(&reprepare[1..], b"SELECT ?");
            framer.write_packet(&build_prepare_ok(99, 1, 1, 0)).unwrap();
            framer.write_packet(&build_field_packet("?", 3, 0)).unwrap();
            framer.write_packet(&build_eof_packet(0, 0x0002)).unwrap();
            framer.write_packet(&build_field_packet("?", 8, 0)).unwrap();
            framer.write_packet(&build_eof_packet(0, 0x0002)).unwrap();

            framer.start_command();
            let execute = framer.read_packet().expect("read execute");
            assert_eq!(execute[0], 0x17);
            assert_eq!(&execute[1..5], &99u32.to_le_bytes(), "executes against the re-prepared server id");
            let bitmap_offset = 10;
            let new_params_bound_offset = bitmap_offset + 1;
            assert_eq!(execute[new_params_bound_offset], 1, "rebind must be set on the first post-reconnect EXECUTE");
            let values_offset = new_params_bound_offset + 1 + 2;
            assert_eq!(&execute[values_offset..values_offset + 8], &5i64.to_le_bytes());

            framer.write_packet(&[1]).unwrap();
            framer.write_packet(&build_field_packet("?", 8, 0)).unwrap();
            framer.write_packet(&build_eof_packet(0, 0x0002)).unwrap();
            framer
                .write_packet(&build_binary_row(1, |buf| buf.extend_from_slice(&5i64.to_le_bytes())))
                .unwrap();
            framer.write_packet(&build_eof_packet(0, 0x0002)).unwrap();
        }),
    ]);

    let mut conn = Connection::connect(connect_options(&server)).expect("connect");
    let handle = conn.prepare("SELECT ?").expect("prepare");

    conn.reconnect().expect("reconnect");

    let mut result = conn
        .statement(handle)
        .bind_params((5i64,))
        .expect("bind")
        .run()
        .expect("execute after reconnect");

    let row = result.get_row(&mut conn).expect("row").expect("one row");
    assert_eq!(row, vec![Value::Int(5)]);

    server.join();
}

#[test]
fn statement_handle_rejected_against_a_different_connection() {
    init_tracing();
    let server_a = MockServer::start(vec![Box::new(|mut framer| {
        handshake(&mut framer, 8, &SCRAMBLE);

        framer.start_command();
        let prepare = framer.read_packet().expect("read prepare");
        assert_eq!(&prepare[1..], b"SELECT ?");
        framer.write_packet(&build_prepare_ok(1, 1, 1, 0)).unwrap();
        framer.write_packet(&build_field_packet("?", 3, 0)).unwrap();
        framer.write_packet(&build_eof_packet(0, 0x0002)).unwrap();
        framer.write_packet(&build_field_packet("?", 8, 0)).unwrap();
        framer.write_packet(&build_eof_packet(0, 0x0002)).unwrap();
    })]);
    let server_b = MockServer::start(vec![Box::new(|mut framer| {
        handshake(&mut framer, 9, &SCRAMBLE);
    })]);

    let mut conn_a = Connection::connect(connect_options(&server_a)).expect("connect a");
    let mut conn_b = Connection::connect(connect_options(&server_b)).expect("connect b");

    let handle = conn_a.prepare("SELECT ?").expect("prepare on a");

    // The same numeric-looking handle used against a different
    // connection must be refused, never silently alias whatever
    // statement b's manager happens to have at the same slot.
    match conn_b.statement(handle).bind_params((1i64,)) {
        Err(Error::CrossConnectionUse) => {}
        other => panic!("expected CrossConnectionUse, got {other:?}"),
    }

    drop(conn_a);
    drop(conn_b);
    server_a.join();
    server_b.join();
}
