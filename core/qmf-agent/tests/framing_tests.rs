use qmf_agent::protocol::{
    check_header, encode_header, put_short_string, v1, V1Reader, V1_HEADER_LEN,
};

// ── Frame header ─────────────────────────────────────────────────

#[test]
fn header_encode_decode_is_identity() {
    let frame = encode_header(v1::SCHEMA_REQUEST, 0xDEAD_BEEF);
    assert_eq!(frame.len(), V1_HEADER_LEN);
    let (opcode, sequence, body) = check_header(&frame).unwrap();
    assert_eq!(opcode, v1::SCHEMA_REQUEST);
    assert_eq!(sequence, 0xDEAD_BEEF);
    assert!(body.is_empty());
}

#[test]
fn header_magic_bytes() {
    let frame = encode_header(b'p', 0);
    assert_eq!(&frame[..4], b"AM2p");
    assert_eq!(&frame[4..], &[0, 0, 0, 0]);
}

#[test]
fn header_sequence_is_big_endian() {
    let frame = encode_header(b's', 1);
    assert_eq!(&frame[4..], &[0, 0, 0, 1]);
}

#[test]
fn check_header_rejects_bad_magic() {
    assert!(check_header(b"XYZ10000").is_none());
}

#[test]
fn check_header_rejects_short_frames() {
    assert!(check_header(b"AM2S").is_none());
    assert!(check_header(b"").is_none());
}

#[test]
fn check_header_returns_body_slice() {
    let mut frame = encode_header(v1::SCHEMA_REQUEST, 2);
    frame.extend_from_slice(b"tail");
    let (_, _, body) = check_header(&frame).unwrap();
    assert_eq!(body, b"tail");
}

// ── Short strings ────────────────────────────────────────────────

#[test]
fn short_string_roundtrip() {
    let mut buf = Vec::new();
    put_short_string(&mut buf, "org.apache.qpid");
    let mut reader = V1Reader::new(&buf);
    assert_eq!(reader.short_string().unwrap(), "org.apache.qpid");
}

#[test]
fn short_string_empty() {
    let mut buf = Vec::new();
    put_short_string(&mut buf, "");
    assert_eq!(buf, vec![0]);
    let mut reader = V1Reader::new(&buf);
    assert_eq!(reader.short_string().unwrap(), "");
}

#[test]
fn short_string_truncates_at_255_bytes() {
    let long = "a".repeat(300);
    let mut buf = Vec::new();
    put_short_string(&mut buf, &long);
    assert_eq!(buf.len(), 256);
    let mut reader = V1Reader::new(&buf);
    assert_eq!(reader.short_string().unwrap().len(), 255);
}

#[test]
fn short_string_rejects_truncated_input() {
    let mut reader = V1Reader::new(&[5, b'a', b'b']);
    assert!(reader.short_string().is_none());
}

// ── Fixed-width fields ───────────────────────────────────────────

#[test]
fn bin128_roundtrip() {
    let hash = [7u8; 16];
    let mut reader = V1Reader::new(&hash);
    assert_eq!(reader.bin128().unwrap(), hash);
}

#[test]
fn bin128_rejects_short_input() {
    let mut reader = V1Reader::new(&[1, 2, 3]);
    assert!(reader.bin128().is_none());
}

#[test]
fn u32_is_big_endian() {
    let mut reader = V1Reader::new(&[0, 0, 1, 0]);
    assert_eq!(reader.u32().unwrap(), 256);
}

#[test]
fn reader_consumes_fields_in_order() {
    let mut buf = Vec::new();
    put_short_string(&mut buf, "pkg");
    put_short_string(&mut buf, "cls");
    buf.extend_from_slice(&[9u8; 16]);
    let mut reader = V1Reader::new(&buf);
    assert_eq!(reader.short_string().unwrap(), "pkg");
    assert_eq!(reader.short_string().unwrap(), "cls");
    assert_eq!(reader.bin128().unwrap(), [9u8; 16]);
    assert!(reader.short_string().is_none());
}
