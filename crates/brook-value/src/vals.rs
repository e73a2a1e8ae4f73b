//! Reversible tuple codec: a flat sequence of length-prefixed fields.
//!
//! Every field is preceded by its 8-byte little-endian length. Operators use
//! this both for full tuples (captured rows, sort payloads, buffered window
//! partitions) and for hash keys, where equality of encodings is equality of
//! the raw evaluated bytes.

use brook_common::{BrookError, Result};

/// Append one length-prefixed field.
pub fn push_field(out: &mut Vec<u8>, field: &[u8]) {
    out.extend_from_slice(&(field.len() as u64).to_le_bytes());
    out.extend_from_slice(field);
}

/// Split the next field off the front of `buf`, returning `(field, rest)`.
pub fn read_field(buf: &[u8]) -> Result<(&[u8], &[u8])> {
    if buf.len() < 8 {
        return Err(BrookError::Execution(
            "truncated field length prefix".to_string(),
        ));
    }
    let mut len8 = [0u8; 8];
    len8.copy_from_slice(&buf[..8]);
    let len = u64::from_le_bytes(len8) as usize;
    let rest = &buf[8..];
    if rest.len() < len {
        return Err(BrookError::Execution(format!(
            "truncated field: want {} bytes, have {}",
            len,
            rest.len()
        )));
    }
    Ok((&rest[..len], &rest[len..]))
}

/// Skip `n` fields, returning the remainder.
pub fn skip_fields(mut buf: &[u8], n: usize) -> Result<&[u8]> {
    for _ in 0..n {
        let (_, rest) = read_field(buf)?;
        buf = rest;
    }
    Ok(buf)
}

/// Encode a tuple as consecutive length-prefixed fields.
pub fn encode_vals(out: &mut Vec<u8>, vals: &[&[u8]]) {
    for v in vals {
        push_field(out, v);
    }
}

/// Decode every field in `buf`, borrowing from it.
pub fn decode_vals(mut buf: &[u8]) -> Result<Vec<&[u8]>> {
    let mut out = Vec::new();
    while !buf.is_empty() {
        let (field, rest) = read_field(buf)?;
        out.push(field);
        buf = rest;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_preserves_fields_and_missing() {
        let vals: Vec<&[u8]> = vec![b"10", b"", b"\"x,y\"", b"{\"a\": [1]}"];
        let mut buf = Vec::new();
        encode_vals(&mut buf, &vals);
        let back = decode_vals(&buf).expect("decode");
        assert_eq!(back, vals);
    }

    #[test]
    fn empty_tuple_encodes_empty() {
        let mut buf = Vec::new();
        encode_vals(&mut buf, &[]);
        assert!(buf.is_empty());
        assert!(decode_vals(&buf).expect("decode").is_empty());
    }

    #[test]
    fn skip_fields_lands_on_payload() {
        let mut buf = Vec::new();
        encode_vals(&mut buf, &[b"key1", b"key2", b"payload"]);
        let rest = skip_fields(&buf, 2).expect("skip");
        assert_eq!(decode_vals(rest).expect("decode"), vec![b"payload" as &[u8]]);
    }

    #[test]
    fn truncated_buffers_error() {
        let mut buf = Vec::new();
        push_field(&mut buf, b"abcdef");
        buf.truncate(buf.len() - 2);
        assert!(decode_vals(&buf).is_err());
        assert!(read_field(&buf[..4]).is_err());
    }
}
