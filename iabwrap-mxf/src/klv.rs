//! KLV (Key-Length-Value) triplet handling
//!
//! All data in a track file is encoded as KLV triplets:
//! - Key: 16-byte Universal Label identifying the data
//! - Length: BER-encoded length of the value
//! - Value: The actual data
//!
//! The clip-wrap writer additionally needs fixed-width BER lengths so a
//! length slot can be reserved and back-patched after streaming.

use crate::error::{MxfError, Result};
use crate::ul::{labels, UniversalLabel, UL};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Read, Write};

/// Length of a Universal Label in bytes.
pub const UL_LENGTH: usize = 16;

/// Fixed BER width used for the clip value length so it can be
/// back-patched (leading byte 0x87).
pub const CLIP_BER_LENGTH: usize = 8;

/// Combined size of the clip's key and reserved length.
pub const RESERVED_KL_SIZE: usize = UL_LENGTH + CLIP_BER_LENGTH;

/// A KLV triplet
#[derive(Debug, Clone)]
pub struct Klv {
    /// Universal Label (key)
    pub key: UniversalLabel,
    /// Value data
    pub value: Vec<u8>,
    /// Original offset in the parsed region
    pub offset: u64,
}

impl Klv {
    /// Create new KLV
    pub fn new(key: UL, value: Vec<u8>) -> Self {
        Klv {
            key: UniversalLabel(key),
            value,
            offset: 0,
        }
    }

    /// Get value length
    pub fn length(&self) -> usize {
        self.value.len()
    }

    /// Total size including key and length encoding
    pub fn total_size(&self) -> usize {
        UL_LENGTH + ber_length_size(self.value.len()) + self.value.len()
    }

    /// Write KLV to writer
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<usize> {
        writer.write_all(self.key.as_bytes())?;

        let len_bytes = encode_ber_length(self.value.len());
        writer.write_all(&len_bytes)?;

        writer.write_all(&self.value)?;

        Ok(UL_LENGTH + len_bytes.len() + self.value.len())
    }
}

/// Write a 16-byte Universal Label.
pub fn write_ul<W: Write>(writer: &mut W, ul: &UniversalLabel) -> Result<()> {
    writer.write_all(ul.as_bytes())?;
    Ok(())
}

/// Write a fixed-width long-form BER length: `0x80 | (width - 1)` followed
/// by `width - 1` big-endian value bytes. The value must fit.
pub fn write_ber<W: Write>(writer: &mut W, value: u64, width: usize) -> Result<()> {
    if !(2..=9).contains(&width) {
        return Err(MxfError::BerError(format!(
            "unsupported fixed BER width: {}",
            width
        )));
    }

    let n = width - 1;
    if n < 8 && value >= 1u64 << (8 * n) {
        return Err(MxfError::BerError(format!(
            "value {} does not fit in {} length bytes",
            value, n
        )));
    }

    let mut buf = [0u8; 9];
    buf[0] = 0x80 | n as u8;
    for i in 0..n {
        buf[width - 1 - i] = (value >> (8 * i)) as u8;
    }
    writer.write_all(&buf[..width])?;
    Ok(())
}

/// Calculate the minimal BER length encoding size
pub fn ber_length_size(length: usize) -> usize {
    if length < 0x80 {
        1
    } else if length <= 0xFF {
        2
    } else if length <= 0xFFFF {
        3
    } else if length <= 0xFF_FFFF {
        4
    } else {
        5
    }
}

/// Encode a length as minimal BER
pub fn encode_ber_length(length: usize) -> Vec<u8> {
    if length < 0x80 {
        vec![length as u8]
    } else if length <= 0xFF {
        vec![0x81, length as u8]
    } else if length <= 0xFFFF {
        vec![0x82, (length >> 8) as u8, length as u8]
    } else if length <= 0xFF_FFFF {
        vec![0x83, (length >> 16) as u8, (length >> 8) as u8, length as u8]
    } else {
        vec![
            0x84,
            (length >> 24) as u8,
            (length >> 16) as u8,
            (length >> 8) as u8,
            length as u8,
        ]
    }
}

/// Decode a BER length from bytes, returning (length, bytes consumed).
/// Accepts both short and long forms.
pub fn decode_ber_length(data: &[u8]) -> Result<(usize, usize)> {
    if data.is_empty() {
        return Err(MxfError::BerError("no data for length".into()));
    }

    let first_byte = data[0];

    if first_byte < 0x80 {
        Ok((first_byte as usize, 1))
    } else if first_byte == 0x80 {
        Err(MxfError::BerError("indefinite length not supported".into()))
    } else {
        let num_bytes = (first_byte & 0x7F) as usize;

        if num_bytes > 8 {
            return Err(MxfError::BerError(format!(
                "BER length of {} bytes is too large",
                num_bytes
            )));
        }
        if data.len() < 1 + num_bytes {
            return Err(MxfError::BerError("not enough bytes for length".into()));
        }

        let mut length: usize = 0;
        for byte in data.iter().skip(1).take(num_bytes) {
            length = (length << 8) | (*byte as usize);
        }

        Ok((length, 1 + num_bytes))
    }
}

/// Assert that the BER length at `data[*pos..]` decodes to exactly
/// `expected` and advance the cursor past it. Used to walk the fixed-size
/// fields inside an encrypted essence triplet.
pub fn read_test_ber(data: &[u8], pos: &mut usize, expected: u64) -> Result<()> {
    if *pos >= data.len() {
        return Err(MxfError::Format("truncated BER field".into()));
    }

    let (length, consumed) = decode_ber_length(&data[*pos..])?;
    if length as u64 != expected {
        return Err(MxfError::Format(format!(
            "BER length {} where {} was required",
            length, expected
        )));
    }

    *pos += consumed;
    Ok(())
}

/// Read a key and BER length from a reader, returning the key, the value
/// length, and the total number of KL bytes consumed so callers can
/// advance offsets. Truncation is a `READFAIL`; malformed BER is `FORMAT`.
pub fn read_kl<R: Read>(reader: &mut R) -> Result<(UniversalLabel, u64, usize)> {
    let mut key = [0u8; UL_LENGTH];
    read_exact(reader, &mut key, "KLV key")?;

    let mut first = [0u8; 1];
    read_exact(reader, &mut first, "BER length")?;

    if first[0] < 0x80 {
        return Ok((UniversalLabel(key), first[0] as u64, UL_LENGTH + 1));
    }
    if first[0] == 0x80 {
        return Err(MxfError::BerError("indefinite length not supported".into()));
    }

    let num_bytes = (first[0] & 0x7F) as usize;
    if num_bytes > 8 {
        return Err(MxfError::BerError(format!(
            "BER length of {} bytes is too large",
            num_bytes
        )));
    }

    let mut len_buf = [0u8; 8];
    read_exact(reader, &mut len_buf[..num_bytes], "BER length bytes")?;

    let mut length: u64 = 0;
    for byte in &len_buf[..num_bytes] {
        length = (length << 8) | (*byte as u64);
    }

    Ok((UniversalLabel(key), length, UL_LENGTH + 1 + num_bytes))
}

fn read_exact<R: Read>(reader: &mut R, buf: &mut [u8], what: &str) -> Result<()> {
    reader.read_exact(buf).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            MxfError::ReadFail(format!("truncated {}", what))
        } else {
            MxfError::Io(e)
        }
    })
}

/// Write a fill item KLV occupying exactly `total` bytes. The length is
/// emitted as a fixed 4-byte BER so any padding size down to 20 bytes can
/// be expressed.
pub fn write_fill<W: Write>(writer: &mut W, total: usize) -> Result<()> {
    const FILL_OVERHEAD: usize = UL_LENGTH + 4;

    if total < FILL_OVERHEAD {
        return Err(MxfError::Fail(format!(
            "cannot fill {} bytes: below the {}-byte fill overhead",
            total, FILL_OVERHEAD
        )));
    }

    let value_len = total - FILL_OVERHEAD;
    writer.write_all(&labels::FILL_ITEM)?;
    write_ber(writer, value_len as u64, 4)?;
    writer.write_all(&vec![0u8; value_len])?;
    Ok(())
}

/// KLV reader for parsing an in-memory region
pub struct KlvReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> KlvReader<'a> {
    /// Create new KLV reader
    pub fn new(data: &'a [u8]) -> Self {
        KlvReader { data, position: 0 }
    }

    /// Get current position
    pub fn position(&self) -> usize {
        self.position
    }

    /// Check if there's more data
    pub fn has_more(&self) -> bool {
        self.position + UL_LENGTH <= self.data.len()
    }

    /// Read next KLV
    pub fn read_klv(&mut self) -> Result<Option<Klv>> {
        if !self.has_more() {
            return Ok(None);
        }

        let start_offset = self.position as u64;

        let mut key = [0u8; UL_LENGTH];
        key.copy_from_slice(&self.data[self.position..self.position + UL_LENGTH]);
        self.position += UL_LENGTH;

        let (length, len_size) = decode_ber_length(&self.data[self.position..])?;
        self.position += len_size;

        if self.position + length > self.data.len() {
            return Err(MxfError::ReadFail(format!(
                "KLV value needs {} bytes, {} available",
                length,
                self.data.len() - self.position
            )));
        }

        let value = self.data[self.position..self.position + length].to_vec();
        self.position += length;

        Ok(Some(Klv {
            key: UniversalLabel(key),
            value,
            offset: start_offset,
        }))
    }
}

/// Write a local set entry (2-byte tag, 2-byte length)
pub fn write_local_set<W: Write>(writer: &mut W, tag: u16, value: &[u8]) -> Result<usize> {
    writer.write_u16::<BigEndian>(tag)?;
    writer.write_u16::<BigEndian>(value.len() as u16)?;
    writer.write_all(value)?;
    Ok(4 + value.len())
}

/// Read a local set entry, returning (tag, value, bytes consumed)
pub fn read_local_set(data: &[u8], offset: usize) -> Result<(u16, &[u8], usize)> {
    if offset + 4 > data.len() {
        return Err(MxfError::ReadFail(format!(
            "local set header needs 4 bytes, {} available",
            data.len() - offset
        )));
    }

    let mut cursor = Cursor::new(&data[offset..]);
    let tag = cursor.read_u16::<BigEndian>()?;
    let length = cursor.read_u16::<BigEndian>()? as usize;

    if offset + 4 + length > data.len() {
        return Err(MxfError::ReadFail(format!(
            "local set value needs {} bytes, {} available",
            length,
            data.len() - offset - 4
        )));
    }

    Ok((tag, &data[offset + 4..offset + 4 + length], 4 + length))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ber_length_short() {
        let encoded = encode_ber_length(100);
        assert_eq!(encoded, vec![100]);

        let (decoded, size) = decode_ber_length(&encoded).unwrap();
        assert_eq!(decoded, 100);
        assert_eq!(size, 1);
    }

    #[test]
    fn test_ber_length_long() {
        let encoded = encode_ber_length(1000);
        assert_eq!(encoded, vec![0x82, 0x03, 0xE8]);

        let (decoded, size) = decode_ber_length(&encoded).unwrap();
        assert_eq!(decoded, 1000);
        assert_eq!(size, 3);
    }

    #[test]
    fn test_fixed_width_ber() {
        let mut buf = Vec::new();
        write_ber(&mut buf, 0, CLIP_BER_LENGTH).unwrap();
        assert_eq!(buf, vec![0x87, 0, 0, 0, 0, 0, 0, 0]);

        let mut buf = Vec::new();
        write_ber(&mut buf, 0x0102_0304, CLIP_BER_LENGTH).unwrap();
        assert_eq!(buf[0], 0x87);
        let (decoded, size) = decode_ber_length(&buf).unwrap();
        assert_eq!(decoded, 0x0102_0304);
        assert_eq!(size, 8);
    }

    #[test]
    fn test_fixed_width_ber_overflow() {
        let mut buf = Vec::new();
        assert!(write_ber(&mut buf, 0x1_0000, 3).is_err());
        assert!(write_ber(&mut buf, 0xFFFF, 3).is_ok());
    }

    #[test]
    fn test_read_kl() {
        let mut data = Vec::new();
        data.extend_from_slice(&labels::PREFACE);
        data.extend_from_slice(&[0x83, 0x00, 0x01, 0x00]);
        data.extend_from_slice(&vec![0u8; 0x100]);

        let mut cursor = Cursor::new(&data);
        let (key, length, kl_len) = read_kl(&mut cursor).unwrap();
        assert_eq!(key.as_bytes(), &labels::PREFACE);
        assert_eq!(length, 0x100);
        assert_eq!(kl_len, 20);
    }

    #[test]
    fn test_read_kl_truncated() {
        let mut cursor = Cursor::new(&labels::PREFACE[..10]);
        let err = read_kl(&mut cursor).unwrap_err();
        assert_eq!(err.code(), "READFAIL");
    }

    #[test]
    fn test_read_test_ber() {
        let data = [0x83, 0x00, 0x00, 0x10, 0xAA];
        let mut pos = 0;
        read_test_ber(&data, &mut pos, 16).unwrap();
        assert_eq!(pos, 4);

        let mut pos = 0;
        let err = read_test_ber(&data, &mut pos, 8).unwrap_err();
        assert_eq!(err.code(), "FORMAT");
    }

    #[test]
    fn test_klv_write_read() {
        let klv = Klv::new(labels::PREFACE, vec![1, 2, 3, 4]);

        let mut buffer = Vec::new();
        let size = klv.write(&mut buffer).unwrap();
        assert_eq!(size, 16 + 1 + 4);

        let mut reader = KlvReader::new(&buffer);
        let parsed = reader.read_klv().unwrap().unwrap();
        assert_eq!(parsed.key.as_bytes(), &labels::PREFACE);
        assert_eq!(parsed.value, vec![1, 2, 3, 4]);
        assert!(reader.read_klv().unwrap().is_none());
    }

    #[test]
    fn test_write_fill_exact() {
        for total in [20usize, 64, 1000] {
            let mut buf = Vec::new();
            write_fill(&mut buf, total).unwrap();
            assert_eq!(buf.len(), total);
            assert_eq!(&buf[..13], &labels::FILL_ITEM[..13]);
        }

        let mut buf = Vec::new();
        assert!(write_fill(&mut buf, 19).is_err());
    }

    #[test]
    fn test_local_set() {
        let mut buffer = Vec::new();
        write_local_set(&mut buffer, 0x1234, &[1, 2, 3]).unwrap();

        let (tag, value, size) = read_local_set(&buffer, 0).unwrap();
        assert_eq!(tag, 0x1234);
        assert_eq!(value, &[1, 2, 3]);
        assert_eq!(size, 7);
    }
}
