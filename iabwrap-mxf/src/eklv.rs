//! Encrypted essence triplet (EKLV) framing.
//!
//! An encrypted triplet wraps a plaintext essence triplet inside an outer
//! KLV under the encrypted-essence key. The value is a sequence of
//! BER-prefixed fields:
//!
//! ```text
//! ber(16) context_id
//! ber(8)  plaintext_offset (u64 BE)
//! ber(16) essence_ul
//! ber(8)  source_length (u64 BE)
//! ber(n)  encrypted_source_value
//! [integrity pack: essence_ul(16) || sequence_number(8 BE) || hmac(20)]
//! ```
//!
//! The encrypted source value is `IV(16) || E(check)(16) ||
//! plaintext_head(plaintext_offset) || E(tail, zero padded to 16)`, with a
//! single CBC chain over the check block and the tail. The MAC covers every
//! value byte preceding the MAC itself.

use crate::error::{MxfError, Result};
use crate::klv::{encode_ber_length, read_kl, read_test_ber, write_ber, UL_LENGTH};
use crate::types::{LabelSetType, WriterInfo};
use crate::ul::{self, labels, UniversalLabel};
use iabwrap_crypto::{CbcDecryptor, CbcEncryptor, HmacContext, Iv, CBC_BLOCK_SIZE, HMAC_SIZE};
use std::io::{Read, Write};

/// Plaintext check value enciphered at the head of each encrypted source
/// value.
pub const ESV_CHECK_VALUE: [u8; CBC_BLOCK_SIZE] = *b"CHUKCHUKCHUKCHUK";

/// Size of the integrity pack: essence UL, sequence number, MAC.
pub const INTEGRITY_PACK_SIZE: usize = UL_LENGTH + 8 + HMAC_SIZE;

/// Fixed BER width for the triplet's internal length prefixes.
const FIELD_BER_WIDTH: usize = 4;

/// A fixed-capacity frame buffer, the unit of exchange for essence reads.
///
/// The capacity is set once; reads that do not fit fail with `SMALLBUF`
/// and leave the buffer contents unspecified.
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    data: Vec<u8>,
    size: usize,
    frame_number: u32,
    source_length: u32,
    plaintext_offset: u32,
}

impl FrameBuffer {
    /// Create a buffer able to hold `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        FrameBuffer {
            data: vec![0u8; capacity],
            size: 0,
            frame_number: 0,
            source_length: 0,
            plaintext_offset: 0,
        }
    }

    /// The fixed capacity.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Valid bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.size]
    }

    /// Number of valid bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Frame number recorded by the last read.
    pub fn frame_number(&self) -> u32 {
        self.frame_number
    }

    /// Plaintext source length recorded by the last read.
    pub fn source_length(&self) -> u32 {
        self.source_length
    }

    /// Plaintext offset recorded by the last read.
    pub fn plaintext_offset(&self) -> u32 {
        self.plaintext_offset
    }

    fn fill(&mut self, bytes: &[u8]) -> Result<()> {
        if bytes.len() > self.data.len() {
            return Err(MxfError::SmallBuf {
                needed: bytes.len(),
                capacity: self.data.len(),
            });
        }
        self.data[..bytes.len()].copy_from_slice(bytes);
        self.size = bytes.len();
        Ok(())
    }
}

/// Parameters for writing one encrypted triplet.
#[derive(Debug, Clone)]
pub struct EklvParams {
    /// Cryptographic context ID, matched against the header on read
    pub context_id: [u8; 16],
    /// Essence element key of the wrapped triplet
    pub essence_ul: UniversalLabel,
    /// Sequence number recorded in the integrity pack
    pub sequence_number: u64,
    /// Bytes at the head of the source left in plaintext
    pub plaintext_offset: u32,
    /// Which registry's encrypted-essence key to write under
    pub label_set: LabelSetType,
}

/// Length of the encrypted source value for a given source length and
/// plaintext offset.
pub fn calc_esv_length(source_length: u32, plaintext_offset: u32) -> Result<usize> {
    if plaintext_offset > source_length {
        return Err(MxfError::Format(format!(
            "plaintext offset {} beyond source length {}",
            plaintext_offset, source_length
        )));
    }

    let tail = (source_length - plaintext_offset) as usize;
    let padded = tail.div_ceil(CBC_BLOCK_SIZE) * CBC_BLOCK_SIZE;
    Ok(plaintext_offset as usize + padded + 2 * CBC_BLOCK_SIZE)
}

/// Write one encrypted essence triplet. Returns the total bytes written.
///
/// When `hmac` is `None` the integrity pack is omitted.
pub fn write_eklv<W: Write>(
    writer: &mut W,
    params: &EklvParams,
    source: &[u8],
    iv: &Iv,
    enc: &mut CbcEncryptor,
    hmac: Option<&mut HmacContext>,
) -> Result<usize> {
    if source.is_empty() {
        return Err(MxfError::Format("cannot wrap an empty source value".into()));
    }

    let source_length = source.len() as u32;
    let po = params.plaintext_offset as usize;
    let esv_length = calc_esv_length(source_length, params.plaintext_offset)?;

    // One CBC chain over the check block and the padded tail.
    let tail = &source[po..];
    let padded = tail.len().div_ceil(CBC_BLOCK_SIZE) * CBC_BLOCK_SIZE;
    let mut ciphertext = Vec::with_capacity(CBC_BLOCK_SIZE + padded);
    ciphertext.extend_from_slice(&ESV_CHECK_VALUE);
    ciphertext.extend_from_slice(tail);
    ciphertext.resize(CBC_BLOCK_SIZE + padded, 0);

    enc.set_iv(iv);
    enc.encrypt_in_place(&mut ciphertext)?;

    let mut esv = Vec::with_capacity(esv_length);
    esv.extend_from_slice(iv.as_bytes());
    esv.extend_from_slice(&ciphertext[..CBC_BLOCK_SIZE]);
    esv.extend_from_slice(&source[..po]);
    esv.extend_from_slice(&ciphertext[CBC_BLOCK_SIZE..]);
    debug_assert_eq!(esv.len(), esv_length);

    let mut value = Vec::with_capacity(esv_length + 128);
    write_ber(&mut value, 16, FIELD_BER_WIDTH)?;
    value.extend_from_slice(&params.context_id);
    write_ber(&mut value, 8, FIELD_BER_WIDTH)?;
    value.extend_from_slice(&(params.plaintext_offset as u64).to_be_bytes());
    write_ber(&mut value, 16, FIELD_BER_WIDTH)?;
    value.extend_from_slice(params.essence_ul.as_bytes());
    write_ber(&mut value, 8, FIELD_BER_WIDTH)?;
    value.extend_from_slice(&(source_length as u64).to_be_bytes());
    write_ber(&mut value, esv_length as u64, FIELD_BER_WIDTH)?;
    value.extend_from_slice(&esv);

    if let Some(hmac) = hmac {
        value.extend_from_slice(params.essence_ul.as_bytes());
        value.extend_from_slice(&params.sequence_number.to_be_bytes());

        hmac.reset();
        hmac.update(&value)?;
        hmac.finalize()?;
        value.extend_from_slice(hmac.value()?);
    }

    let crypt_key = match params.label_set {
        LabelSetType::Interop => labels::INTEROP_CRYPT_ESSENCE,
        _ => labels::CRYPT_ESSENCE,
    };

    writer.write_all(&crypt_key)?;
    let len_bytes = encode_ber_length(value.len());
    writer.write_all(&len_bytes)?;
    writer.write_all(&value)?;

    Ok(UL_LENGTH + len_bytes.len() + value.len())
}

/// Read one essence triplet (plaintext or encrypted) from the reader's
/// current position.
///
/// Encrypted triplets are decrypted when `dec` is supplied, otherwise the
/// ciphertext region is returned as-is. When the file signals an integrity
/// pack and `hmac` is supplied, the pack is verified; a mismatch is
/// `HMACFAIL`.
pub fn read_eklv<R: Read>(
    reader: &mut R,
    essence_ul: &UniversalLabel,
    info: &WriterInfo,
    frame_number: u32,
    frame_buf: &mut FrameBuffer,
    dec: Option<&mut CbcDecryptor>,
    hmac: Option<&mut HmacContext>,
) -> Result<()> {
    let (key, length, _) = read_kl(reader)?;

    if key.is_crypt_essence() {
        if !info.encrypted_essence {
            log::error!("EKLV packet found, no cryptographic context in header");
            return Err(MxfError::Format(
                "encrypted triplet without a cryptographic context".into(),
            ));
        }

        let mut value = vec![0u8; length as usize];
        reader.read_exact(&mut value).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                MxfError::ReadFail("truncated encrypted triplet".into())
            } else {
                MxfError::Io(e)
            }
        })?;

        read_encrypted_value(&value, essence_ul, info, frame_number, frame_buf, dec, hmac)
    } else if key.matches_ignoring_stream(essence_ul.as_bytes()) {
        if frame_buf.capacity() < length as usize {
            return Err(MxfError::SmallBuf {
                needed: length as usize,
                capacity: frame_buf.capacity(),
            });
        }

        reader
            .read_exact(&mut frame_buf.data[..length as usize])
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::UnexpectedEof {
                    MxfError::ReadFail("truncated essence triplet".into())
                } else {
                    MxfError::Io(e)
                }
            })?;

        frame_buf.size = length as usize;
        frame_buf.frame_number = frame_number;
        frame_buf.source_length = length as u32;
        frame_buf.plaintext_offset = 0;
        Ok(())
    } else {
        match ul::find(key.as_bytes()) {
            Some(entry) => log::warn!("unexpected essence UL found: {}", entry.name),
            None => log::warn!("unexpected essence UL found: {:?}", key),
        }
        Err(MxfError::Format("unexpected essence UL".into()))
    }
}

fn read_encrypted_value(
    value: &[u8],
    essence_ul: &UniversalLabel,
    info: &WriterInfo,
    frame_number: u32,
    frame_buf: &mut FrameBuffer,
    dec: Option<&mut CbcDecryptor>,
    hmac: Option<&mut HmacContext>,
) -> Result<()> {
    let mut pos = 0usize;

    // Context ID
    read_test_ber(value, &mut pos, 16)?;
    if value.len() < pos + 16 {
        return Err(MxfError::Format("truncated context ID".into()));
    }
    if value[pos..pos + 16] != info.context_id {
        log::error!("packet's cryptographic context ID does not match the header");
        return Err(MxfError::Format("cryptographic context ID mismatch".into()));
    }
    pos += 16;

    // Plaintext offset
    read_test_ber(value, &mut pos, 8)?;
    if value.len() < pos + 8 {
        return Err(MxfError::Format("truncated plaintext offset".into()));
    }
    let plaintext_offset = read_u64_be(&value[pos..pos + 8]) as u32;
    pos += 8;

    // Essence UL, stream byte ignored
    read_test_ber(value, &mut pos, 16)?;
    if value.len() < pos + 16 {
        return Err(MxfError::Format("truncated essence UL".into()));
    }
    if value[pos..pos + 15] != essence_ul.as_bytes()[..15] {
        match ul::find(&take_ul(&value[pos..pos + 16])) {
            Some(entry) => log::warn!("unexpected essence UL found: {}", entry.name),
            None => log::warn!("unexpected essence UL found"),
        }
        return Err(MxfError::Format("unexpected essence UL in triplet".into()));
    }
    pos += 16;

    // Source length
    read_test_ber(value, &mut pos, 8)?;
    if value.len() < pos + 8 {
        return Err(MxfError::Format("truncated source length".into()));
    }
    let source_length = read_u64_be(&value[pos..pos + 8]) as u32;
    pos += 8;

    if source_length == 0 {
        return Err(MxfError::Format("zero source length".into()));
    }
    if frame_buf.capacity() < source_length as usize {
        return Err(MxfError::SmallBuf {
            needed: source_length as usize,
            capacity: frame_buf.capacity(),
        });
    }

    let esv_length = calc_esv_length(source_length, plaintext_offset)?;
    read_test_ber(value, &mut pos, esv_length as u64)?;

    let tmp_len = esv_length
        + if info.uses_hmac {
            INTEGRITY_PACK_SIZE
        } else {
            0
        };
    if value.len() < pos + tmp_len {
        log::error!("frame length is larger than EKLV packet length");
        return Err(MxfError::Format(
            "encrypted source value overruns the packet".into(),
        ));
    }

    match dec {
        Some(dec) => {
            let esv = &value[pos..pos + esv_length];
            let po = plaintext_offset as usize;

            let iv = Iv::from_slice(&esv[..CBC_BLOCK_SIZE])?;
            dec.set_iv(&iv);

            // Reassemble the CBC chain: check block, then the tail that
            // follows the plaintext head.
            let mut ciphertext =
                Vec::with_capacity(esv_length - po - CBC_BLOCK_SIZE);
            ciphertext.extend_from_slice(&esv[CBC_BLOCK_SIZE..2 * CBC_BLOCK_SIZE]);
            ciphertext.extend_from_slice(&esv[2 * CBC_BLOCK_SIZE + po..]);
            dec.decrypt_in_place(&mut ciphertext)?;

            if ciphertext[..CBC_BLOCK_SIZE] != ESV_CHECK_VALUE {
                return Err(MxfError::Format("ESV check value mismatch".into()));
            }

            let tail_len = (source_length as usize) - po;
            frame_buf.data[..po].copy_from_slice(&esv[2 * CBC_BLOCK_SIZE..2 * CBC_BLOCK_SIZE + po]);
            frame_buf.data[po..source_length as usize]
                .copy_from_slice(&ciphertext[CBC_BLOCK_SIZE..CBC_BLOCK_SIZE + tail_len]);
            frame_buf.size = source_length as usize;

            if info.uses_hmac {
                if let Some(hmac) = hmac {
                    verify_integrity_pack(
                        value,
                        pos + esv_length,
                        essence_ul,
                        (frame_number as u64) + 1,
                        hmac,
                    )?;
                }
            }
        }
        None => {
            // Hand the ciphertext region back to the caller untouched.
            frame_buf.fill(&value[pos..pos + tmp_len])?;
        }
    }

    frame_buf.frame_number = frame_number;
    frame_buf.source_length = source_length;
    frame_buf.plaintext_offset = plaintext_offset;
    Ok(())
}

fn verify_integrity_pack(
    value: &[u8],
    pack_start: usize,
    essence_ul: &UniversalLabel,
    expected_sequence: u64,
    hmac: &mut HmacContext,
) -> Result<()> {
    let pack = &value[pack_start..pack_start + INTEGRITY_PACK_SIZE];

    if pack[..15] != essence_ul.as_bytes()[..15] {
        return Err(MxfError::Format("integrity pack essence UL mismatch".into()));
    }

    let sequence = read_u64_be(&pack[UL_LENGTH..UL_LENGTH + 8]);
    if sequence != expected_sequence {
        log::error!(
            "integrity pack sequence number {} does not match expected {}",
            sequence,
            expected_sequence
        );
        return Err(MxfError::Crypto(iabwrap_crypto::CryptoError::HmacMismatch));
    }

    hmac.reset();
    hmac.update(&value[..pack_start + UL_LENGTH + 8])?;
    hmac.finalize()?;
    hmac.verify(&pack[UL_LENGTH + 8..])?;
    Ok(())
}

fn read_u64_be(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[..8]);
    u64::from_be_bytes(buf)
}

fn take_ul(bytes: &[u8]) -> [u8; 16] {
    let mut ul = [0u8; 16];
    ul.copy_from_slice(&bytes[..16]);
    ul
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::klv::Klv;
    use iabwrap_crypto::{ContentKey, KeyDerivationMode};
    use std::io::Cursor;

    fn element_ul() -> UniversalLabel {
        let mut ul = labels::IAB_CLIP_WRAPPED_ELEMENT;
        ul[13] = 1;
        ul[15] = 1;
        UniversalLabel(ul)
    }

    fn crypto_info(context_id: [u8; 16], uses_hmac: bool) -> WriterInfo {
        WriterInfo {
            encrypted_essence: true,
            context_id,
            uses_hmac,
            ..Default::default()
        }
    }

    fn params(context_id: [u8; 16], frame: u64) -> EklvParams {
        EklvParams {
            context_id,
            essence_ul: element_ul(),
            sequence_number: frame + 1,
            plaintext_offset: 0,
            label_set: LabelSetType::Smpte,
        }
    }

    #[test]
    fn test_esv_length() {
        assert_eq!(calc_esv_length(16, 0).unwrap(), 48);
        assert_eq!(calc_esv_length(17, 0).unwrap(), 64);
        assert_eq!(calc_esv_length(100, 4).unwrap(), 4 + 96 + 32);
        assert!(calc_esv_length(4, 8).is_err());
    }

    #[test]
    fn test_encrypted_roundtrip() {
        let key = ContentKey::new([0x55; 16]);
        let context_id = [0x21; 16];
        let source: Vec<u8> = (0u8..=99).collect();

        let mut enc = CbcEncryptor::new(&key);
        let mut hmac_w = HmacContext::new(&key, KeyDerivationMode::Smpte);
        let mut packet = Vec::new();
        write_eklv(
            &mut packet,
            &params(context_id, 0),
            &source,
            &Iv::new([0x0A; 16]),
            &mut enc,
            Some(&mut hmac_w),
        )
        .unwrap();

        let info = crypto_info(context_id, true);
        let mut dec = CbcDecryptor::new(&key);
        let mut hmac_r = HmacContext::new(&key, KeyDerivationMode::Smpte);
        let mut frame_buf = FrameBuffer::with_capacity(256);

        let mut cursor = Cursor::new(&packet);
        read_eklv(
            &mut cursor,
            &element_ul(),
            &info,
            0,
            &mut frame_buf,
            Some(&mut dec),
            Some(&mut hmac_r),
        )
        .unwrap();

        assert_eq!(frame_buf.as_slice(), &source[..]);
        assert_eq!(frame_buf.source_length(), 100);
        assert_eq!(frame_buf.plaintext_offset(), 0);
    }

    #[test]
    fn test_plaintext_offset_roundtrip() {
        let key = ContentKey::new([0x11; 16]);
        let context_id = [0x42; 16];
        let source = vec![0xC3u8; 50];

        let mut write_params = params(context_id, 4);
        write_params.plaintext_offset = 10;

        let mut enc = CbcEncryptor::new(&key);
        let mut packet = Vec::new();
        write_eklv(
            &mut packet,
            &write_params,
            &source,
            &Iv::generate(),
            &mut enc,
            None,
        )
        .unwrap();

        let info = crypto_info(context_id, false);
        let mut dec = CbcDecryptor::new(&key);
        let mut frame_buf = FrameBuffer::with_capacity(64);

        let mut cursor = Cursor::new(&packet);
        read_eklv(
            &mut cursor,
            &element_ul(),
            &info,
            4,
            &mut frame_buf,
            Some(&mut dec),
            None,
        )
        .unwrap();

        assert_eq!(frame_buf.as_slice(), &source[..]);
        assert_eq!(frame_buf.plaintext_offset(), 10);
    }

    #[test]
    fn test_hmac_detects_tamper() {
        let key = ContentKey::new([0x55; 16]);
        let context_id = [0x21; 16];
        let source = vec![0x77u8; 64];

        let mut enc = CbcEncryptor::new(&key);
        let mut hmac_w = HmacContext::new(&key, KeyDerivationMode::Smpte);
        let mut packet = Vec::new();
        write_eklv(
            &mut packet,
            &params(context_id, 0),
            &source,
            &Iv::new([0x0B; 16]),
            &mut enc,
            Some(&mut hmac_w),
        )
        .unwrap();

        // Flip one bit inside the encrypted source value.
        let mid = packet.len() - INTEGRITY_PACK_SIZE - 8;
        packet[mid] ^= 0x01;

        let info = crypto_info(context_id, true);
        let mut dec = CbcDecryptor::new(&key);
        let mut hmac_r = HmacContext::new(&key, KeyDerivationMode::Smpte);
        let mut frame_buf = FrameBuffer::with_capacity(256);

        let mut cursor = Cursor::new(&packet);
        let err = read_eklv(
            &mut cursor,
            &element_ul(),
            &info,
            0,
            &mut frame_buf,
            Some(&mut dec),
            Some(&mut hmac_r),
        )
        .unwrap_err();
        assert_eq!(err.code(), "HMACFAIL");
    }

    #[test]
    fn test_wrong_sequence_number() {
        let key = ContentKey::new([0x55; 16]);
        let context_id = [0x21; 16];
        let source = vec![0x77u8; 32];

        let mut enc = CbcEncryptor::new(&key);
        let mut hmac_w = HmacContext::new(&key, KeyDerivationMode::Smpte);
        let mut packet = Vec::new();
        write_eklv(
            &mut packet,
            &params(context_id, 6),
            &source,
            &Iv::generate(),
            &mut enc,
            Some(&mut hmac_w),
        )
        .unwrap();

        let info = crypto_info(context_id, true);
        let mut dec = CbcDecryptor::new(&key);
        let mut hmac_r = HmacContext::new(&key, KeyDerivationMode::Smpte);
        let mut frame_buf = FrameBuffer::with_capacity(64);

        // Reading as frame 5 expects sequence 6, not 7.
        let mut cursor = Cursor::new(&packet);
        let err = read_eklv(
            &mut cursor,
            &element_ul(),
            &info,
            5,
            &mut frame_buf,
            Some(&mut dec),
            Some(&mut hmac_r),
        )
        .unwrap_err();
        assert_eq!(err.code(), "HMACFAIL");
    }

    #[test]
    fn test_context_id_mismatch() {
        let key = ContentKey::new([0x55; 16]);
        let source = vec![0x77u8; 32];

        let mut enc = CbcEncryptor::new(&key);
        let mut packet = Vec::new();
        write_eklv(
            &mut packet,
            &params([0x21; 16], 0),
            &source,
            &Iv::generate(),
            &mut enc,
            None,
        )
        .unwrap();

        let info = crypto_info([0x99; 16], false);
        let mut dec = CbcDecryptor::new(&key);
        let mut frame_buf = FrameBuffer::with_capacity(64);

        let mut cursor = Cursor::new(&packet);
        let err = read_eklv(
            &mut cursor,
            &element_ul(),
            &info,
            0,
            &mut frame_buf,
            Some(&mut dec),
            None,
        )
        .unwrap_err();
        assert_eq!(err.code(), "FORMAT");
    }

    #[test]
    fn test_small_buffer() {
        let key = ContentKey::new([0x55; 16]);
        let context_id = [0x21; 16];
        let source = vec![0x77u8; 128];

        let mut enc = CbcEncryptor::new(&key);
        let mut packet = Vec::new();
        write_eklv(
            &mut packet,
            &params(context_id, 0),
            &source,
            &Iv::generate(),
            &mut enc,
            None,
        )
        .unwrap();

        let info = crypto_info(context_id, false);
        let mut dec = CbcDecryptor::new(&key);
        let mut frame_buf = FrameBuffer::with_capacity(64);

        let mut cursor = Cursor::new(&packet);
        let err = read_eklv(
            &mut cursor,
            &element_ul(),
            &info,
            0,
            &mut frame_buf,
            Some(&mut dec),
            None,
        )
        .unwrap_err();
        assert_eq!(err.code(), "SMALLBUF");
    }

    #[test]
    fn test_plaintext_passthrough() {
        let payload = vec![0xDEu8, 0xAD, 0xBE, 0xEF];
        let mut packet = Vec::new();
        Klv::new(*element_ul().as_bytes(), payload.clone())
            .write(&mut packet)
            .unwrap();

        let info = WriterInfo::default();
        let mut frame_buf = FrameBuffer::with_capacity(16);

        let mut cursor = Cursor::new(&packet);
        read_eklv(
            &mut cursor,
            &element_ul(),
            &info,
            0,
            &mut frame_buf,
            None,
            None,
        )
        .unwrap();
        assert_eq!(frame_buf.as_slice(), &payload[..]);
    }

    #[test]
    fn test_ciphertext_passthrough_without_context() {
        // With no decryption context the ciphertext region comes back
        // verbatim, integrity pack included.
        let key = ContentKey::new([0x55; 16]);
        let context_id = [0x21; 16];
        let source = vec![0x77u8; 32];

        let mut enc = CbcEncryptor::new(&key);
        let mut hmac_w = HmacContext::new(&key, KeyDerivationMode::Smpte);
        let mut packet = Vec::new();
        write_eklv(
            &mut packet,
            &params(context_id, 0),
            &source,
            &Iv::generate(),
            &mut enc,
            Some(&mut hmac_w),
        )
        .unwrap();

        let info = crypto_info(context_id, true);
        let mut frame_buf = FrameBuffer::with_capacity(256);

        let mut cursor = Cursor::new(&packet);
        read_eklv(
            &mut cursor,
            &element_ul(),
            &info,
            0,
            &mut frame_buf,
            None,
            None,
        )
        .unwrap();

        let esv_length = calc_esv_length(32, 0).unwrap();
        assert_eq!(frame_buf.size(), esv_length + INTEGRITY_PACK_SIZE);
        assert_eq!(frame_buf.source_length(), 32);
    }
}
