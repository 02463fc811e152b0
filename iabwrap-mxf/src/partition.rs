//! Partition packs and the random index pack.
//!
//! A track file is divided into partitions: a header partition (always),
//! optional body and generic-stream partitions, and a footer partition.
//! The random index pack (RIP) trails the file and lists every partition's
//! body SID and byte offset.

use crate::error::{MxfError, Result};
use crate::klv::{self, encode_ber_length, read_kl, UL_LENGTH};
use crate::ul::{labels, UniversalLabel, UL};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Read, Seek, SeekFrom, Write};

/// Partition kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionKind {
    /// Header partition
    Header,
    /// Body partition
    Body,
    /// Generic stream partition (RP 2057)
    GenericStream,
    /// Footer partition
    Footer,
}

/// Partition status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionStatus {
    /// Open (not yet finalized)
    Open,
    /// Closed (finalized)
    Closed,
}

/// Partition pack record
#[derive(Debug, Clone)]
pub struct Partition {
    /// Partition kind
    pub kind: PartitionKind,
    /// Status (open/closed)
    pub status: PartitionStatus,
    /// Major version (1)
    pub major_version: u16,
    /// Minor version (2 or 3)
    pub minor_version: u16,
    /// KAG size (key alignment grid)
    pub kag_size: u32,
    /// This partition's offset in the file
    pub this_partition: u64,
    /// Previous partition offset
    pub previous_partition: u64,
    /// Footer partition offset
    pub footer_partition: u64,
    /// Bytes of primer + metadata + fill following the pack
    pub header_byte_count: u64,
    /// Bytes of index segments following the metadata
    pub index_byte_count: u64,
    /// Index SID (stream ID for index)
    pub index_sid: u32,
    /// Body offset
    pub body_offset: u64,
    /// Body SID (stream ID for essence)
    pub body_sid: u32,
    /// Operational pattern
    pub operational_pattern: UL,
    /// Essence containers
    pub essence_containers: Vec<UL>,
}

impl Default for Partition {
    fn default() -> Self {
        Partition {
            kind: PartitionKind::Header,
            status: PartitionStatus::Closed,
            major_version: 1,
            minor_version: 3,
            kag_size: 1,
            this_partition: 0,
            previous_partition: 0,
            footer_partition: 0,
            header_byte_count: 0,
            index_byte_count: 0,
            index_sid: 0,
            body_offset: 0,
            body_sid: 0,
            operational_pattern: labels::OP_ATOM,
            essence_containers: Vec::new(),
        }
    }
}

impl Partition {
    /// Create header partition
    pub fn header() -> Self {
        Partition {
            kind: PartitionKind::Header,
            ..Default::default()
        }
    }

    /// Create body partition
    pub fn body() -> Self {
        Partition {
            kind: PartitionKind::Body,
            ..Default::default()
        }
    }

    /// Create generic stream partition
    pub fn generic_stream() -> Self {
        Partition {
            kind: PartitionKind::GenericStream,
            ..Default::default()
        }
    }

    /// Create footer partition
    pub fn footer() -> Self {
        Partition {
            kind: PartitionKind::Footer,
            ..Default::default()
        }
    }

    /// The partition pack key for this kind and status
    pub fn pack_ul(&self) -> UL {
        match (self.kind, self.status) {
            (PartitionKind::Header, PartitionStatus::Open) => {
                labels::HEADER_PARTITION_OPEN_INCOMPLETE
            }
            (PartitionKind::Header, PartitionStatus::Closed) => {
                labels::HEADER_PARTITION_CLOSED_COMPLETE
            }
            (PartitionKind::Body, _) => labels::BODY_PARTITION_CLOSED_COMPLETE,
            (PartitionKind::GenericStream, _) => labels::GENERIC_STREAM_PARTITION,
            (PartitionKind::Footer, _) => labels::FOOTER_PARTITION,
        }
    }

    /// Value size of the pack (everything after the key and length)
    fn value_size(&self) -> usize {
        88 + self.essence_containers.len() * 16
    }

    /// Total serialized size including key and length
    pub fn size(&self) -> usize {
        let value_size = self.value_size();
        UL_LENGTH + klv::ber_length_size(value_size) + value_size
    }

    /// Write the partition pack
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<usize> {
        writer.write_all(&self.pack_ul())?;

        let value_size = self.value_size();
        let len_bytes = encode_ber_length(value_size);
        writer.write_all(&len_bytes)?;

        writer.write_u16::<BigEndian>(self.major_version)?;
        writer.write_u16::<BigEndian>(self.minor_version)?;
        writer.write_u32::<BigEndian>(self.kag_size)?;
        writer.write_u64::<BigEndian>(self.this_partition)?;
        writer.write_u64::<BigEndian>(self.previous_partition)?;
        writer.write_u64::<BigEndian>(self.footer_partition)?;
        writer.write_u64::<BigEndian>(self.header_byte_count)?;
        writer.write_u64::<BigEndian>(self.index_byte_count)?;
        writer.write_u32::<BigEndian>(self.index_sid)?;
        writer.write_u64::<BigEndian>(self.body_offset)?;
        writer.write_u32::<BigEndian>(self.body_sid)?;
        writer.write_all(&self.operational_pattern)?;

        writer.write_u32::<BigEndian>(self.essence_containers.len() as u32)?;
        writer.write_u32::<BigEndian>(16)?;
        for ec in &self.essence_containers {
            writer.write_all(ec)?;
        }

        Ok(UL_LENGTH + len_bytes.len() + value_size)
    }

    /// Read a partition pack from the reader's current position.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let (key, length, _) = read_kl(reader)?;

        if !key.is_partition_pack() {
            return Err(MxfError::Format(format!(
                "expected a partition pack, found {}",
                key
            )));
        }

        let mut value = vec![0u8; length as usize];
        reader.read_exact(&mut value).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                MxfError::ReadFail("truncated partition pack".into())
            } else {
                MxfError::Io(e)
            }
        })?;

        Self::parse_value(&key, &value)
    }

    /// Parse a partition from a full KLV slice (key, length, value).
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(data);
        Self::read_from(&mut cursor)
    }

    fn parse_value(key: &UniversalLabel, value: &[u8]) -> Result<Self> {
        if value.len() < 88 {
            return Err(MxfError::ReadFail(format!(
                "partition pack value needs 88 bytes, {} available",
                value.len()
            )));
        }

        let key_bytes = key.as_bytes();
        let kind = if key.is_generic_stream_partition() {
            PartitionKind::GenericStream
        } else {
            match key_bytes[13] {
                0x02 => PartitionKind::Header,
                0x03 => PartitionKind::Body,
                0x04 => PartitionKind::Footer,
                other => {
                    return Err(MxfError::Format(format!(
                        "unknown partition type: {:02x}",
                        other
                    )))
                }
            }
        };

        let status = match key_bytes[14] {
            0x01 | 0x03 => PartitionStatus::Open,
            _ => PartitionStatus::Closed,
        };

        let mut cursor = Cursor::new(value);
        let major_version = cursor.read_u16::<BigEndian>()?;
        let minor_version = cursor.read_u16::<BigEndian>()?;
        let kag_size = cursor.read_u32::<BigEndian>()?;
        let this_partition = cursor.read_u64::<BigEndian>()?;
        let previous_partition = cursor.read_u64::<BigEndian>()?;
        let footer_partition = cursor.read_u64::<BigEndian>()?;
        let header_byte_count = cursor.read_u64::<BigEndian>()?;
        let index_byte_count = cursor.read_u64::<BigEndian>()?;
        let index_sid = cursor.read_u32::<BigEndian>()?;
        let body_offset = cursor.read_u64::<BigEndian>()?;
        let body_sid = cursor.read_u32::<BigEndian>()?;

        let mut operational_pattern = [0u8; 16];
        cursor.read_exact(&mut operational_pattern)?;

        let batch_count = cursor.read_u32::<BigEndian>()?;
        let batch_item_size = cursor.read_u32::<BigEndian>()?;

        let mut essence_containers = Vec::new();
        for _ in 0..batch_count {
            if batch_item_size == 16 {
                let mut ul = [0u8; 16];
                cursor.read_exact(&mut ul)?;
                essence_containers.push(ul);
            } else {
                cursor.set_position(cursor.position() + batch_item_size as u64);
            }
        }

        Ok(Partition {
            kind,
            status,
            major_version,
            minor_version,
            kag_size,
            this_partition,
            previous_partition,
            footer_partition,
            header_byte_count,
            index_byte_count,
            index_sid,
            body_offset,
            body_sid,
            operational_pattern,
            essence_containers,
        })
    }

    /// Add an essence container label
    pub fn add_essence_container(&mut self, ul: UL) {
        if !self.essence_containers.contains(&ul) {
            self.essence_containers.push(ul);
        }
    }
}

/// Random Index Pack entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RipEntry {
    /// Body SID (0 for partitions with no essence stream)
    pub body_sid: u32,
    /// Byte offset of the partition
    pub byte_offset: u64,
}

/// Random Index Pack
#[derive(Debug, Clone, Default)]
pub struct RandomIndexPack {
    pub entries: Vec<RipEntry>,
}

impl RandomIndexPack {
    /// Create new RIP
    pub fn new() -> Self {
        RandomIndexPack {
            entries: Vec::new(),
        }
    }

    /// Add entry
    pub fn add_entry(&mut self, body_sid: u32, byte_offset: u64) {
        self.entries.push(RipEntry {
            body_sid,
            byte_offset,
        });
    }

    /// Find the entry for a given body SID
    pub fn find_sid(&self, body_sid: u32) -> Option<&RipEntry> {
        self.entries.iter().find(|entry| entry.body_sid == body_sid)
    }

    /// Write the RIP: key, BER length, (SID, offset) pairs, and the 4-byte
    /// overall length used to locate the pack from the end of the file.
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<usize> {
        let value_size = self.entries.len() * 12 + 4;

        writer.write_all(&labels::RANDOM_INDEX_PACK)?;

        let len_bytes = encode_ber_length(value_size);
        writer.write_all(&len_bytes)?;

        for entry in &self.entries {
            writer.write_u32::<BigEndian>(entry.body_sid)?;
            writer.write_u64::<BigEndian>(entry.byte_offset)?;
        }

        let overall_length = (UL_LENGTH + len_bytes.len() + value_size) as u32;
        writer.write_u32::<BigEndian>(overall_length)?;

        Ok(overall_length as usize)
    }

    /// Locate and parse the RIP from the end of a seekable stream. The
    /// stream position is left unspecified afterwards.
    pub fn read_from_end<R: Read + Seek>(reader: &mut R) -> Result<Self> {
        let file_len = reader.seek(SeekFrom::End(0))?;
        if file_len < 24 {
            return Err(MxfError::Format("file too short to carry a RIP".into()));
        }

        reader.seek(SeekFrom::End(-4))?;
        let overall_length = reader.read_u32::<BigEndian>()? as u64;

        if overall_length < 24 || overall_length > file_len {
            return Err(MxfError::Format(format!(
                "implausible RIP length: {}",
                overall_length
            )));
        }

        reader.seek(SeekFrom::Start(file_len - overall_length))?;
        let (key, length, _) = read_kl(reader)?;

        if !key.is_random_index_pack() {
            return Err(MxfError::Format(format!(
                "expected the random index pack, found {}",
                key
            )));
        }

        let mut value = vec![0u8; length as usize];
        reader.read_exact(&mut value)?;
        Self::parse_value(&value)
    }

    fn parse_value(value: &[u8]) -> Result<Self> {
        if value.len() < 4 || (value.len() - 4) % 12 != 0 {
            return Err(MxfError::Format(format!(
                "RIP value length {} is not a whole number of pairs",
                value.len()
            )));
        }

        let pair_count = (value.len() - 4) / 12;
        let mut cursor = Cursor::new(value);

        let mut entries = Vec::with_capacity(pair_count);
        for _ in 0..pair_count {
            let body_sid = cursor.read_u32::<BigEndian>()?;
            let byte_offset = cursor.read_u64::<BigEndian>()?;
            entries.push(RipEntry {
                body_sid,
                byte_offset,
            });
        }

        Ok(RandomIndexPack { entries })
    }
}
