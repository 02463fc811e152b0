//! Index table segments and frame lookup.
//!
//! The footer carries an index table segment mapping frame numbers to
//! stream offsets within the clip. Entries are fixed-size (11 bytes) and
//! appended strictly in frame order, so lookup is O(1).

use crate::error::{MxfError, Result};
use crate::klv::{read_local_set, write_local_set, Klv};
use crate::metadata::{random_uid, tags, InstanceUid};
use crate::types::Rational;
use crate::ul::labels;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;

/// Size of one serialized index entry.
pub const INDEX_ENTRY_SIZE: usize = 11;

/// One frame's index entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    /// Temporal offset (0 for IAB)
    pub temporal_offset: i8,
    /// Key frame offset (0 for IAB)
    pub key_frame_offset: i8,
    /// Entry flags
    pub flags: u8,
    /// Offset of the frame's first byte within the clip
    pub stream_offset: u64,
}

impl IndexEntry {
    /// Random access flag: every IAB frame is independently decodable.
    pub const FLAG_RANDOM_ACCESS: u8 = 0x80;

    /// Entry for a frame starting at `stream_offset`.
    pub fn at_offset(stream_offset: u64) -> Self {
        IndexEntry {
            temporal_offset: 0,
            key_frame_offset: 0,
            flags: Self::FLAG_RANDOM_ACCESS,
            stream_offset,
        }
    }
}

/// Index table segment.
#[derive(Debug, Clone)]
pub struct IndexTableSegment {
    pub instance_uid: InstanceUid,
    pub index_edit_rate: Rational,
    pub index_start_position: i64,
    pub index_duration: i64,
    pub edit_unit_byte_count: u32,
    pub index_sid: u32,
    pub body_sid: u32,
    pub slice_count: u8,
    pub entries: Vec<IndexEntry>,
}

impl IndexTableSegment {
    /// Segment covering `entries` frames at `edit_rate`.
    pub fn new(edit_rate: Rational, index_sid: u32, body_sid: u32, entries: Vec<IndexEntry>) -> Self {
        IndexTableSegment {
            instance_uid: random_uid(),
            index_edit_rate: edit_rate,
            index_start_position: 0,
            index_duration: entries.len() as i64,
            edit_unit_byte_count: 0,
            index_sid,
            body_sid,
            slice_count: 0,
            entries,
        }
    }

    /// Serialize as a KLV local set.
    pub fn to_klv(&self) -> Result<Klv> {
        let mut value = Vec::new();

        write_local_set(&mut value, tags::INSTANCE_UID, &self.instance_uid)?;

        let mut rate = [0u8; 8];
        rate[..4].copy_from_slice(&self.index_edit_rate.numerator.to_be_bytes());
        rate[4..].copy_from_slice(&self.index_edit_rate.denominator.to_be_bytes());
        write_local_set(&mut value, 0x3F0B, &rate)?;

        write_local_set(&mut value, 0x3F0C, &self.index_start_position.to_be_bytes())?;
        write_local_set(&mut value, 0x3F0D, &self.index_duration.to_be_bytes())?;
        write_local_set(&mut value, 0x3F05, &self.edit_unit_byte_count.to_be_bytes())?;
        write_local_set(&mut value, 0x3F06, &self.index_sid.to_be_bytes())?;
        write_local_set(&mut value, 0x3F07, &self.body_sid.to_be_bytes())?;
        write_local_set(&mut value, 0x3F08, &[self.slice_count])?;

        let mut entry_array =
            Vec::with_capacity(8 + self.entries.len() * INDEX_ENTRY_SIZE);
        entry_array.write_u32::<BigEndian>(self.entries.len() as u32)?;
        entry_array.write_u32::<BigEndian>(INDEX_ENTRY_SIZE as u32)?;
        for entry in &self.entries {
            entry_array.write_i8(entry.temporal_offset)?;
            entry_array.write_i8(entry.key_frame_offset)?;
            entry_array.write_u8(entry.flags)?;
            entry_array.write_u64::<BigEndian>(entry.stream_offset)?;
        }
        write_local_set(&mut value, 0x3F0A, &entry_array)?;

        Ok(Klv::new(labels::INDEX_TABLE_SEGMENT, value))
    }

    /// Parse a segment from a KLV value.
    pub fn parse(value: &[u8]) -> Result<Self> {
        let mut segment = IndexTableSegment {
            instance_uid: [0u8; 16],
            index_edit_rate: Rational::default(),
            index_start_position: 0,
            index_duration: 0,
            edit_unit_byte_count: 0,
            index_sid: 0,
            body_sid: 0,
            slice_count: 0,
            entries: Vec::new(),
        };

        let mut offset = 0;
        while offset + 4 <= value.len() {
            let (tag, item, consumed) = read_local_set(value, offset)?;
            match tag {
                tags::INSTANCE_UID => {
                    if item.len() >= 16 {
                        segment.instance_uid.copy_from_slice(&item[..16]);
                    }
                }
                0x3F0B => {
                    if item.len() >= 8 {
                        segment.index_edit_rate = Rational::new(
                            i32::from_be_bytes([item[0], item[1], item[2], item[3]]),
                            i32::from_be_bytes([item[4], item[5], item[6], item[7]]),
                        );
                    }
                }
                0x3F0C => segment.index_start_position = parse_i64(item)?,
                0x3F0D => segment.index_duration = parse_i64(item)?,
                0x3F05 => segment.edit_unit_byte_count = parse_u32(item)?,
                0x3F06 => segment.index_sid = parse_u32(item)?,
                0x3F07 => segment.body_sid = parse_u32(item)?,
                0x3F08 => {
                    if let Some(&count) = item.first() {
                        segment.slice_count = count;
                    }
                }
                0x3F0A => segment.entries = parse_entry_array(item)?,
                _ => {}
            }
            offset += consumed;
        }

        Ok(segment)
    }
}

fn parse_u32(item: &[u8]) -> Result<u32> {
    if item.len() < 4 {
        return Err(MxfError::Format("index u32 item too short".into()));
    }
    Ok(u32::from_be_bytes([item[0], item[1], item[2], item[3]]))
}

fn parse_i64(item: &[u8]) -> Result<i64> {
    if item.len() < 8 {
        return Err(MxfError::Format("index i64 item too short".into()));
    }
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&item[..8]);
    Ok(i64::from_be_bytes(buf))
}

fn parse_entry_array(item: &[u8]) -> Result<Vec<IndexEntry>> {
    let mut cursor = Cursor::new(item);
    let count = cursor.read_u32::<BigEndian>()? as usize;
    let entry_size = cursor.read_u32::<BigEndian>()? as usize;

    if entry_size < INDEX_ENTRY_SIZE {
        return Err(MxfError::Format(format!(
            "index entry size {} below the {}-byte minimum",
            entry_size, INDEX_ENTRY_SIZE
        )));
    }
    if item.len() < 8 + count * entry_size {
        return Err(MxfError::Format("truncated index entry array".into()));
    }

    let mut entries = Vec::with_capacity(count);
    for _ in 0..count {
        let start = cursor.position();
        let temporal_offset = cursor.read_i8()?;
        let key_frame_offset = cursor.read_i8()?;
        let flags = cursor.read_u8()?;
        let stream_offset = cursor.read_u64::<BigEndian>()?;
        entries.push(IndexEntry {
            temporal_offset,
            key_frame_offset,
            flags,
            stream_offset,
        });
        cursor.set_position(start + entry_size as u64);
    }

    Ok(entries)
}

/// In-memory index built from the footer's segments.
#[derive(Debug, Clone, Default)]
pub struct IndexAccess {
    entries: Vec<IndexEntry>,
    edit_rate: Rational,
}

impl IndexAccess {
    /// Build from parsed segments, concatenating entries in segment order.
    pub fn from_segments(segments: &[IndexTableSegment]) -> Self {
        let mut entries = Vec::new();
        let mut edit_rate = Rational::default();
        for segment in segments {
            edit_rate = segment.index_edit_rate;
            entries.extend_from_slice(&segment.entries);
        }
        IndexAccess { entries, edit_rate }
    }

    /// Number of indexed frames.
    pub fn duration(&self) -> u32 {
        self.entries.len() as u32
    }

    /// The index edit rate.
    pub fn edit_rate(&self) -> Rational {
        self.edit_rate
    }

    /// Look up a frame's index entry. Out of range is `RANGE`.
    pub fn lookup(&self, frame_number: u32) -> Result<IndexEntry> {
        self.entries
            .get(frame_number as usize)
            .copied()
            .ok_or(MxfError::Range(frame_number))
    }

    /// Dump one line per entry, for diagnostics.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for (i, entry) in self.entries.iter().enumerate() {
            out.push_str(&format!("{:6}: {}\n", i, entry.stream_offset));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_roundtrip() {
        let entries = vec![
            IndexEntry::at_offset(24),
            IndexEntry::at_offset(34),
            IndexEntry::at_offset(54),
        ];
        let segment = IndexTableSegment::new(Rational::fps_24(), 129, 1, entries.clone());

        let klv = segment.to_klv().unwrap();
        let parsed = IndexTableSegment::parse(&klv.value).unwrap();

        assert_eq!(parsed.index_duration, 3);
        assert_eq!(parsed.index_edit_rate, Rational::fps_24());
        assert_eq!(parsed.index_sid, 129);
        assert_eq!(parsed.body_sid, 1);
        assert_eq!(parsed.slice_count, 0);
        assert_eq!(parsed.entries, entries);
    }

    #[test]
    fn test_lookup_and_range() {
        let segment = IndexTableSegment::new(
            Rational::fps_24(),
            129,
            1,
            vec![IndexEntry::at_offset(24), IndexEntry::at_offset(100)],
        );
        let access = IndexAccess::from_segments(&[segment]);

        assert_eq!(access.duration(), 2);
        assert_eq!(access.lookup(1).unwrap().stream_offset, 100);

        let err = access.lookup(2).unwrap_err();
        assert_eq!(err.code(), "RANGE");
    }

    #[test]
    fn test_entries_strictly_ascending() {
        let offsets = [24u64, 34, 54, 1000];
        let entries: Vec<_> = offsets.iter().map(|&o| IndexEntry::at_offset(o)).collect();
        let access =
            IndexAccess::from_segments(&[IndexTableSegment::new(Rational::fps_24(), 129, 1, entries)]);

        for window in (0..access.duration()).collect::<Vec<_>>().windows(2) {
            let a = access.lookup(window[0]).unwrap().stream_offset;
            let b = access.lookup(window[1]).unwrap().stream_offset;
            assert!(a < b);
        }
    }

    #[test]
    fn test_oversized_entry_stride() {
        // Entry sizes above the minimum must be tolerated by skipping.
        let mut item = Vec::new();
        item.write_u32::<BigEndian>(2).unwrap();
        item.write_u32::<BigEndian>(13).unwrap();
        for offset in [7u64, 9] {
            item.write_i8(0).unwrap();
            item.write_i8(0).unwrap();
            item.write_u8(0x80).unwrap();
            item.write_u64::<BigEndian>(offset).unwrap();
            item.write_u16::<BigEndian>(0).unwrap(); // stride padding
        }

        let entries = parse_entry_array(&item).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].stream_offset, 9);
    }
}
