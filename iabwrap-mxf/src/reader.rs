//! Clip-wrap reader state machine.
//!
//! The reader parses the header partition into the metadata tree, loads
//! the footer's index table, and serves frames by index lookup. IAB frames
//! are composed from their internal preamble and frame segments, each a
//! 1-byte tag plus 4-byte big-endian length. A one-frame cache avoids
//! repeating I/O when the same frame is requested twice.

use crate::error::{MxfError, Result};
use crate::index::{IndexAccess, IndexTableSegment};
use crate::klv::{read_kl, KlvReader};
use crate::metadata::HeaderMetadata;
use crate::partition::{Partition, PartitionKind, RandomIndexPack};
use crate::types::{LabelSetType, WriterInfo};
use crate::ul::{labels, UniversalLabel};
use std::io::{Read, Seek, SeekFrom};

/// Upper bound on the header metadata region, as a corruption guard.
const MAX_HEADER_REGION: u64 = 64 * 1024 * 1024;

/// Size of a preamble or frame tag-length: 1-byte tag, 4-byte length.
const TL_SIZE: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReaderState {
    Begin,
    Ready,
    Running,
}

/// Clip-wrap IAB track file reader.
///
/// State machine: `Begin -> Ready` on a successful [`open_read`],
/// `Ready -> Running` on the first [`read_frame`]. Fatal parse and I/O
/// failures reset to `Begin`; `RANGE` and `SMALLBUF` leave the reader
/// usable.
///
/// [`open_read`]: IabReader::open_read
/// [`read_frame`]: IabReader::read_frame
pub struct IabReader<R: Read + Seek> {
    state: ReaderState,
    inner: Option<Inner<R>>,
}

struct Inner<R> {
    file: R,
    info: WriterInfo,
    metadata: HeaderMetadata,
    header_partition: Partition,
    rip: RandomIndexPack,
    index: IndexAccess,
    essence_start: u64,
    current_frame_index: Option<u32>,
    frame_buffer: Vec<u8>,
}

impl<R: Read + Seek> Default for IabReader<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Read + Seek> IabReader<R> {
    /// Create a reader in the `Begin` state.
    pub fn new() -> Self {
        IabReader {
            state: ReaderState::Begin,
            inner: None,
        }
    }

    /// Open a track file: parse the header partition and metadata tree,
    /// locate the essence, and load the footer index.
    ///
    /// Calling this anywhere but `Begin` is `STATE`.
    pub fn open_read(&mut self, file: R) -> Result<()> {
        if self.state != ReaderState::Begin {
            return Err(MxfError::State);
        }

        match Inner::open(file) {
            Ok(inner) => {
                self.inner = Some(inner);
                self.state = ReaderState::Ready;
                Ok(())
            }
            Err(e) => {
                self.reset();
                Err(e)
            }
        }
    }

    /// Close the reader, releasing the source. `INIT` if never opened.
    pub fn close(&mut self) -> Result<()> {
        if self.state == ReaderState::Begin {
            return Err(MxfError::Init);
        }
        self.reset();
        Ok(())
    }

    /// Number of frames in the index.
    pub fn frame_count(&self) -> Result<u32> {
        match &self.inner {
            Some(inner) if self.state != ReaderState::Begin => Ok(inner.index.duration()),
            _ => Err(MxfError::Init),
        }
    }

    /// Read frame `frame_number`, composing preamble TL + preamble +
    /// frame TL + frame. The result stays cached until a different frame
    /// is requested, so an immediate re-read performs no I/O.
    ///
    /// `RANGE` for an out-of-range frame leaves the reader untouched.
    pub fn read_frame(&mut self, frame_number: u32) -> Result<&[u8]> {
        if self.state == ReaderState::Begin {
            return Err(MxfError::Init);
        }
        let inner = self.inner.as_mut().ok_or(MxfError::Init)?;

        if inner.current_frame_index != Some(frame_number) {
            // Out of range must not disturb the cache or the state.
            let entry = inner.index.lookup(frame_number).inspect_err(|_| {
                log::error!("frame value out of range: {}", frame_number);
            })?;

            if let Err(e) = inner.load_frame(frame_number, entry.stream_offset) {
                self.reset();
                return Err(e);
            }
        }

        self.state = ReaderState::Running;
        let inner = self.inner.as_ref().ok_or(MxfError::Init)?;
        Ok(&inner.frame_buffer)
    }

    /// Locate a text-based metadata stream by its description and return
    /// its MIME type and payload.
    pub fn read_metadata(&mut self, description: &str) -> Result<(String, Vec<u8>)> {
        if self.state == ReaderState::Begin {
            return Err(MxfError::Init);
        }
        let inner = self.inner.as_mut().ok_or(MxfError::Init)?;
        inner.read_metadata(description)
    }

    /// Identity and crypto signaling recovered from the header.
    pub fn fill_writer_info(&self) -> Result<WriterInfo> {
        match &self.inner {
            Some(inner) if self.state != ReaderState::Begin => Ok(inner.info.clone()),
            _ => Err(MxfError::Fail("reader not open".into())),
        }
    }

    /// The parsed header metadata tree. `INIT` before open.
    pub fn header_metadata(&self) -> Result<&HeaderMetadata> {
        match &self.inner {
            Some(inner) if self.state != ReaderState::Begin => Ok(&inner.metadata),
            _ => Err(MxfError::Init),
        }
    }

    /// The random index pack. `INIT` before open.
    pub fn rip(&self) -> Result<&RandomIndexPack> {
        match &self.inner {
            Some(inner) if self.state != ReaderState::Begin => Ok(&inner.rip),
            _ => Err(MxfError::Init),
        }
    }

    /// The header partition pack. `INIT` before open.
    pub fn header_partition(&self) -> Result<&Partition> {
        match &self.inner {
            Some(inner) if self.state != ReaderState::Begin => Ok(&inner.header_partition),
            _ => Err(MxfError::Init),
        }
    }

    /// Dump the header metadata tree, for diagnostics.
    pub fn dump_header_metadata(&self) -> Result<String> {
        self.header_metadata().map(|metadata| metadata.dump())
    }

    /// Dump the frame index, for diagnostics.
    pub fn dump_index(&self) -> Result<String> {
        match &self.inner {
            Some(inner) if self.state != ReaderState::Begin => Ok(inner.index.dump()),
            _ => Err(MxfError::Init),
        }
    }

    fn reset(&mut self) {
        self.inner = None;
        self.state = ReaderState::Begin;
    }
}

impl<R: Read + Seek> Inner<R> {
    fn open(mut file: R) -> Result<Self> {
        // The RIP is read lazily from the end of the file; everything else
        // hangs off it and the header partition pack.
        let rip = RandomIndexPack::read_from_end(&mut file)?;

        file.seek(SeekFrom::Start(0))?;
        let header_partition = Partition::read_from(&mut file)?;
        if header_partition.kind != PartitionKind::Header {
            return Err(MxfError::Format("file does not start with a header partition".into()));
        }

        if header_partition.header_byte_count > MAX_HEADER_REGION {
            return Err(MxfError::Format(format!(
                "implausible header byte count: {}",
                header_partition.header_byte_count
            )));
        }

        let mut metadata = HeaderMetadata::new();
        let mut region = vec![0u8; header_partition.header_byte_count as usize];
        file.read_exact(&mut region).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                MxfError::ReadFail("truncated header metadata region".into())
            } else {
                MxfError::Io(e)
            }
        })?;

        let mut klv_reader = KlvReader::new(&region);
        while let Some(klv) = klv_reader.read_klv()? {
            if klv.key.is_fill_item() || klv.key.is_primer_pack() {
                continue;
            }
            metadata.parse_and_add(&klv)?;
        }

        // Position is now the first byte after the header region: the
        // start of the clip KL in a two-partition file.
        let mut essence_start = file.stream_position()?;

        // A three-pair RIP marks a file whose essence sits behind a body
        // partition; re-position there and continue past its pack.
        if rip.entries.len() == 3 {
            file.seek(SeekFrom::Start(rip.entries[1].byte_offset))?;
            let second = Partition::read_from(&mut file)?;
            if second.kind == PartitionKind::Body {
                essence_start = file.stream_position()?;
            } else {
                log::warn!(
                    "second RIP pair points at a {:?} partition, keeping header-relative essence start",
                    second.kind
                );
            }
        }

        // The profile requires the IAB descriptor chain and at least one
        // essence track.
        if metadata.get_by_type(&labels::IAB_ESSENCE_DESCRIPTOR).is_none() {
            return Err(MxfError::MissingMetadata("IABEssenceDescriptor"));
        }
        if metadata
            .get_by_type(&labels::IAB_SOUNDFIELD_LABEL_SUBDESCRIPTOR)
            .is_none()
        {
            return Err(MxfError::MissingMetadata("IABSoundfieldLabelSubDescriptor"));
        }
        if metadata.get_all_by_type(&labels::TIMELINE_TRACK).is_empty() {
            return Err(MxfError::MissingMetadata("Track"));
        }

        let info = Self::init_info(&metadata, &header_partition);

        // Footer: partition pack, then the index table segments.
        file.seek(SeekFrom::Start(header_partition.footer_partition))?;
        let footer = Partition::read_from(&mut file)?;
        if footer.kind != PartitionKind::Footer {
            return Err(MxfError::Format("footer offset does not hold a footer partition".into()));
        }

        let mut segments = Vec::new();
        if footer.index_byte_count > 0 {
            if footer.index_byte_count > MAX_HEADER_REGION {
                return Err(MxfError::Format(format!(
                    "implausible index byte count: {}",
                    footer.index_byte_count
                )));
            }
            let mut index_region = vec![0u8; footer.index_byte_count as usize];
            file.read_exact(&mut index_region).map_err(|e| {
                if e.kind() == std::io::ErrorKind::UnexpectedEof {
                    MxfError::ReadFail("truncated index region".into())
                } else {
                    MxfError::Io(e)
                }
            })?;

            let mut index_reader = KlvReader::new(&index_region);
            while let Some(klv) = index_reader.read_klv()? {
                if klv.key.is_index_table_segment() {
                    segments.push(IndexTableSegment::parse(&klv.value)?);
                } else if !klv.key.is_fill_item() {
                    log::warn!("unexpected KLV in index region: {}", klv.key);
                }
            }
        }
        let index = IndexAccess::from_segments(&segments);

        file.seek(SeekFrom::Start(essence_start))?;

        log::debug!(
            "opened track file: {} frames, essence at {}",
            index.duration(),
            essence_start
        );

        Ok(Inner {
            file,
            info,
            metadata,
            header_partition,
            rip,
            index,
            essence_start,
            current_frame_index: None,
            frame_buffer: Vec::new(),
        })
    }

    fn init_info(metadata: &HeaderMetadata, header_partition: &Partition) -> WriterInfo {
        let mut info = WriterInfo::default();

        let op = UniversalLabel(header_partition.operational_pattern);
        info.label_set_type = if op.as_bytes() == &labels::INTEROP_OP_ATOM {
            LabelSetType::Interop
        } else if op.as_bytes() == &labels::OP_ATOM {
            LabelSetType::Smpte
        } else {
            LabelSetType::Unknown
        };

        if let Some(ident) = metadata
            .get_by_type(&labels::IDENTIFICATION)
            .and_then(|set| set.as_identification())
        {
            info.company_name = ident.company_name.clone();
            info.product_name = ident.product_name.clone();
            info.product_version = ident.version_string.clone();
            info.product_uuid = ident.product_uid;
        }

        if let Some(package) = metadata
            .get_by_type(&labels::SOURCE_PACKAGE)
            .and_then(|set| set.as_source_package())
        {
            info.asset_uuid
                .copy_from_slice(package.package_uid.uuid_portion());
        }

        if let Some(ctx) = metadata
            .get_by_type(&labels::CRYPTOGRAPHIC_CONTEXT)
            .and_then(|set| set.as_cryptographic_context())
        {
            info.encrypted_essence = true;
            info.context_id = ctx.context_id;
            info.uses_hmac = ctx.mic_algorithm != [0u8; 16];
        }

        info
    }

    fn load_frame(&mut self, frame_number: u32, stream_offset: u64) -> Result<()> {
        self.file
            .seek(SeekFrom::Start(self.essence_start + stream_offset))?;

        // Preamble TL + preamble.
        let mut preamble_tl = [0u8; TL_SIZE];
        self.read_exact(&mut preamble_tl, "IA frame preamble")?;
        let preamble_len = u32::from_be_bytes([
            preamble_tl[1],
            preamble_tl[2],
            preamble_tl[3],
            preamble_tl[4],
        ]) as usize;

        let mut buffer = Vec::with_capacity(2 * TL_SIZE + preamble_len);
        buffer.extend_from_slice(&preamble_tl);
        if preamble_len > 0 {
            let start = buffer.len();
            buffer.resize(start + preamble_len, 0);
            self.read_exact(&mut buffer[start..], "IA frame preamble")?;
        }

        // Frame TL + frame.
        let mut frame_tl = [0u8; TL_SIZE];
        self.read_exact(&mut frame_tl, "IA frame data")?;
        let frame_len =
            u32::from_be_bytes([frame_tl[1], frame_tl[2], frame_tl[3], frame_tl[4]]) as usize;
        buffer.extend_from_slice(&frame_tl);
        if frame_len > 0 {
            let start = buffer.len();
            buffer.resize(start + frame_len, 0);
            self.read_exact(&mut buffer[start..], "IA frame data")?;
        }

        self.frame_buffer = buffer;
        self.current_frame_index = Some(frame_number);
        Ok(())
    }

    fn read_exact(&mut self, buf: &mut [u8], what: &str) -> Result<()> {
        self.file.read_exact(buf).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                log::error!("error reading {}", what);
                MxfError::ReadFail(format!("truncated {}", what))
            } else {
                MxfError::Io(e)
            }
        })
    }

    fn read_metadata(&mut self, description: &str) -> Result<(String, Vec<u8>)> {
        let mut target = None;
        for set in self
            .metadata
            .get_all_by_type(&labels::GENERIC_STREAM_TEXT_BASED_SET)
        {
            if let Some(text_set) = set.as_text_based_set() {
                if text_set.text_data_description == description {
                    target = Some((
                        text_set.text_mime_media_type.clone(),
                        text_set.generic_stream_sid,
                    ));
                    break;
                }
            }
        }

        let (mime_type, stream_sid) =
            target.ok_or(MxfError::MissingMetadata("GenericStreamTextBasedSet"))?;

        let pair = self
            .rip
            .find_sid(stream_sid)
            .ok_or(MxfError::MissingMetadata("generic stream partition"))?;

        self.file.seek(SeekFrom::Start(pair.byte_offset))?;
        let partition = Partition::read_from(&mut self.file)?;
        if partition.kind != PartitionKind::GenericStream {
            log::warn!(
                "RIP pair for SID {} points at a {:?} partition",
                stream_sid,
                partition.kind
            );
        }

        let (key, length, _) = read_kl(&mut self.file)?;
        if !key.matches_ignoring_stream(&labels::GENERIC_STREAM_DATA_ELEMENT) {
            return Err(MxfError::Format(format!(
                "expected a generic stream data element, found {}",
                key
            )));
        }

        let mut payload = vec![0u8; length as usize];
        self.read_exact(&mut payload, "generic stream payload")?;

        Ok((mime_type, payload))
    }
}
