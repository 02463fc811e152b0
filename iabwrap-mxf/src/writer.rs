//! Clip-wrap writer state machine.
//!
//! The writer emits a header partition with the full metadata tree inside
//! a reserved 16 KiB region, reserves the clip's key and 8-byte BER length,
//! streams opaque IAB frames while indexing them, back-patches the clip
//! length, and finishes with a footer partition carrying the index table
//! segment and the random index pack.

use crate::error::{MxfError, Result};
use crate::index::{IndexEntry, IndexTableSegment};
use crate::klv::{self, write_ber, CLIP_BER_LENGTH, RESERVED_KL_SIZE, UL_LENGTH};
use crate::metadata::{
    random_uid, ContentStorage, CryptographicContext, DmSegment, GenericStreamTextBasedSet,
    HeaderMetadata, IabEssenceDescriptor, IabSoundfieldLabelSubDescriptor, Identification,
    InstanceUid, MetadataSet, Package, Preface, PrimerPack, Sequence, SourceClip,
    TextBasedDmFramework, Track,
};
use crate::partition::{Partition, PartitionStatus, RandomIndexPack};
use crate::types::{LabelSetType, MxfTimestamp, Rational, Umid, WriterInfo};
use crate::ul::{labels, UniversalLabel, UL};
use std::io::{Seek, SeekFrom, Write};

/// Size of the reserved header region, clip essence starts right after it.
pub const RESERVED_HEADER_SIZE: u64 = 16 * 1024;

/// Body SID of the clip essence stream.
const ESSENCE_BODY_SID: u32 = 1;

/// Index SID of the footer index table.
const INDEX_SID: u32 = 129;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    Begin,
    Ready,
    Running,
}

/// Clip-wrap IAB track file writer.
///
/// State machine: `Begin -> Ready` on a successful [`open_write`],
/// `Ready -> Running` on the first [`write_frame`]. Any failure during a
/// transition resets the writer to `Begin` and releases the sink.
///
/// [`open_write`]: IabWriter::open_write
/// [`write_frame`]: IabWriter::write_frame
pub struct IabWriter<W: Write + Seek> {
    state: WriterState,
    inner: Option<Inner<W>>,
}

struct Inner<W> {
    file: W,
    info: WriterInfo,
    metadata: HeaderMetadata,
    rip: RandomIndexPack,
    index_entries: Vec<IndexEntry>,
    edit_rate: Rational,
    frames_written: u32,
    stream_offset: u64,
    clip_start: u64,
    element_ul: UniversalLabel,
    file_package_uid: InstanceUid,
    duration_targets: Vec<InstanceUid>,
    next_generic_stream_id: u32,
    next_track_id: u32,
    last_partition_offset: u64,
}

impl<W: Write + Seek> Default for IabWriter<W> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write + Seek> IabWriter<W> {
    /// Create a writer in the `Begin` state.
    pub fn new() -> Self {
        IabWriter {
            state: WriterState::Begin,
            inner: None,
        }
    }

    /// Open the sink for writing: build the metadata tree, emit the header
    /// region, and reserve the clip's key and length.
    ///
    /// Calling this anywhere but `Begin` is `STATE`.
    pub fn open_write(
        &mut self,
        file: W,
        info: &WriterInfo,
        soundfield: &IabSoundfieldLabelSubDescriptor,
        conforms_to_specs: &[UL],
        edit_rate: Rational,
        sample_rate: Rational,
    ) -> Result<()> {
        if self.state != WriterState::Begin {
            return Err(MxfError::State);
        }

        match Inner::open(file, info, soundfield, conforms_to_specs, edit_rate, sample_rate) {
            Ok(inner) => {
                self.inner = Some(inner);
                self.state = WriterState::Ready;
                Ok(())
            }
            Err(e) => {
                self.reset();
                Err(e)
            }
        }
    }

    /// Append one opaque IAB frame to the clip and index it.
    pub fn write_frame(&mut self, frame: &[u8]) -> Result<()> {
        if self.state == WriterState::Begin {
            return Err(MxfError::Init);
        }
        let inner = self.inner.as_mut().ok_or(MxfError::Init)?;

        inner
            .index_entries
            .push(IndexEntry::at_offset(inner.stream_offset));

        if let Err(e) = inner.file.write_all(frame) {
            self.reset();
            return Err(e.into());
        }

        inner.frames_written += 1;
        inner.stream_offset += frame.len() as u64;
        self.state = WriterState::Running;
        Ok(())
    }

    /// Back-patch the reserved clip length with the streamed byte count,
    /// restoring the file position afterwards.
    pub fn finalize_clip(&mut self) -> Result<()> {
        if self.state == WriterState::Begin {
            return Err(MxfError::Init);
        }
        let inner = self.inner.as_mut().ok_or(MxfError::Init)?;

        let result: Result<()> = (|| {
            let current = inner.file.stream_position()?;
            inner
                .file
                .seek(SeekFrom::Start(inner.clip_start + UL_LENGTH as u64))?;
            write_ber(
                &mut inner.file,
                inner.stream_offset - RESERVED_KL_SIZE as u64,
                CLIP_BER_LENGTH,
            )?;
            inner.file.seek(SeekFrom::Start(current))?;
            Ok(())
        })();

        if result.is_err() {
            self.reset();
        }
        result
    }

    /// Emit the footer partition (index table segment included) and the
    /// random index pack, then reset to `Begin` regardless of the outcome.
    /// On success the sink is handed back, flushed.
    pub fn finalize_mxf(&mut self) -> Result<W> {
        if self.state == WriterState::Begin {
            return Err(MxfError::Init);
        }
        let mut inner = self.inner.take().ok_or(MxfError::Init)?;
        self.state = WriterState::Begin;

        inner.write_footer()?;
        inner.file.flush()?;
        Ok(inner.file)
    }

    /// Add an RP 2057 text-based metadata stream: the descriptive track
    /// chain in the header tree, a generic stream partition, and the
    /// payload as a generic stream data element.
    pub fn write_metadata(
        &mut self,
        track_label: &str,
        mime_type: &str,
        description: &str,
        payload: &[u8],
    ) -> Result<()> {
        if self.state == WriterState::Begin {
            return Err(MxfError::Init);
        }
        let inner = self.inner.as_mut().ok_or(MxfError::Init)?;
        inner.write_metadata(track_label, mime_type, description, payload)
    }

    /// The header metadata tree. `INIT` before a successful open.
    pub fn header_metadata(&self) -> Result<&HeaderMetadata> {
        match &self.inner {
            Some(inner) if self.state != WriterState::Begin => Ok(&inner.metadata),
            _ => Err(MxfError::Init),
        }
    }

    /// The random index pack collected so far. `INIT` before open.
    pub fn rip(&self) -> Result<&RandomIndexPack> {
        match &self.inner {
            Some(inner) if self.state != WriterState::Begin => Ok(&inner.rip),
            _ => Err(MxfError::Init),
        }
    }

    /// Frames written so far.
    pub fn frames_written(&self) -> u32 {
        self.inner.as_ref().map(|i| i.frames_written).unwrap_or(0)
    }

    fn reset(&mut self) {
        self.inner = None;
        self.state = WriterState::Begin;
    }
}

impl<W: Write + Seek> Inner<W> {
    fn open(
        file: W,
        info: &WriterInfo,
        soundfield: &IabSoundfieldLabelSubDescriptor,
        conforms_to_specs: &[UL],
        edit_rate: Rational,
        sample_rate: Rational,
    ) -> Result<Self> {
        let mut element_ul = labels::IAB_CLIP_WRAPPED_ELEMENT;
        element_ul[13] = 1; // one element
        element_ul[15] = 1; // one track
        let element_ul = UniversalLabel(element_ul);

        let mut metadata = HeaderMetadata::new();
        let mut duration_targets = Vec::new();

        // File (source) package UMID, carrying the asset UUID as its
        // material number when one was supplied.
        let mut file_package_umid = Umid::generate();
        if info.asset_uuid != [0u8; 16] {
            file_package_umid.0[16..32].copy_from_slice(&info.asset_uuid);
        }
        let material_package_umid = Umid::generate();

        let track_number = u32::from_be_bytes([
            element_ul.as_bytes()[12],
            element_ul.as_bytes()[13],
            element_ul.as_bytes()[14],
            element_ul.as_bytes()[15],
        ]);

        // Material package: sound track referencing the file package.
        let material_clip_uid = metadata.add(MetadataSet::SourceClip(SourceClip {
            instance_uid: random_uid(),
            data_definition: labels::SOUND_DATA_DEF,
            duration: Some(0),
            start_position: 0,
            source_package_id: file_package_umid,
            source_track_id: 1,
        }));
        duration_targets.push(material_clip_uid);

        let material_seq_uid = metadata.add(MetadataSet::Sequence(Sequence {
            instance_uid: random_uid(),
            data_definition: labels::SOUND_DATA_DEF,
            duration: Some(0),
            components: vec![material_clip_uid],
        }));
        duration_targets.push(material_seq_uid);

        let material_track_uid = metadata.add(MetadataSet::TimelineTrack(Track {
            instance_uid: random_uid(),
            track_id: 1,
            track_number: 0,
            track_name: Some("IA Bitstream".into()),
            edit_rate: Some(edit_rate),
            origin: 0,
            sequence: material_seq_uid,
        }));

        // File package: sound track terminating the reference chain.
        let file_clip_uid = metadata.add(MetadataSet::SourceClip(SourceClip {
            instance_uid: random_uid(),
            data_definition: labels::SOUND_DATA_DEF,
            duration: Some(0),
            start_position: 0,
            source_package_id: Umid::zero(),
            source_track_id: 0,
        }));
        duration_targets.push(file_clip_uid);

        let file_seq_uid = metadata.add(MetadataSet::Sequence(Sequence {
            instance_uid: random_uid(),
            data_definition: labels::SOUND_DATA_DEF,
            duration: Some(0),
            components: vec![file_clip_uid],
        }));
        duration_targets.push(file_seq_uid);

        let file_track_uid = metadata.add(MetadataSet::TimelineTrack(Track {
            instance_uid: random_uid(),
            track_id: 1,
            track_number,
            track_name: Some("IA Bitstream".into()),
            edit_rate: Some(edit_rate),
            origin: 0,
            sequence: file_seq_uid,
        }));

        // Copy of the supplied soundfield subdescriptor with fresh
        // identity and the IAB tagging applied.
        let mut subdescriptor = soundfield.clone();
        subdescriptor.instance_uid = random_uid();
        subdescriptor.mca_link_id = random_uid();
        subdescriptor.mca_tag_name = Some("IAB".into());
        subdescriptor.mca_tag_symbol = "IAB".into();
        subdescriptor.mca_label_dictionary_id = labels::IAB_SOUNDFIELD;
        let subdescriptor_uid =
            metadata.add(MetadataSet::IabSoundfieldLabelSubDescriptor(subdescriptor));

        let descriptor_uid = metadata.add(MetadataSet::IabEssenceDescriptor(IabEssenceDescriptor {
            instance_uid: random_uid(),
            linked_track_id: 1,
            sample_rate: edit_rate,
            container_duration: Some(0),
            essence_container: labels::IAB_CLIP_WRAPPED_CONTAINER,
            sound_essence_coding: labels::IMMERSIVE_AUDIO_CODING,
            audio_sampling_rate: sample_rate,
            channel_count: 0,
            quantization_bits: 24,
            subdescriptors: vec![subdescriptor_uid],
        }));
        duration_targets.push(descriptor_uid);

        let material_package_uid = metadata.add(MetadataSet::MaterialPackage(Package {
            instance_uid: random_uid(),
            package_uid: material_package_umid,
            name: Some("Material Package".into()),
            creation_date: MxfTimestamp::now(),
            modified_date: MxfTimestamp::now(),
            tracks: vec![material_track_uid],
            descriptor: None,
        }));

        let file_package_uid = metadata.add(MetadataSet::SourcePackage(Package {
            instance_uid: random_uid(),
            package_uid: file_package_umid,
            name: Some("File Package: IAB clip wrapping".into()),
            creation_date: MxfTimestamp::now(),
            modified_date: MxfTimestamp::now(),
            tracks: vec![file_track_uid],
            descriptor: Some(descriptor_uid),
        }));

        let storage_uid = metadata.add(MetadataSet::ContentStorage(ContentStorage {
            instance_uid: random_uid(),
            packages: vec![material_package_uid, file_package_uid],
        }));

        let identification_uid = metadata.add(MetadataSet::Identification(Identification {
            instance_uid: random_uid(),
            this_generation_uid: random_uid(),
            company_name: info.company_name.clone(),
            product_name: info.product_name.clone(),
            version_string: info.product_version.clone(),
            product_uid: info.product_uuid,
            modification_date: MxfTimestamp::now(),
        }));

        if info.encrypted_essence {
            metadata.add(MetadataSet::CryptographicContext(CryptographicContext {
                instance_uid: random_uid(),
                context_id: info.context_id,
                source_essence_container: labels::IAB_CLIP_WRAPPED_CONTAINER,
                cipher_algorithm: labels::CIPHER_ALGORITHM_AES_CBC,
                mic_algorithm: labels::MIC_ALGORITHM_HMAC_SHA1,
                cryptographic_key_id: [0u8; 16],
            }));
        }

        metadata.add(MetadataSet::Preface(Preface {
            instance_uid: random_uid(),
            last_modified: MxfTimestamp::now(),
            version: 0x0103,
            identifications: vec![identification_uid],
            content_storage: storage_uid,
            operational_pattern: op_pattern(info.label_set_type),
            essence_containers: vec![labels::IAB_CLIP_WRAPPED_CONTAINER],
            dm_schemes: Vec::new(),
            conforms_to_specs: conforms_to_specs.to_vec(),
        }));

        let mut inner = Inner {
            file,
            info: info.clone(),
            metadata,
            rip: RandomIndexPack::new(),
            index_entries: Vec::new(),
            edit_rate,
            frames_written: 0,
            stream_offset: 0,
            clip_start: 0,
            element_ul,
            file_package_uid,
            duration_targets,
            next_generic_stream_id: 2,
            next_track_id: 2,
            last_partition_offset: 0,
        };

        // Header region, then the reserved clip KL.
        inner.write_header_region(PartitionStatus::Open, 0)?;
        inner.rip.add_entry(ESSENCE_BODY_SID, 0);

        inner.clip_start = inner.file.stream_position()?;
        debug_assert_eq!(inner.clip_start, RESERVED_HEADER_SIZE);

        inner.file.write_all(inner.element_ul.as_bytes())?;
        write_ber(&mut inner.file, 0, CLIP_BER_LENGTH)?;
        inner.stream_offset = RESERVED_KL_SIZE as u64;

        Ok(inner)
    }

    /// Serialize partition pack + primer + metadata + fill into exactly
    /// [`RESERVED_HEADER_SIZE`] bytes at the current position.
    fn write_header_region(&mut self, status: PartitionStatus, footer_partition: u64) -> Result<()> {
        let mut pack = Partition::header();
        pack.status = status;
        pack.this_partition = 0;
        pack.previous_partition = 0;
        pack.footer_partition = footer_partition;
        pack.body_sid = ESSENCE_BODY_SID;
        pack.operational_pattern = op_pattern(self.info.label_set_type);
        pack.add_essence_container(labels::IAB_CLIP_WRAPPED_CONTAINER);

        let pack_size = pack.size() as u64;
        pack.header_byte_count = RESERVED_HEADER_SIZE - pack_size;
        pack.write(&mut self.file)?;

        let mut region = Vec::new();
        PrimerPack::new().to_klv()?.write(&mut region)?;
        self.metadata.serialize(&mut region)?;

        let used = region.len() as u64;
        let fill = RESERVED_HEADER_SIZE
            .checked_sub(pack_size + used)
            .ok_or_else(|| {
                MxfError::Fail(format!(
                    "header metadata ({} bytes) overflows the {}-byte reserved region",
                    used, RESERVED_HEADER_SIZE
                ))
            })?;

        self.file.write_all(&region)?;
        klv::write_fill(&mut self.file, fill as usize)?;
        Ok(())
    }

    fn write_footer(&mut self) -> Result<()> {
        // Patch every pending duration with the final frame count.
        let duration = self.frames_written as i64;
        let targets = std::mem::take(&mut self.duration_targets);
        for uid in &targets {
            self.metadata.set_duration(uid, duration);
        }

        let footer_offset = self.file.stream_position()?;

        // Rewrite the header region closed and complete, now that the
        // footer offset and durations are known.
        self.file.seek(SeekFrom::Start(0))?;
        self.write_header_region(PartitionStatus::Closed, footer_offset)?;
        self.file.seek(SeekFrom::Start(footer_offset))?;

        // Index table segment covering every frame.
        let entries = std::mem::take(&mut self.index_entries);
        let segment = IndexTableSegment::new(self.edit_rate, INDEX_SID, ESSENCE_BODY_SID, entries);
        let mut index_bytes = Vec::new();
        segment.to_klv()?.write(&mut index_bytes)?;

        let mut footer = Partition::footer();
        footer.this_partition = footer_offset;
        footer.previous_partition = self.last_partition_offset;
        footer.footer_partition = footer_offset;
        footer.index_sid = INDEX_SID;
        footer.index_byte_count = index_bytes.len() as u64;
        footer.operational_pattern = op_pattern(self.info.label_set_type);
        footer.add_essence_container(labels::IAB_CLIP_WRAPPED_CONTAINER);
        footer.write(&mut self.file)?;

        self.file.write_all(&index_bytes)?;

        self.rip.add_entry(0, footer_offset);
        self.rip.write(&mut self.file)?;

        log::debug!(
            "footer written at {}, {} frames indexed",
            footer_offset,
            segment.index_duration
        );
        Ok(())
    }

    fn write_metadata(
        &mut self,
        track_label: &str,
        mime_type: &str,
        description: &str,
        payload: &[u8],
    ) -> Result<()> {
        let stream_sid = self.next_generic_stream_id;
        self.next_generic_stream_id += 1;

        // RP 2057 set chain in the header tree.
        let set_uid = self.metadata.add(MetadataSet::GenericStreamTextBasedSet(
            GenericStreamTextBasedSet {
                instance_uid: random_uid(),
                payload_scheme_id: labels::TEXT_BASED_FRAMEWORK_SCHEME,
                text_mime_media_type: mime_type.into(),
                rfc5646_text_language_code: "en".into(),
                text_data_description: description.into(),
                generic_stream_sid: stream_sid,
            },
        ));

        let framework_uid = self
            .metadata
            .add(MetadataSet::TextBasedDmFramework(TextBasedDmFramework {
                instance_uid: random_uid(),
                object_ref: set_uid,
            }));

        let segment = DmSegment {
            instance_uid: random_uid(),
            data_definition: labels::DESCRIPTIVE_METADATA_DEF,
            duration: None,
            event_comment: Some("SMPTE RP 2057 Generic Stream Text-Based Set".into()),
            dm_framework: framework_uid,
        };
        // The segment duration starts out absent, so it joins the duration
        // update list only when already present.
        if segment.duration.is_some() {
            self.duration_targets.push(segment.instance_uid);
        }
        let segment_uid = self.metadata.add(MetadataSet::DmSegment(segment));

        let seq_uid = self.metadata.add(MetadataSet::Sequence(Sequence {
            instance_uid: random_uid(),
            data_definition: labels::DESCRIPTIVE_METADATA_DEF,
            duration: Some(0),
            components: vec![segment_uid],
        }));
        self.duration_targets.push(seq_uid);

        let track_uid = self.metadata.add(MetadataSet::StaticTrack(Track {
            instance_uid: random_uid(),
            track_id: self.next_track_id,
            track_number: 0,
            track_name: Some(track_label.into()),
            edit_rate: None,
            origin: 0,
            sequence: seq_uid,
        }));
        self.next_track_id += 1;

        // Link the static track into the file package and register the
        // descriptive scheme at the preface.
        let file_package_uid = self.file_package_uid;
        if let Some(MetadataSet::SourcePackage(package)) = self.metadata.get_mut(&file_package_uid)
        {
            package.tracks.push(track_uid);
        }
        if let Some(MetadataSet::Preface(preface)) =
            self.metadata.get_by_type_mut(&labels::PREFACE)
        {
            if !preface.dm_schemes.contains(&labels::TEXT_BASED_FRAMEWORK_SCHEME) {
                preface.dm_schemes.push(labels::TEXT_BASED_FRAMEWORK_SCHEME);
            }
        }

        // Generic stream partition holding the payload.
        let here = self.file.stream_position()?;
        let previous = self
            .rip
            .entries
            .last()
            .map(|entry| entry.byte_offset)
            .unwrap_or(0);

        let mut partition = Partition::generic_stream();
        partition.this_partition = here;
        partition.previous_partition = previous;
        partition.body_sid = stream_sid;
        partition.operational_pattern = op_pattern(self.info.label_set_type);
        partition.add_essence_container(labels::IAB_CLIP_WRAPPED_CONTAINER);
        partition.write(&mut self.file)?;

        self.rip.add_entry(stream_sid, here);
        self.last_partition_offset = here;

        self.file.write_all(&labels::GENERIC_STREAM_DATA_ELEMENT)?;
        let len_bytes = klv::encode_ber_length(payload.len());
        self.file.write_all(&len_bytes)?;
        self.file.write_all(payload)?;

        log::debug!(
            "generic stream partition SID {} written at {} ({} payload bytes)",
            stream_sid,
            here,
            payload.len()
        );
        Ok(())
    }
}

fn op_pattern(label_set: LabelSetType) -> UL {
    match label_set {
        LabelSetType::Interop => labels::INTEROP_OP_ATOM,
        _ => labels::OP_ATOM,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn open_default(writer: &mut IabWriter<Cursor<Vec<u8>>>) {
        writer
            .open_write(
                Cursor::new(Vec::new()),
                &WriterInfo::default(),
                &IabSoundfieldLabelSubDescriptor::default(),
                &[],
                Rational::fps_24(),
                Rational::hz_48k(),
            )
            .unwrap();
    }

    #[test]
    fn test_write_frame_before_open_is_init() {
        let mut writer: IabWriter<Cursor<Vec<u8>>> = IabWriter::new();
        let err = writer.write_frame(&[1, 2, 3]).unwrap_err();
        assert_eq!(err.code(), "INIT");

        let err = writer.finalize_clip().unwrap_err();
        assert_eq!(err.code(), "INIT");
    }

    #[test]
    fn test_double_open_is_state() {
        let mut writer = IabWriter::new();
        open_default(&mut writer);

        let err = writer
            .open_write(
                Cursor::new(Vec::new()),
                &WriterInfo::default(),
                &IabSoundfieldLabelSubDescriptor::default(),
                &[],
                Rational::fps_24(),
                Rational::hz_48k(),
            )
            .unwrap_err();
        assert_eq!(err.code(), "STATE");
    }

    #[test]
    fn test_open_reserves_header_and_clip_kl() {
        let mut writer = IabWriter::new();
        open_default(&mut writer);

        writer.write_frame(&[0xDE, 0xAD, 0xBE, 0xEF]).unwrap();
        writer.finalize_clip().unwrap();
        let cursor = writer.finalize_mxf().unwrap();
        let bytes = cursor.into_inner();

        assert!(bytes.len() as u64 > RESERVED_HEADER_SIZE + RESERVED_KL_SIZE as u64 + 4);

        // Clip key at the reserved offset, stream bytes forced to one
        // element, one track.
        let clip = &bytes[RESERVED_HEADER_SIZE as usize..];
        assert_eq!(&clip[..12], &labels::IAB_CLIP_WRAPPED_ELEMENT[..12]);
        assert_eq!(clip[13], 1);
        assert_eq!(clip[15], 1);

        // Back-patched 8-byte BER length equals the frame bytes.
        assert_eq!(clip[16], 0x87);
        let (length, size) = klv::decode_ber_length(&clip[16..]).unwrap();
        assert_eq!(size, CLIP_BER_LENGTH);
        assert_eq!(length, 4);
    }

    #[test]
    fn test_index_offsets_relative_to_clip() {
        let mut writer = IabWriter::new();
        open_default(&mut writer);

        writer.write_frame(&vec![0u8; 10]).unwrap();
        writer.write_frame(&vec![0u8; 20]).unwrap();
        writer.write_frame(&vec![0u8; 30]).unwrap();

        let inner = writer.inner.as_ref().unwrap();
        let offsets: Vec<u64> = inner
            .index_entries
            .iter()
            .map(|entry| entry.stream_offset - RESERVED_KL_SIZE as u64)
            .collect();
        assert_eq!(offsets, vec![0, 10, 30]);
    }

    #[test]
    fn test_finalize_resets_to_begin() {
        let mut writer = IabWriter::new();
        open_default(&mut writer);
        writer.write_frame(&[1]).unwrap();
        writer.finalize_clip().unwrap();
        writer.finalize_mxf().unwrap();

        // Finalize again without reopening is INIT; a fresh open succeeds.
        assert_eq!(writer.finalize_mxf().unwrap_err().code(), "INIT");
        open_default(&mut writer);
        assert!(writer.header_metadata().is_ok());
    }

    #[test]
    fn test_accessors_before_open() {
        let writer: IabWriter<Cursor<Vec<u8>>> = IabWriter::new();
        assert_eq!(writer.header_metadata().unwrap_err().code(), "INIT");
        assert_eq!(writer.rip().unwrap_err().code(), "INIT");
    }

    #[test]
    fn test_metadata_tree_shape() {
        let mut writer = IabWriter::new();
        open_default(&mut writer);

        let tree = writer.header_metadata().unwrap();
        assert!(tree.get_by_type(&labels::PREFACE).is_some());
        assert!(tree.get_by_type(&labels::IAB_ESSENCE_DESCRIPTOR).is_some());
        assert!(tree
            .get_by_type(&labels::IAB_SOUNDFIELD_LABEL_SUBDESCRIPTOR)
            .is_some());
        assert_eq!(tree.get_all_by_type(&labels::TIMELINE_TRACK).len(), 2);

        let sub = tree
            .get_by_type(&labels::IAB_SOUNDFIELD_LABEL_SUBDESCRIPTOR)
            .unwrap()
            .as_subdescriptor()
            .unwrap();
        assert_eq!(sub.mca_tag_symbol, "IAB");
        assert_eq!(sub.mca_label_dictionary_id, labels::IAB_SOUNDFIELD);
    }

    #[test]
    fn test_generic_stream_ids_are_monotonic() {
        let mut writer = IabWriter::new();
        open_default(&mut writer);
        writer.write_frame(&[0u8; 8]).unwrap();

        writer
            .write_metadata("Track A", "text/plain", "desc-a", b"payload-a")
            .unwrap();
        writer
            .write_metadata("Track B", "application/xml", "desc-b", b"<b/>")
            .unwrap();

        let rip = writer.rip().unwrap();
        let sids: Vec<u32> = rip.entries.iter().map(|entry| entry.body_sid).collect();
        assert_eq!(sids, vec![ESSENCE_BODY_SID, 2, 3]);

        let tree = writer.header_metadata().unwrap();
        assert_eq!(
            tree.get_all_by_type(&labels::GENERIC_STREAM_TEXT_BASED_SET)
                .len(),
            2
        );
        assert_eq!(tree.get_all_by_type(&labels::STATIC_TRACK).len(), 2);
    }
}
