//! Integration tests for the clip-wrap writer and reader.
//!
//! Files are written into in-memory cursors and read back through the
//! public API.

use iabwrap_mxf::{
    decode_ber_length, labels, write_ber, write_fill, HeaderMetadata, IabEssenceDescriptor,
    IabReader, IabSoundfieldLabelSubDescriptor, IabWriter, IndexEntry, IndexTableSegment,
    KlvReader, MetadataSet, Partition, PrimerPack, RandomIndexPack, Rational, Sequence, Track,
    UniversalLabel, WriterInfo, CLIP_BER_LENGTH, RESERVED_HEADER_SIZE, RESERVED_KL_SIZE,
};
use std::io::{Cursor, Read, Seek, SeekFrom};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Wrap a payload in the IAB internal framing: an empty preamble segment
/// followed by a frame segment, each a 1-byte tag plus 4-byte BE length.
fn iab_frame(payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(10 + payload.len());
    frame.push(0x01);
    frame.extend_from_slice(&0u32.to_be_bytes());
    frame.push(0x02);
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(payload);
    frame
}

fn write_file(frames: &[Vec<u8>], info: &WriterInfo) -> Vec<u8> {
    let mut writer = IabWriter::new();
    writer
        .open_write(
            Cursor::new(Vec::new()),
            info,
            &IabSoundfieldLabelSubDescriptor::default(),
            &[],
            Rational::fps_24(),
            Rational::hz_48k(),
        )
        .unwrap();

    for frame in frames {
        writer.write_frame(frame).unwrap();
    }

    writer.finalize_clip().unwrap();
    writer.finalize_mxf().unwrap().into_inner()
}

#[test]
fn test_write_read_roundtrip() {
    let frames: Vec<Vec<u8>> = vec![
        iab_frame(&[0x11; 33]),
        iab_frame(&[0x22; 1000]),
        iab_frame(&[0x33; 7]),
        iab_frame(b"last frame payload"),
    ];
    let bytes = write_file(&frames, &WriterInfo::default());

    let mut reader = IabReader::new();
    reader.open_read(Cursor::new(bytes)).unwrap();

    assert_eq!(reader.frame_count().unwrap(), frames.len() as u32);
    for (i, frame) in frames.iter().enumerate() {
        assert_eq!(reader.read_frame(i as u32).unwrap(), &frame[..]);
    }
}

#[test]
fn test_single_frame_file_shape() {
    // One frame carrying a DE AD BE EF payload at 24/1 and 48 kHz.
    let frame = iab_frame(&[0xDE, 0xAD, 0xBE, 0xEF]);
    let bytes = write_file(std::slice::from_ref(&frame), &WriterInfo::default());

    // Reserved header + clip KL + frame + footer machinery.
    assert!(bytes.len() as u64 >= RESERVED_HEADER_SIZE + RESERVED_KL_SIZE as u64 + 4);

    let mut reader = IabReader::new();
    reader.open_read(Cursor::new(bytes)).unwrap();
    assert_eq!(reader.frame_count().unwrap(), 1);

    let read_back = reader.read_frame(0).unwrap();
    assert_eq!(read_back, &frame[..]);
    assert_eq!(&read_back[read_back.len() - 4..], &[0xDE, 0xAD, 0xBE, 0xEF]);
}

#[test]
fn test_clip_length_backpatch() {
    let frames: Vec<Vec<u8>> = vec![iab_frame(&[0xAA; 90]), iab_frame(&[0xBB; 56])];
    let total: usize = frames.iter().map(|f| f.len()).sum();
    let bytes = write_file(&frames, &WriterInfo::default());

    // The 8-byte BER at clip_start + 16 decodes to the streamed bytes.
    let clip_len_offset = RESERVED_HEADER_SIZE as usize + 16;
    let (length, size) =
        decode_ber_length(&bytes[clip_len_offset..clip_len_offset + CLIP_BER_LENGTH]).unwrap();
    assert_eq!(size, CLIP_BER_LENGTH);
    assert_eq!(length, total);
}

#[test]
fn test_finalize_clip_restores_position() {
    // Streaming may continue after an intermediate back-patch; the final
    // file must still read back intact.
    let first = iab_frame(&[0x01; 40]);
    let second = iab_frame(&[0x02; 60]);

    let mut writer = IabWriter::new();
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

    writer.write_frame(&first).unwrap();
    writer.finalize_clip().unwrap();
    writer.write_frame(&second).unwrap();
    writer.finalize_clip().unwrap();
    let bytes = writer.finalize_mxf().unwrap().into_inner();

    let mut reader = IabReader::new();
    reader.open_read(Cursor::new(bytes)).unwrap();
    assert_eq!(reader.frame_count().unwrap(), 2);
    assert_eq!(reader.read_frame(0).unwrap(), &first[..]);
    assert_eq!(reader.read_frame(1).unwrap(), &second[..]);
}

#[test]
fn test_index_stream_offsets() {
    // Frames of sizes 10, 20, 30: stored offsets must be exactly 0, 10,
    // 30 relative to the clip value (24-based from the clip key).
    let frames: Vec<Vec<u8>> = vec![vec![0x0A; 10], vec![0x0B; 20], vec![0x0C; 30]];
    let bytes = write_file(&frames, &WriterInfo::default());

    // Walk to the footer via the header partition pack.
    let mut cursor = Cursor::new(&bytes);
    let header = Partition::read_from(&mut cursor).unwrap();
    cursor
        .seek(SeekFrom::Start(header.footer_partition))
        .unwrap();
    let footer = Partition::read_from(&mut cursor).unwrap();

    let mut index_region = vec![0u8; footer.index_byte_count as usize];
    cursor.read_exact(&mut index_region).unwrap();

    let mut klv_reader = KlvReader::new(&index_region);
    let klv = klv_reader.read_klv().unwrap().unwrap();
    assert!(UniversalLabel(*klv.key.as_bytes()).is_index_table_segment());

    let segment = IndexTableSegment::parse(&klv.value).unwrap();
    let relative: Vec<u64> = segment
        .entries
        .iter()
        .map(|entry| entry.stream_offset - RESERVED_KL_SIZE as u64)
        .collect();
    assert_eq!(relative, vec![0, 10, 30]);
    assert_eq!(segment.index_duration, 3);
    assert_eq!(segment.slice_count, 0);
}

#[test]
fn test_read_frame_out_of_range_is_nonfatal() {
    let frames = vec![iab_frame(&[0x55; 12])];
    let bytes = write_file(&frames, &WriterInfo::default());

    let mut reader = IabReader::new();
    reader.open_read(Cursor::new(bytes)).unwrap();

    let err = reader.read_frame(1).unwrap_err();
    assert_eq!(err.code(), "RANGE");

    // The reader stays usable.
    assert_eq!(reader.read_frame(0).unwrap(), &frames[0][..]);
    assert_eq!(reader.frame_count().unwrap(), 1);
}

/// Shared-counter instrumentation around a cursor.
struct CountingCursor {
    inner: Cursor<Vec<u8>>,
    reads: Arc<AtomicUsize>,
    seeks: Arc<AtomicUsize>,
}

impl Read for CountingCursor {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        self.inner.read(buf)
    }
}

impl Seek for CountingCursor {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        self.seeks.fetch_add(1, Ordering::Relaxed);
        self.inner.seek(pos)
    }
}

#[test]
fn test_frame_cache_avoids_io() {
    let frames = vec![iab_frame(&[0x66; 48]), iab_frame(&[0x77; 24])];
    let bytes = write_file(&frames, &WriterInfo::default());

    let reads = Arc::new(AtomicUsize::new(0));
    let seeks = Arc::new(AtomicUsize::new(0));
    let counting = CountingCursor {
        inner: Cursor::new(bytes),
        reads: reads.clone(),
        seeks: seeks.clone(),
    };

    let mut reader = IabReader::new();
    reader.open_read(counting).unwrap();

    assert_eq!(reader.read_frame(1).unwrap(), &frames[1][..]);
    let reads_after_first = reads.load(Ordering::Relaxed);
    let seeks_after_first = seeks.load(Ordering::Relaxed);

    // The second read of the same frame is served from the cache.
    assert_eq!(reader.read_frame(1).unwrap(), &frames[1][..]);
    assert_eq!(reads.load(Ordering::Relaxed), reads_after_first);
    assert_eq!(seeks.load(Ordering::Relaxed), seeks_after_first);
}

#[test]
fn test_text_metadata_roundtrip() {
    let frames = vec![iab_frame(&[0x42; 64])];

    let mut writer = IabWriter::new();
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

    writer.write_frame(&frames[0]).unwrap();
    writer.finalize_clip().unwrap();
    writer
        .write_metadata(
            "ADM Track",
            "application/xml",
            "adm-audio-metadata",
            b"<adm>payload</adm>",
        )
        .unwrap();
    writer
        .write_metadata("Notes", "text/plain", "session-notes", b"mix notes")
        .unwrap();
    let bytes = writer.finalize_mxf().unwrap().into_inner();

    let mut reader = IabReader::new();
    reader.open_read(Cursor::new(bytes)).unwrap();

    let (mime, payload) = reader.read_metadata("adm-audio-metadata").unwrap();
    assert_eq!(mime, "application/xml");
    assert_eq!(payload, b"<adm>payload</adm>");

    let (mime, payload) = reader.read_metadata("session-notes").unwrap();
    assert_eq!(mime, "text/plain");
    assert_eq!(payload, b"mix notes");

    let err = reader.read_metadata("no-such-stream").unwrap_err();
    assert_eq!(err.code(), "FAIL");

    // Metadata partitions must not disturb frame access, even though the
    // file now carries a three-pair RIP whose middle pair is a generic
    // stream partition rather than a body partition.
    assert_eq!(reader.rip().unwrap().entries.len(), 4);
    assert_eq!(reader.read_frame(0).unwrap(), &frames[0][..]);
}

#[test]
fn test_three_pair_rip_with_body_partition() {
    // Hand-assemble a three-partition file: header, body partition in
    // front of the clip, footer. The reader must derive the essence start
    // from the body partition pack.
    let payload = iab_frame(&[0x5A; 20]);

    let mut metadata = HeaderMetadata::new();
    let sub_uid = metadata.add(MetadataSet::IabSoundfieldLabelSubDescriptor(
        IabSoundfieldLabelSubDescriptor::default(),
    ));
    let desc_uid = metadata.add(MetadataSet::IabEssenceDescriptor(IabEssenceDescriptor {
        instance_uid: iabwrap_mxf::random_uid(),
        linked_track_id: 1,
        sample_rate: Rational::fps_24(),
        container_duration: Some(1),
        essence_container: labels::IAB_CLIP_WRAPPED_CONTAINER,
        sound_essence_coding: labels::IMMERSIVE_AUDIO_CODING,
        audio_sampling_rate: Rational::hz_48k(),
        channel_count: 0,
        quantization_bits: 24,
        subdescriptors: vec![sub_uid],
    }));
    let _ = desc_uid;
    let seq_uid = metadata.add(MetadataSet::Sequence(Sequence {
        instance_uid: iabwrap_mxf::random_uid(),
        data_definition: labels::SOUND_DATA_DEF,
        duration: Some(1),
        components: vec![],
    }));
    metadata.add(MetadataSet::TimelineTrack(Track {
        instance_uid: iabwrap_mxf::random_uid(),
        track_id: 1,
        track_number: 0,
        track_name: None,
        edit_rate: Some(Rational::fps_24()),
        origin: 0,
        sequence: seq_uid,
    }));

    // Metadata region: primer + sets + fill.
    let mut region = Vec::new();
    PrimerPack::new().to_klv().unwrap().write(&mut region).unwrap();
    metadata.serialize(&mut region).unwrap();
    write_fill(&mut region, 64).unwrap();

    let mut element_ul = labels::IAB_CLIP_WRAPPED_ELEMENT;
    element_ul[13] = 1;
    element_ul[15] = 1;

    let mut header = Partition::header();
    header.header_byte_count = region.len() as u64;
    header.body_sid = 1;
    header.add_essence_container(labels::IAB_CLIP_WRAPPED_CONTAINER);

    let body_offset = (header.size() + region.len()) as u64;
    let mut body = Partition::body();
    body.this_partition = body_offset;
    body.body_sid = 1;
    body.add_essence_container(labels::IAB_CLIP_WRAPPED_CONTAINER);

    let essence_start = body_offset + body.size() as u64;
    let clip_len = RESERVED_KL_SIZE as u64 + payload.len() as u64;
    let footer_offset = essence_start + clip_len;
    header.footer_partition = footer_offset;

    let segment = IndexTableSegment::new(
        Rational::fps_24(),
        129,
        1,
        vec![IndexEntry::at_offset(RESERVED_KL_SIZE as u64)],
    );
    let mut index_bytes = Vec::new();
    segment.to_klv().unwrap().write(&mut index_bytes).unwrap();

    let mut footer = Partition::footer();
    footer.this_partition = footer_offset;
    footer.previous_partition = body_offset;
    footer.footer_partition = footer_offset;
    footer.index_sid = 129;
    footer.index_byte_count = index_bytes.len() as u64;

    let mut file = Vec::new();
    header.write(&mut file).unwrap();
    file.extend_from_slice(&region);
    body.write(&mut file).unwrap();
    assert_eq!(file.len() as u64, essence_start);

    file.extend_from_slice(&element_ul);
    write_ber(&mut file, payload.len() as u64, CLIP_BER_LENGTH).unwrap();
    file.extend_from_slice(&payload);
    assert_eq!(file.len() as u64, footer_offset);

    footer.write(&mut file).unwrap();
    file.extend_from_slice(&index_bytes);

    let mut rip = RandomIndexPack::new();
    rip.add_entry(1, 0);
    rip.add_entry(1, body_offset);
    rip.add_entry(0, footer_offset);
    rip.write(&mut file).unwrap();

    let mut reader = IabReader::new();
    reader.open_read(Cursor::new(file)).unwrap();
    assert_eq!(reader.frame_count().unwrap(), 1);
    assert_eq!(reader.read_frame(0).unwrap(), &payload[..]);
}

#[test]
fn test_writer_info_roundtrip() {
    let info = WriterInfo {
        company_name: "Acme Post".into(),
        product_name: "atmos-wrap".into(),
        product_version: "2.1.0".into(),
        product_uuid: [0x0F; 16],
        asset_uuid: [0xA7; 16],
        ..Default::default()
    };

    let frames = vec![iab_frame(&[0x01; 16])];
    let bytes = write_file(&frames, &info);

    let mut reader = IabReader::new();
    reader.open_read(Cursor::new(bytes)).unwrap();

    let read_info = reader.fill_writer_info().unwrap();
    assert_eq!(read_info.company_name, "Acme Post");
    assert_eq!(read_info.product_name, "atmos-wrap");
    assert_eq!(read_info.product_version, "2.1.0");
    assert_eq!(read_info.product_uuid, [0x0F; 16]);
    assert_eq!(read_info.asset_uuid, [0xA7; 16]);
    assert_eq!(read_info.label_set_type, iabwrap_mxf::LabelSetType::Smpte);
    assert!(!read_info.encrypted_essence);
}

#[test]
fn test_cryptographic_context_signaling() {
    let info = WriterInfo {
        encrypted_essence: true,
        context_id: [0xC4; 16],
        uses_hmac: true,
        ..Default::default()
    };

    let frames = vec![iab_frame(&[0x02; 16])];
    let bytes = write_file(&frames, &info);

    let mut reader = IabReader::new();
    reader.open_read(Cursor::new(bytes)).unwrap();

    let read_info = reader.fill_writer_info().unwrap();
    assert!(read_info.encrypted_essence);
    assert!(read_info.uses_hmac);
    assert_eq!(read_info.context_id, [0xC4; 16]);
}

#[test]
fn test_header_rewritten_closed_complete() {
    let frames = vec![iab_frame(&[0x09; 8])];
    let bytes = write_file(&frames, &WriterInfo::default());

    // After finalize the header partition is closed complete and its
    // footer pointer is patched.
    assert_eq!(
        &bytes[..16],
        &labels::HEADER_PARTITION_CLOSED_COMPLETE[..]
    );

    let mut cursor = Cursor::new(&bytes);
    let header = Partition::read_from(&mut cursor).unwrap();
    assert!(header.footer_partition > RESERVED_HEADER_SIZE);
    assert_eq!(&bytes[header.footer_partition as usize..][..16], &labels::FOOTER_PARTITION[..]);

    // Container duration reaches the descriptor.
    let mut reader = IabReader::new();
    reader.open_read(Cursor::new(bytes.clone())).unwrap();
    let tree = reader.header_metadata().unwrap();
    let desc = tree
        .get_by_type(&labels::IAB_ESSENCE_DESCRIPTOR)
        .unwrap()
        .as_descriptor()
        .unwrap();
    assert_eq!(desc.container_duration, Some(1));
    assert_eq!(desc.quantization_bits, 24);
    assert_eq!(desc.sample_rate, Rational::fps_24());
    assert_eq!(desc.audio_sampling_rate, Rational::hz_48k());
}
