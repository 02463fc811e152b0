//! Clip-wrapped IAB track file reading and writing.
//!
//! This crate reads and writes the single-track container used to carry
//! Immersive Audio Bitstream essence in digital-cinema and broadcast
//! workflows:
//!
//! - KLV (Key-Length-Value) triplet handling with BER lengths, including
//!   the fixed-width form used to reserve and back-patch the clip length
//! - Partition packs (header, body, generic stream, footer) and the
//!   random index pack
//! - The header metadata tree of interchange objects (preface, packages,
//!   tracks, the IAB essence descriptor and soundfield subdescriptor)
//! - Index table segments mapping frame numbers to stream offsets
//! - The clip-wrap writer and reader state machines
//! - Encrypted essence triplet (EKLV) framing over the `iabwrap-crypto`
//!   cipher and integrity contexts
//!
//! # Example
//!
//! ```no_run
//! use iabwrap_mxf::{
//!     IabReader, IabSoundfieldLabelSubDescriptor, IabWriter, Rational, WriterInfo,
//! };
//! use std::fs::File;
//!
//! let mut writer = IabWriter::new();
//! writer.open_write(
//!     File::create("audio.mxf").unwrap(),
//!     &WriterInfo::default(),
//!     &IabSoundfieldLabelSubDescriptor::default(),
//!     &[],
//!     Rational::fps_24(),
//!     Rational::hz_48k(),
//! ).unwrap();
//!
//! writer.write_frame(&[0x01, 0x00, 0x00, 0x00, 0x00]).unwrap();
//! writer.finalize_clip().unwrap();
//! writer.finalize_mxf().unwrap();
//!
//! let mut reader = IabReader::new();
//! reader.open_read(File::open("audio.mxf").unwrap()).unwrap();
//! println!("frames: {}", reader.frame_count().unwrap());
//! ```

mod eklv;
mod error;
mod index;
mod klv;
mod metadata;
mod partition;
mod reader;
mod types;
mod ul;
mod writer;

pub use eklv::{
    calc_esv_length, read_eklv, write_eklv, EklvParams, FrameBuffer, ESV_CHECK_VALUE,
    INTEGRITY_PACK_SIZE,
};
pub use error::{MxfError, Result};
pub use index::{IndexAccess, IndexEntry, IndexTableSegment, INDEX_ENTRY_SIZE};
pub use klv::{
    decode_ber_length, encode_ber_length, read_kl, read_test_ber, write_ber, write_fill,
    write_ul, Klv, KlvReader, CLIP_BER_LENGTH, RESERVED_KL_SIZE, UL_LENGTH,
};
pub use metadata::{
    random_uid, tags, ContentStorage, CryptographicContext, DmSegment,
    GenericStreamTextBasedSet, HeaderMetadata, IabEssenceDescriptor,
    IabSoundfieldLabelSubDescriptor, Identification, InstanceUid, MetadataSet, Package, Preface,
    PrimerPack, Sequence, SourceClip, TextBasedDmFramework, Track,
};
pub use partition::{Partition, PartitionKind, PartitionStatus, RandomIndexPack, RipEntry};
pub use reader::IabReader;
pub use types::{LabelSetType, MxfTimestamp, Rational, Umid, WriterInfo};
pub use ul::{find, labels, RegistryEntry, UniversalLabel, UL};
pub use writer::{IabWriter, RESERVED_HEADER_SIZE};
