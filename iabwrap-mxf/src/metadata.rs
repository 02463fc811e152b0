//! Structural metadata sets and the header metadata tree.
//!
//! The header partition carries a tree of interchange objects. The tree
//! owns every object; objects refer to each other only through 16-byte
//! InstanceUIDs. Each object serializes to a KLV local set (2-byte tag,
//! 2-byte length per item); strings are UTF-16BE on the wire.

use crate::error::{MxfError, Result};
use crate::klv::{read_local_set, write_local_set, Klv};
use crate::types::{MxfTimestamp, Rational, Umid};
use crate::ul::{labels, UniversalLabel, UL};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::Write;
use uuid::Uuid;

/// 16-byte instance identifier of an interchange object.
pub type InstanceUid = [u8; 16];

/// Generate a fresh random instance UID.
pub fn random_uid() -> InstanceUid {
    *Uuid::new_v4().as_bytes()
}

/// Local set tags. Registered static tags are used where they exist; the
/// remaining items use dynamic tags from the 0x8000 range, recorded in the
/// primer pack.
pub mod tags {
    pub const INSTANCE_UID: u16 = 0x3C0A;

    // Preface
    pub const LAST_MODIFIED_DATE: u16 = 0x3B02;
    pub const VERSION: u16 = 0x3B05;
    pub const IDENTIFICATIONS: u16 = 0x3B06;
    pub const CONTENT_STORAGE: u16 = 0x3B03;
    pub const OPERATIONAL_PATTERN: u16 = 0x3B09;
    pub const ESSENCE_CONTAINERS: u16 = 0x3B0A;
    pub const DM_SCHEMES: u16 = 0x3B0B;
    pub const CONFORMS_TO_SPECS: u16 = 0x8001;

    // Identification
    pub const THIS_GENERATION_UID: u16 = 0x3C09;
    pub const COMPANY_NAME: u16 = 0x3C01;
    pub const PRODUCT_NAME: u16 = 0x3C02;
    pub const VERSION_STRING: u16 = 0x3C04;
    pub const PRODUCT_UID: u16 = 0x3C05;
    pub const MODIFICATION_DATE: u16 = 0x3C06;

    // Content storage
    pub const PACKAGES: u16 = 0x1901;

    // Generic package
    pub const PACKAGE_UID: u16 = 0x4401;
    pub const PACKAGE_NAME: u16 = 0x4402;
    pub const PACKAGE_CREATION_DATE: u16 = 0x4405;
    pub const PACKAGE_MODIFIED_DATE: u16 = 0x4404;
    pub const TRACKS: u16 = 0x4403;
    pub const DESCRIPTOR: u16 = 0x4701;

    // Track
    pub const TRACK_ID: u16 = 0x4801;
    pub const TRACK_NUMBER: u16 = 0x4804;
    pub const TRACK_NAME: u16 = 0x4802;
    pub const EDIT_RATE: u16 = 0x4B01;
    pub const ORIGIN: u16 = 0x4B02;
    pub const TRACK_SEQUENCE: u16 = 0x4803;

    // Structural components
    pub const DATA_DEFINITION: u16 = 0x0201;
    pub const DURATION: u16 = 0x0202;
    pub const STRUCTURAL_COMPONENTS: u16 = 0x1001;
    pub const START_POSITION: u16 = 0x1201;
    pub const SOURCE_PACKAGE_ID: u16 = 0x1101;
    pub const SOURCE_TRACK_ID: u16 = 0x1102;
    pub const EVENT_COMMENT: u16 = 0x8002;
    pub const DM_FRAMEWORK: u16 = 0x6101;

    // File descriptor
    pub const LINKED_TRACK_ID: u16 = 0x3006;
    pub const SAMPLE_RATE: u16 = 0x3001;
    pub const CONTAINER_DURATION: u16 = 0x3002;
    pub const ESSENCE_CONTAINER: u16 = 0x3004;
    pub const SOUND_ESSENCE_CODING: u16 = 0x3D06;
    pub const AUDIO_SAMPLING_RATE: u16 = 0x3D03;
    pub const CHANNEL_COUNT: u16 = 0x3D07;
    pub const QUANTIZATION_BITS: u16 = 0x3D01;
    pub const SUB_DESCRIPTORS: u16 = 0x8003;

    // MCA subdescriptor
    pub const MCA_LABEL_DICTIONARY_ID: u16 = 0x8004;
    pub const MCA_LINK_ID: u16 = 0x8005;
    pub const MCA_TAG_SYMBOL: u16 = 0x8006;
    pub const MCA_TAG_NAME: u16 = 0x8007;
    pub const RFC5646_SPOKEN_LANGUAGE: u16 = 0x8008;

    // Generic stream text-based set
    pub const PAYLOAD_SCHEME_ID: u16 = 0x8009;
    pub const TEXT_MIME_MEDIA_TYPE: u16 = 0x800A;
    pub const RFC5646_TEXT_LANGUAGE_CODE: u16 = 0x800B;
    pub const TEXT_DATA_DESCRIPTION: u16 = 0x800C;
    pub const GENERIC_STREAM_SID: u16 = 0x800D;

    // Text-based DM framework
    pub const OBJECT_REF: u16 = 0x800E;

    // Cryptographic context
    pub const CRYPTO_CONTEXT_ID: u16 = 0x800F;
    pub const SOURCE_ESSENCE_CONTAINER: u16 = 0x8010;
    pub const CIPHER_ALGORITHM: u16 = 0x8011;
    pub const MIC_ALGORITHM: u16 = 0x8012;
    pub const CRYPTOGRAPHIC_KEY_ID: u16 = 0x8013;

    /// Dynamic tags recorded in the primer pack.
    pub const DYNAMIC: &[u16] = &[
        CONFORMS_TO_SPECS,
        EVENT_COMMENT,
        SUB_DESCRIPTORS,
        MCA_LABEL_DICTIONARY_ID,
        MCA_LINK_ID,
        MCA_TAG_SYMBOL,
        MCA_TAG_NAME,
        RFC5646_SPOKEN_LANGUAGE,
        PAYLOAD_SCHEME_ID,
        TEXT_MIME_MEDIA_TYPE,
        RFC5646_TEXT_LANGUAGE_CODE,
        TEXT_DATA_DESCRIPTION,
        GENERIC_STREAM_SID,
        OBJECT_REF,
        CRYPTO_CONTEXT_ID,
        SOURCE_ESSENCE_CONTAINER,
        CIPHER_ALGORITHM,
        MIC_ALGORITHM,
        CRYPTOGRAPHIC_KEY_ID,
    ];
}

// ---------------------------------------------------------------------------
// Field encoding helpers

fn put_bytes(out: &mut Vec<u8>, tag: u16, value: &[u8]) -> Result<()> {
    write_local_set(out, tag, value)?;
    Ok(())
}

fn put_u16(out: &mut Vec<u8>, tag: u16, value: u16) -> Result<()> {
    put_bytes(out, tag, &value.to_be_bytes())
}

fn put_u32(out: &mut Vec<u8>, tag: u16, value: u32) -> Result<()> {
    put_bytes(out, tag, &value.to_be_bytes())
}

fn put_i64(out: &mut Vec<u8>, tag: u16, value: i64) -> Result<()> {
    put_bytes(out, tag, &value.to_be_bytes())
}

fn put_rational(out: &mut Vec<u8>, tag: u16, value: &Rational) -> Result<()> {
    let mut buf = [0u8; 8];
    buf[..4].copy_from_slice(&value.numerator.to_be_bytes());
    buf[4..].copy_from_slice(&value.denominator.to_be_bytes());
    put_bytes(out, tag, &buf)
}

fn put_string(out: &mut Vec<u8>, tag: u16, value: &str) -> Result<()> {
    let mut buf = Vec::with_capacity(value.len() * 2);
    for unit in value.encode_utf16() {
        buf.write_u16::<BigEndian>(unit)?;
    }
    put_bytes(out, tag, &buf)
}

fn put_timestamp(out: &mut Vec<u8>, tag: u16, value: &MxfTimestamp) -> Result<()> {
    put_bytes(out, tag, &value.to_bytes())
}

fn put_ref_batch(out: &mut Vec<u8>, tag: u16, refs: &[InstanceUid]) -> Result<()> {
    let mut buf = Vec::with_capacity(8 + refs.len() * 16);
    buf.write_u32::<BigEndian>(refs.len() as u32)?;
    buf.write_u32::<BigEndian>(16)?;
    for r in refs {
        buf.extend_from_slice(r);
    }
    put_bytes(out, tag, &buf)
}

fn put_ul_batch(out: &mut Vec<u8>, tag: u16, uls: &[UL]) -> Result<()> {
    let mut buf = Vec::with_capacity(8 + uls.len() * 16);
    buf.write_u32::<BigEndian>(uls.len() as u32)?;
    buf.write_u32::<BigEndian>(16)?;
    for ul in uls {
        buf.extend_from_slice(ul);
    }
    put_bytes(out, tag, &buf)
}

fn parse_u16(value: &[u8]) -> Result<u16> {
    if value.len() < 2 {
        return Err(MxfError::Format("u16 item too short".into()));
    }
    Ok(u16::from_be_bytes([value[0], value[1]]))
}

fn parse_u32(value: &[u8]) -> Result<u32> {
    if value.len() < 4 {
        return Err(MxfError::Format("u32 item too short".into()));
    }
    Ok(u32::from_be_bytes([value[0], value[1], value[2], value[3]]))
}

fn parse_i64(value: &[u8]) -> Result<i64> {
    if value.len() < 8 {
        return Err(MxfError::Format("i64 item too short".into()));
    }
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&value[..8]);
    Ok(i64::from_be_bytes(buf))
}

fn parse_rational(value: &[u8]) -> Result<Rational> {
    if value.len() < 8 {
        return Err(MxfError::Format("rational item too short".into()));
    }
    let num = i32::from_be_bytes([value[0], value[1], value[2], value[3]]);
    let den = i32::from_be_bytes([value[4], value[5], value[6], value[7]]);
    Ok(Rational::new(num, den))
}

fn parse_string(value: &[u8]) -> Result<String> {
    if value.len() % 2 != 0 {
        return Err(MxfError::Format("UTF-16 string item has odd length".into()));
    }
    let units: Vec<u16> = value
        .chunks_exact(2)
        .map(|c| u16::from_be_bytes([c[0], c[1]]))
        .collect();
    String::from_utf16(&units).map_err(|_| MxfError::Format("invalid UTF-16 string".into()))
}

fn parse_timestamp(value: &[u8]) -> Result<MxfTimestamp> {
    MxfTimestamp::from_bytes(value).ok_or_else(|| MxfError::Format("timestamp too short".into()))
}

fn parse_uid(value: &[u8]) -> Result<InstanceUid> {
    if value.len() < 16 {
        return Err(MxfError::Format("UID item too short".into()));
    }
    let mut uid = [0u8; 16];
    uid.copy_from_slice(&value[..16]);
    Ok(uid)
}

fn parse_umid(value: &[u8]) -> Result<Umid> {
    if value.len() < 32 {
        return Err(MxfError::Format("UMID item too short".into()));
    }
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&value[..32]);
    Ok(Umid(bytes))
}

fn parse_ref_batch(value: &[u8]) -> Result<Vec<InstanceUid>> {
    let mut cursor = std::io::Cursor::new(value);
    let count = cursor.read_u32::<BigEndian>()? as usize;
    let item_size = cursor.read_u32::<BigEndian>()? as usize;
    if item_size != 16 || value.len() < 8 + count * 16 {
        return Err(MxfError::Format("malformed reference batch".into()));
    }

    let mut refs = Vec::with_capacity(count);
    for i in 0..count {
        let start = 8 + i * 16;
        let mut uid = [0u8; 16];
        uid.copy_from_slice(&value[start..start + 16]);
        refs.push(uid);
    }
    Ok(refs)
}

// ---------------------------------------------------------------------------
// Interchange objects

/// Preface: root of the metadata tree
#[derive(Debug, Clone)]
pub struct Preface {
    pub instance_uid: InstanceUid,
    pub last_modified: MxfTimestamp,
    pub version: u16,
    pub identifications: Vec<InstanceUid>,
    pub content_storage: InstanceUid,
    pub operational_pattern: UL,
    pub essence_containers: Vec<UL>,
    pub dm_schemes: Vec<UL>,
    pub conforms_to_specs: Vec<UL>,
}

impl Preface {
    fn serialize(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        put_bytes(&mut out, tags::INSTANCE_UID, &self.instance_uid)?;
        put_timestamp(&mut out, tags::LAST_MODIFIED_DATE, &self.last_modified)?;
        put_u16(&mut out, tags::VERSION, self.version)?;
        put_ref_batch(&mut out, tags::IDENTIFICATIONS, &self.identifications)?;
        put_bytes(&mut out, tags::CONTENT_STORAGE, &self.content_storage)?;
        put_bytes(&mut out, tags::OPERATIONAL_PATTERN, &self.operational_pattern)?;
        put_ul_batch(&mut out, tags::ESSENCE_CONTAINERS, &self.essence_containers)?;
        put_ul_batch(&mut out, tags::DM_SCHEMES, &self.dm_schemes)?;
        if !self.conforms_to_specs.is_empty() {
            put_ul_batch(&mut out, tags::CONFORMS_TO_SPECS, &self.conforms_to_specs)?;
        }
        Ok(out)
    }

    fn parse(data: &[u8]) -> Result<Self> {
        let mut preface = Preface {
            instance_uid: [0u8; 16],
            last_modified: MxfTimestamp::default(),
            version: 0x0103,
            identifications: Vec::new(),
            content_storage: [0u8; 16],
            operational_pattern: [0u8; 16],
            essence_containers: Vec::new(),
            dm_schemes: Vec::new(),
            conforms_to_specs: Vec::new(),
        };

        for_each_item(data, |tag, value| {
            match tag {
                tags::INSTANCE_UID => preface.instance_uid = parse_uid(value)?,
                tags::LAST_MODIFIED_DATE => preface.last_modified = parse_timestamp(value)?,
                tags::VERSION => preface.version = parse_u16(value)?,
                tags::IDENTIFICATIONS => preface.identifications = parse_ref_batch(value)?,
                tags::CONTENT_STORAGE => preface.content_storage = parse_uid(value)?,
                tags::OPERATIONAL_PATTERN => preface.operational_pattern = parse_uid(value)?,
                tags::ESSENCE_CONTAINERS => preface.essence_containers = parse_ref_batch(value)?,
                tags::DM_SCHEMES => preface.dm_schemes = parse_ref_batch(value)?,
                tags::CONFORMS_TO_SPECS => preface.conforms_to_specs = parse_ref_batch(value)?,
                _ => {}
            }
            Ok(())
        })?;

        Ok(preface)
    }
}

/// Identification: who wrote the file
#[derive(Debug, Clone)]
pub struct Identification {
    pub instance_uid: InstanceUid,
    pub this_generation_uid: InstanceUid,
    pub company_name: String,
    pub product_name: String,
    pub version_string: String,
    pub product_uid: [u8; 16],
    pub modification_date: MxfTimestamp,
}

impl Identification {
    fn serialize(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        put_bytes(&mut out, tags::INSTANCE_UID, &self.instance_uid)?;
        put_bytes(&mut out, tags::THIS_GENERATION_UID, &self.this_generation_uid)?;
        put_string(&mut out, tags::COMPANY_NAME, &self.company_name)?;
        put_string(&mut out, tags::PRODUCT_NAME, &self.product_name)?;
        put_string(&mut out, tags::VERSION_STRING, &self.version_string)?;
        put_bytes(&mut out, tags::PRODUCT_UID, &self.product_uid)?;
        put_timestamp(&mut out, tags::MODIFICATION_DATE, &self.modification_date)?;
        Ok(out)
    }

    fn parse(data: &[u8]) -> Result<Self> {
        let mut ident = Identification {
            instance_uid: [0u8; 16],
            this_generation_uid: [0u8; 16],
            company_name: String::new(),
            product_name: String::new(),
            version_string: String::new(),
            product_uid: [0u8; 16],
            modification_date: MxfTimestamp::default(),
        };

        for_each_item(data, |tag, value| {
            match tag {
                tags::INSTANCE_UID => ident.instance_uid = parse_uid(value)?,
                tags::THIS_GENERATION_UID => ident.this_generation_uid = parse_uid(value)?,
                tags::COMPANY_NAME => ident.company_name = parse_string(value)?,
                tags::PRODUCT_NAME => ident.product_name = parse_string(value)?,
                tags::VERSION_STRING => ident.version_string = parse_string(value)?,
                tags::PRODUCT_UID => ident.product_uid = parse_uid(value)?,
                tags::MODIFICATION_DATE => ident.modification_date = parse_timestamp(value)?,
                _ => {}
            }
            Ok(())
        })?;

        Ok(ident)
    }
}

/// Content storage: the package list
#[derive(Debug, Clone)]
pub struct ContentStorage {
    pub instance_uid: InstanceUid,
    pub packages: Vec<InstanceUid>,
}

impl ContentStorage {
    fn serialize(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        put_bytes(&mut out, tags::INSTANCE_UID, &self.instance_uid)?;
        put_ref_batch(&mut out, tags::PACKAGES, &self.packages)?;
        Ok(out)
    }

    fn parse(data: &[u8]) -> Result<Self> {
        let mut storage = ContentStorage {
            instance_uid: [0u8; 16],
            packages: Vec::new(),
        };

        for_each_item(data, |tag, value| {
            match tag {
                tags::INSTANCE_UID => storage.instance_uid = parse_uid(value)?,
                tags::PACKAGES => storage.packages = parse_ref_batch(value)?,
                _ => {}
            }
            Ok(())
        })?;

        Ok(storage)
    }
}

/// A material or source package
#[derive(Debug, Clone)]
pub struct Package {
    pub instance_uid: InstanceUid,
    pub package_uid: Umid,
    pub name: Option<String>,
    pub creation_date: MxfTimestamp,
    pub modified_date: MxfTimestamp,
    pub tracks: Vec<InstanceUid>,
    /// Strong reference to the essence descriptor (source packages only)
    pub descriptor: Option<InstanceUid>,
}

impl Package {
    fn serialize(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        put_bytes(&mut out, tags::INSTANCE_UID, &self.instance_uid)?;
        put_bytes(&mut out, tags::PACKAGE_UID, &self.package_uid.0)?;
        if let Some(name) = &self.name {
            put_string(&mut out, tags::PACKAGE_NAME, name)?;
        }
        put_timestamp(&mut out, tags::PACKAGE_CREATION_DATE, &self.creation_date)?;
        put_timestamp(&mut out, tags::PACKAGE_MODIFIED_DATE, &self.modified_date)?;
        put_ref_batch(&mut out, tags::TRACKS, &self.tracks)?;
        if let Some(descriptor) = &self.descriptor {
            put_bytes(&mut out, tags::DESCRIPTOR, descriptor)?;
        }
        Ok(out)
    }

    fn parse(data: &[u8]) -> Result<Self> {
        let mut package = Package {
            instance_uid: [0u8; 16],
            package_uid: Umid::zero(),
            name: None,
            creation_date: MxfTimestamp::default(),
            modified_date: MxfTimestamp::default(),
            tracks: Vec::new(),
            descriptor: None,
        };

        for_each_item(data, |tag, value| {
            match tag {
                tags::INSTANCE_UID => package.instance_uid = parse_uid(value)?,
                tags::PACKAGE_UID => package.package_uid = parse_umid(value)?,
                tags::PACKAGE_NAME => package.name = Some(parse_string(value)?),
                tags::PACKAGE_CREATION_DATE => package.creation_date = parse_timestamp(value)?,
                tags::PACKAGE_MODIFIED_DATE => package.modified_date = parse_timestamp(value)?,
                tags::TRACKS => package.tracks = parse_ref_batch(value)?,
                tags::DESCRIPTOR => package.descriptor = Some(parse_uid(value)?),
                _ => {}
            }
            Ok(())
        })?;

        Ok(package)
    }
}

/// A timeline or static track
#[derive(Debug, Clone)]
pub struct Track {
    pub instance_uid: InstanceUid,
    pub track_id: u32,
    pub track_number: u32,
    pub track_name: Option<String>,
    /// Edit rate and origin are present on timeline tracks only
    pub edit_rate: Option<Rational>,
    pub origin: i64,
    pub sequence: InstanceUid,
}

impl Track {
    fn serialize(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        put_bytes(&mut out, tags::INSTANCE_UID, &self.instance_uid)?;
        put_u32(&mut out, tags::TRACK_ID, self.track_id)?;
        put_u32(&mut out, tags::TRACK_NUMBER, self.track_number)?;
        if let Some(name) = &self.track_name {
            put_string(&mut out, tags::TRACK_NAME, name)?;
        }
        if let Some(edit_rate) = &self.edit_rate {
            put_rational(&mut out, tags::EDIT_RATE, edit_rate)?;
            put_i64(&mut out, tags::ORIGIN, self.origin)?;
        }
        put_bytes(&mut out, tags::TRACK_SEQUENCE, &self.sequence)?;
        Ok(out)
    }

    fn parse(data: &[u8]) -> Result<Self> {
        let mut track = Track {
            instance_uid: [0u8; 16],
            track_id: 0,
            track_number: 0,
            track_name: None,
            edit_rate: None,
            origin: 0,
            sequence: [0u8; 16],
        };

        for_each_item(data, |tag, value| {
            match tag {
                tags::INSTANCE_UID => track.instance_uid = parse_uid(value)?,
                tags::TRACK_ID => track.track_id = parse_u32(value)?,
                tags::TRACK_NUMBER => track.track_number = parse_u32(value)?,
                tags::TRACK_NAME => track.track_name = Some(parse_string(value)?),
                tags::EDIT_RATE => track.edit_rate = Some(parse_rational(value)?),
                tags::ORIGIN => track.origin = parse_i64(value)?,
                tags::TRACK_SEQUENCE => track.sequence = parse_uid(value)?,
                _ => {}
            }
            Ok(())
        })?;

        Ok(track)
    }
}

/// Sequence of structural components
#[derive(Debug, Clone)]
pub struct Sequence {
    pub instance_uid: InstanceUid,
    pub data_definition: UL,
    pub duration: Option<i64>,
    pub components: Vec<InstanceUid>,
}

impl Sequence {
    fn serialize(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        put_bytes(&mut out, tags::INSTANCE_UID, &self.instance_uid)?;
        put_bytes(&mut out, tags::DATA_DEFINITION, &self.data_definition)?;
        if let Some(duration) = self.duration {
            put_i64(&mut out, tags::DURATION, duration)?;
        }
        put_ref_batch(&mut out, tags::STRUCTURAL_COMPONENTS, &self.components)?;
        Ok(out)
    }

    fn parse(data: &[u8]) -> Result<Self> {
        let mut seq = Sequence {
            instance_uid: [0u8; 16],
            data_definition: [0u8; 16],
            duration: None,
            components: Vec::new(),
        };

        for_each_item(data, |tag, value| {
            match tag {
                tags::INSTANCE_UID => seq.instance_uid = parse_uid(value)?,
                tags::DATA_DEFINITION => seq.data_definition = parse_uid(value)?,
                tags::DURATION => seq.duration = Some(parse_i64(value)?),
                tags::STRUCTURAL_COMPONENTS => seq.components = parse_ref_batch(value)?,
                _ => {}
            }
            Ok(())
        })?;

        Ok(seq)
    }
}

/// Source clip referencing essence in another package
#[derive(Debug, Clone)]
pub struct SourceClip {
    pub instance_uid: InstanceUid,
    pub data_definition: UL,
    pub duration: Option<i64>,
    pub start_position: i64,
    pub source_package_id: Umid,
    pub source_track_id: u32,
}

impl SourceClip {
    fn serialize(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        put_bytes(&mut out, tags::INSTANCE_UID, &self.instance_uid)?;
        put_bytes(&mut out, tags::DATA_DEFINITION, &self.data_definition)?;
        if let Some(duration) = self.duration {
            put_i64(&mut out, tags::DURATION, duration)?;
        }
        put_i64(&mut out, tags::START_POSITION, self.start_position)?;
        put_bytes(&mut out, tags::SOURCE_PACKAGE_ID, &self.source_package_id.0)?;
        put_u32(&mut out, tags::SOURCE_TRACK_ID, self.source_track_id)?;
        Ok(out)
    }

    fn parse(data: &[u8]) -> Result<Self> {
        let mut clip = SourceClip {
            instance_uid: [0u8; 16],
            data_definition: [0u8; 16],
            duration: None,
            start_position: 0,
            source_package_id: Umid::zero(),
            source_track_id: 0,
        };

        for_each_item(data, |tag, value| {
            match tag {
                tags::INSTANCE_UID => clip.instance_uid = parse_uid(value)?,
                tags::DATA_DEFINITION => clip.data_definition = parse_uid(value)?,
                tags::DURATION => clip.duration = Some(parse_i64(value)?),
                tags::START_POSITION => clip.start_position = parse_i64(value)?,
                tags::SOURCE_PACKAGE_ID => clip.source_package_id = parse_umid(value)?,
                tags::SOURCE_TRACK_ID => clip.source_track_id = parse_u32(value)?,
                _ => {}
            }
            Ok(())
        })?;

        Ok(clip)
    }
}

/// Descriptive marker segment
#[derive(Debug, Clone)]
pub struct DmSegment {
    pub instance_uid: InstanceUid,
    pub data_definition: UL,
    pub duration: Option<i64>,
    pub event_comment: Option<String>,
    pub dm_framework: InstanceUid,
}

impl DmSegment {
    fn serialize(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        put_bytes(&mut out, tags::INSTANCE_UID, &self.instance_uid)?;
        put_bytes(&mut out, tags::DATA_DEFINITION, &self.data_definition)?;
        if let Some(duration) = self.duration {
            put_i64(&mut out, tags::DURATION, duration)?;
        }
        if let Some(comment) = &self.event_comment {
            put_string(&mut out, tags::EVENT_COMMENT, comment)?;
        }
        put_bytes(&mut out, tags::DM_FRAMEWORK, &self.dm_framework)?;
        Ok(out)
    }

    fn parse(data: &[u8]) -> Result<Self> {
        let mut segment = DmSegment {
            instance_uid: [0u8; 16],
            data_definition: [0u8; 16],
            duration: None,
            event_comment: None,
            dm_framework: [0u8; 16],
        };

        for_each_item(data, |tag, value| {
            match tag {
                tags::INSTANCE_UID => segment.instance_uid = parse_uid(value)?,
                tags::DATA_DEFINITION => segment.data_definition = parse_uid(value)?,
                tags::DURATION => segment.duration = Some(parse_i64(value)?),
                tags::EVENT_COMMENT => segment.event_comment = Some(parse_string(value)?),
                tags::DM_FRAMEWORK => segment.dm_framework = parse_uid(value)?,
                _ => {}
            }
            Ok(())
        })?;

        Ok(segment)
    }
}

/// Text-based descriptive metadata framework (RP 2057)
#[derive(Debug, Clone)]
pub struct TextBasedDmFramework {
    pub instance_uid: InstanceUid,
    pub object_ref: InstanceUid,
}

impl TextBasedDmFramework {
    fn serialize(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        put_bytes(&mut out, tags::INSTANCE_UID, &self.instance_uid)?;
        put_bytes(&mut out, tags::OBJECT_REF, &self.object_ref)?;
        Ok(out)
    }

    fn parse(data: &[u8]) -> Result<Self> {
        let mut framework = TextBasedDmFramework {
            instance_uid: [0u8; 16],
            object_ref: [0u8; 16],
        };

        for_each_item(data, |tag, value| {
            match tag {
                tags::INSTANCE_UID => framework.instance_uid = parse_uid(value)?,
                tags::OBJECT_REF => framework.object_ref = parse_uid(value)?,
                _ => {}
            }
            Ok(())
        })?;

        Ok(framework)
    }
}

/// Generic stream text-based set (RP 2057)
#[derive(Debug, Clone)]
pub struct GenericStreamTextBasedSet {
    pub instance_uid: InstanceUid,
    pub payload_scheme_id: UL,
    pub text_mime_media_type: String,
    pub rfc5646_text_language_code: String,
    pub text_data_description: String,
    pub generic_stream_sid: u32,
}

impl GenericStreamTextBasedSet {
    fn serialize(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        put_bytes(&mut out, tags::INSTANCE_UID, &self.instance_uid)?;
        put_bytes(&mut out, tags::PAYLOAD_SCHEME_ID, &self.payload_scheme_id)?;
        put_string(&mut out, tags::TEXT_MIME_MEDIA_TYPE, &self.text_mime_media_type)?;
        put_string(
            &mut out,
            tags::RFC5646_TEXT_LANGUAGE_CODE,
            &self.rfc5646_text_language_code,
        )?;
        put_string(&mut out, tags::TEXT_DATA_DESCRIPTION, &self.text_data_description)?;
        put_u32(&mut out, tags::GENERIC_STREAM_SID, self.generic_stream_sid)?;
        Ok(out)
    }

    fn parse(data: &[u8]) -> Result<Self> {
        let mut set = GenericStreamTextBasedSet {
            instance_uid: [0u8; 16],
            payload_scheme_id: [0u8; 16],
            text_mime_media_type: String::new(),
            rfc5646_text_language_code: String::new(),
            text_data_description: String::new(),
            generic_stream_sid: 0,
        };

        for_each_item(data, |tag, value| {
            match tag {
                tags::INSTANCE_UID => set.instance_uid = parse_uid(value)?,
                tags::PAYLOAD_SCHEME_ID => set.payload_scheme_id = parse_uid(value)?,
                tags::TEXT_MIME_MEDIA_TYPE => set.text_mime_media_type = parse_string(value)?,
                tags::RFC5646_TEXT_LANGUAGE_CODE => {
                    set.rfc5646_text_language_code = parse_string(value)?
                }
                tags::TEXT_DATA_DESCRIPTION => set.text_data_description = parse_string(value)?,
                tags::GENERIC_STREAM_SID => set.generic_stream_sid = parse_u32(value)?,
                _ => {}
            }
            Ok(())
        })?;

        Ok(set)
    }
}

/// Cryptographic context: crypto signaling for encrypted essence
#[derive(Debug, Clone)]
pub struct CryptographicContext {
    pub instance_uid: InstanceUid,
    pub context_id: [u8; 16],
    pub source_essence_container: UL,
    pub cipher_algorithm: UL,
    pub mic_algorithm: UL,
    pub cryptographic_key_id: [u8; 16],
}

impl CryptographicContext {
    fn serialize(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        put_bytes(&mut out, tags::INSTANCE_UID, &self.instance_uid)?;
        put_bytes(&mut out, tags::CRYPTO_CONTEXT_ID, &self.context_id)?;
        put_bytes(
            &mut out,
            tags::SOURCE_ESSENCE_CONTAINER,
            &self.source_essence_container,
        )?;
        put_bytes(&mut out, tags::CIPHER_ALGORITHM, &self.cipher_algorithm)?;
        put_bytes(&mut out, tags::MIC_ALGORITHM, &self.mic_algorithm)?;
        put_bytes(&mut out, tags::CRYPTOGRAPHIC_KEY_ID, &self.cryptographic_key_id)?;
        Ok(out)
    }

    fn parse(data: &[u8]) -> Result<Self> {
        let mut ctx = CryptographicContext {
            instance_uid: [0u8; 16],
            context_id: [0u8; 16],
            source_essence_container: [0u8; 16],
            cipher_algorithm: [0u8; 16],
            mic_algorithm: [0u8; 16],
            cryptographic_key_id: [0u8; 16],
        };

        for_each_item(data, |tag, value| {
            match tag {
                tags::INSTANCE_UID => ctx.instance_uid = parse_uid(value)?,
                tags::CRYPTO_CONTEXT_ID => ctx.context_id = parse_uid(value)?,
                tags::SOURCE_ESSENCE_CONTAINER => {
                    ctx.source_essence_container = parse_uid(value)?
                }
                tags::CIPHER_ALGORITHM => ctx.cipher_algorithm = parse_uid(value)?,
                tags::MIC_ALGORITHM => ctx.mic_algorithm = parse_uid(value)?,
                tags::CRYPTOGRAPHIC_KEY_ID => ctx.cryptographic_key_id = parse_uid(value)?,
                _ => {}
            }
            Ok(())
        })?;

        Ok(ctx)
    }
}

/// IAB essence descriptor
#[derive(Debug, Clone)]
pub struct IabEssenceDescriptor {
    pub instance_uid: InstanceUid,
    pub linked_track_id: u32,
    /// Edit rate of the essence track (not the audio sampling rate)
    pub sample_rate: Rational,
    pub container_duration: Option<i64>,
    pub essence_container: UL,
    pub sound_essence_coding: UL,
    pub audio_sampling_rate: Rational,
    pub channel_count: u32,
    pub quantization_bits: u32,
    pub subdescriptors: Vec<InstanceUid>,
}

impl IabEssenceDescriptor {
    fn serialize(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        put_bytes(&mut out, tags::INSTANCE_UID, &self.instance_uid)?;
        put_u32(&mut out, tags::LINKED_TRACK_ID, self.linked_track_id)?;
        put_rational(&mut out, tags::SAMPLE_RATE, &self.sample_rate)?;
        if let Some(duration) = self.container_duration {
            put_i64(&mut out, tags::CONTAINER_DURATION, duration)?;
        }
        put_bytes(&mut out, tags::ESSENCE_CONTAINER, &self.essence_container)?;
        put_bytes(&mut out, tags::SOUND_ESSENCE_CODING, &self.sound_essence_coding)?;
        put_rational(&mut out, tags::AUDIO_SAMPLING_RATE, &self.audio_sampling_rate)?;
        put_u32(&mut out, tags::CHANNEL_COUNT, self.channel_count)?;
        put_u32(&mut out, tags::QUANTIZATION_BITS, self.quantization_bits)?;
        put_ref_batch(&mut out, tags::SUB_DESCRIPTORS, &self.subdescriptors)?;
        Ok(out)
    }

    fn parse(data: &[u8]) -> Result<Self> {
        let mut desc = IabEssenceDescriptor {
            instance_uid: [0u8; 16],
            linked_track_id: 0,
            sample_rate: Rational::default(),
            container_duration: None,
            essence_container: [0u8; 16],
            sound_essence_coding: [0u8; 16],
            audio_sampling_rate: Rational::default(),
            channel_count: 0,
            quantization_bits: 0,
            subdescriptors: Vec::new(),
        };

        for_each_item(data, |tag, value| {
            match tag {
                tags::INSTANCE_UID => desc.instance_uid = parse_uid(value)?,
                tags::LINKED_TRACK_ID => desc.linked_track_id = parse_u32(value)?,
                tags::SAMPLE_RATE => desc.sample_rate = parse_rational(value)?,
                tags::CONTAINER_DURATION => desc.container_duration = Some(parse_i64(value)?),
                tags::ESSENCE_CONTAINER => desc.essence_container = parse_uid(value)?,
                tags::SOUND_ESSENCE_CODING => desc.sound_essence_coding = parse_uid(value)?,
                tags::AUDIO_SAMPLING_RATE => desc.audio_sampling_rate = parse_rational(value)?,
                tags::CHANNEL_COUNT => desc.channel_count = parse_u32(value)?,
                tags::QUANTIZATION_BITS => desc.quantization_bits = parse_u32(value)?,
                tags::SUB_DESCRIPTORS => desc.subdescriptors = parse_ref_batch(value)?,
                _ => {}
            }
            Ok(())
        })?;

        Ok(desc)
    }
}

/// IAB soundfield label subdescriptor
#[derive(Debug, Clone)]
pub struct IabSoundfieldLabelSubDescriptor {
    pub instance_uid: InstanceUid,
    pub mca_label_dictionary_id: UL,
    pub mca_link_id: [u8; 16],
    pub mca_tag_symbol: String,
    pub mca_tag_name: Option<String>,
    pub rfc5646_spoken_language: Option<String>,
}

impl Default for IabSoundfieldLabelSubDescriptor {
    fn default() -> Self {
        IabSoundfieldLabelSubDescriptor {
            instance_uid: [0u8; 16],
            mca_label_dictionary_id: [0u8; 16],
            mca_link_id: [0u8; 16],
            mca_tag_symbol: String::new(),
            mca_tag_name: None,
            rfc5646_spoken_language: None,
        }
    }
}

impl IabSoundfieldLabelSubDescriptor {
    fn serialize(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        put_bytes(&mut out, tags::INSTANCE_UID, &self.instance_uid)?;
        put_bytes(
            &mut out,
            tags::MCA_LABEL_DICTIONARY_ID,
            &self.mca_label_dictionary_id,
        )?;
        put_bytes(&mut out, tags::MCA_LINK_ID, &self.mca_link_id)?;
        put_string(&mut out, tags::MCA_TAG_SYMBOL, &self.mca_tag_symbol)?;
        if let Some(name) = &self.mca_tag_name {
            put_string(&mut out, tags::MCA_TAG_NAME, name)?;
        }
        if let Some(lang) = &self.rfc5646_spoken_language {
            put_string(&mut out, tags::RFC5646_SPOKEN_LANGUAGE, lang)?;
        }
        Ok(out)
    }

    fn parse(data: &[u8]) -> Result<Self> {
        let mut sub = IabSoundfieldLabelSubDescriptor::default();

        for_each_item(data, |tag, value| {
            match tag {
                tags::INSTANCE_UID => sub.instance_uid = parse_uid(value)?,
                tags::MCA_LABEL_DICTIONARY_ID => {
                    sub.mca_label_dictionary_id = parse_uid(value)?
                }
                tags::MCA_LINK_ID => sub.mca_link_id = parse_uid(value)?,
                tags::MCA_TAG_SYMBOL => sub.mca_tag_symbol = parse_string(value)?,
                tags::MCA_TAG_NAME => sub.mca_tag_name = Some(parse_string(value)?),
                tags::RFC5646_SPOKEN_LANGUAGE => {
                    sub.rfc5646_spoken_language = Some(parse_string(value)?)
                }
                _ => {}
            }
            Ok(())
        })?;

        Ok(sub)
    }
}

fn for_each_item<F>(data: &[u8], mut f: F) -> Result<()>
where
    F: FnMut(u16, &[u8]) -> Result<()>,
{
    let mut offset = 0;
    while offset + 4 <= data.len() {
        let (tag, value, consumed) = read_local_set(data, offset)?;
        f(tag, value)?;
        offset += consumed;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// The owning tree

/// One interchange object in the metadata tree.
#[derive(Debug, Clone)]
pub enum MetadataSet {
    Preface(Preface),
    Identification(Identification),
    ContentStorage(ContentStorage),
    MaterialPackage(Package),
    SourcePackage(Package),
    TimelineTrack(Track),
    StaticTrack(Track),
    Sequence(Sequence),
    SourceClip(SourceClip),
    DmSegment(DmSegment),
    TextBasedDmFramework(TextBasedDmFramework),
    GenericStreamTextBasedSet(GenericStreamTextBasedSet),
    CryptographicContext(CryptographicContext),
    IabEssenceDescriptor(IabEssenceDescriptor),
    IabSoundfieldLabelSubDescriptor(IabSoundfieldLabelSubDescriptor),
}

impl MetadataSet {
    /// The set key this object serializes under.
    pub fn set_ul(&self) -> UL {
        match self {
            MetadataSet::Preface(_) => labels::PREFACE,
            MetadataSet::Identification(_) => labels::IDENTIFICATION,
            MetadataSet::ContentStorage(_) => labels::CONTENT_STORAGE,
            MetadataSet::MaterialPackage(_) => labels::MATERIAL_PACKAGE,
            MetadataSet::SourcePackage(_) => labels::SOURCE_PACKAGE,
            MetadataSet::TimelineTrack(_) => labels::TIMELINE_TRACK,
            MetadataSet::StaticTrack(_) => labels::STATIC_TRACK,
            MetadataSet::Sequence(_) => labels::SEQUENCE,
            MetadataSet::SourceClip(_) => labels::SOURCE_CLIP,
            MetadataSet::DmSegment(_) => labels::DM_SEGMENT,
            MetadataSet::TextBasedDmFramework(_) => labels::TEXT_BASED_DM_FRAMEWORK,
            MetadataSet::GenericStreamTextBasedSet(_) => labels::GENERIC_STREAM_TEXT_BASED_SET,
            MetadataSet::CryptographicContext(_) => labels::CRYPTOGRAPHIC_CONTEXT,
            MetadataSet::IabEssenceDescriptor(_) => labels::IAB_ESSENCE_DESCRIPTOR,
            MetadataSet::IabSoundfieldLabelSubDescriptor(_) => {
                labels::IAB_SOUNDFIELD_LABEL_SUBDESCRIPTOR
            }
        }
    }

    /// This object's instance UID.
    pub fn instance_uid(&self) -> InstanceUid {
        match self {
            MetadataSet::Preface(o) => o.instance_uid,
            MetadataSet::Identification(o) => o.instance_uid,
            MetadataSet::ContentStorage(o) => o.instance_uid,
            MetadataSet::MaterialPackage(o) => o.instance_uid,
            MetadataSet::SourcePackage(o) => o.instance_uid,
            MetadataSet::TimelineTrack(o) => o.instance_uid,
            MetadataSet::StaticTrack(o) => o.instance_uid,
            MetadataSet::Sequence(o) => o.instance_uid,
            MetadataSet::SourceClip(o) => o.instance_uid,
            MetadataSet::DmSegment(o) => o.instance_uid,
            MetadataSet::TextBasedDmFramework(o) => o.instance_uid,
            MetadataSet::GenericStreamTextBasedSet(o) => o.instance_uid,
            MetadataSet::CryptographicContext(o) => o.instance_uid,
            MetadataSet::IabEssenceDescriptor(o) => o.instance_uid,
            MetadataSet::IabSoundfieldLabelSubDescriptor(o) => o.instance_uid,
        }
    }

    fn serialize_body(&self) -> Result<Vec<u8>> {
        match self {
            MetadataSet::Preface(o) => o.serialize(),
            MetadataSet::Identification(o) => o.serialize(),
            MetadataSet::ContentStorage(o) => o.serialize(),
            MetadataSet::MaterialPackage(o) => o.serialize(),
            MetadataSet::SourcePackage(o) => o.serialize(),
            MetadataSet::TimelineTrack(o) => o.serialize(),
            MetadataSet::StaticTrack(o) => o.serialize(),
            MetadataSet::Sequence(o) => o.serialize(),
            MetadataSet::SourceClip(o) => o.serialize(),
            MetadataSet::DmSegment(o) => o.serialize(),
            MetadataSet::TextBasedDmFramework(o) => o.serialize(),
            MetadataSet::GenericStreamTextBasedSet(o) => o.serialize(),
            MetadataSet::CryptographicContext(o) => o.serialize(),
            MetadataSet::IabEssenceDescriptor(o) => o.serialize(),
            MetadataSet::IabSoundfieldLabelSubDescriptor(o) => o.serialize(),
        }
    }

    /// Typed accessors used by the reader.
    pub fn as_preface(&self) -> Option<&Preface> {
        match self {
            MetadataSet::Preface(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_identification(&self) -> Option<&Identification> {
        match self {
            MetadataSet::Identification(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_source_package(&self) -> Option<&Package> {
        match self {
            MetadataSet::SourcePackage(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_descriptor(&self) -> Option<&IabEssenceDescriptor> {
        match self {
            MetadataSet::IabEssenceDescriptor(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_subdescriptor(&self) -> Option<&IabSoundfieldLabelSubDescriptor> {
        match self {
            MetadataSet::IabSoundfieldLabelSubDescriptor(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_text_based_set(&self) -> Option<&GenericStreamTextBasedSet> {
        match self {
            MetadataSet::GenericStreamTextBasedSet(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_cryptographic_context(&self) -> Option<&CryptographicContext> {
        match self {
            MetadataSet::CryptographicContext(o) => Some(o),
            _ => None,
        }
    }
}

/// The owning metadata tree stored in the header partition.
#[derive(Debug, Clone, Default)]
pub struct HeaderMetadata {
    sets: Vec<MetadataSet>,
}

impl HeaderMetadata {
    /// Create an empty tree
    pub fn new() -> Self {
        HeaderMetadata { sets: Vec::new() }
    }

    /// Number of objects in the tree
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    /// Whether the tree is empty
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Add an object, returning its instance UID
    pub fn add(&mut self, set: MetadataSet) -> InstanceUid {
        let uid = set.instance_uid();
        self.sets.push(set);
        uid
    }

    /// Get a single object by set key
    pub fn get_by_type(&self, ul: &UL) -> Option<&MetadataSet> {
        self.sets.iter().find(|set| &set.set_ul() == ul)
    }

    /// Get all objects with a set key
    pub fn get_all_by_type(&self, ul: &UL) -> Vec<&MetadataSet> {
        self.sets.iter().filter(|set| &set.set_ul() == ul).collect()
    }

    /// Get a single mutable object by set key
    pub fn get_by_type_mut(&mut self, ul: &UL) -> Option<&mut MetadataSet> {
        self.sets.iter_mut().find(|set| &set.set_ul() == ul)
    }

    /// Get an object by instance UID
    pub fn get(&self, uid: &InstanceUid) -> Option<&MetadataSet> {
        self.sets.iter().find(|set| &set.instance_uid() == uid)
    }

    /// Get a mutable object by instance UID
    pub fn get_mut(&mut self, uid: &InstanceUid) -> Option<&mut MetadataSet> {
        self.sets.iter_mut().find(|set| &set.instance_uid() == uid)
    }

    /// Iterate over every object
    pub fn iter(&self) -> impl Iterator<Item = &MetadataSet> {
        self.sets.iter()
    }

    /// Set the duration field of the object with the given UID, if it has
    /// one. Returns whether anything was updated.
    pub fn set_duration(&mut self, uid: &InstanceUid, duration: i64) -> bool {
        match self.get_mut(uid) {
            Some(MetadataSet::Sequence(seq)) => {
                seq.duration = Some(duration);
                true
            }
            Some(MetadataSet::SourceClip(clip)) => {
                clip.duration = Some(duration);
                true
            }
            Some(MetadataSet::DmSegment(segment)) => {
                segment.duration = Some(duration);
                true
            }
            Some(MetadataSet::IabEssenceDescriptor(desc)) => {
                desc.container_duration = Some(duration);
                true
            }
            _ => false,
        }
    }

    /// Serialize every object as a KLV batch
    pub fn serialize<W: Write>(&self, writer: &mut W) -> Result<usize> {
        let mut written = 0;
        for set in &self.sets {
            let klv = Klv::new(set.set_ul(), set.serialize_body()?);
            written += klv.write(writer)?;
        }
        Ok(written)
    }

    /// Parse one KLV into an object and add it to the tree. Unknown
    /// metadata keys are skipped (returns false).
    pub fn parse_and_add(&mut self, klv: &Klv) -> Result<bool> {
        let key = klv.key.as_bytes();
        let set = if key == &labels::PREFACE {
            MetadataSet::Preface(Preface::parse(&klv.value)?)
        } else if key == &labels::IDENTIFICATION {
            MetadataSet::Identification(Identification::parse(&klv.value)?)
        } else if key == &labels::CONTENT_STORAGE {
            MetadataSet::ContentStorage(ContentStorage::parse(&klv.value)?)
        } else if key == &labels::MATERIAL_PACKAGE {
            MetadataSet::MaterialPackage(Package::parse(&klv.value)?)
        } else if key == &labels::SOURCE_PACKAGE {
            MetadataSet::SourcePackage(Package::parse(&klv.value)?)
        } else if key == &labels::TIMELINE_TRACK {
            MetadataSet::TimelineTrack(Track::parse(&klv.value)?)
        } else if key == &labels::STATIC_TRACK {
            MetadataSet::StaticTrack(Track::parse(&klv.value)?)
        } else if key == &labels::SEQUENCE {
            MetadataSet::Sequence(Sequence::parse(&klv.value)?)
        } else if key == &labels::SOURCE_CLIP {
            MetadataSet::SourceClip(SourceClip::parse(&klv.value)?)
        } else if key == &labels::DM_SEGMENT {
            MetadataSet::DmSegment(DmSegment::parse(&klv.value)?)
        } else if key == &labels::TEXT_BASED_DM_FRAMEWORK {
            MetadataSet::TextBasedDmFramework(TextBasedDmFramework::parse(&klv.value)?)
        } else if key == &labels::GENERIC_STREAM_TEXT_BASED_SET {
            MetadataSet::GenericStreamTextBasedSet(GenericStreamTextBasedSet::parse(&klv.value)?)
        } else if key == &labels::CRYPTOGRAPHIC_CONTEXT {
            MetadataSet::CryptographicContext(CryptographicContext::parse(&klv.value)?)
        } else if key == &labels::IAB_ESSENCE_DESCRIPTOR {
            MetadataSet::IabEssenceDescriptor(IabEssenceDescriptor::parse(&klv.value)?)
        } else if key == &labels::IAB_SOUNDFIELD_LABEL_SUBDESCRIPTOR {
            MetadataSet::IabSoundfieldLabelSubDescriptor(IabSoundfieldLabelSubDescriptor::parse(
                &klv.value,
            )?)
        } else {
            log::debug!("skipping unknown metadata set: {}", klv.key);
            return Ok(false);
        };

        self.sets.push(set);
        Ok(true)
    }

    /// Dump a one-line-per-object description, for diagnostics.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for set in &self.sets {
            let uid = set.instance_uid();
            out.push_str(&format!(
                "{} {:02x}{:02x}{:02x}{:02x}...\n",
                UniversalLabel(set.set_ul()),
                uid[0],
                uid[1],
                uid[2],
                uid[3]
            ));
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Primer pack

/// Primer pack mapping local tags to item ULs.
#[derive(Debug, Clone)]
pub struct PrimerPack {
    pub mappings: Vec<(u16, UL)>,
}

impl Default for PrimerPack {
    fn default() -> Self {
        PrimerPack::new()
    }
}

impl PrimerPack {
    /// Create a primer covering every dynamic tag this profile writes.
    pub fn new() -> Self {
        PrimerPack {
            mappings: tags::DYNAMIC.iter().map(|&tag| (tag, item_ul(tag))).collect(),
        }
    }

    /// Lookup UL by tag
    pub fn lookup(&self, tag: u16) -> Option<&UL> {
        self.mappings
            .iter()
            .find(|(t, _)| *t == tag)
            .map(|(_, ul)| ul)
    }

    /// Serialize the primer as a KLV
    pub fn to_klv(&self) -> Result<Klv> {
        let mut value = Vec::new();
        value.write_u32::<BigEndian>(self.mappings.len() as u32)?;
        value.write_u32::<BigEndian>(18)?;
        for (tag, ul) in &self.mappings {
            value.write_u16::<BigEndian>(*tag)?;
            value.extend_from_slice(ul);
        }
        Ok(Klv::new(labels::PRIMER_PACK, value))
    }

    /// Parse a primer value
    pub fn parse(value: &[u8]) -> Result<Self> {
        let mut cursor = std::io::Cursor::new(value);
        let count = cursor.read_u32::<BigEndian>()? as usize;
        let item_size = cursor.read_u32::<BigEndian>()? as usize;

        if item_size != 18 || value.len() < 8 + count * 18 {
            return Err(MxfError::Format("malformed primer pack".into()));
        }

        let mut mappings = Vec::with_capacity(count);
        for i in 0..count {
            let start = 8 + i * 18;
            let tag = u16::from_be_bytes([value[start], value[start + 1]]);
            let mut ul = [0u8; 16];
            ul.copy_from_slice(&value[start + 2..start + 18]);
            mappings.push((tag, ul));
        }

        Ok(PrimerPack { mappings })
    }
}

/// Deterministic item UL for a dynamic tag, recorded in the primer.
fn item_ul(tag: u16) -> UL {
    let tag_bytes = tag.to_be_bytes();
    [
        0x06, 0x0E, 0x2B, 0x34, 0x01, 0x01, 0x01, 0x01, 0x0D, 0x01, 0x04, 0x02, tag_bytes[0],
        tag_bytes[1], 0x00, 0x00,
    ]
}
