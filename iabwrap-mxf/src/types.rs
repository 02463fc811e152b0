//! Basic track file type definitions

use std::fmt;

/// Rational number for edit and sampling rates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rational {
    pub numerator: i32,
    pub denominator: i32,
}

impl Rational {
    /// Create new rational
    pub fn new(numerator: i32, denominator: i32) -> Self {
        Rational {
            numerator,
            denominator,
        }
    }

    /// Convert to f64
    pub fn to_f64(&self) -> f64 {
        if self.denominator == 0 {
            0.0
        } else {
            self.numerator as f64 / self.denominator as f64
        }
    }

    /// Common edit rates
    pub fn fps_24() -> Self {
        Rational::new(24, 1)
    }

    pub fn fps_25() -> Self {
        Rational::new(25, 1)
    }

    pub fn fps_23_976() -> Self {
        Rational::new(24000, 1001)
    }

    /// 48 kHz audio sampling rate
    pub fn hz_48k() -> Self {
        Rational::new(48000, 1)
    }

    /// 96 kHz audio sampling rate
    pub fn hz_96k() -> Self {
        Rational::new(96000, 1)
    }
}

impl Default for Rational {
    fn default() -> Self {
        Rational::new(1, 1)
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

/// UMID (Unique Material Identifier) - 32 bytes
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Umid(pub [u8; 32]);

impl Umid {
    /// Create new UMID
    pub fn new(bytes: [u8; 32]) -> Self {
        Umid(bytes)
    }

    /// Create zero UMID
    pub fn zero() -> Self {
        Umid([0; 32])
    }

    /// Generate a new random UMID
    pub fn generate() -> Self {
        use uuid::Uuid;

        let mut bytes = [0u8; 32];

        // Bytes 0-11: Universal Label (SMPTE 330M)
        bytes[0..12].copy_from_slice(&[
            0x06, 0x0A, 0x2B, 0x34, 0x01, 0x01, 0x01, 0x05, 0x01, 0x01, 0x0D, 0x20,
        ]);

        // Byte 12: Length (13h = remaining bytes)
        bytes[12] = 0x13;

        // Bytes 13-15: instance type and material number generation method
        bytes[13] = 0x00;
        bytes[14] = 0x00;
        bytes[15] = 0x00;

        // Bytes 16-31: Material number (UUID)
        let uuid = Uuid::new_v4();
        bytes[16..32].copy_from_slice(uuid.as_bytes());

        Umid(bytes)
    }

    /// Check if this is a zero UMID
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }

    /// Get the UUID portion (bytes 16-31)
    pub fn uuid_portion(&self) -> &[u8] {
        &self.0[16..32]
    }
}

impl fmt::Debug for Umid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UMID(")?;
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 && i % 4 == 0 {
                write!(f, "-")?;
            }
            write!(f, "{:02x}", byte)?;
        }
        write!(f, ")")
    }
}

impl Default for Umid {
    fn default() -> Self {
        Umid::zero()
    }
}

/// Track file timestamp
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MxfTimestamp {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub millisecond: u8,
}

impl MxfTimestamp {
    /// Create new timestamp
    pub fn new(
        year: u16,
        month: u8,
        day: u8,
        hour: u8,
        minute: u8,
        second: u8,
        millisecond: u8,
    ) -> Self {
        MxfTimestamp {
            year,
            month,
            day,
            hour,
            minute,
            second,
            millisecond,
        }
    }

    /// Placeholder modification date (approximation without chrono)
    pub fn now() -> Self {
        MxfTimestamp::new(2024, 1, 1, 0, 0, 0, 0)
    }

    /// Parse from 8-byte wire format
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 8 {
            return None;
        }

        Some(MxfTimestamp {
            year: u16::from_be_bytes([bytes[0], bytes[1]]),
            month: bytes[2],
            day: bytes[3],
            hour: bytes[4],
            minute: bytes[5],
            second: bytes[6],
            millisecond: bytes[7],
        })
    }

    /// Convert to 8-byte wire format
    pub fn to_bytes(&self) -> [u8; 8] {
        let year_bytes = self.year.to_be_bytes();
        [
            year_bytes[0],
            year_bytes[1],
            self.month,
            self.day,
            self.hour,
            self.minute,
            self.second,
            self.millisecond,
        ]
    }
}

impl fmt::Display for MxfTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}.{:03}",
            self.year, self.month, self.day, self.hour, self.minute, self.second, self.millisecond
        )
    }
}

/// Which label registry a track file was written against, detected from
/// the operational pattern in the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LabelSetType {
    /// Standards-track labels
    Smpte,
    /// Legacy interop labels
    Interop,
    /// Not yet determined
    #[default]
    Unknown,
}

/// Identity and crypto signaling carried in (or recovered from) a track
/// file's header metadata.
#[derive(Debug, Clone)]
pub struct WriterInfo {
    /// Company name recorded in the Identification set
    pub company_name: String,
    /// Product name recorded in the Identification set
    pub product_name: String,
    /// Product version string
    pub product_version: String,
    /// Product UUID
    pub product_uuid: [u8; 16],
    /// Asset UUID (material number of the source package UMID)
    pub asset_uuid: [u8; 16],
    /// Label registry the file conforms to
    pub label_set_type: LabelSetType,
    /// Whether essence triplets are encrypted
    pub encrypted_essence: bool,
    /// Cryptographic context ID carried in each encrypted triplet
    pub context_id: [u8; 16],
    /// Whether encrypted triplets carry an integrity pack
    pub uses_hmac: bool,
}

impl Default for WriterInfo {
    fn default() -> Self {
        WriterInfo {
            company_name: "unknown".into(),
            product_name: "unknown".into(),
            product_version: "0.0".into(),
            product_uuid: [0u8; 16],
            asset_uuid: [0u8; 16],
            label_set_type: LabelSetType::Smpte,
            encrypted_essence: false,
            context_id: [0u8; 16],
            uses_hmac: false,
        }
    }
}
