//! Animation metadata: typed key/value blocks and the rules that turn them
//! into loop intent, frame delays and frame offsets.

use crate::{Error, Result};
use std::collections::HashMap;
use std::fmt;

/// Identifier an application extension must carry to be read as a loop block
pub const NETSCAPE_APPLICATION_ID: &[u8; 11] = b"NETSCAPE2.0";

/// Delay used when a frame carries no graphic control delay, in hundredths of a second
pub const DEFAULT_FRAME_DELAY: u16 = 10;

/// Metadata entries the playback engine queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetadataKey {
    /// Application extension identifier (8 byte name + 3 byte auth code)
    ApplicationId,
    /// Application extension data sub-blocks, each with its length prefix
    ApplicationData,
    /// Graphic control extension delay, hundredths of a second
    GraphicControlDelay,
    /// Graphic control extension disposal method
    GraphicControlDisposal,
    /// Image descriptor left position
    ImageLeft,
    /// Image descriptor top position
    ImageTop,
    /// Image descriptor width
    ImageWidth,
    /// Image descriptor height
    ImageHeight,
}

impl MetadataKey {
    /// Returns the query path of this key
    pub fn path(&self) -> &'static str {
        match self {
            MetadataKey::ApplicationId => "/appext/Application",
            MetadataKey::ApplicationData => "/appext/Data",
            MetadataKey::GraphicControlDelay => "/grctlext/Delay",
            MetadataKey::GraphicControlDisposal => "/grctlext/Disposal",
            MetadataKey::ImageLeft => "/imgdesc/Left",
            MetadataKey::ImageTop => "/imgdesc/Top",
            MetadataKey::ImageWidth => "/imgdesc/Width",
            MetadataKey::ImageHeight => "/imgdesc/Height",
        }
    }
}

impl fmt::Display for MetadataKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// A typed metadata value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataValue {
    Bytes(Vec<u8>),
    U8(u8),
    U16(u16),
}

impl MetadataValue {
    /// Returns the value as a byte vector, failing on any other type
    pub fn as_bytes(&self, key: MetadataKey) -> Result<&[u8]> {
        match self {
            MetadataValue::Bytes(bytes) => Ok(bytes),
            _ => Err(Error::MetadataType {
                key,
                expected: "byte vector",
            }),
        }
    }

    /// Returns the value as an unsigned 16-bit integer, widening `U8`
    pub fn as_u16(&self, key: MetadataKey) -> Result<u16> {
        match self {
            MetadataValue::U16(value) => Ok(*value),
            MetadataValue::U8(value) => Ok(*value as u16),
            MetadataValue::Bytes(_) => Err(Error::MetadataType {
                key,
                expected: "unsigned integer",
            }),
        }
    }
}

/// Read access to one metadata block (container level or per frame)
///
/// `Ok(None)` means the entry is absent, which is never an error by itself.
/// `Err` means the lookup itself failed.
pub trait MetadataReader {
    fn lookup(&self, key: MetadataKey) -> Result<Option<MetadataValue>>;
}

/// In-memory metadata block
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataBlock {
    entries: HashMap<MetadataKey, MetadataValue>,
}

impl MetadataBlock {
    /// Creates an empty block
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets an entry, replacing any previous value
    pub fn insert(&mut self, key: MetadataKey, value: MetadataValue) {
        self.entries.insert(key, value);
    }

    /// Builder-style [`insert`](Self::insert)
    pub fn with(mut self, key: MetadataKey, value: MetadataValue) -> Self {
        self.insert(key, value);
        self
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the block has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl MetadataReader for MetadataBlock {
    fn lookup(&self, key: MetadataKey) -> Result<Option<MetadataValue>> {
        Ok(self.entries.get(&key).cloned())
    }
}

/// Loop intent recovered from the container-level application extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoopControl {
    /// Whether the container asks for looping playback
    pub is_animated: bool,
    /// Repeat count, 0 meaning forever when `is_animated` is set
    pub loop_count: u16,
}

impl LoopControl {
    /// Reads the loop control from a container-level metadata block
    ///
    /// An absent or unrecognised application block yields a non-animated
    /// result. Only failed lookups are errors.
    pub fn parse(reader: &impl MetadataReader) -> Result<Self> {
        let mut control = LoopControl::default();

        let id = match reader.lookup(MetadataKey::ApplicationId)? {
            Some(value) => value,
            None => return Ok(control),
        };
        let id = match id.as_bytes(MetadataKey::ApplicationId) {
            Ok(bytes) => bytes,
            // A non-byte identifier cannot be a loop block
            Err(_) => return Ok(control),
        };
        if id != NETSCAPE_APPLICATION_ID {
            return Ok(control);
        }

        let data = match reader.lookup(MetadataKey::ApplicationData)? {
            Some(value) => value,
            None => return Ok(control),
        };
        let data = match data.as_bytes(MetadataKey::ApplicationData) {
            Ok(bytes) => bytes,
            Err(_) => return Ok(control),
        };
        // [block size, flag, loop low, loop high]
        let [block_size, flag, low, high] = match data {
            &[a, b, c, d] => [a, b, c, d],
            _ => return Ok(control),
        };

        if block_size >= 1 {
            control.is_animated = flag != 0;
        }
        if block_size == 3 {
            control.loop_count = u16::from_le_bytes([low, high]);
        }

        Ok(control)
    }
}

/// Reads a frame's delay, falling back to [`DEFAULT_FRAME_DELAY`] when absent
pub fn parse_frame_delay(reader: &impl MetadataReader) -> Result<u16> {
    match reader.lookup(MetadataKey::GraphicControlDelay)? {
        Some(value) => value.as_u16(MetadataKey::GraphicControlDelay),
        None => Ok(DEFAULT_FRAME_DELAY),
    }
}

/// Reads a frame's placement offset
///
/// The first frame is always placed at the origin. Later frames must carry
/// both image descriptor positions.
pub fn parse_frame_offset(reader: &impl MetadataReader, frame: usize) -> Result<(u32, u32)> {
    if frame == 0 {
        return Ok((0, 0));
    }
    let read = |key: MetadataKey| -> Result<u32> {
        reader
            .lookup(key)?
            .ok_or(Error::MetadataMissing { key, frame })?
            .as_u16(key)
            .map(u32::from)
    };
    Ok((read(MetadataKey::ImageLeft)?, read(MetadataKey::ImageTop)?))
}
