//! GIF container block reader
//!
//! Walks the block stream of a GIF file without decoding any pixels and
//! exposes the container-level and per-frame metadata blocks used to build a
//! timeline.

use crate::{Error, MetadataBlock, MetadataKey, MetadataValue, Result};
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{self, Read};
use tracing::debug;

const SIGNATURE_87A: &[u8; 6] = b"GIF87a";
const SIGNATURE_89A: &[u8; 6] = b"GIF89a";

const EXTENSION_INTRODUCER: u8 = 0x21;
const IMAGE_SEPARATOR: u8 = 0x2C;
const TRAILER: u8 = 0x3B;

const GRAPHIC_CONTROL_LABEL: u8 = 0xF9;
const APPLICATION_LABEL: u8 = 0xFF;

/// Logical screen descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenDescriptor {
    /// Logical screen width in pixels
    pub width: u16,
    /// Logical screen height in pixels
    pub height: u16,
    /// Whether a global color table follows the descriptor
    pub has_global_color_table: bool,
    /// Background color index into the global color table
    pub background_index: u8,
}

impl ScreenDescriptor {
    fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let width = reader.read_u16::<LittleEndian>()?;
        let height = reader.read_u16::<LittleEndian>()?;
        let packed = reader.read_u8()?;
        let background_index = reader.read_u8()?;
        let _aspect = reader.read_u8()?;

        let has_global_color_table = packed & 0x80 != 0;
        if has_global_color_table {
            skip(reader, color_table_len(packed))?;
        }

        Ok(Self {
            width,
            height,
            has_global_color_table,
            background_index,
        })
    }
}

/// First application extension of the container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationExtension {
    /// Application identifier and authentication code, normally 11 bytes
    pub identifier: Vec<u8>,
    /// Data sub-blocks, each kept with its length prefix
    pub data: Vec<u8>,
}

/// Placement and control data of one image in the block stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameDescriptor {
    pub left: u16,
    pub top: u16,
    pub width: u16,
    pub height: u16,
    /// Whether the image rows are stored in interlaced order
    pub interlaced: bool,
    /// Delay from the preceding graphic control extension, if any
    pub delay: Option<u16>,
    /// Disposal method from the preceding graphic control extension, if any
    pub disposal: Option<u8>,
}

/// Pending graphic control extension, applied to the next image
#[derive(Debug, Clone, Copy)]
struct GraphicControl {
    delay: u16,
    disposal: u8,
}

/// Block-level view of a GIF container
#[derive(Debug, Clone)]
pub struct GifContainer {
    /// Logical screen descriptor
    pub screen: ScreenDescriptor,
    /// First application extension, if any
    pub application: Option<ApplicationExtension>,
    /// Image descriptors in stream order
    pub frames: Vec<FrameDescriptor>,
}

impl GifContainer {
    /// Reads the block structure of a GIF container from a reader
    pub fn read<R: Read>(mut reader: R) -> Result<Self> {
        // Read and validate signature
        let mut signature = [0u8; 6];
        reader.read_exact(&mut signature)?;
        if &signature != SIGNATURE_87A && &signature != SIGNATURE_89A {
            return Err(Error::InvalidSignature);
        }

        let screen = ScreenDescriptor::read(&mut reader)?;

        let mut application = None;
        let mut frames = Vec::new();
        let mut pending_control: Option<GraphicControl> = None;

        loop {
            // A missing trailer is common; end of data between blocks ends the stream
            let introducer = match reader.read_u8() {
                Ok(byte) => byte,
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e.into()),
            };

            match introducer {
                EXTENSION_INTRODUCER => {
                    let label = reader.read_u8()?;
                    match label {
                        GRAPHIC_CONTROL_LABEL => {
                            pending_control = read_graphic_control(&mut reader)?;
                        }
                        APPLICATION_LABEL => {
                            let extension = read_application(&mut reader)?;
                            if application.is_none() {
                                application = Some(extension);
                            }
                        }
                        _ => skip_sub_blocks(&mut reader)?,
                    }
                }
                IMAGE_SEPARATOR => {
                    let control = pending_control.take();
                    frames.push(read_image(&mut reader, control)?);
                }
                TRAILER => break,
                other => {
                    return Err(Error::MalformedBlock(format!(
                        "unknown block introducer 0x{:02X} after {} frames",
                        other,
                        frames.len()
                    )))
                }
            }
        }

        debug!(
            width = screen.width,
            height = screen.height,
            frames = frames.len(),
            has_application = application.is_some(),
            "read GIF container blocks"
        );

        Ok(Self {
            screen,
            application,
            frames,
        })
    }

    /// Returns the number of images in the container
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Builds the container-level metadata block
    pub fn container_metadata(&self) -> MetadataBlock {
        let mut block = MetadataBlock::new();
        if let Some(application) = &self.application {
            block.insert(
                MetadataKey::ApplicationId,
                MetadataValue::Bytes(application.identifier.clone()),
            );
            block.insert(
                MetadataKey::ApplicationData,
                MetadataValue::Bytes(application.data.clone()),
            );
        }
        block
    }

    /// Builds the metadata block of the frame at `index`
    pub fn frame_metadata(&self, index: usize) -> Result<MetadataBlock> {
        let frame = self.frames.get(index).ok_or(Error::FrameIndex(index))?;

        let mut block = MetadataBlock::new()
            .with(MetadataKey::ImageLeft, MetadataValue::U16(frame.left))
            .with(MetadataKey::ImageTop, MetadataValue::U16(frame.top))
            .with(MetadataKey::ImageWidth, MetadataValue::U16(frame.width))
            .with(MetadataKey::ImageHeight, MetadataValue::U16(frame.height));
        if let Some(delay) = frame.delay {
            block.insert(MetadataKey::GraphicControlDelay, MetadataValue::U16(delay));
        }
        if let Some(disposal) = frame.disposal {
            block.insert(MetadataKey::GraphicControlDisposal, MetadataValue::U8(disposal));
        }
        Ok(block)
    }
}

fn read_graphic_control<R: Read>(reader: &mut R) -> Result<Option<GraphicControl>> {
    let size = reader.read_u8()? as usize;
    let mut body = vec![0u8; size];
    reader.read_exact(&mut body)?;
    // Anything beyond the fixed fields is tolerated and skipped
    if size != 0 {
        skip_sub_blocks(reader)?;
    }

    if size < 4 {
        return Ok(None);
    }
    Ok(Some(GraphicControl {
        disposal: (body[0] >> 2) & 0x07,
        delay: u16::from_le_bytes([body[1], body[2]]),
    }))
}

fn read_application<R: Read>(reader: &mut R) -> Result<ApplicationExtension> {
    let size = reader.read_u8()? as usize;
    let mut identifier = vec![0u8; size];
    reader.read_exact(&mut identifier)?;

    let mut data = Vec::new();
    if size != 0 {
        loop {
            let len = reader.read_u8()?;
            if len == 0 {
                break;
            }
            data.push(len);
            let start = data.len();
            data.resize(start + len as usize, 0);
            reader.read_exact(&mut data[start..])?;
        }
    }

    Ok(ApplicationExtension { identifier, data })
}

fn read_image<R: Read>(reader: &mut R, control: Option<GraphicControl>) -> Result<FrameDescriptor> {
    let left = reader.read_u16::<LittleEndian>()?;
    let top = reader.read_u16::<LittleEndian>()?;
    let width = reader.read_u16::<LittleEndian>()?;
    let height = reader.read_u16::<LittleEndian>()?;
    let packed = reader.read_u8()?;

    if packed & 0x80 != 0 {
        skip(reader, color_table_len(packed))?;
    }

    // LZW minimum code size, then the compressed data sub-blocks
    let _min_code_size = reader.read_u8()?;
    skip_sub_blocks(reader)?;

    Ok(FrameDescriptor {
        left,
        top,
        width,
        height,
        interlaced: packed & 0x40 != 0,
        delay: control.map(|c| c.delay),
        disposal: control.map(|c| c.disposal),
    })
}

/// Size in bytes of the color table announced by a packed field
fn color_table_len(packed: u8) -> u64 {
    3 * (1u64 << ((packed & 0x07) + 1))
}

fn skip_sub_blocks<R: Read>(reader: &mut R) -> Result<()> {
    loop {
        let len = reader.read_u8()?;
        if len == 0 {
            return Ok(());
        }
        skip(reader, len as u64)?;
    }
}

fn skip<R: Read>(reader: &mut R, len: u64) -> Result<()> {
    let copied = io::copy(&mut reader.by_ref().take(len), &mut io::sink())?;
    if copied != len {
        return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ErrorKind, LoopControl};
    use byteorder::WriteBytesExt;
    use std::io::{Cursor, Write};

    /// Assembles a GIF block stream with 1x1-byte dummy image data
    struct GifBytes {
        buf: Vec<u8>,
    }

    impl GifBytes {
        fn new(width: u16, height: u16, global_table: bool) -> Self {
            let mut buf = Vec::new();
            buf.write_all(b"GIF89a").unwrap();
            buf.write_u16::<LittleEndian>(width).unwrap();
            buf.write_u16::<LittleEndian>(height).unwrap();
            buf.write_u8(if global_table { 0x80 } else { 0 }).unwrap();
            buf.write_u8(0).unwrap();
            buf.write_u8(0).unwrap();
            if global_table {
                // 2 entries
                buf.write_all(&[0; 6]).unwrap();
            }
            Self { buf }
        }

        fn application(mut self, id: &[u8], sub_blocks: &[&[u8]]) -> Self {
            self.buf.write_all(&[0x21, 0xFF, id.len() as u8]).unwrap();
            self.buf.write_all(id).unwrap();
            for block in sub_blocks {
                self.buf.write_u8(block.len() as u8).unwrap();
                self.buf.write_all(block).unwrap();
            }
            self.buf.write_u8(0).unwrap();
            self
        }

        fn comment(mut self, text: &[u8]) -> Self {
            self.buf.write_all(&[0x21, 0xFE, text.len() as u8]).unwrap();
            self.buf.write_all(text).unwrap();
            self.buf.write_u8(0).unwrap();
            self
        }

        fn control(mut self, delay: u16, disposal: u8) -> Self {
            self.buf.write_all(&[0x21, 0xF9, 4, disposal << 2]).unwrap();
            self.buf.write_u16::<LittleEndian>(delay).unwrap();
            self.buf.write_all(&[0, 0]).unwrap();
            self
        }

        fn image(mut self, left: u16, top: u16, width: u16, height: u16, local_table: bool) -> Self {
            self.buf.write_u8(0x2C).unwrap();
            for value in [left, top, width, height] {
                self.buf.write_u16::<LittleEndian>(value).unwrap();
            }
            self.buf.write_u8(if local_table { 0x81 } else { 0 }).unwrap();
            if local_table {
                // 4 entries
                self.buf.write_all(&[0; 12]).unwrap();
            }
            self.buf.write_all(&[2, 2, 0x4C, 0x01, 0]).unwrap();
            self
        }

        fn background(mut self, index: u8) -> Self {
            self.buf[11] = index;
            self
        }

        /// Sets the interlace flag of the last image, which must have no local table
        fn interlaced(mut self) -> Self {
            let at = self.buf.len() - 6;
            self.buf[at] |= 0x40;
            self
        }

        fn trailer(mut self) -> Vec<u8> {
            self.buf.write_u8(0x3B).unwrap();
            self.buf
        }
    }

    #[test]
    fn test_reads_blocks() {
        let bytes = GifBytes::new(10, 8, true)
            .application(b"NETSCAPE2.0", &[&[1, 0, 0]])
            .comment(b"hello")
            .control(7, 1)
            .image(0, 0, 10, 8, false)
            .image(2, 3, 4, 4, true)
            .control(0, 2)
            .image(1, 1, 2, 2, false)
            .trailer();

        let container = GifContainer::read(Cursor::new(bytes)).unwrap();
        assert_eq!(container.screen.width, 10);
        assert_eq!(container.screen.height, 8);
        assert_eq!(container.frame_count(), 3);

        let application = container.application.as_ref().unwrap();
        assert_eq!(application.identifier, b"NETSCAPE2.0");
        assert_eq!(application.data, vec![3, 1, 0, 0]);

        assert_eq!(container.frames[0].delay, Some(7));
        assert_eq!(container.frames[0].disposal, Some(1));
        // Control extensions only apply to the next image
        assert_eq!(container.frames[1].delay, None);
        assert_eq!((container.frames[1].left, container.frames[1].top), (2, 3));
        assert_eq!(container.frames[2].delay, Some(0));
        assert_eq!(container.frames[2].disposal, Some(2));
    }

    #[test]
    fn test_reads_screen_and_image_flags() {
        let bytes = GifBytes::new(4, 4, true)
            .background(1)
            .image(0, 0, 4, 4, false)
            .image(0, 0, 2, 2, false)
            .interlaced()
            .trailer();
        let container = GifContainer::read(Cursor::new(bytes)).unwrap();

        assert!(container.screen.has_global_color_table);
        assert_eq!(container.screen.background_index, 1);
        assert!(!container.frames[0].interlaced);
        assert!(container.frames[1].interlaced);
        assert_eq!((container.frames[1].width, container.frames[1].height), (2, 2));

        let bytes = GifBytes::new(4, 4, false).image(0, 0, 4, 4, false).trailer();
        let container = GifContainer::read(Cursor::new(bytes)).unwrap();
        assert!(!container.screen.has_global_color_table);
    }

    #[test]
    fn test_metadata_blocks_feed_parser() {
        let bytes = GifBytes::new(4, 4, false)
            .application(b"NETSCAPE2.0", &[&[1, 5, 0]])
            .image(0, 0, 4, 4, false)
            .control(12, 0)
            .image(1, 2, 2, 2, false)
            .trailer();
        let container = GifContainer::read(Cursor::new(bytes)).unwrap();

        let control = LoopControl::parse(&container.container_metadata()).unwrap();
        assert!(control.is_animated);
        assert_eq!(control.loop_count, 5);

        let first = container.frame_metadata(0).unwrap();
        assert_eq!(crate::metadata::parse_frame_delay(&first).unwrap(), 10);

        let second = container.frame_metadata(1).unwrap();
        assert_eq!(crate::metadata::parse_frame_delay(&second).unwrap(), 12);
        assert_eq!(
            crate::metadata::parse_frame_offset(&second, 1).unwrap(),
            (1, 2)
        );

        assert!(matches!(
            container.frame_metadata(2),
            Err(Error::FrameIndex(2))
        ));
    }

    #[test]
    fn test_only_first_application_block_kept() {
        let bytes = GifBytes::new(1, 1, false)
            .application(b"XMP DataXMP", &[b"<x/>"])
            .application(b"NETSCAPE2.0", &[&[1, 0, 0]])
            .image(0, 0, 1, 1, false)
            .trailer();
        let container = GifContainer::read(Cursor::new(bytes)).unwrap();
        let control = LoopControl::parse(&container.container_metadata()).unwrap();
        assert!(!control.is_animated);
    }

    #[test]
    fn test_missing_trailer_tolerated() {
        let mut bytes = GifBytes::new(1, 1, false)
            .image(0, 0, 1, 1, false)
            .trailer();
        bytes.pop();
        let container = GifContainer::read(Cursor::new(bytes)).unwrap();
        assert_eq!(container.frame_count(), 1);
        assert!(container.container_metadata().is_empty());
    }

    #[test]
    fn test_invalid_signature() {
        let err = GifContainer::read(Cursor::new(b"PNG89a\0\0\0\0\0\0\0".to_vec())).unwrap_err();
        assert!(matches!(err, Error::InvalidSignature));
        assert_eq!(err.kind(), ErrorKind::Format);
    }

    #[test]
    fn test_truncated_image_is_decode_error() {
        let mut bytes = GifBytes::new(1, 1, false)
            .image(0, 0, 1, 1, false)
            .trailer();
        bytes.truncate(bytes.len() - 4);
        let err = GifContainer::read(Cursor::new(bytes)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
    }

    #[test]
    fn test_unknown_introducer() {
        let mut bytes = GifBytes::new(1, 1, false).image(0, 0, 1, 1, false).buf;
        bytes.push(0x42);
        let err = GifContainer::read(Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, Error::MalformedBlock(_)));
    }
}
