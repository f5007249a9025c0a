//! GIF codec: block metadata from the container reader, pixels from the `gif` crate

use gifsource_core::{Codec, DecodedFrame, Error, GifContainer, MetadataBlock, Result};
use std::io::Cursor;
use std::sync::Arc;
use tracing::debug;

type FrameDecoder = gif::Decoder<Cursor<Arc<[u8]>>>;

/// [`Codec`] over an in-memory GIF
///
/// Frames are decoded sequentially; asking for an earlier frame than the
/// last one decoded rewinds the pixel decoder.
pub struct GifCodec {
    data: Arc<[u8]>,
    container: GifContainer,
    decoder: FrameDecoder,
    next_index: usize,
}

impl GifCodec {
    /// Opens a GIF held in memory
    pub fn new(data: impl Into<Arc<[u8]>>) -> Result<Self> {
        let data = data.into();
        let container = GifContainer::read(Cursor::new(&data[..]))?;
        let decoder = open_decoder(&data)?;
        Ok(Self {
            data,
            container,
            decoder,
            next_index: 0,
        })
    }

    /// Gets the block-level view of the container
    pub fn container(&self) -> &GifContainer {
        &self.container
    }

    fn rewind(&mut self) -> Result<()> {
        debug!("rewinding GIF pixel decoder");
        self.decoder = open_decoder(&self.data)?;
        self.next_index = 0;
        Ok(())
    }
}

impl Codec for GifCodec {
    type Metadata = MetadataBlock;

    fn frame_count(&mut self) -> Result<usize> {
        Ok(self.container.frame_count())
    }

    fn decode_frame(&mut self, index: usize) -> Result<DecodedFrame> {
        if index >= self.container.frame_count() {
            return Err(Error::FrameIndex(index));
        }
        if index < self.next_index {
            self.rewind()?;
        }

        loop {
            let current = self.next_index;
            let frame = self
                .decoder
                .read_next_frame()
                .map_err(|e| Error::Decode(format!("frame {}: {}", current, e)))?
                .ok_or_else(|| Error::Decode(format!("frame {} missing from image data", current)))?;
            self.next_index += 1;

            if current == index {
                return Ok(DecodedFrame {
                    width: frame.width as u32,
                    height: frame.height as u32,
                    pixels: frame.buffer.to_vec(),
                });
            }
        }
    }

    fn container_metadata(&mut self) -> Result<MetadataBlock> {
        Ok(self.container.container_metadata())
    }

    fn frame_metadata(&mut self, index: usize) -> Result<MetadataBlock> {
        self.container.frame_metadata(index)
    }
}

fn open_decoder(data: &Arc<[u8]>) -> Result<FrameDecoder> {
    let mut options = gif::DecodeOptions::new();
    options.set_color_output(gif::ColorOutput::RGBA);
    options
        .read_info(Cursor::new(Arc::clone(data)))
        .map_err(|e| Error::Decode(e.to_string()))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use gifsource_core::{LoopControl, MetadataKey, MetadataReader, MetadataValue};

    /// One frame of a synthetic GIF: size, placement, delay and a fill color
    pub(crate) struct TestFrame {
        pub width: u16,
        pub height: u16,
        pub left: u16,
        pub top: u16,
        pub delay: u16,
        pub rgba: [u8; 4],
    }

    impl TestFrame {
        pub fn new(width: u16, height: u16, left: u16, top: u16, delay: u16, rgba: [u8; 4]) -> Self {
            Self {
                width,
                height,
                left,
                top,
                delay,
                rgba,
            }
        }
    }

    /// Encodes solid-color frames into a GIF with the `gif` crate
    pub(crate) fn encode_gif(
        width: u16,
        height: u16,
        repeat: Option<gif::Repeat>,
        frames: &[TestFrame],
    ) -> Vec<u8> {
        let mut bytes = Vec::new();
        {
            let mut encoder = gif::Encoder::new(&mut bytes, width, height, &[]).unwrap();
            if let Some(repeat) = repeat {
                encoder.set_repeat(repeat).unwrap();
            }
            for test_frame in frames {
                let mut pixels: Vec<u8> = test_frame
                    .rgba
                    .iter()
                    .copied()
                    .cycle()
                    .take(test_frame.width as usize * test_frame.height as usize * 4)
                    .collect();
                let mut frame =
                    gif::Frame::from_rgba_speed(test_frame.width, test_frame.height, &mut pixels, 10);
                frame.left = test_frame.left;
                frame.top = test_frame.top;
                frame.delay = test_frame.delay;
                encoder.write_frame(&frame).unwrap();
            }
        }
        bytes
    }

    /// Overwrites the LZW minimum code size of `frame` with an invalid value
    ///
    /// The block layout stays intact, so the container still parses and only
    /// the pixel decode of that frame fails.
    pub(crate) fn corrupt_frame_data(bytes: &mut [u8], frame: usize) {
        fn skip_color_table(pos: usize, flags: u8) -> usize {
            if flags & 0x80 != 0 {
                pos + 3 * (1 << ((flags & 0x07) + 1))
            } else {
                pos
            }
        }
        fn skip_sub_blocks(bytes: &[u8], mut pos: usize) -> usize {
            while bytes[pos] != 0 {
                pos += bytes[pos] as usize + 1;
            }
            pos + 1
        }

        let mut pos = skip_color_table(13, bytes[10]);
        let mut seen = 0;
        loop {
            match bytes[pos] {
                0x21 => pos = skip_sub_blocks(bytes, pos + 2),
                0x2C => {
                    pos = skip_color_table(pos + 10, bytes[pos + 9]);
                    if seen == frame {
                        bytes[pos] = 12;
                        return;
                    }
                    seen += 1;
                    pos = skip_sub_blocks(bytes, pos + 1);
                }
                other => panic!("unexpected block 0x{:02X} before frame {}", other, frame),
            }
        }
    }

    fn three_frames() -> Vec<u8> {
        encode_gif(
            4,
            4,
            Some(gif::Repeat::Infinite),
            &[
                TestFrame::new(4, 4, 0, 0, 5, [255, 0, 0, 255]),
                TestFrame::new(2, 2, 1, 1, 20, [0, 255, 0, 255]),
                TestFrame::new(1, 3, 3, 0, 7, [0, 0, 255, 255]),
            ],
        )
    }

    #[test]
    fn test_frame_count_and_metadata() {
        let mut codec = GifCodec::new(three_frames()).unwrap();
        assert_eq!(codec.frame_count().unwrap(), 3);

        let control = LoopControl::parse(&codec.container_metadata().unwrap()).unwrap();
        assert!(control.is_animated);
        assert_eq!(control.loop_count, 0);

        let metadata = codec.frame_metadata(2).unwrap();
        assert_eq!(
            metadata.lookup(MetadataKey::ImageLeft).unwrap(),
            Some(MetadataValue::U16(3))
        );
        assert_eq!(
            metadata.lookup(MetadataKey::GraphicControlDelay).unwrap(),
            Some(MetadataValue::U16(7))
        );
    }

    #[test]
    fn test_decodes_frames_at_their_own_size() {
        let mut codec = GifCodec::new(three_frames()).unwrap();

        let first = codec.decode_frame(0).unwrap();
        assert_eq!((first.width, first.height), (4, 4));
        assert_eq!(&first.pixels[..4], &[255, 0, 0, 255]);

        let third = codec.decode_frame(2).unwrap();
        assert_eq!((third.width, third.height), (1, 3));
        assert_eq!(third.pixels.len(), 12);
        assert_eq!(&third.pixels[..4], &[0, 0, 255, 255]);
    }

    #[test]
    fn test_rewinds_for_earlier_frames() {
        let mut codec = GifCodec::new(three_frames()).unwrap();
        let second = codec.decode_frame(1).unwrap();
        codec.decode_frame(2).unwrap();
        assert_eq!(codec.decode_frame(1).unwrap(), second);
    }

    #[test]
    fn test_frame_index_out_of_range() {
        let mut codec = GifCodec::new(three_frames()).unwrap();
        assert!(matches!(codec.decode_frame(3), Err(Error::FrameIndex(3))));
    }

    #[test]
    fn test_finite_repeat() {
        let bytes = encode_gif(
            1,
            1,
            Some(gif::Repeat::Finite(300)),
            &[TestFrame::new(1, 1, 0, 0, 10, [1, 2, 3, 255])],
        );
        let mut codec = GifCodec::new(bytes).unwrap();
        let control = LoopControl::parse(&codec.container_metadata().unwrap()).unwrap();
        assert!(control.is_animated);
        assert_eq!(control.loop_count, 300);
    }

    #[test]
    fn test_corrupt_frame_fails_only_that_frame() {
        let mut bytes = three_frames();
        corrupt_frame_data(&mut bytes, 1);
        let mut codec = GifCodec::new(bytes).unwrap();
        assert_eq!(codec.frame_count().unwrap(), 3);

        codec.decode_frame(0).unwrap();
        assert!(matches!(codec.decode_frame(1), Err(Error::Decode(_))));
    }

    #[test]
    fn test_not_a_gif() {
        assert!(GifCodec::new(b"definitely not a gif".to_vec()).is_err());
    }
}
