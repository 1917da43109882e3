use crate::error::PlatformError;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;

const RGB24_BYTES_PER_PIXEL: usize = 3;

/// One RGB24 frame grabbed from a video track
#[derive(Debug, Clone)]
pub struct FrameData {
    /// Packed RGB bytes, row-major
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl FrameData {
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            data,
            width,
            height,
        }
    }

    pub fn expected_size(&self) -> usize {
        self.width as usize * self.height as usize * RGB24_BYTES_PER_PIXEL
    }

    /// Buffer length matches the frame dimensions
    pub fn validate_size(&self) -> bool {
        self.data.len() == self.expected_size()
    }
}

/// Draws a frame onto an off-screen canvas and exports it as a JPEG snapshot
pub struct SnapshotCanvas {
    quality: u8,
}

impl SnapshotCanvas {
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }

    /// Encode the frame as JPEG bytes
    pub fn to_jpeg(&self, frame: &FrameData) -> Result<Vec<u8>, PlatformError> {
        if !frame.validate_size() {
            return Err(PlatformError::new(
                "EncodingError",
                format!(
                    "Frame data size {} does not match {}x{} RGB24",
                    frame.data.len(),
                    frame.width,
                    frame.height
                ),
            ));
        }

        let img = RgbImage::from_raw(frame.width, frame.height, frame.data.clone())
            .ok_or_else(|| PlatformError::new("EncodingError", "RGB buffer does not fit frame dimensions"))?;

        let mut buf = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut buf, self.quality);
        encoder
            .encode_image(&img)
            .map_err(|e| PlatformError::new("EncodingError", format!("JPEG encoding failed: {}", e)))?;

        Ok(buf)
    }

    /// Export the frame as a `data:image/jpeg;base64,...` URL
    pub fn to_data_url(&self, frame: &FrameData) -> Result<String, PlatformError> {
        let jpeg = self.to_jpeg(frame)?;
        Ok(format!("data:image/jpeg;base64,{}", BASE64.encode(jpeg)))
    }
}

impl Default for SnapshotCanvas {
    fn default() -> Self {
        Self::new(90)
    }
}
