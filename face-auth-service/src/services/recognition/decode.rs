use base64::{
    engine::general_purpose::{STANDARD, STANDARD_NO_PAD},
    Engine as _,
};
use image::{DynamicImage, GrayImage, ImageReader, Limits, RgbImage};
use std::io::Cursor;

use super::RecognitionError;

/// Largest accepted image side, in pixels.
const MAX_IMAGE_SIDE: u32 = 8192;

/// An 8-bit RGB frame, row-major and channel-interleaved.
#[derive(Debug, Clone)]
pub struct FaceImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl FaceImage {
    pub fn from_rgb(img: RgbImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            width,
            height,
            pixels: img.into_raw(),
        }
    }

    /// Gray frames are stored with equal channels.
    pub fn from_luma(img: GrayImage) -> Self {
        Self::from_rgb(DynamicImage::ImageLuma8(img).to_rgb8())
    }

    pub fn to_rgb(&self) -> Option<RgbImage> {
        RgbImage::from_raw(self.width, self.height, self.pixels.clone())
    }

    pub fn to_luma(&self) -> Option<GrayImage> {
        self.to_rgb().map(|rgb| DynamicImage::ImageRgb8(rgb).to_luma8())
    }
}

/// Decode a base64 image payload (plain or `data:` URL) into an RGB frame.
pub fn decode_image(payload: &str) -> Result<FaceImage, RecognitionError> {
    let data = strip_data_url(payload)?;
    let cleaned: String = data.chars().filter(|c| !c.is_whitespace()).collect();
    if cleaned.is_empty() {
        return Err(RecognitionError::InvalidImage("image is empty".to_string()));
    }

    let bytes = STANDARD
        .decode(&cleaned)
        .or_else(|_| STANDARD_NO_PAD.decode(cleaned.trim_end_matches('=')))
        .map_err(|e| RecognitionError::InvalidImage(format!("image is not valid base64: {}", e)))?;

    let mut limits = Limits::default();
    limits.max_image_width = Some(MAX_IMAGE_SIDE);
    limits.max_image_height = Some(MAX_IMAGE_SIDE);

    let mut reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| RecognitionError::InvalidImage(format!("unreadable image: {}", e)))?;
    reader.limits(limits);

    let img = reader
        .decode()
        .map_err(|e| RecognitionError::InvalidImage(format!("unsupported or corrupt image: {}", e)))?;

    if img.width() == 0 || img.height() == 0 {
        return Err(RecognitionError::InvalidImage("image has no pixels".to_string()));
    }

    Ok(FaceImage::from_rgb(img.to_rgb8()))
}

fn strip_data_url(payload: &str) -> Result<&str, RecognitionError> {
    let payload = payload.trim();
    let Some(rest) = payload.strip_prefix("data:") else {
        return Ok(payload);
    };

    match rest.split_once(',') {
        Some((meta, data)) if meta.ends_with(";base64") => Ok(data),
        Some(_) => Err(RecognitionError::InvalidImage(
            "data URL must be base64 encoded".to_string(),
        )),
        None => Err(RecognitionError::InvalidImage("malformed data URL".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Luma, Rgb};

    fn encode_png(img: impl Into<DynamicImage>) -> String {
        let mut buf = Cursor::new(Vec::new());
        img.into()
            .write_to(&mut buf, ImageFormat::Png)
            .unwrap();
        STANDARD.encode(buf.into_inner())
    }

    fn gradient(width: u32, height: u32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, _| Luma([(x * 4) as u8]))
    }

    #[test]
    fn decodes_plain_base64_png() {
        let decoded = decode_image(&encode_png(gradient(32, 16))).unwrap();
        assert_eq!((decoded.width, decoded.height), (32, 16));
        assert_eq!(decoded.pixels.len(), 32 * 16 * 3);
        assert_eq!(decoded.to_luma().unwrap().get_pixel(3, 0).0[0], 12);
    }

    #[test]
    fn keeps_colour_channels() {
        let img = RgbImage::from_pixel(4, 4, Rgb([200, 40, 10]));
        let decoded = decode_image(&encode_png(img)).unwrap();
        assert_eq!(&decoded.pixels[..3], &[200, 40, 10]);
    }

    #[test]
    fn decodes_data_url_with_line_breaks() {
        let b64 = encode_png(gradient(8, 8));
        let (head, tail) = b64.split_at(b64.len() / 2);
        let payload = format!("data:image/png;base64,{}\n{}", head, tail);
        let decoded = decode_image(&payload).unwrap();
        assert_eq!((decoded.width, decoded.height), (8, 8));
    }

    #[test]
    fn rejects_invalid_base64() {
        let err = decode_image("not base64 at all!!").unwrap_err();
        assert!(matches!(err, RecognitionError::InvalidImage(_)));
    }

    #[test]
    fn rejects_bytes_that_are_not_an_image() {
        let err = decode_image(&STANDARD.encode(b"hello, world")).unwrap_err();
        assert!(matches!(err, RecognitionError::InvalidImage(_)));
    }

    #[test]
    fn rejects_non_base64_data_url() {
        let err = decode_image("data:image/png,rawbytes").unwrap_err();
        assert!(err.to_string().contains("base64"));
    }

    #[test]
    fn rejects_empty_payload() {
        assert!(decode_image("   ").is_err());
        assert!(decode_image("data:image/png;base64,").is_err());
    }

    #[test]
    fn gray_frames_keep_their_values() {
        let frame = FaceImage::from_luma(gradient(4, 2));
        assert_eq!(frame.pixels.len(), 4 * 2 * 3);
        let back = frame.to_luma().unwrap();
        assert_eq!(back.dimensions(), (4, 2));
        assert_eq!(back.get_pixel(3, 0).0[0], 12);
    }
}
