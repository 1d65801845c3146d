use std::sync::Arc;

use image::{DynamicImage, ImageFormat, imageops::FilterType};

use crate::error::{CatalogError, CatalogResult};

/// Side length of the square CLIP input
pub const CLIP_IMAGE_SIZE: u32 = 224;

pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

const ALLOWED_FORMATS: [ImageFormat; 5] = [
    ImageFormat::Jpeg,
    ImageFormat::Png,
    ImageFormat::WebP,
    ImageFormat::Bmp,
    ImageFormat::Gif,
];

/// RGB8 pixels ready for the image encoder
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedImage {
    pub width: u32,
    pub height: u32,
    /// Row-major RGB bytes, `width * height * 3` long
    pub rgb: Vec<u8>,
}

/// Image decoding and CLIP preprocessing.
///
/// Both operations are CPU bound; callers run them on the blocking pool
/// (see [`prepare_image`]).
#[cfg_attr(test, mockall::automock)]
pub trait ImageCodec: Send + Sync {
    /// Validate and decode raw image bytes
    fn decode(&self, bytes: &[u8]) -> CatalogResult<DynamicImage>;

    /// Convert to RGB and resize to the model input size
    fn preprocess(&self, image: DynamicImage) -> PreparedImage;
}

/// [`ImageCodec`] backed by the `image` crate
#[derive(Debug, Clone, Copy, Default)]
pub struct ClipImageCodec;

impl ImageCodec for ClipImageCodec {
    fn decode(&self, bytes: &[u8]) -> CatalogResult<DynamicImage> {
        if bytes.is_empty() {
            return Err(CatalogError::InvalidImage("image payload is empty".to_string()));
        }
        if bytes.len() > MAX_IMAGE_BYTES {
            return Err(CatalogError::InvalidImage(format!(
                "image exceeds {}MB",
                MAX_IMAGE_BYTES / (1024 * 1024)
            )));
        }

        let format = image::guess_format(bytes)
            .map_err(|_| CatalogError::InvalidImage("unrecognized image format".to_string()))?;
        if !ALLOWED_FORMATS.contains(&format) {
            return Err(CatalogError::InvalidImage(format!(
                "unsupported image format {:?}, expected one of BMP, GIF, JPEG, PNG, WEBP",
                format
            )));
        }

        image::load_from_memory_with_format(bytes, format)
            .map_err(|e| CatalogError::InvalidImage(format!("failed to decode image: {}", e)))
    }

    fn preprocess(&self, image: DynamicImage) -> PreparedImage {
        let rgb = image
            .resize_exact(CLIP_IMAGE_SIZE, CLIP_IMAGE_SIZE, FilterType::Lanczos3)
            .to_rgb8();

        PreparedImage {
            width: rgb.width(),
            height: rgb.height(),
            rgb: rgb.into_raw(),
        }
    }
}

/// Decode and preprocess on the blocking pool.
pub async fn prepare_image(codec: Arc<dyn ImageCodec>, bytes: Vec<u8>) -> CatalogResult<PreparedImage> {
    tokio::task::spawn_blocking(move || {
        let decoded = codec.decode(&bytes)?;
        Ok(codec.preprocess(decoded))
    })
    .await?
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};
    use std::io::Cursor;

    fn encoded(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
        let buffer = ImageBuffer::from_fn(width, height, |x, y| Rgb([x as u8, y as u8, 128]));
        let mut bytes = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(buffer)
            .write_to(&mut bytes, format)
            .unwrap();
        bytes.into_inner()
    }

    #[test]
    fn test_preprocess_resizes_to_clip_input() {
        let codec = ClipImageCodec;
        let image = codec.decode(&encoded(64, 32, ImageFormat::Png)).unwrap();
        let prepared = codec.preprocess(image);

        assert_eq!(prepared.width, CLIP_IMAGE_SIZE);
        assert_eq!(prepared.height, CLIP_IMAGE_SIZE);
        assert_eq!(prepared.rgb.len(), (224 * 224 * 3) as usize);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let err = ClipImageCodec.decode(b"definitely not an image").unwrap_err();
        assert!(matches!(err, CatalogError::InvalidImage(_)));
    }

    #[test]
    fn test_decode_rejects_empty_and_oversized() {
        assert!(matches!(
            ClipImageCodec.decode(&[]),
            Err(CatalogError::InvalidImage(_))
        ));
        assert!(matches!(
            ClipImageCodec.decode(&vec![0u8; MAX_IMAGE_BYTES + 1]),
            Err(CatalogError::InvalidImage(_))
        ));
    }

    #[tokio::test]
    async fn test_prepare_image_on_blocking_pool() {
        let codec: Arc<dyn ImageCodec> = Arc::new(ClipImageCodec);
        let prepared = prepare_image(codec, encoded(10, 10, ImageFormat::Bmp)).await.unwrap();
        assert_eq!(prepared.width, CLIP_IMAGE_SIZE);
    }
}
