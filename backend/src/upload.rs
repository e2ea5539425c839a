use actix_multipart::{Field, Multipart, MultipartError};
use futures::{StreamExt, TryStreamExt};
use image::{ImageReader, Limits, RgbImage};
use sha2::{Digest, Sha256};
use std::io::Cursor;

const ALLOWED_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/jpg"];

/// Largest accepted side in pixels.
pub const MAX_DIMENSION: u32 = 4096;
const MAX_DECODE_ALLOC: u64 = 128 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("Invalid file type. Please upload a JPEG or PNG image.")]
    NotAnImage,
    #[error("No image file in request")]
    Missing,
    #[error("File too large: {size} bytes (limit {limit})")]
    TooLarge { size: usize, limit: usize },
    #[error("Uploaded file is empty")]
    Empty,
    #[error("Could not decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("Upload stream error: {0}")]
    Stream(#[from] MultipartError),
}

/// Raw upload as received; decoded once validated.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub file_name: Option<String>,
}

impl UploadedImage {
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.bytes);
        hex::encode(hasher.finalize())
    }

    pub fn validate(&self, limit: usize) -> Result<(), UploadError> {
        if !ALLOWED_TYPES.contains(&self.mime_type.as_str()) {
            return Err(UploadError::NotAnImage);
        }
        if self.bytes.is_empty() {
            return Err(UploadError::Empty);
        }
        if self.bytes.len() > limit {
            return Err(UploadError::TooLarge {
                size: self.bytes.len(),
                limit,
            });
        }
        Ok(())
    }

    pub fn decode(&self) -> Result<RgbImage, UploadError> {
        Ok(decode_image(&self.bytes)?)
    }
}

/// Decodes with dimension and allocation limits so a small compressed
/// file cannot expand into an oversized pixel buffer.
pub fn decode_image(bytes: &[u8]) -> Result<RgbImage, image::ImageError> {
    let mut limits = Limits::default();
    limits.max_image_width = Some(MAX_DIMENSION);
    limits.max_image_height = Some(MAX_DIMENSION);
    limits.max_alloc = Some(MAX_DECODE_ALLOC);

    let mut reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
    reader.limits(limits);
    Ok(reader.decode()?.to_rgb8())
}

fn is_image_field(field: &Field) -> bool {
    field.name() == Some("file")
        || field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .is_some()
}

/// Reads the `file` field (or the first field carrying a filename).
/// Stops reading once `limit` is exceeded.
pub async fn read_image_field(payload: &mut Multipart, limit: usize) -> Result<UploadedImage, UploadError> {
    while let Some(mut field) = payload.try_next().await? {
        if !is_image_field(&field) {
            continue;
        }

        let mime_type = field
            .content_type()
            .map(|m| m.essence_str().to_string())
            .unwrap_or_default();
        if !ALLOWED_TYPES.contains(&mime_type.as_str()) {
            return Err(UploadError::NotAnImage);
        }
        let file_name = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .map(str::to_string);

        let mut bytes = Vec::new();
        while let Some(chunk) = field.next().await {
            let data = chunk?;
            if bytes.len() + data.len() > limit {
                return Err(UploadError::TooLarge {
                    size: bytes.len() + data.len(),
                    limit,
                });
            }
            bytes.extend_from_slice(&data);
        }

        let upload = UploadedImage {
            bytes,
            mime_type,
            file_name,
        };
        upload.validate(limit)?;
        return Ok(upload);
    }
    Err(UploadError::Missing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb};

    fn png_bytes() -> Vec<u8> {
        encode_png(8, 8)
    }

    fn encode_png(width: u32, height: u32) -> Vec<u8> {
        let image = RgbImage::from_pixel(width, height, Rgb([200, 100, 50]));
        let mut out = Cursor::new(Vec::new());
        image.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    fn upload(mime: &str, bytes: Vec<u8>) -> UploadedImage {
        UploadedImage {
            bytes,
            mime_type: mime.to_string(),
            file_name: Some("mouth.png".to_string()),
        }
    }

    #[test]
    fn rejects_non_image_types() {
        assert!(matches!(
            upload("application/pdf", png_bytes()).validate(1 << 20),
            Err(UploadError::NotAnImage)
        ));
        assert!(matches!(
            upload("image/gif", png_bytes()).validate(1 << 20),
            Err(UploadError::NotAnImage)
        ));
    }

    #[test]
    fn enforces_size_limit() {
        assert!(matches!(
            upload("image/png", vec![0; 100]).validate(10),
            Err(UploadError::TooLarge { size: 100, limit: 10 })
        ));
        assert!(matches!(upload("image/png", Vec::new()).validate(10), Err(UploadError::Empty)));
    }

    #[test]
    fn decodes_png() {
        let image = upload("image/png", png_bytes()).decode().unwrap();
        assert_eq!(image.dimensions(), (8, 8));
        assert_eq!(image.get_pixel(3, 3), &Rgb([200, 100, 50]));
    }

    #[test]
    fn garbage_fails_to_decode() {
        assert!(matches!(
            upload("image/png", b"not a png".to_vec()).decode(),
            Err(UploadError::Decode(_))
        ));
    }

    #[test]
    fn oversized_dimensions_are_refused() {
        let wide = encode_png(MAX_DIMENSION + 1, 1);
        let err = upload("image/png", wide).decode().unwrap_err();
        match err {
            UploadError::Decode(image::ImageError::Limits(_)) => {}
            other => panic!("expected a limits error, got {other:?}"),
        }

        let edge = decode_image(&encode_png(MAX_DIMENSION, 1)).unwrap();
        assert_eq!(edge.dimensions(), (MAX_DIMENSION, 1));
    }

    #[test]
    fn digest_is_sha256_hex() {
        let a = upload("image/jpeg", b"abc".to_vec());
        assert_eq!(
            a.digest(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
