//! Decoding uploaded bytes into RGB images

use image::{ImageError, ImageReader, RgbImage};
use pictag_core::{DecodeErrorKind, Error, Result};
use std::io::{Cursor, ErrorKind};

/// Decode an in-memory image of any compiled-in format and convert to 8-bit RGB.
///
/// The format is guessed from the content, not from the declared content type.
pub fn decode_rgb(bytes: &[u8]) -> Result<RgbImage> {
    if bytes.is_empty() {
        return Err(Error::invalid_image(DecodeErrorKind::Truncated, "empty upload"));
    }

    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| Error::invalid_image(DecodeErrorKind::Corrupt, e.to_string()))?;

    if reader.format().is_none() {
        return Err(Error::invalid_image(
            DecodeErrorKind::UnsupportedFormat,
            "unrecognised image format",
        ));
    }

    let image = reader.decode().map_err(decode_error)?;
    Ok(image.to_rgb8())
}

fn decode_error(err: ImageError) -> Error {
    let kind = match &err {
        ImageError::Unsupported(_) => DecodeErrorKind::UnsupportedFormat,
        ImageError::Limits(_) => DecodeErrorKind::LimitsExceeded,
        ImageError::IoError(io) if io.kind() == ErrorKind::UnexpectedEof => {
            DecodeErrorKind::Truncated
        }
        _ => DecodeErrorKind::Corrupt,
    };
    Error::invalid_image(kind, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbaImage};

    fn encode(format: ImageFormat) -> Vec<u8> {
        let image = RgbaImage::from_pixel(4, 3, image::Rgba([10, 20, 30, 128]));
        let mut buf = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgba8(image)
            .write_to(&mut buf, format)
            .unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_decode_png_to_rgb() {
        let image = decode_rgb(&encode(ImageFormat::Png)).unwrap();
        assert_eq!(image.dimensions(), (4, 3));
        assert_eq!(*image.get_pixel(0, 0), Rgb([10, 20, 30]));
    }

    #[test]
    fn test_decode_ignores_declared_type() {
        let bmp = {
            let mut buf = Cursor::new(Vec::new());
            image::DynamicImage::ImageRgb8(RgbImage::new(2, 2))
                .write_to(&mut buf, ImageFormat::Bmp)
                .unwrap();
            buf.into_inner()
        };
        assert_eq!(decode_rgb(&bmp).unwrap().dimensions(), (2, 2));
    }

    #[test]
    fn test_non_image_bytes() {
        let err = decode_rgb(b"definitely not an image").unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidImage {
                kind: DecodeErrorKind::UnsupportedFormat,
                ..
            }
        ));
    }

    #[test]
    fn test_empty_upload() {
        assert!(matches!(
            decode_rgb(&[]).unwrap_err(),
            Error::InvalidImage {
                kind: DecodeErrorKind::Truncated,
                ..
            }
        ));
    }

    #[test]
    fn test_truncated_png() {
        let png = encode(ImageFormat::Png);
        let err = decode_rgb(&png[..png.len() / 2]).unwrap_err();
        assert!(err.is_client_error());
    }
}
