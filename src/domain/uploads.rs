//! Image attachment rules.

use imagesize::ImageType;
use thiserror::Error;

/// Directory prefix every post image is stored under.
pub const POST_IMAGE_PREFIX: &str = "posts";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDimensions {
    pub width: usize,
    pub height: usize,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ImageRejection {
    #[error("The submitted file is empty.")]
    Empty,
    #[error(
        "Upload a valid image. The file you uploaded was either not an image or a corrupted image."
    )]
    NotAnImage,
}

/// Probe the payload header and accept only raster formats browsers display.
pub fn inspect_image(bytes: &[u8]) -> Result<ImageDimensions, ImageRejection> {
    if bytes.is_empty() {
        return Err(ImageRejection::Empty);
    }

    let kind = imagesize::image_type(bytes).map_err(|_| ImageRejection::NotAnImage)?;
    if !matches!(
        kind,
        ImageType::Png
            | ImageType::Jpeg
            | ImageType::Gif
            | ImageType::Webp
            | ImageType::Bmp
            | ImageType::Ico
    ) {
        return Err(ImageRejection::NotAnImage);
    }

    let size = imagesize::blob_size(bytes).map_err(|_| ImageRejection::NotAnImage)?;
    if size.width == 0 || size.height == 0 {
        return Err(ImageRejection::NotAnImage);
    }

    Ok(ImageDimensions {
        width: size.width,
        height: size.height,
    })
}
