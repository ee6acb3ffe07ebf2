use std::io::Cursor;
use std::path::Path;

use anyhow::{Context, Result};
use image::{imageops::FilterType, DynamicImage, ImageFormat};
use uuid::Uuid;

use dojo_types::DEFAULT_PHOTO;

/// Largest accepted upload
pub const MAX_PHOTO_BYTES: usize = 5 * 1024 * 1024;

/// Stored photos are square thumbnails of this side length
pub const PHOTO_SIDE: u32 = 200;

/// Decode an uploaded image and produce a 200x200 RGB PNG
pub fn process(bytes: &[u8]) -> Result<Vec<u8>> {
    let decoded = image::load_from_memory(bytes).context("Unsupported or corrupt image")?;
    let rgb = DynamicImage::ImageRgb8(decoded.to_rgb8());
    let resized = rgb.resize_exact(PHOTO_SIDE, PHOTO_SIDE, FilterType::Lanczos3);

    let mut out = Cursor::new(Vec::new());
    resized
        .write_to(&mut out, ImageFormat::Png)
        .context("Failed to encode photo")?;
    Ok(out.into_inner())
}

/// Relative path a new photo for `user_id` is stored under
pub fn photo_path(user_id: &Uuid, timestamp: i64) -> String {
    format!("photos/{}_{}.png", user_id, timestamp)
}

/// Write a processed photo below `media_dir` and return its relative path
pub fn store(media_dir: &Path, user_id: &Uuid, png: &[u8], timestamp: i64) -> Result<String> {
    let relative = photo_path(user_id, timestamp);
    let full = media_dir.join(&relative);
    if let Some(parent) = full.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(&full, png).with_context(|| format!("Failed to write {}", full.display()))?;
    Ok(relative)
}

/// Delete a previous photo unless it is the shared default
pub fn remove_old(media_dir: &Path, relative: &str) {
    if relative.is_empty() || relative == DEFAULT_PHOTO {
        return;
    }
    let full = media_dir.join(relative);
    if let Err(e) = std::fs::remove_file(&full) {
        tracing::warn!("Could not remove old photo {}: {}", full.display(), e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, RgbaImage};

    fn sample_png(w: u32, h: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, image::Rgba([200, 10, 10, 128])));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_process_resizes_to_square_rgb() {
        let png = process(&sample_png(640, 480)).unwrap();
        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!(decoded.dimensions(), (PHOTO_SIDE, PHOTO_SIDE));
        assert!(matches!(decoded, DynamicImage::ImageRgb8(_)));
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(process(b"definitely not an image").is_err());
    }

    #[test]
    fn test_store_and_remove() {
        let dir = std::env::temp_dir().join(format!("dojo-photo-{}", Uuid::new_v4()));
        let user = Uuid::new_v4();
        let relative = store(&dir, &user, b"png", 1700000000).unwrap();
        assert_eq!(relative, format!("photos/{}_1700000000.png", user));
        assert!(dir.join(&relative).exists());

        remove_old(&dir, DEFAULT_PHOTO);
        remove_old(&dir, &relative);
        assert!(!dir.join(&relative).exists());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
