//! Part image stage: read, store by digest, and record the active row

use std::fs;
use std::io::Cursor;
use std::path::Path;

use image::{ImageFormat, ImageReader, RgbaImage};
use rusqlite::{params, Connection};
use tracing::{debug, warn};

use super::dto::{ImageDescriptor, PartDescriptor};
use super::{BootstrapError, SkippedImage};
use crate::core::assets::{safe_resolve, sha256_hex, AssetKey, AssetStore, PNG_MIME};

/// What happened to one part's declared image
pub(crate) enum ImageOutcome {
    Stored,
    Skipped(SkippedImage),
    /// The part declares no image at all
    Absent,
}

/// Import the image declared by `part`
///
/// Unreadable images are skipped unless the export marks them missing, in
/// which case a transparent placeholder is stored instead.
pub(crate) fn store_part_image(
    conn: &Connection,
    assets: &AssetStore,
    export_root: &Path,
    part_id: i64,
    part: &PartDescriptor,
    now: &str,
) -> Result<ImageOutcome, BootstrapError> {
    let Some(image) = &part.image else {
        return Ok(ImageOutcome::Absent);
    };

    let bytes = match read_export_image(export_root, &image.path) {
        Ok(bytes) => bytes,
        Err(_) if image.is_marked_missing() => transparent_png_placeholder()?,
        Err(reason) => {
            let skipped = SkippedImage {
                uniq_no: part.uniq_no.clone(),
                path: image.path.clone(),
                reason,
            };
            warn!(uniq_no = %skipped.uniq_no, path = %skipped.path, reason = %skipped.reason, "skipping part image");
            return Ok(ImageOutcome::Skipped(skipped));
        }
    };

    let digest = sha256_hex(&bytes);
    if let Some(declared) = &image.sha256 {
        if !declared.eq_ignore_ascii_case(&digest) {
            debug!(uniq_no = %part.uniq_no, %declared, actual = %digest, "declared image digest differs");
        }
    }

    let asset = assets.put(&AssetKey::part_image(&part.uniq_no, &digest), &bytes, PNG_MIME)?;
    let (width, height) = match decoded_dimensions(&bytes) {
        Some((w, h)) => (Some(i64::from(w)), Some(i64::from(h))),
        None => (image.width_px, image.height_px),
    };

    conn.execute("UPDATE image_asset SET active = 0 WHERE part_id = ?1", params![part_id])?;
    conn.execute(
        "INSERT INTO image_asset(
           part_id, status, sha256, mime, storage_relpath, size_bytes,
           width_px, height_px, format, color_mode, transparent_background,
           qc_alpha_border_ratio, qc_content_empty, source_json, qc_json, active, imported_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, 1, ?16)
         ON CONFLICT(part_id, sha256) DO UPDATE SET
           status = excluded.status,
           mime = excluded.mime,
           storage_relpath = excluded.storage_relpath,
           size_bytes = excluded.size_bytes,
           width_px = excluded.width_px,
           height_px = excluded.height_px,
           format = excluded.format,
           color_mode = excluded.color_mode,
           transparent_background = excluded.transparent_background,
           qc_alpha_border_ratio = excluded.qc_alpha_border_ratio,
           qc_content_empty = excluded.qc_content_empty,
           source_json = excluded.source_json,
           qc_json = excluded.qc_json,
           active = 1,
           imported_at = excluded.imported_at",
        params![
            part_id,
            image.status,
            asset.digest_hex,
            asset.mime,
            asset.storage_rel_path,
            asset.size_bytes,
            width,
            height,
            image.format,
            image.mode,
            image.transparent_background,
            image.qc.as_ref().and_then(|qc| qc.alpha_border_ratio),
            image.qc.as_ref().and_then(|qc| qc.content_empty),
            image.source.as_ref().map(|v| v.to_string()),
            qc_json(image)?,
            now,
        ],
    )?;

    Ok(ImageOutcome::Stored)
}

/// Bytes of an image referenced from the export, as a reason string on failure
fn read_export_image(export_root: &Path, rel: &str) -> Result<Vec<u8>, String> {
    let path = safe_resolve(export_root, rel).map_err(|e| e.to_string())?;
    fs::read(&path).map_err(|e| format!("{}: {}", path.display(), e))
}

fn qc_json(image: &ImageDescriptor) -> Result<Option<String>, BootstrapError> {
    image
        .qc
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(BootstrapError::from)
}

/// Width and height from the image header, without decoding pixels
pub(crate) fn decoded_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}

/// A 1x1 fully transparent PNG
pub(crate) fn transparent_png_placeholder() -> Result<Vec<u8>, image::ImageError> {
    let mut out = Cursor::new(Vec::new());
    RgbaImage::new(1, 1).write_to(&mut out, ImageFormat::Png)?;
    Ok(out.into_inner())
}
