// JPEG snapshot writer (§4.3): BGRA -> RGB -> JPEG at a fixed quality.
// Grounded on the teacher's `image::basic::save` JPEG branch, narrowed to the
// one format the Change Detector ever produces.

use std::path::Path;

use anyhow::{Context, Result};
use image::ExtendedColorType;

use crate::frame::RawFrame;

/// Encodes `frame` (BGRA8) as a JPEG at `quality` and writes it to `path`.
pub fn write_jpeg(frame: &RawFrame, path: &Path, quality: u8) -> Result<()> {
    let rgb: Vec<u8> = frame
        .data
        .chunks_exact(4)
        .flat_map(|px| [px[2], px[1], px[0]])
        .collect();

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating snapshot directory {}", parent.display()))?;
    }
    let file = std::fs::File::create(path)
        .with_context(|| format!("creating snapshot file {}", path.display()))?;
    let mut writer = std::io::BufWriter::new(file);

    let mut encoder =
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut writer, quality);
    encoder
        .encode(&rgb, frame.width, frame.height, ExtendedColorType::Rgb8)
        .with_context(|| format!("encoding JPEG snapshot {}", path.display()))?;
    Ok(())
}
