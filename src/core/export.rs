//! ZIP export of generated dish images.

use crate::{
    core::dish::Dish,
    errors::{Error, Result},
};
use std::io::{Cursor, Write};
use zip::{CompressionMethod, ZipWriter, write::SimpleFileOptions};

/// Lowercase ASCII slug of a dish name, `dish` when nothing is left.
#[must_use]
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        "dish".to_string()
    } else {
        slug.to_string()
    }
}

/// Packs every generated image into a ZIP archive named `NN-slug.ext`.
///
/// Images are already compressed, so entries are stored as-is.
pub fn build_archive(dishes: &[Dish]) -> Result<Vec<u8>> {
    let images: Vec<_> = dishes
        .iter()
        .filter_map(|d| d.image.as_ref().map(|image| (d, image)))
        .collect();
    if images.is_empty() {
        return Err(Error::Intake {
            message: "No generated images to export yet".to_string(),
        });
    }

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    for (index, (dish, image)) in images.iter().enumerate() {
        let filename = format!(
            "{:02}-{}.{}",
            index + 1,
            slugify(&dish.name),
            image.extension()
        );
        writer.start_file(filename, options)?;
        writer.write_all(&image.data)?;
    }
    let cursor = writer.finish()?;
    tracing::info!(images = images.len(), "Export archive built");
    Ok(cursor.into_inner())
}
