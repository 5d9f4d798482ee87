//! Zip archive of the Gerber set, the form fabrication houses accept.

use log::info;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use zip::write::SimpleFileOptions;

use super::gerber::GerberFile;
use crate::error::AssembleError;

/// Write `files` into a zip at `path`. Entries keep plot order and carry a
/// fixed timestamp, so the same board always yields the same archive bytes.
pub fn write_bundle(files: &[GerberFile], path: &Path) -> Result<(), AssembleError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut zip = zip::ZipWriter::new(File::create(path)?);
    let options = SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default())
        .unix_permissions(0o644);

    for file in files {
        zip.start_file(file.file_name.as_str(), options)?;
        zip.write_all(file.content.as_bytes())?;
    }
    zip.finish()?;
    info!("Gerber archive written to {}", path.display());
    Ok(())
}
