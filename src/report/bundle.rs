//! Zip bundle of the files a run produced

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Package report files into a zip archive, flattened to their file names.
///
/// Files that do not exist are skipped; the originals are left in place.
/// Returns the files that were added.
pub fn package_reports(files: &[PathBuf], zip_path: &Path) -> Result<Vec<PathBuf>> {
    let zip_file = std::fs::File::create(zip_path)
        .with_context(|| format!("Failed to create zip file: {}", zip_path.display()))?;

    let mut zip = ZipWriter::new(zip_file);
    let options = SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .unix_permissions(0o644);

    let mut added = Vec::new();
    for path in files {
        if !path.is_file() {
            tracing::warn!(path = %path.display(), "report file missing, not bundled");
            continue;
        }
        let Some(filename) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };

        zip.start_file(filename, options)
            .with_context(|| format!("Failed to add {} to zip", filename))?;
        let mut content = Vec::new();
        std::fs::File::open(path)
            .with_context(|| format!("Failed to open file: {}", path.display()))?
            .read_to_end(&mut content)?;
        zip.write_all(&content)?;
        added.push(path.clone());
    }

    zip.finish().context("Failed to finalize zip file")?;
    Ok(added)
}
