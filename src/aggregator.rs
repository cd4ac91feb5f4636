//! Batch aggregation and JSON reporting.
//!
//! Drives the image source and the extractor over every discovered image and
//! collects the outcomes into a `ReceiptBatch`. Serialization is kept apart from
//! the output sink so callers can print, write to a file, or keep the string.

use std::io::{self, Write};
use std::path::Path;

use tracing::{info, warn};

use crate::error::ReceiptError;
use crate::extractor::ReceiptExtractor;
use crate::models::ReceiptBatch;
use crate::source::{ImageSource, ReceiptImage};

/// Extracts every image in `source`, in enumeration order.
///
/// Per-image failures are recorded as error markers and do not stop the batch.
///
/// # Errors
///
/// Returns the first fatal error: the directory cannot be listed, or the API
/// rejected the credential. No partial batch is returned in that case.
pub fn process_directory(
    source: &ImageSource,
    extractor: &ReceiptExtractor,
) -> Result<ReceiptBatch, ReceiptError> {
    let images = source.images()?;
    info!(
        "Processing {} receipt images from {}",
        images.len(),
        source.dir().display()
    );

    let mut batch = ReceiptBatch::new();
    for file in &images {
        let key = free_key(&batch, &file.file_name);
        if key != file.file_name {
            warn!(
                "Duplicate key {} for {}, recording it as {}",
                file.file_name,
                file.path.display(),
                key
            );
        }

        let result = ReceiptImage::load(file).and_then(|image| extractor.extract(&image));
        match result {
            Ok(record) => {
                info!("Extracted {}", key);
                batch.insert_record(key, record);
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!("Failed to extract {}: {}", key, e);
                batch.insert_error(key, &e);
            }
        }
    }

    let summary = batch.summary();
    info!(
        "Batch complete: {} records, {} errors",
        summary.records, summary.errors
    );
    Ok(batch)
}

/// Returns `file_name`, or `file_name (N)` with the smallest `N >= 2` not yet in the batch.
fn free_key(batch: &ReceiptBatch, file_name: &str) -> String {
    let mut key = file_name.to_string();
    let mut n = 1;
    while batch.contains_key(&key) {
        n += 1;
        key = format!("{file_name} ({n})");
    }
    key
}

/// Serializes a batch as indented JSON with keys in enumeration order.
pub fn render_json(batch: &ReceiptBatch) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(batch)
}

/// Writes the rendered batch and a trailing newline to `out`.
pub fn write_json_to<W: Write>(batch: &ReceiptBatch, mut out: W) -> io::Result<()> {
    let json = render_json(batch)?;
    writeln!(out, "{json}")
}

/// Prints the rendered batch to standard output.
pub fn print_json(batch: &ReceiptBatch) -> io::Result<()> {
    write_json_to(batch, io::stdout().lock())
}

/// Writes the rendered batch to a file, replacing any existing content.
pub fn write_json(batch: &ReceiptBatch, path: &Path) -> io::Result<()> {
    let file = std::fs::File::create(path)?;
    write_json_to(batch, io::BufWriter::new(file))
}
