use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use exif::{In, Reader, Tag, Value};
use log::Level;
use rayon::prelude::*;

use crate::discover::DiscoveredFile;
use crate::journal::LogSink;
use crate::record::ImageRecord;
use crate::timestamp::Timestamp;
use crate::ProgressCallback;

/// Source of capture timestamps.
pub trait MetadataExtractor: Sync {
    /// Short name used in log messages.
    fn name(&self) -> &str;

    /// Checked once before any file is read.
    fn ensure_available(&self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Capture time of the image at `path`, or `None` when missing or unreadable.
    fn capture_timestamp(&self, path: &Path) -> Option<Timestamp>;
}

/// Reads `DateTimeOriginal` from the EXIF block.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExifExtractor;

impl MetadataExtractor for ExifExtractor {
    fn name(&self) -> &str {
        "kamadak-exif"
    }

    fn capture_timestamp(&self, path: &Path) -> Option<Timestamp> {
        let file = File::open(path).ok()?;
        let exif = Reader::new()
            .read_from_container(&mut BufReader::new(file))
            .ok()?;
        let field = exif.get_field(Tag::DateTimeOriginal, In::PRIMARY)?;

        match &field.value {
            Value::Ascii(parts) => {
                let raw = parts.first()?;
                Timestamp::parse(std::str::from_utf8(raw).ok()?)
            }
            _ => Timestamp::parse(&field.display_value().to_string()),
        }
    }
}

/// Read the capture timestamp of every file in parallel.
///
/// The returned records are in the same order as `files`.
pub fn extract_records(
    files: &[DiscoveredFile],
    extractor: &dyn MetadataExtractor,
    log: &dyn LogSink,
    progress: &ProgressCallback,
) -> Vec<ImageRecord> {
    let total = files.len() as u64;
    let counter = AtomicU64::new(0);

    files
        .par_iter()
        .map(|f| {
            let timestamp = extractor.capture_timestamp(&f.path);
            match timestamp {
                Some(ts) => log.emit(
                    Level::Debug,
                    &format!("{}: capture time {}", f.path.display(), ts),
                ),
                None => log.emit(
                    Level::Info,
                    &format!("No EXIF capture time found in file '{}'", f.path.display()),
                ),
            }
            let current = counter.fetch_add(1, Ordering::Relaxed);
            progress("extract", current, total, "Reading EXIF");
            ImageRecord::new(f.path.clone(), f.origin.clone(), timestamp)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::NullSink;
    use std::collections::HashMap;
    use std::path::PathBuf;

    struct FixedExtractor(HashMap<PathBuf, Timestamp>);

    impl MetadataExtractor for FixedExtractor {
        fn name(&self) -> &str {
            "fixed"
        }

        fn capture_timestamp(&self, path: &Path) -> Option<Timestamp> {
            self.0.get(path).copied()
        }
    }

    #[test]
    fn test_extract_records_preserves_order() {
        let ts = Timestamp::parse("2020:01:02 03:04:05").unwrap();
        let files: Vec<DiscoveredFile> = (0..50)
            .map(|i| DiscoveredFile {
                path: PathBuf::from(format!("/in/{:03}.jpg", i)),
                origin: PathBuf::from("/in"),
            })
            .collect();
        let extractor = FixedExtractor(
            files
                .iter()
                .step_by(2)
                .map(|f| (f.path.clone(), ts))
                .collect(),
        );

        let records = extract_records(&files, &extractor, &NullSink, &|_, _, _, _| {});
        assert_eq!(records.len(), files.len());
        for (i, (rec, file)) in records.iter().zip(&files).enumerate() {
            assert_eq!(rec.source, file.path);
            assert_eq!(rec.timestamp.is_some(), i % 2 == 0);
        }
    }

    /// Smallest JPEG carrying an EXIF DateTimeOriginal.
    fn jpeg_with_date(date: &str) -> Vec<u8> {
        let mut tiff: Vec<u8> = b"II\x2a\x00\x08\x00\x00\x00".to_vec();
        // IFD0: one entry pointing at the Exif IFD (offset 26)
        tiff.extend_from_slice(&1u16.to_le_bytes());
        tiff.extend_from_slice(&0x8769u16.to_le_bytes());
        tiff.extend_from_slice(&4u16.to_le_bytes());
        tiff.extend_from_slice(&1u32.to_le_bytes());
        tiff.extend_from_slice(&26u32.to_le_bytes());
        tiff.extend_from_slice(&0u32.to_le_bytes());
        // Exif IFD: DateTimeOriginal stored at offset 44
        let mut value = date.as_bytes().to_vec();
        value.push(0);
        tiff.extend_from_slice(&1u16.to_le_bytes());
        tiff.extend_from_slice(&0x9003u16.to_le_bytes());
        tiff.extend_from_slice(&2u16.to_le_bytes());
        tiff.extend_from_slice(&(value.len() as u32).to_le_bytes());
        tiff.extend_from_slice(&44u32.to_le_bytes());
        tiff.extend_from_slice(&0u32.to_le_bytes());
        tiff.extend_from_slice(&value);

        let mut app1 = b"Exif\x00\x00".to_vec();
        app1.extend_from_slice(&tiff);

        let mut jpeg = vec![0xFF, 0xD8, 0xFF, 0xE1];
        jpeg.extend_from_slice(&((app1.len() + 2) as u16).to_be_bytes());
        jpeg.extend_from_slice(&app1);
        jpeg.extend_from_slice(&[0xFF, 0xD9]);
        jpeg
    }

    #[test]
    fn test_exif_extractor_reads_date_time_original() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("IMG_0001.jpg");
        std::fs::write(&path, jpeg_with_date("2020:01:02 03:04:05")).unwrap();

        assert_eq!(
            ExifExtractor.capture_timestamp(&path),
            Timestamp::parse("2020:01:02 03:04:05")
        );
    }

    #[test]
    fn test_exif_extractor_on_non_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake.jpg");
        std::fs::write(&path, b"not a jpeg at all").unwrap();
        assert!(ExifExtractor.capture_timestamp(&path).is_none());
        assert!(ExifExtractor
            .capture_timestamp(&dir.path().join("missing.jpg"))
            .is_none());
        assert!(ExifExtractor.ensure_available().is_ok());
    }
}
