use std::collections::{BTreeMap, BTreeSet};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use log::Level;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::journal::LogSink;
use crate::record::ImageRecord;

/// What to do with images that have no capture timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NoMetadataPolicy {
    /// Keep the original file name
    Include,
    #[default]
    Exclude,
}

#[derive(Debug, Clone, Default)]
pub struct PlanOptions {
    pub output_directory: Option<PathBuf>,
    pub mirror_tree: bool,
    pub no_metadata: NoMetadataPolicy,
    pub seconds_in_filename: bool,
}

/// Proposed destination for every planned source. Destinations may repeat.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DestinationPlan {
    pub proposed: BTreeMap<PathBuf, PathBuf>,
    /// Subdirectories of the output root needed by a mirrored tree
    pub required_dirs: BTreeSet<PathBuf>,
    /// Sources left out because they already carry their computed name.
    /// They still occupy that path when another source proposes it.
    pub occupied: BTreeSet<PathBuf>,
}

impl DestinationPlan {
    pub fn len(&self) -> usize {
        self.proposed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proposed.is_empty()
    }
}

/// File name derived from the capture time, keeping the source extension as is.
fn timestamp_file_name(record: &ImageRecord, seconds: bool) -> Option<OsString> {
    let ts = record.timestamp?;
    let mut name = OsString::from(ts.file_stem(seconds));
    if let Some(ext) = record.source.extension() {
        name.push(".");
        name.push(ext);
    }
    Some(name)
}

fn destination_directory(record: &ImageRecord, options: &PlanOptions) -> PathBuf {
    match &options.output_directory {
        None => record
            .source
            .parent()
            .unwrap_or(Path::new(""))
            .to_path_buf(),
        Some(out) if !options.mirror_tree => out.clone(),
        Some(out) => {
            let relative = record.relative_directory();
            if relative.as_os_str().is_empty() {
                out.clone()
            } else {
                out.join(relative)
            }
        }
    }
}

/// Compute a proposed destination for each record.
pub fn plan(
    records: &[ImageRecord],
    options: &PlanOptions,
    log: &dyn LogSink,
) -> Result<DestinationPlan, ConfigError> {
    if options.mirror_tree && options.output_directory.is_none() {
        return Err(ConfigError::MirrorTreeWithoutOutput);
    }

    let mut result = DestinationPlan::default();

    for record in records {
        let file_name = match (record.timestamp, options.no_metadata) {
            (Some(_), _) => timestamp_file_name(record, options.seconds_in_filename),
            (None, NoMetadataPolicy::Include) => record.source.file_name().map(OsString::from),
            (None, NoMetadataPolicy::Exclude) => {
                log.emit(
                    Level::Debug,
                    &format!("Skipping '{}': no capture time", record.source.display()),
                );
                continue;
            }
        };
        let Some(file_name) = file_name else {
            log.emit(
                Level::Warn,
                &format!("Skipping '{}': no file name", record.source.display()),
            );
            continue;
        };

        let dir = destination_directory(record, options);
        let dest = dir.join(&file_name);

        if record.timestamp.is_some() && dest == record.source {
            log.emit(
                Level::Info,
                &format!(
                    "File is already in the right format, skipping '{}'",
                    record.source.display()
                ),
            );
            result.occupied.insert(dest);
            continue;
        }

        if options.mirror_tree && options.output_directory.as_ref() != Some(&dir) {
            result.required_dirs.insert(dir);
        }
        result.proposed.insert(record.source.clone(), dest);
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::NullSink;
    use crate::timestamp::Timestamp;

    fn ts() -> Option<Timestamp> {
        Timestamp::parse("2020:01:02 03:04:05")
    }

    fn rec(source: &str, origin: &str, timestamp: Option<Timestamp>) -> ImageRecord {
        ImageRecord::new(PathBuf::from(source), PathBuf::from(origin), timestamp)
    }

    fn options() -> PlanOptions {
        PlanOptions {
            seconds_in_filename: true,
            ..PlanOptions::default()
        }
    }

    #[test]
    fn test_in_place_rename() {
        let records = vec![rec("/photos/IMG_1.jpg", "/photos", ts())];
        let p = plan(&records, &options(), &NullSink).unwrap();
        assert_eq!(
            p.proposed[Path::new("/photos/IMG_1.jpg")],
            PathBuf::from("/photos/2020-01-02_03-04-05.jpg")
        );
        assert!(p.required_dirs.is_empty());
    }

    #[test]
    fn test_extension_case_is_preserved() {
        let records = vec![rec("/photos/IMG_1.JPG", "/photos", ts())];
        let p = plan(&records, &options(), &NullSink).unwrap();
        assert_eq!(
            p.proposed[Path::new("/photos/IMG_1.JPG")],
            PathBuf::from("/photos/2020-01-02_03-04-05.JPG")
        );
    }

    #[test]
    fn test_without_seconds() {
        let records = vec![rec("/photos/IMG_1.jpg", "/photos", ts())];
        let opts = PlanOptions {
            seconds_in_filename: false,
            ..options()
        };
        let p = plan(&records, &opts, &NullSink).unwrap();
        assert_eq!(
            p.proposed[Path::new("/photos/IMG_1.jpg")],
            PathBuf::from("/photos/2020-01-02_03-04.jpg")
        );
    }

    #[test]
    fn test_already_named_is_excluded() {
        let records = vec![rec("/photos/2020-01-02_03-04-05.jpg", "/photos", ts())];
        let p = plan(&records, &options(), &NullSink).unwrap();
        assert!(p.is_empty());
        assert!(p
            .occupied
            .contains(Path::new("/photos/2020-01-02_03-04-05.jpg")));
    }

    #[test]
    fn test_no_metadata_policy() {
        let records = vec![rec("/photos/scan.jpg", "/photos", None)];
        let excluded = plan(&records, &options(), &NullSink).unwrap();
        assert!(excluded.is_empty());

        let opts = PlanOptions {
            output_directory: Some(PathBuf::from("/out")),
            no_metadata: NoMetadataPolicy::Include,
            ..options()
        };
        let included = plan(&records, &opts, &NullSink).unwrap();
        assert_eq!(
            included.proposed[Path::new("/photos/scan.jpg")],
            PathBuf::from("/out/scan.jpg")
        );
    }

    #[test]
    fn test_no_metadata_in_place_is_kept_for_resolution() {
        let records = vec![rec("/photos/scan.jpg", "/photos", None)];
        let opts = PlanOptions {
            no_metadata: NoMetadataPolicy::Include,
            ..options()
        };
        let p = plan(&records, &opts, &NullSink).unwrap();
        assert_eq!(
            p.proposed[Path::new("/photos/scan.jpg")],
            PathBuf::from("/photos/scan.jpg")
        );
    }

    #[test]
    fn test_flat_output_directory() {
        let records = vec![
            rec("/photos/a.jpg", "/photos", ts()),
            rec("/photos/trip/b.jpg", "/photos", ts()),
        ];
        let opts = PlanOptions {
            output_directory: Some(PathBuf::from("/out")),
            ..options()
        };
        let p = plan(&records, &opts, &NullSink).unwrap();
        assert!(p
            .proposed
            .values()
            .all(|d| d == Path::new("/out/2020-01-02_03-04-05.jpg")));
        assert!(p.required_dirs.is_empty());
    }

    #[test]
    fn test_mirror_tree() {
        let records = vec![
            rec("/photos/trip/img1.jpg", "/photos", ts()),
            rec("/photos/top.jpg", "/photos", ts()),
            rec("/elsewhere/single.jpg", "/elsewhere/single.jpg", ts()),
        ];
        let opts = PlanOptions {
            output_directory: Some(PathBuf::from("/out")),
            mirror_tree: true,
            ..options()
        };
        let p = plan(&records, &opts, &NullSink).unwrap();
        assert_eq!(
            p.proposed[Path::new("/photos/trip/img1.jpg")],
            PathBuf::from("/out/trip/2020-01-02_03-04-05.jpg")
        );
        assert_eq!(
            p.proposed[Path::new("/photos/top.jpg")],
            PathBuf::from("/out/2020-01-02_03-04-05.jpg")
        );
        assert_eq!(
            p.proposed[Path::new("/elsewhere/single.jpg")],
            PathBuf::from("/out/2020-01-02_03-04-05.jpg")
        );
        assert_eq!(
            p.required_dirs.iter().collect::<Vec<_>>(),
            vec![Path::new("/out/trip")]
        );
    }

    #[test]
    fn test_mirror_tree_requires_output() {
        let opts = PlanOptions {
            mirror_tree: true,
            ..options()
        };
        assert!(matches!(
            plan(&[], &opts, &NullSink),
            Err(ConfigError::MirrorTreeWithoutOutput)
        ));
    }
}
