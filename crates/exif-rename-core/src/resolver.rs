use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use log::Level;

use crate::journal::LogSink;
use crate::planner::DestinationPlan;

/// Collision-free source -> destination mapping, ready for transfer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedPlan {
    pub entries: BTreeMap<PathBuf, PathBuf>,
    /// Directories that must exist before the entries below them are transferred
    pub required_dirs: BTreeSet<PathBuf>,
}

impl ResolvedPlan {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// No two sources share a destination.
    pub fn is_injective(&self) -> bool {
        let mut seen = HashSet::with_capacity(self.entries.len());
        self.entries.values().all(|dest| seen.insert(dest))
    }

    /// Entries grouped into chains and ordered so that a file is moved or copied away
    /// before another entry writes to its path.
    ///
    /// Destinations are unique, so each entry waits on at most one other and the
    /// dependencies form chains. A closed chain is returned with `cycle` set: its first
    /// step overwrites the source of its last step, which must be set aside first.
    pub fn execution_order(&self, log: &dyn LogSink) -> Vec<Chain<'_>> {
        let mut chains = Vec::new();
        let mut done: HashSet<&PathBuf> = HashSet::with_capacity(self.entries.len());

        for start in self.entries.keys() {
            if done.contains(start) {
                continue;
            }
            let mut chain = vec![start];
            let mut cycle = false;
            let mut current = start;
            while let Some((next, _)) = self.entries.get_key_value(&self.entries[current]) {
                if done.contains(next) {
                    break;
                }
                if chain.contains(&next) {
                    // With unique destinations a chain can only close on its start
                    cycle = next == start;
                    if cycle {
                        log.emit(
                            Level::Warn,
                            &format!(
                                "Circular rename involving '{}', it goes through a temporary name",
                                start.display()
                            ),
                        );
                    }
                    break;
                }
                chain.push(next);
                current = next;
            }
            let steps = chain
                .into_iter()
                .rev()
                .filter(|source| done.insert(*source))
                .map(|source| (source, &self.entries[source]))
                .collect();
            chains.push(Chain { steps, cycle });
        }

        chains
    }
}

/// Entries that have to run one after the other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chain<'a> {
    pub steps: Vec<(&'a PathBuf, &'a PathBuf)>,
    /// The first step writes to the source of the last one
    pub cycle: bool,
}

/// Insert `_{index}` zero-padded to `width` just before the extension.
pub fn with_index_suffix(path: &Path, index: usize, width: usize) -> PathBuf {
    let mut name = path.file_stem().map(OsString::from).unwrap_or_default();
    name.push(format!("_{:0width$}", index, width = width));
    if let Some(ext) = path.extension() {
        name.push(".");
        name.push(ext);
    }
    path.with_file_name(name)
}

/// Turn the proposed destinations into a mapping where every destination is unique.
///
/// Sources sharing a destination are sorted by path string and numbered from zero, with as
/// many digits as the group size has. A numbered name that is already held by a
/// destination outside the group is passed over. Entries whose final destination is
/// their own path are dropped.
pub fn resolve(plan: DestinationPlan, log: &dyn LogSink) -> ResolvedPlan {
    log.emit(Level::Debug, "Checking uniqueness of output file names");

    let mut groups: BTreeMap<PathBuf, Vec<PathBuf>> = BTreeMap::new();
    for (source, dest) in plan.proposed {
        groups.entry(dest).or_default().push(source);
    }
    // A file already carrying the name is part of the group competing for it
    for path in plan.occupied {
        if let Some(sources) = groups.get_mut(&path) {
            log.emit(
                Level::Warn,
                &format!(
                    "'{}' already has its name but other files share its capture time, it is numbered with them",
                    path.display()
                ),
            );
            sources.push(path);
        }
    }

    // Destinations that are kept as they are, plus numbered names handed out so far
    let mut taken: HashSet<PathBuf> = groups
        .iter()
        .filter(|(_, sources)| sources.len() == 1)
        .map(|(dest, _)| dest.clone())
        .collect();

    let mut entries = BTreeMap::new();

    for (dest, mut sources) in groups {
        if sources.len() == 1 {
            let source = sources.remove(0);
            if source == dest {
                log.emit(
                    Level::Info,
                    &format!(
                        "File already has the right name and is in the destination directory, ignoring '{}'",
                        dest.display()
                    ),
                );
            } else {
                log.emit(
                    Level::Debug,
                    &format!("Capture time is unique: {} --> {}", source.display(), dest.display()),
                );
                entries.insert(source, dest);
            }
            continue;
        }

        // Plain byte order of the whole path, not component order
        sources.sort_by(|a, b| a.as_os_str().as_encoded_bytes().cmp(b.as_os_str().as_encoded_bytes()));
        let count = sources.len();
        let width = count.to_string().len();
        log.emit(
            Level::Info,
            &format!("File {} is not unique, there are {} occurrences", dest.display(), count),
        );

        let mut index = 0;
        for source in sources {
            let candidate = loop {
                let candidate = with_index_suffix(&dest, index, width);
                index += 1;
                if taken.contains(&candidate) {
                    log.emit(
                        Level::Warn,
                        &format!("'{}' is already planned for another file", candidate.display()),
                    );
                    continue;
                }
                break candidate;
            };
            taken.insert(candidate.clone());

            if candidate == source {
                log.emit(
                    Level::Info,
                    &format!(
                        "File already has the right name and is in the destination directory, ignoring '{}'",
                        source.display()
                    ),
                );
                continue;
            }
            log.emit(
                Level::Debug,
                &format!("Renaming {} --> {}", source.display(), candidate.display()),
            );
            entries.insert(source, candidate);
        }
    }

    let required_dirs = plan
        .required_dirs
        .into_iter()
        .filter(|dir| entries.values().any(|d: &PathBuf| d.parent() == Some(dir.as_path())))
        .collect();

    ResolvedPlan {
        entries,
        required_dirs,
    }
}

/// Sources grouped by destination, for reporting.
pub fn destination_counts(plan: &DestinationPlan) -> HashMap<&Path, usize> {
    let mut counts = HashMap::new();
    for dest in plan.proposed.values() {
        *counts.entry(dest.as_path()).or_insert(0) += 1;
    }
    counts
}
