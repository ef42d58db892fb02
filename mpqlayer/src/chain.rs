//! Patch chains: one logical file space over stacked archives
//!
//! Layers are ordered by priority, highest first. A name resolves by walking
//! down from the top: a delete marker ends the walk, a patch entry is
//! collected and the walk continues, and the first full file becomes the
//! base the collected patches are folded over, lowest layer first.

use crate::archive::{Archive, FileInfo};
use crate::header::FormatVersion;
use crate::listfile::{FileNames, NameLookup};
use crate::{special_files, Error, Result};
use std::path::Path;
use std::sync::Arc;

/// Priority given to the base archive
pub const BASE_PRIORITY: i32 = 0;

/// Options applied to every lookup through a chain
#[derive(Debug, Clone)]
pub struct ChainOptions {
    locale: Option<u16>,
    verify_patch_hashes: bool,
}

impl ChainOptions {
    /// Create new default options
    pub fn new() -> Self {
        Self {
            locale: None,
            verify_patch_hashes: true,
        }
    }

    /// Locale used for every layer, overriding each archive's own
    pub fn locale(mut self, locale: u16) -> Self {
        self.locale = Some(locale);
        self
    }

    /// Whether fragment MD5 digests are checked during replay
    pub fn verify_patch_hashes(mut self, verify: bool) -> Self {
        self.verify_patch_hashes = verify;
        self
    }
}

impl Default for ChainOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Content produced by resolving a name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    /// Final bytes
    pub data: Vec<u8>,
    /// Layer that held the full file the patches were applied to
    pub source_layer: String,
    /// Number of fragments folded over the base
    pub patches_applied: usize,
}

/// Information about a layer in the chain
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChainInfo {
    /// Layer name
    pub name: String,
    /// Priority in the chain
    pub priority: i32,
    /// Number of files in the layer
    pub file_count: usize,
    /// Declared archive size
    pub archive_size: u64,
    /// Header format version
    pub format_version: FormatVersion,
}

/// Result of walking the chain for one name
struct Walk<'a> {
    /// Patch entries above the base, highest first
    patches: Vec<(&'a Archive, FileInfo)>,
    base: &'a Archive,
    info: FileInfo,
}

#[derive(Debug, Clone)]
struct Layer {
    archive: Arc<Archive>,
    priority: i32,
}

/// A base archive plus prioritised patch archives
#[derive(Debug)]
pub struct PatchChain {
    /// Ordered by priority, highest first
    layers: Vec<Layer>,
    options: ChainOptions,
}

/// Where a new layer goes: before every layer of lower or equal priority
fn insert_position(existing: impl IntoIterator<Item = i32>, priority: i32) -> usize {
    let mut count = 0;
    for (index, other) in existing.into_iter().enumerate() {
        if other <= priority {
            return index;
        }
        count = index + 1;
    }
    count
}

impl PatchChain {
    /// Create a chain over a base archive
    pub fn new(base: Archive) -> Self {
        Self::with_options(base, ChainOptions::default())
    }

    /// Create a chain with explicit options
    pub fn with_options(base: Archive, options: ChainOptions) -> Self {
        Self {
            layers: vec![Layer {
                archive: Arc::new(base),
                priority: BASE_PRIORITY,
            }],
            options,
        }
    }

    /// Add a patch archive
    ///
    /// Higher priorities override lower ones; among equal priorities the
    /// most recently added layer wins.
    pub fn add_patch(&mut self, archive: Archive, priority: i32) {
        self.add_layer(Arc::new(archive), priority);
    }

    /// Add an archive shared with other chains
    pub fn add_layer(&mut self, archive: Arc<Archive>, priority: i32) {
        let index = insert_position(self.layers.iter().map(|layer| layer.priority), priority);
        log::debug!(
            "Adding {} to chain at priority {priority} (position {index})",
            archive.name()
        );
        self.layers.insert(index, Layer { archive, priority });
    }

    /// Open an archive file and add it as a patch
    pub fn open_patch<P: AsRef<Path>>(&mut self, path: P, priority: i32) -> Result<()> {
        let archive = Archive::open(path)?;
        self.add_patch(archive, priority);
        Ok(())
    }

    /// Remove the highest-priority layer with the given name
    ///
    /// Any layer can be removed, the base included. The archive is returned
    /// so callers holding other references decide when it is dropped.
    pub fn remove_layer(&mut self, name: &str) -> Option<Arc<Archive>> {
        let index = self.position(name)?;
        let layer = self.layers.remove(index);
        log::debug!("Removed {name} (priority {}) from chain", layer.priority);
        Some(layer.archive)
    }

    /// Drop every layer
    pub fn clear(&mut self) {
        self.layers.clear();
    }

    /// Priority of the named layer
    pub fn priority(&self, name: &str) -> Option<i32> {
        self.position(name).map(|index| self.layers[index].priority)
    }

    /// Move the named layer to a new priority
    ///
    /// The layer is re-inserted as if newly added, so it wins ties against
    /// layers that already hold that priority.
    pub fn set_priority(&mut self, name: &str, priority: i32) -> Result<()> {
        let archive = self
            .remove_layer(name)
            .ok_or_else(|| Error::LayerNotFound(name.to_string()))?;
        self.add_layer(archive, priority);
        Ok(())
    }

    /// The layer carrying the given archive name
    pub fn layer(&self, name: &str) -> Option<&Arc<Archive>> {
        self.position(name).map(|index| &self.layers[index].archive)
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.layers
            .iter()
            .position(|layer| layer.archive.name() == name)
    }

    /// Number of layers, base included
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Check if every layer has been removed
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Layers from highest to lowest priority
    pub fn layers(&self) -> impl Iterator<Item = &Arc<Archive>> {
        self.layers.iter().map(|layer| &layer.archive)
    }

    /// The chain options
    pub fn options(&self) -> &ChainOptions {
        &self.options
    }

    /// Information about every layer, highest priority first
    pub fn chain_info(&self) -> Vec<ChainInfo> {
        self.layers
            .iter()
            .map(|layer| {
                let info = layer.archive.archive_info();
                ChainInfo {
                    name: info.name,
                    priority: layer.priority,
                    file_count: info.file_count,
                    archive_size: info.archive_size,
                    format_version: info.format_version,
                }
            })
            .collect()
    }

    fn lookup(&self, archive: &Archive, name: &str) -> Option<FileInfo> {
        archive.find_file_locale(name, self.options.locale.unwrap_or(archive.locale()))
    }

    /// Entries from the top of the chain down to the full file, if any
    ///
    /// Returns `None` when a delete marker is reached or no layer holds a
    /// full file.
    fn walk(&self, name: &str) -> Option<Walk<'_>> {
        let mut patches = Vec::new();

        for layer in &self.layers {
            let archive = &*layer.archive;
            let Some(info) = self.lookup(archive, name) else {
                continue;
            };

            if info.is_delete_marker() {
                log::debug!("{name} deleted in {}", archive.name());
                return None;
            }
            if info.is_patch_file() {
                log::debug!("{name} patched in {}", archive.name());
                patches.push((archive, info));
                continue;
            }
            return Some(Walk {
                patches,
                base: archive,
                info,
            });
        }

        if !patches.is_empty() {
            log::debug!("{name} has {} patches but no base", patches.len());
        }
        None
    }

    /// Resolve a name to its final content
    pub fn resolve(&self, name: &str) -> Result<Resolved> {
        let Walk {
            patches,
            base,
            info,
        } = self
            .walk(name)
            .ok_or_else(|| Error::FileNotFound(name.to_string()))?;

        let mut data = base.read_entry(&info)?;
        for (archive, patch_info) in patches.iter().rev() {
            let patch = archive.read_patch_entry(patch_info)?;
            data = patch.apply(&data, self.options.verify_patch_hashes)?;
            log::trace!("Applied {name} patch from {}", archive.name());
        }

        Ok(Resolved {
            data,
            source_layer: base.name().to_string(),
            patches_applied: patches.len(),
        })
    }

    /// Check if a name resolves to content
    pub fn has_file(&self, name: &str) -> bool {
        self.walk(name).is_some()
    }

    /// Read the final content of a file
    pub fn read_file(&self, name: &str) -> Result<Vec<u8>> {
        self.resolve(name).map(|resolved| resolved.data)
    }

    /// Read several files, keeping each name's own outcome
    pub fn read_files(&self, names: &[&str]) -> Vec<(String, Result<Vec<u8>>)> {
        names
            .iter()
            .map(|&name| (name.to_string(), self.read_file(name)))
            .collect()
    }

    /// The topmost layer contributing to a name's content
    ///
    /// For a patched file this is the layer with the newest fragment; `None`
    /// when the name does not resolve.
    pub fn find_layer(&self, name: &str) -> Option<&Archive> {
        let walk = self.walk(name)?;
        Some(walk.patches.first().map_or(walk.base, |(archive, _)| *archive))
    }

    /// Entry information from the topmost layer holding a name
    pub fn file_info(&self, name: &str) -> Result<FileInfo> {
        self.layers
            .iter()
            .find_map(|layer| self.lookup(&layer.archive, name))
            .filter(|info| !info.is_delete_marker())
            .ok_or_else(|| Error::FileNotFound(name.to_string()))
    }

    /// Lazily enumerate listed names matching a wildcard mask
    ///
    /// Listfiles of all layers are merged. Fails when no layer has one.
    pub fn enumerate(&self, mask: &str) -> Result<FileNames<'_>> {
        let mut names = Vec::new();
        let mut found = false;

        for layer in &self.layers {
            match layer.archive.list() {
                Ok(listed) => {
                    found = true;
                    names.extend(listed);
                }
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        }

        if !found {
            return Err(Error::FileNotFound(special_files::LISTFILE.to_string()));
        }
        Ok(FileNames::new(self, names, mask))
    }
}

impl NameLookup for PatchChain {
    fn contains(&self, name: &str) -> bool {
        self.has_file(name)
    }
}
