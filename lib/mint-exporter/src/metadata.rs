//! Process metadata enrichment.
//!
//! When running next to a host agent, process identity is discoverable through a well-known indirection file: its
//! content is the path of a second, properties-style file holding `key=value` lines. Neither file is required to exist,
//! and any problem reading or parsing them simply results in no enrichment.

use std::{
    fs,
    path::{Path, PathBuf},
};

use mint_protocol::Dimension;
use tracing::debug;

/// Name of the well-known indirection file.
pub const METADATA_INDIRECTION_FILE: &str = "dt_metadata_e617c525669e072eebe3d0f08212e8f2.properties";

/// Reads process identity dimensions from the metadata indirection file.
#[derive(Clone, Debug)]
pub struct ProcessMetadata {
    indirection_file: PathBuf,
}

impl ProcessMetadata {
    /// Creates a new `ProcessMetadata` reader for the given indirection file.
    pub fn from_indirection_file<P>(path: P) -> Self
    where
        P: Into<PathBuf>,
    {
        Self {
            indirection_file: path.into(),
        }
    }

    /// Returns the path of the indirection file.
    pub fn indirection_file(&self) -> &Path {
        &self.indirection_file
    }

    /// Reads the metadata dimensions.
    ///
    /// Every well-formed `key=value` line of the metadata file becomes a dimension, in file order. If either file is
    /// missing, unreadable, or empty, no dimensions are returned.
    pub fn read_dimensions(&self) -> Vec<Dimension> {
        let metadata_file = match fs::read_to_string(&self.indirection_file) {
            Ok(contents) => contents.trim().to_string(),
            Err(e) => {
                debug!(error = %e, file_path = %self.indirection_file.display(), "Unable to read metadata indirection file. Skipping enrichment.");
                return Vec::new();
            }
        };

        if metadata_file.is_empty() {
            debug!(file_path = %self.indirection_file.display(), "Metadata indirection file is empty. Skipping enrichment.");
            return Vec::new();
        }

        match fs::read_to_string(&metadata_file) {
            Ok(contents) => {
                let dimensions = parse_properties(&contents);
                debug!(file_path = %metadata_file, dimensions = dimensions.len(), "Read process metadata.");
                dimensions
            }
            Err(e) => {
                debug!(error = %e, file_path = %metadata_file, "Unable to read metadata file. Skipping enrichment.");
                Vec::new()
            }
        }
    }
}

impl Default for ProcessMetadata {
    fn default() -> Self {
        Self::from_indirection_file(METADATA_INDIRECTION_FILE)
    }
}

fn parse_properties(contents: &str) -> Vec<Dimension> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with('!'))
        .filter_map(|line| match line.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => Some(Dimension::new(key.trim(), value.trim())),
            _ => {
                debug!(line, "Skipping malformed metadata line.");
                None
            }
        })
        .collect()
}
