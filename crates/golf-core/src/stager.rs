//! Source stager - packs an uploaded source file into a tar archive.
//!
//! The archive is built entirely in memory and uploaded into the sandbox's
//! working directory, so no host path is ever shared with the container.

use crate::error::CoreError;
use bytes::Bytes;

/// File name the build pipeline inside the image expects.
pub const SOURCE_FILE_NAME: &str = "main.s";

/// A source file packed as a single-entry tar archive.
#[derive(Debug, Clone)]
pub struct StagedSource {
    archive: Bytes,
    source_len: usize,
}

impl StagedSource {
    /// The tar archive bytes.
    pub fn archive(&self) -> Bytes {
        self.archive.clone()
    }

    /// Name of the single entry in the archive.
    pub fn file_name(&self) -> &'static str {
        SOURCE_FILE_NAME
    }

    /// Length of the packed source in bytes.
    pub fn source_len(&self) -> usize {
        self.source_len
    }
}

/// Pack `source` as `main.s` inside an in-memory tar archive.
pub fn stage(source: &[u8]) -> Result<StagedSource, CoreError> {
    let mut header = tar::Header::new_gnu();
    header.set_size(source.len() as u64);
    header.set_mode(0o644);
    header.set_mtime(chrono::Utc::now().timestamp().max(0) as u64);
    header.set_entry_type(tar::EntryType::Regular);

    let mut builder = tar::Builder::new(Vec::with_capacity(source.len() + 1024));
    builder
        .append_data(&mut header, SOURCE_FILE_NAME, source)
        .map_err(CoreError::Staging)?;
    let archive = builder.into_inner().map_err(CoreError::Staging)?;

    tracing::trace!(
        source_len = source.len(),
        archive_len = archive.len(),
        "Source staged"
    );

    Ok(StagedSource {
        archive: Bytes::from(archive),
        source_len: source.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn entries(staged: &StagedSource) -> Vec<(String, u32, Vec<u8>)> {
        let bytes = staged.archive();
        let mut archive = tar::Archive::new(&bytes[..]);
        archive
            .entries()
            .expect("readable archive")
            .map(|entry| {
                let mut entry = entry.expect("valid entry");
                let path = entry.path().expect("path").display().to_string();
                let mode = entry.header().mode().expect("mode");
                let mut content = Vec::new();
                entry.read_to_end(&mut content).expect("content");
                (path, mode, content)
            })
            .collect()
    }

    #[test]
    fn test_stage_single_entry() {
        let source = b"section .text\nglobal _start\n_start:\n";
        let staged = stage(source).expect("staging should succeed");

        let entries = entries(&staged);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, "main.s");
        assert_eq!(entries[0].1, 0o644);
        assert_eq!(entries[0].2, source);
        assert_eq!(staged.source_len(), source.len());
        assert_eq!(staged.file_name(), SOURCE_FILE_NAME);
    }

    #[test]
    fn test_stage_binary_content_is_preserved() {
        let source: Vec<u8> = (0..=255u8).cycle().take(3000).collect();
        let staged = stage(&source).expect("staging should succeed");
        assert_eq!(entries(&staged)[0].2, source);
    }

    #[test]
    fn test_stage_empty_source() {
        let staged = stage(b"").expect("staging should succeed");
        let entries = entries(&staged);
        assert_eq!(entries.len(), 1);
        assert!(entries[0].2.is_empty());
    }
}
