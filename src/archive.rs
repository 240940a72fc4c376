use std::io::{Cursor, Write};

use zip::write::{FileOptions, ZipWriter};
use zip::CompressionMethod;

use crate::error::AppResult;

/// Name given to every multi-file download
pub const ARCHIVE_FILENAME: &str = "files.zip";

/// In-memory zip archive that entries are appended to one at a time
pub struct ArchiveBuilder {
    zip: ZipWriter<Cursor<Vec<u8>>>,
    entries: usize,
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        Self {
            zip: ZipWriter::new(Cursor::new(Vec::new())),
            entries: 0,
        }
    }

    /// Append `data` under `path`; the path is used verbatim as the entry name
    pub fn add_entry(&mut self, path: &str, data: &[u8]) -> AppResult<()> {
        let options = FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .unix_permissions(0o644);

        self.zip.start_file(path, options)?;
        self.zip.write_all(data)?;
        self.entries += 1;
        Ok(())
    }

    pub fn entry_count(&self) -> usize {
        self.entries
    }

    /// Finalize the central directory and hand back the archive bytes
    pub fn finish(mut self) -> AppResult<Vec<u8>> {
        let cursor = self.zip.finish()?;
        Ok(cursor.into_inner())
    }
}

impl Default for ArchiveBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn entries_keep_their_paths_and_bytes() {
        let mut builder = ArchiveBuilder::new();
        assert_eq!(builder.entry_count(), 0);
        builder.add_entry("a.txt", b"alpha").unwrap();
        builder.add_entry("b.txt", b"bravo bravo").unwrap();
        assert_eq!(builder.entry_count(), 2);

        let bytes = builder.finish().unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 2);

        let mut contents = String::new();
        archive
            .by_name("b.txt")
            .unwrap()
            .read_to_string(&mut contents)
            .unwrap();
        assert_eq!(contents, "bravo bravo");
    }

    #[test]
    fn empty_archive_is_still_valid() {
        let bytes = ArchiveBuilder::new().finish().unwrap();
        let archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 0);
    }
}
