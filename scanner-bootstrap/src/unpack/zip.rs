//! Zip archive unpacking.

use std::fs::File;
use std::io;
use std::path::Path;

use ::zip::ZipArchive;

use super::{
    create_dir_all, resolve_within, ArchiveFormat, ReadSeek, UnpackError, UnpackResult, Unpacker,
};

/// Unpacker for `.zip` archives.
#[derive(Debug, Default, Clone, Copy)]
pub struct ZipUnpacker;

fn malformed(e: impl ToString) -> UnpackError {
    UnpackError::Malformed {
        format: ArchiveFormat::Zip,
        reason: e.to_string(),
    }
}

impl Unpacker for ZipUnpacker {
    fn format(&self) -> ArchiveFormat {
        ArchiveFormat::Zip
    }

    fn unpack(&self, archive: &mut dyn ReadSeek, target: &Path) -> UnpackResult<usize> {
        create_dir_all(target)?;

        let mut archive = ZipArchive::new(archive).map_err(malformed)?;
        let mut files = 0;

        for index in 0..archive.len() {
            let mut entry = archive.by_index(index).map_err(malformed)?;
            let entry_name = entry.name().to_string();
            let path = resolve_within(target, Path::new(&entry_name))?;

            if entry.is_dir() {
                create_dir_all(&path)?;
                continue;
            }

            if path == target {
                return Err(UnpackError::traversal(Path::new(&entry_name), target));
            }

            // Zips often omit explicit directory entries
            if let Some(parent) = path.parent() {
                create_dir_all(parent)?;
            }

            let mut output = File::create(&path).map_err(|e| UnpackError::io(&path, e))?;
            io::copy(&mut entry, &mut output).map_err(|e| UnpackError::io(&path, e))?;
            files += 1;
        }

        tracing::debug!(target = %target.display(), files, "Unpacked zip archive");
        Ok(files)
    }
}
