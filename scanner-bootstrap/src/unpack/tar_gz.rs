//! Gzip-compressed tarball unpacking.
//!
//! Regular files, directories, symbolic links and hard links are restored.
//! Link targets go through the same containment check as entry paths, no
//! entry is written through a link restored earlier, and every link must
//! resolve inside the target once the archive is fully unpacked.
//! File permissions recorded in the archive are restored on a best-effort
//! basis: a failure is logged and extraction carries on.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;

use super::{
    create_dir_all, normalize_entry, ArchiveFormat, ReadSeek, UnpackError, UnpackResult, Unpacker,
};

/// Unpacker for `.tar.gz` and `.tgz` archives.
#[derive(Debug, Default, Clone, Copy)]
pub struct TarGzUnpacker;

fn malformed(e: impl ToString) -> UnpackError {
    UnpackError::Malformed {
        format: ArchiveFormat::TarGz,
        reason: e.to_string(),
    }
}

impl Unpacker for TarGzUnpacker {
    fn format(&self) -> ArchiveFormat {
        ArchiveFormat::TarGz
    }

    fn unpack(&self, archive: &mut dyn ReadSeek, target: &Path) -> UnpackResult<usize> {
        create_dir_all(target)?;

        let mut archive = tar::Archive::new(GzDecoder::new(archive));
        let mut files = 0;
        let mut links = Vec::new();

        for entry in archive.entries().map_err(malformed)? {
            let mut entry = entry.map_err(malformed)?;
            let entry_path = entry.path().map_err(malformed)?.into_owned();
            let relative = normalize_entry(&entry_path)
                .ok_or_else(|| UnpackError::traversal(&entry_path, target))?;
            let path = target.join(&relative);
            let entry_type = entry.header().entry_type();

            // Nothing is ever written through a link restored earlier
            reject_symlinks_on_path(target, &relative, &entry_path)?;

            if entry_type.is_dir() {
                create_dir_all(&path)?;
                continue;
            }

            if relative.as_os_str().is_empty() {
                return Err(UnpackError::traversal(&entry_path, target));
            }

            if entry_type.is_file() {
                write_file(&mut entry, &path)?;
                restore_permissions(&path, entry.header().mode());
                files += 1;
            } else if entry_type.is_symlink() {
                let link_target = link_name(&entry)?;
                if unpack_symlink(target, &relative, &link_target, &path)? {
                    links.push(relative);
                }
            } else if entry_type.is_hard_link() {
                let link_target = link_name(&entry)?;
                unpack_hard_link(target, &link_target, &path)?;
                files += 1;
            } else {
                tracing::debug!(
                    entry = %entry_path.display(),
                    kind = ?entry_type,
                    "Skipping unsupported tar entry"
                );
            }
        }

        verify_links(target, &links)?;

        tracing::debug!(target = %target.display(), files, "Unpacked tar.gz archive");
        Ok(files)
    }
}

fn link_name<R: Read>(entry: &tar::Entry<'_, R>) -> UnpackResult<PathBuf> {
    entry
        .link_name()
        .map_err(malformed)?
        .map(|name| name.into_owned())
        .ok_or_else(|| malformed("link entry without a target"))
}

/// Fail if any prefix of `relative` below `target` is a symbolic link.
fn reject_symlinks_on_path(target: &Path, relative: &Path, entry: &Path) -> UnpackResult<()> {
    let mut current = target.to_path_buf();
    for component in relative.components() {
        current.push(component);
        match fs::symlink_metadata(&current) {
            Ok(metadata) if metadata.file_type().is_symlink() => {
                return Err(UnpackError::traversal(entry, target));
            }
            Ok(_) => {}
            // Nothing exists below a missing component
            Err(_) => break,
        }
    }
    Ok(())
}

fn write_file(contents: &mut impl Read, path: &Path) -> UnpackResult<()> {
    if let Some(parent) = path.parent() {
        create_dir_all(parent)?;
    }

    let mut output = File::create(path).map_err(|e| UnpackError::io(path, e))?;
    io::copy(contents, &mut output).map_err(|e| UnpackError::io(path, e))?;
    Ok(())
}

/// Restore a symbolic link whose target must stay inside `target`.
///
/// Returns whether a link was created on disk.
fn unpack_symlink(
    target: &Path,
    relative: &Path,
    link_target: &Path,
    path: &Path,
) -> UnpackResult<bool> {
    // Link targets are relative to the directory holding the link
    let base = relative.parent().unwrap_or_else(|| Path::new(""));
    if normalize_entry(&base.join(link_target)).is_none() {
        return Err(UnpackError::traversal(link_target, target));
    }

    if let Some(parent) = path.parent() {
        create_dir_all(parent)?;
    }

    create_symlink(link_target, path).map_err(|e| UnpackError::io(path, e))
}

/// Restore a hard link by copying the already-extracted source file.
fn unpack_hard_link(target: &Path, link_target: &Path, path: &Path) -> UnpackResult<()> {
    let relative = normalize_entry(link_target)
        .ok_or_else(|| UnpackError::traversal(link_target, target))?;

    // fs::copy follows links, so none may sit on the source path
    reject_symlinks_on_path(target, &relative, link_target)?;
    let source = target.join(&relative);

    if let Some(parent) = path.parent() {
        create_dir_all(parent)?;
    }

    fs::copy(&source, path).map_err(|e| UnpackError::io(path, e))?;
    Ok(())
}

/// Check that every restored link resolves inside `target`.
///
/// Lexical checks cannot see links chained through other links (`a -> .`,
/// `b -> a/..`), so the final tree is resolved on disk. Dangling links are
/// removed.
fn verify_links(target: &Path, links: &[PathBuf]) -> UnpackResult<()> {
    if links.is_empty() {
        return Ok(());
    }

    let root = fs::canonicalize(target).map_err(|e| UnpackError::io(target, e))?;
    for relative in links {
        let link = target.join(relative);
        match fs::canonicalize(&link) {
            Ok(resolved) if resolved.starts_with(&root) => {}
            Ok(_) => return Err(UnpackError::traversal(relative, target)),
            Err(e) => {
                tracing::debug!(link = %link.display(), error = %e, "Removing dangling symbolic link");
                fs::remove_file(&link).map_err(|e| UnpackError::io(&link, e))?;
            }
        }
    }
    Ok(())
}

#[cfg(unix)]
fn create_symlink(original: &Path, link: &Path) -> io::Result<bool> {
    std::os::unix::fs::symlink(original, link).map(|()| true)
}

#[cfg(not(unix))]
fn create_symlink(original: &Path, link: &Path) -> io::Result<bool> {
    tracing::debug!(
        link = %link.display(),
        original = %original.display(),
        "Symbolic links are not restored on this platform"
    );
    Ok(false)
}

#[cfg(unix)]
fn restore_permissions(path: &Path, mode: io::Result<u32>) {
    use std::os::unix::fs::PermissionsExt;

    let result =
        mode.and_then(|mode| fs::set_permissions(path, fs::Permissions::from_mode(mode & 0o7777)));
    if let Err(e) = result {
        tracing::warn!(path = %path.display(), error = %e, "Failed to restore file permissions");
    }
}

#[cfg(not(unix))]
fn restore_permissions(_path: &Path, _mode: io::Result<u32>) {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use proptest::prelude::*;
    use std::collections::BTreeMap;
    use std::io::Cursor;
    use tempfile::TempDir;

    #[test]
    fn test_unpack_files() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("out");
        let bytes = test_support::tar_gz(&[
            ("jdk/bin/java", b"#!java", 0o755),
            ("jdk/release", b"JAVA_VERSION=17", 0o644),
        ]);

        let files = TarGzUnpacker
            .unpack(&mut Cursor::new(bytes), &target)
            .unwrap();

        assert_eq!(files, 2);
        assert_eq!(fs::read(target.join("jdk/bin/java")).unwrap(), b"#!java");
        assert_eq!(
            fs::read_to_string(target.join("jdk/release")).unwrap(),
            "JAVA_VERSION=17"
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_restores_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let target = temp.path().join("out");
        let bytes = test_support::tar_gz(&[("bin/java", b"#!java", 0o755)]);

        TarGzUnpacker
            .unpack(&mut Cursor::new(bytes), &target)
            .unwrap();

        let mode = fs::metadata(target.join("bin/java"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[cfg(unix)]
    #[test]
    fn test_unpack_links() {
        let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));

        let mut header = tar::Header::new_gnu();
        header.set_path("jdk/legal/java.base/LICENSE").unwrap();
        header.set_size(7);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append(&header, &b"license"[..]).unwrap();

        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Symlink);
        header.set_size(0);
        header.set_mode(0o777);
        builder
            .append_link(&mut header, "jdk/legal/java.sql/LICENSE", "../java.base/LICENSE")
            .unwrap();

        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Link);
        header.set_size(0);
        header.set_mode(0o644);
        builder
            .append_link(&mut header, "jdk/COPY", "jdk/legal/java.base/LICENSE")
            .unwrap();

        let bytes = builder.into_inner().unwrap().finish().unwrap();

        let temp = TempDir::new().unwrap();
        let target = temp.path().join("out");
        TarGzUnpacker
            .unpack(&mut Cursor::new(bytes), &target)
            .unwrap();

        let link = target.join("jdk/legal/java.sql/LICENSE");
        assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
        assert_eq!(fs::read_to_string(&link).unwrap(), "license");
        assert_eq!(fs::read_to_string(target.join("jdk/COPY")).unwrap(), "license");
    }

    #[test]
    fn test_rejects_escaping_symlink() {
        let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Symlink);
        header.set_size(0);
        header.set_mode(0o777);
        builder
            .append_link(&mut header, "jdk/passwd", "../../../etc/passwd")
            .unwrap();
        let bytes = builder.into_inner().unwrap().finish().unwrap();

        let temp = TempDir::new().unwrap();
        let err = TarGzUnpacker
            .unpack(&mut Cursor::new(bytes), &temp.path().join("out"))
            .unwrap_err();

        assert!(err.is_path_traversal());
    }

    enum Fixture<'a> {
        File(&'a str, &'a [u8]),
        Symlink(&'a str, &'a str),
        HardLink(&'a str, &'a str),
    }

    fn archive(entries: &[Fixture<'_>]) -> Vec<u8> {
        let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
        for entry in entries {
            let mut header = tar::Header::new_gnu();
            match entry {
                Fixture::File(path, data) => {
                    header.set_size(data.len() as u64);
                    header.set_mode(0o644);
                    builder.append_data(&mut header, path, *data).unwrap();
                }
                Fixture::Symlink(path, link) | Fixture::HardLink(path, link) => {
                    let kind = match entry {
                        Fixture::Symlink(..) => tar::EntryType::Symlink,
                        _ => tar::EntryType::Link,
                    };
                    header.set_entry_type(kind);
                    header.set_size(0);
                    header.set_mode(0o777);
                    builder.append_link(&mut header, path, link).unwrap();
                }
            }
        }
        builder.into_inner().unwrap().finish().unwrap()
    }

    #[cfg(unix)]
    #[test]
    fn test_rejects_symlink_chain_escape() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("out");
        let bytes = archive(&[
            Fixture::Symlink("l", "."),
            Fixture::Symlink("l/up", ".."),
            Fixture::File("up/evil.txt", b"pwned"),
        ]);

        let err = TarGzUnpacker
            .unpack(&mut Cursor::new(bytes), &target)
            .unwrap_err();

        assert!(err.is_path_traversal());
        assert!(!temp.path().join("evil.txt").exists());
        assert!(!temp.path().join("up").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_rejects_file_written_through_symlink() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("out");
        let bytes = archive(&[
            Fixture::Symlink("d", "."),
            Fixture::File("d/x.txt", b"data"),
        ]);

        let err = TarGzUnpacker
            .unpack(&mut Cursor::new(bytes), &target)
            .unwrap_err();

        assert!(err.is_path_traversal());
        assert!(!target.join("x.txt").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_rejects_symlink_resolving_outside_through_another_link() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("out");
        let bytes = archive(&[Fixture::Symlink("a", "."), Fixture::Symlink("b", "a/..")]);

        let err = TarGzUnpacker
            .unpack(&mut Cursor::new(bytes), &target)
            .unwrap_err();

        assert!(err.is_path_traversal());
    }

    #[cfg(unix)]
    #[test]
    fn test_rejects_hard_link_through_symlink() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("out");
        fs::write(temp.path().join("secret.txt"), b"secret").unwrap();
        let bytes = archive(&[
            Fixture::Symlink("a", "."),
            Fixture::Symlink("esc", "a/.."),
            Fixture::HardLink("copy", "esc/secret.txt"),
        ]);

        let err = TarGzUnpacker
            .unpack(&mut Cursor::new(bytes), &target)
            .unwrap_err();

        assert!(err.is_path_traversal());
        assert!(!target.join("copy").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_removes_dangling_symlink() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("out");
        let bytes = archive(&[
            Fixture::File("jdk/release", b"JAVA_VERSION=17"),
            Fixture::Symlink("jdk/missing", "nowhere"),
        ]);

        let files = TarGzUnpacker
            .unpack(&mut Cursor::new(bytes), &target)
            .unwrap();

        assert_eq!(files, 1);
        assert!(fs::symlink_metadata(target.join("jdk/missing")).is_err());
    }

    #[test]
    fn test_rejects_tar_slip() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("nested").join("out");
        let bytes = test_support::tar_gz_with_raw_name("../../evil.txt", b"pwned");

        let err = TarGzUnpacker
            .unpack(&mut Cursor::new(bytes), &target)
            .unwrap_err();

        assert!(err.is_path_traversal());
        assert!(!temp.path().join("evil.txt").exists());
        assert!(!temp.path().join("nested").join("evil.txt").exists());
    }

    #[test]
    fn test_truncated_archive() {
        let temp = TempDir::new().unwrap();
        let mut bytes = test_support::tar_gz(&[("big.bin", &[7u8; 64 * 1024], 0o644)]);
        bytes.truncate(bytes.len() / 2);

        let result = TarGzUnpacker.unpack(&mut Cursor::new(bytes), &temp.path().join("out"));
        assert!(result.is_err());
    }

    #[test]
    fn test_not_gzip() {
        let temp = TempDir::new().unwrap();

        let err = TarGzUnpacker
            .unpack(
                &mut Cursor::new(b"plain text, not gzip".to_vec()),
                &temp.path().join("out"),
            )
            .unwrap_err();

        assert!(matches!(
            err,
            UnpackError::Malformed {
                format: ArchiveFormat::TarGz,
                ..
            }
        ));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn test_unpacked_files_match_archived_bytes(
            files in prop::collection::btree_map(
                "[a-z]{1,8}",
                prop::collection::vec(any::<u8>(), 0..512),
                1..8,
            ),
        ) {
            let entries: BTreeMap<String, Vec<u8>> = files
                .into_iter()
                .enumerate()
                .map(|(i, (name, data))| (format!("d{}/{}.bin", i % 3, name), data))
                .collect();
            let fixture: Vec<(&str, &[u8], u32)> = entries
                .iter()
                .map(|(path, data)| (path.as_str(), data.as_slice(), 0o644))
                .collect();
            let bytes = test_support::tar_gz(&fixture);

            let temp = TempDir::new().unwrap();
            let target = temp.path().join("out");
            let count = TarGzUnpacker.unpack(&mut Cursor::new(bytes), &target).unwrap();

            prop_assert_eq!(count, entries.len());
            for (path, data) in &entries {
                prop_assert_eq!(&fs::read(target.join(path)).unwrap(), data);
            }
        }
    }
}
