//! Fixtures shared by the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io::{self, Cursor, Read, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use flate2::write::GzEncoder;
use flate2::Compression;
use sha2::{Digest, Sha256};
use tracing_subscriber::fmt::MakeWriter;

use scanner_bootstrap::{
    ArtifactKind, ArtifactMetadata, Platform, ProvisioningError, ProvisioningResult,
    ProvisioningServer,
};

// ============================================================================
// Archives
// ============================================================================

/// Build a `.tar.gz` from `(path, contents, mode)` file entries.
pub fn tar_gz(files: &[(&str, &[u8], u32)]) -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    for (path, contents, mode) in files {
        let mut header = tar::Header::new_gnu();
        header.set_path(path).unwrap();
        header.set_size(contents.len() as u64);
        header.set_mode(*mode);
        header.set_entry_type(tar::EntryType::Regular);
        header.set_cksum();
        builder.append(&header, *contents).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

/// Build a `.tar.gz` holding one file under a raw, unvalidated name.
pub fn tar_gz_with_raw_name(name: &str, contents: &[u8]) -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    let mut header = tar::Header::new_gnu();
    header.as_old_mut().name[..name.len()].copy_from_slice(name.as_bytes());
    header.set_size(contents.len() as u64);
    header.set_mode(0o644);
    header.set_entry_type(tar::EntryType::Regular);
    header.set_cksum();
    builder.append(&header, contents).unwrap();
    builder.into_inner().unwrap().finish().unwrap()
}

/// Build a `.zip` from `(path, contents)` file entries.
pub fn zip(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();
    for (path, contents) in files {
        writer.start_file(*path, options).unwrap();
        writer.write_all(contents).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Lowercase hex SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

// ============================================================================
// Log capture
// ============================================================================

#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LogBuffer;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Run `f` under a capturing subscriber; returns its result and the log text.
pub fn capture_logs<T>(f: impl FnOnce() -> T) -> (T, String) {
    let buffer = LogBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(buffer.clone())
        .with_max_level(tracing::Level::TRACE)
        .with_ansi(false)
        .finish();

    let result = tracing::subscriber::with_default(subscriber, f);
    let logs = String::from_utf8_lossy(&buffer.0.lock().unwrap()).into_owned();
    (result, logs)
}

// ============================================================================
// Fake provisioning server
// ============================================================================

/// In-memory provisioning server serving one artifact per kind.
#[derive(Default)]
pub struct FakeServer {
    jre: Option<(ArtifactMetadata, Vec<u8>)>,
    engine: Option<(ArtifactMetadata, Vec<u8>)>,
    failures: Mutex<VecDeque<String>>,
    metadata_calls: AtomicUsize,
    download_calls: AtomicUsize,
}

impl FakeServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `archive` as the artifact of `kind`.
    pub fn serving(
        mut self,
        kind: ArtifactKind,
        filename: &str,
        executable: &str,
        archive: Vec<u8>,
    ) -> Self {
        let metadata = ArtifactMetadata {
            id: Some(format!("{}-1", kind.name())),
            filename: filename.to_string(),
            sha256: sha256_hex(&archive),
            executable_path: executable.to_string(),
            download_url: None,
        };
        match kind {
            ArtifactKind::Jre => self.jre = Some((metadata, archive)),
            ArtifactKind::Engine => self.engine = Some((metadata, archive)),
        }
        self
    }

    /// Fail the next download with `reason`.
    pub fn failing_once(self, reason: &str) -> Self {
        self.failures.lock().unwrap().push_back(reason.to_string());
        self
    }

    pub fn metadata(&self, kind: ArtifactKind) -> Option<&ArtifactMetadata> {
        self.artifact(kind).map(|(metadata, _)| metadata)
    }

    pub fn metadata_calls(&self) -> usize {
        self.metadata_calls.load(Ordering::SeqCst)
    }

    pub fn download_calls(&self) -> usize {
        self.download_calls.load(Ordering::SeqCst)
    }

    fn artifact(&self, kind: ArtifactKind) -> Option<&(ArtifactMetadata, Vec<u8>)> {
        match kind {
            ArtifactKind::Jre => self.jre.as_ref(),
            ArtifactKind::Engine => self.engine.as_ref(),
        }
    }
}

impl ProvisioningServer for FakeServer {
    fn supports_provisioning(&self, _kind: ArtifactKind) -> bool {
        true
    }

    fn fetch_metadata(
        &self,
        kind: ArtifactKind,
        _platform: &Platform,
    ) -> ProvisioningResult<Option<ArtifactMetadata>> {
        self.metadata_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.metadata(kind).cloned())
    }

    fn download(
        &self,
        kind: ArtifactKind,
        metadata: &ArtifactMetadata,
    ) -> ProvisioningResult<Box<dyn Read + Send>> {
        self.download_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = self.failures.lock().unwrap().pop_front() {
            return Err(ProvisioningError::Request {
                url: metadata.filename.clone(),
                reason,
            });
        }
        let (_, archive) = self
            .artifact(kind)
            .ok_or_else(|| ProvisioningError::NoDownloadLocation(metadata.filename.clone()))?;
        Ok(Box::new(Cursor::new(archive.clone())))
    }
}

pub fn linux_x64() -> Platform {
    Platform::new(Some("linux".to_string()), Some("x64".to_string()))
}
