//! Self-installing bundle container.
//!
//! A bundle is the installer's own executable with a zip payload appended,
//! followed by a fixed trailer:
//!
//! ```text
//! [executable image][zip payload][payload length: u64 LE]["APPINST1"]
//! ```
//!
//! The zip holds the manifest under [`MANIFEST_ENTRY`], a checksum list under
//! [`CHECKSUM_ENTRY`] and each artifact under [`DATA_PREFIX`]. Copying the
//! executable image of a bundle drops its payload, so bundles never nest.

use crate::archive::set_executable;
use crate::checksum::{format_checksum_file, parse_checksum_file, sha256_file};
use crate::error::CommonError;
use crate::manifest::{Manifest, CHECKSUM_ENTRY, DATA_PREFIX, MANIFEST_ENTRY};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Component, Path, PathBuf};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

pub const TRAILER_MAGIC: &[u8; 8] = b"APPINST1";
pub const TRAILER_LEN: u64 = 16;

/// Byte range of a payload inside an executable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadLocation {
    pub start: u64,
    pub len: u64,
}

/// Find the payload appended to `file`, if any.
pub fn locate_payload(file: &mut File) -> Result<Option<PayloadLocation>, CommonError> {
    let total = file.metadata()?.len();
    if total < TRAILER_LEN {
        return Ok(None);
    }

    let mut trailer = [0u8; TRAILER_LEN as usize];
    file.seek(SeekFrom::Start(total - TRAILER_LEN))?;
    file.read_exact(&mut trailer)?;
    if &trailer[8..] != TRAILER_MAGIC {
        return Ok(None);
    }

    let mut len_bytes = [0u8; 8];
    len_bytes.copy_from_slice(&trailer[..8]);
    let len = u64::from_le_bytes(len_bytes);
    let Some(start) = (total - TRAILER_LEN).checked_sub(len) else {
        return Err(CommonError::Archive(format!(
            "payload length {len} exceeds file size {total}"
        )));
    };
    Ok(Some(PayloadLocation { start, len }))
}

/// Length of the executable part of `path`, excluding any payload.
pub fn executable_image_len(path: &Path) -> Result<u64, CommonError> {
    let mut file = File::open(path)?;
    match locate_payload(&mut file)? {
        Some(location) => Ok(location.start),
        None => Ok(file.metadata()?.len()),
    }
}

/// Writes the zip payload of a bundle into a scratch file.
pub struct PayloadWriter {
    zip: ZipWriter<File>,
    path: PathBuf,
    sums: Vec<(String, String)>,
}

impl PayloadWriter {
    pub fn create(path: impl Into<PathBuf>) -> Result<Self, CommonError> {
        let path = path.into();
        let file = File::create(&path)?;
        Ok(Self {
            zip: ZipWriter::new(file),
            path,
            sums: Vec::new(),
        })
    }

    fn options(size: u64) -> FileOptions {
        FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .unix_permissions(0o644)
            .large_file(size >= u64::from(u32::MAX))
    }

    pub fn add_manifest(&mut self, manifest: &Manifest) -> Result<(), CommonError> {
        let yaml = manifest.to_yaml()?;
        self.zip
            .start_file(MANIFEST_ENTRY, Self::options(yaml.len() as u64))?;
        self.zip.write_all(yaml.as_bytes())?;
        Ok(())
    }

    /// Store `source` as artifact `name` and remember its checksum.
    pub fn add_artifact(&mut self, name: &str, source: &Path) -> Result<(), CommonError> {
        let size = fs::metadata(source)?.len();
        let hash = sha256_file(source)?;
        self.zip
            .start_file(Manifest::data_entry(name), Self::options(size))?;
        let mut file = File::open(source)?;
        io::copy(&mut file, &mut self.zip)?;
        self.sums.push((name.to_string(), hash));
        Ok(())
    }

    /// Write the checksum list and close the zip.
    pub fn finish(mut self) -> Result<PathBuf, CommonError> {
        let sums = format_checksum_file(
            self.sums
                .iter()
                .map(|(name, hash)| (name.as_str(), hash.as_str())),
        );
        self.zip
            .start_file(CHECKSUM_ENTRY, Self::options(sums.len() as u64))?;
        self.zip.write_all(sums.as_bytes())?;
        let mut file = self.zip.finish()?;
        file.flush()?;
        Ok(self.path)
    }
}

/// Concatenate the executable image of `executable`, the payload and the
/// trailer into `output`, then mark it executable.
pub fn assemble(executable: &Path, payload: &Path, output: &Path) -> Result<(), CommonError> {
    let image_len = executable_image_len(executable)?;
    let payload_len = fs::metadata(payload)?.len();

    let mut out = File::create(output)?;
    let mut image = File::open(executable)?.take(image_len);
    io::copy(&mut image, &mut out)?;
    let mut payload_file = File::open(payload)?;
    io::copy(&mut payload_file, &mut out)?;
    out.write_all(&payload_len.to_le_bytes())?;
    out.write_all(TRAILER_MAGIC)?;
    out.flush()?;
    drop(out);

    set_executable(output)
}

/// Read+Seek view of the payload slice of an executable.
struct PayloadSlice {
    file: File,
    location: PayloadLocation,
    pos: u64,
}

impl Read for PayloadSlice {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.location.len.saturating_sub(self.pos);
        if remaining == 0 {
            return Ok(0);
        }
        let want = buf.len().min(remaining.min(usize::MAX as u64) as usize);
        self.file
            .seek(SeekFrom::Start(self.location.start + self.pos))?;
        let read = self.file.read(&mut buf[..want])?;
        self.pos += read as u64;
        Ok(read)
    }
}

impl Seek for PayloadSlice {
    fn seek(&mut self, target: SeekFrom) -> io::Result<u64> {
        let next = match target {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::End(delta) => self.location.len.checked_add_signed(delta),
            SeekFrom::Current(delta) => self.pos.checked_add_signed(delta),
        };
        match next {
            Some(pos) => {
                self.pos = pos;
                Ok(pos)
            }
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek before start of payload",
            )),
        }
    }
}

/// An opened bundle payload.
pub struct Bundle {
    archive: ZipArchive<PayloadSlice>,
    manifest: Manifest,
}

impl std::fmt::Debug for Bundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bundle")
            .field("manifest", &self.manifest)
            .finish_non_exhaustive()
    }
}

impl Bundle {
    /// Open the payload appended to `path`. `Ok(None)` means `path` is a
    /// plain executable without a payload.
    pub fn open(path: &Path) -> Result<Option<Self>, CommonError> {
        let mut file = File::open(path)?;
        let Some(location) = locate_payload(&mut file)? else {
            return Ok(None);
        };
        let slice = PayloadSlice {
            file,
            location,
            pos: 0,
        };
        let mut archive = ZipArchive::new(slice)?;

        let manifest = {
            let mut entry = archive
                .by_name(MANIFEST_ENTRY)
                .map_err(|_| CommonError::MissingEntry(MANIFEST_ENTRY.to_string()))?;
            let mut content = Vec::new();
            entry.read_to_end(&mut content)?;
            Manifest::from_slice(&content)?
        };

        Ok(Some(Self { archive, manifest }))
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    fn checksums(&mut self) -> Result<Option<BTreeMap<String, String>>, CommonError> {
        let mut entry = match self.archive.by_name(CHECKSUM_ENTRY) {
            Ok(entry) => entry,
            Err(zip::result::ZipError::FileNotFound) => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let mut content = String::new();
        entry.read_to_string(&mut content)?;
        Ok(Some(parse_checksum_file(&content)))
    }

    /// Copy one artifact into `target_dir`, verifying it against the checksum
    /// list when the bundle carries one.
    ///
    /// Artifact names are plain file names; anything else is rejected.
    pub fn extract_artifact(
        &mut self,
        name: &str,
        target_dir: &Path,
    ) -> Result<PathBuf, CommonError> {
        let mut components = Path::new(name).components();
        if !matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        ) {
            return Err(CommonError::Archive(format!(
                "artifact name {name:?} is not a plain file name"
            )));
        }
        let expected = self.checksums()?.and_then(|sums| sums.get(name).cloned());
        let entry_name = format!("{DATA_PREFIX}{name}");
        let out_path = target_dir.join(name);
        {
            let mut entry = self
                .archive
                .by_name(&entry_name)
                .map_err(|_| CommonError::MissingEntry(entry_name.clone()))?;
            let mut out = File::create(&out_path)?;
            io::copy(&mut entry, &mut out)?;
            out.flush()?;
        }

        if let Some(expected) = expected {
            let actual = sha256_file(&out_path)?;
            if actual != expected {
                return Err(CommonError::ChecksumMismatch {
                    name: name.to_string(),
                    expected,
                    actual,
                });
            }
        }
        Ok(out_path)
    }

    /// Extract every manifest artifact, in manifest order.
    pub fn extract_all(&mut self, target_dir: &Path) -> Result<Vec<PathBuf>, CommonError> {
        fs::create_dir_all(target_dir)?;
        let files = self.manifest.files.clone();
        files
            .iter()
            .map(|name| self.extract_artifact(name, target_dir))
            .collect()
    }
}
