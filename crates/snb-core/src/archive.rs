use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{Error, Result};

/// What an archive or extract pass moved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub files: usize,
    pub bytes: u64,
}

/// Zip `source_dir` into `dest`, replacing any existing file there.
///
/// Entry names are paths relative to `source_dir` with `/` separators.
/// Directories get their own entries so empty ones survive a restore.
/// On failure the partially written archive is removed.
pub fn archive_dir(source_dir: &Path, dest: &Path) -> Result<ArchiveSummary> {
    if !source_dir.is_dir() {
        return Err(Error::not_found(source_dir));
    }
    let res = write_archive(source_dir, dest);
    if res.is_err() && dest.exists() {
        if let Err(e) = fs::remove_file(dest) {
            debug!("could not remove partial archive {}: {}", dest.display(), e);
        }
    }
    res
}

fn write_archive(base: &Path, dest: &Path) -> Result<ArchiveSummary> {
    let file = File::create(dest).map_err(|e| Error::io(dest, e))?;
    let mut zip = ZipWriter::new(BufWriter::new(file));
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o644);
    let mut summary = ArchiveSummary::default();
    for entry in WalkDir::new(base).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| base.to_path_buf());
            Error::io(path, io::Error::other(e.to_string()))
        })?;
        let path = entry.path();
        let Ok(rel) = path.strip_prefix(base) else {
            continue;
        };
        if rel.as_os_str().is_empty() {
            continue;
        }
        let name = entry_name(rel);
        let ft = entry.file_type();
        if ft.is_dir() {
            zip.add_directory(name, options)
                .map_err(|e| Error::io(dest, e.into()))?;
        } else if ft.is_file() {
            zip.start_file(name, options)
                .map_err(|e| Error::io(dest, e.into()))?;
            let mut src = File::open(path).map_err(|e| Error::from_io_at(path, e))?;
            summary.bytes += io::copy(&mut src, &mut zip).map_err(|e| Error::io(path, e))?;
            summary.files += 1;
        } else {
            debug!("skipping non-regular file {}", path.display());
        }
    }
    let mut out = zip.finish().map_err(|e| Error::io(dest, e.into()))?;
    out.flush().map_err(|e| Error::io(dest, e))?;
    Ok(summary)
}

fn entry_name(rel: &Path) -> String {
    rel.to_string_lossy().replace('\\', "/")
}

/// Replace `dest_dir` with the contents of `archive`.
///
/// The archive is opened and every entry name checked before anything under
/// `dest_dir` is deleted. If writing fails after that point the destination
/// may be left partially populated.
pub fn extract_archive(archive: &Path, dest_dir: &Path) -> Result<ArchiveSummary> {
    let file = File::open(archive).map_err(|e| Error::from_io_at(archive, e))?;
    let mut zip = ZipArchive::new(BufReader::new(file)).map_err(|e| Error::corrupt(archive, e))?;

    let mut entries: Vec<(PathBuf, bool)> = Vec::with_capacity(zip.len());
    for i in 0..zip.len() {
        let entry = zip.by_index(i).map_err(|e| Error::corrupt(archive, e))?;
        let rel = entry.enclosed_name().map(Path::to_path_buf).ok_or_else(|| {
            Error::corrupt(archive, format!("entry {:?} escapes the destination", entry.name()))
        })?;
        entries.push((rel, entry.is_dir()));
    }

    if dest_dir.exists() {
        fs::remove_dir_all(dest_dir).map_err(|e| Error::io(dest_dir, e))?;
    }
    fs::create_dir_all(dest_dir).map_err(|e| Error::io(dest_dir, e))?;

    let mut summary = ArchiveSummary::default();
    let mut buf = Vec::new();
    for (i, (rel, is_dir)) in entries.into_iter().enumerate() {
        let out = dest_dir.join(&rel);
        if is_dir {
            fs::create_dir_all(&out).map_err(|e| Error::io(&out, e))?;
            continue;
        }
        if let Some(parent) = out.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        buf.clear();
        let mut entry = zip.by_index(i).map_err(|e| Error::corrupt(archive, e))?;
        entry
            .read_to_end(&mut buf)
            .map_err(|e| Error::corrupt(archive, format!("{}: {}", rel.display(), e)))?;
        fs::write(&out, &buf).map_err(|e| Error::io(&out, e))?;
        summary.files += 1;
        summary.bytes += buf.len() as u64;
    }
    Ok(summary)
}
