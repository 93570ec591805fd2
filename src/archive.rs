use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use rayon::prelude::*;
use zip::ZipArchive;

use crate::error::OapmcError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleFormat {
    TarGz,
    Zip,
    Gzip,
}

impl BundleFormat {
    pub fn detect(file_name: &str) -> Option<Self> {
        let lower = file_name.to_ascii_lowercase();
        if lower.ends_with(".tgz") || lower.ends_with(".tar.gz") {
            Some(BundleFormat::TarGz)
        } else if lower.ends_with(".zip") {
            Some(BundleFormat::Zip)
        } else if lower.ends_with(".gz") || lower.ends_with(".gzip") {
            Some(BundleFormat::Gzip)
        } else {
            None
        }
    }

    /// Name of the bundle without its archive extension (`code.tar.gz` -> `code`).
    pub fn stem<'a>(&self, file_name: &'a str) -> &'a str {
        let lower = file_name.to_ascii_lowercase();
        let suffix_len = match self {
            BundleFormat::TarGz if lower.ends_with(".tar.gz") => ".tar.gz".len(),
            BundleFormat::TarGz => ".tgz".len(),
            BundleFormat::Zip => ".zip".len(),
            BundleFormat::Gzip if lower.ends_with(".gzip") => ".gzip".len(),
            BundleFormat::Gzip => ".gz".len(),
        };
        &file_name[..file_name.len() - suffix_len]
    }

    /// Decompresses `archive` into `target_dir`.
    pub fn unpack(&self, archive: &Path, target_dir: &Path) -> Result<(), OapmcError> {
        match self {
            BundleFormat::TarGz => extract_tar_gz(archive, target_dir, 0),
            BundleFormat::Zip => extract_zip(archive, target_dir),
            BundleFormat::Gzip => {
                let file_name = archive
                    .file_name()
                    .and_then(|name| name.to_str())
                    .ok_or_else(|| {
                        OapmcError::Archive(format!("invalid bundle name {}", archive.display()))
                    })?;
                let output = target_dir.join(self.stem(file_name));
                gunzip(archive, &output)
            }
        }
    }
}

pub fn extract_zip(zip_path: &Path, target_dir: &Path) -> Result<(), OapmcError> {
    let file = fs::File::open(zip_path)
        .map_err(|err| OapmcError::Filesystem(format!("open zip {}: {err}", zip_path.display())))?;
    let mut archive =
        ZipArchive::new(file).map_err(|err| OapmcError::Archive(err.to_string()))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|err| OapmcError::Archive(err.to_string()))?;
        let entry_path = match entry.enclosed_name() {
            Some(path) => target_dir.join(path),
            None => {
                return Err(OapmcError::Archive(
                    "zip entry path traversal detected".to_string(),
                ));
            }
        };

        if entry.is_dir() {
            fs::create_dir_all(&entry_path)
                .map_err(|err| OapmcError::Filesystem(err.to_string()))?;
            continue;
        }

        if let Some(parent) = entry_path.parent() {
            fs::create_dir_all(parent).map_err(|err| OapmcError::Filesystem(err.to_string()))?;
        }
        let mut outfile = fs::File::create(&entry_path)
            .map_err(|err| OapmcError::Filesystem(err.to_string()))?;
        io::copy(&mut entry, &mut outfile).map_err(|err| OapmcError::Archive(err.to_string()))?;
    }
    Ok(())
}

/// Extracts a gzip-compressed tarball, dropping the first `strip_components`
/// path components of every entry (entries left empty are skipped).
pub fn extract_tar_gz(
    archive_path: &Path,
    target_dir: &Path,
    strip_components: usize,
) -> Result<(), OapmcError> {
    let file = fs::File::open(archive_path).map_err(|err| {
        OapmcError::Filesystem(format!("open tarball {}: {err}", archive_path.display()))
    })?;
    let mut archive = tar::Archive::new(GzDecoder::new(file));
    fs::create_dir_all(target_dir).map_err(|err| OapmcError::Filesystem(err.to_string()))?;

    let entries = archive
        .entries()
        .map_err(|err| OapmcError::Archive(err.to_string()))?;
    for entry in entries {
        let mut entry = entry.map_err(|err| OapmcError::Archive(err.to_string()))?;
        let path = entry
            .path()
            .map_err(|err| OapmcError::Archive(err.to_string()))?
            .into_owned();

        let mut relative = PathBuf::new();
        for component in path.components().skip(strip_components) {
            match component {
                Component::Normal(part) => relative.push(part),
                Component::CurDir => {}
                _ => {
                    return Err(OapmcError::Archive(
                        "tar entry path traversal detected".to_string(),
                    ));
                }
            }
        }
        if relative.as_os_str().is_empty() {
            continue;
        }

        let destination = target_dir.join(&relative);
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).map_err(|err| OapmcError::Filesystem(err.to_string()))?;
        }
        entry
            .unpack(&destination)
            .map_err(|err| OapmcError::Archive(err.to_string()))?;
    }
    Ok(())
}

pub fn gunzip(source: &Path, destination: &Path) -> Result<(), OapmcError> {
    let file = fs::File::open(source).map_err(|err| {
        OapmcError::Filesystem(format!("open gzip {}: {err}", source.display()))
    })?;
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent).map_err(|err| OapmcError::Filesystem(err.to_string()))?;
    }
    let mut decoder = GzDecoder::new(file);
    let mut output =
        fs::File::create(destination).map_err(|err| OapmcError::Filesystem(err.to_string()))?;
    io::copy(&mut decoder, &mut output).map_err(|err| OapmcError::Archive(err.to_string()))?;
    Ok(())
}

/// Every regular file below `root`, sorted.
pub fn walk_files(root: &Path) -> Result<Vec<PathBuf>, OapmcError> {
    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(path) = stack.pop() {
        let entries = fs::read_dir(&path).map_err(|err| OapmcError::Filesystem(err.to_string()))?;
        for entry in entries {
            let entry = entry.map_err(|err| OapmcError::Filesystem(err.to_string()))?;
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else {
                files.push(path);
            }
        }
    }
    files.sort();
    Ok(files)
}

/// Copies every file into `root` under its basename. Basenames are assumed
/// unique within one bundle, so the copies never share a destination.
pub fn copy_flat(files: &[PathBuf], root: &Path) -> Result<Vec<PathBuf>, OapmcError> {
    fs::create_dir_all(root).map_err(|err| OapmcError::Filesystem(err.to_string()))?;
    files
        .par_iter()
        .map(|file| {
            let name = file.file_name().ok_or_else(|| {
                OapmcError::Filesystem(format!("invalid file name {}", file.display()))
            })?;
            let destination = root.join(name);
            fs::copy(file, &destination).map_err(|err| {
                OapmcError::Filesystem(format!("copy {}: {err}", file.display()))
            })?;
            Ok(destination)
        })
        .collect()
}
