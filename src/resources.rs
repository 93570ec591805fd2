//! Typed resource stubs built from local files and validated remote urls.

use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::ResourceKind;
use crate::error::OapmcError;
use crate::naming::{extension, file_stem};
use crate::package::{Encoding, Package, Resource};

const CODE_EXTENSIONS: &[&str] = &[
    "c", "cc", "cpp", "h", "hpp", "java", "js", "jl", "m", "pl", "py", "r", "rb", "rs", "sh",
    "go", "f", "f90", "ipynb", "sas",
];

/// Resources grouped by kind, in package key order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceSet {
    pub dataset: Vec<Resource>,
    pub code: Vec<Resource>,
    pub figure: Vec<Resource>,
    pub audio: Vec<Resource>,
    pub video: Vec<Resource>,
    pub article: Vec<Resource>,
}

impl ResourceSet {
    pub fn get(&self, kind: ResourceKind) -> &[Resource] {
        match kind {
            ResourceKind::Dataset => &self.dataset,
            ResourceKind::Code => &self.code,
            ResourceKind::Figure => &self.figure,
            ResourceKind::Audio => &self.audio,
            ResourceKind::Video => &self.video,
            ResourceKind::Article => &self.article,
        }
    }

    pub fn get_mut(&mut self, kind: ResourceKind) -> &mut Vec<Resource> {
        match kind {
            ResourceKind::Dataset => &mut self.dataset,
            ResourceKind::Code => &mut self.code,
            ResourceKind::Figure => &mut self.figure,
            ResourceKind::Audio => &mut self.audio,
            ResourceKind::Video => &mut self.video,
            ResourceKind::Article => &mut self.article,
        }
    }

    pub fn push(&mut self, resource: Resource) {
        self.get_mut(resource.kind()).push(resource);
    }

    pub fn len(&self) -> usize {
        ResourceKind::ALL.iter().map(|kind| self.get(*kind).len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Default)]
pub struct PathOptions {
    /// Stems of archives unpacked from the bundle; their directories are code.
    pub code_bundles: Vec<String>,
}

/// A remote url together with the bundle file it was synthesized from; the
/// origin decides the resource kind because the url itself has no extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCandidate {
    pub url: String,
    pub origin: String,
}

pub fn classify_file_name(file_name: &str) -> ResourceKind {
    let Some(ext) = extension(file_name) else {
        return ResourceKind::Dataset;
    };
    if ext == "pdf" {
        return ResourceKind::Article;
    }
    if CODE_EXTENSIONS.contains(&ext.as_str()) {
        return ResourceKind::Code;
    }
    if ext == "eps" {
        return ResourceKind::Figure;
    }
    match mime_guess::from_ext(&ext).first_raw() {
        Some(mime) if mime.starts_with("image/") => ResourceKind::Figure,
        Some(mime) if mime.starts_with("audio/") => ResourceKind::Audio,
        Some(mime) if mime.starts_with("video/") => ResourceKind::Video,
        _ => ResourceKind::Dataset,
    }
}

/// Local files and unpacked bundle directories under `root` as typed resources.
pub fn paths_to_resources(
    root: &Path,
    paths: &[PathBuf],
    options: &PathOptions,
) -> Result<ResourceSet, OapmcError> {
    let mut set = ResourceSet::default();
    for path in paths {
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| OapmcError::Filesystem(format!("invalid file name {}", path.display())))?;
        let relative = relative_content_path(root, path);
        let metadata =
            fs::metadata(path).map_err(|err| OapmcError::Filesystem(format!("{}: {err}", path.display())))?;

        if metadata.is_dir() {
            let kind = if options.code_bundles.iter().any(|stem| stem == file_name) {
                ResourceKind::Code
            } else {
                ResourceKind::Dataset
            };
            let encoding = Encoding {
                content_path: Some(relative),
                encoding_format: Some("inode/directory".to_string()),
                ..Encoding::default()
            };
            set.push(Resource::new(kind, file_name, vec![encoding]));
            continue;
        }

        let kind = if options.code_bundles.iter().any(|stem| stem == file_name) {
            ResourceKind::Code
        } else {
            classify_file_name(file_name)
        };
        let encoding = Encoding {
            content_path: Some(relative),
            encoding_format: mime_guess::from_path(file_name)
                .first_raw()
                .map(str::to_string),
            content_size: Some(metadata.len()),
            ..Encoding::default()
        };
        set.push(Resource::new(kind, file_stem(file_name), vec![encoding]));
    }
    Ok(set)
}

/// Validated remote candidates as typed resources, provisionally named after
/// the last path segment of their url.
pub fn urls_to_resources(candidates: &[RemoteCandidate]) -> ResourceSet {
    let mut set = ResourceSet::default();
    for candidate in candidates {
        let path = candidate.url.split('?').next().unwrap_or(&candidate.url);
        let name = path.rsplit('/').next().unwrap_or(path);
        let mut encoding = Encoding::remote(candidate.url.clone());
        // Alternate renditions (largerimage, powerpoint) are re-encoded by the publisher.
        if name.starts_with("fetch") {
            encoding.encoding_format = mime_guess::from_path(&candidate.origin)
                .first_raw()
                .map(str::to_string);
        }
        set.push(Resource::new(
            classify_file_name(&candidate.origin),
            name,
            vec![encoding],
        ));
    }
    set
}

pub fn add_resources(mut package: Package, resources: ResourceSet) -> Package {
    for kind in ResourceKind::ALL {
        let mut incoming = resources.get(kind).to_vec();
        package.resources_mut(kind).append(&mut incoming);
    }
    package
}

fn relative_content_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|part| part.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_by_extension() {
        assert_eq!(classify_file_name("pone.0012345.g001.tif"), ResourceKind::Figure);
        assert_eq!(classify_file_name("pone.0012345.pdf"), ResourceKind::Article);
        assert_eq!(classify_file_name("pone.0012345.nxml"), ResourceKind::Dataset);
        assert_eq!(classify_file_name("analysis.R"), ResourceKind::Code);
        assert_eq!(classify_file_name("movie.s004.mov"), ResourceKind::Video);
        assert_eq!(classify_file_name("call.s005.mp3"), ResourceKind::Audio);
        assert_eq!(classify_file_name("license"), ResourceKind::Dataset);
    }

    #[test]
    fn remote_names_come_from_the_url_path() {
        let set = urls_to_resources(&[
            RemoteCandidate {
                url: "http://www.plosone.org/article/fetchSingleRepresentation.action?uri=info:doi/10.1371/journal.pone.0012345.s001".to_string(),
                origin: "pone.0012345.s001.xls".to_string(),
            },
            RemoteCandidate {
                url: "http://www.plosone.org/article/info:doi/10.1371/journal.pone.0012345.g001/largerimage".to_string(),
                origin: "pone.0012345.g001.tif".to_string(),
            },
        ]);
        assert_eq!(set.dataset[0].name, "fetchSingleRepresentation.action");
        assert_eq!(set.figure[0].name, "largerimage");
    }
}
