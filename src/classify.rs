//! Turns the flat bundle file list into typed, de-duplicated resources.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{debug, info};

use crate::archive::BundleFormat;
use crate::domain::{JournalFamily, ResourceKind};
use crate::error::OapmcError;
use crate::fetch::OaClient;
use crate::naming::{extension, file_stem};
use crate::package::Package;
use crate::quirks::{is_inline_formula_file, strip_publisher_namespace};
use crate::resources::{
    PathOptions, RemoteCandidate, ResourceSet, add_resources, paths_to_resources,
    urls_to_resources,
};

const ALTERNATE_RENDITIONS: &[&str] = &["powerpoint", "largerimage", "originalimage"];
const RENDERED_IMAGE_EXTENSIONS: &[&str] = &["gif", "jpg", "tif"];
const LICENSE_RESOURCE: &str = "license";

#[derive(Debug, Clone)]
pub struct ClassifyInput {
    pub root: PathBuf,
    pub files: Vec<PathBuf>,
    pub doi: Option<String>,
    /// PDF basename advertised by the open-access service.
    pub pdf_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Classified {
    pub package: Package,
    /// Unslugged name of the main article resource.
    pub main_article: Option<String>,
}

pub fn classify<C: OaClient + ?Sized>(
    client: &C,
    input: ClassifyInput,
) -> Result<Classified, OapmcError> {
    let root = input.root.as_path();
    let mut bundles = Vec::new();
    let mut plain = Vec::new();
    for file in input.files {
        match file_name(&file).and_then(BundleFormat::detect) {
            Some(format) => bundles.push((file, format)),
            None => plain.push(file),
        }
    }

    let unpacked = unpack_bundles(root, &bundles)?;
    let code_bundles: Vec<String> = unpacked
        .iter()
        .filter_map(|path| file_name(path).map(str::to_string))
        .collect();

    // Plain files keep their bundle copy; validated urls join it by name.
    // Renditions of one item (gif and jpg) share urls, checked once.
    let mut local = unpacked;
    let mut seen = HashSet::new();
    let mut candidates = Vec::new();
    for file in plain {
        let Some(name) = file_name(&file) else {
            continue;
        };
        if let Some(doi) = input.doi.as_deref() {
            for url in candidate_urls(name, doi) {
                if seen.insert(url.clone()) {
                    candidates.push(RemoteCandidate {
                        url,
                        origin: name.to_string(),
                    });
                }
            }
        }
        local.push(file);
    }

    let remote = validate_candidates(client, candidates);
    info!(local = local.len(), remote = remote.len(), "classification inputs ready");

    let local_set = paths_to_resources(root, &local, &PathOptions { code_bundles })?;
    let mut remote_set = urls_to_resources(&remote);
    rename_remote(&mut remote_set);

    let mut merged = merge_resource_sets(local_set, remote_set);
    drop_single_representations(&mut merged);
    let main_article = settle_main_article(&mut merged, input.pdf_name.as_deref());

    let mut package = Package::default();
    package.license = inline_license(root, &mut merged)?;
    let package = add_resources(package, merged);
    Ok(Classified {
        package,
        main_article,
    })
}

fn file_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(|name| name.to_str())
}

/// Decompresses every bundle next to itself in parallel, failing on the first
/// error; returns the unpacked paths.
fn unpack_bundles(
    root: &Path,
    bundles: &[(PathBuf, BundleFormat)],
) -> Result<Vec<PathBuf>, OapmcError> {
    bundles
        .par_iter()
        .map(|(path, format)| {
            let name = file_name(path)
                .ok_or_else(|| OapmcError::Archive(format!("invalid bundle {}", path.display())))?;
            let output = root.join(format.stem(name));
            let target = match format {
                BundleFormat::Gzip => root.to_path_buf(),
                _ => output.clone(),
            };
            debug!("unpacking {name}");
            format.unpack(path, &target)?;
            Ok(output)
        })
        .collect()
}

/// Publisher urls that may serve `file_name` better than the bundle copy.
/// Empty for files outside the known journal families, raw XML and inline
/// formula renderings.
pub fn candidate_urls(file_name: &str, doi: &str) -> Vec<String> {
    let Some(family) = JournalFamily::from_file_name(file_name) else {
        return Vec::new();
    };
    let ext = extension(file_name);
    if ext.as_deref() == Some("nxml") || is_inline_formula_file(file_name) {
        return Vec::new();
    }

    let base = family.article_base();
    if ext.as_deref() == Some("pdf") {
        return vec![format!(
            "{base}fetchObject.action?uri=info:doi/{doi}&representation=PDF"
        )];
    }

    let stem = file_stem(file_name);
    let item = stem.rsplit('.').next().unwrap_or(stem);
    let mut urls = vec![format!(
        "{base}fetchSingleRepresentation.action?uri=info:doi/{doi}.{item}"
    )];
    if ext
        .as_deref()
        .is_some_and(|ext| RENDERED_IMAGE_EXTENSIONS.contains(&ext))
    {
        for rendition in ALTERNATE_RENDITIONS {
            urls.push(format!("{base}info:doi/{doi}.{item}/{rendition}"));
        }
    }
    urls
}

fn validate_candidates<C: OaClient + ?Sized>(
    client: &C,
    candidates: Vec<RemoteCandidate>,
) -> Vec<RemoteCandidate> {
    candidates
        .into_par_iter()
        .filter(|candidate| {
            let ok = client.head_ok(&candidate.url);
            if !ok {
                debug!("dropping candidate {}", candidate.url);
            }
            ok
        })
        .collect()
}

/// Remote resources are provisionally named after the url basename, which
/// for these publishers names the rendition instead of the item.
pub fn rename_remote(set: &mut ResourceSet) {
    for kind in ResourceKind::ALL {
        for resource in set.get_mut(kind).iter_mut() {
            let Some(url) = resource
                .encodings()
                .first()
                .and_then(|enc| enc.content_url.clone())
            else {
                continue;
            };
            let name = remote_name(kind, &resource.name, &url);
            resource.name = strip_publisher_namespace(&name).to_string();
        }
    }
}

fn remote_name(kind: ResourceKind, provisional: &str, url: &str) -> String {
    let segment = |url: &str, from_end: usize| {
        url.rsplit('/').nth(from_end).unwrap_or(url).to_string()
    };
    match kind {
        ResourceKind::Figure | ResourceKind::Audio | ResourceKind::Video => {
            if provisional.contains("SingleRepresentation") {
                segment(url, 0)
            } else if ALTERNATE_RENDITIONS
                .iter()
                .any(|rendition| url.contains(&format!("/{rendition}")))
            {
                segment(url, 1)
            } else {
                segment(url, 0)
            }
        }
        ResourceKind::Code | ResourceKind::Dataset => {
            if provisional.contains("SingleRepresentation") {
                segment(url, 0)
            } else {
                segment(url, 1)
            }
        }
        ResourceKind::Article => match url.find("&representation=PDF") {
            Some(end) => segment(&url[..end], 0),
            None => segment(url, 0),
        },
    }
}

/// Local resources first, then remote ones; same-name entries of one kind
/// collapse into the first, accumulating encodings.
pub fn merge_resource_sets(local: ResourceSet, remote: ResourceSet) -> ResourceSet {
    let mut merged = ResourceSet::default();
    let mut remote = remote;
    let mut local = local;
    for kind in ResourceKind::ALL {
        let target = merged.get_mut(kind);
        let incoming = local
            .get_mut(kind)
            .drain(..)
            .chain(remote.get_mut(kind).drain(..))
            .collect::<Vec<_>>();
        for resource in incoming {
            match target.iter_mut().find(|known| known.name == resource.name) {
                Some(known) => {
                    let mut encodings = resource.encodings().to_vec();
                    known.encodings_mut().append(&mut encodings);
                }
                None => target.push(resource),
            }
        }
    }
    merged
}

/// A single-representation url is the weakest rendition; drop it whenever the
/// resource has another encoding.
pub fn drop_single_representations(set: &mut ResourceSet) {
    for kind in [
        ResourceKind::Figure,
        ResourceKind::Audio,
        ResourceKind::Video,
        ResourceKind::Code,
        ResourceKind::Dataset,
    ] {
        for resource in set.get_mut(kind).iter_mut() {
            let has_richer = resource
                .encodings()
                .iter()
                .any(|enc| !enc.is_single_representation());
            if has_richer {
                resource
                    .encodings_mut()
                    .retain(|enc| !enc.is_single_representation());
            }
        }
    }
}

/// With a PDF, the dataset sharing its stem is the article's own XML and is
/// dropped. Without one, the first raw-XML dataset becomes the main article.
pub fn settle_main_article(set: &mut ResourceSet, pdf_name: Option<&str>) -> Option<String> {
    if let Some(pdf) = pdf_name {
        let stem = file_stem(pdf).to_string();
        set.dataset.retain(|dataset| dataset.name != stem);
        return Some(stem);
    }

    let position = set.dataset.iter().position(|dataset| {
        dataset.encodings().iter().any(|enc| {
            enc.content_path
                .as_deref()
                .and_then(extension)
                .is_some_and(|ext| ext == "nxml" || ext == "xml")
        })
    })?;
    let promoted = set.dataset.remove(position).into_kind(ResourceKind::Article);
    let name = promoted.name.clone();
    set.article.insert(0, promoted);
    Some(name)
}

/// Reads a `license` dataset into free text, deletes its file and drops it.
pub fn inline_license(root: &Path, set: &mut ResourceSet) -> Result<Option<String>, OapmcError> {
    let Some(position) = set
        .dataset
        .iter()
        .position(|dataset| dataset.name == LICENSE_RESOURCE)
    else {
        return Ok(None);
    };
    let license = set.dataset.remove(position);
    let Some(relative) = license
        .encodings()
        .iter()
        .find_map(|enc| enc.content_path.clone())
    else {
        return Ok(None);
    };
    let path = root.join(relative);
    let text = fs::read_to_string(&path)
        .map_err(|err| OapmcError::Filesystem(format!("read {}: {err}", path.display())))?;
    fs::remove_file(&path)
        .map_err(|err| OapmcError::Filesystem(format!("remove {}: {err}", path.display())))?;
    Ok(Some(text))
}
