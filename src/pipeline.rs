use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::{Duration, Instant};

use camino::Utf8PathBuf;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::annotations::{PubmedAnnotations, merge_annotations};
use crate::assemble::{Assembled, assemble};
use crate::classify::{ClassifyInput, classify};
use crate::config::PipelineOptions;
use crate::domain::{ArticleUri, ResourceKind};
use crate::error::OapmcError;
use crate::fetch::{FetchedSources, OaClient, ResolvedArticle, fetch_sources, resolve_article};
use crate::metadata::extract_record;
use crate::package::Package;
use crate::quirks::is_inline_formula_resource;
use crate::render::{BodyRenderer, document_tree};
use crate::resources::{PathOptions, paths_to_resources};

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchResult {
    pub package: Package,
    pub package_path: String,
    pub html_path: String,
}

pub struct Pipeline<C: OaClient, R: BodyRenderer> {
    client: C,
    renderer: R,
    options: PipelineOptions,
}

impl<C: OaClient, R: BodyRenderer> Pipeline<C, R> {
    pub fn new(client: C, renderer: R, options: PipelineOptions) -> Self {
        Self {
            client,
            renderer,
            options,
        }
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Fetches, classifies, extracts and assembles the package for `uri`, and
    /// writes it to `package.jsonld` under the root.
    pub fn fetch(&self, uri: &str, sink: &dyn ProgressSink) -> Result<FetchResult, OapmcError> {
        let uri = ArticleUri::from_str(uri)?;
        let start = Instant::now();
        let root = self.options.root.clone();

        sink.event(ProgressEvent {
            message: format!("phase=Fetch; PMC{}", uri.pmcid()),
            elapsed: None,
        });
        fs::create_dir_all(&root).map_err(|err| OapmcError::Filesystem(err.to_string()))?;
        let article = resolve_article(&self.client, &self.options.endpoints, &uri)?;
        let annotations = PubmedAnnotations::new(&self.client, self.options.endpoints.clone());
        let annotations = (!self.options.no_pubmed).then_some(&annotations);
        let sources = fetch_sources(
            &self.client,
            annotations,
            &self.options.endpoints,
            &article,
            root.as_std_path(),
        )?;

        let (package, html_path) = self.process(&article, sources, Utc::now(), sink, start)?;

        let package_path = self.options.package_path();
        let json = serde_json::to_string_pretty(&package)
            .map_err(|err| OapmcError::Filesystem(err.to_string()))?;
        fs::write(&package_path, json).map_err(|err| OapmcError::Filesystem(err.to_string()))?;

        sink.event(ProgressEvent {
            message: format!("phase=Done; {}", package.name),
            elapsed: Some(start.elapsed()),
        });
        Ok(FetchResult {
            package,
            package_path: package_path.to_string(),
            html_path: html_path.to_string(),
        })
    }

    /// Every stage after the network fetches, over already fetched sources.
    pub fn process(
        &self,
        article: &ResolvedArticle,
        sources: FetchedSources,
        now: DateTime<Utc>,
        sink: &dyn ProgressSink,
        start: Instant,
    ) -> Result<(Package, Utf8PathBuf), OapmcError> {
        let root = self.options.root.as_std_path();

        sink.event(ProgressEvent {
            message: format!("phase=Classify; {} files", sources.files.len()),
            elapsed: Some(start.elapsed()),
        });
        let classified = classify(
            &self.client,
            ClassifyInput {
                root: root.to_path_buf(),
                files: sources.files,
                doi: article.doi.clone(),
                pdf_name: article.pdf_name.clone(),
            },
        )?;

        sink.event(ProgressEvent {
            message: "phase=Extract".to_string(),
            elapsed: Some(start.elapsed()),
        });
        let record = extract_record(&sources.xml)?;

        sink.event(ProgressEvent {
            message: "phase=Assemble".to_string(),
            elapsed: Some(start.elapsed()),
        });
        let Assembled {
            package,
            main_article,
        } = assemble(&record, classified, now)?;

        sink.event(ProgressEvent {
            message: "phase=Render".to_string(),
            elapsed: Some(start.elapsed()),
        });
        let html = self.renderer.render(&document_tree(&sources.xml)?, &package)?;
        let package = remove_inline_formulas(package, root)?;
        let (package, html_path) = attach_html(package, &main_article, &html, &self.options.root)?;

        let package = match sources.annotations {
            Some(annotations) => merge_annotations(package, annotations, &main_article),
            None => package,
        };
        info!(name = %package.name, "package assembled");
        Ok((package, html_path))
    }
}

/// Inline formula renderings are embedded in the html; their figure entries
/// and bundle files go away.
pub fn remove_inline_formulas(mut package: Package, root: &Path) -> Result<Package, OapmcError> {
    let (formulas, figures): (Vec<_>, Vec<_>) = package
        .figure
        .into_iter()
        .partition(|figure| is_inline_formula_resource(&figure.name));
    for formula in &formulas {
        for path in formula.encodings().iter().filter_map(|enc| enc.content_path.as_ref()) {
            let path = root.join(path);
            fs::remove_file(&path).map_err(|err| {
                OapmcError::Filesystem(format!("remove {}: {err}", path.display()))
            })?;
        }
    }
    package.figure = figures;
    Ok(package)
}

/// Writes the html next to the bundle files, as `<main name with dots>.html`,
/// and records it as an encoding of the main article.
pub fn attach_html(
    mut package: Package,
    main_article: &str,
    html: &str,
    root: &Utf8PathBuf,
) -> Result<(Package, Utf8PathBuf), OapmcError> {
    let html_path = root.join(format!("{}.html", main_article.replace('-', ".")));
    fs::write(&html_path, html).map_err(|err| OapmcError::Filesystem(err.to_string()))?;

    let mut described = paths_to_resources(
        root.as_std_path(),
        &[html_path.clone().into_std_path_buf()],
        &PathOptions::default(),
    )?;
    let encoding = described
        .dataset
        .pop()
        .and_then(|resource| resource.encodings().first().cloned())
        .ok_or_else(|| OapmcError::Render("html file was not described".to_string()))?;

    if let Some(main) = package
        .resources_mut(ResourceKind::Article)
        .iter_mut()
        .find(|article| article.name == main_article)
    {
        main.encodings_mut().push(encoding);
    }
    Ok((package, html_path))
}
