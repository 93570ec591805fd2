//! PubMed annotations: MeSH descriptors, author keywords and the abstract
//! from the efetch record, merged into an assembled package.

use serde::Serialize;
use tracing::debug;

use crate::config::Endpoints;
use crate::domain::ResourceKind;
use crate::error::OapmcError;
use crate::fetch::{OaClient, efetch_url};
use crate::naming::collapse_whitespace;
use crate::package::{ArticleFields, Package};
use crate::xml::{self, Element};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotations {
    pub keyword: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abstract_text: Option<String>,
}

pub trait AnnotationSource: Send + Sync {
    fn fetch(&self, pmid: &str) -> Result<Annotations, OapmcError>;
}

pub struct PubmedAnnotations<'a, C: OaClient + ?Sized> {
    client: &'a C,
    endpoints: Endpoints,
}

impl<'a, C: OaClient + ?Sized> PubmedAnnotations<'a, C> {
    pub fn new(client: &'a C, endpoints: Endpoints) -> Self {
        Self { client, endpoints }
    }
}

impl<C: OaClient + ?Sized> AnnotationSource for PubmedAnnotations<'_, C> {
    fn fetch(&self, pmid: &str) -> Result<Annotations, OapmcError> {
        let body = self.client.get_text(&efetch_url(&self.endpoints, pmid))?;
        parse_efetch(&body)
    }
}

pub fn parse_efetch(body: &str) -> Result<Annotations, OapmcError> {
    let root = xml::parse(body)?;
    let mut annotations = Annotations::default();

    let words = root
        .descendants("DescriptorName")
        .into_iter()
        .chain(root.descendants("Keyword"))
        .map(|el| collapse_whitespace(&el.text()));
    for word in words {
        if !word.is_empty() && !annotations.keyword.contains(&word) {
            annotations.keyword.push(word);
        }
    }

    if let Some(abstract_el) = root.first_descendant("Abstract") {
        let text = abstract_el
            .children_named("AbstractText")
            .map(Element::text)
            .map(|part| collapse_whitespace(&part))
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if !text.is_empty() {
            annotations.abstract_text = Some(text);
        }
    }

    debug!(keywords = annotations.keyword.len(), "pubmed annotations parsed");
    Ok(annotations)
}

/// Unions keywords in order and fills the main article's abstract when the
/// PMC record had none.
pub fn merge_annotations(mut package: Package, annotations: Annotations, main_article: &str) -> Package {
    for word in annotations.keyword {
        if !package.keyword.contains(&word) {
            package.keyword.push(word);
        }
    }
    if let Some(text) = annotations.abstract_text {
        let main = package
            .resources_mut(ResourceKind::Article)
            .iter_mut()
            .find(|article| article.name == main_article);
        if let Some(article) = main {
            let fields = article.article.get_or_insert_with(ArticleFields::default);
            if fields.abstract_text.is_none() {
                fields.abstract_text = Some(text);
            }
        }
    }
    package
}
