//! The package document and its members. Field order is the serialized key order.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::domain::ResourceKind;

pub const SEED_VERSION: &str = "0.0.0";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Package {
    pub name: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_created: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub keyword: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_published: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<Person>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub contributor: Vec<Person>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub source_organisation: Vec<Organization>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<Organization>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub editor: Vec<Person>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher: Option<Organization>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub journal: Option<Organization>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub accountable_person: Vec<Agent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub copyright_holder: Option<Organization>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dataset: Vec<Resource>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub code: Vec<Resource>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub figure: Vec<Resource>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub audio: Vec<Resource>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub video: Vec<Resource>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub article: Vec<Resource>,
}

impl Default for Package {
    fn default() -> Self {
        Self {
            name: String::new(),
            version: SEED_VERSION.to_string(),
            date_created: None,
            keyword: Vec::new(),
            description: None,
            date_published: None,
            license: None,
            author: None,
            contributor: Vec::new(),
            source_organisation: Vec::new(),
            provider: None,
            editor: Vec::new(),
            publisher: None,
            journal: None,
            accountable_person: Vec::new(),
            copyright_holder: None,
            dataset: Vec::new(),
            code: Vec::new(),
            figure: Vec::new(),
            audio: Vec::new(),
            video: Vec::new(),
            article: Vec::new(),
        }
    }
}

impl Package {
    pub fn resources(&self, kind: ResourceKind) -> &[Resource] {
        match kind {
            ResourceKind::Dataset => &self.dataset,
            ResourceKind::Code => &self.code,
            ResourceKind::Figure => &self.figure,
            ResourceKind::Audio => &self.audio,
            ResourceKind::Video => &self.video,
            ResourceKind::Article => &self.article,
        }
    }

    pub fn resources_mut(&mut self, kind: ResourceKind) -> &mut Vec<Resource> {
        match kind {
            ResourceKind::Dataset => &mut self.dataset,
            ResourceKind::Code => &mut self.code,
            ResourceKind::Figure => &mut self.figure,
            ResourceKind::Audio => &mut self.audio,
            ResourceKind::Video => &mut self.video,
            ResourceKind::Article => &mut self.article,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub name: String,
    #[serde(rename = "@type", skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alternate_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_published: Option<String>,
    #[serde(flatten)]
    pub article: Option<ArticleFields>,
    #[serde(flatten)]
    pub encodings: Encodings,
}

impl Resource {
    pub fn new(kind: ResourceKind, name: impl Into<String>, encodings: Vec<Encoding>) -> Self {
        Self {
            name: name.into(),
            schema_type: None,
            alternate_name: None,
            caption: None,
            position: None,
            doi: None,
            date_published: None,
            article: None,
            encodings: Encodings {
                kind,
                items: encodings,
            },
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.encodings.kind
    }

    pub fn encodings(&self) -> &[Encoding] {
        &self.encodings.items
    }

    pub fn encodings_mut(&mut self) -> &mut Vec<Encoding> {
        &mut self.encodings.items
    }

    /// Same resource under another kind, e.g. a raw-XML dataset promoted to article.
    pub fn into_kind(mut self, kind: ResourceKind) -> Self {
        self.encodings.kind = kind;
        self
    }
}

/// Encodings of one resource, serialized under the kind-specific field name.
#[derive(Debug, Clone, PartialEq)]
pub struct Encodings {
    pub kind: ResourceKind,
    pub items: Vec<Encoding>,
}

impl Serialize for Encodings {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(self.kind.encoding_field(), &self.items)?;
        map.end()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Encoding {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoding_format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_size: Option<u64>,
}

impl Encoding {
    pub fn local(path: impl Into<String>) -> Self {
        Self {
            content_path: Some(path.into()),
            ..Self::default()
        }
    }

    pub fn remote(url: impl Into<String>) -> Self {
        Self {
            content_url: Some(url.into()),
            ..Self::default()
        }
    }

    /// PLOS `fetchSingleRepresentation` urls return one rendition only.
    pub fn is_single_representation(&self) -> bool {
        self.content_url
            .as_deref()
            .is_some_and(|url| url.contains("fetchSingleRepresentation"))
    }
}

/// Article-level metadata carried by the main article resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publication_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub journal: Option<Organization>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pmid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headline: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alternative_headline: Option<String>,
    #[serde(rename = "abstract", skip_serializing_if = "Option::is_none")]
    pub abstract_text: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub citation: Vec<Citation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_start: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_end: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_pages: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    #[serde(rename = "@type")]
    pub schema_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub affiliation: Vec<Organization>,
}

impl Person {
    pub fn new(given_name: Option<String>, family_name: Option<String>) -> Self {
        let full = [given_name.as_deref(), family_name.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");
        Self {
            schema_type: "Person".to_string(),
            name: (!full.is_empty()).then_some(full),
            given_name,
            family_name,
            email: None,
            affiliation: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    #[serde(rename = "@id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "@type", skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<PostalAddress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<PostalAddress>,
}

impl Organization {
    pub fn new(schema_type: &str) -> Self {
        Self {
            schema_type: Some(schema_type.to_string()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostalAddress {
    #[serde(rename = "@type")]
    pub schema_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address_country: Option<String>,
}

impl PostalAddress {
    pub fn new() -> Self {
        Self {
            schema_type: "PostalAddress".to_string(),
            description: None,
            address_country: None,
        }
    }
}

impl Default for PostalAddress {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Agent {
    Person(Person),
    Organization(Organization),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Citation {
    #[serde(rename = "@type")]
    pub schema_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub same_as: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pmid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub journal: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_start: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_end: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<Person>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub contributor: Vec<Person>,
}

impl Default for Citation {
    fn default() -> Self {
        Self {
            schema_type: "ScholarlyArticle".to_string(),
            name: None,
            header: None,
            description: None,
            url: None,
            same_as: None,
            doi: None,
            pmid: None,
            journal: None,
            volume: None,
            page_start: None,
            page_end: None,
            author: None,
            contributor: Vec::new(),
        }
    }
}
