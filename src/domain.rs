use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::OapmcError;

static OA_URI: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^https?://www\.(?:pubmedcentral\.nih\.gov|ncbi\.nlm\.nih\.gov/pmc)/utils/oa/oa\.fcgi\?id=PMC(\d+)(?:&.*)?$",
    )
    .expect("open-access uri pattern is valid")
});

/// An open-access service uri naming exactly one PMC article.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArticleUri {
    uri: String,
    pmcid: String,
}

impl ArticleUri {
    pub fn as_str(&self) -> &str {
        &self.uri
    }

    /// Numeric part of the PMC id (`PMC3010060` -> `3010060`).
    pub fn pmcid(&self) -> &str {
        &self.pmcid
    }
}

impl fmt::Display for ArticleUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.uri)
    }
}

impl FromStr for ArticleUri {
    type Err = OapmcError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let pmcid = OA_URI
            .captures(trimmed)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| OapmcError::UnrecognizedUri(value.to_string()))?;
        Ok(Self {
            uri: trimmed.to_string(),
            pmcid,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Dataset,
    Code,
    Figure,
    Audio,
    Video,
    Article,
}

impl ResourceKind {
    /// Package key order.
    pub const ALL: [ResourceKind; 6] = [
        ResourceKind::Dataset,
        ResourceKind::Code,
        ResourceKind::Figure,
        ResourceKind::Audio,
        ResourceKind::Video,
        ResourceKind::Article,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Dataset => "dataset",
            ResourceKind::Code => "code",
            ResourceKind::Figure => "figure",
            ResourceKind::Audio => "audio",
            ResourceKind::Video => "video",
            ResourceKind::Article => "article",
        }
    }

    /// Name of the array field holding this kind's encodings.
    pub fn encoding_field(&self) -> &'static str {
        match self {
            ResourceKind::Dataset => "distribution",
            ResourceKind::Code => "targetProduct",
            ResourceKind::Figure => "figure",
            ResourceKind::Audio => "audio",
            ResourceKind::Video => "video",
            ResourceKind::Article => "encoding",
        }
    }

    pub fn schema_type(&self) -> &'static str {
        match self {
            ResourceKind::Dataset => "Dataset",
            ResourceKind::Code => "Code",
            ResourceKind::Figure => "ImageObject",
            ResourceKind::Audio => "AudioObject",
            ResourceKind::Video => "VideoObject",
            ResourceKind::Article => "ScholarlyArticle",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// PLOS journals, whose bundle files are named `<prefix>.<article>.<item>.<ext>`
/// and whose sites expose every item under an `info:doi` url.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JournalFamily {
    One,
    Biology,
    Medicine,
    Genetics,
    ComputationalBiology,
    Pathogens,
    NeglectedTropicalDiseases,
}

impl JournalFamily {
    pub const ALL: [JournalFamily; 7] = [
        JournalFamily::One,
        JournalFamily::Biology,
        JournalFamily::Medicine,
        JournalFamily::Genetics,
        JournalFamily::ComputationalBiology,
        JournalFamily::Pathogens,
        JournalFamily::NeglectedTropicalDiseases,
    ];

    pub fn prefix(&self) -> &'static str {
        match self {
            JournalFamily::One => "pone",
            JournalFamily::Biology => "pbio",
            JournalFamily::Medicine => "pmed",
            JournalFamily::Genetics => "pgen",
            JournalFamily::ComputationalBiology => "pcbi",
            JournalFamily::Pathogens => "ppat",
            JournalFamily::NeglectedTropicalDiseases => "pntd",
        }
    }

    /// Article root of the journal site, e.g. `http://www.plosone.org/article/`.
    pub fn article_base(&self) -> &'static str {
        match self {
            JournalFamily::One => "http://www.plosone.org/article/",
            JournalFamily::Biology => "http://www.plosbiology.org/article/",
            JournalFamily::Medicine => "http://www.plosmedicine.org/article/",
            JournalFamily::Genetics => "http://www.plosgenetics.org/article/",
            JournalFamily::ComputationalBiology => "http://www.ploscompbiol.org/article/",
            JournalFamily::Pathogens => "http://www.plospathogens.org/article/",
            JournalFamily::NeglectedTropicalDiseases => "http://www.plosntds.org/article/",
        }
    }

    /// Family of a bundle file name such as `pone.0012345.g001.tif`.
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        Self::with_separator(file_name, '.')
    }

    /// Family of a slugified resource name such as `pone-0012345-g001`.
    pub fn from_resource_name(name: &str) -> Option<Self> {
        Self::with_separator(name, '-')
    }

    fn with_separator(value: &str, separator: char) -> Option<Self> {
        Self::ALL.into_iter().find(|family| {
            value
                .strip_prefix(family.prefix())
                .is_some_and(|rest| rest.starts_with(separator))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn family_needs_the_separator() {
        assert_eq!(
            JournalFamily::from_file_name("pcbi.1000960.e001.jpg"),
            Some(JournalFamily::ComputationalBiology)
        );
        assert_eq!(JournalFamily::from_file_name("ponera.txt"), None);
        assert_eq!(
            JournalFamily::from_resource_name("pntd-0000001-g002"),
            Some(JournalFamily::NeglectedTropicalDiseases)
        );
        assert_eq!(JournalFamily::from_resource_name("pone.0000001"), None);
    }
}
