//! Publisher-specific heuristics. Each helper encodes one naming or markup
//! convention observed in PMC bundles and JATS documents; none of them is a
//! general rule, so they stay small and pure.

use std::sync::LazyLock;

use regex::Regex;

use crate::domain::JournalFamily;
use crate::naming::collapse_whitespace;

static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("tag pattern is valid"));

/// Prefix PLOS puts in front of every article-level doi suffix.
const PUBLISHER_NAMESPACE: &str = "journal.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentLabel {
    Doi,
    Pmid,
}

/// Citation comments of the form `<comment>doi:<ext-link>10.1/x</ext-link></comment>`
/// carry the identifier in the link and the kind in the leading text.
pub fn sniff_comment_label(leading_text: &str) -> Option<CommentLabel> {
    match leading_text.trim().to_ascii_lowercase().as_str() {
        "doi:" => Some(CommentLabel::Doi),
        "pmid:" => Some(CommentLabel::Pmid),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuperscriptAffiliation {
    pub marker: String,
    pub description: String,
}

/// Splits an `<aff>` written as one run of text with `<sup>` markers
/// (`<sup>1</sup>Dept A, <sup>2</sup>Dept B, and <sup>3</sup>Dept C`) into one
/// entry per marker. Trailing separators (`,` and `and`) are dropped.
pub fn split_superscript_affiliations(markup: &str) -> Vec<SuperscriptAffiliation> {
    let pieces: Vec<&str> = markup.split("</sup>").collect();
    let mut output = Vec::new();
    for idx in 1..pieces.len() {
        let previous = pieces[idx - 1];
        let marker = previous
            .rfind("<sup>")
            .map(|pos| &previous[pos + "<sup>".len()..])
            .unwrap_or("");
        let marker = strip_tags(marker).trim().to_string();

        let mut description = pieces[idx];
        if let Some(pos) = description.find("<sup>") {
            description = &description[..pos];
        }
        let mut description = collapse_whitespace(&strip_tags(description));
        loop {
            let trimmed = description.trim_end();
            if let Some(rest) = trimmed.strip_suffix(',') {
                description = rest.to_string();
            } else if trimmed == "and" {
                description.clear();
            } else if let Some(rest) = trimmed.strip_suffix(" and") {
                description = rest.to_string();
            } else {
                description = trimmed.to_string();
                break;
            }
        }
        if description.is_empty() {
            continue;
        }
        output.push(SuperscriptAffiliation {
            marker,
            description,
        });
    }
    output
}

pub fn strip_tags(markup: &str) -> String {
    TAG.replace_all(markup, "").into_owned()
}

/// Bundle file of an inline formula rendering (`pcbi.1000960.e001.jpg`): a
/// family file whose item segment starts with `e`.
pub fn is_inline_formula_file(file_name: &str) -> bool {
    if JournalFamily::from_file_name(file_name).is_none() {
        return false;
    }
    let segments: Vec<&str> = file_name.split('.').collect();
    segments.len() >= 2 && segments[segments.len() - 2].starts_with('e')
}

/// Same convention on a slugified resource name (`pcbi-1000960-e001`).
pub fn is_inline_formula_resource(name: &str) -> bool {
    JournalFamily::from_resource_name(name).is_some()
        && name.rsplit('-').next().is_some_and(|seg| seg.starts_with('e'))
}

/// Family figures have their own doi: the article doi plus the item segment.
pub fn figure_doi(article_doi: &str, resource_name: &str) -> Option<String> {
    JournalFamily::from_resource_name(resource_name)?;
    let item = resource_name.rsplit('-').next()?;
    Some(format!("{article_doi}.{item}"))
}

pub fn strip_publisher_namespace(name: &str) -> &str {
    name.strip_prefix(PUBLISHER_NAMESPACE).unwrap_or(name)
}
