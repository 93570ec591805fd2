use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::naming::{collapse_whitespace, slugify_name};
use crate::xml::Element;

static TRAILING_DIGITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)$").expect("trailing digits pattern is valid"));

/// Caption data for one figure, table or supplementary material, joined to
/// resources by id or href.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CaptionEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    /// Only figures expose their id as an alternate name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alternate_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
}

impl CaptionEntry {
    /// Whether `resource_name` (already slugified) refers to this entry.
    pub fn matches(&self, resource_name: &str) -> bool {
        [self.id.as_deref(), self.href.as_deref()]
            .into_iter()
            .flatten()
            .any(|value| value == resource_name || slugify_name(value) == resource_name)
    }

    /// `label. caption`, or the caption alone.
    pub fn display_caption(&self) -> Option<String> {
        let caption = self.caption.as_deref()?;
        Some(match self.label.as_deref() {
            Some(label) => format!("{label}. {caption}"),
            None => caption.to_string(),
        })
    }
}

pub fn find_captions(document: &Element) -> Vec<CaptionEntry> {
    let mut entries = Vec::new();
    for fig in document.descendants("fig") {
        let mut entry = entry_for(fig, "graphic", false);
        entry.alternate_name = entry.id.clone();
        entries.push(entry);
    }
    for table in document.descendants("table-wrap") {
        entries.push(entry_for(table, "graphic", true));
    }
    for material in document.descendants("supplementary-material") {
        entries.push(entry_for(material, "media", false));
    }
    entries
}

fn entry_for(el: &Element, media_tag: &str, title_fallback: bool) -> CaptionEntry {
    let label = el
        .first_descendant("label")
        .map(|label| collapse_whitespace(&label.text()))
        .filter(|label| !label.is_empty());
    let index = label.as_deref().and_then(|label| {
        TRAILING_DIGITS
            .captures(label)
            .and_then(|caps| caps[1].parse().ok())
    });
    let mut caption = el.first_descendant("caption").map(|caption| caption.text());
    if caption.is_none() && title_fallback {
        caption = el.first_descendant("title").map(|title| title.text());
    }
    CaptionEntry {
        id: el.attr("id").map(str::to_string),
        href: el
            .first_descendant(media_tag)
            .and_then(|media| media.attr("xlink:href"))
            .map(str::to_string),
        label,
        caption: caption
            .map(|caption| collapse_whitespace(&caption))
            .filter(|caption| !caption.is_empty()),
        alternate_name: None,
        index,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::parse;

    const BODY: &str = r#"<body>
  <fig id="pone-0012345-g001" position="float">
    <label>Figure 1</label>
    <caption><title>Growth curves.</title>
      <p>Mean of three
         replicates.</p></caption>
    <graphic xlink:href="pone.0012345.g001"/>
  </fig>
  <table-wrap id="tab1"><label>Table 2</label><title>Primers used</title></table-wrap>
  <supplementary-material id="s1"><label>Dataset S1</label>
    <media xlink:href="pone.0012345.s001.xls"><caption><p>Raw counts</p></caption></media>
  </supplementary-material>
</body>"#;

    #[test]
    fn figures_tables_and_supplements() {
        let doc = parse(BODY).unwrap();
        let entries = find_captions(&doc);
        assert_eq!(entries.len(), 3);

        let fig = &entries[0];
        assert_eq!(fig.index, Some(1));
        assert_eq!(fig.alternate_name.as_deref(), Some("pone-0012345-g001"));
        assert_eq!(
            fig.display_caption().as_deref(),
            Some("Figure 1. Growth curves. Mean of three replicates.")
        );
        assert!(fig.matches("pone-0012345-g001"));

        assert_eq!(entries[1].caption.as_deref(), Some("Primers used"));
        assert_eq!(entries[1].alternate_name, None);
        assert!(entries[2].matches("pone-0012345-s001-xls"));
        assert!(!entries[2].matches("pone-0012345-s001"));
    }
}
