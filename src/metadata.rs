//! Collect phase of the XML extraction: the OAI-PMH / JATS document is read
//! into an [`ArticleRecord`] without touching the package.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use crate::captions::{CaptionEntry, find_captions};
use crate::error::OapmcError;
use crate::naming::{collapse_whitespace, journal_short_name, leading_int};
use crate::package::{Citation, Organization, Person, PostalAddress};
use crate::quirks::{CommentLabel, sniff_comment_label, split_superscript_affiliations};
use crate::xml::{self, Element, Node, all_at, find_node_paths, first_at};

const UNKNOWN_AFFILIATION: &str = "unknown";
const ET_AL_THRESHOLD: usize = 4;

const ARTICLE_META_TAGS: &[&str] = &[
    "article-id",
    "subj-group",
    "article-title",
    "alt-title",
    "aff",
    "author-notes",
    "contrib-group",
    "pub-date",
    "volume",
    "issue",
    "fpage",
    "lpage",
    "abstract",
    "page-count",
    "copyright-year",
    "copyright-holder",
    "copyright-statement",
    "license",
    "year",
    "email",
];

/// Everything the assembler needs from the metadata document.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleRecord {
    pub date_created: Option<String>,
    pub publication_type: Option<String>,
    pub publisher: Option<Organization>,
    pub journal: Option<Organization>,
    pub journal_short_name: String,
    pub doi: Option<String>,
    pub pmid: Option<String>,
    pub keyword: Vec<String>,
    pub title: Option<String>,
    pub alt_title: Option<String>,
    pub author: Option<Person>,
    pub contributor: Vec<Person>,
    pub editor: Vec<Person>,
    pub accountable_person: Vec<Person>,
    pub source_organisation: Vec<Organization>,
    pub publication_date: Option<String>,
    pub year: Option<String>,
    pub volume: Option<i64>,
    pub issue: Option<i64>,
    pub page_start: Option<i64>,
    pub page_end: Option<i64>,
    pub copyright_year: Option<String>,
    pub copyright_holder: Option<Organization>,
    pub license: Option<String>,
    pub abstract_text: Option<String>,
    pub abstract_html: Option<String>,
    pub num_pages: Option<i64>,
    pub references: Vec<Citation>,
    pub captions: Vec<CaptionEntry>,
}

pub fn extract_record(source: &str) -> Result<ArticleRecord, OapmcError> {
    let root = xml::parse(source)?;
    let top = find_node_paths(&root, &["article", "datestamp"]);

    let mut record = ArticleRecord {
        date_created: first_at(&root, &top, "datestamp").map(Element::text),
        captions: find_captions(&root),
        ..ArticleRecord::default()
    };

    let article = if root.name == "article" {
        &root
    } else {
        first_at(&root, &top, "article")
            .ok_or_else(|| OapmcError::Xml("document has no article element".to_string()))?
    };
    record.publication_type = article
        .attr("article-type")
        .map(|kind| kind.replace('-', " "));

    let front = find_node_paths(article, &["journal-meta", "article-meta"]);
    if let Some(journal_meta) = first_at(article, &front, "journal-meta") {
        collect_journal_meta(journal_meta, &mut record);
    }
    if let Some(article_meta) = first_at(article, &front, "article-meta") {
        collect_article_meta(article_meta, source, &mut record);
    }
    if let Some(back) = article.child("back") {
        record.references = collect_references(back);
    }

    debug!(
        references = record.references.len(),
        captions = record.captions.len(),
        "metadata record collected"
    );
    Ok(record)
}

fn collect_journal_meta(journal_meta: &Element, record: &mut ArticleRecord) {
    let paths = find_node_paths(
        journal_meta,
        &["publisher-name", "publisher-loc", "journal-title", "journal-id", "issn"],
    );

    if let Some(name) = first_at(journal_meta, &paths, "publisher-name") {
        let mut publisher = Organization::new("Organization");
        publisher.name = Some(name.text());
        if let Some(loc) = first_at(journal_meta, &paths, "publisher-loc") {
            publisher.location = Some(PostalAddress {
                description: Some(collapse_whitespace(&loc.text())),
                ..PostalAddress::new()
            });
        }
        record.publisher = Some(publisher);
    }

    if let Some(title) = first_at(journal_meta, &paths, "journal-title") {
        let mut journal = Organization::new("Organization");
        journal.name = Some(collapse_whitespace(&title.text()));
        journal.issn = first_at(journal_meta, &paths, "issn").map(Element::text);
        record.journal = Some(journal);
    }

    record.journal_short_name = all_at(journal_meta, &paths, "journal-id")
        .into_iter()
        .find(|id| id.attr("journal-id-type") == Some("nlm-ta"))
        .map(|id| journal_short_name(&id.text()))
        .or_else(|| {
            record
                .journal
                .as_ref()
                .and_then(|journal| journal.name.as_deref())
                .map(journal_short_name)
        })
        .unwrap_or_default();
}

fn collect_article_meta(meta: &Element, source: &str, record: &mut ArticleRecord) {
    let paths = find_node_paths(meta, ARTICLE_META_TAGS);

    for id in all_at(meta, &paths, "article-id") {
        match id.attr("pub-id-type") {
            Some("doi") => record.doi = Some(id.text()),
            Some("pmid") => record.pmid = Some(id.text()),
            _ => {}
        }
    }

    let mut keyword = Vec::new();
    for group in all_at(meta, &paths, "subj-group") {
        keyword.extend(group.descendants("subject").into_iter().map(Element::text));
    }
    keyword.extend(meta.descendants("kwd").into_iter().map(Element::text));
    for word in keyword {
        let word = collapse_whitespace(&word);
        if !word.is_empty() && !record.keyword.contains(&word) {
            record.keyword.push(word);
        }
    }

    record.title = first_at(meta, &paths, "article-title")
        .map(|title| collapse_whitespace(&title.text()))
        .filter(|title| !title.is_empty());
    record.alt_title = first_at(meta, &paths, "alt-title")
        .map(|title| collapse_whitespace(&title.text()))
        .filter(|title| !title.is_empty());

    let affiliations = AffiliationIndex::build(&all_at(meta, &paths, "aff"), source);
    let emails = collect_emails(meta, &paths);
    let contributors = collect_contributors(&all_at(meta, &paths, "contrib-group"), &affiliations, &emails);
    record.author = contributors.author;
    record.contributor = contributors.contributor;
    record.editor = contributors.editor;
    record.accountable_person = contributors.accountable_person;
    record.source_organisation = contributors.source_organisation;

    collect_publication_date(meta, &paths, record);

    let int_at = |tag: &str| first_at(meta, &paths, tag).and_then(|el| leading_int(&el.text()));
    record.volume = int_at("volume");
    record.issue = int_at("issue");
    record.page_start = int_at("fpage");
    record.page_end = int_at("lpage");

    record.copyright_year = first_at(meta, &paths, "copyright-year").map(Element::text);
    record.copyright_holder = first_at(meta, &paths, "copyright-holder").map(|holder| {
        let mut org = Organization::new("Organization");
        org.description = Some(collapse_whitespace(&holder.text()));
        org
    });

    record.license = match first_at(meta, &paths, "license") {
        Some(license) => license
            .attr("xlink:href")
            .map(str::to_string)
            .or_else(|| Some(collapse_whitespace(&license.text())).filter(|text| !text.is_empty())),
        None => None,
    }
    .or_else(|| {
        first_at(meta, &paths, "copyright-statement").map(|st| collapse_whitespace(&st.text()))
    });

    if let Some(abstract_el) = all_at(meta, &paths, "abstract")
        .into_iter()
        .find(|el| el.attr("abstract-type").is_none())
    {
        record.abstract_text = Some(collapse_whitespace(&abstract_el.text()));
        record.abstract_html = Some(abstract_el.inner_xml(source).trim().to_string());
    }

    record.num_pages = first_at(meta, &paths, "page-count")
        .and_then(|count| count.attr("count"))
        .and_then(leading_int);
}

fn collect_publication_date(
    meta: &Element,
    paths: &HashMap<String, xml::NodePath>,
    record: &mut ArticleRecord,
) {
    let dated = all_at(meta, paths, "pub-date")
        .into_iter()
        .find(|date| date.child_text("year").is_some());
    let (year, month, day) = match dated {
        Some(date) => (
            date.child_text("year"),
            date.child_text("month"),
            date.child_text("day"),
        ),
        None => (
            first_at(meta, paths, "year").map(Element::text).filter(|y| !y.is_empty()),
            None,
            None,
        ),
    };
    let Some(year) = year else {
        return;
    };

    let month = month.and_then(|m| leading_int(&m)).unwrap_or(1);
    let day = day.and_then(|d| leading_int(&d)).unwrap_or(1);
    record.publication_date = leading_int(&year)
        .and_then(|y| NaiveDate::from_ymd_opt(y as i32, month as u32, day as u32))
        .map(|date| date.format("%Y-%m-%dT00:00:00.000Z").to_string());
    record.year = Some(year);
}

#[derive(Debug, Clone)]
struct AffiliationEntry {
    /// Superscript marker for affiliations split out of one `<aff>` run.
    marker: Option<String>,
    org: Organization,
}

/// Affiliations keyed by their document id. An `<aff>` without an id lands
/// in the sentinel bucket and then answers every cross-reference.
#[derive(Debug, Default)]
struct AffiliationIndex {
    by_id: HashMap<String, Vec<AffiliationEntry>>,
}

impl AffiliationIndex {
    fn build(affs: &[&Element], source: &str) -> Self {
        let mut by_id: HashMap<String, Vec<AffiliationEntry>> = HashMap::new();
        for aff in affs {
            let key = aff.attr("id").unwrap_or(UNKNOWN_AFFILIATION).to_string();
            by_id.insert(key, affiliation_entries(aff, source));
        }
        Self { by_id }
    }

    fn unknown(&self) -> Option<&Organization> {
        self.by_id
            .get(UNKNOWN_AFFILIATION)
            .and_then(|entries| entries.first())
            .map(|entry| &entry.org)
    }

    /// Organizations an `xref ref-type="aff"` points at. `None` resolves a
    /// contributor with no usable cross-reference.
    fn resolve(&self, xref: Option<(&str, Option<&str>)>) -> Vec<Organization> {
        if let Some(unknown) = self.unknown() {
            return vec![unknown.clone()];
        }
        let Some((rid, marker)) = xref else {
            return Vec::new();
        };
        let Some(entries) = self.by_id.get(rid) else {
            return Vec::new();
        };
        match marker {
            Some(marker) => entries
                .iter()
                .filter(|entry| entry.marker.as_deref().is_none_or(|m| m == marker))
                .map(|entry| entry.org.clone())
                .collect(),
            None => entries.first().map(|entry| entry.org.clone()).into_iter().collect(),
        }
    }
}

fn affiliation_entries(aff: &Element, source: &str) -> Vec<AffiliationEntry> {
    let mut org = Organization::new("Organization");
    let mut description = Vec::new();
    if let Some(institution) = aff.child_text("institution") {
        description.push(institution.clone());
        org.name = Some(institution);
    }
    if let Some(line) = aff.child_text("addr-line") {
        description.push(line);
    }
    if let Some(country) = aff.child_text("country") {
        org.address = Some(PostalAddress {
            address_country: Some(country.clone()),
            ..PostalAddress::new()
        });
        description.push(country);
    }
    if !description.is_empty() {
        let text = description
            .iter()
            .map(|part| format!("{}.", collapse_whitespace(part).trim_end_matches('.')))
            .collect::<Vec<_>>()
            .join(" ");
        org.description = Some(text);
        return vec![AffiliationEntry { marker: None, org }];
    }

    if aff.child("sup").is_some() {
        return split_superscript_affiliations(aff.inner_xml(source))
            .into_iter()
            .map(|split| {
                let mut org = Organization::new("Organization");
                org.description = Some(split.description);
                AffiliationEntry {
                    marker: Some(split.marker),
                    org,
                }
            })
            .collect();
    }

    let text = collapse_whitespace(&text_without(aff, "label"));
    if text.is_empty() {
        return Vec::new();
    }
    org.description = Some(text);
    vec![AffiliationEntry { marker: None, org }]
}

fn text_without(el: &Element, skipped: &str) -> String {
    let mut out = String::new();
    for node in &el.children {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Element(child) if child.name != skipped => {
                out.push(' ');
                out.push_str(&child.text());
            }
            Node::Element(_) => {}
        }
    }
    out
}

fn collect_emails(meta: &Element, paths: &HashMap<String, xml::NodePath>) -> HashMap<String, String> {
    let mut emails = HashMap::new();
    for notes in all_at(meta, paths, "author-notes") {
        for corresp in notes.children_named("corresp") {
            if let (Some(id), Some(email)) = (corresp.attr("id"), corresp.child_text("email")) {
                emails.insert(id.to_string(), email);
            }
        }
    }
    if let Some(email) = first_at(meta, paths, "email").map(Element::text) {
        emails.entry(UNKNOWN_AFFILIATION.to_string()).or_insert(email);
    }
    emails
}

#[derive(Debug, Default)]
struct Contributors {
    author: Option<Person>,
    contributor: Vec<Person>,
    editor: Vec<Person>,
    accountable_person: Vec<Person>,
    source_organisation: Vec<Organization>,
}

fn collect_contributors(
    groups: &[&Element],
    affiliations: &AffiliationIndex,
    emails: &HashMap<String, String>,
) -> Contributors {
    let mut out = Contributors::default();
    for group in groups {
        let contribs: Vec<&Element> = group.children_named("contrib").collect();
        let group_type = contribs
            .first()
            .and_then(|first| first.attr("contrib-type"))
            .unwrap_or_default();
        match group_type {
            "author" => {
                for contrib in contribs {
                    let Some((person, corresponding)) =
                        resolve_contrib(contrib, affiliations, emails)
                    else {
                        continue;
                    };
                    for org in &person.affiliation {
                        let seen = out
                            .source_organisation
                            .iter()
                            .any(|known| known.description == org.description);
                        if !seen {
                            out.source_organisation.push(org.clone());
                        }
                    }
                    if corresponding {
                        out.accountable_person.push(person.clone());
                    }
                    if out.author.is_none() {
                        out.author = Some(person);
                    } else {
                        out.contributor.push(person);
                    }
                }
            }
            "editor" => {
                for contrib in contribs {
                    if let Some((mut person, _)) = resolve_contrib(contrib, affiliations, emails) {
                        person.email = None;
                        out.editor.push(person);
                    }
                }
            }
            _ => {}
        }
    }
    out
}

/// A named contributor with affiliations and email resolved, and whether it
/// is flagged as corresponding. Contributors without a `name` (collab
/// entries) yield `None`.
fn resolve_contrib(
    contrib: &Element,
    affiliations: &AffiliationIndex,
    emails: &HashMap<String, String>,
) -> Option<(Person, bool)> {
    let name = contrib.child("name").or_else(|| contrib.child("string-name"))?;
    let mut person = person_from_name(name);
    let mut corresponding = false;
    let mut email = None;

    let xrefs: Vec<&Element> = contrib.children_named("xref").collect();
    for xref in &xrefs {
        match xref.attr("ref-type") {
            Some("aff") => {
                let rid = xref.attr("rid").unwrap_or_default();
                let marker = xref.child_text("sup");
                person
                    .affiliation
                    .extend(affiliations.resolve(Some((rid, marker.as_deref()))));
            }
            Some("corresp") => {
                corresponding = true;
                email = xref
                    .attr("rid")
                    .and_then(|rid| emails.get(rid))
                    .or_else(|| emails.get(UNKNOWN_AFFILIATION))
                    .cloned();
            }
            _ => {}
        }
    }
    if person.affiliation.is_empty() {
        person.affiliation = affiliations.resolve(None);
    }

    if let Some(own) = contrib.child_text("email") {
        email = Some(own);
    }
    if contrib.attr("corresp") == Some("yes") {
        corresponding = true;
    }
    person.email = email;
    Some((person, corresponding))
}

fn person_from_name(name: &Element) -> Person {
    let mut person = Person::new(name.child_text("given-names"), name.child_text("surname"));
    if person.name.is_none() {
        let text = collapse_whitespace(&name.text());
        if !text.is_empty() {
            person.name = Some(text);
        }
    }
    person
}

fn collect_references(back: &Element) -> Vec<Citation> {
    let mut refs = Vec::new();
    if let Some(list) = back.child("ref-list") {
        collect_refs(list, &mut refs);
    }
    refs.into_iter().filter_map(citation_from_ref).collect()
}

fn collect_refs<'a>(list: &'a Element, refs: &mut Vec<&'a Element>) {
    for el in list.elements() {
        match el.name.as_str() {
            "ref" => refs.push(el),
            "ref-list" => collect_refs(el, refs),
            _ => {}
        }
    }
}

fn citation_from_ref(reference: &Element) -> Option<Citation> {
    let node = reference.elements().find(|el| el.name.contains("citation"))?;
    let mut citation = Citation {
        name: reference.attr("id").map(str::to_string),
        ..Citation::default()
    };

    if !node.own_text().is_empty() {
        citation.description = Some(collapse_whitespace(&node.text()));
    }
    citation.url = node.child_text("ext-link");
    citation.header = node
        .child("article-title")
        .map(|title| collapse_whitespace(&title.text()))
        .filter(|title| !title.is_empty())
        .or_else(|| node.child_text("source"));
    citation.journal = node.child_text("source").map(|source| collapse_whitespace(&source));
    citation.volume = node.child_text("volume").and_then(|v| leading_int(&v));
    citation.page_start = node.child_text("fpage").and_then(|p| leading_int(&p));
    citation.page_end = node.child_text("lpage").and_then(|p| leading_int(&p));

    for id in node.children_named("pub-id") {
        match id.attr("pub-id-type") {
            Some("doi") => citation.doi = Some(id.text()),
            Some("pmid") => citation.pmid = Some(id.text()),
            _ => {}
        }
    }
    for comment in node.children_named("comment") {
        let Some(link) = comment.child_text("ext-link") else {
            continue;
        };
        match sniff_comment_label(&comment.own_text()) {
            Some(CommentLabel::Doi) if citation.doi.is_none() => citation.doi = Some(link),
            Some(CommentLabel::Pmid) if citation.pmid.is_none() => citation.pmid = Some(link),
            _ => {}
        }
    }

    let pubmed = |pmid: &str| format!("http://www.ncbi.nlm.nih.gov/pubmed/?term={pmid}");
    match (&citation.doi, &citation.pmid) {
        (Some(doi), pmid) => {
            citation.url = Some(format!("http://doi.org/{doi}"));
            citation.same_as = pmid.as_deref().map(pubmed);
        }
        (None, Some(pmid)) => citation.url = Some(pubmed(pmid)),
        (None, None) => {}
    }

    let mut names: Vec<&Element> = node
        .elements()
        .filter(|el| el.name == "name" || el.name == "string-name")
        .collect();
    if names.is_empty() {
        if let Some(group) = node.child("person-group") {
            names = group
                .elements()
                .filter(|el| el.name == "name" || el.name == "string-name")
                .collect();
        }
    }
    let mut people = names.into_iter().map(person_from_name);
    citation.author = people.next();
    citation.contributor = people.collect();

    let synthesized = citation_description(&citation, node.child_text("year").as_deref());
    let shorter = citation
        .description
        .as_ref()
        .is_none_or(|free| free.len() < synthesized.len());
    if shorter && !synthesized.is_empty() {
        citation.description = Some(synthesized);
    }
    Some(citation)
}

/// `Family Given[, Family Given (up to 4)][, et al.] (Year) Title. Journal Volume: Start-End.`
/// with every clause dropped when its data is absent.
pub fn citation_description(citation: &Citation, year: Option<&str>) -> String {
    let display = |person: &Person| {
        let parts: Vec<&str> = [person.family_name.as_deref(), person.given_name.as_deref()]
            .into_iter()
            .flatten()
            .collect();
        if parts.is_empty() {
            person.name.clone().unwrap_or_default()
        } else {
            parts.join(" ")
        }
    };

    let mut names: Vec<String> = citation.author.iter().map(display).collect();
    names.extend(citation.contributor.iter().take(ET_AL_THRESHOLD).map(display));
    names.retain(|name| !name.is_empty());
    let mut people = names.join(", ");
    if citation.contributor.len() > ET_AL_THRESHOLD {
        people.push_str(", et al.");
    }

    let mut clauses = Vec::new();
    if !people.is_empty() {
        clauses.push(people);
    }
    if let Some(year) = year {
        clauses.push(format!("({year})"));
    }
    if let Some(header) = &citation.header {
        if header.ends_with('.') {
            clauses.push(header.clone());
        } else {
            clauses.push(format!("{header}."));
        }
    }

    let mut tail = String::new();
    if let Some(journal) = &citation.journal {
        tail.push_str(journal);
    }
    if let Some(volume) = citation.volume {
        if !tail.is_empty() {
            tail.push(' ');
        }
        tail.push_str(&format!("{volume}:"));
    }
    if let Some(start) = citation.page_start {
        if !tail.is_empty() {
            tail.push(' ');
        }
        tail.push_str(&start.to_string());
        if let Some(end) = citation.page_end {
            tail.push_str(&format!("-{end}"));
        }
    }
    if !tail.is_empty() {
        tail.push('.');
        clauses.push(tail);
    }
    clauses.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person(given: &str, family: &str) -> Person {
        Person::new(Some(given.to_string()), Some(family.to_string()))
    }

    #[test]
    fn description_lists_each_contributor_by_own_name() {
        let citation = Citation {
            author: Some(person("J", "Smith")),
            contributor: vec![person("A", "Doe"), person("B", "Roe")],
            header: Some("A title".to_string()),
            journal: Some("Nature".to_string()),
            volume: Some(12),
            page_start: Some(1),
            page_end: Some(5),
            ..Citation::default()
        };
        assert_eq!(
            citation_description(&citation, Some("2001")),
            "Smith J, Doe A, Roe B (2001) A title. Nature 12: 1-5."
        );
    }

    #[test]
    fn description_truncates_with_et_al() {
        let citation = Citation {
            author: Some(person("J", "Smith")),
            contributor: (0..6).map(|i| person("X", &format!("C{i}"))).collect(),
            ..Citation::default()
        };
        let text = citation_description(&citation, None);
        assert_eq!(text, "Smith J, C0 X, C1 X, C2 X, C3 X, et al.");
    }

    #[test]
    fn superscript_affiliations_resolve_by_marker() {
        let source = r#"<article-meta><aff id="aff1"><sup>1</sup>Lab A, <sup>2</sup>Lab B</aff>
<contrib-group><contrib contrib-type="author"><name><surname>Curie</surname><given-names>M</given-names></name>
<xref ref-type="aff" rid="aff1"><sup>2</sup></xref></contrib></contrib-group></article-meta>"#;
        let meta = xml::parse(source).unwrap();
        let paths = find_node_paths(&meta, ARTICLE_META_TAGS);
        let index = AffiliationIndex::build(&all_at(&meta, &paths, "aff"), source);
        let contributors = collect_contributors(
            &all_at(&meta, &paths, "contrib-group"),
            &index,
            &HashMap::new(),
        );
        let author = contributors.author.unwrap();
        assert_eq!(author.affiliation.len(), 1);
        assert_eq!(author.affiliation[0].description.as_deref(), Some("Lab B"));
    }

    #[test]
    fn anonymous_affiliation_answers_every_reference() {
        let source = r#"<m><aff>Only Lab, Somewhere</aff></m>"#;
        let meta = xml::parse(source).unwrap();
        let affs: Vec<&Element> = meta.children_named("aff").collect();
        let index = AffiliationIndex::build(&affs, source);
        let resolved = index.resolve(Some(("aff9", None)));
        assert_eq!(resolved[0].description.as_deref(), Some("Only Lab, Somewhere"));
        assert_eq!(index.resolve(None).len(), 1);
    }
}
