//! Assemble phase: the classified package and the metadata record become the
//! final package, in a fixed key order.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::classify::Classified;
use crate::domain::ResourceKind;
use crate::error::OapmcError;
use crate::metadata::ArticleRecord;
use crate::naming::{slugify_name, word_slug};
use crate::package::{Agent, ArticleFields, Organization, Package, PostalAddress, Resource};
use crate::quirks::figure_doi;

#[derive(Debug, Clone, PartialEq)]
pub struct Assembled {
    pub package: Package,
    /// Slugified name of the resource carrying the article-level fields.
    pub main_article: String,
}

/// `{journal short name}-{first author family name or first title word}-{year}`.
pub fn package_name(record: &ArticleRecord) -> Result<String, OapmcError> {
    let year = record
        .year
        .as_deref()
        .filter(|year| !year.is_empty())
        .ok_or(OapmcError::MissingYear)?;
    let who = match &record.author {
        Some(author) => author.family_name.as_deref().map(word_slug),
        None => record
            .title
            .as_deref()
            .and_then(|title| title.split_whitespace().next())
            .map(word_slug),
    };
    let parts = [
        Some(record.journal_short_name.clone()),
        who,
        Some(year.to_string()),
    ];
    Ok(parts
        .into_iter()
        .flatten()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-"))
}

pub fn national_library_of_medicine() -> Organization {
    Organization {
        id: Some("http://www.nlm.nih.gov/".to_string()),
        name: Some("National Library of Medicine".to_string()),
        department: Some("Department of Health and Human Services".to_string()),
        address: Some(PostalAddress {
            address_country: Some("US".to_string()),
            ..PostalAddress::new()
        }),
        ..Organization::new("Organization")
    }
}

pub fn pmc_provider() -> Organization {
    Organization {
        id: Some("http://www.ncbi.nlm.nih.gov/pmc/".to_string()),
        description: Some(
            "From PMC®, a database of the U.S. National Library of Medicine.".to_string(),
        ),
        ..Organization::new("Organization")
    }
}

pub fn default_contact() -> Organization {
    Organization {
        name: Some("Standard Analytics IO".to_string()),
        email: Some("contact@standardanalytics.io".to_string()),
        ..Organization::new("Organization")
    }
}

pub fn assemble(
    record: &ArticleRecord,
    classified: Classified,
    now: DateTime<Utc>,
) -> Result<Assembled, OapmcError> {
    let name = package_name(record)?;
    let Classified {
        package: mut resources,
        main_article,
    } = classified;

    let journal = record.journal.clone().map(|mut journal| {
        journal.schema_type = Some("Journal".to_string());
        journal
    });

    let mut source_organisation = vec![national_library_of_medicine()];
    for org in &record.source_organisation {
        let seen = source_organisation
            .iter()
            .any(|known| known.description.is_some() && known.description == org.description);
        if !seen {
            source_organisation.push(org.clone());
        }
    }

    let accountable_person = if record.accountable_person.is_empty() {
        vec![Agent::Organization(default_contact())]
    } else {
        record
            .accountable_person
            .iter()
            .cloned()
            .map(Agent::Person)
            .collect()
    };

    // The article resource: the one named after the main article, else a new one.
    let main_slug = main_article.as_deref().map(slugify_name);
    let main_index = main_slug
        .as_deref()
        .and_then(|slug| {
            resources
                .article
                .iter()
                .position(|article| slugify_name(&article.name) == slug)
        })
        .unwrap_or_else(|| {
            let index = resources.article.len();
            let name = main_article.clone().unwrap_or_default();
            resources
                .article
                .push(Resource::new(ResourceKind::Article, name, Vec::new()));
            index
        });

    for kind in ResourceKind::ALL {
        for (idx, resource) in resources.resources_mut(kind).iter_mut().enumerate() {
            if resource.name.is_empty() {
                resource.name = format!("{}-{idx}", kind.as_str());
            }
            resource.name = slugify_name(&resource.name);
            resource.schema_type = Some(kind.schema_type().to_string());
            resource.date_published = record.publication_date.clone();
            for entry in record.captions.iter().filter(|entry| entry.matches(&resource.name)) {
                if let Some(caption) = entry.display_caption() {
                    resource.caption = Some(caption);
                }
                if entry.alternate_name.is_some() {
                    resource.alternate_name = entry.alternate_name.clone();
                }
                if entry.index.is_some() {
                    resource.position = entry.index;
                }
            }
        }
    }

    if let Some(doi) = record.doi.as_deref() {
        for figure in resources.figure.iter_mut() {
            if let Some(figure_doi) = figure_doi(doi, &figure.name) {
                figure.doi = Some(figure_doi);
            }
        }
    }

    let main = &mut resources.article[main_index];
    main.doi = record.doi.clone();
    main.article = Some(ArticleFields {
        publication_type: record.publication_type.clone(),
        journal: journal.clone(),
        pmid: record.pmid.clone(),
        headline: record.title.clone(),
        alternative_headline: record.alt_title.clone(),
        abstract_text: record.abstract_text.clone(),
        citation: record.references.clone(),
        issue: record.issue,
        volume: record.volume,
        page_start: record.page_start,
        page_end: record.page_end,
        num_pages: record.num_pages,
    });
    let main_article = main.name.clone();

    let package = Package {
        name,
        version: resources.version,
        date_created: record.date_created.clone(),
        keyword: record.keyword.clone(),
        description: record.title.clone(),
        date_published: Some(now.to_rfc3339_opts(SecondsFormat::Millis, true)),
        license: resources.license.or_else(|| record.license.clone()),
        author: record.author.clone(),
        contributor: record.contributor.clone(),
        source_organisation,
        provider: Some(pmc_provider()),
        editor: record.editor.clone(),
        publisher: record.publisher.clone(),
        journal,
        accountable_person,
        copyright_holder: record
            .copyright_holder
            .clone()
            .or_else(|| record.publisher.clone()),
        dataset: resources.dataset,
        code: resources.code,
        figure: resources.figure,
        audio: resources.audio,
        video: resources.video,
        article: resources.article,
    };
    Ok(Assembled {
        package,
        main_article,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::Person;
    use assert_matches::assert_matches;

    fn record() -> ArticleRecord {
        ArticleRecord {
            journal_short_name: "plos-one".to_string(),
            author: Some(Person::new(
                Some("Marie".to_string()),
                Some("Skłodowska Čurie".to_string()),
            )),
            title: Some("Radioactive substances".to_string()),
            year: Some("2010".to_string()),
            ..ArticleRecord::default()
        }
    }

    #[test]
    fn name_uses_author_family_and_year() {
        assert_eq!(package_name(&record()).unwrap(), "plos-one-skodowskacurie-2010");
    }

    #[test]
    fn name_falls_back_to_the_title() {
        let mut rec = record();
        rec.author = None;
        assert_eq!(package_name(&rec).unwrap(), "plos-one-radioactive-2010");
    }

    #[test]
    fn missing_year_is_an_error() {
        let mut rec = record();
        rec.year = None;
        assert_matches!(package_name(&rec), Err(OapmcError::MissingYear));
    }

    #[test]
    fn article_is_created_when_absent() {
        let classified = Classified {
            package: Package::default(),
            main_article: None,
        };
        let assembled = assemble(&record(), classified, Utc::now()).unwrap();
        assert_eq!(assembled.main_article, "article-0");
        assert_eq!(assembled.package.article.len(), 1);
        assert_eq!(
            assembled.package.article[0].schema_type.as_deref(),
            Some("ScholarlyArticle")
        );
        assert_matches!(
            assembled.package.accountable_person.as_slice(),
            [Agent::Organization(_)]
        );
    }
}
