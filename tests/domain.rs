use std::str::FromStr;

use assert_matches::assert_matches;

use oapmc_packager::domain::{ArticleUri, JournalFamily, ResourceKind};
use oapmc_packager::error::OapmcError;

#[test]
fn open_access_uris_are_recognized() {
    let uri =
        ArticleUri::from_str("https://www.ncbi.nlm.nih.gov/pmc/utils/oa/oa.fcgi?id=PMC3010060")
            .unwrap();
    assert_eq!(uri.pmcid(), "3010060");

    let legacy =
        ArticleUri::from_str("http://www.pubmedcentral.nih.gov/utils/oa/oa.fcgi?id=PMC2924383")
            .unwrap();
    assert_eq!(legacy.pmcid(), "2924383");
}

#[test]
fn other_uris_are_rejected() {
    for uri in [
        "",
        "PMC3010060",
        "https://www.ncbi.nlm.nih.gov/pmc/articles/PMC3010060/",
        "https://www.ncbi.nlm.nih.gov/pmc/utils/oa/oa.fcgi?id=3010060",
    ] {
        assert_matches!(ArticleUri::from_str(uri), Err(OapmcError::UnrecognizedUri(_)));
    }
}

#[test]
fn resource_kinds_map_to_schema_types() {
    assert_eq!(ResourceKind::Article.schema_type(), "ScholarlyArticle");
    assert_eq!(ResourceKind::Figure.schema_type(), "ImageObject");
    assert_eq!(ResourceKind::Code.as_str(), "code");
    assert_eq!(ResourceKind::ALL.len(), 6);
}

#[test]
fn every_family_round_trips_its_prefix() {
    for family in JournalFamily::ALL {
        let file = format!("{}.0000001.g001.tif", family.prefix());
        assert_eq!(JournalFamily::from_file_name(&file), Some(family));
        assert!(family.article_base().starts_with("http://"));
    }
}
