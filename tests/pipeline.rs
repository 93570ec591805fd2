mod common;

use std::time::Instant;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use oapmc_packager::config::PipelineOptions;
use oapmc_packager::error::OapmcError;
use oapmc_packager::output::JsonOutput;
use oapmc_packager::package::Package;
use oapmc_packager::pipeline::{FetchResult, Pipeline};
use oapmc_packager::render::HtmlRenderer;

use common::{LICENSE_TEXT, MockOa, URI};

fn pipeline(root: &Utf8PathBuf, client: MockOa) -> Pipeline<MockOa, HtmlRenderer> {
    let options = PipelineOptions::new(root.clone());
    Pipeline::new(client, HtmlRenderer::new(root.as_std_path()), options)
}

fn run(root: &Utf8PathBuf) -> FetchResult {
    pipeline(root, MockOa::default())
        .fetch(URI, &JsonOutput)
        .unwrap()
}

fn temp_root(temp: &tempfile::TempDir, name: &str) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(temp.path().join(name)).unwrap()
}

#[test]
fn fetch_assembles_the_package() {
    let temp = tempfile::tempdir().unwrap();
    let root = temp_root(&temp, "pkg");
    let result = run(&root);
    let package = &result.package;

    assert_eq!(package.name, "plos-one-curie-2010");
    assert_eq!(package.version, "0.0.0");
    assert_eq!(package.license.as_deref(), Some(LICENSE_TEXT));
    assert!(package.keyword.iter().any(|word| word == "Radium"));
    assert!(package.date_published.is_some());

    assert_eq!(package.article.len(), 1);
    let article = &package.article[0];
    assert_eq!(article.name, "pone-0012345");
    let formats: Vec<_> = article
        .encodings()
        .iter()
        .filter_map(|enc| enc.encoding_format.as_deref())
        .collect();
    assert_eq!(formats, vec!["application/pdf", "text/html"]);
    let fields = article.article.as_ref().unwrap();
    assert_eq!(fields.pmid.as_deref(), Some("21209875"));
    assert_eq!(fields.citation.len(), 1);

    assert_eq!(package.figure.len(), 1);
    let figure = &package.figure[0];
    assert_eq!(figure.name, "pone-0012345-g001");
    assert_eq!(figure.doi.as_deref(), Some("10.1371/journal.pone.0012345.g001"));
    assert_eq!(figure.position, Some(1));
    assert!(figure.caption.as_deref().unwrap().contains("Activity of the residue"));

    let datasets: Vec<_> = package.dataset.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(datasets, vec!["pone-0012345-s001"]);
}

#[test]
fn fetch_leaves_the_expected_files() {
    let temp = tempfile::tempdir().unwrap();
    let root = temp_root(&temp, "pkg");
    let result = run(&root);

    assert!(root.join("package.jsonld").exists());
    assert!(root.join("pone.0012345.html").exists());
    assert_eq!(result.html_path, root.join("pone.0012345.html").to_string());
    assert!(!root.join("license.txt").exists());
    assert!(!root.join("pone.0012345.e001.gif").exists());
    assert!(root.join("pone.0012345.g001.tif").exists());

    let html = std::fs::read_to_string(root.join("pone.0012345.html")).unwrap();
    assert!(html.contains("data:image/gif;base64,"));
    assert!(html.contains("<h2>Results</h2>"));

    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(root.join("package.jsonld")).unwrap())
            .unwrap();
    assert_eq!(written["name"], "plos-one-curie-2010");
}

#[test]
fn reruns_differ_only_in_publication_time() {
    let temp = tempfile::tempdir().unwrap();
    let strip = |mut package: Package| {
        package.date_published = None;
        serde_json::to_value(package).unwrap()
    };
    let first = strip(run(&temp_root(&temp, "pkg")).package);
    let second = strip(run(&temp_root(&temp, "pkg2")).package);
    assert_eq!(first, second);
}

#[test]
fn unrecognized_uri_fails_before_any_request() {
    let temp = tempfile::tempdir().unwrap();
    let root = temp_root(&temp, "pkg");
    let pipeline = pipeline(&root, MockOa::default());
    let err = pipeline
        .fetch("https://example.org/article/1", &JsonOutput)
        .unwrap_err();
    assert_matches!(err, OapmcError::UnrecognizedUri(_));
    assert!(!root.exists());
}

#[test]
fn pubmed_can_be_skipped() {
    let temp = tempfile::tempdir().unwrap();
    let root = temp_root(&temp, "pkg");
    let mut options = PipelineOptions::new(root.clone());
    options.no_pubmed = true;
    let pipeline = Pipeline::new(
        MockOa::default(),
        HtmlRenderer::new(root.as_std_path()),
        options,
    );
    let result = pipeline.fetch(URI, &JsonOutput).unwrap();
    assert!(!result.package.keyword.iter().any(|word| word == "Radium"));
}

#[test]
fn process_runs_offline_over_fetched_sources() {
    use oapmc_packager::fetch::{FetchedSources, ResolvedArticle};

    let temp = tempfile::tempdir().unwrap();
    let root = temp_root(&temp, "pkg");
    std::fs::create_dir_all(&root).unwrap();
    let xml_path = root.join("pone.0012345.nxml");
    std::fs::write(&xml_path, common::OAI_RECORD).unwrap();

    let article = ResolvedArticle {
        pmcid: "3010060".to_string(),
        pdf_name: None,
        bundle_url: String::new(),
        doi: None,
        pmid: None,
    };
    let sources = FetchedSources {
        files: vec![xml_path.into_std_path_buf()],
        xml: common::OAI_RECORD.to_string(),
        annotations: None,
    };
    let (package, _) = pipeline(&root, MockOa::default())
        .process(&article, sources, chrono::Utc::now(), &JsonOutput, Instant::now())
        .unwrap();

    // Without a PDF the raw XML is the article.
    assert_eq!(package.article.len(), 1);
    assert_eq!(package.article[0].name, "pone-0012345");
    assert!(package.dataset.is_empty());
}

#[test]
fn any_failing_source_aborts_with_its_status() {
    for fragment in ["oa.fcgi", "idconv", "PMC3010060.tar.gz", "oai.cgi", "efetch"] {
        let temp = tempfile::tempdir().unwrap();
        let root = temp_root(&temp, "pkg");
        let err = pipeline(&root, MockOa::failing(fragment))
            .fetch(URI, &JsonOutput)
            .unwrap_err();
        assert_eq!(err.status_code(), Some(503), "failing {fragment}");
        assert_matches!(err, OapmcError::HttpStatus { status: 503, .. });
        assert!(!root.join("package.jsonld").exists());
    }
}

#[test]
fn publisher_renditions_join_the_bundle_copies() {
    let temp = tempfile::tempdir().unwrap();
    let root = temp_root(&temp, "pkg");
    let client = MockOa::live(&["plosone.org"]);
    let result = pipeline(&root, client).fetch(URI, &JsonOutput).unwrap();
    let package = &result.package;

    assert_eq!(package.figure.len(), 1);
    let figure = &package.figure[0];
    assert_eq!(figure.name, "pone-0012345-g001");
    assert_eq!(figure.doi.as_deref(), Some("10.1371/journal.pone.0012345.g001"));
    let encodings = figure.encodings();
    assert_eq!(encodings[0].content_path.as_deref(), Some("pone.0012345.g001.tif"));
    let renditions: Vec<_> = encodings
        .iter()
        .filter_map(|enc| enc.content_url.as_deref())
        .map(|url| url.rsplit('/').next().unwrap())
        .collect();
    assert_eq!(renditions, vec!["powerpoint", "largerimage", "originalimage"]);
    assert!(!encodings.iter().any(|enc| enc.is_single_representation()));

    let article = &package.article[0];
    assert_eq!(article.name, "pone-0012345");
    assert!(article
        .encodings()
        .iter()
        .any(|enc| enc.content_url.as_deref().is_some_and(|url| url.ends_with("&representation=PDF"))));

    // The single-representation url yields to the bundle copy.
    let dataset = &package.dataset[0];
    assert_eq!(dataset.encodings().len(), 1);
    assert!(dataset.encodings()[0].content_path.is_some());
}
