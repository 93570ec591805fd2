use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use oapmc_packager::classify::{ClassifyInput, classify};
use oapmc_packager::error::OapmcError;
use oapmc_packager::fetch::OaClient;

const DOI: &str = "10.1371/journal.pone.0012345";

/// Answers HEAD requests by url suffix.
struct Publisher {
    live: Vec<&'static str>,
    heads: Mutex<Vec<String>>,
}

impl Publisher {
    fn new(live: Vec<&'static str>) -> Self {
        Self {
            live,
            heads: Mutex::new(Vec::new()),
        }
    }
}

impl OaClient for Publisher {
    fn get_text(&self, url: &str) -> Result<String, OapmcError> {
        Err(OapmcError::Http(format!("unexpected GET {url}")))
    }

    fn head_ok(&self, url: &str) -> bool {
        self.heads.lock().unwrap().push(url.to_string());
        self.live.iter().any(|suffix| url.ends_with(suffix))
    }

    fn download(&self, url: &str, _destination: &Path) -> Result<(), OapmcError> {
        Err(OapmcError::Http(format!("unexpected download {url}")))
    }
}

fn write(root: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = root.join(name);
    fs::write(&path, bytes).unwrap();
    path
}

fn input(root: &Path, files: Vec<PathBuf>) -> ClassifyInput {
    ClassifyInput {
        root: root.to_path_buf(),
        files,
        doi: Some(DOI.to_string()),
        pdf_name: Some("pone.0012345.pdf".to_string()),
    }
}

#[test]
fn larger_image_merges_with_the_bundle_figure() {
    let temp = tempfile::tempdir().unwrap();
    let files = vec![write(temp.path(), "pone.0012345.g001.tif", b"tif")];
    let client = Publisher::new(vec!["pone.0012345.g001", "/largerimage"]);

    let classified = classify(&client, input(temp.path(), files)).unwrap();
    let figures = &classified.package.figure;
    assert_eq!(figures.len(), 1);
    assert_eq!(figures[0].name, "pone.0012345.g001");

    // The single-representation url answered too, but a richer rendition exists.
    let encodings = figures[0].encodings();
    assert_eq!(encodings.len(), 2);
    assert_eq!(encodings[0].content_path.as_deref(), Some("pone.0012345.g001.tif"));
    assert_eq!(
        encodings[1].content_url.as_deref(),
        Some("http://www.plosone.org/article/info:doi/10.1371/journal.pone.0012345.g001/largerimage")
    );
    assert_eq!(client.heads.lock().unwrap().len(), 4);
}

#[test]
fn single_representation_yields_to_the_bundle_copy() {
    let temp = tempfile::tempdir().unwrap();
    let files = vec![write(temp.path(), "pone.0012345.s001.xls", b"xls")];
    let client = Publisher::new(vec!["pone.0012345.s001"]);

    let classified = classify(&client, input(temp.path(), files)).unwrap();
    let dataset = &classified.package.dataset[0];
    assert_eq!(dataset.name, "pone.0012345.s001");
    assert_eq!(dataset.encodings().len(), 1);
    assert_eq!(
        dataset.encodings()[0].content_path.as_deref(),
        Some("pone.0012345.s001.xls")
    );
    assert_eq!(
        dataset.encodings()[0].encoding_format.as_deref(),
        Some("application/vnd.ms-excel")
    );
}

#[test]
fn renditions_of_one_figure_share_their_urls() {
    let temp = tempfile::tempdir().unwrap();
    let files = vec![
        write(temp.path(), "pone.0012345.g001.gif", b"gif"),
        write(temp.path(), "pone.0012345.g001.jpg", b"jpg"),
    ];
    let client = Publisher::new(vec!["image"]);

    let classified = classify(&client, input(temp.path(), files)).unwrap();
    let figures = &classified.package.figure;
    assert_eq!(figures.len(), 1);
    let urls: Vec<_> = figures[0]
        .encodings()
        .iter()
        .filter_map(|enc| enc.content_url.as_deref())
        .collect();
    assert_eq!(
        urls,
        vec![
            "http://www.plosone.org/article/info:doi/10.1371/journal.pone.0012345.g001/largerimage",
            "http://www.plosone.org/article/info:doi/10.1371/journal.pone.0012345.g001/originalimage",
        ]
    );
    let paths: Vec<_> = figures[0]
        .encodings()
        .iter()
        .filter_map(|enc| enc.content_path.as_deref())
        .collect();
    assert_eq!(paths, vec!["pone.0012345.g001.gif", "pone.0012345.g001.jpg"]);
    assert_eq!(client.heads.lock().unwrap().len(), 4);
}

#[test]
fn remote_pdf_becomes_the_main_article() {
    let temp = tempfile::tempdir().unwrap();
    let files = vec![
        write(temp.path(), "pone.0012345.pdf", b"%PDF"),
        write(temp.path(), "pone.0012345.nxml", b"<article/>"),
    ];
    let client = Publisher::new(vec!["&representation=PDF"]);

    let classified = classify(&client, input(temp.path(), files)).unwrap();
    assert_eq!(classified.main_article.as_deref(), Some("pone.0012345"));
    assert!(classified.package.dataset.is_empty());
    let article = &classified.package.article[0];
    assert_eq!(article.name, "pone.0012345");
    let encodings = article.encodings();
    assert_eq!(encodings.len(), 2);
    assert_eq!(encodings[0].content_path.as_deref(), Some("pone.0012345.pdf"));
    assert!(encodings[1].content_url.as_deref().unwrap().ends_with("&representation=PDF"));
}

#[test]
fn license_file_is_inlined_and_removed() {
    let temp = tempfile::tempdir().unwrap();
    let files = vec![
        write(temp.path(), "license.txt", b"CC BY 4.0"),
        write(temp.path(), "notes.txt", b"notes"),
    ];
    let client = Publisher::new(Vec::new());

    let classified = classify(&client, input(temp.path(), files)).unwrap();
    assert_eq!(classified.package.license.as_deref(), Some("CC BY 4.0"));
    assert!(!temp.path().join("license.txt").exists());
    let names: Vec<_> = classified.package.dataset.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["notes"]);
}

#[test]
fn archives_unpack_into_code_resources() {
    let temp = tempfile::tempdir().unwrap();
    let zip_path = temp.path().join("scripts.zip");
    {
        let file = fs::File::create(&zip_path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        zip.start_file("run.py", zip::write::SimpleFileOptions::default())
            .unwrap();
        zip.write_all(b"print('hi')\n").unwrap();
        zip.finish().unwrap();
    }
    let client = Publisher::new(Vec::new());

    let classified = classify(&client, input(temp.path(), vec![zip_path])).unwrap();
    let code = &classified.package.code;
    assert_eq!(code.len(), 1);
    assert_eq!(code[0].name, "scripts");
    assert_eq!(
        code[0].encodings()[0].encoding_format.as_deref(),
        Some("inode/directory")
    );
    assert!(temp.path().join("scripts").join("run.py").exists());
}
