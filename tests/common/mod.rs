#![allow(dead_code)]

use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use flate2::Compression;
use flate2::write::GzEncoder;

use oapmc_packager::error::OapmcError;
use oapmc_packager::fetch::OaClient;

pub const URI: &str = "https://www.ncbi.nlm.nih.gov/pmc/utils/oa/oa.fcgi?id=PMC3010060";
pub const DOI: &str = "10.1371/journal.pone.0012345";
pub const OAI_RECORD: &str = include_str!("../fixtures/oai_record.xml");

pub const OA_LISTING: &str = r#"<OA><records returned-count="1" total-count="1">
<record id="PMC3010060" citation="PLoS One. 2010; 5(12):e15389" license="CC BY" retracted="no">
<link format="tgz" href="ftp://ftp.ncbi.nlm.nih.gov/pub/pmc/0d/5c/PMC3010060.tar.gz" />
<link format="pdf" href="ftp://ftp.ncbi.nlm.nih.gov/pub/pmc/0d/5c/pone.0012345.pdf" />
</record></records></OA>"#;

pub const ID_CONVERSION: &str = r#"{"status": "ok", "records": [{"pmcid": "PMC3010060", "pmid": "21209875", "doi": "10.1371/journal.pone.0012345"}]}"#;

pub const EFETCH: &str = r#"<PubmedArticleSet><PubmedArticle><MedlineCitation>
<MeshHeadingList><MeshHeading><DescriptorName>Radium</DescriptorName></MeshHeading></MeshHeadingList>
</MedlineCitation></PubmedArticle></PubmedArticleSet>"#;

pub const LICENSE_TEXT: &str = "Creative Commons Attribution License";

/// Bundle files as they appear under the tarball's top-level directory.
pub fn bundle_files() -> Vec<(&'static str, Vec<u8>)> {
    vec![
        ("pone.0012345.nxml", OAI_RECORD.as_bytes().to_vec()),
        ("pone.0012345.pdf", b"%PDF-1.4".to_vec()),
        ("pone.0012345.g001.tif", b"II*\0figure".to_vec()),
        ("pone.0012345.e001.gif", b"GIF89a".to_vec()),
        ("pone.0012345.s001.csv", b"sample,count\na,1\n".to_vec()),
        ("license.txt", LICENSE_TEXT.as_bytes().to_vec()),
    ]
}

pub fn bundle_tar_gz() -> Vec<u8> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (name, bytes) in bundle_files() {
        let mut header = tar::Header::new_gnu();
        header.set_size(bytes.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, format!("PMC3010060/{name}"), bytes.as_slice())
            .unwrap();
    }
    let mut encoder = builder.into_inner().unwrap();
    encoder.flush().unwrap();
    encoder.finish().unwrap()
}

/// Serves the canned NCBI answers; every publisher HEAD misses.
#[derive(Default)]
pub struct MockOa {
    pub gets: Mutex<Vec<String>>,
    pub heads: Mutex<usize>,
    pub downloads: Mutex<usize>,
    /// Hosts whose HEAD requests answer 200.
    pub live_hosts: Vec<String>,
    /// Url fragments answered with a 503.
    pub failing: Vec<String>,
}

impl MockOa {
    pub fn live(hosts: &[&str]) -> Self {
        Self {
            live_hosts: hosts.iter().map(|host| host.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn failing(fragment: &str) -> Self {
        Self {
            failing: vec![fragment.to_string()],
            ..Self::default()
        }
    }

    fn check(&self, url: &str) -> Result<(), OapmcError> {
        if self.failing.iter().any(|fragment| url.contains(fragment.as_str())) {
            return Err(OapmcError::HttpStatus {
                status: 503,
                message: format!("unavailable: {url}"),
            });
        }
        Ok(())
    }
}

impl OaClient for MockOa {
    fn get_text(&self, url: &str) -> Result<String, OapmcError> {
        self.gets.lock().unwrap().push(url.to_string());
        self.check(url)?;
        if url.contains("oa.fcgi") {
            Ok(OA_LISTING.to_string())
        } else if url.contains("idconv") {
            Ok(ID_CONVERSION.to_string())
        } else if url.contains("oai.cgi") {
            Ok(OAI_RECORD.to_string())
        } else if url.contains("efetch") {
            Ok(EFETCH.to_string())
        } else {
            Err(OapmcError::HttpStatus {
                status: 404,
                message: url.to_string(),
            })
        }
    }

    fn head_ok(&self, url: &str) -> bool {
        *self.heads.lock().unwrap() += 1;
        self.live_hosts.iter().any(|host| url.contains(host.as_str()))
    }

    fn download(&self, url: &str, destination: &Path) -> Result<(), OapmcError> {
        *self.downloads.lock().unwrap() += 1;
        self.check(url)?;
        std::fs::write(destination, bundle_tar_gz())
            .map_err(|err| OapmcError::Filesystem(err.to_string()))
    }
}
