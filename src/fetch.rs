use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use regex::Regex;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::annotations::{AnnotationSource, Annotations};
use crate::archive::{copy_flat, extract_tar_gz, walk_files};
use crate::config::Endpoints;
use crate::domain::ArticleUri;
use crate::error::OapmcError;

static LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<link\b[^>]*>").expect("link pattern is valid"));
static ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"([\w-]+)\s*=\s*"([^"]*)""#).expect("attribute pattern is valid"));

const NCBI_FTP_ROOT: &str = "ftp://ftp.ncbi.nlm.nih.gov/";

pub trait OaClient: Send + Sync {
    fn get_text(&self, url: &str) -> Result<String, OapmcError>;
    /// Existence check: only a 200 answer counts, transport failures are `false`.
    fn head_ok(&self, url: &str) -> bool;
    fn download(&self, url: &str, destination: &Path) -> Result<(), OapmcError>;
}

#[derive(Clone)]
pub struct PmcHttpClient {
    client: Client,
}

impl PmcHttpClient {
    pub fn new(timeout_secs: u64) -> Result<Self, OapmcError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("oapmc/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| OapmcError::Http(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|err| OapmcError::Http(err.to_string()))?;
        Ok(Self { client })
    }

    fn send(&self, url: &str) -> Result<reqwest::blocking::Response, OapmcError> {
        info!("GET {url}");
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| OapmcError::Http(err.to_string()))?;
        let status = response.status().as_u16();
        info!("{status} {url}");
        if !response.status().is_success() {
            let message = response
                .text()
                .unwrap_or_else(|_| "request failed".to_string());
            return Err(OapmcError::HttpStatus { status, message });
        }
        Ok(response)
    }
}

impl OaClient for PmcHttpClient {
    fn get_text(&self, url: &str) -> Result<String, OapmcError> {
        self.send(url)?
            .text()
            .map_err(|err| OapmcError::Http(err.to_string()))
    }

    fn head_ok(&self, url: &str) -> bool {
        debug!("HEAD {url}");
        match self.client.head(url).send() {
            Ok(response) => {
                debug!("{} {url}", response.status().as_u16());
                response.status().as_u16() == 200
            }
            Err(err) => {
                warn!("HEAD {url} failed: {err}");
                false
            }
        }
    }

    fn download(&self, url: &str, destination: &Path) -> Result<(), OapmcError> {
        let mut response = self.send(url)?;
        let mut file =
            File::create(destination).map_err(|err| OapmcError::Filesystem(err.to_string()))?;
        std::io::copy(&mut response, &mut file)
            .map_err(|err| OapmcError::Http(err.to_string()))?;
        Ok(())
    }
}

/// What the open-access service and the id converter say about one article.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedArticle {
    pub pmcid: String,
    /// Basename of the PDF advertised by the open-access service.
    pub pdf_name: Option<String>,
    pub bundle_url: String,
    pub doi: Option<String>,
    pub pmid: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OaListing {
    pub pdf_name: Option<String>,
    pub bundle_url: Option<String>,
}

/// Reads the `<link format=".." href=".."/>` records of an open-access response.
pub fn parse_oa_listing(body: &str) -> OaListing {
    let mut listing = OaListing {
        pdf_name: None,
        bundle_url: None,
    };
    let mut first_href = None;
    for link in LINK.find_iter(body) {
        let mut format = None;
        let mut href = None;
        for caps in ATTR.captures_iter(link.as_str()) {
            match &caps[1] {
                "format" => format = Some(caps[2].to_string()),
                "href" => href = Some(caps[2].to_string()),
                _ => {}
            }
        }
        let Some(href) = href else {
            continue;
        };
        if first_href.is_none() {
            first_href = Some(href.clone());
        }
        match format.as_deref() {
            Some("pdf") if listing.pdf_name.is_none() => {
                listing.pdf_name = href.rsplit('/').next().map(str::to_string);
            }
            Some("tgz") if listing.bundle_url.is_none() => listing.bundle_url = Some(href),
            _ => {}
        }
    }
    if listing.bundle_url.is_none() {
        listing.bundle_url = first_href;
    }
    listing
}

pub fn parse_id_conversion(body: &str) -> Result<(Option<String>, Option<String>), OapmcError> {
    let value: Value =
        serde_json::from_str(body).map_err(|err| OapmcError::IdConversion(err.to_string()))?;
    let record = value
        .get("records")
        .and_then(|records| records.get(0))
        .ok_or_else(|| OapmcError::IdConversion("response has no records".to_string()))?;
    let field = |key: &str| match record.get(key) {
        Some(Value::String(text)) if !text.is_empty() => Some(text.clone()),
        Some(Value::Number(number)) => Some(number.to_string()),
        _ => None,
    };
    Ok((field("doi"), field("pmid")))
}

/// Bundle links point at the NCBI ftp tree, which the mirror also serves over https.
pub fn mirror_url(url: &str, mirror: &str) -> String {
    match url.strip_prefix(NCBI_FTP_ROOT) {
        Some(rest) => format!("{}/{}", mirror.trim_end_matches('/'), rest),
        None => url.to_string(),
    }
}

pub fn id_conversion_url(endpoints: &Endpoints, pmcid: &str) -> String {
    format!("{}?ids=PMC{pmcid}&format=json", endpoints.id_conversion)
}

pub fn oai_record_url(endpoints: &Endpoints, pmcid: &str) -> String {
    format!(
        "{}?verb=GetRecord&identifier=oai:pubmedcentral.nih.gov:{pmcid}&metadataPrefix=pmc",
        endpoints.oai
    )
}

pub fn efetch_url(endpoints: &Endpoints, pmid: &str) -> String {
    format!(
        "{}?db=pubmed&id={pmid}&rettype=abstract&retmode=xml",
        endpoints.pubmed_efetch
    )
}

pub fn resolve_article<C: OaClient + ?Sized>(
    client: &C,
    endpoints: &Endpoints,
    uri: &ArticleUri,
) -> Result<ResolvedArticle, OapmcError> {
    let body = client.get_text(uri.as_str())?;
    let listing = parse_oa_listing(&body);
    let bundle_url = listing
        .bundle_url
        .ok_or_else(|| OapmcError::Http(format!("no bundle link for PMC{}", uri.pmcid())))?;

    let conversion = client.get_text(&id_conversion_url(endpoints, uri.pmcid()))?;
    let (doi, pmid) = parse_id_conversion(&conversion)?;
    Ok(ResolvedArticle {
        pmcid: uri.pmcid().to_string(),
        pdf_name: listing.pdf_name,
        bundle_url,
        doi,
        pmid,
    })
}

/// Downloads the tarball behind `url` into a scratch directory, unpacks it
/// without its top-level directory and copies every file flat into `root`.
pub fn fetch_bundle<C: OaClient + ?Sized>(
    client: &C,
    url: &str,
    mirror: &str,
    root: &Path,
) -> Result<Vec<PathBuf>, OapmcError> {
    let url = mirror_url(url, mirror);
    let staging = tempfile::tempdir().map_err(|err| OapmcError::Filesystem(err.to_string()))?;
    let archive = staging.path().join("bundle.tar.gz");
    client.download(&url, &archive)?;

    let unpacked = staging.path().join("unpacked");
    extract_tar_gz(&archive, &unpacked, 1)?;
    let files = walk_files(&unpacked)?;
    debug!(count = files.len(), "bundle unpacked");
    copy_flat(&files, root)
}

#[derive(Debug)]
pub struct FetchedSources {
    pub files: Vec<PathBuf>,
    pub xml: String,
    pub annotations: Option<Annotations>,
}

enum Fetched {
    Bundle(Result<Vec<PathBuf>, OapmcError>),
    Xml(Result<String, OapmcError>),
    Annotations(Result<Option<Annotations>, OapmcError>),
}

/// Runs the bundle, metadata and annotation fetches side by side. The first
/// failure to arrive is returned and later results are discarded.
pub fn fetch_sources<C, A>(
    client: &C,
    annotations: Option<&A>,
    endpoints: &Endpoints,
    article: &ResolvedArticle,
    root: &Path,
) -> Result<FetchedSources, OapmcError>
where
    C: OaClient + ?Sized,
    A: AnnotationSource + ?Sized,
{
    thread::scope(|scope| -> Result<FetchedSources, OapmcError> {
        let (tx, rx) = mpsc::channel();

        let bundle_tx = tx.clone();
        scope.spawn(move || {
            let result = fetch_bundle(client, &article.bundle_url, &endpoints.bundle_mirror, root);
            let _ = bundle_tx.send(Fetched::Bundle(result));
        });

        let xml_tx = tx.clone();
        scope.spawn(move || {
            let result = client.get_text(&oai_record_url(endpoints, &article.pmcid));
            let _ = xml_tx.send(Fetched::Xml(result));
        });

        let annotations_tx = tx;
        scope.spawn(move || {
            let result = match (annotations, article.pmid.as_deref()) {
                (Some(source), Some(pmid)) => source.fetch(pmid).map(Some),
                _ => Ok(None),
            };
            let _ = annotations_tx.send(Fetched::Annotations(result));
        });

        let mut files = None;
        let mut xml = None;
        let mut fetched_annotations = None;
        for message in rx {
            match message {
                Fetched::Bundle(result) => files = Some(result?),
                Fetched::Xml(result) => xml = Some(result?),
                Fetched::Annotations(result) => fetched_annotations = Some(result?),
            }
        }

        Ok(FetchedSources {
            files: files.ok_or_else(|| OapmcError::Http("bundle fetch did not finish".to_string()))?,
            xml: xml.ok_or_else(|| OapmcError::Http("metadata fetch did not finish".to_string()))?,
            annotations: fetched_annotations.flatten(),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const OA_BODY: &str = r#"<OA><records returned-count="1" total-count="1">
<record id="PMC3010060" citation="PLoS One. 2010; 5(12):e15389" license="CC BY" retracted="no">
<link format="tgz" updated="2013-01-01 00:00:00" href="ftp://ftp.ncbi.nlm.nih.gov/pub/pmc/0d/5c/PMC3010060.tar.gz" />
<link format="pdf" updated="2010-12-22 13:05:46" href="ftp://ftp.ncbi.nlm.nih.gov/pub/pmc/0d/5c/pone.0015389.pdf" />
</record></records></OA>"#;

    #[test]
    fn oa_listing_links() {
        let listing = parse_oa_listing(OA_BODY);
        assert_eq!(listing.pdf_name.as_deref(), Some("pone.0015389.pdf"));
        assert_eq!(
            mirror_url(
                listing.bundle_url.as_deref().unwrap(),
                "https://ftp.ncbi.nlm.nih.gov/"
            ),
            "https://ftp.ncbi.nlm.nih.gov/pub/pmc/0d/5c/PMC3010060.tar.gz"
        );
    }

    #[test]
    fn listing_without_pdf() {
        let listing = parse_oa_listing(
            r#"<link format="tgz" href="ftp://ftp.ncbi.nlm.nih.gov/pub/pmc/x.tar.gz"/>"#,
        );
        assert_eq!(listing.pdf_name, None);
        assert!(listing.bundle_url.is_some());
    }

    #[test]
    fn id_conversion_records() {
        let body = r#"{"status": "ok", "records": [{"pmcid": "PMC3010060", "pmid": "21209875", "doi": "10.1371/journal.pone.0015389"}]}"#;
        let (doi, pmid) = parse_id_conversion(body).unwrap();
        assert_eq!(doi.as_deref(), Some("10.1371/journal.pone.0015389"));
        assert_eq!(pmid.as_deref(), Some("21209875"));
        assert!(parse_id_conversion(r#"{"records": []}"#).is_err());
    }
}
