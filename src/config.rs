use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::error::OapmcError;

pub const DEFAULT_CONFIG_FILE: &str = "oapmc.json";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub root: Option<String>,
    #[serde(default)]
    pub no_pubmed: Option<bool>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub endpoints: Option<EndpointOverrides>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct EndpointOverrides {
    #[serde(default)]
    pub id_conversion: Option<String>,
    #[serde(default)]
    pub oai: Option<String>,
    #[serde(default)]
    pub bundle_mirror: Option<String>,
    #[serde(default)]
    pub pubmed_efetch: Option<String>,
}

/// Base urls of every remote service the pipeline talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub id_conversion: String,
    pub oai: String,
    /// HTTPS root serving the same tree as `ftp://ftp.ncbi.nlm.nih.gov/`.
    pub bundle_mirror: String,
    pub pubmed_efetch: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            id_conversion: "https://www.ncbi.nlm.nih.gov/pmc/utils/idconv/v1.0/".to_string(),
            oai: "https://www.ncbi.nlm.nih.gov/pmc/oai/oai.cgi".to_string(),
            bundle_mirror: "https://ftp.ncbi.nlm.nih.gov/".to_string(),
            pubmed_efetch: "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/efetch.fcgi"
                .to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Package root: bundle files are copied here and the html body is written here.
    pub root: Utf8PathBuf,
    /// Where the package document goes; `<root>/package.jsonld` when unset.
    pub output: Option<Utf8PathBuf>,
    pub no_pubmed: bool,
    pub timeout_secs: u64,
    pub endpoints: Endpoints,
}

impl PipelineOptions {
    pub fn package_path(&self) -> Utf8PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| self.root.join("package.jsonld"))
    }

    pub fn new(root: Utf8PathBuf) -> Self {
        Self {
            root,
            output: None,
            no_pubmed: false,
            timeout_secs: 60,
            endpoints: Endpoints::default(),
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads `path`, or `oapmc.json` in the working directory when present.
    /// With neither, every option keeps its default.
    pub fn resolve(path: Option<&str>, root: Utf8PathBuf) -> Result<PipelineOptions, OapmcError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Ok(PipelineOptions::new(root));
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| OapmcError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| OapmcError::ConfigParse(err.to_string()))?;

        Ok(Self::resolve_config(config, root))
    }

    /// An explicit `root` in the config wins over the caller's default.
    pub fn resolve_config(config: Config, root: Utf8PathBuf) -> PipelineOptions {
        let mut options = PipelineOptions::new(config.root.map(Utf8PathBuf::from).unwrap_or(root));
        if let Some(no_pubmed) = config.no_pubmed {
            options.no_pubmed = no_pubmed;
        }
        if let Some(timeout) = config.timeout_secs {
            options.timeout_secs = timeout;
        }
        if let Some(overrides) = config.endpoints {
            let endpoints = &mut options.endpoints;
            if let Some(value) = overrides.id_conversion {
                endpoints.id_conversion = value;
            }
            if let Some(value) = overrides.oai {
                endpoints.oai = value;
            }
            if let Some(value) = overrides.bundle_mirror {
                endpoints.bundle_mirror = value;
            }
            if let Some(value) = overrides.pubmed_efetch {
                endpoints.pubmed_efetch = value;
            }
        }
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_keeps_defaults() {
        let options = ConfigLoader::resolve_config(Config::default(), Utf8PathBuf::from("pkg"));
        assert_eq!(options.root, Utf8PathBuf::from("pkg"));
        assert!(!options.no_pubmed);
        assert_eq!(options.endpoints, Endpoints::default());
    }

    #[test]
    fn overrides_apply_field_by_field() {
        let config: Config = serde_json::from_str(
            r#"{"no_pubmed": true, "endpoints": {"oai": "http://localhost:9000/oai"}}"#,
        )
        .unwrap();
        let options = ConfigLoader::resolve_config(config, Utf8PathBuf::from("."));
        assert!(options.no_pubmed);
        assert_eq!(options.endpoints.oai, "http://localhost:9000/oai");
        assert_eq!(
            options.endpoints.bundle_mirror,
            Endpoints::default().bundle_mirror
        );
    }
}
