//! Configuration sources.
//!
//! A configuration is read from a local file, fetched over HTTP(S), or taken
//! from the default configuration bundled into the crate. Nothing is cached
//! between runs.

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::PathBuf;

/// The default configuration, used when no source is given.
pub const DEFAULT_CONFIG: &str = include_str!("../static/config.yaml");

/// Where the configuration document comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigLocation {
    /// An `http://` or `https://` URL.
    Url(String),
    /// A local file.
    Path(PathBuf),
    /// The bundled [`DEFAULT_CONFIG`].
    Bundled,
}

impl ConfigLocation {
    /// Classify a user-supplied location.
    ///
    /// ```
    /// use cadence::ConfigLocation;
    ///
    /// assert_eq!(ConfigLocation::parse(None), ConfigLocation::Bundled);
    /// assert!(matches!(
    ///     ConfigLocation::parse(Some("https://example.com/config.yaml")),
    ///     ConfigLocation::Url(_)
    /// ));
    /// assert!(matches!(
    ///     ConfigLocation::parse(Some("s3://bucket/config.yaml")),
    ///     ConfigLocation::Path(_)
    /// ));
    /// ```
    #[must_use]
    pub fn parse(location: Option<&str>) -> Self {
        let location = match location.map(str::trim) {
            Some(l) if !l.is_empty() => l,
            _ => return Self::Bundled,
        };

        match url::Url::parse(location) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Self::Url(location.to_string()),
            _ => Self::Path(PathBuf::from(shellexpand::tilde(location).as_ref())),
        }
    }

    /// Whether this is the bundled default.
    #[must_use]
    pub fn is_bundled(&self) -> bool {
        matches!(self, Self::Bundled)
    }

    /// Read the raw document text.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigurationUnreachable` if the URL cannot be fetched
    /// or the file does not exist or cannot be read.
    pub fn load(&self, transport: &dyn Transport) -> Result<String> {
        match self {
            Self::Bundled => {
                log::warn!("User did not supply a config. Using the default config.");
                Ok(DEFAULT_CONFIG.to_string())
            }
            Self::Url(url) => {
                log::info!("User supplied config being used.");
                transport.get(url).inspect_err(|_| {
                    log::error!(
                        "The URL used to get the user config.yaml file did not work! \
                         Please make sure your config is available."
                    );
                })
            }
            Self::Path(path) => {
                log::info!("User supplied config being used.");
                if !path.exists() {
                    let msg = format!(
                        "User supplied config {} does not exist. Please double-check your \
                         config path or use the default config path.",
                        path.display()
                    );
                    log::error!("{}", msg);
                    return Err(Error::unreachable(path.display().to_string(), msg));
                }
                fs::read_to_string(path)
                    .map_err(|e| Error::unreachable(path.display().to_string(), e.to_string()))
            }
        }
    }
}

impl fmt::Display for ConfigLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Url(url) => write!(f, "{}", url),
            Self::Path(path) => write!(f, "{}", path.display()),
            Self::Bundled => write!(f, "<bundled default>"),
        }
    }
}

/// Fetches documents over the network.
pub trait Transport: Send + Sync {
    /// Fetch the body at `url` as text.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigurationUnreachable` on any network failure.
    fn get(&self, url: &str) -> Result<String>;
}

/// Blocking HTTP transport backed by `ureq`.
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    /// Create a transport with default agent settings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            agent: ureq::Agent::new_with_defaults(),
        }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for UreqTransport {
    fn get(&self, url: &str) -> Result<String> {
        self.agent
            .get(url)
            .header("User-Agent", concat!("watchmaker/", env!("CARGO_PKG_VERSION")))
            .call()
            .and_then(|mut response| response.body_mut().read_to_string())
            .map_err(|e| Error::unreachable(url, e.to_string()))
    }
}

/// In-memory transport for tests.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    documents: HashMap<String, String>,
}

impl MockTransport {
    /// Create a transport that serves nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` at `url`.
    #[must_use]
    pub fn with_document(mut self, url: impl Into<String>, body: impl Into<String>) -> Self {
        self.documents.insert(url.into(), body.into());
        self
    }
}

impl Transport for MockTransport {
    fn get(&self, url: &str) -> Result<String> {
        self.documents
            .get(url)
            .cloned()
            .ok_or_else(|| Error::unreachable(url, "HTTP 404"))
    }
}
