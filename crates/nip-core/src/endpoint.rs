//! Endpoint model: an ordered list of interchangeable service mirrors.
//!
//! The first endpoint is the primary, the rest are fallbacks tried in
//! configured order. Endpoints are parsed and validated once, at load time,
//! so the fetch loop never deals with malformed URLs.

use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum EndpointError {
    #[error("invalid endpoint URL `{url}`: {source}")]
    Invalid {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("endpoint `{url}` uses unsupported scheme `{scheme}` (expected http or https)")]
    UnsupportedScheme { url: String, scheme: String },
}

/// One mirror, immutable for the duration of a call.
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub url: Url,
    /// Position in the configured list (0 = primary).
    pub ordinal: usize,
}

/// A concrete URL to try for one work item, derived from an endpoint.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub url: Url,
    pub ordinal: usize,
}

/// Ordered, validated mirror list.
#[derive(Debug, Clone, Default)]
pub struct EndpointSet {
    endpoints: Vec<Endpoint>,
}

impl EndpointSet {
    /// Parse and validate configured URLs, preserving order.
    pub fn parse<S: AsRef<str>>(urls: &[S]) -> Result<Self, EndpointError> {
        let mut endpoints = Vec::with_capacity(urls.len());
        for (ordinal, raw) in urls.iter().enumerate() {
            let raw = raw.as_ref();
            let url = Url::parse(raw).map_err(|source| EndpointError::Invalid {
                url: raw.to_string(),
                source,
            })?;
            match url.scheme() {
                "http" | "https" => {}
                other => {
                    return Err(EndpointError::UnsupportedScheme {
                        url: raw.to_string(),
                        scheme: other.to_string(),
                    })
                }
            }
            endpoints.push(Endpoint { url, ordinal });
        }
        Ok(Self { endpoints })
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Endpoint> {
        self.endpoints.iter()
    }

    /// Resolve one work-item path against every mirror, in order.
    ///
    /// A relative path is joined onto each mirror base; an absolute URL stands
    /// on its own and yields a single candidate (a mirror list adds nothing to
    /// an already-fully-qualified item). An empty path yields the mirrors
    /// themselves, which is the bulk-dump case.
    pub fn resolve(&self, item_path: &str) -> Result<Vec<Candidate>, EndpointError> {
        if let Ok(absolute) = Url::parse(item_path) {
            return Ok(vec![Candidate {
                url: absolute,
                ordinal: 0,
            }]);
        }
        let mut out = Vec::with_capacity(self.endpoints.len());
        for ep in &self.endpoints {
            if item_path.is_empty() {
                out.push(Candidate {
                    url: ep.url.clone(),
                    ordinal: ep.ordinal,
                });
                continue;
            }
            let url = ep.url.join(item_path).map_err(|source| EndpointError::Invalid {
                url: format!("{} + {}", ep.url, item_path),
                source,
            })?;
            out.push(Candidate {
                url,
                ordinal: ep.ordinal,
            });
        }
        Ok(out)
    }
}
