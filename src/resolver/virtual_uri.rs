//! Virtual file identifiers for embedded payload entries.
//!
//! `k8s-embedded://<namespace>/<resource>/<key>?source=<b64url uri>&key=<b64url key>`
//!
//! The query parameters carry everything needed to find the payload again,
//! so nothing is stored between a read and a later write.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE;
use thiserror::Error;
use tower_lsp::lsp_types::Url;

pub const EMBEDDED_SCHEME: &str = "k8s-embedded";

#[derive(Debug, Error)]
pub enum VirtualUriError {
    #[error("Not a {EMBEDDED_SCHEME} URI: {0}")]
    Scheme(String),

    #[error("Missing query parameter {0}")]
    MissingParameter(&'static str),

    #[error("Invalid base64 in {parameter}: {source}")]
    Base64 {
        parameter: &'static str,
        source: base64::DecodeError,
    },

    #[error("Parameter {0} is not valid UTF-8")]
    Utf8(&'static str),

    #[error("Invalid URI {uri}: {message}")]
    InvalidUri { uri: String, message: String },
}

/// Identity of one payload entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedUri {
    pub namespace: String,
    pub name: String,
    pub key: String,
    /// Document holding the owning resource
    pub source: Url,
}

impl EmbeddedUri {
    pub fn new(namespace: &str, name: &str, key: &str, source: &Url) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
            key: key.to_string(),
            source: source.clone(),
        }
    }

    /// Resource name and key are percent-encoded as path segments
    pub fn to_url(&self) -> Result<Url, VirtualUriError> {
        let base = format!("{}://{}", EMBEDDED_SCHEME, self.namespace);
        let mut url = Url::parse(&base).map_err(|e| VirtualUriError::InvalidUri {
            uri: base.clone(),
            message: e.to_string(),
        })?;
        url.path_segments_mut()
            .map_err(|_| VirtualUriError::InvalidUri {
                uri: base,
                message: "cannot hold path segments".to_string(),
            })?
            .clear()
            .push(&self.name)
            .push(&self.key);
        url.set_query(Some(&format!(
            "source={}&key={}",
            URL_SAFE.encode(self.source.as_str()),
            URL_SAFE.encode(&self.key),
        )));
        Ok(url)
    }

    pub fn parse(uri: &Url) -> Result<Self, VirtualUriError> {
        if uri.scheme() != EMBEDDED_SCHEME {
            return Err(VirtualUriError::Scheme(uri.to_string()));
        }

        let mut source = None;
        let mut key = None;
        for (name, value) in uri.query_pairs() {
            match name.as_ref() {
                "source" => source = Some(decode_parameter("source", &value)?),
                "key" => key = Some(decode_parameter("key", &value)?),
                _ => {}
            }
        }
        let source = source.ok_or(VirtualUriError::MissingParameter("source"))?;
        let key = key.ok_or(VirtualUriError::MissingParameter("key"))?;
        let source = Url::parse(&source).map_err(|e| VirtualUriError::InvalidUri {
            uri: source.clone(),
            message: e.to_string(),
        })?;

        let segment = uri
            .path_segments()
            .and_then(|mut segments| segments.next())
            .unwrap_or_default();
        let name = urlencoding::decode(segment)
            .map_err(|_| VirtualUriError::Utf8("name"))?
            .into_owned();

        Ok(Self {
            namespace: uri.host_str().unwrap_or_default().to_string(),
            name,
            key,
            source,
        })
    }
}

fn decode_parameter(parameter: &'static str, value: &str) -> Result<String, VirtualUriError> {
    let bytes = URL_SAFE
        .decode(value)
        .map_err(|source| VirtualUriError::Base64 { parameter, source })?;
    String::from_utf8(bytes).map_err(|_| VirtualUriError::Utf8(parameter))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_url_encodes_source_and_key() {
        let source = Url::parse("file:///tmp/cm.yaml").unwrap();
        let embedded = EmbeddedUri::new("prod", "settings", "app.conf", &source);

        let url = embedded.to_url().unwrap();

        assert_eq!(url.scheme(), EMBEDDED_SCHEME);
        assert_eq!(url.host_str(), Some("prod"));
        assert_eq!(url.path(), "/settings/app.conf");
        assert_eq!(
            url.query(),
            Some("source=ZmlsZTovLy90bXAvY20ueWFtbA==&key=YXBwLmNvbmY=")
        );
    }

    #[test]
    fn parse_restores_identity() {
        let source = Url::parse("file:///work/space/secret.yaml").unwrap();
        let embedded = EmbeddedUri::new("default", "creds", "tls.crt", &source);

        let parsed = EmbeddedUri::parse(&embedded.to_url().unwrap()).unwrap();

        assert_eq!(parsed, embedded);
    }

    #[test]
    fn to_url_escapes_reserved_characters_in_segments() {
        let source = Url::parse("file:///tmp/cm.yaml").unwrap();
        let embedded = EmbeddedUri::new("default", "odd name", "a?b#c.conf", &source);

        let url = embedded.to_url().unwrap();

        assert_eq!(url.path(), "/odd%20name/a%3Fb%23c.conf");
        assert_eq!(url.fragment(), None);
        assert_eq!(EmbeddedUri::parse(&url).unwrap(), embedded);
    }

    #[test]
    fn parse_rejects_other_schemes() {
        let uri = Url::parse("file:///tmp/cm.yaml").unwrap();

        assert!(matches!(
            EmbeddedUri::parse(&uri),
            Err(VirtualUriError::Scheme(_))
        ));
    }

    #[test]
    fn parse_requires_source() {
        let uri = Url::parse("k8s-embedded://default/cm/a.conf?key=YS5jb25m").unwrap();

        assert!(matches!(
            EmbeddedUri::parse(&uri),
            Err(VirtualUriError::MissingParameter("source"))
        ));
    }
}
