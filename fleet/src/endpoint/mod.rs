//! Deployment endpoints
//!
//! SCM URIs carry basic-auth userinfo. An [`Endpoint`] keeps the credentials
//! apart from the URL so they are sent as a header and never printed.

pub mod resolver;

use std::fmt;

use percent_encoding::percent_decode_str;
use secrecy::{ExposeSecret, SecretString};
use url::Url;

use crate::errors::ResolveError;

/// Path appended to the SCM URI to trigger a deployment
const DEPLOY_PATH: &str = "deploy";

/// A dispatchable deployment endpoint
pub struct Endpoint {
    base: Url,
    deploy_url: Url,
    username: Option<String>,
    password: Option<SecretString>,
}

impl Endpoint {
    /// Parse a raw endpoint value, stripping surrounding quotes and whitespace
    pub fn parse(raw: &str) -> Result<Self, ResolveError> {
        let value = normalize(raw);
        if value.is_empty() {
            return Err(ResolveError::Missing);
        }

        let mut base = Url::parse(value).map_err(|e| ResolveError::Malformed(e.to_string()))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(ResolveError::Malformed(format!(
                "unsupported scheme: {}",
                base.scheme()
            )));
        }
        if base.host_str().map_or(true, str::is_empty) {
            return Err(ResolveError::Malformed("missing host".to_string()));
        }

        let username = Some(percent_decode(base.username())).filter(|u| !u.is_empty());
        let password = base.password().map(|p| SecretString::from(percent_decode(p)));
        base.set_username("")
            .map_err(|_| ResolveError::Malformed("cannot strip credentials".to_string()))?;
        base.set_password(None)
            .map_err(|_| ResolveError::Malformed("cannot strip credentials".to_string()))?;
        base.set_query(None);
        base.set_fragment(None);

        let mut deploy_url = base.clone();
        deploy_url
            .path_segments_mut()
            .map_err(|_| ResolveError::Malformed("not a base URL".to_string()))?
            .pop_if_empty()
            .push(DEPLOY_PATH);

        Ok(Self {
            base,
            deploy_url,
            username,
            password,
        })
    }

    /// `<endpoint>/deploy`, without credentials
    pub fn deploy_url(&self) -> &Url {
        &self.deploy_url
    }

    /// Host the deployment is sent to
    pub fn host(&self) -> &str {
        self.base.host_str().unwrap_or_default()
    }

    /// Basic-auth pair embedded in the original URI
    pub fn basic_auth(&self) -> Option<(&str, Option<&str>)> {
        self.username
            .as_deref()
            .map(|user| (user, self.password.as_ref().map(|p| p.expose_secret())))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.username {
            Some(user) => {
                let host = &self.base[url::Position::BeforeHost..];
                write!(f, "{}://{}:***@{}", self.base.scheme(), user, host)
            }
            None => write!(f, "{}", self.base),
        }
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Endpoint").field(&self.to_string()).finish()
    }
}

fn normalize(raw: &str) -> &str {
    raw.trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .trim()
}

/// Decode `%XX` escapes in URL userinfo; invalid escapes are kept as is
fn percent_decode(input: &str) -> String {
    percent_decode_str(input).decode_utf8_lossy().into_owned()
}
