// Connection string codec
// Parses postgres:// and mysql:// URLs and swaps the credentials they carry

use std::borrow::Cow;
use std::fmt;
use url::Url;

use crate::error::{IamAuthError, Result};

/// Placeholder written over passwords in loggable connection strings
const REDACTED: &str = "****";

/// Database URL schemes that support IAM authentication
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Postgres,
    Mysql,
}

impl Scheme {
    /// Detect the scheme from the literal prefix of a connection string
    pub fn detect(connection_string: &str) -> Option<Self> {
        if connection_string.starts_with("postgres://") {
            Some(Scheme::Postgres)
        } else if connection_string.starts_with("mysql://") {
            Some(Scheme::Mysql)
        } else {
            None
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "postgres" => Some(Scheme::Postgres),
            "mysql" => Some(Scheme::Mysql),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Postgres => "postgres",
            Scheme::Mysql => "mysql",
        }
    }

    /// Port the server listens on when the connection string omits one
    pub fn default_port(&self) -> u16 {
        match self {
            Scheme::Postgres => 5432,
            Scheme::Mysql => 3306,
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parsed view of a database connection string
///
/// Keeps the text the caller wrote; credential changes only rewrite the
/// userinfo. The password is never printed by `Debug`.
#[derive(Clone)]
pub struct ConnectionDescriptor {
    scheme: Scheme,
    raw: String,
    url: Url,
}

impl ConnectionDescriptor {
    /// Parse a postgres:// or mysql:// connection string
    pub fn parse(connection_string: &str) -> Result<Self> {
        let scheme = Scheme::detect(connection_string).ok_or(IamAuthError::UnsupportedScheme)?;
        let url = parse_url(connection_string)?;
        Ok(Self {
            scheme,
            raw: connection_string.to_string(),
            url,
        })
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// Username, percent-decoded
    pub fn username(&self) -> Option<String> {
        decode_component(self.url.username())
    }

    /// Password, percent-decoded
    pub fn password(&self) -> Option<String> {
        self.url.password().and_then(decode_component)
    }

    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }

    /// Explicit port, or the scheme's default when none is written
    pub fn port(&self) -> u16 {
        self.url.port().unwrap_or_else(|| self.scheme.default_port())
    }

    /// The `host:port` authority tokens are bound to
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host(), self.port())
    }

    /// Path exactly as written
    pub fn path(&self) -> &str {
        RawParts::split(&self.raw).map_or("", |parts| parts.path())
    }

    /// Query parameters in the order they appear
    pub fn query(&self) -> Vec<(String, String)> {
        self.url
            .query_pairs()
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect()
    }

    /// Serialize back to a connection string
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Replace the username and/or password
    ///
    /// `None` leaves the username untouched but clears the password.
    pub fn set_credentials(&mut self, username: Option<&str>, password: Option<&str>) -> Result<()> {
        let (raw, _) = update_credentials(&self.raw, username, password)?;
        self.url = parse_url(&raw)?;
        self.raw = raw;
        Ok(())
    }
}

impl fmt::Debug for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionDescriptor")
            .field("scheme", &self.scheme)
            .field("username", &self.username())
            .field("password", &self.url.password().map(|_| REDACTED))
            .field("host", &self.host())
            .field("port", &self.port())
            .field("path", &self.path())
            .field("query", &self.url.query())
            .finish()
    }
}

/// Parse a connection string for IAM use
///
/// Returns the endpoint (`host:port`) the token must be signed for and the
/// connection string with its password removed. A non-empty `configured_user`
/// replaces any username embedded in the string.
pub fn parse_for_credential_swap(
    connection_string: &str,
    configured_user: &str,
) -> Result<(String, String)> {
    if Scheme::detect(connection_string).is_none() {
        return Err(IamAuthError::UnsupportedScheme);
    }

    let username = (!configured_user.is_empty()).then_some(configured_user);
    let (modified, endpoint) = update_credentials(connection_string, username, None)?;
    Ok((endpoint, modified))
}

/// Set the password of a connection string to `secret`
///
/// The secret is percent-escaped for the userinfo component, so tokens
/// containing `/`, `+` or `=` survive the round trip.
pub fn inject_secret(connection_string: &str, secret: &str) -> Result<String> {
    let (modified, _) = update_credentials(connection_string, None, Some(secret))?;
    Ok(modified)
}

/// Loggable form of a connection string with the password masked
pub fn redact_password(connection_string: &str) -> String {
    match (Url::parse(connection_string), RawParts::split(connection_string)) {
        (Ok(url), Some(parts)) if url.password().is_some() => {
            parts.with_userinfo(parts.username(), Some(REDACTED))
        }
        (Ok(_), Some(_)) => connection_string.to_string(),
        _ => "<unparseable connection string>".to_string(),
    }
}

/// A connection string split around its userinfo
///
/// Everything but the userinfo is borrowed verbatim from the input.
struct RawParts<'a> {
    /// `scheme://`
    prefix: &'a str,
    userinfo: Option<&'a str>,
    /// Host, port, path, query and fragment
    remainder: &'a str,
}

impl<'a> RawParts<'a> {
    fn split(connection_string: &'a str) -> Option<Self> {
        let start = connection_string.find("://")? + 3;
        let (prefix, rest) = connection_string.split_at(start);
        let authority_end = rest.find(&['/', '?', '#'][..]).unwrap_or(rest.len());

        let parts = match rest[..authority_end].rfind('@') {
            Some(at) => Self {
                prefix,
                userinfo: Some(&rest[..at]),
                remainder: &rest[at + 1..],
            },
            None => Self {
                prefix,
                userinfo: None,
                remainder: rest,
            },
        };
        Some(parts)
    }

    /// Username as written, still percent-encoded
    fn username(&self) -> &'a str {
        self.userinfo
            .map(|userinfo| userinfo.split_once(':').map_or(userinfo, |(name, _)| name))
            .unwrap_or_default()
    }

    fn path(&self) -> &'a str {
        let end = self.remainder.find(&['?', '#'][..]).unwrap_or(self.remainder.len());
        let before_query = &self.remainder[..end];
        before_query.find('/').map_or("", |slash| &before_query[slash..])
    }

    /// Reassemble with already-encoded userinfo components
    fn with_userinfo(&self, username: &str, password: Option<&str>) -> String {
        let mut out = String::with_capacity(
            self.prefix.len() + username.len() + password.map_or(0, str::len) + self.remainder.len() + 2,
        );
        out.push_str(self.prefix);
        if !username.is_empty() || password.is_some() {
            out.push_str(username);
            if let Some(password) = password {
                out.push(':');
                out.push_str(password);
            }
            out.push('@');
        }
        out.push_str(self.remainder);
        out
    }
}

/// Validate once, rewrite username and password independently
///
/// Returns the modified string and the endpoint. Only the userinfo changes,
/// every other byte is copied from the input.
fn update_credentials(
    connection_string: &str,
    username: Option<&str>,
    password: Option<&str>,
) -> Result<(String, String)> {
    let url = parse_url(connection_string)?;
    let endpoint = endpoint_of(&url);
    let parts = RawParts::split(connection_string).ok_or_else(|| {
        IamAuthError::MalformedConnectionString("missing scheme separator".to_string())
    })?;

    // `%` is not escaped by the userinfo rules, so encode fully or decoding would alter the value
    let username = match username {
        Some(username) => urlencoding::encode(username),
        None => Cow::Borrowed(parts.username()),
    };
    let password = password.map(urlencoding::encode);

    Ok((parts.with_userinfo(&username, password.as_deref()), endpoint))
}

fn parse_url(connection_string: &str) -> Result<Url> {
    let url = Url::parse(connection_string)
        .map_err(|e| IamAuthError::MalformedConnectionString(e.to_string()))?;

    if url.host_str().map_or(true, str::is_empty) {
        return Err(IamAuthError::MalformedConnectionString(
            "missing host".to_string(),
        ));
    }

    Ok(url)
}

fn endpoint_of(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    let port = url
        .port()
        .or_else(|| Scheme::from_name(url.scheme()).map(|scheme| scheme.default_port()));

    match port {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    }
}

fn decode_component(raw: &str) -> Option<String> {
    if raw.is_empty() {
        return None;
    }
    Some(
        urlencoding::decode(raw)
            .map(|decoded| decoded.into_owned())
            .unwrap_or_else(|_| raw.to_string()),
    )
}
