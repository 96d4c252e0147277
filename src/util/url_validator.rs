use std::net::IpAddr;
use thiserror::Error;
use url::Url;

/// Errors that can occur during URL validation.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    /// The URL string could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// The URL points to a private/internal IP address.
    #[error("Private IP address not reachable by the service: {0}")]
    PrivateIp(String),
    /// The URL points to localhost.
    #[error("Localhost not reachable by the service")]
    Localhost,
    /// The service host is plain http and not a loopback address.
    #[error("Insecure service host: HTTPS required (except localhost for testing)")]
    InsecureHost,
}

/// Checks that a desired feed URL is something the remote service could fetch.
///
/// The service crawls feeds from its own network, so besides the http(s)
/// scheme requirement, localhost and private address ranges are flagged.
/// Callers decide what to do with a failing URL; the desired-list loader only
/// warns, since the service has the final say.
///
/// # Examples
///
/// ```
/// use blursync::util::validate_url;
///
/// assert!(validate_url("https://example.com/feed.xml").is_ok());
/// assert!(validate_url("http://192.168.1.1/feed").is_err());
/// assert!(validate_url("file:///etc/passwd").is_err());
/// ```
pub fn validate_url(url_str: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str)?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }

    if let Some(host) = url.host_str() {
        if host == "localhost" {
            return Err(UrlValidationError::Localhost);
        }

        // Strip brackets from IPv6 addresses for parsing
        let host_for_parse = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host);

        if let Ok(ip) = host_for_parse.parse::<IpAddr>() {
            if ip.is_loopback() {
                return Err(UrlValidationError::Localhost);
            }
            if is_private_ip(&ip) {
                return Err(UrlValidationError::PrivateIp(ip.to_string()));
            }
        }
    }

    Ok(url)
}

/// Validates the NewsBlur base URL the session cookie will be sent to.
///
/// HTTPS is required so the session token never travels in clear text. Plain
/// http is allowed only for `localhost` and `127.0.0.1`, which is what local
/// mock servers bind to.
pub fn validate_service_host(host: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(host)?;

    match url.scheme() {
        "https" => Ok(url),
        "http" => match url.host_str() {
            Some("localhost") | Some("127.0.0.1") => {
                tracing::warn!(host = %host, "Using non-HTTPS service host (localhost only)");
                Ok(url)
            }
            _ => Err(UrlValidationError::InsecureHost),
        },
        scheme => Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }
}

fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(ipv4) => {
            ipv4.is_private() || ipv4.is_loopback() || ipv4.is_link_local() || ipv4.is_unspecified()
        }
        IpAddr::V6(ipv6) => {
            if ipv6.is_loopback() || ipv6.is_unspecified() {
                return true;
            }
            let segments = ipv6.segments();
            // Unique Local (fc00::/7)
            let is_unique_local = (segments[0] & 0xfe00) == 0xfc00;
            // Link-Local (fe80::/10)
            let is_link_local = (segments[0] & 0xffc0) == 0xfe80;
            is_unique_local || is_link_local
        }
    }
}
