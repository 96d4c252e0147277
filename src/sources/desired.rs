use crate::util::validate_url;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// SEC-003: Maximum allowed nesting depth for OPML outline elements.
const MAX_OPML_DEPTH: usize = 50;

#[derive(Debug, Error)]
pub enum DesiredListError {
    #[error("Failed to read desired feeds from {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// SEC-003: OPML nesting depth exceeds safety limit.
    #[error("OPML nesting depth exceeds maximum of {0} levels")]
    MaxDepthExceeded(usize),

    #[error("XML parse error: {0}")]
    XmlParse(String),

    #[error("Invalid JSON feed list")]
    Json(#[from] serde_json::Error),
}

/// Declaration formats the desired list can be written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DesiredFormat {
    Opml,
    Json,
    /// One URI per line; blank lines and `#` comments are skipped.
    Lines,
}

impl DesiredFormat {
    /// Picks a format from the file extension; anything unknown is a line list.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("opml") | Some("xml") => DesiredFormat::Opml,
            Some("json") => DesiredFormat::Json,
            _ => DesiredFormat::Lines,
        }
    }
}

/// Reads the ordered list of feed URIs the account should be subscribed to.
///
/// Order and duplicates are preserved. Entries the service could not possibly
/// fetch are logged but kept.
pub async fn load_desired(path: &Path) -> Result<Vec<String>, DesiredListError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| DesiredListError::Io {
            path: path.to_path_buf(),
            source,
        })?;

    let format = DesiredFormat::from_path(path);
    let uris = parse_desired(&content, format)?;

    for uri in &uris {
        if let Err(e) = validate_url(uri) {
            tracing::warn!(
                url = %uri,
                error = %e,
                "Desired feed URL looks unusable, keeping it anyway"
            );
        }
    }

    tracing::info!(
        path = %path.display(),
        format = ?format,
        count = uris.len(),
        "Loaded desired feeds"
    );
    Ok(uris)
}

pub fn parse_desired(
    content: &str,
    format: DesiredFormat,
) -> Result<Vec<String>, DesiredListError> {
    match format {
        DesiredFormat::Opml => parse_opml_urls(content),
        DesiredFormat::Json => Ok(serde_json::from_str(content)?),
        DesiredFormat::Lines => Ok(parse_lines(content)),
    }
}

fn parse_lines(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Collects every `xmlUrl` attribute in document order, at any nesting level.
///
/// Folder outlines (no `xmlUrl`) are traversed but contribute nothing.
fn parse_opml_urls(content: &str) -> Result<Vec<String>, DesiredListError> {
    // SEC-002: quick-xml (0.37) never expands <!ENTITY> declarations; custom
    // entities fail in `decode_and_unescape_value()` instead of resolving.
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut urls = Vec::new();
    let mut buf = Vec::new();
    let mut depth: usize = 0;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.name().as_ref() == b"outline" => {
                depth += 1;
                if depth > MAX_OPML_DEPTH {
                    return Err(DesiredListError::MaxDepthExceeded(MAX_OPML_DEPTH));
                }
                urls.extend(xml_url(&e, &reader)?);
            }
            Ok(Event::Empty(e)) if e.name().as_ref() == b"outline" => {
                urls.extend(xml_url(&e, &reader)?);
            }
            Ok(Event::End(e)) if e.name().as_ref() == b"outline" => {
                depth = depth.saturating_sub(1);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(DesiredListError::XmlParse(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    Ok(urls)
}

fn xml_url(
    e: &quick_xml::events::BytesStart<'_>,
    reader: &Reader<&[u8]>,
) -> Result<Option<String>, DesiredListError> {
    for attr_result in e.attributes() {
        let attr = match attr_result {
            Ok(attr) => attr,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping malformed OPML attribute");
                continue;
            }
        };
        if attr.key.as_ref() == b"xmlUrl" {
            let value = attr
                .decode_and_unescape_value(reader.decoder())
                .map_err(|e| DesiredListError::XmlParse(e.to_string()))?;
            let value = value.trim();
            return Ok((!value.is_empty()).then(|| value.to_string()));
        }
    }
    Ok(None)
}
