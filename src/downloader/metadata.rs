use std::sync::LazyLock;

use regex::Regex;

use crate::error::MetadataError;

static VERSIONING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<versioning>(.*?)</versioning>").unwrap());
static VERSIONS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<versions>(.*?)</versions>").unwrap());
static VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<version(?:\s[^>]*)?>(.*?)</version>").unwrap());
static COMMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());
static ENTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(#x[0-9a-fA-F]+|#[0-9]+|amp|lt|gt|quot|apos);").unwrap()
});

/// The `<versioning>` block of `maven-metadata.xml`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Versioning {
    pub latest: Option<String>,
    pub release: Option<String>,
    pub last_updated: Option<String>,
    pub versions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MavenMetadata {
    pub group_id: Option<String>,
    pub artifact_id: String,
    pub versioning: Versioning,
}

impl MavenMetadata {
    /// Reads the fields this crate needs from a `maven-metadata.xml` body.
    ///
    /// This is a tag scanner, not an XML parser. Comments are dropped, element
    /// text is entity-decoded and may be wrapped in CDATA, and an empty or
    /// self-closing element (`<latest/>`) reads as absent. Namespace prefixes
    /// are not understood, attributes are ignored, and for repeated elements
    /// the first one wins.
    pub fn parse(document: &str) -> Result<Self, MetadataError> {
        let document = COMMENT.replace_all(document, "");
        let document = document.as_ref();
        // groupId/artifactId are read outside <versioning> only
        let versioning_block = VERSIONING
            .captures(document)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str());
        let header = match VERSIONING.find(document) {
            Some(m) => format!("{}{}", &document[..m.start()], &document[m.end()..]),
            None => document.to_string(),
        };

        let artifact_id =
            element(&header, "artifactId").ok_or(MetadataError::MissingElement("artifactId"))?;

        let versioning = match versioning_block {
            Some(block) => Versioning {
                latest: element(block, "latest"),
                release: element(block, "release"),
                last_updated: element(block, "lastUpdated"),
                versions: VERSIONS
                    .captures(block)
                    .and_then(|c| c.get(1))
                    .map(|list| {
                        VERSION
                            .captures_iter(list.as_str())
                            .filter_map(|c| c.get(1))
                            .filter_map(|m| text(m.as_str()))
                            .collect()
                    })
                    .unwrap_or_default(),
            },
            None => Versioning::default(),
        };

        Ok(MavenMetadata {
            group_id: element(&header, "groupId"),
            artifact_id,
            versioning,
        })
    }

    /// `latest`, falling back to `release`, then to the last listed version.
    pub fn latest_version(&self) -> Option<&str> {
        self.versioning
            .latest
            .as_deref()
            .or(self.versioning.release.as_deref())
            .or(self.versioning.versions.last().map(String::as_str))
    }
}

/// Text of the first `<name>` element. Empty and self-closing elements count
/// as absent.
fn element(document: &str, name: &str) -> Option<String> {
    let open = format!("<{}", name);
    let close = format!("</{}>", name);
    let mut rest = document;
    loop {
        let tail = &rest[rest.find(&open)? + open.len()..];
        let tag_len = tail.find('>')?;
        let attrs = &tail[..tag_len];
        let body = &tail[tag_len + 1..];
        if attrs.ends_with('/') && (attrs.len() == 1 || attrs.starts_with(char::is_whitespace)) {
            return None;
        }
        if attrs.is_empty() || attrs.starts_with(char::is_whitespace) {
            return text(&body[..body.find(&close)?]);
        }
        // a longer tag sharing the prefix, e.g. <version> vs <versioning>
        rest = body;
    }
}

/// Element content with CDATA unwrapped and entities decoded, trimmed.
fn text(raw: &str) -> Option<String> {
    let mut out = String::new();
    let mut rest = raw;
    while let Some(start) = rest.find("<![CDATA[") {
        out.push_str(&decode(&rest[..start]));
        let cdata = &rest[start + "<![CDATA[".len()..];
        let end = cdata.find("]]>").unwrap_or(cdata.len());
        out.push_str(&cdata[..end]);
        rest = cdata.get(end + "]]>".len()..).unwrap_or("");
    }
    out.push_str(&decode(rest));

    let trimmed = out.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn decode(raw: &str) -> String {
    ENTITY
        .replace_all(raw, |caps: &regex::Captures| {
            let entity = &caps[1];
            let decoded = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                _ => entity
                    .strip_prefix("#x")
                    .map(|hex| u32::from_str_radix(hex, 16))
                    .unwrap_or_else(|| entity[1..].parse())
                    .ok()
                    .and_then(char::from_u32),
            };
            decoded.map_or_else(|| caps[0].to_string(), String::from)
        })
        .into_owned()
}
