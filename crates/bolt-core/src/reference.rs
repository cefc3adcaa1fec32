//! Pattern matching over release-train references and variable values.

use crate::layer::{resolve_first, Layer};
use crate::upstream::UpstreamResult;
use regex::Regex;
use std::sync::OnceLock;

/// Release key returned when nothing in the reference names a release.
///
/// Requests made with it fail upstream with a clear not-found or
/// authorization error instead of touching a guessed release.
pub const TABLE_SENTINEL: &str = "table";

/// Placeholder sometimes left as the first `releaseComponents` token.
const SPK_PLACEHOLDER: &str = "SPK_PROD";

/// Upper-case words in release names that are never service package keys.
const NON_SPK_WORDS: &[&str] = &["WMTO", "DEVOPS"];

const FRAGMENT_MARKER: &str = "#/";
const TABLE_SUFFIX: &str = "/relationships/table";

static RELEASE_RE: OnceLock<Regex> = OnceLock::new();
static SPK_DIGITS_RE: OnceLock<Regex> = OnceLock::new();
static UPPER_RUN_RE: OnceLock<Regex> = OnceLock::new();
static ORG_TAG_RE: OnceLock<Regex> = OnceLock::new();
static NAME_SPLIT_RE: OnceLock<Regex> = OnceLock::new();

fn release_re() -> &'static Regex {
    RELEASE_RE.get_or_init(|| Regex::new(r"Release[a-zA-Z0-9]+").unwrap())
}

fn spk_digits_re() -> &'static Regex {
    SPK_DIGITS_RE.get_or_init(|| Regex::new(r"SPK\d+").unwrap())
}

fn upper_run_re() -> &'static Regex {
    UPPER_RUN_RE.get_or_init(|| Regex::new(r"[A-Z]{3,}").unwrap())
}

fn org_tag_re() -> &'static Regex {
    ORG_TAG_RE.get_or_init(|| Regex::new(r"[A-Z]{5}-{3}[A-Z]{2}").unwrap())
}

fn name_split_re() -> &'static Regex {
    NAME_SPLIT_RE.get_or_init(|| Regex::new(r"[/_\-\s]").unwrap())
}

/// Undo the URL encoding browsers apply to fragment references.
pub fn decode_reference(reference: &str) -> String {
    reference
        .trim()
        .replace("%23", "#")
        .replace("%2F", "/")
        .replace("%2f", "/")
}

// ---------------------------------------------------------------------------
// Release key
// ---------------------------------------------------------------------------

fn direct_pattern(reference: &str) -> UpstreamResult<Option<String>> {
    Ok(release_re()
        .find(reference)
        .map(|m| m.as_str().to_string()))
}

fn fragment_table_segment(reference: &str) -> UpstreamResult<Option<String>> {
    if !(reference.contains(FRAGMENT_MARKER) && reference.contains(TABLE_SUFFIX)) {
        return Ok(None);
    }
    Ok(scan_release_segments(reference))
}

fn stripped_path_segment(reference: &str) -> UpstreamResult<Option<String>> {
    let stripped = reference
        .replace(FRAGMENT_MARKER, "/")
        .replace(TABLE_SUFFIX, "");
    Ok(scan_release_segments(&stripped))
}

/// Find a `/`-delimited segment naming a release. Compound segments such as
/// `Folder1-Folder2-Release9` yield their `Release*` piece.
fn scan_release_segments(path: &str) -> Option<String> {
    for part in path.split('/').filter(|p| p.contains("Release")) {
        if part.contains("-Release") {
            if let Some(piece) = part.split('-').find(|p| p.starts_with("Release")) {
                return Some(piece.to_string());
            }
        } else if part.starts_with("Release") {
            return Some(part.to_string());
        }
    }
    None
}

/// Derive the release key from a release-train reference.
///
/// Falls back to [`TABLE_SENTINEL`] when no layer matches.
pub fn extract_release_key(reference: &str) -> String {
    let decoded = decode_reference(reference);
    let layers: [Layer<str, String>; 3] = [
        Layer {
            id: "release-pattern",
            resolve: direct_pattern,
        },
        Layer {
            id: "fragment-table-segment",
            resolve: fragment_table_segment,
        },
        Layer {
            id: "stripped-path-segment",
            resolve: stripped_path_segment,
        },
    ];
    match resolve_first(&layers, decoded.as_str()) {
        Ok(Some(key)) => key,
        _ => {
            tracing::warn!(reference = %decoded, "no release key in reference");
            TABLE_SENTINEL.to_string()
        }
    }
}

// ---------------------------------------------------------------------------
// SPK
// ---------------------------------------------------------------------------

/// True for tokens with at least one letter and no lower-case letters.
pub fn is_upper_token(token: &str) -> bool {
    token.chars().any(char::is_alphabetic) && !token.chars().any(char::is_lowercase)
}

fn is_spk_candidate(token: &str) -> bool {
    is_upper_token(token) && token.chars().count() >= 3
}

/// First token of a `releaseComponents` value, unless it is the placeholder.
pub fn spk_from_release_components(value: &str) -> Option<String> {
    value
        .split_whitespace()
        .next()
        .filter(|t| *t != SPK_PLACEHOLDER)
        .map(str::to_string)
}

/// First upper-case word of a `releaseName` value that can name a package.
pub fn spk_from_release_name(value: &str) -> Option<String> {
    name_split_re()
        .split(value)
        .find(|part| is_spk_candidate(part) && !NON_SPK_WORDS.contains(part))
        .map(str::to_string)
}

/// Best-effort SPK guess from the reference text alone.
///
/// Tries `SPK<digits>`, then a whole upper-case word, then any run of three
/// or more capitals.
pub fn spk_from_reference(reference: &str) -> Option<String> {
    if let Some(m) = spk_digits_re().find(reference) {
        return Some(m.as_str().to_string());
    }
    if let Some(word) = name_split_re().split(reference).find(|p| is_spk_candidate(p)) {
        return Some(word.to_string());
    }
    upper_run_re()
        .find(reference)
        .map(|m| m.as_str().to_string())
}

// ---------------------------------------------------------------------------
// Organization tag
// ---------------------------------------------------------------------------

/// Tag from a `releaseConfigRepoLocation` value shaped `X@repo_name@...`.
///
/// The last two `_`-separated segments of the repository name, joined by
/// `---` and upper-cased: `spk@team_vgpdr_bh@x` yields `VGPDR---BH`.
pub fn org_from_repo_location(value: &str) -> Option<String> {
    let repo = value.split('@').nth(1)?;
    let parts: Vec<&str> = repo.split('_').collect();
    if parts.len() < 3 {
        return None;
    }
    let tag = parts[parts.len() - 2..].join("---").to_uppercase();
    (!tag.is_empty()).then_some(tag)
}

/// First `AAAAA---BB`-shaped tag in `text`.
pub fn match_org_tag(text: &str) -> Option<String> {
    org_tag_re().find(text).map(|m| m.as_str().to_string())
}
