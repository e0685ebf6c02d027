// src/crawl/links.rs
// =============================================================================
// Canonicalizes and filters candidate links before they reach the frontier.
//
// Two rules decide whether a link is worth crawling:
// - it must live on exactly the same hostname as the seed
// - its path must look like a document: "/", a trailing "/", or one of the
//   page-like suffixes (.htm, .html, .php, .asp, .aspx, .jsp)
//
// Everything else on the same host (images, scripts, stylesheets, API
// endpoints without a suffix) is dropped.
// =============================================================================

use url::Url;

/// Path suffixes that count as documents, compared case-insensitively
const DOCUMENT_SUFFIXES: &[&str] = &[".htm", ".html", ".php", ".asp", ".aspx", ".jsp"];

// Resolves `raw` against `base` and strips the fragment
//
// Returns None for anything that can't be parsed; callers drop those links
// silently.
//
// Examples:
//   normalize("/docs/#intro", "https://example.com/a/") -> "https://example.com/docs/"
//   normalize("page.html", "https://example.com/a/")    -> "https://example.com/a/page.html"
pub fn normalize(raw: &str, base: &str) -> Option<String> {
    let base = Url::parse(base).ok()?;
    let mut resolved = base.join(raw.trim()).ok()?;
    resolved.set_fragment(None);
    Some(resolved.to_string())
}

// Decides whether a canonical URL belongs in the frontier
pub fn is_admissible(canonical_url: &str, domain: &str) -> bool {
    let Ok(parsed) = Url::parse(canonical_url) else {
        return false;
    };

    if !is_document_path(parsed.path()) {
        return false;
    }

    parsed.host_str() == Some(domain)
}

fn is_document_path(path: &str) -> bool {
    if path == "/" || path.ends_with('/') {
        return true;
    }
    let lowered = path.to_ascii_lowercase();
    DOCUMENT_SUFFIXES
        .iter()
        .any(|suffix| lowered.ends_with(suffix))
}

/// Parses a crawl seed; only absolute http(s) URLs with a host are accepted
pub fn parse_seed(seed: &str) -> Result<Url, String> {
    let mut url = Url::parse(seed.trim()).map_err(|e| e.to_string())?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(format!("unsupported scheme '{}'", url.scheme()));
    }
    if url.host_str().is_none() {
        return Err("URL has no host".to_string());
    }
    url.set_fragment(None);
    Ok(url)
}
