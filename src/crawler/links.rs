//! Same-origin link harvesting from a loaded page.

use serde::Deserialize;
use tracing::{debug, warn};
use url::{Origin, Url};

use crate::browser::{scripts, Page};
use crate::Result;

#[derive(Debug, Deserialize)]
struct HarvestedLinks {
    base: String,
    #[serde(default)]
    hrefs: Vec<Option<String>>,
}

/// Parses `url` and drops its fragment.
pub fn normalize_url(url: &str) -> Result<Url> {
    let mut parsed = Url::parse(url)?;
    parsed.set_fragment(None);
    Ok(parsed)
}

/// Resolves `href` against `base`, keeping it only if it stays on `origin`.
///
/// Anchors, non-HTTP schemes and hrefs that fail to parse yield `None`.
pub fn resolve_same_origin(base: &Url, href: &str, origin: &Origin) -> Option<Url> {
    let href = href.trim();
    if href.is_empty()
        || href.starts_with('#')
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("javascript:")
    {
        return None;
    }

    let mut resolved = base.join(href).ok()?;
    if !matches!(resolved.scheme(), "http" | "https") || &resolved.origin() != origin {
        return None;
    }
    resolved.set_fragment(None);
    Some(resolved)
}

/// Extracts same-origin anchor targets from pages, in document order.
#[derive(Debug, Clone)]
pub struct LinkDiscoverer {
    origin: Origin,
}

impl LinkDiscoverer {
    pub fn new(start: &Url) -> Self {
        Self {
            origin: start.origin(),
        }
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    /// Fragment-stripped, de-duplicated same-origin links of `base` + `hrefs`.
    pub fn filter<'a>(&self, base: &Url, hrefs: impl IntoIterator<Item = &'a str>) -> Vec<String> {
        let mut links: Vec<String> = Vec::new();
        for href in hrefs {
            match resolve_same_origin(base, href, &self.origin) {
                Some(url) => {
                    let url = String::from(url);
                    if !links.contains(&url) {
                        links.push(url);
                    }
                }
                None => debug!(href, "skipping link"),
            }
        }
        links
    }

    /// Harvests links from a live page. A page that cannot be inspected yields no links.
    pub async fn harvest(&self, page: &dyn Page, page_url: &str) -> Vec<String> {
        let raw = match page.evaluate(scripts::HARVEST_LINKS).await {
            Ok(value) => value,
            Err(err) => {
                warn!(url = page_url, %err, "could not read links from page");
                return Vec::new();
            }
        };
        let harvested: HarvestedLinks = match serde_json::from_value(raw) {
            Ok(links) => links,
            Err(err) => {
                warn!(url = page_url, %err, "unexpected link harvest payload");
                return Vec::new();
            }
        };
        let base = match Url::parse(&harvested.base).or_else(|_| Url::parse(page_url)) {
            Ok(base) => base,
            Err(err) => {
                warn!(url = page_url, %err, "page has no usable base URL");
                return Vec::new();
            }
        };
        self.filter(&base, harvested.hrefs.iter().flatten().map(String::as_str))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn discoverer() -> (LinkDiscoverer, Url) {
        let base = Url::parse("http://localhost:5000/demos/index.html").unwrap();
        (LinkDiscoverer::new(&base), base)
    }

    #[test]
    fn resolves_relative_links() {
        let (d, base) = discoverer();
        let links = d.filter(&base, ["physics.html", "/about", "../top"]);
        assert_eq!(
            links,
            vec![
                "http://localhost:5000/demos/physics.html",
                "http://localhost:5000/about",
                "http://localhost:5000/top",
            ]
        );
    }

    #[test]
    fn strips_fragments_and_dedupes() {
        let (d, base) = discoverer();
        let links = d.filter(&base, ["/a#one", "/a#two", "/a"]);
        assert_eq!(links, vec!["http://localhost:5000/a"]);
    }

    #[test]
    fn drops_cross_origin_and_special_schemes() {
        let (d, base) = discoverer();
        let links = d.filter(
            &base,
            [
                "https://localhost:5000/secure",
                "http://localhost:5001/other-port",
                "http://example.com/",
                "mailto:someone@example.com",
                "javascript:void(0)",
                "#section",
                "",
            ],
        );
        assert!(links.is_empty(), "got {links:?}");
    }

    #[test]
    fn malformed_href_is_skipped_alone() {
        let (d, base) = discoverer();
        let links = d.filter(&base, ["http://[::1", "/ok"]);
        assert_eq!(links, vec!["http://localhost:5000/ok"]);
    }

    #[test]
    fn normalize_url_strips_fragment() {
        let url = normalize_url("http://localhost:5000/demos/#physics/electric-field").unwrap();
        assert_eq!(url.as_str(), "http://localhost:5000/demos/");
        assert!(normalize_url("not a url").is_err());
    }
}
