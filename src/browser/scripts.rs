//! JavaScript expressions evaluated inside pages under test.
//!
//! Each constant is a single expression suitable for [`super::Page::evaluate`].

/// Root element of every capturable demo.
pub const DEMO_ROOT_SELECTOR: &str = ".demo-component";

/// First canvas rendered inside the demo root.
pub const DEMO_CANVAS_SELECTOR: &str = ".demo-component canvas";

/// `{ base, hrefs }`: the document base URI and every raw anchor href.
pub const HARVEST_LINKS: &str = r#"({
  base: document.baseURI,
  hrefs: Array.from(document.querySelectorAll('a[href]')).map(a => a.getAttribute('href'))
})"#;

pub const CURRENT_URL: &str = "window.location.href";

/// True once the site has published a non-empty demo catalog.
pub const DEMO_METADATA_READY: &str =
    "!!window.demoMetadata && Object.keys(window.demoMetadata).length > 0";

pub const DEMO_METADATA: &str = r#"Object.entries(window.demoMetadata || {}).map(([id, meta], index) => ({
  id,
  title: (meta && meta.title) || null,
  category: (meta && meta.category) || null,
  index
}))"#;

pub const DEMO_REGISTRY_KEYS: &str = "Object.keys(window.demoRegistry || {})";

pub const DEMO_ROOT_VISIBLE: &str = r#"(() => {
  const el = document.querySelector('.demo-component');
  if (!el) return false;
  const style = window.getComputedStyle(el);
  const rect = el.getBoundingClientRect();
  return style.display !== 'none' && style.visibility !== 'hidden' && rect.width > 0 && rect.height > 0;
})()"#;

/// `data-demo` of the rendered demo root, or null.
pub const LOADED_DEMO_ID: &str = r#"(() => {
  const el = document.querySelector('.demo-component');
  return el ? el.getAttribute('data-demo') : null;
})()"#;

pub const DEMO_HAS_CANVAS: &str = "!!document.querySelector('.demo-component canvas')";

pub const FOOTER_DEMO_TITLE: &str = r#"(() => {
  const el = document.querySelector('#footer-demo-title');
  return el && el.textContent ? el.textContent.trim() : null;
})()"#;
