//! Page token extractor: recognizes API factory type names and `AddNew*`
//! creation methods on a documentation page.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use cadkb_shared::DocTriple;

static FACTORY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(HybridShapeFactory|ShapeFactory|SurfaceFactory|Sketch\w+|HybridShape\w+|Part)\b")
        .expect("valid regex")
});

static METHOD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bAddNew[A-Za-z0-9_]+\b").expect("valid regex"));

static HEADING_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h1, h2, h3, title").expect("valid selector"));

static ANCHOR_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a").expect("valid selector"));

static CODE_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("code, pre, tt").expect("valid selector"));

static BODY_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("body").expect("valid selector"));

/// Anchor attributes that may carry a method name.
const ANCHOR_ATTRS: [&str; 3] = ["name", "id", "href"];

/// Extract every (factory, method, url) triple a page documents.
///
/// Returns the product of all recognized factories and all recognized
/// methods, sorted. A page with no methods yields nothing; a page with
/// methods but no factory falls back to `default_factory`.
pub fn extract_doc_triples(url: &str, html: &str, default_factory: &str) -> Vec<DocTriple> {
    let doc = Html::parse_document(html);

    let methods = find_methods(&doc);
    if methods.is_empty() {
        return Vec::new();
    }

    let mut factories = find_factories(html, &doc);
    if factories.is_empty() {
        debug!(url, default_factory, "no factory on page, using default");
        factories.insert(default_factory.to_string());
    }

    factories
        .iter()
        .flat_map(|factory| {
            methods
                .iter()
                .map(move |method| DocTriple::new(factory.as_str(), method.as_str(), url))
        })
        .collect()
}

/// Factory names across the raw markup plus the first match of each
/// heading or title.
fn find_factories(html: &str, doc: &Html) -> BTreeSet<String> {
    let mut factories: BTreeSet<String> = FACTORY_RE
        .captures_iter(html)
        .map(|c| c[1].to_string())
        .collect();

    for heading in doc.select(&HEADING_SEL) {
        if let Some(c) = FACTORY_RE.captures(&element_text(heading)) {
            factories.insert(c[1].to_string());
        }
    }

    factories
}

/// Method names from anchor attributes and code-like blocks, falling back to
/// the whole visible text.
fn find_methods(doc: &Html) -> BTreeSet<String> {
    let mut methods = BTreeSet::new();

    for anchor in doc.select(&ANCHOR_SEL) {
        for attr in ANCHOR_ATTRS {
            if let Some(m) = anchor.value().attr(attr).and_then(|v| METHOD_RE.find(v)) {
                methods.insert(m.as_str().to_string());
            }
        }
    }

    for block in doc.select(&CODE_SEL) {
        collect_methods(&element_text(block), &mut methods);
    }

    if methods.is_empty() {
        collect_methods(&visible_text(doc), &mut methods);
    }

    methods
}

fn collect_methods(text: &str, out: &mut BTreeSet<String>) {
    out.extend(METHOD_RE.find_iter(text).map(|m| m.as_str().to_string()));
}

/// Whitespace-joined text of an element.
fn element_text(el: ElementRef<'_>) -> String {
    el.text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn visible_text(doc: &Html) -> String {
    match doc.select(&BODY_SEL).next() {
        Some(body) => element_text(body),
        None => element_text(doc.root_element()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "http://docs.example.com/online/interfaces/HybridShapeFactory.htm";

    fn pairs(triples: &[DocTriple]) -> Vec<(String, String)> {
        triples
            .iter()
            .map(|t| (t.factory.clone(), t.method.clone()))
            .collect()
    }

    #[test]
    fn factory_and_methods_from_anchors_and_code() {
        let html = r#"<html><head><title>HybridShapeFactory (Object)</title></head><body>
            <a name="AddNewPlaneOffset"></a>
            <a href="HybridShapeFactory.htm#AddNewPointCoord">AddNewPointCoord</a>
            <pre>Set oPlane = oFactory.AddNewLinePtDir(oPoint, oDir, 0, 20, False)</pre>
        </body></html>"#;

        let triples = extract_doc_triples(URL, html, "Part");
        assert_eq!(
            pairs(&triples),
            vec![
                ("HybridShapeFactory".into(), "AddNewLinePtDir".into()),
                ("HybridShapeFactory".into(), "AddNewPlaneOffset".into()),
                ("HybridShapeFactory".into(), "AddNewPointCoord".into()),
            ]
        );
        assert!(triples.iter().all(|t| t.url == URL));
    }

    #[test]
    fn cartesian_product_over_factories() {
        let html = r#"<html><body>
            <h1>ShapeFactory</h1><h2>Part</h2>
            <code>AddNewPad</code><code>AddNewPocket</code>
        </body></html>"#;

        let triples = extract_doc_triples(URL, html, "HybridShapeFactory");
        assert_eq!(triples.len(), 4);
        let factories: BTreeSet<_> = triples.iter().map(|t| t.factory.as_str()).collect();
        assert_eq!(factories, BTreeSet::from(["Part", "ShapeFactory"]));
    }

    #[test]
    fn default_factory_when_none_recognized() {
        let html = "<html><body><tt>AddNewSpline</tt></body></html>";
        let triples = extract_doc_triples(URL, html, "HybridShapeFactory");
        assert_eq!(
            pairs(&triples),
            vec![("HybridShapeFactory".into(), "AddNewSpline".into())]
        );
    }

    #[test]
    fn visible_text_is_a_fallback_for_methods() {
        let html = "<html><body><p>Use AddNewExtrude to sweep a profile.</p></body></html>";
        let triples = extract_doc_triples(URL, html, "HybridShapeFactory");
        assert_eq!(triples.len(), 1);
        assert_eq!(triples[0].method, "AddNewExtrude");
    }

    #[test]
    fn page_without_methods_yields_nothing() {
        let html = "<html><head><title>HybridShapeFactory</title></head><body><p>Overview</p></body></html>";
        assert!(extract_doc_triples(URL, html, "HybridShapeFactory").is_empty());
    }

    #[test]
    fn embedded_identifiers_are_not_matched() {
        let html = "<html><body><code>xAddNewLine MyPartFactory</code></body></html>";
        assert!(extract_doc_triples(URL, html, "HybridShapeFactory").is_empty());
    }
}
