use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use url::Url;

static PARAGRAPH: Lazy<Option<Selector>> = Lazy::new(|| Selector::parse("p").ok());

/// Non-empty, trimmed text of every `<p>` inside a rendered container, in
/// document order.
pub fn paragraph_texts(container_html: &str) -> Vec<String> {
    let Some(selector) = PARAGRAPH.as_ref() else {
        return Vec::new();
    };
    let fragment = Html::parse_fragment(container_html);

    fragment
        .select(selector)
        .map(|p| p.text().collect::<String>().trim().to_string())
        .filter(|text| !text.is_empty())
        .collect()
}

/// Article body from a container's outer HTML: paragraphs joined by newlines,
/// or the container's full text when it has no paragraphs.
pub fn body_text(container_html: &str) -> String {
    let paragraphs = paragraph_texts(container_html);
    if !paragraphs.is_empty() {
        return paragraphs.join("\n");
    }

    let fragment = Html::parse_fragment(container_html);
    fragment.root_element().text().collect::<String>().trim().to_string()
}

/// Resolve a possibly relative `href`/`src` against the page it was read from.
/// Unparseable input is returned trimmed but otherwise untouched.
pub fn resolve_url(base: &str, raw: &str) -> String {
    let raw = raw.trim();
    match Url::parse(base).and_then(|base| base.join(raw)) {
        Ok(resolved) => resolved.to_string(),
        Err(_) => raw.to_string(),
    }
}
