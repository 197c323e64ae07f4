use lazy_static::lazy_static;
use regex::Regex;
use websearch_core::DocType;

lazy_static! {
    static ref TITLE: Regex = Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("valid regex");
    static ref HEADING: Regex = Regex::new(r"(?is)<h[1-6][^>]*>(.*?)</h[1-6]>").expect("valid regex");
    static ref LINK_EL: Regex = Regex::new(r#"(?i)<link\b[^>]*\burl\s*=\s*"([^"]*)""#).expect("valid regex");
    static ref ANCHOR: Regex = Regex::new(r#"(?i)<a\b[^>]*\bhref\s*=\s*"([^"]*)""#).expect("valid regex");
    static ref TAGS: Regex = Regex::new(r"<[^>]*>").expect("valid regex");
}

pub const DEFAULT_TITLE: &str = "Untitled";

/// Content type from the address's extension. No extension at all means
/// plain text; an unrecognized extension means the page is not indexable.
pub fn classify(address: &str) -> Option<DocType> {
    match extension(address) {
        None => Some(DocType::PlainText),
        Some(ext) => match ext.as_str() {
            "rw" | "rwml" => Some(DocType::Rwml),
            "rws" => Some(DocType::Script),
            "txt" => Some(DocType::PlainText),
            "htm" | "html" => Some(DocType::Html),
            _ => None,
        },
    }
}

pub fn is_crawlable(address: &str) -> bool {
    classify(address).is_some()
}

fn extension(address: &str) -> Option<String> {
    let leaf = address.rsplit('/').next().unwrap_or(address);
    leaf.rsplit_once('.').map(|(_, ext)| ext.to_lowercase())
}

/// Title tag first, then the first heading, then (for scripts) a leading
/// comment line, then the placeholder.
pub fn extract_title(content: &str, doc_type: DocType) -> String {
    for re in [&*TITLE, &*HEADING] {
        if let Some(cap) = re.captures(content) {
            let cleaned = clean_fragment(&cap[1]);
            if !cleaned.is_empty() {
                return cleaned;
            }
        }
    }
    if doc_type == DocType::Script {
        if let Some(first) = content.lines().next() {
            let first = first.trim();
            if let Some(comment) = first.strip_prefix("//").or_else(|| first.strip_prefix('#')) {
                let comment = comment.trim();
                if !comment.is_empty() {
                    return comment.to_string();
                }
            }
        }
    }
    DEFAULT_TITLE.to_string()
}

fn clean_fragment(fragment: &str) -> String {
    let stripped = TAGS.replace_all(fragment, " ");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Outbound links in document order: `<link url="...">` elements and
/// `<a href="...">` anchors.
pub fn extract_links(content: &str) -> Vec<String> {
    let mut found: Vec<(usize, String)> = Vec::new();
    for re in [&*LINK_EL, &*ANCHOR] {
        for cap in re.captures_iter(content) {
            if let Some(m) = cap.get(1) {
                let target = m.as_str().trim();
                if !target.is_empty() {
                    found.push((m.start(), target.to_string()));
                }
            }
        }
    }
    found.sort_by_key(|(offset, _)| *offset);
    found.into_iter().map(|(_, target)| target).collect()
}

/// Resolve a link against the address it was found on. Fragments are
/// stripped; absolute-scheme links pass through; `/rooted` paths join the
/// base host; everything else joins the base directory with `.`/`..`
/// segments normalized. None when nothing is left to follow.
pub fn resolve_link(base: &str, link: &str) -> Option<String> {
    let link = link.split('#').next().unwrap_or("").trim();
    if link.is_empty() {
        return None;
    }
    if link.contains("://") {
        return Some(link.to_string());
    }
    let base = base.split('#').next().unwrap_or(base);
    if let Some(rooted) = link.strip_prefix('/') {
        return Some(format!("{}/{}", host(base), rooted));
    }
    let dir = match base.rfind('/') {
        Some(i) => &base[..i],
        None => base,
    };
    Some(normalize(&format!("{dir}/{link}")))
}

/// The host part of an address, scheme preserved when present.
pub fn host(address: &str) -> String {
    match address.split_once("://") {
        Some((scheme, rest)) => {
            format!("{}://{}", scheme, rest.split('/').next().unwrap_or(rest))
        }
        None => address.split('/').next().unwrap_or(address).to_string(),
    }
}

fn normalize(address: &str) -> String {
    let (prefix, path) = match address.split_once("://") {
        Some((scheme, rest)) => (format!("{scheme}://"), rest),
        None => (String::new(), address),
    };
    let mut parts: Vec<&str> = Vec::new();
    for seg in path.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                // never pop the host itself
                if parts.len() > 1 {
                    parts.pop();
                }
            }
            _ => parts.push(seg),
        }
    }
    format!("{prefix}{}", parts.join("/"))
}
