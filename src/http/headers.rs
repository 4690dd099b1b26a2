use http::HeaderMap;
use std::cmp::Ordering;

// https://www.w3.org/Protocols/rfc2616/rfc2616-sec13.html#sec13.5.1
const HOP_BY_HOP: [&str; 8] = [
    "Connection",
    "Keep-Alive",
    "Proxy-Authenticate",
    "Proxy-Authorization",
    "TE",
    "Trailers",
    "Transfer-Encoding",
    "Upgrade",
];

pub fn is_end_to_end(name: &str) -> bool {
    !HOP_BY_HOP.iter().any(|h| h.eq_ignore_ascii_case(name))
}

fn display_class(name: &str) -> u8 {
    if name.eq_ignore_ascii_case("server") {
        0
    } else if is_end_to_end(name) {
        1
    } else {
        2
    }
}

/// Display order: `Server` first, then end-to-end headers, then hop-by-hop
/// headers, each group in ascending lexical order.
pub fn compare_header_names(a: &str, b: &str) -> Ordering {
    display_class(a)
        .cmp(&display_class(b))
        .then_with(|| a.cmp(b))
}

pub fn sort_header_names<S: AsRef<str>>(names: &mut [S]) {
    names.sort_by(|a, b| compare_header_names(a.as_ref(), b.as_ref()));
}

/// `content-type` -> `Content-Type`.
pub fn canonical_name(name: &str) -> String {
    let mut canonical = String::with_capacity(name.len());
    let mut upper = true;
    for c in name.chars() {
        if upper {
            canonical.push(c.to_ascii_uppercase());
        } else {
            canonical.push(c.to_ascii_lowercase());
        }
        upper = c == '-';
    }
    canonical
}

/// Response headers as `(Name, value)` pairs in display order, with the
/// values of repeated headers joined by `,`.
pub fn display_headers(headers: &HeaderMap) -> Vec<(String, String)> {
    let mut names: Vec<String> = headers.keys().map(|k| canonical_name(k.as_str())).collect();
    sort_header_names(&mut names);

    names
        .into_iter()
        .map(|name| {
            let value = headers
                .get_all(name.as_str())
                .iter()
                .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
                .collect::<Vec<_>>()
                .join(",");
            (name, value)
        })
        .collect()
}
