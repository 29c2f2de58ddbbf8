//! Regex-level scraping of the pages along the chain. None of the hops need a
//! DOM: each step only looks for one href, one form or one token.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use url::Url;

static ANCHOR_HREF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<a\b[^>]*?\bhref\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+))"#)
        .expect("Failed to init anchor regexp")
});

static FORM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<form\b([^>]*)>(.*?)</form>").expect("Failed to init form regexp")
});

static INPUT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<input\b([^>]*)>").expect("Failed to init input regexp"));

static ATTRIBUTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)([A-Za-z_:][-A-Za-z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#)
        .expect("Failed to init attribute regexp")
});

static META_REFRESH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<meta\b([^>]*\bhttp-equiv\s*=\s*["']?refresh\b[^>]*)>"#)
        .expect("Failed to init meta refresh regexp")
});

static LOCATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)location(?:\.href)?\s*=\s*["']([^"']+)["']|location\.(?:replace|assign)\(\s*["']([^"']+)["']"#,
    )
    .expect("Failed to init location regexp")
});

static TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)pepe-[a-f0-9]{12,}").expect("Failed to init token regexp"));

/// The verification form the portal serves before revealing the token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Form {
    pub action: Option<String>,
    pub method: String,
    pub fields: Vec<(String, String)>,
}

impl Form {
    pub fn is_get(&self) -> bool {
        self.method == "GET"
    }
}

/// All anchor targets in document order, resolved against `base`.
pub fn links(base: &Url, html: &str) -> Vec<Url> {
    ANCHOR_HREF
        .captures_iter(html)
        .filter_map(|caps| first_group(&caps, 1..=3))
        .filter_map(|href| base.join(decode_entities(href).trim()).ok())
        .collect()
}

pub fn has_landing_form(html: &str) -> bool {
    html.contains(r#"id="landing""#) || html.contains("id='landing'")
}

pub fn landing_form(html: &str) -> Option<Form> {
    FORM.captures_iter(html).find_map(|caps| {
        let attrs = attributes(caps.get(1)?.as_str());
        if lookup(&attrs, "id") != Some("landing") {
            return None;
        }

        let fields = INPUT
            .captures_iter(caps.get(2)?.as_str())
            .filter_map(|input| {
                let attrs = attributes(input.get(1)?.as_str());
                let name = lookup(&attrs, "name")?.to_string();
                let value = lookup(&attrs, "value").unwrap_or_default().to_string();
                Some((name, value))
            })
            .collect();

        Some(Form {
            action: lookup(&attrs, "action")
                .filter(|action| !action.trim().is_empty())
                .map(str::to_string),
            method: lookup(&attrs, "method")
                .unwrap_or("post")
                .to_ascii_uppercase(),
            fields,
        })
    })
}

pub fn find_token(html: &str) -> Option<&str> {
    TOKEN.find(html).map(|m| m.as_str())
}

/// Target of a `<meta http-equiv="refresh">` or a scripted `location` change,
/// the way a browser would leave an interstitial page.
pub fn client_redirect(base: &Url, html: &str) -> Option<Url> {
    let meta = META_REFRESH.captures_iter(html).find_map(|caps| {
        let attrs = attributes(caps.get(1)?.as_str());
        refresh_target(lookup(&attrs, "content")?)
    });
    let target = meta.or_else(|| {
        LOCATION
            .captures_iter(html)
            .find_map(|caps| first_group(&caps, 1..=2).map(decode_entities))
    })?;

    base.join(target.trim()).ok()
}

// `content="0; url='https://host/next'"`
fn refresh_target(content: &str) -> Option<String> {
    let (_, rest) = content.split_once(';')?;
    let rest = rest.trim();
    let (key, target) = rest.split_once('=')?;
    if !key.trim().eq_ignore_ascii_case("url") {
        return None;
    }
    let target = target.trim().trim_matches(|c| c == '\'' || c == '"');
    (!target.is_empty()).then(|| target.to_string())
}

/// Undo the entity escaping WordPress and friends apply to `&` inside URLs.
pub fn decode_entities(raw: &str) -> String {
    raw.replace("&amp;", "&")
        .replace("&#038;", "&")
        .replace("&#38;", "&")
}

fn attributes(tag: &str) -> Vec<(String, String)> {
    ATTRIBUTE
        .captures_iter(tag)
        .filter_map(|caps| {
            let name = caps.get(1)?.as_str().to_ascii_lowercase();
            let value = first_group(&caps, 2..=4)?;
            Some((name, decode_entities(value)))
        })
        .collect()
}

fn lookup<'a>(attrs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.as_str())
}

fn first_group<'h>(caps: &Captures<'h>, groups: std::ops::RangeInclusive<usize>) -> Option<&'h str> {
    groups
        .filter_map(|idx| caps.get(idx))
        .map(|m| m.as_str())
        .next()
}
