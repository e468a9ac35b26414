use once_cell::sync::Lazy;
use regex::Regex;

static LINE_BREAK_EXPR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(<\s*br\s*/?\s*>|</p\s*>|</div\s*>|</li\s*>)").unwrap());
static TAG_EXPR: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());
static URL_EXPR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(<)?https?://(www\.)?[-a-zA-Z0-9@:%._+~#=]{1,256}\.[a-zA-Z0-9()]{1,6}\b[-a-zA-Z0-9()@:%_+.~#?&/=]*").unwrap()
});

/// Default description parser: reduce simple HTML to plain text. Block ends
/// and explicit breaks become newlines, remaining tags are dropped, common
/// entities are decoded.
pub fn plaintext(text: &str) -> String {
    let text = LINE_BREAK_EXPR.replace_all(text, "\n");
    let text = TAG_EXPR.replace_all(&text, "");
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
        .trim()
        .to_string()
}

/// Expand `:{key}name:` username shortcuts using `template`, with `$1`
/// standing for the captured name.
pub fn expand_username_shortcuts(text: &str, key: &str, template: &str) -> String {
    let expr = Regex::new(&format!(":{}([A-Za-z0-9_.-]+):", regex::escape(key)))
        .expect("shortcut key forms a valid expression");
    expr.replace_all(text, |caps: &regex::Captures| {
        template.replace("$1", &caps[1])
    })
    .into_owned()
}

/// Wrap every bare URL in angle brackets; URLs already wrapped stay as they
/// are.
pub fn bracket_links(text: &str) -> String {
    URL_EXPR
        .replace_all(text, |caps: &regex::Captures| {
            if caps.get(1).is_some() {
                caps[0].to_string()
            } else {
                format!("<{}>", &caps[0])
            }
        })
        .into_owned()
}
