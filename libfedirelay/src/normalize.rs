//! Text normalization for relayed posts
//!
//! Turns the markdown-flavoured text of a [`SourcePost`] into the plain text
//! posted on the destination: style markers are dropped, inline links are
//! spelled out, and a back-link to the original post is prepended.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::SourcePost;

/// Style markers removed verbatim from the text
const STYLE_MARKERS: [&str; 4] = ["**", "~~", "__", "`"];

/// `$-_` is the ASCII range from `$` to `_`: it covers `%`, `/`, `:`, `;`, `=`,
/// `?`, `[`, `]` and the other URL punctuation between them.
static MARKDOWN_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[([^\]\n]*)\]\((https?://[A-Za-z0-9$-_@.&+!*(),#~]+)\)")
        .expect("markdown link pattern is valid")
});

/// Builds canonical post text for one link host (e.g. `t.me`)
#[derive(Debug, Clone)]
pub struct Normalizer {
    link_host: String,
}

impl Normalizer {
    pub fn new(link_host: impl Into<String>) -> Self {
        Self {
            link_host: link_host.into(),
        }
    }

    /// Produce the text relayed for `post`
    ///
    /// Deterministic in `post` and the link host. Posts without a channel
    /// handle get an empty handle in the back-link; the dispatcher never
    /// relays those.
    pub fn normalize(&self, post: &SourcePost) -> String {
        let mut body = rewrite_links(&strip_style_markers(post.text.as_deref().unwrap_or("")));

        if let Some(origin) = &post.forward_origin {
            let annotation = match &origin.handle {
                Some(handle) => format!(
                    "[from {} (https://{}/{})]",
                    origin.title, self.link_host, handle
                ),
                None => format!("[from {}]", origin.title),
            };
            body = format!("{}\n\n{}", annotation, body);
        }

        let channel = post.channel_handle.as_deref().unwrap_or("");
        let mut text = format!(
            "[https://{}/{}/{}]\n\n{}",
            self.link_host, channel, post.message_id, body
        );

        if let Some(file_name) = &post.file_name {
            text.push_str(&format!("\n\n[File attached to the original post: {}]", file_name));
        }

        text
    }
}

/// Remove bold, strike, underline and inline-code markers
pub fn strip_style_markers(text: &str) -> String {
    STYLE_MARKERS
        .iter()
        .fold(text.to_string(), |acc, marker| acc.replace(marker, ""))
}

/// Rewrite `[label](url)` as `label url `
pub fn rewrite_links(text: &str) -> String {
    MARKDOWN_LINK.replace_all(text, "${1} ${2} ").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ForwardOrigin;

    fn post(text: &str) -> SourcePost {
        SourcePost::channel_post("c", 5, text)
    }

    #[test]
    fn test_bold_and_link() {
        let normalizer = Normalizer::new("P");
        let text = normalizer.normalize(&post("**bold** [label](https://x.test/a)"));

        assert!(text.starts_with("[https://P/c/5]\n\nbold label https://x.test/a "));
    }

    #[test]
    fn test_strip_all_markers() {
        assert_eq!(
            strip_style_markers("**b** __u__ ~~s~~ `code`"),
            "b u s code"
        );
    }

    #[test]
    fn test_link_with_special_characters() {
        let text = rewrite_links("see [docs](https://x.test/a_(b)?q=1&r=%20x!*,$@+) now");
        assert_eq!(text, "see docs https://x.test/a_(b)?q=1&r=%20x!*,$@+  now");
    }

    #[test]
    fn test_multiple_links() {
        let text = rewrite_links("[a](https://x.test/1) and [b](http://y.test/2)");
        assert_eq!(text, "a https://x.test/1  and b http://y.test/2 ");
    }

    #[test]
    fn test_link_with_bracketed_query() {
        let text = rewrite_links("see [shop](https://x.test/list?filter[size]=m&tag[]=a) now");
        assert_eq!(text, "see shop https://x.test/list?filter[size]=m&tag[]=a  now");
    }

    #[test]
    fn test_link_with_fragment_and_tilde() {
        let text = rewrite_links("[home](https://x.test/~user/page#intro)");
        assert_eq!(text, "home https://x.test/~user/page#intro ");
    }

    #[test]
    fn test_adjacent_links_without_separator() {
        // Brackets and parentheses are URL characters, so the first URL runs
        // on to the last closing parenthesis.
        let text = rewrite_links("[a](https://x.test/1)[b](https://y.test/2)");
        assert_eq!(text, "a https://x.test/1)[b](https://y.test/2 ");
    }

    #[test]
    fn test_malformed_links_untouched() {
        assert_eq!(rewrite_links("[label](not a url)"), "[label](not a url)");
        assert_eq!(rewrite_links("[unclosed(https://x.test)"), "[unclosed(https://x.test)");
        assert_eq!(rewrite_links("[label](ftp://x.test)"), "[label](ftp://x.test)");
        assert_eq!(rewrite_links("[a] [b](https://x.test)"), "[a] b https://x.test ");
    }

    #[test]
    fn test_empty_text_yields_prefix_only() {
        let normalizer = Normalizer::new("t.me");
        let mut empty = post("");
        assert_eq!(normalizer.normalize(&empty), "[https://t.me/c/5]\n\n");

        empty.text = None;
        assert_eq!(normalizer.normalize(&empty), "[https://t.me/c/5]\n\n");
    }

    #[test]
    fn test_forward_annotation() {
        let normalizer = Normalizer::new("t.me");
        let mut forwarded = post("hello");
        forwarded.forward_origin = Some(ForwardOrigin {
            title: "Other Channel".to_string(),
            handle: Some("other".to_string()),
        });

        assert_eq!(
            normalizer.normalize(&forwarded),
            "[https://t.me/c/5]\n\n[from Other Channel (https://t.me/other)]\n\nhello"
        );

        forwarded.forward_origin = Some(ForwardOrigin {
            title: "Private **Chat**".to_string(),
            handle: None,
        });
        // The origin title is not subject to marker stripping
        assert_eq!(
            normalizer.normalize(&forwarded),
            "[https://t.me/c/5]\n\n[from Private **Chat**]\n\nhello"
        );
    }

    #[test]
    fn test_file_note() {
        let normalizer = Normalizer::new("t.me");
        let mut with_file = post("report attached");
        with_file.file_name = Some("report.pdf".to_string());

        assert_eq!(
            normalizer.normalize(&with_file),
            "[https://t.me/c/5]\n\nreport attached\n\n[File attached to the original post: report.pdf]"
        );
    }

    #[test]
    fn test_deterministic() {
        let normalizer = Normalizer::new("t.me");
        let source = post("__same__ [input](https://x.test)");
        assert_eq!(normalizer.normalize(&source), normalizer.normalize(&source));
    }
}
