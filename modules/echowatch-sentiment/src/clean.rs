use regex::Regex;

/// Max characters handed to either classifier tier.
const MAX_CLASSIFY_CHARS: usize = 512;

/// Normalize mention text before classification: drop the reshare
/// prefix, URLs and entity escapes, collapse ellipses and whitespace,
/// cap the length.
pub fn clean_text(text: &str) -> String {
    let reshare_re = Regex::new(r"^RT\s+@\w+:\s*").expect("valid reshare regex");
    let url_re = Regex::new(r"https?://\S+").expect("valid url regex");
    let ws_re = Regex::new(r"\s+").expect("valid whitespace regex");

    let s = reshare_re.replace(text, "");
    let s = url_re.replace_all(&s, "");
    let s = s
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("...", " ")
        .replace('\u{2026}', " ");
    let s = ws_re.replace_all(&s, " ");
    let s = s.trim();

    s.chars().take(MAX_CLASSIFY_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_reshare_prefix() {
        assert_eq!(clean_text("RT @someone: great work"), "great work");
    }

    #[test]
    fn strips_urls_and_entities() {
        assert_eq!(
            clean_text("Read this https://t.co/abc123 now &amp; share"),
            "Read this now & share"
        );
    }

    #[test]
    fn collapses_ellipses_and_whitespace() {
        assert_eq!(clean_text("well...   that\u{2026}happened"), "well that happened");
    }

    #[test]
    fn caps_length() {
        let long = "word ".repeat(200);
        assert!(clean_text(&long).chars().count() <= 512);
    }

    #[test]
    fn empty_input_stays_empty() {
        assert_eq!(clean_text(""), "");
        assert_eq!(clean_text("   "), "");
    }
}
