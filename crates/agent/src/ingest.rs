//! Document extraction and summarization for knowledge ingestion.
//! Deliberately modest: tag stripping plus frequency-scored sentence
//! selection, good enough to seed the keyword index.

use regex::Regex;

use courier_core::normalize::tokenize;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtractedDocument {
    pub title: String,
    pub content: String,
    pub site: String,
}

/// Pull a title and readable text out of fetched HTML (plain text and
/// JSON pass through untouched apart from whitespace cleanup).
pub fn extract_content(raw: &str, url: &str, content_type: &str) -> ExtractedDocument {
    let site = host_of(url);

    if !content_type.contains("text/html") {
        return ExtractedDocument {
            title: site.clone(),
            content: collapse_blank_lines(raw.trim()),
            site,
        };
    }

    let title = Regex::new(r"(?is)<title[^>]*>(.*?)</title>")
        .expect("title regex is valid")
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().split(" - ").next().unwrap_or("").trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| site.clone());

    let mut body = raw.to_string();
    for pattern in [
        r"(?is)<script[^>]*>.*?</script>",
        r"(?is)<style[^>]*>.*?</style>",
        r"(?is)<nav[^>]*>.*?</nav>",
        r"(?is)<header[^>]*>.*?</header>",
        r"(?is)<footer[^>]*>.*?</footer>",
    ] {
        body = Regex::new(pattern)
            .expect("strip regex is valid")
            .replace_all(&body, "")
            .into_owned();
    }

    // Keep paragraph boundaries so passage chunking has structure.
    body = Regex::new(r"(?is)</(p|div|h[1-6]|li|br)>")
        .expect("break regex is valid")
        .replace_all(&body, "\n\n")
        .into_owned();
    body = Regex::new(r"(?s)<[^>]*>")
        .expect("tag regex is valid")
        .replace_all(&body, " ")
        .into_owned();

    let decoded = body
        .replace("&nbsp;", " ")
        .replace("&quot;", "\"")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">");

    ExtractedDocument { title, content: collapse_blank_lines(&decoded), site }
}

/// Frequency-scored extractive summary: the two highest-scoring
/// sentences, score normalized by length so long sentences do not win
/// by default.
pub fn summarize(content: &str) -> String {
    let sentences: Vec<&str> = content
        .split(['.', '!', '?', '\n'])
        .map(str::trim)
        .filter(|sentence| sentence.chars().count() > 20)
        .collect();
    if sentences.is_empty() {
        return String::new();
    }

    let mut word_counts: std::collections::HashMap<String, usize> = std::collections::HashMap::new();
    for token in tokenize(content) {
        if token.chars().count() > 3 {
            *word_counts.entry(token).or_insert(0) += 1;
        }
    }

    let mut scored: Vec<(f64, &str)> = sentences
        .iter()
        .map(|sentence| {
            let tokens = tokenize(sentence);
            let score: usize =
                tokens.iter().map(|token| word_counts.get(token).copied().unwrap_or(0)).sum();
            (score as f64 / (tokens.len() + 1) as f64, *sentence)
        })
        .collect();
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

    scored
        .iter()
        .take(2)
        .map(|(_, sentence)| *sentence)
        .collect::<Vec<_>>()
        .join(". ")
        + "."
}

fn host_of(url: &str) -> String {
    url.split("//")
        .nth(1)
        .unwrap_or(url)
        .split('/')
        .next()
        .unwrap_or(url)
        .trim_start_matches("www.")
        .to_string()
}

fn collapse_blank_lines(text: &str) -> String {
    let mut lines: Vec<&str> = Vec::new();
    let mut previous_blank = false;
    for line in text.lines().map(str::trim) {
        if line.is_empty() {
            if !previous_blank && !lines.is_empty() {
                lines.push("");
            }
            previous_blank = true;
        } else {
            lines.push(line);
            previous_blank = false;
        }
    }
    while lines.last() == Some(&"") {
        lines.pop();
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::{extract_content, summarize};

    #[test]
    fn extracts_title_and_strips_markup() {
        let html = r#"<html><head><title>Base Network - Docs</title>
            <script>var x = 1;</script><style>body {}</style></head>
            <body><nav>menu</nav><p>Base is a layer two network.</p>
            <p>Fees stay low because execution happens off mainnet.</p>
            <footer>footer junk</footer></body></html>"#;

        let doc = extract_content(html, "https://www.example.com/base", "text/html");

        assert_eq!(doc.title, "Base Network");
        assert_eq!(doc.site, "example.com");
        assert!(doc.content.contains("Base is a layer two network"));
        assert!(!doc.content.contains("var x"));
        assert!(!doc.content.contains("menu"));
        assert!(!doc.content.contains("footer junk"));
    }

    #[test]
    fn paragraphs_survive_as_chunk_boundaries() {
        let html = "<p>First paragraph with enough words.</p><p>Second paragraph with enough words.</p>";
        let doc = extract_content(html, "https://example.com", "text/html");
        assert!(doc.content.contains("\n\n"));
    }

    #[test]
    fn plain_text_passes_through() {
        let doc = extract_content("just plain text", "https://example.com/a", "text/plain");
        assert_eq!(doc.content, "just plain text");
        assert_eq!(doc.title, "example.com");
    }

    #[test]
    fn summarize_picks_central_sentences() {
        let content = "Session keys grant limited signing power. Session keys expire daily. \
                       The weather in lisbon is occasionally windy. Session keys protect funds.";
        let tldr = summarize(content);
        assert!(tldr.contains("Session keys"));
        assert!(tldr.ends_with('.'));
    }

    #[test]
    fn summarize_of_empty_content_is_empty() {
        assert_eq!(summarize(""), "");
        assert_eq!(summarize("short. tiny."), "");
    }
}
