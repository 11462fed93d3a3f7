//! Placeholder codec: reversible transform between markdown with embedded
//! images and markdown with indexed placeholder tokens + an ordered image
//! table.
//!
//! ## Why placeholders?
//!
//! The generation step rewrites prose wholesale. Sending it literal
//! `![alt](url)` markup invites the model to paraphrase URLs, drop images,
//! or invent new ones. Instead [`decode`] swaps every image for an opaque
//! token (`[[img:3]]`) the prompt tells the model to preserve verbatim, and
//! [`encode`] swaps the tokens back afterwards — with a structural fallback
//! for tokens the model lost anyway, so no sourced image is ever silently
//! dropped (at the cost of possibly relocating it).
//!
//! The image parser is a small typed scanner (text runs + image nodes)
//! rather than a regex chain: escaped brackets and parenthesised URLs are
//! exactly the inputs where regexes over markdown go wrong.
//!
//! Everything here is pure and synchronous; no I/O.
//!
//! A second, independent token family lives at the bottom of this module:
//! the `[IMAGE_n: alt]` markers that generate-mode prompts instruct the
//! model to emit for images it wants sourced. Those markers never pass
//! through [`decode`]/[`encode`]; the scheduler resolves them directly.

use once_cell::sync::Lazy;
use regex::Regex;

/// One image lifted out of the text during [`decode`].
///
/// Ephemeral: lives only for the duration of one processing attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageEntry {
    /// 1-based position in document order; the stable ordering key.
    pub index: usize,
    /// Descriptive text; doubles as the image-search query.
    pub alt_text: String,
    /// Original URL as found in the input (may be foreign/untrusted).
    pub source_url: String,
    /// Optional quoted title from the markup.
    pub title: Option<String>,
    /// Durable URL once uploaded; `None` until resolved.
    pub resolved_url: Option<String>,
}

impl ImageEntry {
    /// The placeholder token substituted into the text for this image.
    /// Embeds the index so re-encode is order-independent.
    pub fn token(&self) -> String {
        format!("[[img:{}]]", self.index)
    }

    /// The URL to emit: durable if resolved, otherwise the original.
    pub fn url(&self) -> &str {
        self.resolved_url.as_deref().unwrap_or(&self.source_url)
    }

    /// Render this entry back to markdown image markup.
    pub fn markup(&self) -> String {
        match &self.title {
            Some(t) => format!("![{}]({} \"{}\")", self.alt_text, self.url(), t),
            None => format!("![{}]({})", self.alt_text, self.url()),
        }
    }
}

/// Result of [`decode`]: text with tokens + the ordered image table.
#[derive(Debug, Clone)]
pub struct Decoded {
    pub stripped: String,
    pub entries: Vec<ImageEntry>,
}

// ── Parser ───────────────────────────────────────────────────────────────

/// A parsed run of the input: literal text or one image node.
#[derive(Debug, PartialEq, Eq)]
enum Segment {
    Text(String),
    Image {
        alt: String,
        url: String,
        title: Option<String>,
    },
}

/// Scan `text` into text runs and image nodes.
///
/// Recognises `![alt](url)` and `![alt](url "title")` anywhere, including
/// several on one line. `\]` inside alt text is honoured; URLs may contain
/// balanced parentheses. Anything that fails to parse as an image stays
/// literal text.
fn parse(text: &str) -> Vec<Segment> {
    let chars: Vec<char> = text.chars().collect();
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut i = 0;

    while i < chars.len() {
        if chars[i] == '!' && i + 1 < chars.len() && chars[i + 1] == '[' {
            if let Some((segment, next)) = parse_image(&chars, i) {
                if !literal.is_empty() {
                    segments.push(Segment::Text(std::mem::take(&mut literal)));
                }
                segments.push(segment);
                i = next;
                continue;
            }
        }
        literal.push(chars[i]);
        i += 1;
    }
    if !literal.is_empty() {
        segments.push(Segment::Text(literal));
    }
    segments
}

/// Try to parse an image starting at `start` (which points at `!`).
/// Returns the node and the index just past it.
fn parse_image(chars: &[char], start: usize) -> Option<(Segment, usize)> {
    let mut i = start + 2; // past "!["

    // Alt text, honouring backslash escapes.
    let mut alt = String::new();
    loop {
        let c = *chars.get(i)?;
        match c {
            '\\' => {
                alt.push(*chars.get(i + 1)?);
                i += 2;
            }
            ']' => break,
            '\n' => return None, // image markup does not span lines
            _ => {
                alt.push(c);
                i += 1;
            }
        }
    }
    i += 1; // past ']'

    if *chars.get(i)? != '(' {
        return None;
    }
    i += 1; // past '('

    // Destination: everything up to the matching ')', tracking nesting.
    let mut dest = String::new();
    let mut depth = 1usize;
    loop {
        let c = *chars.get(i)?;
        match c {
            '(' => {
                depth += 1;
                dest.push(c);
            }
            ')' => {
                depth -= 1;
                if depth == 0 {
                    break;
                }
                dest.push(c);
            }
            '\n' => return None,
            _ => dest.push(c),
        }
        i += 1;
    }
    i += 1; // past ')'

    let (url, title) = split_dest(&dest);
    if url.is_empty() {
        return None;
    }
    Some((
        Segment::Image {
            alt,
            url: url.to_string(),
            title,
        },
        i,
    ))
}

/// Split a link destination into URL and optional quoted title.
fn split_dest(dest: &str) -> (&str, Option<String>) {
    let trimmed = dest.trim();
    if let Some(space) = trimmed.find(char::is_whitespace) {
        let (url, rest) = trimmed.split_at(space);
        let rest = rest.trim();
        if rest.len() >= 2 && rest.starts_with('"') && rest.ends_with('"') {
            return (url, Some(rest[1..rest.len() - 1].to_string()));
        }
    }
    (trimmed, None)
}

// ── Decode / encode ──────────────────────────────────────────────────────

/// Replace every embedded image with an indexed placeholder token and
/// return the ordered image table.
///
/// Indices are assigned left-to-right, top-to-bottom, starting at 1.
/// Deterministic: the same input always yields the same output.
pub fn decode(text: &str) -> Decoded {
    let mut stripped = String::with_capacity(text.len());
    let mut entries = Vec::new();

    for segment in parse(text) {
        match segment {
            Segment::Text(t) => stripped.push_str(&t),
            Segment::Image { alt, url, title } => {
                let entry = ImageEntry {
                    index: entries.len() + 1,
                    alt_text: alt,
                    source_url: url,
                    title,
                    resolved_url: None,
                };
                stripped.push_str(&entry.token());
                entries.push(entry);
            }
        }
    }

    Decoded { stripped, entries }
}

static RE_STRAY_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[\[img:\d+\]\]").unwrap());

/// Substitute image markup back into (externally rewritten) text.
///
/// Three passes, in order:
/// 1. Direct token substitution wherever the model preserved a token.
/// 2. Structural re-insertion for images whose token was paraphrased away:
///    each goes immediately after the next section heading that is not
///    already followed by an image.
/// 3. Anything still unplaced is appended at the end under a `---`
///    separator.
///
/// Stray tokens the model invented (or duplicated) are removed, so no raw
/// placeholder ever reaches the stored article.
pub fn encode(text: &str, entries: &[ImageEntry]) -> String {
    let mut out = text.to_string();
    let mut unplaced: Vec<&ImageEntry> = Vec::new();

    for entry in entries {
        let token = entry.token();
        if out.contains(&token) {
            // Replace the first occurrence; duplicates fall to the stray pass.
            out = out.replacen(&token, &entry.markup(), 1);
        } else {
            unplaced.push(entry);
        }
    }

    out = RE_STRAY_TOKEN.replace_all(&out, "").to_string();

    if unplaced.is_empty() {
        return out;
    }

    let mut lines: Vec<String> = out.lines().map(str::to_string).collect();
    let mut appendix: Vec<&ImageEntry> = Vec::new();

    for entry in unplaced {
        match next_open_heading(&lines) {
            Some(pos) => {
                lines.insert(pos + 1, String::new());
                lines.insert(pos + 2, entry.markup());
            }
            None => appendix.push(entry),
        }
    }

    let mut result = lines.join("\n");
    if !appendix.is_empty() {
        result.push_str("\n\n---\n");
        for entry in appendix {
            result.push('\n');
            result.push_str(&entry.markup());
        }
    }
    result
}

/// Index of the first heading line whose following content is not already
/// an image.
fn next_open_heading(lines: &[String]) -> Option<usize> {
    for (i, line) in lines.iter().enumerate() {
        if !is_heading(line) {
            continue;
        }
        let followed_by_image = lines
            .iter()
            .skip(i + 1)
            .find(|l| !l.trim().is_empty())
            .map(|l| l.trim().starts_with("!["))
            .unwrap_or(false);
        if !followed_by_image {
            return Some(i);
        }
    }
    None
}

fn is_heading(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with('#') && trimmed.trim_start_matches('#').starts_with(' ')
}

// ── Model-emitted markers (generate mode) ────────────────────────────────

/// A numbered `[IMAGE_n: alt]` marker emitted by the model in generate
/// mode. A distinct token family, independent of placeholder tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageMarker {
    pub index: usize,
    pub alt_text: String,
    /// The exact matched text, for substitution.
    pub raw: String,
}

static RE_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[IMAGE_(\d+):\s*([^\]]+?)\s*\]").unwrap());

/// Extract every image marker from generated text, in document order.
pub fn find_markers(text: &str) -> Vec<ImageMarker> {
    RE_MARKER
        .captures_iter(text)
        .filter_map(|caps| {
            let index = caps[1].parse().ok()?;
            Some(ImageMarker {
                index,
                alt_text: caps[2].to_string(),
                raw: caps[0].to_string(),
            })
        })
        .collect()
}

/// Replace one marker occurrence with `replacement` (markup, or empty to
/// drop an unresolvable image).
pub fn replace_marker(text: &str, marker: &ImageMarker, replacement: &str) -> String {
    text.replacen(&marker.raw, replacement, 1)
}

// ── Tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_single_image() {
        let d = decode("Visit ![Paris](http://x/paris.jpg) in spring.");
        assert_eq!(d.stripped, "Visit [[img:1]] in spring.");
        assert_eq!(d.entries.len(), 1);
        assert_eq!(d.entries[0].index, 1);
        assert_eq!(d.entries[0].alt_text, "Paris");
        assert_eq!(d.entries[0].source_url, "http://x/paris.jpg");
    }

    #[test]
    fn decode_multiple_images_on_one_line() {
        let d = decode("![a](http://x/a.png) and ![b](http://x/b.png)");
        assert_eq!(d.stripped, "[[img:1]] and [[img:2]]");
        assert_eq!(d.entries[1].alt_text, "b");
    }

    #[test]
    fn decode_indices_follow_document_order() {
        let d = decode("![one](u1)\n\ntext\n\n![two](u2)\n![three](u3)");
        let alts: Vec<&str> = d.entries.iter().map(|e| e.alt_text.as_str()).collect();
        assert_eq!(alts, vec!["one", "two", "three"]);
        assert_eq!(d.entries[2].index, 3);
    }

    #[test]
    fn decode_with_quoted_title() {
        let d = decode("![Eiffel](http://x/e.jpg \"The tower\")");
        assert_eq!(d.entries[0].title.as_deref(), Some("The tower"));
        assert_eq!(d.entries[0].source_url, "http://x/e.jpg");
    }

    #[test]
    fn decode_escaped_bracket_in_alt() {
        let d = decode(r"![a \] b](http://x/i.png)");
        assert_eq!(d.entries[0].alt_text, "a ] b");
    }

    #[test]
    fn decode_url_with_parentheses() {
        let d = decode("![wiki](https://en.wikipedia.org/wiki/Foo_(bar))");
        assert_eq!(d.entries[0].source_url, "https://en.wikipedia.org/wiki/Foo_(bar)");
    }

    #[test]
    fn decode_ignores_plain_links_and_broken_markup() {
        let d = decode("[link](http://x) and ![dangling");
        assert!(d.entries.is_empty());
        assert_eq!(d.stripped, "[link](http://x) and ![dangling");
    }

    #[test]
    fn round_trip_reproduces_all_images_in_order() {
        let text = "# Title\n\n![a](http://x/a.png)\n\nbody\n\n![b](http://x/b.png \"B\") end";
        let d = decode(text);
        let restored = encode(&d.stripped, &d.entries);
        assert_eq!(restored, text);
    }

    #[test]
    fn encode_is_order_independent() {
        let d = decode("![a](u1) ![b](u2)");
        // Model reordered the tokens
        let rewritten = "[[img:2]] then [[img:1]]";
        let out = encode(rewritten, &d.entries);
        assert_eq!(out, "![b](u2) then ![a](u1)");
    }

    #[test]
    fn encode_uses_resolved_url_when_present() {
        let mut d = decode("![a](http://foreign/a.png)");
        d.entries[0].resolved_url = Some("https://cdn/a.png".into());
        let out = encode(&d.stripped, &d.entries);
        assert_eq!(out, "![a](https://cdn/a.png)");
    }

    #[test]
    fn encode_falls_back_to_heading_insertion() {
        let d = decode("![lost](http://x/l.png)");
        // The model dropped the token entirely.
        let rewritten = "# Intro\n\nSome prose.\n\n## Details\n\nMore prose.";
        let out = encode(rewritten, &d.entries);
        assert!(out.contains("![lost](http://x/l.png)"));
        // Inserted right after the first heading
        let lines: Vec<&str> = out.lines().collect();
        let pos = lines.iter().position(|l| l.starts_with("![lost]")).unwrap();
        assert_eq!(lines[pos - 2], "# Intro");
    }

    #[test]
    fn encode_skips_headings_already_followed_by_image() {
        let entries = decode("![one](u1)\n![two](u2)").entries;
        let rewritten = "# A\n\ntext\n\n# B\n\ntext";
        let out = encode(rewritten, &entries);
        // One image under each heading, not both under the first
        let lines: Vec<&str> = out.lines().collect();
        let a = lines.iter().position(|l| *l == "# A").unwrap();
        let b = lines.iter().position(|l| *l == "# B").unwrap();
        assert!(lines[a + 2].starts_with("![one]"));
        assert!(lines[b + 2].starts_with("![two]"));
    }

    #[test]
    fn encode_appends_overflow_under_separator() {
        let entries = decode("![one](u1)\n![two](u2)").entries;
        let rewritten = "No headings here at all.";
        let out = encode(rewritten, &entries);
        assert!(out.contains("---"));
        assert!(out.contains("![one](u1)"));
        assert!(out.contains("![two](u2)"));
        let sep = out.find("---").unwrap();
        assert!(out.find("![one]").unwrap() > sep);
    }

    #[test]
    fn encode_never_leaks_tokens() {
        let d = decode("![a](u1) ![b](u2)");
        // Model kept one token, duplicated it, and invented another index.
        let rewritten = "[[img:1]] again [[img:1]] plus fake [[img:9]]";
        let out = encode(rewritten, &d.entries);
        assert!(!out.contains("[[img:"), "got: {out}");
        // Both real images still present somewhere
        assert!(out.contains("![a](u1)"));
        assert!(out.contains("![b](u2)"));
    }

    #[test]
    fn markers_parse_in_order() {
        let text = "intro\n\n[IMAGE_1: sunset over harbour]\n\nmid\n\n[IMAGE_2: fishing boats]\n";
        let markers = find_markers(text);
        assert_eq!(markers.len(), 2);
        assert_eq!(markers[0].alt_text, "sunset over harbour");
        assert_eq!(markers[1].index, 2);
    }

    #[test]
    fn marker_replacement_and_removal() {
        let text = "a [IMAGE_1: x] b";
        let markers = find_markers(text);
        assert_eq!(
            replace_marker(text, &markers[0], "![x](https://cdn/x.jpg)"),
            "a ![x](https://cdn/x.jpg) b"
        );
        assert_eq!(replace_marker(text, &markers[0], ""), "a  b");
    }

    #[test]
    fn markers_are_distinct_from_placeholder_tokens() {
        assert!(find_markers("[[img:1]]").is_empty());
        assert!(decode("[IMAGE_1: alt]").entries.is_empty());
    }
}
