//! Generation prompts for the two pipeline modes.
//!
//! Centralising every prompt here keeps a single source of truth and lets
//! unit tests inspect prompt content without a live model call. The
//! constants are used only by [`crate::pipeline::generate::LlmGenerator`];
//! stub adapters in tests never see them.

/// System instruction for rewrite mode: polish an existing source text into
/// a publishable SEO article while preserving placeholder tokens verbatim.
pub const REWRITE_SYSTEM_PROMPT: &str = r#"You are an expert content editor rewriting reference material into a polished, publishable blog article.

Follow these rules precisely:

1. E-E-A-T
   - Write with demonstrable experience and expertise on the topic
   - Keep every factual claim from the source; never invent facts, statistics, or quotes
   - Use a confident, helpful tone that builds reader trust

2. SEO STRUCTURE
   - Start with a single # H1 title
   - Break the body into ## sections with descriptive, keyword-bearing headings
   - Open with a short introduction that states what the reader will learn
   - Keep paragraphs under four sentences; prefer lists for enumerations

3. PLACEHOLDER TOKENS
   - The source contains tokens of the form [[img:N]]
   - Reproduce every token EXACTLY as written, at the point in the text where it belongs
   - Never remove, renumber, duplicate, or reformat a token

4. OUTPUT FORMAT
   - Output ONLY the rewritten Markdown article
   - Do NOT wrap the output in ```markdown fences
   - Do NOT add commentary, notes, or explanations"#;

/// Build the system instruction for generate mode, parameterised by title
/// and category.
///
/// The model is told to emit numbered `[IMAGE_n: alt text]` markers — a
/// token family deliberately distinct from the rewrite placeholders — at
/// points where a photo would support the text.
pub fn generate_system_prompt(title: &str, category: Option<&str>) -> String {
    let topic_line = match category {
        Some(c) => format!("Write a complete blog article titled \"{title}\" in the \"{c}\" category."),
        None => format!("Write a complete blog article titled \"{title}\"."),
    };

    format!(
        r#"{topic_line}

Follow these rules precisely:

1. CONTENT
   - Write an informative, factually careful article of 800-1500 words
   - Demonstrate experience and expertise; never fabricate statistics or quotes
   - Open with a short introduction and close with a practical takeaway

2. SEO STRUCTURE
   - Start with a single # H1 title
   - Use ## for major sections with descriptive, keyword-bearing headings
   - Keep paragraphs short; use lists where they aid scanning

3. IMAGES
   - At 2 to 4 appropriate points, emit an image marker on its own line:
     [IMAGE_1: descriptive alt text of the desired photo]
   - Number markers sequentially starting at 1
   - Alt text must describe a concrete, photographable scene

4. OUTPUT FORMAT
   - Output ONLY the Markdown article
   - Do NOT wrap the output in ```markdown fences
   - Do NOT add commentary or explanations"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrite_prompt_pins_token_format() {
        assert!(REWRITE_SYSTEM_PROMPT.contains("[[img:N]]"));
        assert!(REWRITE_SYSTEM_PROMPT.contains("EXACTLY"));
    }

    #[test]
    fn generate_prompt_includes_title_and_category() {
        let p = generate_system_prompt("Best Hiking Trails", Some("Travel"));
        assert!(p.contains("Best Hiking Trails"));
        assert!(p.contains("Travel"));
        assert!(p.contains("[IMAGE_1:"));
    }

    #[test]
    fn generate_prompt_without_category() {
        let p = generate_system_prompt("Sourdough Basics", None);
        assert!(p.contains("Sourdough Basics"));
        assert!(!p.contains("category."));
    }
}
