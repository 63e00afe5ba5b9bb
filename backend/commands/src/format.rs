//! Reply formatting: speaker attribution and markdown to HTML.

use pulldown_cmark::{html, Options, Parser};

/// Prefix a reply with the display name of the user it answers.
pub fn attribute(display_name: &str, text: &str) -> String {
    format!("{display_name}:\n\n{text}")
}

/// Render markdown reply text as HTML for clients that show formatted bodies.
pub fn render_markdown(text: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);
    let parser = Parser::new_ext(text, options);
    let mut out = String::with_capacity(text.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribution_puts_name_on_its_own_line() {
        assert_eq!(attribute("Alice", "hello"), "Alice:\n\nhello");
    }

    #[test]
    fn markdown_renders_to_html() {
        let html = render_markdown("Alice:\n\n**bold** and `code`");
        assert!(html.contains("<p>Alice:</p>"));
        assert!(html.contains("<strong>bold</strong>"));
        assert!(html.contains("<code>code</code>"));
    }

    #[test]
    fn raw_html_in_plain_text_is_escaped_in_code() {
        let html = render_markdown("`<script>`");
        assert!(html.contains("&lt;script&gt;"));
    }
}
