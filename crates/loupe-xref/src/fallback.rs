//! Annotated fallback for text the parser rejects.

use loupe_syntax::ParseError;

/// Wraps unparseable text in comment blocks: a notice up top that hyperlinks
/// are disabled, the untouched text in the middle, and the parse error detail
/// at the bottom. Every generated line sits behind `" * "` so the result
/// still displays as Java.
pub fn annotate_parse_failure(text: &str, error: &ParseError) -> String {
    let mut out = String::with_capacity(text.len() + 160);
    out.push_str("/*\n");
    out.push_str(" * Hyperlinks are disabled: this source could not be parsed.\n");
    out.push_str(" * The parse error detail is at the bottom of this file.\n");
    out.push_str(" */\n");
    out.push_str(text);
    if !text.ends_with('\n') {
        out.push('\n');
    }
    out.push_str("/*\n");
    for line in error.to_string().lines() {
        out.push_str(" * ");
        out.push_str(line);
        out.push('\n');
    }
    out.push_str(" */\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_the_text_between_notice_and_error_blocks() {
        let error = loupe_syntax::parse("not java").unwrap_err();
        let annotated = annotate_parse_failure("not java", &error);

        assert!(annotated.starts_with("/*\n * Hyperlinks are disabled"));
        assert!(annotated.contains("\nnot java\n"));
        assert!(annotated.ends_with(" */\n"));

        let lines: Vec<&str> = annotated.lines().collect();
        let detail = lines[lines.len() - 2];
        assert!(detail.starts_with(" * "), "error detail line: {detail:?}");
        assert!(detail.contains("at 1:"), "error detail line: {detail:?}");
    }

    #[test]
    fn text_without_a_trailing_newline_still_closes_cleanly() {
        let error = loupe_syntax::parse("class {").unwrap_err();
        let annotated = annotate_parse_failure("class {", &error);
        assert!(annotated.contains("class {\n/*\n"));
    }
}
