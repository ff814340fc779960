use once_cell::sync::Lazy;
use regex::Regex;

/// Reasoning blocks some chat models emit ahead of the answer.
static REASONING_BLOCKS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"<think>[\s\S]*?</think>|<think\s*/>",
        r"<reasoning>[\s\S]*?</reasoning>",
        r"<internal>[\s\S]*?</internal>",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).unwrap())
    .collect()
});

static EXCESS_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

/// Normalizes a chat reply before it is written into a document: drops
/// reasoning blocks, normalizes line endings and collapses runs of blank
/// lines to a single blank line.
pub fn clean_llm_response(response: &str) -> String {
    let mut cleaned = response.replace("\r\n", "\n");
    for pattern in REASONING_BLOCKS.iter() {
        cleaned = pattern.replace_all(&cleaned, "").into_owned();
    }
    EXCESS_BLANK_LINES
        .replace_all(cleaned.trim(), "\n\n")
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_think_blocks() {
        assert_eq!(
            clean_llm_response("<think>checking records</think>Customer opened the account in 2021."),
            "Customer opened the account in 2021."
        );
        assert_eq!(clean_llm_response("<think />Answer"), "Answer");
    }

    #[test]
    fn test_strips_reasoning_and_internal_blocks() {
        let input = "<reasoning>a</reasoning>Line one<internal>b</internal>";
        assert_eq!(clean_llm_response(input), "Line one");
    }

    #[test]
    fn test_collapses_blank_lines_and_crlf() {
        let input = "Overview\r\n\r\n\r\n\r\nRisk indicators\n\n\n\nNext steps  ";
        assert_eq!(
            clean_llm_response(input),
            "Overview\n\nRisk indicators\n\nNext steps"
        );
    }

    #[test]
    fn test_plain_reply_unchanged() {
        let input = "No adverse media found for this customer.";
        assert_eq!(clean_llm_response(input), input);
    }
}
