use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref TAGS: Regex = Regex::new(r"<[^>]*>").expect("valid regex");
    static ref WORDS: Regex = Regex::new(r"(?u)\w+").expect("valid regex");
}

/// Tokenize text into ordered lowercase terms. Markup tags are replaced with
/// a space before splitting so `fox<br>dog` never fuses into one token.
/// Tokens shorter than two characters or consisting only of digits are
/// dropped. Pure function, no state.
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    let stripped = TAGS.replace_all(&lowered, " ");
    WORDS
        .find_iter(&stripped)
        .map(|m| m.as_str().to_string())
        .filter(|t| t.chars().count() >= 2 && !t.chars().all(|c| c.is_numeric()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_and_splits() {
        let t = tokenize("The Quick, red FOX!");
        assert_eq!(t, vec!["the", "quick", "red", "fox"]);
    }

    #[test]
    fn strips_markup_tags() {
        let t = tokenize("<p>hello<br>world</p>");
        assert_eq!(t, vec!["hello", "world"]);
    }

    #[test]
    fn drops_short_and_numeric_tokens() {
        let t = tokenize("a I 42 2024 ok x9");
        assert_eq!(t, vec!["ok", "x9"]);
    }

    #[test]
    fn keeps_order_and_duplicates() {
        let t = tokenize("red fox red");
        assert_eq!(t, vec!["red", "fox", "red"]);
    }
}
