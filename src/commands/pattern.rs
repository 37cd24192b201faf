//! Pattern Tokenizer
//!
//! Walks the whitespace tokens of a pattern against the tokens of a candidate
//! input. Literal tokens must match position for position; keyword tokens run
//! their matching function and may absorb more than one input word.
//!
//! The whole candidate must be consumed: leftover words after the last pattern
//! token reject the match.

use crate::keywords::{Consumption, KeywordSet, MatchedValue, DELIMITER};
use tracing::trace;

/// Match `input` against `pattern`
///
/// Returns the keyword values in pattern order (empty for literal-only
/// patterns), or `None` if the input does not fit the pattern.
pub fn match_pattern(pattern: &str, input: &str, keywords: &KeywordSet) -> Option<Vec<MatchedValue>> {
    let words: Vec<&str> = input.split_whitespace().collect();
    let mut values = Vec::new();
    let mut cursor = 0;

    for token in pattern.split_whitespace() {
        if cursor >= words.len() {
            trace!("'{}' ran out of input at '{}'", pattern, token);
            return None;
        }

        let Some(keyword) = keywords.get(token) else {
            if words[cursor] != token {
                return None;
            }
            cursor += 1;
            continue;
        };

        let value = match keyword.consumption {
            Consumption::SingleWord => {
                let value = keyword.matches(words[cursor])?;
                cursor += 1;
                value
            }
            Consumption::MultipleWords => {
                let joined = words[cursor..].join(" ");
                let segment = until_delimiter(&joined);
                let value = keyword.matches(segment)?;
                cursor += segment.split_whitespace().count();
                value
            }
            Consumption::AllWordsAfter => {
                let value = keyword.matches(&words[cursor..].join(" "))?;
                cursor = words.len();
                value
            }
        };
        values.push(value);
    }

    if cursor < words.len() {
        trace!("'{}' left {} trailing words", pattern, words.len() - cursor);
        return None;
    }

    Some(values)
}

/// Text before the first delimiter, trimmed
fn until_delimiter(text: &str) -> &str {
    text.split(DELIMITER).next().unwrap_or_default().trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(pattern: &str, input: &str) -> Option<Vec<MatchedValue>> {
        match_pattern(pattern, input, &KeywordSet::builtin())
    }

    fn text(s: &str) -> MatchedValue {
        MatchedValue::Text(s.to_string())
    }

    #[test]
    fn test_literal_patterns() {
        assert_eq!(matches("help", "help"), Some(vec![]));
        assert_eq!(matches("help", "  help  "), Some(vec![]));
        assert_eq!(matches("command list", "command list"), Some(vec![]));
        assert_eq!(matches("help", "hello"), None);
        assert_eq!(matches("command list", "command"), None);
        assert_eq!(matches("help", ""), None);
    }

    #[test]
    fn test_number_keyword() {
        assert_eq!(matches("random <number>", "random 5"), Some(vec![MatchedValue::Number(5.0)]));
        assert_eq!(matches("random <number>", "random abc"), None);
        assert_eq!(matches("random <number>", "random"), None);
    }

    #[test]
    fn test_options_keyword() {
        assert_eq!(
            matches("choose <options>", "choose cats | dogs | fish"),
            Some(vec![MatchedValue::Options(vec![
                "cats".to_string(),
                "dogs".to_string(),
                "fish".to_string(),
            ])])
        );
    }

    #[test]
    fn test_user_keyword() {
        let expected = Some(vec![MatchedValue::User("123456789012345678".to_string())]);
        assert_eq!(matches("superuser <user>", "superuser 123456789012345678"), expected);
        assert_eq!(matches("superuser <user>", "superuser <@123456789012345678>"), expected);
        assert_eq!(matches("superuser <user>", "superuser 12345"), None);
    }

    #[test]
    fn test_multiple_words_stop_at_delimiter() {
        assert_eq!(
            matches("say <string> | <word>", "say hello there | bob"),
            Some(vec![text("hello there"), text("bob")])
        );
        assert_eq!(
            matches("command add <word> <string>", "command add greet why hello there"),
            Some(vec![text("greet"), text("why hello there")])
        );
    }

    #[test]
    fn test_multiple_words_before_literal() {
        assert_eq!(
            matches("<string> | end", "a b c | end"),
            Some(vec![text("a b c")])
        );
        assert_eq!(matches("<string> | end", "a b c | stop"), None);
    }

    #[test]
    fn test_trailing_words_rejected() {
        assert_eq!(matches("help", "help me"), None);
        assert_eq!(matches("random <number>", "random 5 6"), None);
        assert_eq!(matches("8ball <string>", "8ball will it | rain"), None);
    }

    #[test]
    fn test_all_words_after_consumes_everything() {
        assert_eq!(
            matches("choose <options>", "choose a b c"),
            Some(vec![MatchedValue::Options(vec!["a b c".to_string()])])
        );
    }

    #[test]
    fn test_values_in_pattern_order() {
        assert_eq!(
            matches("give <user> <number>", "give <@123456789012345678> 3"),
            Some(vec![
                MatchedValue::User("123456789012345678".to_string()),
                MatchedValue::Number(3.0),
            ])
        );
        assert_eq!(matches("give <user> <number>", "give <@123456789012345678> x"), None);
    }

    #[test]
    fn test_literals_only_without_keywords() {
        let empty = KeywordSet::new();
        assert_eq!(match_pattern("random <number>", "random <number>", &empty), Some(vec![]));
        assert_eq!(match_pattern("random <number>", "random 5", &empty), None);
    }
}
