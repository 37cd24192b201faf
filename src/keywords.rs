//! Command Keywords
//!
//! A keyword is a typed placeholder inside a command pattern, e.g. the
//! `<number>` in `random <number>`. Each keyword owns a matching function and a
//! consumption mode telling the tokenizer how many input words it absorbs.
//!
//! Built-in keywords:
//!
//! | Token       | Function       | Consumption       |
//! |-------------|----------------|-------------------|
//! | `<user>`    | user reference | single word       |
//! | `<number>`  | number         | single word       |
//! | `<string>`  | passthrough    | until `\|` or end |
//! | `<options>` | options        | all words after   |
//! | `<word>`    | passthrough    | single word       |

use std::fmt;

/// Separator between options and the terminator of multi-word keywords
pub const DELIMITER: char = '|';

/// Length of a member identifier (Discord snowflake)
pub const USER_ID_LEN: usize = 18;

/// How many candidate words a keyword consumes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Consumption {
    /// Exactly one whitespace-delimited word
    SingleWord,
    /// Words up to the first `|` or the end of input
    MultipleWords,
    /// Every remaining word; must be the last token of a pattern
    AllWordsAfter,
}

/// Value extracted for one keyword of a matched pattern
#[derive(Debug, Clone, PartialEq)]
pub enum MatchedValue {
    /// Member identifier without mention wrapping
    User(String),
    Number(f64),
    Text(String),
    Options(Vec<String>),
}

impl MatchedValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MatchedValue::Text(s) | MatchedValue::User(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            MatchedValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_user(&self) -> Option<&str> {
        match self {
            MatchedValue::User(id) => Some(id),
            _ => None,
        }
    }

    pub fn as_options(&self) -> Option<&[String]> {
        match self {
            MatchedValue::Options(options) => Some(options),
            _ => None,
        }
    }
}

impl fmt::Display for MatchedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchedValue::User(id) => write!(f, "<@{}>", id),
            MatchedValue::Number(n) => write!(f, "{}", n),
            MatchedValue::Text(s) => f.write_str(s),
            MatchedValue::Options(options) => f.write_str(&options.join(" | ")),
        }
    }
}

/// Keyword matching function: `None` means the input does not match
pub type KeywordFn = fn(&str) -> Option<MatchedValue>;

/// One placeholder type usable inside command patterns
#[derive(Debug, Clone, Copy)]
pub struct KeywordSpec {
    /// Literal token as written in patterns, e.g. `<number>`
    pub token: &'static str,
    pub matcher: KeywordFn,
    pub consumption: Consumption,
}

impl KeywordSpec {
    pub const fn new(token: &'static str, matcher: KeywordFn, consumption: Consumption) -> Self {
        Self {
            token,
            matcher,
            consumption,
        }
    }

    pub fn matches(&self, input: &str) -> Option<MatchedValue> {
        (self.matcher)(input)
    }
}

pub const USER: KeywordSpec = KeywordSpec::new("<user>", user_reference, Consumption::SingleWord);
pub const NUMBER: KeywordSpec = KeywordSpec::new("<number>", number, Consumption::SingleWord);
pub const STRING: KeywordSpec = KeywordSpec::new("<string>", passthrough, Consumption::MultipleWords);
pub const OPTIONS: KeywordSpec = KeywordSpec::new("<options>", options, Consumption::AllWordsAfter);
pub const WORD: KeywordSpec = KeywordSpec::new("<word>", passthrough, Consumption::SingleWord);

/// Registered keywords, unique by token
#[derive(Debug, Clone, Default)]
pub struct KeywordSet {
    specs: Vec<KeywordSpec>,
}

impl KeywordSet {
    /// Empty set (patterns made only of literals)
    pub fn new() -> Self {
        Self::default()
    }

    /// The five built-in keywords
    pub fn builtin() -> Self {
        let mut set = Self::new();
        for spec in [USER, NUMBER, STRING, OPTIONS, WORD] {
            set.register(spec);
        }
        set
    }

    /// Add a keyword; returns false if its token is already taken
    pub fn register(&mut self, spec: KeywordSpec) -> bool {
        if self.get(spec.token).is_some() {
            return false;
        }
        self.specs.push(spec);
        true
    }

    pub fn get(&self, token: &str) -> Option<&KeywordSpec> {
        self.specs.iter().find(|spec| spec.token == token)
    }

    pub fn is_keyword(&self, token: &str) -> bool {
        self.get(token).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &KeywordSpec> {
        self.specs.iter()
    }
}

/// Accepts `<@id>` mentions or bare ids of [`USER_ID_LEN`] digits
pub fn user_reference(input: &str) -> Option<MatchedValue> {
    let id = input
        .strip_prefix("<@")
        .and_then(|rest| rest.strip_suffix('>'))
        .unwrap_or(input);

    if id.len() != USER_ID_LEN {
        return None;
    }
    id.parse::<u64>().ok()?;

    Some(MatchedValue::User(id.to_string()))
}

/// Parses a floating point number
pub fn number(input: &str) -> Option<MatchedValue> {
    input.trim().parse::<f64>().ok().map(MatchedValue::Number)
}

/// Returns the input unchanged; always matches
pub fn passthrough(input: &str) -> Option<MatchedValue> {
    Some(MatchedValue::Text(input.to_string()))
}

/// Splits on `|` into trimmed options; always matches
pub fn options(input: &str) -> Option<MatchedValue> {
    let options = input
        .trim()
        .split(DELIMITER)
        .map(|option| option.trim().to_string())
        .collect();
    Some(MatchedValue::Options(options))
}
