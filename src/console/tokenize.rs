//! Line tokenizer and qualified-name resolution.
//!
//! A line is split into invocation segments on `|`, `\r` and `\n`; each
//! segment is split on whitespace into tokens. Double quotes group a span
//! (quotes stripped), and a `|` inside quotes does not separate segments.
//! Line breaks always do, so an unterminated quote never swallows the next line.

/// One whitespace-delimited token of a segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    /// True when any part of the token came from a `"..."` span.
    pub quoted: bool,
}

impl Token {
    pub fn bare(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            quoted: false,
        }
    }

    /// Convar name referenced by a `{name}` token, if this is one.
    ///
    /// Quoted tokens are never substituted, so `"{literal}"` passes through.
    pub fn substitution(&self) -> Option<&str> {
        if self.quoted {
            return None;
        }
        self.text
            .strip_prefix('{')
            .and_then(|rest| rest.strip_suffix('}'))
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }
}

/// How the leading token of a segment addresses a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameRef<'a> {
    /// Exactly `$`: reset the category scope, run nothing.
    ResetScope,
    /// `$name`: absolute qualified name.
    Absolute(&'a str),
    /// Relative to the context's current category.
    Relative(&'a str),
}

impl<'a> NameRef<'a> {
    pub fn parse(token: &'a str) -> Self {
        match token.strip_prefix('$') {
            Some("") => NameRef::ResetScope,
            Some(rest) => NameRef::Absolute(rest),
            None => NameRef::Relative(token),
        }
    }

    /// Qualified name this reference designates from within `category`.
    /// `None` for [`NameRef::ResetScope`].
    pub fn resolve(self, category: &str) -> Option<String> {
        match self {
            NameRef::ResetScope => None,
            NameRef::Absolute(name) => Some(name.to_string()),
            NameRef::Relative(name) => Some(qualify(category, name)),
        }
    }
}

/// `category.name`, or bare `name` when the category is empty.
pub fn qualify(category: &str, name: &str) -> String {
    if category.is_empty() {
        name.to_string()
    } else {
        format!("{category}.{name}")
    }
}

/// Split a raw line into trimmed, non-empty invocation segments.
pub fn split_segments(line: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    for (idx, ch) in line.char_indices() {
        match ch {
            '"' => in_quotes = !in_quotes,
            '|' if !in_quotes => {
                segments.push(&line[start..idx]);
                start = idx + 1;
            }
            '\r' | '\n' => {
                segments.push(&line[start..idx]);
                start = idx + 1;
                in_quotes = false;
            }
            _ => {}
        }
    }
    segments.push(&line[start..]);
    segments
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Split one segment into tokens, honouring double quotes.
pub fn tokenize(segment: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut started = false;
    let mut quoted = false;
    let mut in_quotes = false;

    for ch in segment.chars() {
        if ch == '"' {
            in_quotes = !in_quotes;
            started = true;
            quoted = true;
            continue;
        }
        if ch.is_whitespace() && !in_quotes {
            if started {
                tokens.push(Token {
                    text: std::mem::take(&mut current),
                    quoted,
                });
                started = false;
                quoted = false;
            }
            continue;
        }
        current.push(ch);
        started = true;
    }
    if started {
        tokens.push(Token {
            text: current,
            quoted,
        });
    }
    tokens
}

/// Segments of `line`, each already tokenized. Empty segments are dropped.
pub fn parse_line(line: &str) -> Vec<Vec<Token>> {
    split_segments(line)
        .into_iter()
        .map(tokenize)
        .filter(|tokens| !tokens.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn texts(tokens: &[Token]) -> Vec<&str> {
        tokens.iter().map(|t| t.text.as_str()).collect()
    }

    #[test]
    fn segments_split_on_pipe_and_newlines() {
        assert_eq!(
            split_segments(" a 1 | b\r\nc|| \n"),
            vec!["a 1", "b", "c"]
        );
    }

    #[test]
    fn pipe_inside_quotes_is_literal() {
        let segs = split_segments(r#"echo "a|b" | help"#);
        assert_eq!(segs, vec![r#"echo "a|b""#, "help"]);
    }

    #[test]
    fn blank_line_has_no_segments() {
        assert!(parse_line("   \t ").is_empty());
        assert!(parse_line("").is_empty());
    }

    #[test]
    fn quoted_span_is_one_token() {
        let tokens = tokenize(r#"greet "hello world""#);
        assert_eq!(texts(&tokens), vec!["greet", "hello world"]);
        assert!(!tokens[0].quoted);
        assert!(tokens[1].quoted);
    }

    #[test]
    fn empty_quotes_yield_empty_token() {
        let tokens = tokenize(r#"say """#);
        assert_eq!(texts(&tokens), vec!["say", ""]);
    }

    #[test]
    fn adjacent_quotes_join_the_token() {
        assert_eq!(texts(&tokenize(r#"a"b c"d"#)), vec!["ab cd"]);
    }

    #[test]
    fn unterminated_quote_runs_to_end_of_segment() {
        assert_eq!(texts(&tokenize(r#"say "a b"#)), vec!["say", "a b"]);
    }

    #[rstest]
    #[case("$", NameRef::ResetScope)]
    #[case("$jump", NameRef::Absolute("jump"))]
    #[case("$physics.jump", NameRef::Absolute("physics.jump"))]
    #[case("jump", NameRef::Relative("jump"))]
    fn name_refs(#[case] token: &str, #[case] expected: NameRef<'_>) {
        assert_eq!(NameRef::parse(token), expected);
    }

    #[test]
    fn resolution_respects_current_category() {
        assert_eq!(NameRef::parse("jump").resolve("physics").as_deref(), Some("physics.jump"));
        assert_eq!(NameRef::parse("$jump").resolve("physics").as_deref(), Some("jump"));
        assert_eq!(NameRef::parse("jump").resolve("").as_deref(), Some("jump"));
        assert_eq!(NameRef::parse("$").resolve("physics"), None);
    }

    #[test]
    fn substitution_markers() {
        assert_eq!(Token::bare("{speed}").substitution(), Some("speed"));
        assert_eq!(Token::bare("{$speed}").substitution(), Some("$speed"));
        assert_eq!(Token::bare("{}").substitution(), None);
        assert_eq!(Token::bare("{speed").substitution(), None);
        let quoted = Token {
            text: "{speed}".into(),
            quoted: true,
        };
        assert_eq!(quoted.substitution(), None);
    }
}
