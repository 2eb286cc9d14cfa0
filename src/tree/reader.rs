//! S-expression reader for trees.
//!
//! Syntax:
//! - `(tag child ...)` is a node; the tag is a bare token
//! - a bare token or a `"quoted string"` is an atom
//! - `;` starts a comment that runs to the end of the line
//!
//! Quoted strings understand the escapes `\"`, `\\`, `\n` and `\t`.
//! Nodes nest at most [`MAX_NESTING`] deep.

use super::{Tag, Tree};
use crate::utils::error::ParseError;

/// Deepest node nesting the reader accepts.
pub const MAX_NESTING: usize = 256;

/// Parse exactly one tree from `source`.
pub fn parse(source: &str) -> Result<Tree, ParseError> {
    let mut reader = Reader::new(source);
    reader.skip_trivia();
    let tree = reader.read_tree()?;
    reader.skip_trivia();
    match reader.peek_char() {
        None => Ok(tree),
        Some(_) => Err(ParseError::TrailingInput {
            offset: reader.offset(),
        }),
    }
}

/// A character reader over the source text.
struct Reader<'a> {
    source: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    /// Number of open nodes
    depth: usize,
}

impl<'a> Reader<'a> {
    fn new(source: &'a str) -> Self {
        Reader {
            source,
            chars: source.char_indices().peekable(),
            depth: 0,
        }
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }

    fn next_char(&mut self) -> Option<char> {
        self.chars.next().map(|(_, c)| c)
    }

    /// Byte offset of the next character.
    fn offset(&mut self) -> usize {
        self.chars
            .peek()
            .map(|(i, _)| *i)
            .unwrap_or(self.source.len())
    }

    /// Skip whitespace and comments.
    fn skip_trivia(&mut self) {
        while let Some(c) = self.peek_char() {
            if c.is_whitespace() {
                self.next_char();
            } else if c == ';' {
                while let Some(c) = self.next_char() {
                    if c == '\n' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    fn read_tree(&mut self) -> Result<Tree, ParseError> {
        match self.peek_char() {
            None => Err(ParseError::UnexpectedEof),
            Some('(') => self.read_node(),
            Some(')') => Err(ParseError::UnexpectedClose {
                offset: self.offset(),
            }),
            Some('"') => self.read_quoted().map(Tree::from),
            Some(_) => Ok(Tree::from(self.read_bare())),
        }
    }

    fn read_node(&mut self) -> Result<Tree, ParseError> {
        let start = self.offset();
        if self.depth >= MAX_NESTING {
            return Err(ParseError::TooDeep { offset: start });
        }
        self.next_char(); // '('
        self.skip_trivia();
        let name = match self.peek_char() {
            None => return Err(ParseError::UnexpectedEof),
            Some('(' | ')' | '"') => return Err(ParseError::MissingTag { offset: start }),
            Some(_) => self.read_bare(),
        };

        self.depth += 1;
        let mut children = Vec::new();
        loop {
            self.skip_trivia();
            match self.peek_char() {
                None => return Err(ParseError::Unclosed { offset: start }),
                Some(')') => {
                    self.next_char();
                    break;
                }
                Some(_) => children.push(self.read_tree()?),
            }
        }
        self.depth -= 1;
        Ok(Tree::node(Tag::from_name(&name), children))
    }

    /// Read a bare token up to whitespace, a parenthesis, a quote or a comment.
    fn read_bare(&mut self) -> String {
        let mut token = String::new();
        while let Some(c) = self.peek_char() {
            if c.is_whitespace() || matches!(c, '(' | ')' | '"' | ';') {
                break;
            }
            token.push(c);
            self.next_char();
        }
        token
    }

    fn read_quoted(&mut self) -> Result<String, ParseError> {
        let start = self.offset();
        self.next_char(); // opening quote
        let mut text = String::new();
        loop {
            match self.next_char() {
                None => return Err(ParseError::UnterminatedString { offset: start }),
                Some('"') => return Ok(text),
                Some('\\') => match self.next_char() {
                    Some('n') => text.push('\n'),
                    Some('t') => text.push('\t'),
                    Some(c) => text.push(c),
                    None => return Err(ParseError::UnterminatedString { offset: start }),
                },
                Some(c) => text.push(c),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_nested() {
        let t = parse("(plus 1 (times \"2\" 3))").unwrap();
        assert_eq!(t.tag(), Some(&Tag::Plus));
        assert_eq!(t.child(0), Some(&Tree::atom("1")));
        assert_eq!(t.subtree(&[1, 0]), Some(&Tree::atom("2")));
    }

    #[test]
    fn test_parse_escapes_and_comments() {
        let t = parse("; a comment\n(concat \"a \\\"b\\\"\\n\" c) ; trailing").unwrap();
        assert_eq!(t.child(0), Some(&Tree::atom("a \"b\"\n")));
    }

    #[test]
    fn test_display_round_trip() {
        let source = r#"(with font-size 12 (concat "hello world" (arg x 0) ""))"#;
        let t = parse(source).unwrap();
        assert_eq!(t.to_string(), source);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(parse("(plus 1"), Err(ParseError::Unclosed { offset: 0 })));
        assert!(matches!(parse(")"), Err(ParseError::UnexpectedClose { .. })));
        assert!(matches!(parse("()"), Err(ParseError::MissingTag { .. })));
        assert!(matches!(parse("a b"), Err(ParseError::TrailingInput { offset: 2 })));
        assert!(matches!(parse("\"abc"), Err(ParseError::UnterminatedString { .. })));
        assert!(matches!(parse("   "), Err(ParseError::UnexpectedEof)));
    }

    #[test]
    fn test_nesting_limit() {
        let nested = |n: usize| format!("{}a{}", "(concat ".repeat(n), ")".repeat(n));
        assert!(parse(&nested(MAX_NESTING)).is_ok());
        assert!(matches!(
            parse(&nested(MAX_NESTING + 1)),
            Err(ParseError::TooDeep { offset }) if offset == MAX_NESTING * 8
        ));
        assert!(matches!(
            parse(&nested(20_000)),
            Err(ParseError::TooDeep { .. })
        ));
    }

    #[test]
    fn test_empty_node() {
        assert_eq!(parse("(uninit)").unwrap(), Tree::uninit());
    }
}
