use core::fmt;

pub use logos::Span;
use logos::{Lexer, Logos};

pub use location::{LineIndex, LocationOverflow, SourceLocation};

mod location;

fn close_string(lexer: &mut Lexer<TokenKind>) -> Result<(), RawLexError> {
    // The regex stops right before the closing quote (or at the end of input)
    if lexer.remainder().starts_with('"') {
        lexer.bump(1);
        Ok(())
    } else {
        Err(RawLexError::UnterminatedString)
    }
}

/// What logos reports for a span it could not turn into a token. It has no location
/// yet; [`scan`] attaches one and turns it into a [`LexError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RawLexError {
    #[default]
    Unrecognized,
    UnterminatedString,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LexError {
    #[error("unrecognized character {character:?} at {location}")]
    UnrecognizedCharacter {
        location: SourceLocation,
        character: char,
    },
    #[error("unterminated string literal starting at {location}")]
    UnterminatedString { location: SourceLocation },
    #[error(transparent)]
    LocationOverflow(#[from] LocationOverflow),
}

impl LexError {
    pub fn location(&self) -> SourceLocation {
        match self {
            Self::UnrecognizedCharacter { location, .. } | Self::UnterminatedString { location } => {
                *location
            }
            Self::LocationOverflow(_) => SourceLocation::INVALID,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Logos)]
#[logos(error = RawLexError)]
#[logos(skip r"[ \t\n\r\x0B\x0C]+")]
pub enum TokenKind {
    #[token("(")]
    LPar,
    #[token(")")]
    RPar,
    #[regex("[0-9]+")]
    Int,
    #[regex(r#""[^"]*"#, close_string)]
    Str,
    #[regex("[a-zA-Z]+")]
    Id,
    #[token("def")]
    Def,
    #[token(";")]
    Semicolon,
}

impl TokenKind {
    pub fn lexer(source: &str) -> Lexer<Self> {
        <Self as Logos>::lexer(source)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::LPar => "LPAR",
            Self::RPar => "RPAR",
            Self::Int => "INT",
            Self::Str => "STR",
            Self::Id => "ID",
            Self::Def => "DEF",
            Self::Semicolon => "SEMICOLON",
        })
    }
}

/// A lexed token. String tokens hold their contents without the surrounding quotes.
#[derive(Debug, Clone, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub location: SourceLocation,
    pub text: Box<str>,
}

impl Token {
    pub fn new(kind: TokenKind, location: SourceLocation, text: impl AsRef<str>) -> Self {
        Self {
            kind,
            location,
            text: Box::from(text.as_ref()),
        }
    }

    /// A token without a source location, mostly useful for comparisons in tests.
    pub fn unlocated(kind: TokenKind, text: impl AsRef<str>) -> Self {
        Self::new(kind, SourceLocation::INVALID, text)
    }

    /// How many bytes of source the token covers.
    pub fn source_len(&self) -> usize {
        match self.kind {
            TokenKind::Str => self.text.len() + 2,
            _ => self.text.len(),
        }
    }
}

// Where a token came from does not matter for comparisons
impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.text == other.text
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TokenKind::Int | TokenKind::Id => write!(f, "{}({})", self.kind, self.text),
            TokenKind::Str => write!(f, "{}({:?})", self.kind, self.text),
            _ => write!(f, "{}", self.kind),
        }
    }
}

/// Scan the whole source into tokens, stopping at the first character that does not
/// start a token.
#[tracing::instrument(level = "debug", skip_all, fields(len = source.len()))]
pub fn scan(source: &str) -> Result<Vec<Token>, LexError> {
    let index = LineIndex::new(source);
    let mut lexer = TokenKind::lexer(source);
    let mut tokens = vec![];

    while let Some(kind) = lexer.next() {
        let span = lexer.span();
        let location = index.location(span.start)?;
        match kind {
            Ok(kind) => {
                let slice = lexer.slice();
                let text = match kind {
                    TokenKind::Str => &slice[1..slice.len() - 1],
                    _ => slice,
                };
                tokens.push(Token::new(kind, location, text));
            }
            Err(RawLexError::UnterminatedString) => {
                return Err(LexError::UnterminatedString { location })
            }
            Err(RawLexError::Unrecognized) => {
                let character = source[span.start..].chars().next().unwrap_or_default();
                tracing::debug!(%location, ?character, "unrecognized character");
                return Err(LexError::UnrecognizedCharacter {
                    location,
                    character,
                });
            }
        }
    }

    tracing::debug!(count = tokens.len(), "scanned tokens");
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use arbtest::arbtest;
    use assert2::{check, let_assert};

    use super::{scan, LexError, SourceLocation, Token, TokenKind};

    fn tok(kind: TokenKind, text: &str) -> Token {
        Token::unlocated(kind, text)
    }

    #[test]
    fn nested_binops() {
        let_assert!(Ok(tokens) = scan("(add 2 (sub 4 2));"));
        check!(
            tokens
                == [
                    tok(TokenKind::LPar, "("),
                    tok(TokenKind::Id, "add"),
                    tok(TokenKind::Int, "2"),
                    tok(TokenKind::LPar, "("),
                    tok(TokenKind::Id, "sub"),
                    tok(TokenKind::Int, "4"),
                    tok(TokenKind::Int, "2"),
                    tok(TokenKind::RPar, ")"),
                    tok(TokenKind::RPar, ")"),
                    tok(TokenKind::Semicolon, ";"),
                ]
        );
        check!(tokens[6].location == SourceLocation::new(0, 14));
    }

    #[test]
    fn def_is_a_keyword_only_on_its_own() {
        let_assert!(Ok(tokens) = scan("def define de x"));
        check!(
            tokens
                == [
                    tok(TokenKind::Def, "def"),
                    tok(TokenKind::Id, "define"),
                    tok(TokenKind::Id, "de"),
                    tok(TokenKind::Id, "x"),
                ]
        );
    }

    #[test]
    fn strings_drop_their_quotes() {
        let_assert!(Ok(tokens) = scan(r#"(f "hello world" "");"#));
        check!(tokens[2] == tok(TokenKind::Str, "hello world"));
        check!(tokens[3] == tok(TokenKind::Str, ""));
        check!(tokens[3].location == SourceLocation::new(0, 17));
        check!(tokens[4].location == SourceLocation::new(0, 19));
    }

    #[test]
    fn unterminated_string() {
        check!(
            scan("(f \"abc") == Err(LexError::UnterminatedString {
                location: SourceLocation::new(0, 3)
            })
        );
    }

    #[test]
    fn newlines_move_to_the_next_row() {
        let_assert!(Ok(tokens) = scan("def x 2;\n  (add x\n5);"));
        let locations: Vec<_> = tokens.iter().map(|t| t.location).collect();
        check!(
            locations
                == [
                    SourceLocation::new(0, 0),
                    SourceLocation::new(0, 4),
                    SourceLocation::new(0, 6),
                    SourceLocation::new(0, 7),
                    SourceLocation::new(1, 2),
                    SourceLocation::new(1, 3),
                    SourceLocation::new(1, 7),
                    SourceLocation::new(2, 0),
                    SourceLocation::new(2, 1),
                    SourceLocation::new(2, 2),
                ]
        );
    }

    #[test]
    fn unrecognized_character() {
        check!(
            scan("#") == Err(LexError::UnrecognizedCharacter {
                location: SourceLocation::new(0, 0),
                character: '#',
            })
        );
        check!(
            scan("(add 1\n  2 %);") == Err(LexError::UnrecognizedCharacter {
                location: SourceLocation::new(1, 4),
                character: '%',
            })
        );
        check!(
            scan("x λ") == Err(LexError::UnrecognizedCharacter {
                location: SourceLocation::new(0, 2),
                character: 'λ',
            })
        );
    }

    #[test]
    fn empty_and_blank_sources() {
        check!(scan("") == Ok(vec![]));
        check!(scan(" \t\n\r\n ") == Ok(vec![]));
    }

    #[test]
    fn token_equality_ignores_location() {
        let located = Token::new(TokenKind::Int, SourceLocation::new(4, 2), "42");
        check!(located == tok(TokenKind::Int, "42"));
        check!(located != tok(TokenKind::Id, "42"));
        check!(located.to_string() == "INT(42)");
        check!(tok(TokenKind::Str, "a b").to_string() == r#"STR("a b")"#);
        check!(tok(TokenKind::Semicolon, ";").to_string() == "SEMICOLON");
    }

    #[test]
    fn arbitrary_input_never_panics() {
        arbtest(|u| {
            let source: String = u.arbitrary()?;
            if let Ok(tokens) = scan(&source) {
                // locations are valid and strictly increasing
                check!(tokens.iter().all(|t| t.location.is_valid()));
                check!(tokens.windows(2).all(|w| w[0].location < w[1].location));
            }
            Ok(())
        });
    }

    #[test]
    fn scanning_is_deterministic() {
        arbtest(|u| {
            let source: String = u.arbitrary()?;
            check!(scan(&source) == scan(&source));
            Ok(())
        });
    }
}
