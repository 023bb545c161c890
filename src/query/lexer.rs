//! Lexer for the form query language.
//!
//! This module converts raw query text into a sequence of tokens with span
//! information. Keywords are case-insensitive; identifiers keep their
//! original spelling so that labels and ids can be matched later.

use chumsky::prelude::*;

/// A token in the query language.
#[derive(Debug, Clone, PartialEq)]
pub enum Token<'src> {
    // ========================================================================
    // Statement Keywords
    // ========================================================================
    Select,
    Insert,
    Into,
    Form,
    From,
    Where,
    Values,

    // ========================================================================
    // Clause Keywords
    // ========================================================================
    And,
    Or,
    Order,
    By,
    Asc,
    Desc,
    Limit,

    // ========================================================================
    // Literal Keywords
    // ========================================================================
    True,
    False,
    Null,

    // ========================================================================
    // Literals
    // ========================================================================
    /// A bare word: identifier, field id, label, or form id.
    Ident(&'src str),
    /// A double-quoted string (contents without quotes, `""` not unescaped).
    QuotedIdent(&'src str),
    /// A single-quoted string (contents without quotes, `''` not unescaped).
    StringLit(&'src str),
    /// An unsigned integer or decimal.
    Number(&'src str),
    /// A `{{name}}` template placeholder (name trimmed).
    Variable(&'src str),

    // ========================================================================
    // Symbols
    // ========================================================================
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `,`
    Comma,
    /// `*`
    Star,
    /// `;`
    Semicolon,
    /// `-`
    Minus,
    /// `=`
    Eq,
    /// `!=` or `<>`
    NotEq,
    /// `<`
    Lt,
    /// `>`
    Gt,
    /// `<=`
    LtEq,
    /// `>=`
    GtEq,
}

impl<'src> std::fmt::Display for Token<'src> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Select => write!(f, "SELECT"),
            Token::Insert => write!(f, "INSERT"),
            Token::Into => write!(f, "INTO"),
            Token::Form => write!(f, "FORM"),
            Token::From => write!(f, "FROM"),
            Token::Where => write!(f, "WHERE"),
            Token::Values => write!(f, "VALUES"),
            Token::And => write!(f, "AND"),
            Token::Or => write!(f, "OR"),
            Token::Order => write!(f, "ORDER"),
            Token::By => write!(f, "BY"),
            Token::Asc => write!(f, "ASC"),
            Token::Desc => write!(f, "DESC"),
            Token::Limit => write!(f, "LIMIT"),
            Token::True => write!(f, "TRUE"),
            Token::False => write!(f, "FALSE"),
            Token::Null => write!(f, "NULL"),

            Token::Ident(s) => write!(f, "{}", s),
            Token::QuotedIdent(s) => write!(f, "\"{}\"", s),
            Token::StringLit(s) => write!(f, "'{}'", s),
            Token::Number(s) => write!(f, "{}", s),
            Token::Variable(s) => write!(f, "{{{{{}}}}}", s),

            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::Comma => write!(f, ","),
            Token::Star => write!(f, "*"),
            Token::Semicolon => write!(f, ";"),
            Token::Minus => write!(f, "-"),
            Token::Eq => write!(f, "="),
            Token::NotEq => write!(f, "!="),
            Token::Lt => write!(f, "<"),
            Token::Gt => write!(f, ">"),
            Token::LtEq => write!(f, "<="),
            Token::GtEq => write!(f, ">="),
        }
    }
}

/// Map a bare word to a keyword token or return Ident.
fn keyword_or_ident(s: &str) -> Token<'_> {
    match s.to_ascii_uppercase().as_str() {
        "SELECT" => Token::Select,
        "INSERT" => Token::Insert,
        "INTO" => Token::Into,
        "FORM" => Token::Form,
        "FROM" => Token::From,
        "WHERE" => Token::Where,
        "VALUES" => Token::Values,
        "AND" => Token::And,
        "OR" => Token::Or,
        "ORDER" => Token::Order,
        "BY" => Token::By,
        "ASC" => Token::Asc,
        "DESC" => Token::Desc,
        "LIMIT" => Token::Limit,
        "TRUE" => Token::True,
        "FALSE" => Token::False,
        "NULL" => Token::Null,
        _ => Token::Ident(s),
    }
}

/// A word made only of digits with at most one interior dot is a number.
fn is_number(s: &str) -> bool {
    let mut parts = s.split('.');
    let int = parts.next().unwrap_or_default();
    let frac = parts.next();
    if parts.next().is_some() || int.is_empty() {
        return false;
    }
    let digits = |p: &str| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit());
    digits(int) && frac.map_or(true, digits)
}

fn classify_word(s: &str) -> Token<'_> {
    if is_number(s) {
        Token::Number(s)
    } else {
        keyword_or_ident(s)
    }
}

/// Undo quote doubling inside a quoted token.
pub fn unescape(raw: &str, quote: char) -> String {
    let doubled: String = [quote, quote].iter().collect();
    raw.replace(&doubled, &quote.to_string())
}

/// Create a lexer for the query language.
///
/// Returns a parser that tokenizes the input string into a sequence of
/// tokens with span information, skipping whitespace and `--` comments.
pub fn lexer<'src>(
) -> impl Parser<'src, &'src str, Vec<(Token<'src>, SimpleSpan)>, extra::Err<Rich<'src, char>>> {
    // Bare words: field ids (uuids included), labels, form ids, keywords,
    // and numbers. Hyphens and dots may appear after the first character.
    let word = any()
        .filter(|c: &char| c.is_alphanumeric() || *c == '_')
        .then(
            any()
                .filter(|c: &char| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
                .repeated(),
        )
        .to_slice()
        .map(classify_word);

    // "..." with "" as an escaped quote
    let quoted_ident = just('"')
        .ignore_then(
            none_of('"')
                .ignored()
                .or(just("\"\"").ignored())
                .repeated()
                .to_slice(),
        )
        .then_ignore(just('"'))
        .map(Token::QuotedIdent);

    // '...' with '' as an escaped quote
    let string_lit = just('\'')
        .ignore_then(
            none_of('\'')
                .ignored()
                .or(just("''").ignored())
                .repeated()
                .to_slice(),
        )
        .then_ignore(just('\''))
        .map(Token::StringLit);

    // {{ name }} where name is an identifier, optionally dotted. Any other
    // `{{` is a lex error.
    let variable_name = any()
        .filter(|c: &char| c.is_ascii_alphabetic() || *c == '_')
        .then(
            any()
                .filter(|c: &char| c.is_ascii_alphanumeric() || matches!(c, '_' | '.'))
                .repeated(),
        )
        .to_slice();
    let variable = just("{{")
        .ignore_then(variable_name.padded())
        .then_ignore(just("}}"))
        .map(Token::Variable);

    // Symbols (multi-char first, then single-char)
    let symbol = choice((
        just("!=").to(Token::NotEq),
        just("<>").to(Token::NotEq),
        just("<=").to(Token::LtEq),
        just(">=").to(Token::GtEq),
        just('=').to(Token::Eq),
        just('<').to(Token::Lt),
        just('>').to(Token::Gt),
        just('(').to(Token::LParen),
        just(')').to(Token::RParen),
        just(',').to(Token::Comma),
        just('*').to(Token::Star),
        just(';').to(Token::Semicolon),
        just('-').to(Token::Minus),
    ));

    // Line comments: -- ... until newline
    let comment = just("--")
        .then(any().and_is(just('\n').not()).repeated())
        .ignored();

    let token = choice((variable, quoted_ident, string_lit, word, symbol))
        .map_with(|tok, e| (tok, e.span()));

    token
        .padded_by(comment.padded().repeated())
        .padded()
        .repeated()
        .collect()
        .padded_by(comment.padded().repeated())
        .padded()
        .then_ignore(end())
}

/// Lex a query string into tokens.
///
/// Returns Ok with the token list on success, or Err with the lex errors.
pub fn lex(source: &str) -> Result<Vec<(Token<'_>, SimpleSpan)>, Vec<Rich<'_, char>>> {
    let (tokens, errs) = lexer().parse(source).into_output_errors();
    if errs.is_empty() {
        Ok(tokens.unwrap_or_default())
    } else {
        Err(errs)
    }
}
