//! A small SQL tokenizer.
//!
//! This is not a parser. It knows enough PostgreSQL lexical structure
//! (string literals, quoted identifiers, dollar quoting, comments) for the
//! query policy to find relations, predicates and statement boundaries
//! without being fooled by punctuation inside literals.

use crate::error::PolicyViolation;

/// A lexical token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Keyword or unquoted identifier, as written.
    Word(String),
    /// Double-quoted identifier, unescaped.
    Quoted(String),
    /// String literal, unescaped.
    Str(String),
    /// Numeric literal.
    Number(String),
    /// Operator or punctuation.
    Symbol(String),
}

impl Token {
    /// Returns true if this is the unquoted keyword `keyword`.
    #[must_use]
    pub fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self, Self::Word(w) if w.eq_ignore_ascii_case(keyword))
    }

    #[must_use]
    pub fn is_symbol(&self, symbol: &str) -> bool {
        matches!(self, Self::Symbol(s) if s == symbol)
    }

    /// Returns the identifier this token names; unquoted names fold to lowercase.
    #[must_use]
    pub fn identifier(&self) -> Option<String> {
        match self {
            Self::Word(w) => Some(w.to_ascii_lowercase()),
            Self::Quoted(q) => Some(q.clone()),
            _ => None,
        }
    }

    /// Returns the value of a string or numeric literal.
    #[must_use]
    pub fn literal(&self) -> Option<&str> {
        match self {
            Self::Str(s) | Self::Number(s) => Some(s),
            _ => None,
        }
    }
}

const TWO_CHAR_SYMBOLS: [&str; 7] = ["<=", ">=", "<>", "!=", "::", "||", "!~"];

/// Splits `sql` into tokens, dropping whitespace and comments.
///
/// # Errors
///
/// Returns `Malformed` for unterminated literals, identifiers or comments.
pub fn tokenize(sql: &str) -> Result<Vec<Token>, PolicyViolation> {
    Ok(spanned(sql)?.into_iter().map(|(token, _)| token).collect())
}

/// Returns `sql` up to its last token, dropping trailing `;`, comments and
/// whitespace.
///
/// # Errors
///
/// Returns `Malformed` if `sql` does not tokenize.
pub fn statement_body(sql: &str) -> Result<&str, PolicyViolation> {
    let tokens = spanned(sql)?;
    let end = tokens
        .iter()
        .rev()
        .find(|(token, _)| !token.is_symbol(";"))
        .map_or(0, |(_, end)| *end);
    Ok(sql.char_indices().nth(end).map_or(sql, |(byte, _)| &sql[..byte]))
}

/// Tokenizes `sql`, pairing each token with the char index just past it.
fn spanned(sql: &str) -> Result<Vec<(Token, usize)>, PolicyViolation> {
    let chars: Vec<char> = sql.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let before = tokens.len();
        let next = chars.get(i + 1).copied();

        if c.is_whitespace() {
            i += 1;
        } else if c == '-' && next == Some('-') {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
        } else if c == '/' && next == Some('*') {
            let end = find_seq(&chars, i + 2, &['*', '/']).ok_or_else(|| malformed("unterminated comment"))?;
            i = end + 2;
        } else if c == '\'' {
            let (value, end) = quoted(&chars, i, '\'').ok_or_else(|| malformed("unterminated string literal"))?;
            tokens.push((Token::Str(value), i));
            i = end;
        } else if c == '"' {
            let (value, end) = quoted(&chars, i, '"').ok_or_else(|| malformed("unterminated quoted identifier"))?;
            tokens.push((Token::Quoted(value), i));
            i = end;
        } else if c == '$' && let Some((value, end)) = dollar_quoted(&chars, i)? {
            tokens.push((Token::Str(value), i));
            i = end;
        } else if c.is_ascii_digit() || (c == '.' && next.is_some_and(|n| n.is_ascii_digit())) {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                i += 1;
            }
            tokens.push((Token::Number(chars[start..i].iter().collect()), i));
        } else if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '$') {
                i += 1;
            }
            tokens.push((Token::Word(chars[start..i].iter().collect()), i));
        } else {
            let pair: String = chars[i..chars.len().min(i + 2)].iter().collect();
            if TWO_CHAR_SYMBOLS.contains(&pair.as_str()) {
                tokens.push((Token::Symbol(pair), i));
                i += 2;
            } else {
                tokens.push((Token::Symbol(c.to_string()), i));
                i += 1;
            }
        }
        if tokens.len() > before
            && let Some((_, end)) = tokens.last_mut()
        {
            *end = i;
        }
    }

    Ok(tokens)
}

fn malformed(reason: &str) -> PolicyViolation {
    PolicyViolation::Malformed {
        reason: reason.to_string(),
    }
}

fn find_seq(chars: &[char], from: usize, seq: &[char]) -> Option<usize> {
    (from..chars.len()).find(|&i| chars[i..].starts_with(seq))
}

/// Reads a literal delimited by `quote`, where a doubled quote escapes it.
fn quoted(chars: &[char], start: usize, quote: char) -> Option<(String, usize)> {
    let mut value = String::new();
    let mut i = start + 1;
    while i < chars.len() {
        if chars[i] == quote {
            if chars.get(i + 1) == Some(&quote) {
                value.push(quote);
                i += 2;
                continue;
            }
            return Some((value, i + 1));
        }
        value.push(chars[i]);
        i += 1;
    }
    None
}

/// Reads a `$tag$...$tag$` literal. Returns `None` if `$` does not open one.
fn dollar_quoted(chars: &[char], start: usize) -> Result<Option<(String, usize)>, PolicyViolation> {
    let mut i = start + 1;
    while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
        i += 1;
    }
    if chars.get(i) != Some(&'$') || chars.get(start + 1).is_some_and(char::is_ascii_digit) {
        return Ok(None);
    }

    let tag: Vec<char> = chars[start..=i].to_vec();
    let body_start = i + 1;
    let end = find_seq(chars, body_start, &tag).ok_or_else(|| malformed("unterminated dollar-quoted string"))?;
    Ok(Some((chars[body_start..end].iter().collect(), end + tag.len())))
}
