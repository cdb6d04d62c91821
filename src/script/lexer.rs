// src/script/lexer.rs

//! Line tokenizer for `.route` sources.
//!
//! Tokens never span lines. Columns are 1-based and count characters, not
//! bytes, so diagnostics line up with what an editor shows.

use super::Diagnostic;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    /// Any run of non-whitespace characters not starting with `"`.
    Word(String),
    /// A double-quoted string with escapes resolved. `cols[i]` is the source
    /// column of the i-th character of the value.
    Str { value: String, cols: Vec<usize> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub column: usize,
}

impl Token {
    pub fn word(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Word(w) => Some(w),
            TokenKind::Str { .. } => None,
        }
    }
}

/// Tokenize one line. Comments (`#` at the start of a token) end the line.
pub fn tokenize_line(line: &str, line_no: usize) -> Result<Vec<Token>, Diagnostic> {
    let chars: Vec<char> = line.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if c == '#' {
            break;
        }

        let start_col = i + 1;
        if c == '"' {
            let (value, cols, next) = lex_string(&chars, i, line_no)?;
            tokens.push(Token {
                kind: TokenKind::Str { value, cols },
                column: start_col,
            });
            i = next;
        } else {
            let begin = i;
            while i < chars.len() && !chars[i].is_whitespace() && chars[i] != '"' {
                i += 1;
            }
            tokens.push(Token {
                kind: TokenKind::Word(chars[begin..i].iter().collect()),
                column: start_col,
            });
        }
    }

    Ok(tokens)
}

fn lex_string(
    chars: &[char],
    open: usize,
    line_no: usize,
) -> Result<(String, Vec<usize>, usize), Diagnostic> {
    let mut value = String::new();
    let mut cols = Vec::new();
    let mut i = open + 1;

    while i < chars.len() {
        match chars[i] {
            '"' => return Ok((value, cols, i + 1)),
            '\\' => {
                let escaped = match chars.get(i + 1) {
                    Some('"') => '"',
                    Some('\\') => '\\',
                    Some('n') => '\n',
                    Some('t') => '\t',
                    Some(other) => {
                        return Err(Diagnostic::new(
                            line_no,
                            i + 1,
                            format!("unknown escape sequence `\\{other}`"),
                        ));
                    }
                    None => break,
                };
                value.push(escaped);
                cols.push(i + 1);
                i += 2;
            }
            c => {
                value.push(c);
                cols.push(i + 1);
                i += 1;
            }
        }
    }

    Err(Diagnostic::new(line_no, open + 1, "unterminated string literal"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(tokens: &[Token]) -> Vec<String> {
        tokens
            .iter()
            .map(|t| match &t.kind {
                TokenKind::Word(w) => w.clone(),
                TokenKind::Str { value, .. } => format!("<{value}>"),
            })
            .collect()
    }

    #[test]
    fn splits_words_strings_and_drops_comments() {
        let tokens = tokenize_line(r#"  header X-Id "a \"b\"" # trailing"#, 3).unwrap();
        assert_eq!(words(&tokens), vec!["header", "X-Id", "<a \"b\">"]);
        assert_eq!(tokens[0].column, 3);
        assert_eq!(tokens[2].column, 15);
    }

    #[test]
    fn string_columns_track_escapes() {
        let tokens = tokenize_line(r#"write "\n{x}""#, 1).unwrap();
        match &tokens[1].kind {
            TokenKind::Str { value, cols } => {
                assert_eq!(value, "\n{x}");
                // `{` sits at column 10: w-r-i-t-e-space-quote-\-n-{
                assert_eq!(cols[1], 10);
            }
            other => panic!("expected string, got {other:?}"),
        }
    }

    #[test]
    fn unterminated_string_reports_opening_quote() {
        let err = tokenize_line(r#"write "oops"#, 7).unwrap_err();
        assert_eq!((err.line, err.column), (7, 7));
        assert!(err.message.contains("unterminated"));
    }
}
