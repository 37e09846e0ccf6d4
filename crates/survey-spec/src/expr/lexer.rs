use serde_json::Number;

use super::ConditionError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Ident(String),
    Str(String),
    Num(Number),
    True,
    False,
    Null,
    And,
    Or,
    Not,
    In,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Minus,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
}

impl Token {
    pub(crate) fn describe(&self) -> String {
        match self {
            Token::Ident(name) => format!("identifier '{}'", name),
            Token::Str(text) => format!("string '{}'", text),
            Token::Num(num) => format!("number {}", num),
            Token::True => "'True'".into(),
            Token::False => "'False'".into(),
            Token::Null => "'None'".into(),
            Token::And => "'and'".into(),
            Token::Or => "'or'".into(),
            Token::Not => "'not'".into(),
            Token::In => "'in'".into(),
            Token::Eq => "'=='".into(),
            Token::Ne => "'!='".into(),
            Token::Lt => "'<'".into(),
            Token::Le => "'<='".into(),
            Token::Gt => "'>'".into(),
            Token::Ge => "'>='".into(),
            Token::Minus => "'-'".into(),
            Token::LParen => "'('".into(),
            Token::RParen => "')'".into(),
            Token::LBracket => "'['".into(),
            Token::RBracket => "']'".into(),
            Token::Comma => "','".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Spanned {
    pub token: Token,
    pub offset: usize,
}

pub(crate) fn tokenize(source: &str) -> Result<Vec<Spanned>, ConditionError> {
    let chars: Vec<(usize, char)> = source.char_indices().collect();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < chars.len() {
        let (offset, ch) = chars[pos];
        if ch.is_whitespace() {
            pos += 1;
            continue;
        }

        let peek = chars.get(pos + 1).map(|(_, next)| *next);
        let (token, width) = match ch {
            '(' => (Token::LParen, 1),
            ')' => (Token::RParen, 1),
            '[' => (Token::LBracket, 1),
            ']' => (Token::RBracket, 1),
            ',' => (Token::Comma, 1),
            '-' => (Token::Minus, 1),
            '=' if peek == Some('=') => (Token::Eq, 2),
            '!' if peek == Some('=') => (Token::Ne, 2),
            '<' if peek == Some('=') => (Token::Le, 2),
            '>' if peek == Some('=') => (Token::Ge, 2),
            '<' => (Token::Lt, 1),
            '>' => (Token::Gt, 1),
            '\'' | '"' => {
                let (text, consumed) = read_string(&chars, pos, offset)?;
                (Token::Str(text), consumed)
            }
            c if c.is_ascii_digit() => {
                let (number, consumed) = read_number(&chars, pos, offset)?;
                (Token::Num(number), consumed)
            }
            c if c.is_alphabetic() || c == '_' => {
                let end = chars[pos..]
                    .iter()
                    .position(|(_, c)| !(c.is_alphanumeric() || *c == '_'))
                    .map_or(chars.len(), |len| pos + len);
                let word: String = chars[pos..end].iter().map(|(_, c)| *c).collect();
                (keyword(word), end - pos)
            }
            other => {
                return Err(ConditionError::UnexpectedChar {
                    found: other,
                    offset,
                });
            }
        };

        tokens.push(Spanned { token, offset });
        pos += width;
    }

    Ok(tokens)
}

/// Words read as operators or literals, so a question with this id cannot be referenced.
pub(crate) fn is_reserved_word(word: &str) -> bool {
    !matches!(keyword(word.to_string()), Token::Ident(_))
}

fn keyword(word: String) -> Token {
    match word.as_str() {
        "and" => Token::And,
        "or" => Token::Or,
        "not" => Token::Not,
        "in" => Token::In,
        "True" | "true" => Token::True,
        "False" | "false" => Token::False,
        "None" => Token::Null,
        _ => Token::Ident(word),
    }
}

fn read_string(
    chars: &[(usize, char)],
    start: usize,
    offset: usize,
) -> Result<(String, usize), ConditionError> {
    let quote = chars[start].1;
    let mut text = String::new();
    let mut pos = start + 1;
    while let Some(&(_, ch)) = chars.get(pos) {
        match ch {
            '\\' => {
                let Some(&(_, escaped)) = chars.get(pos + 1) else {
                    break;
                };
                text.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    other => other,
                });
                pos += 2;
            }
            c if c == quote => return Ok((text, pos + 1 - start)),
            c => {
                text.push(c);
                pos += 1;
            }
        }
    }
    Err(ConditionError::UnterminatedString { offset })
}

fn read_number(
    chars: &[(usize, char)],
    start: usize,
    offset: usize,
) -> Result<(Number, usize), ConditionError> {
    let mut pos = start;
    let mut seen_dot = false;
    while let Some(&(_, ch)) = chars.get(pos) {
        if ch.is_ascii_digit() {
            pos += 1;
        } else if ch == '.' && !seen_dot {
            seen_dot = true;
            pos += 1;
        } else {
            break;
        }
    }
    let text: String = chars[start..pos].iter().map(|(_, c)| *c).collect();
    let invalid = || ConditionError::InvalidNumber {
        text: text.clone(),
        offset,
    };
    let number = if seen_dot {
        let value: f64 = text.parse().map_err(|_| invalid())?;
        Number::from_f64(value).ok_or_else(invalid)?
    } else {
        let value: i64 = text.parse().map_err(|_| invalid())?;
        Number::from(value)
    };
    Ok((number, pos - start))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        tokenize(source)
            .expect("tokenize")
            .into_iter()
            .map(|spanned| spanned.token)
            .collect()
    }

    #[test]
    fn tokenizes_comparison() {
        assert_eq!(
            kinds("smoker == 'Oui'"),
            vec![
                Token::Ident("smoker".into()),
                Token::Eq,
                Token::Str("Oui".into())
            ]
        );
    }

    #[test]
    fn tokenizes_numbers_and_keywords() {
        assert_eq!(
            kinds("age >= 18.5 and not flag"),
            vec![
                Token::Ident("age".into()),
                Token::Ge,
                Token::Num(Number::from_f64(18.5).expect("finite")),
                Token::And,
                Token::Not,
                Token::Ident("flag".into()),
            ]
        );
    }

    #[test]
    fn keywords_are_reserved() {
        for word in ["and", "or", "not", "in", "True", "false", "None"] {
            assert!(is_reserved_word(word), "{word}");
        }
        assert!(!is_reserved_word("smoker"));
        assert!(!is_reserved_word("none"));
    }

    #[test]
    fn keeps_escaped_quotes() {
        assert_eq!(kinds(r#""it\"s""#), vec![Token::Str("it\"s".into())]);
    }

    #[test]
    fn rejects_single_equals() {
        assert!(matches!(
            tokenize("a = 1"),
            Err(ConditionError::UnexpectedChar { found: '=', offset: 2 })
        ));
    }

    #[test]
    fn rejects_unterminated_string() {
        assert!(matches!(
            tokenize("a == 'oops"),
            Err(ConditionError::UnterminatedString { offset: 5 })
        ));
    }
}
