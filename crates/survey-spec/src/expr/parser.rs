use serde_json::{Number, Value};

use super::lexer::{Spanned, Token, tokenize};
use super::{CompareOp, ConditionError, Expr};

/// Deepest nesting of parentheses, lists and `not` accepted in one condition.
const MAX_DEPTH: usize = 64;

pub(crate) fn parse(source: &str) -> Result<Expr, ConditionError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
        end: source.len(),
    };
    let expr = parser.parse_or()?;
    match parser.peek() {
        None => Ok(expr),
        Some(spanned) => Err(ConditionError::UnexpectedToken {
            expected: "end of condition",
            found: spanned.token.describe(),
            offset: spanned.offset,
        }),
    }
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    depth: usize,
    end: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Spanned> {
        self.tokens.get(self.pos)
    }

    fn peek_token(&self) -> Option<&Token> {
        self.peek().map(|spanned| &spanned.token)
    }

    fn advance(&mut self) -> Option<Spanned> {
        let spanned = self.tokens.get(self.pos).cloned();
        if spanned.is_some() {
            self.pos += 1;
        }
        spanned
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek_token() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn offset(&self) -> usize {
        self.peek().map_or(self.end, |spanned| spanned.offset)
    }

    fn unexpected(&self, expected: &'static str) -> ConditionError {
        ConditionError::UnexpectedToken {
            expected,
            found: self
                .peek()
                .map_or_else(|| "end of condition".to_string(), |s| s.token.describe()),
            offset: self.offset(),
        }
    }

    fn expect(&mut self, token: &Token, expected: &'static str) -> Result<(), ConditionError> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn enter(&mut self) -> Result<(), ConditionError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ConditionError::TooDeep {
                offset: self.offset(),
            });
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn parse_or(&mut self) -> Result<Expr, ConditionError> {
        let first = self.parse_and()?;
        let mut expressions = vec![first];
        while self.eat(&Token::Or) {
            expressions.push(self.parse_and()?);
        }
        Ok(collapse(expressions, |expressions| Expr::Or { expressions }))
    }

    fn parse_and(&mut self) -> Result<Expr, ConditionError> {
        let first = self.parse_not()?;
        let mut expressions = vec![first];
        while self.eat(&Token::And) {
            expressions.push(self.parse_not()?);
        }
        Ok(collapse(expressions, |expressions| Expr::And { expressions }))
    }

    fn parse_not(&mut self) -> Result<Expr, ConditionError> {
        if self.eat(&Token::Not) {
            self.enter()?;
            let expression = self.parse_not()?;
            self.leave();
            return Ok(Expr::Not {
                expression: Box::new(expression),
            });
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, ConditionError> {
        let left = self.parse_operand()?;
        let Some(cmp) = self.parse_compare_op()? else {
            return Ok(left);
        };
        let right = self.parse_operand()?;
        if let Some(offset) = self.peek_compare_op() {
            return Err(ConditionError::ChainedComparison { offset });
        }
        Ok(Expr::Compare {
            cmp,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    fn peek_compare_op(&self) -> Option<usize> {
        let spanned = self.peek()?;
        match spanned.token {
            Token::Eq | Token::Ne | Token::Lt | Token::Le | Token::Gt | Token::Ge | Token::In => {
                Some(spanned.offset)
            }
            Token::Not
                if matches!(
                    self.tokens.get(self.pos + 1).map(|s| &s.token),
                    Some(Token::In)
                ) =>
            {
                Some(spanned.offset)
            }
            _ => None,
        }
    }

    fn parse_compare_op(&mut self) -> Result<Option<CompareOp>, ConditionError> {
        let cmp = match self.peek_token() {
            Some(Token::Eq) => CompareOp::Eq,
            Some(Token::Ne) => CompareOp::Ne,
            Some(Token::Lt) => CompareOp::Lt,
            Some(Token::Le) => CompareOp::Le,
            Some(Token::Gt) => CompareOp::Gt,
            Some(Token::Ge) => CompareOp::Ge,
            Some(Token::In) => CompareOp::In,
            Some(Token::Not) => {
                self.pos += 1;
                self.expect(&Token::In, "'in' after 'not'")?;
                return Ok(Some(CompareOp::NotIn));
            }
            _ => return Ok(None),
        };
        self.pos += 1;
        Ok(Some(cmp))
    }

    fn parse_operand(&mut self) -> Result<Expr, ConditionError> {
        let Some(spanned) = self.advance() else {
            return Err(self.unexpected("a value or question id"));
        };
        match spanned.token {
            Token::Ident(name) => Ok(Expr::Var { name }),
            Token::Str(text) => Ok(literal(Value::String(text))),
            Token::Num(number) => Ok(literal(Value::Number(number))),
            Token::True => Ok(literal(Value::Bool(true))),
            Token::False => Ok(literal(Value::Bool(false))),
            Token::Null => Ok(literal(Value::Null)),
            Token::Minus => match self.peek_token() {
                Some(Token::Num(number)) => {
                    let number = negate(number);
                    self.pos += 1;
                    Ok(literal(Value::Number(number)))
                }
                _ => Err(self.unexpected("a number after '-'")),
            },
            Token::LBracket => {
                self.enter()?;
                let items = self.parse_items(&Token::RBracket, "']'")?;
                self.leave();
                Ok(Expr::List { items })
            }
            Token::LParen => {
                self.enter()?;
                let first = self.parse_or()?;
                let expr = if self.eat(&Token::Comma) {
                    let mut items = vec![first];
                    items.extend(self.parse_items(&Token::RParen, "')'")?);
                    Expr::List { items }
                } else {
                    self.expect(&Token::RParen, "')'")?;
                    first
                };
                self.leave();
                Ok(expr)
            }
            _ => {
                self.pos -= 1;
                Err(self.unexpected("a value or question id"))
            }
        }
    }

    /// Parses comma-separated items up to `close`, allowing a trailing comma.
    fn parse_items(
        &mut self,
        close: &Token,
        expected: &'static str,
    ) -> Result<Vec<Expr>, ConditionError> {
        let mut items = Vec::new();
        loop {
            if self.eat(close) {
                return Ok(items);
            }
            items.push(self.parse_or()?);
            if !self.eat(&Token::Comma) {
                self.expect(close, expected)?;
                return Ok(items);
            }
        }
    }
}

fn collapse(mut expressions: Vec<Expr>, wrap: impl FnOnce(Vec<Expr>) -> Expr) -> Expr {
    if expressions.len() == 1 {
        expressions.remove(0)
    } else {
        wrap(expressions)
    }
}

fn literal(value: Value) -> Expr {
    Expr::Literal { value }
}

fn negate(number: &Number) -> Number {
    if let Some(value) = number.as_i64() {
        Number::from(-value)
    } else {
        number
            .as_f64()
            .and_then(|value| Number::from_f64(-value))
            .unwrap_or_else(|| number.clone())
    }
}
