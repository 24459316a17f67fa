use serde_json::Value;

use crate::expr::ExpressionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Negate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    And,
    Or,
}

/// Parsed expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Path(String),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Conditional {
        condition: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },
    Call {
        name: String,
        args: Vec<Expr>,
    },
}

impl Expr {
    /// Identifier paths referenced anywhere in the tree, in first-seen order.
    pub fn references(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_references(&mut out);
        out
    }

    fn collect_references(&self, out: &mut Vec<String>) {
        match self {
            Expr::Literal(_) => {}
            Expr::Path(path) => {
                if !out.contains(path) {
                    out.push(path.clone());
                }
            }
            Expr::Unary { operand, .. } => operand.collect_references(out),
            Expr::Binary { left, right, .. } => {
                left.collect_references(out);
                right.collect_references(out);
            }
            Expr::Conditional {
                condition,
                then_branch,
                else_branch,
            } => {
                condition.collect_references(out);
                then_branch.collect_references(out);
                else_branch.collect_references(out);
            }
            Expr::Call { args, .. } => {
                for arg in args {
                    arg.collect_references(out);
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Num(f64),
    Bool(bool),
    Null,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
    And,
    Or,
    Not,
    LParen,
    RParen,
    Comma,
    Question,
    Colon,
}

pub fn parse(source: &str) -> Result<Expr, ExpressionError> {
    let tokens = tokenize(source)?;
    if tokens.is_empty() {
        return Err(ExpressionError::Syntax("empty expression".into()));
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let expr = parser.conditional()?;
    if let Some(token) = parser.peek() {
        return Err(ExpressionError::Syntax(format!(
            "unexpected token {token:?}"
        )));
    }
    Ok(expr)
}

fn tokenize(input: &str) -> Result<Vec<Token>, ExpressionError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    let peek = |at: usize| chars.get(at).copied();

    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\r' | '\n' => i += 1,
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '%' => {
                tokens.push(Token::Percent);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '?' => {
                tokens.push(Token::Question);
                i += 1;
            }
            ':' => {
                tokens.push(Token::Colon);
                i += 1;
            }
            '=' if peek(i + 1) == Some('=') => {
                // `===` is accepted as an alias
                i += if peek(i + 2) == Some('=') { 3 } else { 2 };
                tokens.push(Token::Eq);
            }
            '!' if peek(i + 1) == Some('=') => {
                i += if peek(i + 2) == Some('=') { 3 } else { 2 };
                tokens.push(Token::Ne);
            }
            '!' => {
                tokens.push(Token::Not);
                i += 1;
            }
            '>' if peek(i + 1) == Some('=') => {
                tokens.push(Token::Ge);
                i += 2;
            }
            '>' => {
                tokens.push(Token::Gt);
                i += 1;
            }
            '<' if peek(i + 1) == Some('=') => {
                tokens.push(Token::Le);
                i += 2;
            }
            '<' => {
                tokens.push(Token::Lt);
                i += 1;
            }
            '&' if peek(i + 1) == Some('&') => {
                tokens.push(Token::And);
                i += 2;
            }
            '|' if peek(i + 1) == Some('|') => {
                tokens.push(Token::Or);
                i += 2;
            }
            '"' | '\'' => {
                let quote = c;
                i += 1;
                let mut text = String::new();
                loop {
                    match peek(i) {
                        None => {
                            return Err(ExpressionError::Syntax(
                                "unterminated string literal".into(),
                            ));
                        }
                        Some('\\') => {
                            if let Some(escaped) = peek(i + 1) {
                                text.push(match escaped {
                                    'n' => '\n',
                                    't' => '\t',
                                    other => other,
                                });
                            }
                            i += 2;
                        }
                        Some(ch) if ch == quote => {
                            i += 1;
                            break;
                        }
                        Some(ch) => {
                            text.push(ch);
                            i += 1;
                        }
                    }
                }
                tokens.push(Token::Str(text));
            }
            c if c.is_ascii_digit() || (c == '.' && peek(i + 1).is_some_and(|n| n.is_ascii_digit())) => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let literal: String = chars[start..i].iter().collect();
                let number = literal.parse::<f64>().map_err(|_| {
                    ExpressionError::Syntax(format!("invalid number '{literal}'"))
                })?;
                tokens.push(Token::Num(number));
            }
            c if c.is_alphabetic() || c == '_' || c == '$' => {
                let start = i;
                while i < chars.len() {
                    let ch = chars[i];
                    if ch.is_alphanumeric() || ch == '_' || ch == '$' || ch == '.' {
                        i += 1;
                    } else if ch == '[' {
                        let close = chars[i..].iter().position(|ch| *ch == ']').ok_or_else(|| {
                            ExpressionError::Syntax("unterminated index in path".into())
                        })?;
                        i += close + 1;
                    } else {
                        break;
                    }
                }
                let word: String = chars[start..i].iter().collect();
                let word = word.trim_end_matches('.').to_string();
                tokens.push(match word.as_str() {
                    "true" => Token::Bool(true),
                    "false" => Token::Bool(false),
                    "null" | "undefined" => Token::Null,
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    _ => Token::Ident(word),
                });
            }
            other => {
                return Err(ExpressionError::Syntax(format!(
                    "unexpected character '{other}'"
                )));
            }
        }
    }

    Ok(tokens)
}

/// Bound on the depth of a parsed tree: prefix operators, parentheses, call
/// arguments, conditional branches and chained binary operators all count.
pub const MAX_DEPTH: usize = 256;

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn descend(&mut self) -> Result<(), ExpressionError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ExpressionError::Syntax("expression nested too deeply".into()));
        }
        Ok(())
    }

    fn ascend(&mut self) {
        self.depth -= 1;
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Token) -> Result<(), ExpressionError> {
        if self.eat(&expected) {
            Ok(())
        } else {
            Err(ExpressionError::Syntax(format!(
                "expected {expected:?}, found {:?}",
                self.peek()
            )))
        }
    }

    fn conditional(&mut self) -> Result<Expr, ExpressionError> {
        let condition = self.or()?;
        if !self.eat(&Token::Question) {
            return Ok(condition);
        }
        self.descend()?;
        let then_branch = self.conditional()?;
        self.expect(Token::Colon)?;
        let else_branch = self.conditional()?;
        self.ascend();
        Ok(Expr::Conditional {
            condition: Box::new(condition),
            then_branch: Box::new(then_branch),
            else_branch: Box::new(else_branch),
        })
    }

    fn or(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.and()?;
        let mut links = 0;
        while self.eat(&Token::Or) {
            self.descend()?;
            links += 1;
            let right = self.and()?;
            left = binary(BinaryOp::Or, left, right);
        }
        self.depth -= links;
        Ok(left)
    }

    fn and(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.equality()?;
        let mut links = 0;
        while self.eat(&Token::And) {
            self.descend()?;
            links += 1;
            let right = self.equality()?;
            left = binary(BinaryOp::And, left, right);
        }
        self.depth -= links;
        Ok(left)
    }

    fn equality(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.comparison()?;
        let mut links = 0;
        loop {
            let op = match self.peek() {
                Some(Token::Eq) => BinaryOp::Eq,
                Some(Token::Ne) => BinaryOp::Ne,
                _ => {
                    self.depth -= links;
                    return Ok(left);
                }
            };
            self.pos += 1;
            self.descend()?;
            links += 1;
            let right = self.comparison()?;
            left = binary(op, left, right);
        }
    }

    fn comparison(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.additive()?;
        let mut links = 0;
        loop {
            let op = match self.peek() {
                Some(Token::Lt) => BinaryOp::Lt,
                Some(Token::Le) => BinaryOp::Lte,
                Some(Token::Gt) => BinaryOp::Gt,
                Some(Token::Ge) => BinaryOp::Gte,
                _ => {
                    self.depth -= links;
                    return Ok(left);
                }
            };
            self.pos += 1;
            self.descend()?;
            links += 1;
            let right = self.additive()?;
            left = binary(op, left, right);
        }
    }

    fn additive(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.multiplicative()?;
        let mut links = 0;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => {
                    self.depth -= links;
                    return Ok(left);
                }
            };
            self.pos += 1;
            self.descend()?;
            links += 1;
            let right = self.multiplicative()?;
            left = binary(op, left, right);
        }
    }

    fn multiplicative(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.unary()?;
        let mut links = 0;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                Some(Token::Percent) => BinaryOp::Rem,
                _ => {
                    self.depth -= links;
                    return Ok(left);
                }
            };
            self.pos += 1;
            self.descend()?;
            links += 1;
            let right = self.unary()?;
            left = binary(op, left, right);
        }
    }

    fn unary(&mut self) -> Result<Expr, ExpressionError> {
        let op = match self.peek() {
            Some(Token::Not) => Some(UnaryOp::Not),
            Some(Token::Minus) => Some(UnaryOp::Negate),
            Some(Token::Plus) => None,
            _ => return self.primary(),
        };
        self.pos += 1;
        self.descend()?;
        let operand = self.unary()?;
        self.ascend();
        Ok(match op {
            Some(op) => Expr::Unary {
                op,
                operand: Box::new(operand),
            },
            None => operand,
        })
    }

    fn primary(&mut self) -> Result<Expr, ExpressionError> {
        match self.advance() {
            Some(Token::Num(number)) => Ok(Expr::Literal(number_value(number))),
            Some(Token::Str(text)) => Ok(Expr::Literal(Value::String(text))),
            Some(Token::Bool(flag)) => Ok(Expr::Literal(Value::Bool(flag))),
            Some(Token::Null) => Ok(Expr::Literal(Value::Null)),
            Some(Token::LParen) => {
                self.descend()?;
                let inner = self.conditional()?;
                self.expect(Token::RParen)?;
                self.ascend();
                Ok(inner)
            }
            Some(Token::Ident(name)) => {
                if !self.eat(&Token::LParen) {
                    return Ok(Expr::Path(name));
                }
                self.descend()?;
                let mut args = Vec::new();
                if !self.eat(&Token::RParen) {
                    loop {
                        args.push(self.conditional()?);
                        if self.eat(&Token::RParen) {
                            break;
                        }
                        self.expect(Token::Comma)?;
                    }
                }
                self.ascend();
                Ok(Expr::Call { name, args })
            }
            Some(token) => Err(ExpressionError::Syntax(format!(
                "unexpected token {token:?}"
            ))),
            None => Err(ExpressionError::Syntax("unexpected end of expression".into())),
        }
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

/// Integral numbers become JSON integers so `2 + 2` yields `4`, not `4.0`.
pub(crate) fn number_value(number: f64) -> Value {
    if number.fract() == 0.0 && number.abs() < 9.0e15 {
        Value::from(number as i64)
    } else {
        serde_json::Number::from_f64(number)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precedence_binds_multiplication_tighter() {
        let expr = parse("a + b * 2").expect("parse");
        let Expr::Binary { op, right, .. } = expr else {
            panic!("expected binary");
        };
        assert_eq!(op, BinaryOp::Add);
        assert!(matches!(*right, Expr::Binary { op: BinaryOp::Mul, .. }));
    }

    #[test]
    fn parses_indexed_paths_and_calls() {
        let expr = parse("len(items[0].tags) > 1 ? 'many' : 'few'").expect("parse");
        assert_eq!(expr.references(), vec!["items[0].tags".to_string()]);
    }

    #[test]
    fn rejects_dangling_operator() {
        assert!(matches!(parse("a +"), Err(ExpressionError::Syntax(_))));
        assert!(matches!(parse("'open"), Err(ExpressionError::Syntax(_))));
        assert!(matches!(parse(""), Err(ExpressionError::Syntax(_))));
    }

    #[test]
    fn rejects_nesting_past_the_depth_limit() {
        let deep_parens = format!("{}a{}", "(".repeat(5_000), ")".repeat(5_000));
        assert!(matches!(parse(&deep_parens), Err(ExpressionError::Syntax(_))));

        let deep_not = format!("{}a", "!".repeat(200_000));
        assert!(matches!(parse(&deep_not), Err(ExpressionError::Syntax(_))));

        let deep_calls = format!("{}a{}", "len(".repeat(1_000), ")".repeat(1_000));
        assert!(matches!(parse(&deep_calls), Err(ExpressionError::Syntax(_))));

        let long_chain = vec!["a"; 100_000].join(" + ");
        assert!(matches!(parse(&long_chain), Err(ExpressionError::Syntax(_))));

        let nested_ternary = format!("{}b", "a ? b : ".repeat(10_000));
        assert!(matches!(parse(&nested_ternary), Err(ExpressionError::Syntax(_))));
    }

    #[test]
    fn accepts_nesting_within_the_depth_limit() {
        let nested = format!("{}a{}", "(".repeat(MAX_DEPTH), ")".repeat(MAX_DEPTH));
        assert_eq!(parse(&nested).expect("parse"), Expr::Path("a".into()));
        assert!(parse("!!-+-a").is_ok());
        let sum = vec!["a"; 64].join(" + ");
        assert_eq!(parse(&sum).expect("parse").references(), vec!["a".to_string()]);
    }
}
