// Formula parser - converts formula strings into AST
// Supports: numbers, strings, TRUE/FALSE, cell refs (A1), ranges (A1:B3),
// functions (SUM), arithmetic (+, -, *, /, ^), concatenation (&) and
// comparisons (<, >, =, <=, >=, <>)

use crate::cell_id::CellId;
use crate::error::GridError;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Text(String),
    Boolean(bool),
    CellRef(CellId),
    Range { start: CellId, end: CellId },
    Function { name: String, args: Vec<Expr> },
    BinaryOp { op: Op, left: Box<Expr>, right: Box<Expr> },
    Negate(Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Op {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    // String
    Concat,
    // Comparison
    Lt,
    Gt,
    Eq,
    LtEq,
    GtEq,
    NotEq,
}

impl Expr {
    /// Every cell the expression reads, ranges expanded column by column.
    pub fn references(&self) -> Vec<CellId> {
        let mut refs = Vec::new();
        self.collect_refs(&mut refs);
        refs
    }

    fn collect_refs(&self, refs: &mut Vec<CellId>) {
        match self {
            Expr::Number(_) | Expr::Text(_) | Expr::Boolean(_) => {}
            Expr::CellRef(cell) => refs.push(*cell),
            Expr::Range { start, end } => {
                for column in start.column..=end.column {
                    for row in start.row..=end.row {
                        refs.push(CellId::new(column, row));
                    }
                }
            }
            Expr::Function { args, .. } => {
                for arg in args {
                    arg.collect_refs(refs);
                }
            }
            Expr::BinaryOp { left, right, .. } => {
                left.collect_refs(refs);
                right.collect_refs(refs);
            }
            Expr::Negate(inner) => inner.collect_refs(refs),
        }
    }
}

/// Parse a formula string (including its leading `=`) into an AST.
pub fn parse(formula: &str) -> Result<Expr, GridError> {
    let formula = formula.trim();
    let input = formula
        .strip_prefix('=')
        .ok_or_else(|| GridError::Formula("Formula must start with =".to_string()))?;

    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(GridError::Formula("Empty formula".to_string()));
    }

    let (expr, pos) = parse_comparison(&tokens, 0)?;
    if pos != tokens.len() {
        return Err(GridError::Formula(format!("Unexpected token: {:?}", tokens[pos])));
    }
    Ok(expr)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    StringLit(String),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    Ampersand,
    LParen,
    RParen,
    Colon,
    Comma,
    Lt,
    Gt,
    Eq,
    LtEq,
    GtEq,
    NotEq,
}

fn tokenize(input: &str) -> Result<Vec<Token>, GridError> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' => { chars.next(); }
            '+' => { tokens.push(Token::Plus); chars.next(); }
            '-' => { tokens.push(Token::Minus); chars.next(); }
            '*' => { tokens.push(Token::Star); chars.next(); }
            '/' => { tokens.push(Token::Slash); chars.next(); }
            '^' => { tokens.push(Token::Caret); chars.next(); }
            '&' => { tokens.push(Token::Ampersand); chars.next(); }
            '(' => { tokens.push(Token::LParen); chars.next(); }
            ')' => { tokens.push(Token::RParen); chars.next(); }
            ':' => { tokens.push(Token::Colon); chars.next(); }
            ',' => { tokens.push(Token::Comma); chars.next(); }
            '=' => { tokens.push(Token::Eq); chars.next(); }
            '<' => {
                chars.next();
                match chars.peek() {
                    Some('=') => { tokens.push(Token::LtEq); chars.next(); }
                    Some('>') => { tokens.push(Token::NotEq); chars.next(); }
                    _ => tokens.push(Token::Lt),
                }
            }
            '>' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    tokens.push(Token::GtEq);
                    chars.next();
                } else {
                    tokens.push(Token::Gt);
                }
            }
            '"' => {
                chars.next(); // consume opening quote
                let mut s = String::new();
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some(ch) => s.push(ch),
                        None => return Err(GridError::Formula("Unterminated string literal".to_string())),
                    }
                }
                tokens.push(Token::StringLit(s));
            }
            'A'..='Z' | 'a'..='z' => {
                // Cell reference (A1) or function name (SUM); decided by the parser
                let mut ident = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_ascii_alphanumeric() || ch == '_' {
                        ident.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(ident));
            }
            '0'..='9' | '.' => {
                let mut num_str = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        num_str.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let num: f64 = num_str
                    .parse()
                    .map_err(|_| GridError::Formula(format!("Invalid number: {}", num_str)))?;
                tokens.push(Token::Number(num));
            }
            _ => return Err(GridError::Formula(format!("Unexpected character: {}", c))),
        }
    }

    Ok(tokens)
}

type Parsed = Result<(Expr, usize), GridError>;

fn binary(op: Op, left: Expr, right: Expr) -> Expr {
    Expr::BinaryOp {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

// Lowest precedence: comparison operators
fn parse_comparison(tokens: &[Token], pos: usize) -> Parsed {
    let (mut left, mut pos) = parse_concat(tokens, pos)?;

    while let Some(token) = tokens.get(pos) {
        let op = match token {
            Token::Lt => Op::Lt,
            Token::Gt => Op::Gt,
            Token::Eq => Op::Eq,
            Token::LtEq => Op::LtEq,
            Token::GtEq => Op::GtEq,
            Token::NotEq => Op::NotEq,
            _ => break,
        };
        let (right, new_pos) = parse_concat(tokens, pos + 1)?;
        left = binary(op, left, right);
        pos = new_pos;
    }

    Ok((left, pos))
}

fn parse_concat(tokens: &[Token], pos: usize) -> Parsed {
    let (mut left, mut pos) = parse_add_sub(tokens, pos)?;

    while tokens.get(pos) == Some(&Token::Ampersand) {
        let (right, new_pos) = parse_add_sub(tokens, pos + 1)?;
        left = binary(Op::Concat, left, right);
        pos = new_pos;
    }

    Ok((left, pos))
}

fn parse_add_sub(tokens: &[Token], pos: usize) -> Parsed {
    let (mut left, mut pos) = parse_mul_div(tokens, pos)?;

    while let Some(token) = tokens.get(pos) {
        let op = match token {
            Token::Plus => Op::Add,
            Token::Minus => Op::Sub,
            _ => break,
        };
        let (right, new_pos) = parse_mul_div(tokens, pos + 1)?;
        left = binary(op, left, right);
        pos = new_pos;
    }

    Ok((left, pos))
}

fn parse_mul_div(tokens: &[Token], pos: usize) -> Parsed {
    let (mut left, mut pos) = parse_pow(tokens, pos)?;

    while let Some(token) = tokens.get(pos) {
        let op = match token {
            Token::Star => Op::Mul,
            Token::Slash => Op::Div,
            _ => break,
        };
        let (right, new_pos) = parse_pow(tokens, pos + 1)?;
        left = binary(op, left, right);
        pos = new_pos;
    }

    Ok((left, pos))
}

fn parse_pow(tokens: &[Token], pos: usize) -> Parsed {
    let (mut left, mut pos) = parse_unary(tokens, pos)?;

    while tokens.get(pos) == Some(&Token::Caret) {
        let (right, new_pos) = parse_unary(tokens, pos + 1)?;
        left = binary(Op::Pow, left, right);
        pos = new_pos;
    }

    Ok((left, pos))
}

fn parse_unary(tokens: &[Token], pos: usize) -> Parsed {
    match tokens.get(pos) {
        Some(Token::Minus) => {
            let (inner, pos) = parse_unary(tokens, pos + 1)?;
            Ok((Expr::Negate(Box::new(inner)), pos))
        }
        Some(Token::Plus) => parse_unary(tokens, pos + 1),
        _ => parse_primary(tokens, pos),
    }
}

fn parse_primary(tokens: &[Token], pos: usize) -> Parsed {
    let token = tokens
        .get(pos)
        .ok_or_else(|| GridError::Formula("Unexpected end of formula".to_string()))?;

    match token {
        Token::Number(n) => Ok((Expr::Number(*n), pos + 1)),
        Token::StringLit(s) => Ok((Expr::Text(s.clone()), pos + 1)),
        Token::LParen => {
            let (expr, pos) = parse_comparison(tokens, pos + 1)?;
            match tokens.get(pos) {
                Some(Token::RParen) => Ok((expr, pos + 1)),
                _ => Err(GridError::Formula("Expected )".to_string())),
            }
        }
        Token::Ident(ident) => {
            if tokens.get(pos + 1) == Some(&Token::LParen) {
                return parse_function(ident.to_uppercase(), tokens, pos + 2);
            }

            match ident.to_uppercase().as_str() {
                "TRUE" => return Ok((Expr::Boolean(true), pos + 1)),
                "FALSE" => return Ok((Expr::Boolean(false), pos + 1)),
                _ => {}
            }

            let start = CellId::parse(ident)?;
            if tokens.get(pos + 1) == Some(&Token::Colon) {
                return match tokens.get(pos + 2) {
                    Some(Token::Ident(end)) => {
                        let end = CellId::parse(end)?;
                        Ok((Expr::Range { start, end }, pos + 3))
                    }
                    _ => Err(GridError::InvalidReference(format!("{}:", ident))),
                };
            }
            Ok((Expr::CellRef(start), pos + 1))
        }
        other => Err(GridError::Formula(format!("Unexpected token: {:?}", other))),
    }
}

fn parse_function(name: String, tokens: &[Token], mut pos: usize) -> Parsed {
    let mut args = Vec::new();

    if tokens.get(pos) == Some(&Token::RParen) {
        return Ok((Expr::Function { name, args }, pos + 1));
    }

    loop {
        let (arg, new_pos) = parse_comparison(tokens, pos)?;
        args.push(arg);
        pos = new_pos;
        match tokens.get(pos) {
            Some(Token::Comma) => pos += 1,
            Some(Token::RParen) => return Ok((Expr::Function { name, args }, pos + 1)),
            _ => return Err(GridError::Formula(format!("Expected , or ) in {}", name))),
        }
    }
}
