//! Arithmetic solver for recognized quiz problems.
//!
//! A recognized problem arrives as a string of single-character glyph labels
//! (digits plus `A`dd, `M`inus, `T`imes, `D`ivide, `E`quals, `U`nknown).
//! The solver tokenizes the string, classifies it as a two-number comparison
//! or an equation with one unknown, and solves it. Expressions evaluate
//! strictly left to right with no operator precedence, matching how the quiz
//! typesets elementary arithmetic.

use std::fmt;

/// One atom of a recognized problem.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Token {
    Number(f64),
    Add,
    Sub,
    Mul,
    Div,
    Equals,
    Unknown,
}

/// Outcome of a comparison problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Greater,
    Less,
    Equal,
}

impl Relation {
    pub fn as_char(self) -> char {
        match self {
            Relation::Greater => '>',
            Relation::Less => '<',
            Relation::Equal => '=',
        }
    }
}

/// A solved problem: either the recovered number or a comparison symbol.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Answer {
    Value(f64),
    Relation(Relation),
}

impl Answer {
    /// Renders the answer as the string of characters to draw.
    ///
    /// A value equal to its integer truncation renders without a fractional
    /// part. With `forbid_fractional` set, non-integral values are rejected
    /// instead of rendered.
    pub fn render(&self, forbid_fractional: bool) -> Result<String, SolveError> {
        match self {
            Answer::Relation(rel) => Ok(rel.as_char().to_string()),
            Answer::Value(v) => {
                if v.trunc() == *v {
                    Ok(format!("{}", *v as i64))
                } else if forbid_fractional {
                    Err(SolveError::FractionalAnswer)
                } else {
                    Ok(format!("{v}"))
                }
            }
        }
    }
}

/// Validation failures raised by the solver. Never produces partial results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveError {
    /// No equals sign and no unknown mark: not a comparison problem.
    NoUnknownMark,
    /// A comparison problem must have exactly three tokens.
    ComparisonArity(usize),
    /// The middle token of a comparison must be the unknown mark.
    ComparisonMiddle,
    /// Both comparison operands must be numbers.
    ComparisonOperand,
    /// An equation must contain exactly one equals sign.
    ExtraEquals,
    /// An equation must contain at most one unknown mark.
    ExtraUnknowns,
    /// One side of the equation has no tokens.
    EmptySide,
    /// An expression side does not alternate numbers and operators.
    MalformedExpression,
    /// The unknown side has a shape the inverse-operation table cannot solve.
    UnsupportedEquation,
    /// An inverse operation or evaluation divided by zero.
    DivisionByZero,
    /// The answer is non-integral and fractional rendering is disabled.
    FractionalAnswer,
}

impl fmt::Display for SolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolveError::NoUnknownMark => {
                write!(f, "not a comparison problem: no unknown mark present")
            }
            SolveError::ComparisonArity(n) => {
                write!(f, "not a comparison problem: expected 3 tokens, got {n}")
            }
            SolveError::ComparisonMiddle => {
                write!(f, "not a comparison problem: middle token must be the unknown mark")
            }
            SolveError::ComparisonOperand => {
                write!(f, "not a comparison problem: operands must be numbers")
            }
            SolveError::ExtraEquals => {
                write!(f, "not a valid equation: expected exactly one equals sign")
            }
            SolveError::ExtraUnknowns => {
                write!(f, "not a valid equation: more than one unknown mark")
            }
            SolveError::EmptySide => write!(f, "equation side is empty"),
            SolveError::MalformedExpression => {
                write!(f, "expression does not alternate numbers and operators")
            }
            SolveError::UnsupportedEquation => write!(f, "cannot solve this equation form"),
            SolveError::DivisionByZero => write!(f, "division by zero"),
            SolveError::FractionalAnswer => write!(f, "fractional answers are disabled"),
        }
    }
}

impl std::error::Error for SolveError {}

/// Maps one glyph character onto a token. Template labels and the printed
/// symbols the external text engine emits are both in the alphabet.
fn map_char(c: char) -> Option<Token> {
    match c {
        'A' | '+' => Some(Token::Add),
        'M' | '-' | '−' => Some(Token::Sub),
        'T' | '×' | 'x' | 'X' | '*' => Some(Token::Mul),
        'D' | '÷' | '/' => Some(Token::Div),
        'E' | '=' => Some(Token::Equals),
        'U' | '?' | '？' => Some(Token::Unknown),
        _ => None,
    }
}

/// Tokenizes a recognized problem string.
///
/// Consecutive digits accumulate into one number, flushed by any non-digit.
/// Within one consecutive run of non-digit characters, each distinct glyph is
/// emitted at most once; recognition sometimes doubles an operator glyph and
/// the collapse absorbs that. Characters outside the alphabet are ignored.
pub fn tokenize(problem: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut pending_num = String::new();
    let mut pending_run = String::new();
    for c in problem.chars() {
        if c.is_ascii_digit() {
            pending_num.push(c);
            pending_run.clear();
        } else {
            flush_number(&mut pending_num, &mut tokens);
            if !pending_run.contains(c) {
                if let Some(token) = map_char(c) {
                    tokens.push(token);
                }
            }
            pending_run.push(c);
        }
    }
    flush_number(&mut pending_num, &mut tokens);
    tokens
}

fn flush_number(pending: &mut String, tokens: &mut Vec<Token>) {
    if pending.is_empty() {
        return;
    }
    if let Ok(n) = pending.parse::<f64>() {
        tokens.push(Token::Number(n));
    }
    pending.clear();
}

/// Tokenizes and solves a recognized problem string.
pub fn solve(problem: &str) -> Result<Answer, SolveError> {
    solve_tokens(&tokenize(problem))
}

/// Solves an already tokenized problem.
pub fn solve_tokens(tokens: &[Token]) -> Result<Answer, SolveError> {
    let equals = tokens.iter().filter(|t| matches!(t, Token::Equals)).count();
    if equals == 0 {
        return solve_comparison(tokens).map(Answer::Relation);
    }
    if equals > 1 {
        return Err(SolveError::ExtraEquals);
    }

    let unknowns = tokens.iter().filter(|t| matches!(t, Token::Unknown)).count();
    if unknowns > 1 {
        return Err(SolveError::ExtraUnknowns);
    }
    // A fully numeric equation solves for an implicit unknown on the right.
    let mut owned;
    let tokens = if unknowns == 0 {
        owned = tokens.to_vec();
        owned.push(Token::Unknown);
        owned.as_slice()
    } else {
        tokens
    };

    let split = tokens
        .iter()
        .position(|t| matches!(t, Token::Equals))
        .ok_or(SolveError::ExtraEquals)?;
    let (left, right) = (&tokens[..split], &tokens[split + 1..]);

    if left.iter().any(|t| matches!(t, Token::Unknown)) {
        let known = eval_expr(right)?;
        solve_unknown_side(left, known)
    } else {
        let known = eval_expr(left)?;
        solve_unknown_side(right, known)
    }
}

fn solve_comparison(tokens: &[Token]) -> Result<Relation, SolveError> {
    if !tokens.iter().any(|t| matches!(t, Token::Unknown)) {
        return Err(SolveError::NoUnknownMark);
    }
    if tokens.len() != 3 {
        return Err(SolveError::ComparisonArity(tokens.len()));
    }
    if !matches!(tokens[1], Token::Unknown) {
        return Err(SolveError::ComparisonMiddle);
    }
    match (&tokens[0], &tokens[2]) {
        (Token::Number(a), Token::Number(b)) => Ok(if a > b {
            Relation::Greater
        } else if a < b {
            Relation::Less
        } else {
            Relation::Equal
        }),
        _ => Err(SolveError::ComparisonOperand),
    }
}

/// Evaluates a known expression side left to right, no operator precedence.
fn eval_expr(expr: &[Token]) -> Result<f64, SolveError> {
    let mut total = match expr.first() {
        Some(Token::Number(n)) => *n,
        Some(_) => return Err(SolveError::MalformedExpression),
        None => return Err(SolveError::EmptySide),
    };
    let mut i = 1;
    while i < expr.len() {
        let operand = match expr.get(i + 1) {
            Some(Token::Number(n)) => *n,
            _ => return Err(SolveError::MalformedExpression),
        };
        total = match expr[i] {
            Token::Add => total + operand,
            Token::Sub => total - operand,
            Token::Mul => total * operand,
            Token::Div => checked_div(total, operand)?,
            _ => return Err(SolveError::MalformedExpression),
        };
        i += 2;
    }
    Ok(total)
}

/// Solves the side holding the unknown mark against the evaluated number.
fn solve_unknown_side(side: &[Token], known: f64) -> Result<Answer, SolveError> {
    let value = match side {
        [Token::Unknown] => known,
        [Token::Unknown, op, Token::Number(n)] => match op {
            Token::Add => known - n,
            Token::Sub => known + n,
            Token::Mul => checked_div(known, *n)?,
            Token::Div => known * n,
            _ => return Err(SolveError::UnsupportedEquation),
        },
        [Token::Number(n), op, Token::Unknown] => match op {
            Token::Add => known - n,
            Token::Sub => n - known,
            Token::Mul => checked_div(known, *n)?,
            Token::Div => checked_div(*n, known)?,
            _ => return Err(SolveError::UnsupportedEquation),
        },
        _ => return Err(SolveError::UnsupportedEquation),
    };
    Ok(Answer::Value(value))
}

fn checked_div(a: f64, b: f64) -> Result<f64, SolveError> {
    if b == 0.0 {
        Err(SolveError::DivisionByZero)
    } else {
        Ok(a / b)
    }
}
