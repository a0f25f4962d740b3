/// Row condition language
///
/// Conditions are parsed once into an expression tree and evaluated against
/// each row's typed column values. Only literals, column references
/// (`c1..cN`), arithmetic, comparisons, boolean connectives and the
/// conversion functions `len`, `str`, `float` and `int` exist, so no input
/// can execute code.

use super::FilterError;
use regex::Regex;
use std::cmp::Ordering;
use std::fmt;
use std::sync::OnceLock;

/// Lowercase words a condition may contain
pub const SAFE_WORDS: &[&str] = &[
    "c", "chr", "str", "float", "int", "split", "map", "lambda", "and", "or", "len", "not",
    "type", "intronic", "intergenic", "proximal", "distal", "scaffold", "chrX", "chrY", "chrUn",
    "random", "contig", "ctg", "ctgY", "ctgX",
];

/// Tokens used by form submissions that cannot carry operators or quotes
const ESCAPES: &[(&str, &str)] = &[
    ("__lt__", "<"),
    ("__le__", "<="),
    ("__eq__", "=="),
    ("__ne__", "!="),
    ("__gt__", ">"),
    ("__ge__", ">="),
    ("__sq__", "'"),
    ("__dq__", "\""),
];

/// Replace escaped operator and quote tokens
pub fn unescape(text: &str) -> String {
    ESCAPES
        .iter()
        .fold(text.to_string(), |acc, &(token, replacement)| acc.replace(token, replacement))
}

fn word_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new("[a-z]+").expect("static regex"))
}

/// Reject conditions containing words outside [`SAFE_WORDS`]
pub fn check_safe_words(condition: &str) -> Result<(), FilterError> {
    for word in word_pattern().find_iter(condition) {
        if !SAFE_WORDS.contains(&word.as_str()) {
            return Err(FilterError::UnknownWord {
                word: word.as_str().to_string(),
                condition: condition.to_string(),
            });
        }
    }
    Ok(())
}

/// A typed cell or intermediate result
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Num(f64),
    Str(String),
    Bool(bool),
}

impl Value {
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Num(n) => *n != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Bool(b) => *b,
        }
    }

    /// Numeric view; booleans count as 0 and 1
    fn as_number(&self) -> Option<f64> {
        match self {
            Value::Num(n) => Some(*n),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Str(_) => None,
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Value::Num(_) => "float",
            Value::Str(_) => "str",
            Value::Bool(_) => "bool",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Num(n) if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e16 => {
                write!(f, "{:.1}", n)
            }
            Value::Num(n) => write!(f, "{}", n),
            Value::Str(s) => f.write_str(s),
            Value::Bool(true) => f.write_str("True"),
            Value::Bool(false) => f.write_str("False"),
        }
    }
}

/// Per-row evaluation failure; the row is skipped
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{0}")]
pub struct EvalError(String);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Lt,
    Le,
    Eq,
    Ne,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Func {
    Len,
    Str,
    Float,
    Int,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Num(f64),
    Str(String),
    /// Zero-based column index
    Column(usize),
    Neg(Box<Expr>),
    Not(Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    /// `a < b <= c` holds when every adjacent comparison holds
    Compare(Box<Expr>, Vec<(CmpOp, Expr)>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Call(Func, Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(f64),
    Str(String),
    Ident(String),
    Op(&'static str),
    LParen,
    RParen,
}

fn tokenize(text: &str) -> Result<Vec<Token>, String> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
        } else if c.is_ascii_digit() || (c == '.' && chars.get(i + 1).is_some_and(char::is_ascii_digit)) {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                i += 1;
            }
            if i < chars.len() && matches!(chars[i], 'e' | 'E') {
                let mut j = i + 1;
                if j < chars.len() && matches!(chars[j], '+' | '-') {
                    j += 1;
                }
                if j < chars.len() && chars[j].is_ascii_digit() {
                    i = j;
                    while i < chars.len() && chars[i].is_ascii_digit() {
                        i += 1;
                    }
                }
            }
            let literal: String = chars[start..i].iter().collect();
            let value = literal
                .parse::<f64>()
                .map_err(|_| format!("malformed number '{}'", literal))?;
            tokens.push(Token::Num(value));
        } else if c.is_ascii_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            tokens.push(Token::Ident(chars[start..i].iter().collect()));
        } else if c == '\'' || c == '"' {
            let quote = c;
            let mut value = String::new();
            i += 1;
            loop {
                match chars.get(i) {
                    None => return Err("unterminated string literal".to_string()),
                    Some('\\') => {
                        if let Some(next) = chars.get(i + 1) {
                            value.push(*next);
                        }
                        i += 2;
                    }
                    Some(ch) if *ch == quote => {
                        i += 1;
                        break;
                    }
                    Some(ch) => {
                        value.push(*ch);
                        i += 1;
                    }
                }
            }
            tokens.push(Token::Str(value));
        } else {
            let two: String = chars[i..(i + 2).min(chars.len())].iter().collect();
            let op = match two.as_str() {
                "<=" => Some("<="),
                ">=" => Some(">="),
                "==" => Some("=="),
                "!=" => Some("!="),
                _ => None,
            };
            if let Some(op) = op {
                tokens.push(Token::Op(op));
                i += 2;
                continue;
            }
            let token = match c {
                '<' => Token::Op("<"),
                '>' => Token::Op(">"),
                '+' => Token::Op("+"),
                '-' => Token::Op("-"),
                '*' => Token::Op("*"),
                '/' => Token::Op("/"),
                '%' => Token::Op("%"),
                '(' => Token::LParen,
                ')' => Token::RParen,
                other => return Err(format!("unexpected character '{}'", other)),
            };
            tokens.push(token);
            i += 1;
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if matches!(self.peek(), Some(Token::Ident(word)) if word == keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_op(&mut self, ops: &[&'static str]) -> Option<&'static str> {
        match self.peek() {
            Some(Token::Op(op)) if ops.contains(op) => {
                let op = *op;
                self.pos += 1;
                Some(op)
            }
            _ => None,
        }
    }

    fn parse_or(&mut self) -> Result<Expr, String> {
        let mut lhs = self.parse_and()?;
        while self.eat_keyword("or") {
            let rhs = self.parse_and()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, String> {
        let mut lhs = self.parse_not()?;
        while self.eat_keyword("and") {
            let rhs = self.parse_not()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_not(&mut self) -> Result<Expr, String> {
        if self.eat_keyword("not") {
            return Ok(Expr::Not(Box::new(self.parse_not()?)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, String> {
        let first = self.parse_sum()?;
        let mut rest = Vec::new();
        while let Some(op) = self.eat_op(&["<", "<=", "==", "!=", ">", ">="]) {
            let op = match op {
                "<" => CmpOp::Lt,
                "<=" => CmpOp::Le,
                "==" => CmpOp::Eq,
                "!=" => CmpOp::Ne,
                ">" => CmpOp::Gt,
                _ => CmpOp::Ge,
            };
            rest.push((op, self.parse_sum()?));
        }

        if rest.is_empty() {
            Ok(first)
        } else {
            Ok(Expr::Compare(Box::new(first), rest))
        }
    }

    fn parse_sum(&mut self) -> Result<Expr, String> {
        let mut lhs = self.parse_term()?;
        while let Some(op) = self.eat_op(&["+", "-"]) {
            let op = if op == "+" { BinOp::Add } else { BinOp::Sub };
            let rhs = self.parse_term()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_term(&mut self) -> Result<Expr, String> {
        let mut lhs = self.parse_unary()?;
        while let Some(op) = self.eat_op(&["*", "/", "%"]) {
            let op = match op {
                "*" => BinOp::Mul,
                "/" => BinOp::Div,
                _ => BinOp::Mod,
            };
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, String> {
        if self.eat_op(&["-"]).is_some() {
            return Ok(Expr::Neg(Box::new(self.parse_unary()?)));
        }
        if self.eat_op(&["+"]).is_some() {
            return self.parse_unary();
        }
        self.parse_atom()
    }

    fn parse_atom(&mut self) -> Result<Expr, String> {
        match self.advance() {
            Some(Token::Num(n)) => Ok(Expr::Num(n)),
            Some(Token::Str(s)) => Ok(Expr::Str(s)),
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                match self.advance() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err("expected ')'".to_string()),
                }
            }
            Some(Token::Ident(name)) => self.parse_name(name),
            Some(Token::RParen) => Err("unexpected ')'".to_string()),
            Some(Token::Op(op)) => Err(format!("unexpected operator '{}'", op)),
            None => Err("unexpected end of condition".to_string()),
        }
    }

    fn parse_name(&mut self, name: String) -> Result<Expr, String> {
        let func = match name.as_str() {
            "len" => Some(Func::Len),
            "str" => Some(Func::Str),
            "float" => Some(Func::Float),
            "int" => Some(Func::Int),
            _ => None,
        };
        if let Some(func) = func {
            if self.advance() != Some(Token::LParen) {
                return Err(format!("expected '(' after '{}'", name));
            }
            let argument = self.parse_or()?;
            if self.advance() != Some(Token::RParen) {
                return Err(format!("expected ')' closing '{}('", name));
            }
            return Ok(Expr::Call(func, Box::new(argument)));
        }

        if let Some(index) = name.strip_prefix('c').and_then(|d| d.parse::<usize>().ok()) {
            if index == 0 {
                return Err("columns are numbered from c1".to_string());
            }
            return Ok(Expr::Column(index - 1));
        }

        Err(format!("unsupported name '{}'", name))
    }
}

/// Parse condition text into an expression tree
pub fn parse(text: &str) -> Result<Expr, String> {
    let tokens = tokenize(text)?;
    if tokens.is_empty() {
        return Err("empty condition".to_string());
    }

    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_or()?;
    if let Some(token) = parser.peek() {
        return Err(format!("unexpected trailing input at {:?}", token));
    }
    Ok(expr)
}

impl Expr {
    /// Highest zero-based column index referenced, if any
    pub fn max_column(&self) -> Option<usize> {
        match self {
            Expr::Num(_) | Expr::Str(_) => None,
            Expr::Column(index) => Some(*index),
            Expr::Neg(inner) | Expr::Not(inner) | Expr::Call(_, inner) => inner.max_column(),
            Expr::Binary(_, lhs, rhs) | Expr::And(lhs, rhs) | Expr::Or(lhs, rhs) => {
                lhs.max_column().max(rhs.max_column())
            }
            Expr::Compare(first, rest) => rest
                .iter()
                .map(|(_, expr)| expr.max_column())
                .fold(first.max_column(), std::cmp::max),
        }
    }

    pub fn evaluate(&self, row: &[Value]) -> Result<Value, EvalError> {
        match self {
            Expr::Num(n) => Ok(Value::Num(*n)),
            Expr::Str(s) => Ok(Value::Str(s.clone())),
            Expr::Column(index) => row
                .get(*index)
                .cloned()
                .ok_or_else(|| EvalError(format!("no column c{}", index + 1))),
            Expr::Neg(inner) => match inner.evaluate(row)?.as_number() {
                Some(n) => Ok(Value::Num(-n)),
                None => Err(EvalError("bad operand type for unary -: 'str'".to_string())),
            },
            Expr::Not(inner) => Ok(Value::Bool(!inner.evaluate(row)?.is_truthy())),
            Expr::And(lhs, rhs) => {
                let left = lhs.evaluate(row)?;
                if left.is_truthy() {
                    rhs.evaluate(row)
                } else {
                    Ok(left)
                }
            }
            Expr::Or(lhs, rhs) => {
                let left = lhs.evaluate(row)?;
                if left.is_truthy() {
                    Ok(left)
                } else {
                    rhs.evaluate(row)
                }
            }
            Expr::Binary(op, lhs, rhs) => arithmetic(*op, lhs.evaluate(row)?, rhs.evaluate(row)?),
            Expr::Compare(first, rest) => {
                let mut left = first.evaluate(row)?;
                for (op, expr) in rest {
                    let right = expr.evaluate(row)?;
                    if !compare(*op, &left, &right)? {
                        return Ok(Value::Bool(false));
                    }
                    left = right;
                }
                Ok(Value::Bool(true))
            }
            Expr::Call(func, argument) => call(*func, argument.evaluate(row)?),
        }
    }
}

fn arithmetic(op: BinOp, lhs: Value, rhs: Value) -> Result<Value, EvalError> {
    if let (BinOp::Add, Value::Str(a), Value::Str(b)) = (op, &lhs, &rhs) {
        return Ok(Value::Str(format!("{}{}", a, b)));
    }

    let (Some(a), Some(b)) = (lhs.as_number(), rhs.as_number()) else {
        return Err(EvalError(format!(
            "unsupported operand types for {:?}: '{}' and '{}'",
            op,
            lhs.type_name(),
            rhs.type_name()
        )));
    };

    let result = match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div if b == 0.0 => return Err(EvalError("float division by zero".to_string())),
        BinOp::Div => a / b,
        BinOp::Mod if b == 0.0 => return Err(EvalError("float modulo".to_string())),
        // Result takes the sign of the divisor
        BinOp::Mod => a - b * (a / b).floor(),
    };
    Ok(Value::Num(result))
}

fn compare(op: CmpOp, lhs: &Value, rhs: &Value) -> Result<bool, EvalError> {
    let ordering = match (lhs, rhs) {
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        _ => match (lhs.as_number(), rhs.as_number()) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            // Values of different kinds are never equal and cannot be ordered
            _ => {
                return match op {
                    CmpOp::Eq => Ok(false),
                    CmpOp::Ne => Ok(true),
                    _ => Err(EvalError(format!(
                        "cannot order '{}' and '{}'",
                        lhs.type_name(),
                        rhs.type_name()
                    ))),
                }
            }
        },
    };

    // NaN compares unequal to everything
    let Some(ordering) = ordering else {
        return Ok(op == CmpOp::Ne);
    };

    Ok(match op {
        CmpOp::Lt => ordering == Ordering::Less,
        CmpOp::Le => ordering != Ordering::Greater,
        CmpOp::Eq => ordering == Ordering::Equal,
        CmpOp::Ne => ordering != Ordering::Equal,
        CmpOp::Gt => ordering == Ordering::Greater,
        CmpOp::Ge => ordering != Ordering::Less,
    })
}

fn call(func: Func, argument: Value) -> Result<Value, EvalError> {
    match (func, argument) {
        (Func::Len, Value::Str(s)) => Ok(Value::Num(s.chars().count() as f64)),
        (Func::Len, other) => Err(EvalError(format!(
            "object of type '{}' has no len()",
            other.type_name()
        ))),
        (Func::Str, value) => Ok(Value::Str(value.to_string())),
        (Func::Float, Value::Str(s)) => s
            .trim()
            .parse::<f64>()
            .map(Value::Num)
            .map_err(|_| EvalError(format!("could not convert string to float: '{}'", s))),
        (Func::Float, value) => value
            .as_number()
            .map(Value::Num)
            .ok_or_else(|| EvalError("float() argument must be a number".to_string())),
        (Func::Int, Value::Str(s)) => s
            .trim()
            .parse::<i64>()
            .map(|n| Value::Num(n as f64))
            .map_err(|_| EvalError(format!("invalid literal for int(): '{}'", s))),
        (Func::Int, value) => value
            .as_number()
            .filter(|n| n.is_finite())
            .map(|n| Value::Num(n.trunc()))
            .ok_or_else(|| EvalError("cannot convert to integer".to_string())),
    }
}

/// A compiled row predicate
#[derive(Debug, Clone)]
pub struct Condition {
    text: String,
    expr: Expr,
}

impl Condition {
    /// Parse `text` and check its column references against `column_count`
    pub fn compile(text: &str, column_count: usize) -> Result<Self, FilterError> {
        let invalid = |reason: String| FilterError::InvalidCondition {
            condition: text.to_string(),
            reason,
        };

        let expr = parse(text).map_err(invalid)?;
        if let Some(max) = expr.max_column() {
            if max >= column_count {
                return Err(invalid(format!(
                    "column c{} referenced but the input has {} column(s)",
                    max + 1,
                    column_count
                )));
            }
        }

        Ok(Self {
            text: text.to_string(),
            expr,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn matches(&self, row: &[Value]) -> Result<bool, EvalError> {
        Ok(self.expr.evaluate(row)?.is_truthy())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(n: f64) -> Value {
        Value::Num(n)
    }

    fn s(text: &str) -> Value {
        Value::Str(text.to_string())
    }

    fn eval(text: &str, row: &[Value]) -> Result<bool, EvalError> {
        Condition::compile(text, row.len()).unwrap().matches(row)
    }

    #[test]
    fn unescape_replaces_form_tokens() {
        assert_eq!(
            unescape("c1__eq____sq__chr7__sq__ and c2__ge__10"),
            "c1=='chr7' and c2>=10"
        );
    }

    #[test]
    fn safe_words_reject_unknown_identifiers() {
        assert!(check_safe_words("c1=='chr7' and c2 > 3").is_ok());
        match check_safe_words("__import__('os')").unwrap_err() {
            FilterError::UnknownWord { word, .. } => assert_eq!(word, "import"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn arithmetic_and_comparison() {
        let row = [s("chr7"), num(200.0), num(100.0)];
        assert!(eval("(c2-c3) < 115487120 and c1=='chr7'", &row).unwrap());
        assert!(!eval("c2 * 2 <= c3", &row).unwrap());
        assert!(eval("c2 % 3 == 2", &row).unwrap());
        assert!(eval("-c3 < 0", &row).unwrap());
    }

    #[test]
    fn chained_comparisons() {
        let row = [num(5.0)];
        assert!(eval("1 < c1 <= 5", &row).unwrap());
        assert!(!eval("1 < c1 < 5", &row).unwrap());
    }

    #[test]
    fn boolean_connectives_short_circuit() {
        let row = [s("chrX"), num(0.0)];
        // the division is never evaluated
        assert!(eval("c1 == 'chrX' or 1 / c2 > 0", &row).unwrap());
        assert!(!eval("c1 == 'chrY' and 1 / c2 > 0", &row).unwrap());
        assert!(eval("not c1 == 'chrY'", &row).unwrap());
    }

    #[test]
    fn functions_convert_values() {
        let row = [s("chr10"), num(3.0), s("42")];
        assert!(eval("len(c1) == 5", &row).unwrap());
        assert!(eval("str(c2) == '3.0'", &row).unwrap());
        assert!(eval("float(c3) > 41.5", &row).unwrap());
        assert!(eval("int(c2 / 2) == 1", &row).unwrap());
    }

    #[test]
    fn type_errors_fail_evaluation() {
        let row = [s("chr1"), num(1.0)];
        assert!(eval("c1 > c2", &row).is_err());
        assert!(eval("c1 - 1 > 0", &row).is_err());
        assert!(eval("c2 / 0 > 1", &row).is_err());
        // equality across types is simply false
        assert!(!eval("c1 == c2", &row).unwrap());
    }

    #[test]
    fn compile_rejects_malformed_conditions() {
        for text in ["c1 >", "(c1 > 2", "c1 > 2 c2", "c0 > 1", "", "c1 = 2", "split(c1)"] {
            assert!(
                matches!(Condition::compile(text, 2), Err(FilterError::InvalidCondition { .. })),
                "should reject {text:?}"
            );
        }
    }

    #[test]
    fn compile_rejects_out_of_range_columns() {
        let err = Condition::compile("c3 > 1", 2).unwrap_err();
        assert!(err.to_string().contains("c3"));
    }

    #[test]
    fn string_literals_support_both_quotes_and_escapes() {
        let row = [s("it's")];
        assert!(eval(r#"c1 == "it's""#, &row).unwrap());
        assert!(eval(r"c1 == 'it\'s'", &row).unwrap());
    }

    #[test]
    fn numbers_with_exponents() {
        let row = [num(150000.0)];
        assert!(eval("c1 > 1.2e5", &row).unwrap());
        assert!(eval("c1 > .5", &row).unwrap());
    }
}
