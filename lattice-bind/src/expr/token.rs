//! Token Types
//!
//! The tokenizer emits tokens in postfix order. These types are the closed
//! set of things that can appear in that stream, together with the fixed
//! operator table (symbol, precedence, associativity, arity).

use serde::Serialize;

/// Marker values of [`Token::arg_count`].
pub const BARE_OPERAND: i32 = -1;
pub const RESOLVED_OPERAND: i32 = 0;
pub const CALLEE: i32 = -2;

/// Operators in the expression grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    // Unary
    Not,
    BitNot,
    UnaryPlus,
    UnaryMinus,

    // Arithmetic
    Mul,
    Div,
    Rem,
    Add,
    Sub,

    // Bitwise
    Shl,
    Shr,
    UShr,
    BitAnd,
    BitXor,
    BitOr,

    // Comparison
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    StrictEq,
    StrictNe,

    // Logical
    And,
    Or,

    /// `?:`, emitted once the matching `:` has been seen.
    Conditional,
}

/// Operator associativity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assoc {
    Left,
    Right,
}

/// Binary and prefix symbols, longest first so a scan can take the first
/// match.
const SYMBOLS: &[(&str, Operator)] = &[
    (">>>", Operator::UShr),
    ("===", Operator::StrictEq),
    ("!==", Operator::StrictNe),
    ("<<", Operator::Shl),
    (">>", Operator::Shr),
    ("<=", Operator::Le),
    (">=", Operator::Ge),
    ("==", Operator::Eq),
    ("!=", Operator::Ne),
    ("&&", Operator::And),
    ("||", Operator::Or),
    ("*", Operator::Mul),
    ("/", Operator::Div),
    ("%", Operator::Rem),
    ("+", Operator::Add),
    ("-", Operator::Sub),
    ("<", Operator::Lt),
    (">", Operator::Gt),
    ("&", Operator::BitAnd),
    ("^", Operator::BitXor),
    ("|", Operator::BitOr),
    ("!", Operator::Not),
    ("~", Operator::BitNot),
];

impl Operator {
    /// Longest operator symbol at the start of `input`.
    pub fn match_symbol(input: &str) -> Option<(Operator, usize)> {
        SYMBOLS
            .iter()
            .find(|(symbol, _)| input.starts_with(symbol))
            .map(|(symbol, op)| (*op, symbol.len()))
    }

    /// The prefix form of a symbol seen in operand position.
    pub fn as_prefix(self) -> Option<Operator> {
        match self {
            Operator::Add | Operator::UnaryPlus => Some(Operator::UnaryPlus),
            Operator::Sub | Operator::UnaryMinus => Some(Operator::UnaryMinus),
            Operator::Not => Some(Operator::Not),
            Operator::BitNot => Some(Operator::BitNot),
            _ => None,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Not => "!",
            Operator::BitNot => "~",
            Operator::UnaryPlus => "u+",
            Operator::UnaryMinus => "u-",
            Operator::Mul => "*",
            Operator::Div => "/",
            Operator::Rem => "%",
            Operator::Add => "+",
            Operator::Sub => "-",
            Operator::Shl => "<<",
            Operator::Shr => ">>",
            Operator::UShr => ">>>",
            Operator::BitAnd => "&",
            Operator::BitXor => "^",
            Operator::BitOr => "|",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::Eq => "==",
            Operator::Ne => "!=",
            Operator::StrictEq => "===",
            Operator::StrictNe => "!==",
            Operator::And => "&&",
            Operator::Or => "||",
            Operator::Conditional => "?:",
        }
    }

    /// Binding strength; higher binds tighter.
    pub fn precedence(self) -> u8 {
        match self {
            Operator::Not | Operator::BitNot | Operator::UnaryPlus | Operator::UnaryMinus => 15,
            Operator::Mul | Operator::Div | Operator::Rem => 13,
            Operator::Add | Operator::Sub => 12,
            Operator::Shl | Operator::Shr | Operator::UShr => 11,
            Operator::Lt | Operator::Le | Operator::Gt | Operator::Ge => 10,
            Operator::Eq | Operator::Ne | Operator::StrictEq | Operator::StrictNe => 9,
            Operator::BitAnd => 8,
            Operator::BitXor => 7,
            Operator::BitOr => 6,
            Operator::And => 5,
            Operator::Or => 4,
            Operator::Conditional => 3,
        }
    }

    pub fn assoc(self) -> Assoc {
        match self.arity() {
            2 => Assoc::Left,
            _ => Assoc::Right,
        }
    }

    pub fn arity(self) -> usize {
        match self {
            Operator::Not | Operator::BitNot | Operator::UnaryPlus | Operator::UnaryMinus => 1,
            Operator::Conditional => 3,
            _ => 2,
        }
    }

    pub fn is_prefix(self) -> bool {
        self.arity() == 1
    }
}

/// Postfix accessors produced when a bracket closes or a `.` is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Accessor {
    /// `callee(args...)`
    Call,
    /// `object[key]`
    Index,
    /// `object.name`
    Member,
    /// `[a, b, ...]`
    ArrayLiteral,
    /// `{k: v, ...}`
    ObjectLiteral,
}

impl Accessor {
    pub fn symbol(self) -> &'static str {
        match self {
            Accessor::Call => "()",
            Accessor::Index => "[]",
            Accessor::Member => ".",
            Accessor::ArrayLiteral => "[..]",
            Accessor::ObjectLiteral => "{}",
        }
    }
}

/// Literal operands.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    Str(String),
    Bool(bool),
    Null,
    Undefined,
}

/// One entry of the postfix token stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Literal(Literal),
    /// A context identifier. `callee` is set when a `(` follows directly.
    Identifier { name: String, callee: bool },
    Operator(Operator),
    /// `args` is the number of operands the accessor folds besides its
    /// target: call arguments, literal elements, or key/value pairs.
    Accessor { kind: Accessor, args: usize },
}

impl Token {
    /// Numeric arity encoding: [`BARE_OPERAND`] for identifiers,
    /// [`CALLEE`] for identifiers in call position, [`RESOLVED_OPERAND`] for
    /// literals, the operand count otherwise.
    pub fn arg_count(&self) -> i32 {
        match self {
            Token::Literal(_) => RESOLVED_OPERAND,
            Token::Identifier { callee: false, .. } => BARE_OPERAND,
            Token::Identifier { callee: true, .. } => CALLEE,
            Token::Operator(op) => op.arity() as i32,
            Token::Accessor { kind: Accessor::Member | Accessor::Index, .. } => 1,
            Token::Accessor { args, .. } => *args as i32,
        }
    }

    /// Compact textual form, handy in logs and tests.
    pub fn text(&self) -> String {
        match self {
            Token::Literal(Literal::Number(n)) => crate::value::format_number(*n),
            Token::Literal(Literal::Str(s)) => format!("'{}'", s),
            Token::Literal(Literal::Bool(b)) => b.to_string(),
            Token::Literal(Literal::Null) => "null".to_string(),
            Token::Literal(Literal::Undefined) => "undefined".to_string(),
            Token::Identifier { name, .. } => name.clone(),
            Token::Operator(op) => op.symbol().to_string(),
            Token::Accessor { kind: kind @ (Accessor::Member | Accessor::Index), .. } => {
                kind.symbol().to_string()
            }
            Token::Accessor { kind, args } => format!("{}{}", kind.symbol(), args),
        }
    }
}
