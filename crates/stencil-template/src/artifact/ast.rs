/*
 * ast.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Artifact AST types.
//!
//! A compiled artifact is literal text interleaved with `<?tpl ... ?>` code
//! blocks. Control structures may span several blocks, so the parser works on
//! one token stream and produces a single statement tree per artifact.

use crate::value::Value;

/// A parsed artifact, ready to execute.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub body: Vec<Stmt>,
}

/// A statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// Literal text outside code blocks, written as-is.
    Text(String),

    /// `echo a, b;`
    Echo(Vec<Expr>),

    /// An expression evaluated for its effect, usually an assignment.
    Expr(Expr),

    /// `unset($a, $b['k']);`
    Unset(Vec<Expr>),

    /// `if (c) : ... elseif (c) : ... else : ... endif;`
    If(IfStmt),

    /// `while (c) : ... endwhile;`
    While(WhileStmt),

    /// `foreach (e as $k => $v) : ... endforeach;`
    Foreach(ForeachStmt),

    /// `break;`
    Break { line: usize },

    /// `continue;`
    Continue { line: usize },

    /// `include e;`
    Include { target: Expr, line: usize },
}

/// Conditional with `elseif` chain.
#[derive(Debug, Clone, PartialEq)]
pub struct IfStmt {
    /// List of (condition, body) pairs for if/elseif branches.
    pub branches: Vec<(Expr, Vec<Stmt>)>,
    /// Optional else branch.
    pub else_branch: Option<Vec<Stmt>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WhileStmt {
    pub condition: Expr,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForeachStmt {
    /// Collection being iterated.
    pub subject: Expr,
    /// Variable receiving the key, for `as $k => $v`.
    pub key_var: Option<String>,
    /// Variable receiving each element.
    pub value_var: String,
    pub body: Vec<Stmt>,
    pub line: usize,
}

/// An expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),

    /// `$name`
    Var(String),

    /// Double-quoted string with embedded variables: parts are concatenated.
    Interpolated(Vec<Expr>),

    /// `[k => v, v2]` or `array(...)`. Entries without a key are appended.
    Array(Vec<(Option<Expr>, Expr)>),

    /// `$a[i]`; `index` is `None` for the append form `$a[]`.
    Index {
        base: Box<Expr>,
        index: Option<Box<Expr>>,
    },

    /// `$o->name`
    Property { base: Box<Expr>, name: String },

    /// `name(args)`
    Call { name: String, args: Vec<Expr> },

    /// A bare identifier that is not a known keyword.
    Constant(String),

    Unary { op: UnaryOp, operand: Box<Expr> },

    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    /// `c ? a : b`, or `c ?: b` when `then` is `None`.
    Ternary {
        condition: Box<Expr>,
        then: Option<Box<Expr>>,
        otherwise: Box<Expr>,
    },

    /// `a ?? b`
    Coalesce { left: Box<Expr>, right: Box<Expr> },

    /// `target = value`
    Assign { target: Box<Expr>, value: Box<Expr> },
}

impl Expr {
    /// Whether the expression can appear on the left of `=`.
    pub fn is_lvalue(&self) -> bool {
        match self {
            Expr::Var(_) => true,
            Expr::Index { base, .. } | Expr::Property { base, .. } => base.is_lvalue(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
    Plus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Concat,
    Eq,
    NotEq,
    Identical,
    NotIdentical,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Concat => ".",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Identical => "===",
            BinaryOp::NotIdentical => "!==",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }
}
