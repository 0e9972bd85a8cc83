//! AST for key-condition, filter and projection expressions.

use std::collections::HashSet;
use std::fmt;

/// A condition expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// `left op right`
    Compare {
        left: Operand,
        op: CompareOp,
        right: Operand,
    },
    /// `value BETWEEN low AND high`, inclusive on both ends.
    Between {
        value: Operand,
        low: Operand,
        high: Operand,
    },
    /// `value IN (a, b, ...)`
    In { value: Operand, list: Vec<Operand> },
    Logical {
        op: LogicalOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Not(Box<Expr>),
    Function {
        name: FunctionName,
        args: Vec<Operand>,
    },
}

impl Expr {
    /// Split a chain of `AND`s into its operands, left to right.
    ///
    /// An `OR` or `NOT` node is returned whole.
    #[must_use]
    pub fn conjuncts(&self) -> Vec<&Expr> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(expr) = stack.pop() {
            match expr {
                Expr::Logical {
                    op: LogicalOp::And,
                    left,
                    right,
                } => {
                    stack.push(right);
                    stack.push(left);
                }
                other => out.push(other),
            }
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

/// Functions usable as conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionName {
    AttributeExists,
    AttributeNotExists,
    BeginsWith,
    Contains,
}

impl FunctionName {
    /// Number of arguments the function takes.
    #[must_use]
    pub fn arity(self) -> usize {
        match self {
            Self::AttributeExists | Self::AttributeNotExists => 1,
            Self::BeginsWith | Self::Contains => 2,
        }
    }
}

impl fmt::Display for FunctionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::AttributeExists => "attribute_exists",
            Self::AttributeNotExists => "attribute_not_exists",
            Self::BeginsWith => "begins_with",
            Self::Contains => "contains",
        })
    }
}

/// A value producer: an attribute path or a `:value` placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Path(AttributePath),
    /// Placeholder name without the leading `:`.
    Value(String),
}

/// A dotted document path. Segments are plain names or `#name` placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributePath {
    pub segments: Vec<String>,
}

impl AttributePath {
    #[must_use]
    pub fn top(&self) -> Option<&str> {
        self.segments.first().map(String::as_str)
    }
}

impl fmt::Display for AttributePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

/// Collect `#name` references used by a condition.
#[allow(clippy::implicit_hasher)]
pub fn collect_names(expr: &Expr, names: &mut HashSet<String>) {
    walk_operands(expr, &mut |operand| {
        if let Operand::Path(path) = operand {
            collect_path_names(path, names);
        }
    });
}

/// Collect `:value` references used by a condition, with the `:` prefix.
#[allow(clippy::implicit_hasher)]
pub fn collect_values(expr: &Expr, values: &mut HashSet<String>) {
    walk_operands(expr, &mut |operand| {
        if let Operand::Value(name) = operand {
            values.insert(format!(":{name}"));
        }
    });
}

/// Collect `#name` references used by a projection.
#[allow(clippy::implicit_hasher)]
pub fn collect_projection_names(paths: &[AttributePath], names: &mut HashSet<String>) {
    for path in paths {
        collect_path_names(path, names);
    }
}

fn collect_path_names(path: &AttributePath, names: &mut HashSet<String>) {
    names.extend(path.segments.iter().filter(|s| s.starts_with('#')).cloned());
}

fn walk_operands(expr: &Expr, f: &mut impl FnMut(&Operand)) {
    match expr {
        Expr::Compare { left, right, .. } => {
            f(left);
            f(right);
        }
        Expr::Between { value, low, high } => {
            f(value);
            f(low);
            f(high);
        }
        Expr::In { value, list } => {
            f(value);
            list.iter().for_each(&mut *f);
        }
        Expr::Logical { left, right, .. } => {
            walk_operands(left, f);
            walk_operands(right, f);
        }
        Expr::Not(inner) => walk_operands(inner, f),
        Expr::Function { args, .. } => args.iter().for_each(f),
    }
}
