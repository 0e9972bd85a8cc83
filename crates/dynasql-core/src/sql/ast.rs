//! AST for the SELECT dialect.
//!
//! A [`Statement`] is produced once by the parser and never mutated
//! afterwards; validation and planning consume it by reference.

use std::fmt;

/// A parsed `SELECT` statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    /// Table named in the `FROM` clause.
    pub table: String,
    /// What the caller wants back.
    pub projection: Projection,
    /// `WHERE` predicates, implicitly ANDed, in source order.
    pub predicates: Vec<Predicate>,
    /// `ORDER ASC|DESC`; only meaningful for a Query.
    pub order: Option<SortOrder>,
    /// Overall cap on returned items across all pages.
    pub limit: Option<u32>,
    /// Options from the `WITH (...)` clause.
    pub options: StatementOptions,
}

impl Statement {
    /// Predicates that constrain `attribute`, in source order.
    pub fn predicates_on<'a>(&'a self, attribute: &'a str) -> impl Iterator<Item = &'a Predicate> {
        self.predicates
            .iter()
            .filter(move |p| p.attribute == attribute)
    }
}

/// The `SELECT` list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    /// `SELECT *`
    All,
    /// `SELECT a, b, c`
    Attributes(Vec<String>),
    /// `SELECT COUNT(*)`
    Count,
}

/// Sort direction on the range key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    /// Value of `ScanIndexForward` for this order.
    #[must_use]
    pub fn is_forward(self) -> bool {
        matches!(self, Self::Asc)
    }
}

/// One `attribute <op> operands` condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub attribute: String,
    pub operator: Operator,
    /// Arity depends on `operator`; see [`Operator::arity`].
    pub operands: Vec<Literal>,
    /// Character offset of the attribute name in the source text.
    pub position: usize,
}

/// Predicate operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    BeginsWith,
    Between,
    Contains,
    NotContains,
    In,
    IsNull,
    IsNotNull,
}

/// Number of operands an operator takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    None,
    One,
    Two,
    /// One or more.
    Many,
}

impl Operator {
    #[must_use]
    pub fn arity(self) -> Arity {
        match self {
            Self::IsNull | Self::IsNotNull => Arity::None,
            Self::Between => Arity::Two,
            Self::In => Arity::Many,
            _ => Arity::One,
        }
    }

    /// Operators DynamoDB accepts on a range key in a key condition.
    #[must_use]
    pub fn is_range_key_operator(self) -> bool {
        matches!(
            self,
            Self::Eq | Self::Lt | Self::Le | Self::Gt | Self::Ge | Self::Between | Self::BeginsWith
        )
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::BeginsWith => "BEGINS WITH",
            Self::Between => "BETWEEN",
            Self::Contains => "CONTAINS",
            Self::NotContains => "NOT CONTAINS",
            Self::In => "IN",
            Self::IsNull => "IS NULL",
            Self::IsNotNull => "IS NOT NULL",
        })
    }
}

/// A literal operand.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Literal {
    String(String),
    /// Decimal text exactly as written.
    Number(String),
    /// Raw text of a `DATE "..."` literal; normalised when the request is built.
    Date(String),
    Bool(bool),
}

impl Literal {
    /// Short name of the literal's kind, for error messages.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Number(_) => "number",
            Self::Date(_) => "date",
            Self::Bool(_) => "boolean",
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "{s:?}"),
            Self::Number(n) => f.write_str(n),
            Self::Date(d) => write!(f, "DATE {d:?}"),
            Self::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// Options from the `WITH (...)` clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementOptions {
    /// Cleared by `NoConsistentRead`.
    pub consistent_read: bool,
    /// Cleared by `NoReturnedCapacity`.
    pub return_consumed_capacity: bool,
    /// `PageSize(n)`: items requested per round trip.
    pub page_size: Option<u32>,
    /// `Segments(n)`: parallel scan segments.
    pub segments: Option<u32>,
    /// `Index(name, all_attributes)`.
    pub index: Option<IndexSelection>,
}

impl Default for StatementOptions {
    fn default() -> Self {
        Self {
            consistent_read: true,
            return_consumed_capacity: true,
            page_size: None,
            segments: None,
            index: None,
        }
    }
}

/// A named secondary index and whether to fetch all attributes through it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSelection {
    pub name: String,
    pub all_attributes: bool,
}
