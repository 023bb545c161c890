//! AST node types for the form query language.
//!
//! The parser produces these unresolved nodes; column and form references
//! still carry the text the user typed. Resolution against the schema cache
//! happens in `validation`.

use serde::Serialize;

use super::span::Spanned;

/// A complete statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Select(SelectStmt),
    Insert(InsertStmt),
}

impl Statement {
    pub fn kind(&self) -> StatementKind {
        match self {
            Statement::Select(_) => StatementKind::Select,
            Statement::Insert(_) => StatementKind::Insert,
        }
    }
}

/// The leading verb of a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementKind {
    Select,
    Insert,
}

impl StatementKind {
    pub fn is_mutation(&self) -> bool {
        matches!(self, StatementKind::Insert)
    }
}

/// `SELECT projection FROM [FORM] form [WHERE ...] [ORDER BY ...] [LIMIT n]`
#[derive(Debug, Clone, PartialEq)]
pub struct SelectStmt {
    pub projection: Spanned<Projection>,
    pub form: Spanned<String>,
    pub filter: Option<Predicate>,
    pub order_by: Option<OrderBy>,
    pub limit: Option<Spanned<u64>>,
}

/// `INSERT [INTO] [FORM] form (columns) VALUES (...) | SELECT ...`
#[derive(Debug, Clone, PartialEq)]
pub struct InsertStmt {
    pub form: Spanned<String>,
    pub columns: Vec<Spanned<ColumnRef>>,
    pub source: InsertSource,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InsertSource {
    Values(Vec<Spanned<Literal>>),
    Select(Box<SelectStmt>),
}

/// What a SELECT returns.
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    /// `*`
    Wildcard,
    /// `a, FIELD("b"), "C"`
    Columns(Vec<Spanned<ColumnRef>>),
    /// `COUNT(*)`, `SUM(Amount)`, ...
    Aggregate {
        func: AggregateFunc,
        arg: AggregateArg,
    },
}

impl Projection {
    /// Number of output columns, when known without the schema.
    pub fn width(&self) -> Option<usize> {
        match self {
            Projection::Wildcard => None,
            Projection::Columns(cols) => Some(cols.len()),
            Projection::Aggregate { .. } => Some(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunc {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggregateFunc {
    /// Parse an aggregate function name (case-insensitive).
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "COUNT" => Some(AggregateFunc::Count),
            "SUM" => Some(AggregateFunc::Sum),
            "AVG" => Some(AggregateFunc::Avg),
            "MIN" => Some(AggregateFunc::Min),
            "MAX" => Some(AggregateFunc::Max),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AggregateFunc::Count => "COUNT",
            AggregateFunc::Sum => "SUM",
            AggregateFunc::Avg => "AVG",
            AggregateFunc::Min => "MIN",
            AggregateFunc::Max => "MAX",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AggregateArg {
    Star,
    Column(Spanned<ColumnRef>),
}

/// A column reference as written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnRef {
    /// `FIELD("id")`: must name an existing id.
    Field(String),
    /// A bare word: id or label.
    Bare(String),
    /// A double-quoted name: id or label.
    Quoted(String),
}

impl ColumnRef {
    /// The text inside any wrapper or quotes.
    pub fn text(&self) -> &str {
        match self {
            ColumnRef::Field(s) | ColumnRef::Bare(s) | ColumnRef::Quoted(s) => s,
        }
    }
}

impl std::fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColumnRef::Field(id) => write!(f, "FIELD(\"{}\")", id),
            ColumnRef::Bare(s) => write!(f, "{}", s),
            ColumnRef::Quoted(s) => write!(f, "\"{}\"", s),
        }
    }
}

/// `comparison ((AND | OR) comparison)*`, evaluated left to right.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub first: Comparison,
    pub rest: Vec<(LogicalOp, Comparison)>,
}

impl Predicate {
    pub fn comparisons(&self) -> impl Iterator<Item = &Comparison> {
        std::iter::once(&self.first).chain(self.rest.iter().map(|(_, c)| c))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub column: Spanned<ColumnRef>,
    pub op: CompareOp,
    pub value: Spanned<Literal>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Gt,
    Lt,
    GtEq,
    LtEq,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub column: Spanned<ColumnRef>,
    pub direction: SortDirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// A literal value in a WHERE comparison or VALUES list.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    /// Kept as written so rendering does not lose precision.
    Number(String),
    Bool(bool),
    Null,
    /// An unsubstituted `{{name}}` placeholder.
    Variable(String),
}
