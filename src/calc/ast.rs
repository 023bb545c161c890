//! Expression tree for calculations.

use super::value::Value;
use crate::query::span::{Span, Spanned};

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A number, string, `true`/`false`/`null`, or bare word.
    Literal(Value),
    /// `#fieldId`
    Field(String),
    /// `[a, b, c]`
    List(Vec<Spanned<Expr>>),
    /// `NAME(arg, ...)`; the name is kept as written.
    Call {
        name: String,
        name_span: Span,
        args: Vec<Spanned<Expr>>,
    },
}

impl Expr {
    /// Visit this node and every descendant, parents first.
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a Expr)) {
        f(self);
        match self {
            Expr::List(items) | Expr::Call { args: items, .. } => {
                for item in items {
                    item.value.walk(f);
                }
            }
            Expr::Literal(_) | Expr::Field(_) => {}
        }
    }

    /// Every `#field` referenced, in order of appearance.
    pub fn field_refs(&self) -> Vec<&str> {
        let mut refs = Vec::new();
        self.walk(&mut |e| {
            if let Expr::Field(id) = e {
                refs.push(id.as_str());
            }
        });
        refs
    }
}
