//! Abstract Syntax Tree for the index query language.
//!
//! A [`FilterExpr`] is a conjunction of field predicates. Its `Display`
//! implementation is the exact string handed to the engine, and
//! [`super::parser::parse_filter`] reads that string back.

use std::fmt;

/// Conjunction of predicates. An empty expression matches every document.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FilterExpr {
    pub predicates: Vec<Predicate>,
}

/// A single `@field:...` term.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Full-text match on any of the alternatives: `@f:lit` or `@f:(a|b)`
    Text { field: String, alternatives: Vec<String> },
    /// Exact categorical match on any of the values: `@f:{a|b}`
    Tag { field: String, values: Vec<String> },
    /// Inclusive numeric range: `@f:[min max]`
    Range { field: String, min: Bound, max: Bound },
}

/// One end of a numeric range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bound {
    NegInfinity,
    PosInfinity,
    Value(f64),
}

impl Bound {
    /// Numeric value of the bound
    pub fn as_f64(&self) -> f64 {
        match self {
            Bound::NegInfinity => f64::NEG_INFINITY,
            Bound::PosInfinity => f64::INFINITY,
            Bound::Value(v) => *v,
        }
    }
}

impl From<u64> for Bound {
    #[allow(clippy::cast_precision_loss)]
    fn from(value: u64) -> Self {
        Bound::Value(value as f64)
    }
}

impl FilterExpr {
    /// Expression that matches every document
    pub fn all() -> Self {
        Self::default()
    }

    /// Appends a predicate
    pub fn and(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    /// Returns true when no predicate constrains the match
    pub fn is_match_all(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Finds the first predicate on `field`
    pub fn predicate(&self, field: &str) -> Option<&Predicate> {
        self.predicates.iter().find(|p| p.field() == field)
    }
}

impl Predicate {
    /// Single-literal text predicate
    pub fn text<F: Into<String>, V: Into<String>>(field: F, value: V) -> Self {
        Predicate::Text {
            field: field.into(),
            alternatives: vec![value.into()],
        }
    }

    /// Single-value tag predicate
    pub fn tag<F: Into<String>, V: Into<String>>(field: F, value: V) -> Self {
        Predicate::Tag {
            field: field.into(),
            values: vec![value.into()],
        }
    }

    /// Numeric range predicate
    pub fn range<F: Into<String>>(field: F, min: Bound, max: Bound) -> Self {
        Predicate::Range {
            field: field.into(),
            min,
            max,
        }
    }

    /// Attribute name the predicate applies to
    pub fn field(&self) -> &str {
        match self {
            Predicate::Text { field, .. }
            | Predicate::Tag { field, .. }
            | Predicate::Range { field, .. } => field,
        }
    }
}

impl fmt::Display for FilterExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.predicates.is_empty() {
            return write!(f, "*");
        }
        for (i, predicate) in self.predicates.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}", predicate)?;
        }
        Ok(())
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Text {
                field,
                alternatives,
            } => {
                if alternatives.len() == 1 {
                    write!(f, "@{}:{}", field, alternatives[0])
                } else {
                    write!(f, "@{}:({})", field, alternatives.join("|"))
                }
            },
            Predicate::Tag { field, values } => write!(f, "@{}:{{{}}}", field, values.join("|")),
            Predicate::Range { field, min, max } => write!(f, "@{}:[{} {}]", field, min, max),
        }
    }
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bound::NegInfinity => write!(f, "-inf"),
            Bound::PosInfinity => write!(f, "+inf"),
            Bound::Value(v) => write!(f, "{}", v),
        }
    }
}
