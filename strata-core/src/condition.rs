use crate::Value;
use std::{
    fmt::{self, Display},
    hash::{DefaultHasher, Hash, Hasher},
};

/// Comparison operator of a filter clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Eq,
    Gt,
    Lt,
}

impl Operator {
    /// Compare two stored-text representations the way the key-value backend
    /// does: equality is exact string equality, ordering is lexicographic on
    /// the stored text even for numeric columns. Observed behavior, kept.
    pub fn compare_stored(&self, stored: &str, target: &str) -> bool {
        match self {
            Operator::Eq => stored == target,
            Operator::Gt => stored > target,
            Operator::Lt => stored < target,
        }
    }
}

impl Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operator::Eq => "=",
            Operator::Gt => ">",
            Operator::Lt => "<",
        })
    }
}

/// What a condition contributes to a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// A `where` clause.
    Filter,
    /// A column value for an insert.
    CreateValue,
    /// A column assignment for an update.
    UpdateValue,
}

impl Role {
    pub(crate) fn label(&self) -> &'static str {
        match self {
            Role::Filter => "filter",
            Role::CreateValue => "create_value",
            Role::UpdateValue => "update_value",
        }
    }
}

/// One immutable clause of a query: a column, an operator and a target value,
/// tagged with the [`Role`] it plays. Create and update values always carry
/// the `=` operator.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    column: String,
    operator: Operator,
    value: Value,
    role: Role,
}

impl Condition {
    pub fn filter(column: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            operator,
            value: value.into(),
            role: Role::Filter,
        }
    }

    pub fn create_value(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            operator: Operator::Eq,
            value: value.into(),
            role: Role::CreateValue,
        }
    }

    pub fn update_value(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            operator: Operator::Eq,
            value: value.into(),
            role: Role::UpdateValue,
        }
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Identity hash over (column, operator, value), for deduplication and
    /// diagnostics only; backend translation never consults it.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.column.hash(&mut hasher);
        self.operator.hash(&mut hasher);
        self.value.to_stored().hash(&mut hasher);
        hasher.finish()
    }
}

impl Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.column, self.operator, self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_and_operators() {
        let filter = Condition::filter("size", Operator::Gt, 5);
        assert_eq!(filter.role(), Role::Filter);
        assert_eq!(filter.operator(), Operator::Gt);
        let create = Condition::create_value("name", "A");
        assert_eq!(create.role(), Role::CreateValue);
        assert_eq!(create.operator(), Operator::Eq);
    }

    #[test]
    fn fingerprint_tracks_content_not_role() {
        let a = Condition::filter("name", Operator::Eq, "A");
        let b = Condition::filter("name", Operator::Eq, "A");
        let c = Condition::filter("name", Operator::Eq, "B");
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
    }

    #[test]
    fn stored_comparison_is_lexicographic() {
        assert!(Operator::Eq.compare_stored("5", "5"));
        assert!(!Operator::Eq.compare_stored("5", "5.0"));
        assert!(Operator::Gt.compare_stored("9", "10"));
        assert!(Operator::Lt.compare_stored("10", "9"));
    }
}
