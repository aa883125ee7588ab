use crate::{Query, Role, Value, separated_by};

/// Builds the parameterized statement text for each operation.
///
/// Identifiers are double-quoted with embedded quotes doubled; parameters
/// are collected positionally in the order conditions were added. Drivers
/// override individual methods where their dialect differs.
pub trait SqlWriter: Send + Sync {
    fn write_identifier(&self, out: &mut String, value: &str) {
        out.push('"');
        let mut position = 0;
        for (i, c) in value.char_indices() {
            if c == '"' {
                out.push_str(&value[position..i]);
                out.push_str(r#""""#);
                position = i + 1;
            }
        }
        out.push_str(&value[position..]);
        out.push('"');
    }

    fn write_placeholder(&self, out: &mut String, _index: usize) {
        out.push('?');
    }

    /// ` where "a" = ? and "b" > ? …` from the filter conditions, ANDed in
    /// insertion order. Writes nothing when there are no filters.
    fn write_filters(&self, out: &mut String, params: &mut Vec<Value>, query: &Query) {
        let mut first = true;
        for condition in query.conditions_by_role(Role::Filter) {
            out.push_str(if first { " where " } else { " and " });
            first = false;
            self.write_identifier(out, condition.column());
            out.push(' ');
            out.push_str(&condition.operator().to_string());
            out.push(' ');
            self.write_placeholder(out, params.len());
            params.push(condition.value().clone());
        }
    }

    fn write_select(&self, out: &mut String, params: &mut Vec<Value>, query: &Query) {
        out.push_str("select * from ");
        self.write_identifier(out, query.target().table());
        self.write_filters(out, params, query);
        if let Some(limit) = query.row_limit() {
            out.push_str(" limit ");
            out.push_str(itoa::Buffer::new().format(limit));
        }
    }

    fn write_insert(&self, out: &mut String, params: &mut Vec<Value>, query: &Query) {
        out.push_str("insert into ");
        self.write_identifier(out, query.target().table());
        out.push_str(" (");
        separated_by(
            out,
            query.conditions_by_role(Role::CreateValue),
            |out, condition| self.write_identifier(out, condition.column()),
            ", ",
        );
        out.push_str(") values (");
        for (i, condition) in query.conditions_by_role(Role::CreateValue).enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            self.write_placeholder(out, params.len());
            params.push(condition.value().clone());
        }
        out.push(')');
    }

    fn write_update(&self, out: &mut String, params: &mut Vec<Value>, query: &Query) {
        out.push_str("update ");
        self.write_identifier(out, query.target().table());
        out.push_str(" set ");
        let mut first = true;
        for condition in query.conditions_by_role(Role::UpdateValue) {
            if !first {
                out.push_str(", ");
            }
            first = false;
            self.write_identifier(out, condition.column());
            out.push_str(" = ");
            self.write_placeholder(out, params.len());
            params.push(condition.value().clone());
        }
        self.write_filters(out, params, query);
    }

    fn write_delete(&self, out: &mut String, params: &mut Vec<Value>, query: &Query) {
        out.push_str("delete from ");
        self.write_identifier(out, query.target().table());
        self.write_filters(out, params, query);
    }

    /// Whole-table truncation; conditions are ignored by contract.
    fn write_truncate(&self, out: &mut String, query: &Query) {
        out.push_str("truncate table ");
        self.write_identifier(out, query.target().table());
    }
}

/// The generic dialect used when a driver has nothing to override.
pub struct AnsiSqlWriter;

impl SqlWriter for AnsiSqlWriter {}
