use strata_core::{Query, SqlWriter};

/// SQLite dialect: no `truncate` statement, an unfiltered `delete` empties
/// the table instead (and lets the rowid sequence restart).
pub struct SqliteSqlWriter;

impl SqlWriter for SqliteSqlWriter {
    fn write_truncate(&self, out: &mut String, query: &Query) {
        out.push_str("delete from ");
        self.write_identifier(out, query.target().table());
    }
}
