//! Table detection and identifier quoting for synthesized sql.
use std::fmt::Write;

/// The single table a query reads from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TableRef {
    /// Name as written in the query, quotes and schema included.
    pub(crate) name: String,
    /// Read with `FROM ONLY`.
    pub(crate) only: bool,
}

impl TableRef {
    /// Name for `UPDATE`, `DELETE` and `SELECT`, `ONLY` preserved.
    pub(crate) fn target(&self) -> String {
        match self.only {
            true => format!("ONLY {}", self.name),
            false => self.name.clone(),
        }
    }
}

/// Keywords ending a `FROM` list.
const CLAUSES: [&str; 11] = [
    "where", "group", "order", "limit", "offset", "having", "window", "for", "union", "fetch", "returning",
];

/// Find the table of `FROM <name>` with a whitespace token scan.
///
/// Returns [`None`] when no table is found or more than one table is read:
/// a comma separated list, a join or a subquery.
pub(crate) fn scan_table(sql: &str) -> Option<TableRef> {
    let mut tokens = sql.split_ascii_whitespace();
    tokens.find(|t| t.eq_ignore_ascii_case("from"))?;

    let mut name = tokens.next()?;
    let only = name.eq_ignore_ascii_case("only");
    if only {
        name = tokens.next()?;
    }
    let name = name.strip_suffix(';').unwrap_or(name);
    if name.is_empty() || name.starts_with('(') || name.contains(',') {
        return None;
    }

    for token in tokens {
        let word = token.trim_end_matches(';');
        if CLAUSES.iter().any(|c| c.eq_ignore_ascii_case(word)) {
            break;
        }
        if token.contains(',') || word.eq_ignore_ascii_case("join") {
            return None;
        }
    }

    Some(TableRef { name: name.to_owned(), only })
}

/// Split `schema.table` into unquoted parts.
///
/// Quoted parts keep their case and dots, `""` is a literal quote,
/// unquoted parts are lowercased.
pub(crate) fn quoteless_table_name(name: &str) -> (Option<String>, String) {
    let mut schema = None;
    let mut acc = String::new();
    let mut quoted = false;
    let mut chars = name.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if quoted && chars.peek() == Some(&'"') => {
                chars.next();
                acc.push('"');
            }
            '"' => quoted = !quoted,
            '.' if !quoted => schema = Some(std::mem::take(&mut acc)),
            c if quoted => acc.push(c),
            c => acc.extend(c.to_lowercase()),
        }
    }

    (schema, acc)
}

/// Returns `true` for identifiers the server reads verbatim.
fn is_plain(ident: &str) -> bool {
    let mut bytes = ident.bytes();
    matches!(bytes.next(), Some(b'a'..=b'z' | b'_'))
        && bytes.all(|b| matches!(b, b'a'..=b'z' | b'0'..=b'9' | b'_' | b'$'))
}

/// Append `ident`, quoted unless it is plain lower case.
pub(crate) fn push_ident(sql: &mut String, ident: &str) {
    if is_plain(ident) {
        sql.push_str(ident);
        return;
    }
    sql.push('"');
    for c in ident.chars() {
        if c == '"' {
            sql.push('"');
        }
        sql.push(c);
    }
    sql.push('"');
}

/// `a = ? <sep> b = ?`
fn push_assignments<'a>(sql: &mut String, names: impl Iterator<Item = &'a str>, sep: &str) {
    for (i, name) in names.enumerate() {
        if i > 0 {
            sql.push_str(sep);
        }
        push_ident(sql, name);
        sql.push_str(" = ?");
    }
}

pub(crate) fn update_sql<'a>(
    table: &TableRef,
    columns: impl Iterator<Item = &'a str>,
    keys: impl Iterator<Item = &'a str>,
) -> String {
    let mut sql = format!("UPDATE {} SET ", table.target());
    push_assignments(&mut sql, columns, ", ");
    sql.push_str(" WHERE ");
    push_assignments(&mut sql, keys, " AND ");
    sql
}

pub(crate) fn delete_sql<'a>(table: &TableRef, keys: impl Iterator<Item = &'a str>) -> String {
    let mut sql = format!("DELETE FROM {} WHERE ", table.target());
    push_assignments(&mut sql, keys, " AND ");
    sql
}

pub(crate) fn insert_sql<'a>(table: &TableRef, columns: impl ExactSizeIterator<Item = &'a str>) -> String {
    let count = columns.len();
    let mut sql = format!("INSERT INTO {} (", table.name);
    for (i, column) in columns.enumerate() {
        if i > 0 {
            sql.push_str(", ");
        }
        push_ident(&mut sql, column);
    }
    sql.push_str(") VALUES (");
    for i in 0..count {
        if i > 0 {
            sql.push_str(", ");
        }
        sql.push('?');
    }
    sql.push(')');
    sql
}

pub(crate) fn select_sql<'a>(
    table: &TableRef,
    columns: impl Iterator<Item = &'a str>,
    keys: impl Iterator<Item = &'a str>,
) -> String {
    let mut sql = String::from("SELECT ");
    for (i, column) in columns.enumerate() {
        if i > 0 {
            sql.push_str(", ");
        }
        push_ident(&mut sql, column);
    }
    let _ = write!(sql, " FROM {} WHERE ", table.target());
    push_assignments(&mut sql, keys, " AND ");
    sql
}

#[cfg(test)]
mod test {
    use super::*;

    fn table(name: &str) -> TableRef {
        TableRef { name: name.into(), only: false }
    }

    #[test]
    fn single_table_scan() {
        assert_eq!(scan_table("select id, name from t"), Some(table("t")));
        assert_eq!(scan_table("SELECT * FROM public.t WHERE a, b"), Some(table("public.t")));
        assert_eq!(scan_table("select * from t;"), Some(table("t")));
        assert_eq!(
            scan_table("select * from only t order by 1"),
            Some(TableRef { name: "t".into(), only: true })
        );
        assert_eq!(scan_table("select * from \"My Table\""), Some(table("\"My")));
    }

    #[test]
    fn multiple_tables_are_rejected() {
        assert_eq!(scan_table("select 1"), None);
        assert_eq!(scan_table("select * from a, b"), None);
        assert_eq!(scan_table("select * from a ,b"), None);
        assert_eq!(scan_table("select * from a,b"), None);
        assert_eq!(scan_table("select * from a join b on a.id = b.id"), None);
        assert_eq!(scan_table("select * from a x JOIN b y on true"), None);
        assert_eq!(scan_table("select * from (select 1) s"), None);
    }

    #[test]
    fn quoteless_names() {
        assert_eq!(quoteless_table_name("Foo"), (None, "foo".into()));
        assert_eq!(quoteless_table_name("S.\"Bar\""), (Some("s".into()), "Bar".into()));
        assert_eq!(quoteless_table_name("\"a.b\".\"c\"\"d\""), (Some("a.b".into()), "c\"d".into()));
    }

    #[test]
    fn synthesized_sql() {
        let t = table("t");
        assert_eq!(update_sql(&t, ["name"].into_iter(), ["id"].into_iter()), "UPDATE t SET name = ? WHERE id = ?");
        assert_eq!(
            update_sql(&t, ["a", "Big"].into_iter(), ["k1", "k2"].into_iter()),
            "UPDATE t SET a = ?, \"Big\" = ? WHERE k1 = ? AND k2 = ?"
        );
        assert_eq!(delete_sql(&TableRef { name: "t".into(), only: true }, ["id"].into_iter()), "DELETE FROM ONLY t WHERE id = ?");
        assert_eq!(insert_sql(&t, ["a", "b"].into_iter()), "INSERT INTO t (a, b) VALUES (?, ?)");
        assert_eq!(
            select_sql(&t, ["id", "name"].into_iter(), ["id"].into_iter()),
            "SELECT id, name FROM t WHERE id = ?"
        );

        let mut sql = String::new();
        push_ident(&mut sql, "a\"b");
        assert_eq!(sql, "\"a\"\"b\"");
    }
}
