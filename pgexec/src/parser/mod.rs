//! Client side sql scanning.
//!
//! The server parses and plans; the client only needs enough lexical
//! knowledge to find placeholders, statement boundaries and the leading
//! command keyword, skipping over string literals, quoted identifiers,
//! dollar quotes and comments.
use std::fmt::Write;

mod callable;

pub use callable::{CallInfo, modify_call};

/// Leading command of a native query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommandType {
    #[default]
    Blank,
    Select,
    Insert,
    Update,
    Delete,
    With,
    Move,
    Create,
    Alter,
}

impl CommandType {
    fn from_keyword(word: &[u8]) -> Option<CommandType> {
        const KEYWORDS: [(&[u8], CommandType); 8] = [
            (b"select", CommandType::Select),
            (b"insert", CommandType::Insert),
            (b"update", CommandType::Update),
            (b"delete", CommandType::Delete),
            (b"with", CommandType::With),
            (b"move", CommandType::Move),
            (b"create", CommandType::Create),
            (b"alter", CommandType::Alter),
        ];
        KEYWORDS
            .iter()
            .find(|(kw, _)| kw.eq_ignore_ascii_case(word))
            .map(|(_, ty)| *ty)
    }

    /// Returns `true` for commands that accept a `RETURNING` clause.
    pub fn accepts_returning(&self) -> bool {
        matches!(
            self,
            CommandType::Insert | CommandType::Update | CommandType::Delete | CommandType::With
        )
    }
}

/// One server statement, placeholders already in `$n` form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeQuery {
    sql: String,
    bind_count: usize,
    command: CommandType,
    returning: bool,
}

impl NativeQuery {
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Number of `$n` placeholders.
    pub fn bind_count(&self) -> usize {
        self.bind_count
    }

    pub fn command(&self) -> CommandType {
        self.command
    }

    /// Returns `true` if the statement has a top level `RETURNING` clause.
    pub fn has_returning(&self) -> bool {
        self.returning
    }

    /// Append `RETURNING columns`, or `RETURNING *` when `columns` is empty.
    ///
    /// Returns `false` and leaves the query alone when the command does not
    /// take a returning clause or already has one.
    pub fn add_returning(&mut self, columns: &[&str]) -> bool {
        if self.returning || !self.command.accepts_returning() {
            return false;
        }
        self.sql.push_str("\nRETURNING ");
        match columns {
            [] => self.sql.push('*'),
            [first, rest @ ..] if first.starts_with('*') && rest.is_empty() => self.sql.push('*'),
            columns => self.sql.push_str(&columns.join(", ")),
        }
        self.returning = true;
        true
    }
}

/// Split and translate `sql` into native queries.
///
/// - `?` becomes `$1..$n` when `with_params`, `??` becomes a literal `?`
/// - a top level `;` starts a new query when `split`
///
/// Empty or whitespace only text yields no query.
pub fn parse_sql(sql: &str, std_strings: bool, with_params: bool, split: bool) -> Vec<NativeQuery> {
    let b = sql.as_bytes();
    let mut queries = Vec::new();
    let mut native = String::with_capacity(sql.len() + 10);
    let mut fragment = 0;
    let mut paren = 0i32;
    let mut binds = 0;

    let mut command = CommandType::Blank;
    let mut returning = false;
    let mut prev_command = CommandType::Blank;
    let mut prev_returning = false;
    let mut statements = 0;
    let mut whitespace_only = true;
    let mut keyword_start = None;

    let mut i = 0;
    while i < b.len() {
        let c = b[i];
        let mut keyword_char = false;
        // `;` only separates queries
        whitespace_only &= c == b';' || c.is_ascii_whitespace();
        let keyword_end = i;

        match c {
            b'\'' => i = single_quotes(b, i, std_strings),
            b'"' => i = double_quotes(b, i),
            b'-' => i = line_comment(b, i),
            b'/' => i = block_comment(b, i),
            b'$' => i = dollar_quotes(b, i),
            b')' => paren -= 1,
            b'?' => {
                native.push_str(&sql[fragment..i]);
                if b.get(i + 1) == Some(&b'?') {
                    native.push('?');
                    i += 1;
                } else if with_params {
                    binds += 1;
                    let _ = write!(native, "${binds}");
                } else {
                    native.push('?');
                }
                fragment = i + 1;
            }
            b';' if paren == 0 => {
                if !whitespace_only {
                    statements += 1;
                    native.push_str(&sql[fragment..i]);
                    whitespace_only = true;
                }
                fragment = i + 1;
                if !native.is_empty() {
                    if split {
                        let sql = std::mem::take(&mut native);
                        queries.push(NativeQuery { sql, bind_count: binds, command, returning });
                        binds = 0;
                    } else {
                        native.push(';');
                    }
                }
                prev_command = command;
                prev_returning = returning;
                command = CommandType::Blank;
                returning = false;
            }
            _ => match keyword_start {
                Some(_) => keyword_char = ident_cont(c),
                None => {
                    keyword_char = ident_start(c);
                    if keyword_char {
                        keyword_start = Some(i);
                    }
                }
            },
        }

        if let Some(start) = keyword_start
            && (i + 1 >= b.len() || !keyword_char)
        {
            let end = if keyword_char { i + 1 } else { keyword_end };
            let word = &b[start..end.min(b.len())];
            if command == CommandType::Blank {
                if let Some(ty) = CommandType::from_keyword(word) {
                    command = ty;
                }
            } else if command == CommandType::With && paren == 0 {
                if let Some(ty) = with_command(b, i, word) {
                    command = ty;
                }
            }
            if paren == 0 && c != b')' && word.eq_ignore_ascii_case(b"returning") {
                returning = true;
            }
            keyword_start = None;
        }

        if c == b'(' {
            paren += 1;
        }
        i += 1;
    }

    if fragment < b.len() && !whitespace_only {
        native.push_str(&sql[fragment..]);
    } else if statements > 1 {
        command = CommandType::Blank;
        returning = false;
    } else if statements == 1 {
        command = prev_command;
        returning = prev_returning;
    }

    if native.is_empty() {
        return queries;
    }

    let last = NativeQuery { sql: native, bind_count: binds, command, returning };
    if queries.is_empty() || !whitespace_only {
        queries.push(last);
    }
    queries
}

/// Command of the main statement of a `WITH` query, `None` if `word` is a
/// cte name, as in `with select as (...)`.
fn with_command(b: &[u8], mut i: usize, word: &[u8]) -> Option<CommandType> {
    let command = match CommandType::from_keyword(word)? {
        ty @ (CommandType::Select | CommandType::Insert | CommandType::Update | CommandType::Delete) => ty,
        _ => return None,
    };
    while i < b.len() {
        match b[i] {
            b'-' if b.get(i + 1) == Some(&b'-') => i = line_comment(b, i),
            b'/' if b.get(i + 1) == Some(&b'*') => i = block_comment(b, i),
            c if c.is_ascii_whitespace() => {}
            _ => break,
        }
        i += 1;
    }
    let as_keyword = b.get(i..i + 2).is_some_and(|w| w.eq_ignore_ascii_case(b"as"))
        && b.get(i + 2).is_some_and(|&c| !ident_cont(c));
    (!as_keyword).then_some(command)
}

// ===== Lexical helpers =====
//
// Each helper receives the offset of the opening character and returns
// the offset of the last character of the token, or the text length if
// the token is unterminated.

pub(crate) fn single_quotes(b: &[u8], mut offset: usize, std_strings: bool) -> usize {
    // E'' escape string syntax
    let escaped = offset >= 2
        && matches!(b[offset - 1], b'e' | b'E')
        && terminates_ident(b[offset - 2]);
    let backslash = !std_strings || escaped;

    offset += 1;
    while offset < b.len() {
        match b[offset] {
            b'\\' if backslash => offset += 1,
            b'\'' => return offset,
            _ => {}
        }
        offset += 1;
    }
    b.len()
}

pub(crate) fn double_quotes(b: &[u8], offset: usize) -> usize {
    b[offset + 1..]
        .iter()
        .position(|&c| c == b'"')
        .map_or(b.len(), |p| offset + 1 + p)
}

pub(crate) fn dollar_quotes(b: &[u8], offset: usize) -> usize {
    if offset + 1 >= b.len() || (offset > 0 && ident_cont(b[offset - 1])) {
        return offset;
    }
    let tag_end = match b[offset + 1] {
        b'$' => Some(offset + 1),
        c if dollar_tag_start(c) => {
            let mut end = None;
            for (d, &c) in b.iter().enumerate().skip(offset + 2) {
                if c == b'$' {
                    end = Some(d);
                    break;
                }
                if !dollar_tag_cont(c) {
                    break;
                }
            }
            end
        }
        _ => None,
    };
    let Some(tag_end) = tag_end else {
        return offset;
    };
    let tag = &b[offset..=tag_end];
    (tag_end + 1..b.len())
        .find(|&j| b[j..].starts_with(tag))
        .map_or(b.len(), |j| j + tag.len() - 1)
}

pub(crate) fn line_comment(b: &[u8], mut offset: usize) -> usize {
    if b.get(offset + 1) == Some(&b'-') {
        while offset + 1 < b.len() {
            offset += 1;
            if matches!(b[offset], b'\r' | b'\n') {
                break;
            }
        }
    }
    offset
}

/// Block comments nest.
pub(crate) fn block_comment(b: &[u8], mut offset: usize) -> usize {
    if b.get(offset + 1) != Some(&b'*') {
        return offset;
    }
    let mut level = 1;
    offset += 2;
    while offset < b.len() {
        match (b[offset - 1], b[offset]) {
            (b'*', b'/') => {
                level -= 1;
                offset += 1;
            }
            (b'/', b'*') => {
                level += 1;
                offset += 1;
            }
            _ => {}
        }
        if level == 0 {
            return offset - 1;
        }
        offset += 1;
    }
    b.len()
}

pub(crate) fn is_space(c: u8) -> bool {
    matches!(c, b' ' | b'\t' | b'\n' | b'\r' | b'\x0c')
}

fn is_operator_char(c: u8) -> bool {
    b",()[].;:+-*/%^<>=~!@#&|`?".contains(&c)
}

/// Non ascii bytes are accepted as identifier characters.
pub(crate) fn ident_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_' || c >= 0x80
}

pub(crate) fn ident_cont(c: u8) -> bool {
    ident_start(c) || c.is_ascii_digit() || c == b'$'
}

fn terminates_ident(c: u8) -> bool {
    c == b'"' || is_space(c) || is_operator_char(c)
}

fn dollar_tag_start(c: u8) -> bool {
    c != b'$' && ident_start(c)
}

fn dollar_tag_cont(c: u8) -> bool {
    c != b'$' && ident_cont(c)
}

#[cfg(test)]
mod test {
    use super::*;

    fn one(sql: &str) -> NativeQuery {
        let mut queries = parse_sql(sql, true, true, true);
        assert_eq!(queries.len(), 1, "{queries:?}");
        queries.remove(0)
    }

    #[test]
    fn placeholders() {
        let q = one("select * from t where a = ? and b = ?");
        assert_eq!(q.sql(), "select * from t where a = $1 and b = $2");
        assert_eq!(q.bind_count(), 2);
        assert_eq!(q.command(), CommandType::Select);

        let q = one("select '?', \"?\", $$?$$, $tag$ ? $tag$ -- ?\n, /* ? /* ? */ */ ? from t");
        assert_eq!(q.bind_count(), 1);
        assert!(q.sql().ends_with("*/ $1 from t"));

        let q = one("select a ?? 'k' from t where b = ?");
        assert_eq!(q.sql(), "select a ? 'k' from t where b = $1");

        let q = parse_sql("select ?", true, false, false).remove(0);
        assert_eq!(q.sql(), "select ?");
        assert_eq!(q.bind_count(), 0);
    }

    #[test]
    fn escape_strings() {
        // E'' honours backslash even with standard strings
        let q = one("select E'\\'?' , ?");
        assert_eq!(q.sql(), "select E'\\'?' , $1");
        // without standard strings every literal does
        let q = parse_sql("select '\\'?', ?", false, true, true).remove(0);
        assert_eq!(q.sql(), "select '\\'?', $1");
    }

    #[test]
    fn statement_split() {
        let queries = parse_sql("insert into t values (?); select ?; ", true, true, true);
        assert_eq!(queries.len(), 2);
        assert_eq!(queries[0].sql(), "insert into t values ($1)");
        assert_eq!(queries[0].command(), CommandType::Insert);
        assert_eq!(queries[1].sql(), " select $1");
        assert_eq!(queries[1].bind_count(), 1);

        let queries = parse_sql("create function f() as 'a; b'; select (1;2)", true, true, true);
        assert_eq!(queries.len(), 2);
        assert_eq!(queries[0].command(), CommandType::Create);

        assert!(parse_sql("  ;  ", true, true, true).is_empty());
        assert!(parse_sql("", true, true, true).is_empty());

        let queries = parse_sql("select 1; select 2", true, true, false);
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].sql(), "select 1; select 2");
    }

    #[test]
    fn command_and_returning() {
        assert_eq!(one("  UPDATE t set a = 1").command(), CommandType::Update);
        assert_eq!(one("with x as (select 1) delete from t").command(), CommandType::Delete);
        assert_eq!(one("with select as (select 1) select * from select").command(), CommandType::Select);
        assert_eq!(one("move next in c").command(), CommandType::Move);

        let q = one("insert into t(a) values (1) returning id");
        assert!(q.has_returning());
        let q = one("insert into t(a) select returning from (select 1 as returning) x");
        assert!(q.has_returning());
        let q = one("insert into t(a) values ((select 1 returning))");
        assert!(!q.has_returning());
    }

    #[test]
    fn generated_keys_returning() {
        let mut q = one("insert into t(a) values (?)");
        assert!(q.add_returning(&["id", "created"]));
        assert_eq!(q.sql(), "insert into t(a) values ($1)\nRETURNING id, created");
        assert!(!q.add_returning(&[]));

        let mut q = one("delete from t");
        assert!(q.add_returning(&[]));
        assert_eq!(q.sql(), "delete from t\nRETURNING *");

        let mut q = one("select 1");
        assert!(!q.add_returning(&[]));
    }

    #[test]
    fn lexical_helpers() {
        assert_eq!(dollar_quotes(b"$1", 0), 0);
        assert_eq!(dollar_quotes(b"a$b$", 1), 1);
        assert_eq!(dollar_quotes(b"$a$x$a$", 0), 6);
        assert_eq!(dollar_quotes(b"$a$x", 0), 4);
        assert_eq!(block_comment(b"/* a */x", 0), 6);
        assert_eq!(block_comment(b"/* /* */ x", 0), 10);
        assert_eq!(line_comment(b"-- a\nb", 0), 4);
        assert_eq!(line_comment(b"-1", 0), 0);
        assert_eq!(single_quotes(b"'abc", 0, true), 4);
        assert_eq!(double_quotes(b"\"a\"b", 0), 2);
    }
}
