//! Escape clause rewriting.
//!
//! Translate the portable escape dialect into server native sql:
//!
//! | escape                | native                 |
//! |-----------------------|------------------------|
//! | `{d '2001-10-09'}`    | `DATE '2001-10-09'`    |
//! | `{t '12:00:00'}`      | `TIME '12:00:00'`      |
//! | `{ts '...'}`          | `TIMESTAMP '...'`      |
//! | `{escape '\'}`        | `ESCAPE '\'`           |
//! | `{oj a left join b}`  | `a left join b`        |
//! | `{fn ucase(x)}`       | `upper(x)`             |
//!
//! Escapes are only recognized in plain sql code, never inside string
//! literals or quoted identifiers. Anything the scanner does not
//! understand is copied verbatim.
use crate::{Error, Result};

mod functions;

/// Rewrite escape clauses of `sql`.
///
/// `std_strings` is the server `standard_conforming_strings` setting,
/// when off, a backslash escapes the next character inside a string.
pub fn replace_processing(sql: &str, std_strings: bool) -> Result<String> {
    let scanner = Scanner { sql: sql.as_bytes(), std_strings };
    let mut out = Vec::with_capacity(sql.len());
    let mut i = 0;
    while i < sql.len() {
        i = scanner.parse(i, &mut out, false)?;
        // an unmatched `)` is copied and the scan resumes after it
        if let Some(&c) = scanner.sql.get(i) {
            out.push(c);
            i += 1;
        }
    }
    String::from_utf8(out).map_err(|e| e.utf8_error().into())
}

/// Scanner state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Code,
    /// Inside `'...'`.
    String,
    /// After a backslash inside a string.
    Backslash,
    /// Inside `"..."`.
    Identifier,
    Escape(Marker),
}

/// Escape clause kinds, in match order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Marker {
    Date,
    Time,
    Timestamp,
    Function,
    OuterJoin,
    EscapeChar,
}

impl Marker {
    const ALL: [Marker; 6] = [
        Marker::Date,
        Marker::Time,
        Marker::Timestamp,
        Marker::Function,
        Marker::OuterJoin,
        Marker::EscapeChar,
    ];

    fn keyword(self) -> &'static [u8] {
        match self {
            Marker::Date => b"d",
            Marker::Time => b"t",
            Marker::Timestamp => b"ts",
            Marker::Function => b"fn",
            Marker::OuterJoin => b"oj",
            Marker::EscapeChar => b"escape",
        }
    }

    fn replacement(self) -> &'static [u8] {
        match self {
            Marker::Date => b"DATE ",
            Marker::Time => b"TIME ",
            Marker::Timestamp => b"TIMESTAMP ",
            Marker::EscapeChar => b"ESCAPE ",
            Marker::Function | Marker::OuterJoin => b"",
        }
    }

    /// Returns `true` if `c` may start the escape body.
    fn accepts(self, c: u8) -> bool {
        match self {
            Marker::Date | Marker::Time | Marker::Timestamp | Marker::EscapeChar => c == b'\'',
            Marker::Function => c == b'"' || c.is_ascii_alphabetic(),
            Marker::OuterJoin => c == b'"' || c == b'(' || c.is_ascii_alphabetic(),
        }
    }

    /// Offset of the escape body from `pos`, the byte after `{`.
    fn matched(self, sql: &[u8], pos: usize) -> Option<usize> {
        let keyword = self.keyword();
        let end = pos + keyword.len();
        if !sql.get(pos..end)?.eq_ignore_ascii_case(keyword) {
            return None;
        }
        let body = end + sql.get(end..)?.iter().take_while(|&&c| c == b' ').count();
        let c = *sql.get(body)?;
        self.accepts(c).then_some(body - pos)
    }
}

struct Scanner<'a> {
    sql: &'a [u8],
    std_strings: bool,
}

impl Scanner<'_> {
    /// Copy sql from `i` to `out` until an unmatched `)`, or, with
    /// `stop_on_comma`, a top level `,`. Returns the stop position.
    fn parse(&self, mut i: usize, out: &mut Vec<u8>, stop_on_comma: bool) -> Result<usize> {
        let sql = self.sql;
        let mut state = State::Code;
        let mut nested = 0usize;

        while i < sql.len() {
            let c = sql[i];
            match state {
                State::Code => match c {
                    b'\'' => state = State::String,
                    b'"' => state = State::Identifier,
                    b'(' => nested += 1,
                    b')' if nested == 0 => return Ok(i),
                    b')' => nested -= 1,
                    b',' if stop_on_comma && nested == 0 => return Ok(i),
                    b'{' => {
                        let found = Marker::ALL
                            .into_iter()
                            .find_map(|m| m.matched(sql, i + 1).map(|at| (m, at)));
                        if let Some((marker, at)) = found {
                            out.extend_from_slice(marker.replacement());
                            state = State::Escape(marker);
                            i += 1 + at;
                            continue;
                        }
                    }
                    _ => {}
                },
                State::String => match c {
                    b'\'' => state = State::Code,
                    b'\\' if !self.std_strings => state = State::Backslash,
                    _ => {}
                },
                State::Backslash => state = State::String,
                State::Identifier => {
                    if c == b'"' {
                        state = State::Code;
                    }
                }
                State::Escape(Marker::Function) => {
                    i = self.function(i, out)?;
                    // `i` is at the closing brace, or past the end
                    state = State::Code;
                    i += 1;
                    continue;
                }
                State::Escape(_) => {
                    if c == b'}' {
                        state = State::Code;
                    } else {
                        out.push(c);
                    }
                    i += 1;
                    continue;
                }
            }
            out.push(c);
            i += 1;
        }
        Ok(i)
    }

    /// Rewrite `name(args)` starting at `i`, returns position of the closing brace.
    fn function(&self, mut i: usize, out: &mut Vec<u8>) -> Result<usize> {
        let sql = self.sql;
        let Some(open) = sql[i..].iter().position(|&c| c == b'(').map(|p| p + i) else {
            return Ok(self.copy_to_brace(i, out));
        };
        let name = std::str::from_utf8(&sql[i..open])?.trim();

        let mut args = Vec::with_capacity(3);
        i = open + 1;
        loop {
            let mut arg = Vec::new();
            let start = i;
            i = self.parse(i, &mut arg, true)?;
            if i != start {
                args.push(String::from_utf8(arg).map_err(|e| Error::from(e.utf8_error()))?);
            }
            if sql.get(i) != Some(&b',') {
                break;
            }
            i += 1;
        }

        let mut native = String::new();
        if !functions::rewrite(&mut native, name, &args)? {
            native.push_str(name);
            functions::call(&mut native, "(", ",", ")", &args);
        }
        out.extend_from_slice(native.as_bytes());

        // anything between `)` and `}` is kept
        Ok(self.copy_to_brace(i + 1, out))
    }

    fn copy_to_brace(&self, mut i: usize, out: &mut Vec<u8>) -> usize {
        while let Some(&c) = self.sql.get(i) {
            if c == b'}' {
                break;
            }
            out.push(c);
            i += 1;
        }
        i
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn rewrite(sql: &str) -> String {
        replace_processing(sql, true).unwrap()
    }

    #[test]
    fn temporal_literals() {
        assert_eq!(
            rewrite("select * from x where d={d '2001-10-09'}"),
            "select * from x where d=DATE '2001-10-09'"
        );
        assert_eq!(rewrite("select {t '12:00:00'}"), "select TIME '12:00:00'");
        assert_eq!(
            rewrite("select {TS '2001-10-09 12:00:00'}"),
            "select TIMESTAMP '2001-10-09 12:00:00'"
        );
        assert_eq!(
            rewrite("select * from t where a like '\\_%' {escape '\\'}"),
            "select * from t where a like '\\_%' ESCAPE '\\'"
        );
    }

    #[test]
    fn outer_join_and_functions() {
        assert_eq!(
            rewrite("select * from {oj a left outer join b on a.id = b.id}"),
            "select * from a left outer join b on a.id = b.id"
        );
        assert_eq!(rewrite("select {fn concat(?,?)}"), "select (?||?)");
        assert_eq!(rewrite("select {fn ucase({fn ltrim(name)})} from t"), "select upper(trim(leading from name)) from t");
        assert_eq!(rewrite("select {fn abs(-1)}"), "select abs(-1)");
        assert_eq!(rewrite("select {fn substring(s, (1+1), 2)}"), "select substr(s, (1+1), 2)");
    }

    #[test]
    fn quoted_text_untouched() {
        let sql = "select '{fn concat(?,?)}', \"{d x}\" from t where {fn concat(?,?)} = 'a'";
        assert_eq!(
            rewrite(sql),
            "select '{fn concat(?,?)}', \"{d x}\" from t where (?||?) = 'a'"
        );
    }

    #[test]
    fn backslash_escape_in_strings() {
        // with standard strings off, \' does not end the literal
        let sql = "select 'it\\'s {fn ucase(x)}', {fn ucase(y)}";
        assert_eq!(
            replace_processing(sql, false).unwrap(),
            "select 'it\\'s {fn ucase(x)}', upper(y)"
        );
    }

    #[test]
    fn malformed_falls_through() {
        assert_eq!(rewrite("select a from t where (1 > 0)) order by a"), "select a from t where (1 > 0)) order by a");
        assert_eq!(rewrite("select {x} from t"), "select {x} from t");
        assert_eq!(rewrite("select 'unterminated {fn ucase(x)}"), "select 'unterminated {fn ucase(x)}");
        assert_eq!(rewrite("select {fn now}"), "select now");
        assert!(replace_processing("select {fn ucase(a, b)}", true).is_err());
        assert_eq!(rewrite("select 'ünï' || {fn lcase('Ä')}"), "select 'ünï' || lower('Ä')");
    }
}
