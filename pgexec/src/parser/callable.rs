use crate::{Error, Result};

/// Result of [`modify_call`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallInfo {
    /// Server native sql.
    pub sql: String,
    /// Returns `true` if the text was a function or procedure call.
    pub is_function: bool,
    /// Returns `true` for `{? = call ...}`, the return value is bound as
    /// the first parameter.
    pub out_param_before_func: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Looking for `{`.
    Start,
    /// After `{`, looking for `?` or `call`.
    Brace,
    /// After `?`, looking for `=`.
    Assign,
    /// After `?=`, looking for `call`.
    BeforeCall,
    Call,
    /// After `call`, requires whitespace.
    AfterCall,
    Body,
    /// After `}`, only whitespace allowed.
    Trailing,
}

/// Rewrite the call escape `{ [? =] call name(args) }` into a select.
///
/// With `select_from` (servers 8.1 and later) the result is
/// `select * from name([?,]args) as result`, older servers get
/// `select name(args) as result`. Text that does not start with `{` is
/// returned unchanged, a leading native `call` is still reported as a
/// function.
pub fn modify_call(sql: &str, std_strings: bool, select_from: bool) -> Result<CallInfo> {
    let b = sql.as_bytes();
    let len = b.len();

    let mut state = State::Start;
    let mut is_function = false;
    let mut out_param = false;
    let mut in_quotes = false;
    let mut in_escape = false;
    let mut start = 0;
    let mut end = 0;
    let mut i = 0;

    while i < len {
        let c = b[i];
        let ws = c.is_ascii_whitespace();
        match state {
            State::Start => match c {
                b'{' => {
                    i += 1;
                    state = State::Brace;
                }
                _ if ws => i += 1,
                // not an escape, skip the rest
                _ => i = len,
            },
            State::Brace => match c {
                b'?' => {
                    out_param = true;
                    is_function = true;
                    i += 1;
                    state = State::Assign;
                }
                b'c' | b'C' => state = State::Call,
                _ if ws => i += 1,
                _ => return Err(malformed(i)),
            },
            State::Assign => match c {
                b'=' => {
                    i += 1;
                    state = State::BeforeCall;
                }
                _ if ws => i += 1,
                _ => return Err(malformed(i)),
            },
            State::BeforeCall => match c {
                b'c' | b'C' => state = State::Call,
                _ if ws => i += 1,
                _ => return Err(malformed(i)),
            },
            State::Call => {
                if b.get(i..i + 4).is_some_and(|w| w.eq_ignore_ascii_case(b"call")) {
                    is_function = true;
                    i += 4;
                    state = State::AfterCall;
                } else if ws {
                    i += 1;
                } else {
                    return Err(malformed(i));
                }
            }
            State::AfterCall => {
                if !ws {
                    return Err(malformed(i));
                }
                i += 1;
                start = i;
                state = State::Body;
            }
            State::Body => match c {
                b'\'' => {
                    in_quotes = !in_quotes;
                    i += 1;
                }
                b'\\' if in_quotes && !std_strings => i += 2,
                b'{' if !in_quotes => {
                    in_escape = !in_escape;
                    i += 1;
                }
                b'}' if !in_quotes => {
                    if in_escape {
                        in_escape = false;
                    } else {
                        end = i;
                        state = State::Trailing;
                    }
                    i += 1;
                }
                b';' if !in_quotes => return Err(malformed(i)),
                _ => i += 1,
            },
            State::Trailing => {
                if !ws {
                    return Err(malformed(i));
                }
                i += 1;
            }
        }
    }

    match state {
        State::Start => {
            let trimmed = sql.trim_start();
            let native_call = trimmed.len() > 5
                && trimmed.as_bytes()[..4].eq_ignore_ascii_case(b"call")
                && trimmed.as_bytes()[4].is_ascii_whitespace();
            return Ok(CallInfo {
                sql: sql.to_owned(),
                is_function: native_call,
                out_param_before_func: false,
            });
        }
        State::Trailing => {}
        // ran out of text while still parsing
        _ => return Err(malformed(i.min(len))),
    }

    let body = sql[start..end].trim_end();
    let sql = match select_from {
        true => {
            let mut call = String::with_capacity(body.len() + 32);
            call.push_str("select * from ");
            match body.find('(') {
                None => {
                    call.push_str(body);
                    call.push_str(if out_param { "(?)" } else { "()" });
                }
                Some(open) if out_param => {
                    let args = &body[open + 1..];
                    let has_args = args
                        .chars()
                        .take_while(|&c| c != ')')
                        .any(|c| !c.is_whitespace());
                    call.push_str(&body[..=open]);
                    call.push_str(if has_args { "?," } else { "?" });
                    call.push_str(args);
                }
                Some(_) => call.push_str(body),
            }
            call.push_str(" as result");
            call
        }
        false => format!("select {body} as result"),
    };

    Ok(CallInfo { sql, is_function, out_param_before_func: out_param })
}

fn malformed(offset: usize) -> Error {
    Error::parse(format!("Malformed function or procedure escape syntax at offset {offset}."))
}

#[cfg(test)]
mod test {
    use super::*;

    fn call(sql: &str) -> CallInfo {
        modify_call(sql, true, true).unwrap()
    }

    #[test]
    fn function_escape() {
        let info = call("{ ? = call lower(?) }");
        assert_eq!(info.sql, "select * from lower(?,?) as result");
        assert!(info.is_function);
        assert!(info.out_param_before_func);

        assert_eq!(call("{?= call now()}").sql, "select * from now(?) as result");
        assert_eq!(call("{? = call pack_get}").sql, "select * from pack_get(?) as result");
        assert_eq!(call("{call proc(1, '}')}").sql, "select * from proc(1, '}') as result");
        assert_eq!(call(" {CALL p} ").sql, "select * from p() as result");

        let info = modify_call("{ call f(?) }", true, false).unwrap();
        assert_eq!(info.sql, "select f(?) as result");
        assert!(!info.out_param_before_func);
    }

    #[test]
    fn passthrough() {
        let info = call("select 1");
        assert_eq!(info.sql, "select 1");
        assert!(!info.is_function);

        let info = call("  CALL proc(1)");
        assert_eq!(info.sql, "  CALL proc(1)");
        assert!(info.is_function);
    }

    #[test]
    fn malformed_syntax() {
        let err = modify_call("{ select 1 }", true, true).unwrap_err();
        assert!(err.to_string().contains("Malformed function or procedure escape syntax at offset 2."));
        assert!(modify_call("{ ? call f() }", true, true).is_err());
        assert!(modify_call("{ callf() }", true, true).is_err());
        assert!(modify_call("{ call f(); }", true, true).is_err());
        assert!(modify_call("{ call f() } x", true, true).is_err());
        assert!(modify_call("{ call f()", true, true).is_err());
    }
}
