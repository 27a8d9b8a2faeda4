//! Escaped scalar functions, `{fn name(args)}`.
//!
//! Known names are translated to the server equivalent, unknown names are
//! emitted as a plain call so functions the server already has (`abs`,
//! `sin`, ...) keep working.
use std::fmt::Write;

use crate::{Error, Result};

/// Append the translation of `name(args)`.
///
/// Returns `false` if `name` is not a known escaped function, nothing is
/// appended in that case.
pub(crate) fn rewrite(out: &mut String, name: &str, args: &[String]) -> Result<bool> {
    let lower = name.to_ascii_lowercase();
    let name = lower.as_str();
    match name {
        // numeric
        "ceiling" => single(out, "ceil(", name, args)?,
        "log" => single(out, "ln(", name, args)?,
        "log10" => single(out, "log(", name, args)?,
        "power" => two(out, "pow(", name, args)?,
        "truncate" => two(out, "trunc(", name, args)?,

        // string
        "char" => single(out, "chr(", name, args)?,
        "concat" => call(out, "(", "||", ")", args),
        "insert" => {
            arity(name, args, &[4], "takes four and only four argument")?;
            let _ = write!(
                out,
                "overlay({} placing {} from {} for {})",
                args[0], args[3], args[1], args[2]
            );
        }
        "lcase" => single(out, "lower(", name, args)?,
        "left" => {
            arity(name, args, &[2], "takes two and only two arguments")?;
            call(out, "substring(", " for ", ")", args);
        }
        "length" => {
            arity(name, args, &[1], "takes one and only one argument")?;
            call(out, "length(trim(trailing from ", "", "))", args);
        }
        "locate" => match args {
            [needle, haystack] => {
                let _ = write!(out, "position({needle} in {haystack})");
            }
            [needle, haystack, start] => {
                let pos = format!("position({needle} in substring({haystack} from {start}))");
                let _ = write!(out, "({start}*sign({pos})+{pos})");
            }
            _ => arity(name, args, &[2, 3], "takes two or three arguments")?,
        },
        "ltrim" => single(out, "trim(leading from ", name, args)?,
        "right" => {
            arity(name, args, &[2], "takes two and only two arguments")?;
            let _ = write!(
                out,
                "substring({0} from (length({0})+1-{1}))",
                args[0], args[1]
            );
        }
        "rtrim" => single(out, "trim(trailing from ", name, args)?,
        "space" => single(out, "repeat(' ',", name, args)?,
        "substring" => {
            arity(name, args, &[2, 3], "takes two or three arguments")?;
            call(out, "substr(", ",", ")", args);
        }
        "ucase" => single(out, "upper(", name, args)?,

        // date time
        "curdate" => zero(out, "current_date", name, args)?,
        "curtime" => zero(out, "current_time", name, args)?,
        "dayname" => {
            arity(name, args, &[1], "takes one and only one argument")?;
            call(out, "to_char(", ",", ",'Day')", args);
        }
        "dayofmonth" => single(out, "extract(day from ", name, args)?,
        "dayofweek" => {
            arity(name, args, &[1], "takes one and only one argument")?;
            call(out, "extract(dow from ", ",", ")+1", args);
        }
        "dayofyear" => single(out, "extract(doy from ", name, args)?,
        "hour" => single(out, "extract(hour from ", name, args)?,
        "minute" => single(out, "extract(minute from ", name, args)?,
        "month" => single(out, "extract(month from ", name, args)?,
        "monthname" => {
            arity(name, args, &[1], "takes one and only one argument")?;
            call(out, "to_char(", ",", ",'Month')", args);
        }
        "quarter" => single(out, "extract(quarter from ", name, args)?,
        "second" => single(out, "extract(second from ", name, args)?,
        "week" => single(out, "extract(week from ", name, args)?,
        "year" => single(out, "extract(year from ", name, args)?,
        "timestampadd" => {
            arity(name, args, &[3], "takes three and only three arguments")?;
            out.push('(');
            interval(out, &args[0], &args[1])?;
            let _ = write!(out, "+{})", args[2]);
        }
        "timestampdiff" => {
            arity(name, args, &[3], "takes three and only three arguments")?;
            let part = date_part(&args[0])?;
            let _ = write!(out, "extract( {part} from ({}-{}))", args[2], args[1]);
        }

        // system
        "database" => zero(out, "current_database()", name, args)?,
        "ifnull" => two(out, "coalesce(", name, args)?,
        "user" => zero(out, "user", name, args)?,

        _ => return Ok(false),
    }
    Ok(true)
}

/// Append `begin arg0 sep arg1 ... end`.
pub(crate) fn call(out: &mut String, begin: &str, sep: &str, end: &str, args: &[String]) {
    out.push_str(begin);
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            out.push_str(sep);
        }
        out.push_str(arg);
    }
    out.push_str(end);
}

fn arity(name: &str, args: &[String], accepted: &[usize], message: &str) -> Result<()> {
    match accepted.contains(&args.len()) {
        true => Ok(()),
        false => Err(Error::parse(format!("{name} function {message}."))),
    }
}

fn zero(out: &mut String, expr: &str, name: &str, args: &[String]) -> Result<()> {
    if !args.is_empty() {
        return Err(Error::parse(format!("{name} function doesn't take any argument.")));
    }
    out.push_str(expr);
    Ok(())
}

fn single(out: &mut String, begin: &str, name: &str, args: &[String]) -> Result<()> {
    arity(name, args, &[1], "takes one and only one argument")?;
    call(out, begin, "", ")", args);
    Ok(())
}

fn two(out: &mut String, begin: &str, name: &str, args: &[String]) -> Result<()> {
    arity(name, args, &[2], "takes two and only two arguments")?;
    call(out, begin, ",", ")", args);
    Ok(())
}

/// Interval constant without its `SQL_TSI_` prefix.
fn tsi(constant: &str) -> Result<&str> {
    const ROOT: &str = "SQL_TSI_";
    let constant = constant.trim();
    match constant.get(..ROOT.len()) {
        Some(root) if root.eq_ignore_ascii_case(ROOT) && constant.len() > ROOT.len() => {
            Ok(&constant[ROOT.len()..])
        }
        _ => Err(not_implemented(constant)),
    }
}

fn not_implemented(constant: &str) -> Error {
    Error::parse(format!("Interval {} not yet implemented", constant.trim()))
}

fn interval(out: &mut String, constant: &str, value: &str) -> Result<()> {
    const UNITS: [&str; 7] = ["day", "second", "hour", "minute", "month", "week", "year"];

    let unit = tsi(constant)?;
    if let Some(unit) = UNITS.iter().find(|u| u.eq_ignore_ascii_case(unit)) {
        let _ = write!(out, "CAST({value}||' {unit}' as interval)");
        return Ok(());
    }
    if unit.eq_ignore_ascii_case("quarter") {
        let _ = write!(out, "CAST(({value}::int * 3) || ' month' as interval)");
        return Ok(());
    }
    Err(not_implemented(constant))
}

fn date_part(constant: &str) -> Result<&'static str> {
    const PARTS: [&str; 4] = ["day", "second", "hour", "minute"];

    let unit = tsi(constant)?;
    PARTS
        .iter()
        .find(|p| p.eq_ignore_ascii_case(unit))
        .copied()
        .ok_or_else(|| not_implemented(constant))
}

#[cfg(test)]
mod test {
    use super::*;

    fn apply(name: &str, args: &[&str]) -> Result<Option<String>> {
        let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        let mut out = String::new();
        Ok(rewrite(&mut out, name, &args)?.then_some(out))
    }

    #[test]
    fn string_functions() {
        assert_eq!(apply("concat", &["a", "b", "c"]).unwrap().unwrap(), "(a||b||c)");
        assert_eq!(apply("UCASE", &["x"]).unwrap().unwrap(), "upper(x)");
        assert_eq!(
            apply("insert", &["s", "2", "3", "'x'"]).unwrap().unwrap(),
            "overlay(s placing 'x' from 2 for 3)"
        );
        assert_eq!(apply("left", &["s", "2"]).unwrap().unwrap(), "substring(s for 2)");
        assert_eq!(
            apply("right", &["s", "2"]).unwrap().unwrap(),
            "substring(s from (length(s)+1-2))"
        );
        assert_eq!(apply("locate", &["'a'", "s"]).unwrap().unwrap(), "position('a' in s)");
        assert_eq!(
            apply("locate", &["'a'", "s", "3"]).unwrap().unwrap(),
            "(3*sign(position('a' in substring(s from 3)))+position('a' in substring(s from 3)))"
        );
        assert_eq!(apply("space", &["4"]).unwrap().unwrap(), "repeat(' ',4)");
    }

    #[test]
    fn date_functions() {
        assert_eq!(apply("curdate", &[]).unwrap().unwrap(), "current_date");
        assert_eq!(apply("dayofweek", &["d"]).unwrap().unwrap(), "extract(dow from d)+1");
        assert_eq!(
            apply("timestampadd", &["SQL_TSI_DAY", "3", "ts"]).unwrap().unwrap(),
            "(CAST(3||' day' as interval)+ts)"
        );
        assert_eq!(
            apply("timestampadd", &["sql_tsi_quarter", "1", "ts"]).unwrap().unwrap(),
            "(CAST((1::int * 3) || ' month' as interval)+ts)"
        );
        assert_eq!(
            apply("timestampdiff", &["SQL_TSI_HOUR", "a", "b"]).unwrap().unwrap(),
            "extract( hour from (b-a))"
        );
        assert!(apply("timestampdiff", &["SQL_TSI_MONTH", "a", "b"]).is_err());
        assert!(apply("timestampadd", &["DAY", "1", "ts"]).is_err());
    }

    #[test]
    fn arity_and_unknown() {
        let err = apply("ucase", &["a", "b"]).unwrap_err();
        assert!(err.to_string().contains("ucase function takes one and only one argument."));
        assert!(apply("curdate", &["x"]).is_err());
        assert_eq!(apply("abs", &["x"]).unwrap(), None);
        assert_eq!(apply("ifnull", &["a", "b"]).unwrap().unwrap(), "coalesce(a,b)");
    }
}
