//! Small helpers shared by the hand-written argument parsers.

use std::str::FromStr;

/// Split `--name=value` into its parts. Anything else has no inline value.
pub(crate) fn split(token: &str) -> (&str, Option<&str>) {
    if token.starts_with("--") {
        if let Some((name, value)) = token.split_once('=') {
            return (name, Some(value));
        }
    }
    (token, None)
}

/// Value of the flag at `args[*idx]`: either inline, or the next argument
/// (in which case `idx` is advanced past it).
pub(crate) fn value(
    args: &[&str],
    idx: &mut usize,
    name: &str,
    inline: Option<&str>,
) -> Result<String, (i32, String)> {
    if let Some(value) = inline {
        return Ok(value.to_string());
    }
    match args.get(*idx + 1) {
        Some(value) => {
            *idx += 1;
            Ok((*value).to_string())
        }
        None => Err((2, format!("flag needs an argument: {name}"))),
    }
}

/// Boolean flags are present or absent; `--flag=value` is a usage error.
pub(crate) fn switch(name: &str, inline: Option<&str>) -> Result<(), (i32, String)> {
    match inline {
        Some(value) => Err((2, format!("flag {name} takes no value, got {value:?}"))),
        None => Ok(()),
    }
}

pub(crate) fn parse<T: FromStr>(name: &str, raw: &str) -> Result<T, (i32, String)> {
    raw.trim()
        .parse()
        .map_err(|_| (2, format!("invalid value {raw:?} for {name}")))
}

pub(crate) fn run_number(raw: &str) -> Result<u32, (i32, String)> {
    raw.trim()
        .parse()
        .map_err(|_| (2, format!("invalid run number {raw:?}")))
}

pub(crate) fn is_help(token: &str) -> bool {
    matches!(token, "-h" | "--help" | "help")
}
