//! Quoting rules for values interpolated into definitions and command lines.

/// Characters that never need quoting in a systemd unit value
fn is_systemd_safe(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '@' | '%' | '$' | '+' | '=' | ':' | ',' | '.' | '/' | '-')
}

/// Escape systemd specifiers (`%`), and `$` when the value is part of `ExecStart=`.
fn escape_specifiers(value: &str, exec: bool) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '%' => out.push_str("%%"),
            '$' if exec => out.push_str("$$"),
            _ => out.push(c),
        }
    }
    out
}

fn quote_systemd(value: &str) -> String {
    if !value.is_empty() && value.chars().all(is_systemd_safe) {
        return value.to_string();
    }
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

/// One word of an `ExecStart=` command line.
pub fn systemd_exec_word(word: &str) -> String {
    quote_systemd(&escape_specifiers(word, true))
}

/// One `KEY=value` assignment of an `Environment=` line.
pub fn systemd_env_assignment(key: &str, value: &str) -> String {
    quote_systemd(&escape_specifiers(&format!("{key}={value}"), false))
}

/// Free text such as `Description=`: specifiers escaped and no trailing
/// backslash, which systemd would treat as a line continuation.
pub fn systemd_text(value: &str) -> String {
    escape_specifiers(value.trim_end_matches('\\'), false)
}

/// Quote one argument following the `CommandLineToArgvW` rules.
pub fn windows_arg(arg: &str) -> String {
    if !arg.is_empty() && !arg.contains([' ', '\t', '"']) {
        return arg.to_string();
    }
    let mut out = String::with_capacity(arg.len() + 2);
    out.push('"');
    let mut backslashes = 0usize;
    for c in arg.chars() {
        match c {
            '\\' => backslashes += 1,
            '"' => {
                out.extend(std::iter::repeat_n('\\', backslashes * 2 + 1));
                out.push('"');
                backslashes = 0;
            }
            _ => {
                out.extend(std::iter::repeat_n('\\', backslashes));
                out.push(c);
                backslashes = 0;
            }
        }
    }
    out.extend(std::iter::repeat_n('\\', backslashes * 2));
    out.push('"');
    out
}

/// Join arguments into a single Windows command line.
pub fn windows_command_line<S: AsRef<str>>(argv: &[S]) -> String {
    argv.iter()
        .map(|a| windows_arg(a.as_ref()))
        .collect::<Vec<_>>()
        .join(" ")
}
