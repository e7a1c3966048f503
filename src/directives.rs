//! Shorthand directive expansion for test code.
//!
//! Test code may contain `@`-prefixed directives: `@unroll` cross-product
//! expansion, `@nonfinite` invalid-argument enumeration, and a family of
//! `@assert` shorthands. This module rewrites them into the final
//! executable statements through an ordered chain of regex rules; the order
//! is part of the contract because later rules assume earlier ones already
//! resolved.

use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::error::GenError;

fn static_regex(cell: &'static OnceLock<Regex>, pattern: &'static str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("static regex pattern"))
}

macro_rules! regex {
    ($pattern:literal) => {{
        static RE: OnceLock<Regex> = OnceLock::new();
        static_regex(&RE, $pattern)
    }};
}

/// Escape backslashes and double quotes so a string can be embedded inside
/// a double-quoted literal. Also exposed to templates as the
/// `double_quote_escape` filter.
pub fn double_quote_escape(string: &str) -> String {
    string.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Escape an expression for use as a failure-message string. Subscripts
/// like `[foo]` are rewritten so the identifier's runtime value shows up
/// in the message.
fn escape_js(string: &str) -> String {
    let escaped = double_quote_escape(string);
    regex!(r"\[(\w+)\]").replace_all(&escaped, r#"[\""+(${1})+"\"]"#).into_owned()
}

/// Remove newlines escaped with a trailing backslash. A line ending in `\`
/// joins the next line as-is; a line ending in `\-` also swallows the next
/// line's leading whitespace.
fn remove_extra_newlines(text: &str) -> String {
    let text = regex!(r"\\-\n\s*").replace_all(text, "");
    regex!(r"\\\n").replace_all(&text, "").into_owned()
}

/// Unroll a statement containing `<a | b | ...>` groups into one line per
/// combination.
///
/// The cross-product iterates in declaration order with the first group
/// varying slowest. A `// value` comment is emitted before each run of
/// lines sharing the first group's value.
///
/// ```text
/// f = {<a | b>: <1 | 2>};
/// ```
/// expands to:
/// ```text
/// // a
/// f = {a: 1};
/// f = {a: 2};
/// // b
/// f = {b: 1};
/// f = {b: 2};
/// ```
fn unroll(statement: &str) -> String {
    // Replace each <...> group with a placeholder key so option text cannot
    // be re-matched as a group.
    let group_re = regex!(r"<([^>]+)>");
    let mut text = statement.to_string();
    let mut patterns: Vec<(String, Vec<String>)> = Vec::new();
    while let Some(m) = group_re.find(&text) {
        let key = format!("@unroll_pattern_{}", patterns.len());
        let options: Vec<String> = text[m.start() + 1..m.end() - 1]
            .split('|')
            .map(|option| option.trim().to_string())
            .collect();
        text = format!("{}{}{}", &text[..m.start()], key, &text[m.end()..]);
        patterns.push((key, options));
    }
    if patterns.is_empty() {
        return text;
    }

    let mut lines = Vec::new();
    let mut indices = vec![0usize; patterns.len()];
    let mut current_top = usize::MAX;
    'combinations: loop {
        if indices[0] != current_top {
            current_top = indices[0];
            lines.push(format!("// {}", patterns[0].1[current_top]));
        }
        let mut line = text.clone();
        for ((key, options), &index) in patterns.iter().zip(&indices) {
            line = line.replace(key.as_str(), &options[index]);
        }
        lines.push(line);

        // Odometer increment, last group fastest.
        let mut depth = patterns.len();
        loop {
            if depth == 0 {
                break 'combinations;
            }
            depth -= 1;
            indices[depth] += 1;
            if indices[depth] < patterns[depth].1.len() {
                break;
            }
            indices[depth] = 0;
        }
    }
    lines.join("\n")
}

/// Expand a `@nonfinite f(<valid invalid...>, ...)tail` call into one call
/// per interesting invalid-argument combination.
///
/// Each `<...>` group lists the valid value first, then the invalid values
/// for that position. The expansion emits, in order:
/// - for each position, one call per invalid value with all other positions
///   valid;
/// - for every combination of two or more positions, one call using each
///   position's first invalid value only (keeping the enumeration from
///   exploding combinatorially).
///
/// The all-valid baseline call is never emitted.
fn expand_nonfinite(method: &str, argstr: &str, tail: &str) -> Result<String, GenError> {
    let arg_re = regex!(r"^<(.*)>$");
    let mut args: Vec<Vec<&str>> = Vec::new();
    for arg in argstr.split(", ") {
        let caps = arg_re.captures(arg).ok_or_else(|| {
            GenError::definition(format!(
                "expected nonfinite argument to match format \"<...>\", but was: {arg}"
            ))
        })?;
        let values = caps.get(1).map_or("", |m| m.as_str());
        args.push(values.split(' ').collect());
    }

    let valid: Vec<&str> = args.iter().map(|values| values[0]).collect();
    let mut calls: Vec<Vec<&str>> = Vec::new();

    // Single-position substitutions, every invalid value.
    for (position, values) in args.iter().enumerate() {
        for &invalid in &values[1..] {
            let mut call = valid.clone();
            call[position] = invalid;
            calls.push(call);
        }
    }

    // Multi-position combinations, first invalid value per position.
    fn combine<'a>(
        args: &[Vec<&'a str>],
        call: &[&'a str],
        start: usize,
        depth: usize,
        calls: &mut Vec<Vec<&'a str>>,
    ) {
        for position in start..args.len() {
            if args[position].len() > 1 {
                let mut next = call.to_vec();
                next[position] = args[position][1];
                if depth > 0 {
                    calls.push(next.clone());
                }
                combine(args, &next, position + 1, depth + 1, calls);
            }
        }
    }
    combine(&args, &valid, 0, 0, &mut calls);

    Ok(calls
        .iter()
        .map(|call| format!("{method}({}){tail}", call.join(", ")))
        .collect::<Vec<_>>()
        .join("\n"))
}

fn try_replace_all(
    re: &Regex,
    text: &str,
    mut replacement: impl FnMut(&Captures) -> Result<String, GenError>,
) -> Result<String, GenError> {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for caps in re.captures_iter(text) {
        let m = caps.get(0).expect("regex group 0 always participates");
        out.push_str(&text[last..m.start()]);
        out.push_str(&replacement(&caps)?);
        last = m.end();
    }
    out.push_str(&text[last..]);
    Ok(out)
}

/// Expand all `@` directives in a block of test code.
///
/// Rewrites are applied in a fixed order: legacy marker removal, escaped
/// newline cleanup, `@unroll`, `@nonfinite`, then the `@assert` shorthands.
/// The output must contain no remaining directive marker; a leftover `@`
/// indicates a bug in the rewrite chain and raises
/// [`GenError::UnexpandedDirective`].
pub fn expand_code(code: &str) -> Result<String, GenError> {
    let code = code.replace(" @moz-todo", "");
    let code = code.replace("@moz-UniversalBrowserRead;", "");
    let code = remove_extra_newlines(&code);

    let code = regex!(r"@unroll ([^;]*;)")
        .replace_all(&code, |caps: &Captures| unroll(&caps[1]))
        .into_owned();

    // Must come before the `@assert throws` rules: nonfinite tails often
    // contain statements those rules would otherwise match.
    let code = try_replace_all(regex!(r"@nonfinite ([^(]+)\(([^)]+)\)(.*)"), &code, |caps| {
        expand_nonfinite(&caps[1], &caps[2], &caps[3])
    })?;

    let code = regex!(r"@assert pixel (\d+,\d+) == (\d+,\d+,\d+,\d+);")
        .replace_all(&code, "_assertPixel(canvas, ${1}, ${2});")
        .into_owned();

    let code = regex!(r"@assert pixel (\d+,\d+) ==~ (\d+,\d+,\d+,\d+);")
        .replace_all(&code, "_assertPixelApprox(canvas, ${1}, ${2}, 2);")
        .into_owned();

    let code = regex!(r"@assert pixel (\d+,\d+) ==~ (\d+,\d+,\d+,\d+) \+/- (\d+);")
        .replace_all(&code, "_assertPixelApprox(canvas, ${1}, ${2}, ${3});")
        .into_owned();

    let code = regex!(r"(?ms)@assert throws (\S+_ERR) (.*?);$")
        .replace_all(&code, "assert_throws_dom(\"${1}\", function() { ${2}; });")
        .into_owned();

    let code = regex!(r"(?ms)@assert throws (\S+Error) (.*?);$")
        .replace_all(&code, "assert_throws_js(${1}, function() { ${2}; });")
        .into_owned();

    let code = regex!(r"@assert (.*) === (.*);")
        .replace_all(&code, |caps: &Captures| {
            format!(
                "_assertSame({}, {}, \"{}\", \"{}\");",
                &caps[1],
                &caps[2],
                escape_js(&caps[1]),
                escape_js(&caps[2])
            )
        })
        .into_owned();

    let code = regex!(r"@assert (.*) !== (.*);")
        .replace_all(&code, |caps: &Captures| {
            format!(
                "_assertDifferent({}, {}, \"{}\", \"{}\");",
                &caps[1],
                &caps[2],
                escape_js(&caps[1]),
                escape_js(&caps[2])
            )
        })
        .into_owned();

    let code = regex!(r"@assert (.*) =~ (.*);")
        .replace_all(&code, "assert_regexp_match(${1}, ${2});")
        .into_owned();

    let code = regex!(r"@assert (.*);")
        .replace_all(&code, |caps: &Captures| {
            format!("_assert({}, \"{}\");", &caps[1], escape_js(&caps[1]))
        })
        .into_owned();

    if let Some(position) = code.find('@') {
        let snippet: String = code[position..].chars().take(40).collect();
        return Err(GenError::UnexpandedDirective(snippet));
    }

    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unroll_two_groups_in_order() {
        let expanded = expand_code("@unroll f(<a|b>, <1|2>);").unwrap();
        assert_eq!(
            expanded,
            "// a\nf(a, 1);\nf(a, 2);\n// b\nf(b, 1);\nf(b, 2);"
        );
    }

    #[test]
    fn unroll_three_groups_comments_top_level_only() {
        let expanded = unroll("g(<a|b>, <1|2>, <x|y>);");
        assert_eq!(
            expanded,
            "// a\n\
             g(a, 1, x);\ng(a, 1, y);\ng(a, 2, x);\ng(a, 2, y);\n\
             // b\n\
             g(b, 1, x);\ng(b, 1, y);\ng(b, 2, x);\ng(b, 2, y);"
        );
    }

    #[test]
    fn unroll_trims_option_whitespace() {
        let expanded = unroll("f = {<a | b>: <1 | 2 | 3>};");
        assert_eq!(
            expanded,
            "// a\nf = {a: 1};\nf = {a: 2};\nf = {a: 3};\n\
             // b\nf = {b: 1};\nf = {b: 2};\nf = {b: 3};"
        );
    }

    #[test]
    fn nonfinite_two_args() {
        let expanded = expand_nonfinite("f", "<0 a>, <0 b>", ";").unwrap();
        assert_eq!(expanded, "f(a, 0);\nf(0, b);\nf(a, b);");
    }

    #[test]
    fn nonfinite_three_args_matches_documented_order() {
        let expanded = expand_nonfinite("f", "<0 a>, <0 b c>, <0 d>", ";").unwrap();
        assert_eq!(
            expanded,
            "f(a, 0, 0);\n\
             f(0, b, 0);\n\
             f(0, c, 0);\n\
             f(0, 0, d);\n\
             f(a, b, 0);\n\
             f(a, b, d);\n\
             f(a, 0, d);\n\
             f(0, b, d);"
        );
    }

    #[test]
    fn nonfinite_rejects_malformed_group() {
        let err = expand_nonfinite("f", "<0 a>, 0 b", ";").unwrap_err();
        assert!(matches!(err, GenError::Definition(_)));
    }

    #[test]
    fn nonfinite_through_expand_code() {
        let expanded = expand_code("@nonfinite f(<0 Infinity>, <0 NaN>);").unwrap();
        assert_eq!(
            expanded,
            "f(Infinity, 0);\nf(0, NaN);\nf(Infinity, NaN);"
        );
    }

    #[test]
    fn pixel_assertions() {
        assert_eq!(
            expand_code("@assert pixel 50,25 == 0,255,0,255;").unwrap(),
            "_assertPixel(canvas, 50,25, 0,255,0,255);"
        );
        assert_eq!(
            expand_code("@assert pixel 50,25 ==~ 0,255,0,255;").unwrap(),
            "_assertPixelApprox(canvas, 50,25, 0,255,0,255, 2);"
        );
        assert_eq!(
            expand_code("@assert pixel 50,25 ==~ 0,255,0,255 +/- 5;").unwrap(),
            "_assertPixelApprox(canvas, 50,25, 0,255,0,255, 5);"
        );
    }

    #[test]
    fn throws_assertions() {
        assert_eq!(
            expand_code("@assert throws INDEX_SIZE_ERR ctx.arc(0, 0, -1, 0, 0);").unwrap(),
            "assert_throws_dom(\"INDEX_SIZE_ERR\", function() { ctx.arc(0, 0, -1, 0, 0); });"
        );
        assert_eq!(
            expand_code("@assert throws TypeError ctx.fill(null);").unwrap(),
            "assert_throws_js(TypeError, function() { ctx.fill(null); });"
        );
    }

    #[test]
    fn identity_assertions_carry_escaped_source() {
        assert_eq!(
            expand_code("@assert ctx.lineWidth === 1;").unwrap(),
            "_assertSame(ctx.lineWidth, 1, \"ctx.lineWidth\", \"1\");"
        );
        assert_eq!(
            expand_code("@assert a !== b;").unwrap(),
            "_assertDifferent(a, b, \"a\", \"b\");"
        );
    }

    #[test]
    fn escape_rewrites_subscripts_and_quotes() {
        assert_eq!(
            expand_code("@assert data[i] === \"x\";").unwrap(),
            "_assertSame(data[i], \"x\", \"data[\\\"\"+(i)+\"\\\"]\", \"\\\"x\\\"\");"
        );
    }

    #[test]
    fn regexp_and_truthy_assertions() {
        assert_eq!(
            expand_code("@assert ctx.font =~ /10px/;").unwrap(),
            "assert_regexp_match(ctx.font, /10px/);"
        );
        assert_eq!(
            expand_code("@assert ctx.save();").unwrap(),
            "_assert(ctx.save(), \"ctx.save()\");"
        );
    }

    #[test]
    fn strips_legacy_markers_and_continuations() {
        assert_eq!(expand_code("ctx.fill(); @moz-todo").unwrap(), "ctx.fill();");
        assert_eq!(expand_code("ctx.\\\nfill();").unwrap(), "ctx.fill();");
        assert_eq!(expand_code("ctx.\\-\n    fill();").unwrap(), "ctx.fill();");
    }

    #[test]
    fn expansion_is_idempotent_on_its_output() {
        let once = expand_code("@unroll f(<a|b>);\n@assert 1 === 1;").unwrap();
        let twice = expand_code(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn leftover_marker_is_an_internal_error() {
        let err = expand_code("ctx.fill(); @bogus-directive").unwrap_err();
        assert!(matches!(err, GenError::UnexpandedDirective(_)));
    }
}
