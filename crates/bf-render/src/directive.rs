//! Directive mini-language.
//!
//! The leading comment lines of a code block may carry comma-separated
//! directives controlling how the snippet is executed and displayed:
//!
//! ```text
//! // :glot, allow error, line 10, name main.go
//! ```
//!
//! Tokens may be prefixed with `:` to mark them unambiguously as
//! directives. A line that uses the `:` marker but contains a token we do
//! not recognize is a hard error (it was meant as a directive and has a
//! typo); a plain comment line with unrecognized text is just a comment,
//! and directive scanning stops there.

/// Parsed directive flags for one code block.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Directive {
    /// Execute through the sandbox.
    pub execute: bool,
    /// Force showing output, overriding `no output`.
    pub force_output: bool,
    /// Suppress the output panel.
    pub no_output: bool,
    /// Suppress the shareable-snippet link.
    pub no_playground: bool,
    /// An execution error is expected; show what the run produced
    /// instead of failing the build.
    pub allow_error: bool,
    /// Explicit file name for the sandbox (`name foo.go` / `file foo.go`).
    pub file_name: Option<String>,
    /// Explicit run command.
    pub run_cmd: Option<String>,
    /// Limit on output lines shown.
    pub line_limit: Option<usize>,
}

/// Error for a line that was explicitly marked as a directive but does
/// not parse.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("invalid directive line '{0}'")]
pub struct DirectiveError(String);

/// Strip a `//` or `#` comment marker, returning the remainder.
fn strip_comment(line: &str) -> Option<&str> {
    let line = line.trim();
    line.strip_prefix("//").or_else(|| line.strip_prefix('#'))
}

/// Outcome of scanning one line for directives.
enum LineKind {
    /// Directives were parsed into the accumulator.
    Directive,
    /// Not a directive line (code, or an ordinary comment).
    Other,
}

/// Parse one line into `acc`.
///
/// Returns [`LineKind::Other`] for lines that are not directives. A line
/// where any token starts with the explicit `:` marker must parse fully
/// or the whole line is an error.
fn parse_line(acc: &mut Directive, line: &str) -> Result<LineKind, DirectiveError> {
    let Some(rest) = strip_comment(line) else {
        return Ok(LineKind::Other);
    };

    // parse into a scratch copy: a trailing non-directive token means the
    // entire line was an ordinary comment and must not leave flags behind
    let mut parsed = acc.clone();
    for token in rest.split(',') {
        let token = token.trim();
        let marked = token.starts_with(':');
        let token = token.strip_prefix(':').unwrap_or(token);

        if let Some(rest) = token.strip_prefix("name ").or_else(|| token.strip_prefix("file ")) {
            let rest = rest.trim();
            if rest.is_empty() {
                return Err(DirectiveError(line.trim().to_owned()));
            }
            parsed.file_name = Some(rest.to_owned());
        } else if let Some(rest) = token.strip_prefix("line ") {
            let n = rest
                .trim()
                .parse()
                .map_err(|_| DirectiveError(line.trim().to_owned()))?;
            parsed.line_limit = Some(n);
        } else if let Some(rest) = token.strip_prefix("run ") {
            parsed.run_cmd = Some(rest.trim().to_owned());
        } else {
            match token {
                "glot" => parsed.execute = true,
                "output" => parsed.force_output = true,
                "no output" | "nooutput" => parsed.no_output = true,
                "no playground" | "noplayground" => parsed.no_playground = true,
                "allow error" | "allow_error" => parsed.allow_error = true,
                _ if marked => return Err(DirectiveError(line.trim().to_owned())),
                // unrecognized and unmarked: an ordinary comment
                _ => return Ok(LineKind::Other),
            }
        }
    }
    *acc = parsed;
    Ok(LineKind::Directive)
}

impl Directive {
    /// Extract directives from the leading lines of a code block.
    ///
    /// Consumes lines until the first non-directive line and returns the
    /// parsed flags together with the remaining lines.
    pub fn extract<'a>(lines: &'a [String]) -> Result<(Self, &'a [String]), DirectiveError> {
        let mut directive = Self::default();
        let mut rest = lines;
        while let [first, tail @ ..] = rest {
            match parse_line(&mut directive, first)? {
                LineKind::Directive => rest = tail,
                LineKind::Other => break,
            }
        }
        Ok((directive, rest))
    }
}
