//! Source normalization ahead of the grammar.
//!
//! Heredocs are the one construct whose body lives outside the line that
//! opens it, which a combinator grammar handles badly. Each heredoc is
//! rewritten into an equivalent double-quoted literal on the opener's line,
//! and its body and terminator lines are blanked so every later line keeps its
//! number. The `__END__` data section and `=begin`/`=end` comments go the same
//! way.

use super::ParseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    DoubleQuoted,
    SingleQuoted,
    /// Code inside `#{...}`, with the count of unclosed `{`
    Interpolation(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Opener {
    /// Byte range of `<<~ID` within the line
    start: usize,
    end: usize,
    id: String,
    squiggly: bool,
    indented_end: bool,
    raw: bool,
}

/// Rewrite heredocs and drop the data section; line numbers are preserved.
pub(super) fn normalize(source: &str) -> Result<String, ParseError> {
    let source = source.strip_prefix('\u{feff}').unwrap_or(source);
    let lines: Vec<&str> = source
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .collect();

    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    let mut stack: Vec<Mode> = Vec::new();
    let mut offset = 0;
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];
        let line_offset = offset;
        offset += line.len() + 1;
        i += 1;

        if stack.is_empty() {
            if line == "__END__" {
                break;
            }
            if line.starts_with("=begin") {
                out.push(String::new());
                while i < lines.len() {
                    let inner = lines[i];
                    offset += inner.len() + 1;
                    i += 1;
                    out.push(String::new());
                    if inner.starts_with("=end") {
                        break;
                    }
                }
                continue;
            }
        }

        let openers = scan_line(line, &mut stack);
        if openers.is_empty() {
            out.push(line.to_string());
            continue;
        }

        let mut literals = Vec::with_capacity(openers.len());
        let mut blanked = 0;
        for opener in &openers {
            let mut body = Vec::new();
            let mut terminated = false;
            while i < lines.len() {
                let candidate = lines[i];
                offset += candidate.len() + 1;
                i += 1;
                let is_end = if opener.indented_end {
                    candidate.trim() == opener.id
                } else {
                    candidate == opener.id
                };
                if is_end {
                    terminated = true;
                    break;
                }
                body.push(candidate);
            }
            if !terminated {
                return Err(ParseError::at(
                    source,
                    line_offset + opener.start,
                    format!("unterminated heredoc, expected `{}`", opener.id),
                ));
            }
            blanked += body.len() + 1;
            literals.push(quote(&body, opener));
        }

        // Splice right to left so earlier ranges stay valid
        let mut rewritten = line.to_string();
        for (opener, literal) in openers.iter().zip(literals).rev() {
            rewritten.replace_range(opener.start..opener.end, &literal);
        }
        out.push(rewritten);
        out.extend(std::iter::repeat_n(String::new(), blanked));
    }

    Ok(out.join("\n"))
}

/// Track string state across the line and collect heredoc openers found in
/// code position.
fn scan_line(line: &str, stack: &mut Vec<Mode>) -> Vec<Opener> {
    let bytes = line.as_bytes();
    let mut openers = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let c = bytes[pos];
        match stack.last().copied() {
            Some(Mode::DoubleQuoted) => match c {
                b'\\' => pos += 1,
                b'"' => {
                    stack.pop();
                }
                b'#' if bytes.get(pos + 1) == Some(&b'{') => {
                    stack.push(Mode::Interpolation(0));
                    pos += 1;
                }
                _ => {}
            },
            Some(Mode::SingleQuoted) => match c {
                b'\\' => pos += 1,
                b'\'' => {
                    stack.pop();
                }
                _ => {}
            },
            code => {
                match c {
                    b'#' if code.is_none() => break,
                    b'"' => stack.push(Mode::DoubleQuoted),
                    b'\'' => stack.push(Mode::SingleQuoted),
                    b'{' => {
                        if let Some(Mode::Interpolation(depth)) = stack.last_mut() {
                            *depth += 1;
                        }
                    }
                    b'}' => match stack.last_mut() {
                        Some(Mode::Interpolation(0)) => {
                            stack.pop();
                        }
                        Some(Mode::Interpolation(depth)) => *depth -= 1,
                        _ => {}
                    },
                    b'<' if bytes.get(pos + 1) == Some(&b'<') => {
                        if let Some(opener) = heredoc_opener(line, pos) {
                            pos = opener.end;
                            openers.push(opener);
                            continue;
                        }
                        pos += 1;
                    }
                    _ => {}
                }
            }
        }
        pos += 1;
    }

    openers
}

/// Recognize `<<~ID`, `<<-ID`, `<<ID`, `<<~'ID'`, `<<~"ID"` starting at `start`.
/// Bare ids must start with an uppercase letter or `_` so `a <<b` stays a shift.
fn heredoc_opener(line: &str, start: usize) -> Option<Opener> {
    let rest = &line[start + 2..];
    let (squiggly, dash, rest) = match rest.as_bytes().first() {
        Some(b'~') => (true, false, &rest[1..]),
        Some(b'-') => (false, true, &rest[1..]),
        _ => (false, false, rest),
    };
    let flag_len = usize::from(squiggly || dash);

    let (id, raw, id_len) = match rest.as_bytes().first() {
        Some(&quote @ (b'\'' | b'"')) => {
            let close = rest[1..].find(quote as char)?;
            let id = &rest[1..=close];
            (id.to_string(), quote == b'\'', close + 2)
        }
        Some(c) if c.is_ascii_uppercase() || *c == b'_' => {
            let len = rest
                .bytes()
                .take_while(|b| b.is_ascii_alphanumeric() || *b == b'_')
                .count();
            (rest[..len].to_string(), false, len)
        }
        _ => return None,
    };
    if id.is_empty() {
        return None;
    }

    Some(Opener {
        start,
        end: start + 2 + flag_len + id_len,
        id,
        squiggly,
        indented_end: squiggly || dash,
        raw,
    })
}

/// Build the double-quoted literal for a heredoc body.
fn quote(body: &[&str], opener: &Opener) -> String {
    let lines: Vec<&str> = if opener.squiggly {
        dedent(body)
    } else {
        body.to_vec()
    };

    let mut content = String::new();
    for line in &lines {
        content.push_str(line);
        content.push('\n');
    }

    let mut literal = String::with_capacity(content.len() + 2);
    literal.push('"');
    let mut chars = content.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' => literal.push_str("\\\""),
            '\n' => literal.push_str("\\n"),
            '\\' | '#' if opener.raw => {
                literal.push('\\');
                literal.push(c);
            }
            '\\' => match chars.next() {
                // Backslash-newline joins lines
                Some('\n') | None => {}
                Some(escaped) => {
                    literal.push('\\');
                    literal.push(escaped);
                }
            },
            c => literal.push(c),
        }
    }
    literal.push('"');
    literal
}

/// Strip the common leading whitespace of non-blank lines.
fn dedent<'a>(body: &[&'a str]) -> Vec<&'a str> {
    let indent = body
        .iter()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start_matches([' ', '\t']).len())
        .min()
        .unwrap_or(0);
    body.iter()
        .map(|line| {
            if line.trim().is_empty() {
                ""
            } else {
                &line[indent..]
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn squiggly_heredoc_becomes_literal() {
        let src = "def caveats\n  <<~EOS\n    Hello \"you\"\n      indented\n  EOS\nend\n";
        let out = normalize(src).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[1], r#"  "Hello \"you\"\n  indented\n""#);
        assert_eq!(lines[2], "");
        assert_eq!(lines[4], "");
        assert_eq!(lines[5], "end");
        assert_eq!(out.lines().count(), src.lines().count());
    }

    #[test]
    fn leading_byte_order_mark_is_dropped() {
        let out = normalize("\u{feff}class Foo < Formula\r\nend\r\n").unwrap();
        assert_eq!(out, "class Foo < Formula\nend\n");
    }

    #[test]
    fn heredoc_as_argument_keeps_rest_of_line() {
        let src = "(buildpath/\"x.c\").write <<~C, mode\n  int x;\nC\nfoo\n";
        let out = normalize(src).unwrap();
        assert_eq!(out.lines().next().unwrap(), r#"(buildpath/"x.c").write "int x;\n", mode"#);
        assert_eq!(out.lines().nth(3).unwrap(), "foo");
    }

    #[test]
    fn raw_heredoc_escapes_interpolation() {
        let src = "x = <<~'EOS'\n  #{not} \\n\nEOS\n";
        let out = normalize(src).unwrap();
        assert_eq!(out.lines().next().unwrap(), r#"x = "\#{not} \\n\n""#);
    }

    #[test]
    fn two_heredocs_on_one_line() {
        let src = "f <<~A, <<~B\n  a\nA\n  b\nB\n";
        let out = normalize(src).unwrap();
        assert_eq!(out.lines().next().unwrap(), r#"f "a\n", "b\n""#);
        assert_eq!(out.split('\n').count(), src.split('\n').count());
    }

    #[test]
    fn shift_and_strings_are_not_heredocs() {
        let src = "args << \"<<EOS\"\nx <<y\n";
        assert_eq!(normalize(src).unwrap(), src);
    }

    #[test]
    fn end_marker_drops_data() {
        let src = "class Foo < Formula\nend\n__END__\ndiff --git a b\n";
        assert_eq!(normalize(src).unwrap(), "class Foo < Formula\nend");
    }

    #[test]
    fn block_comments_are_blanked() {
        let src = "a\n=begin\nanything\n=end\nb";
        assert_eq!(normalize(src).unwrap(), "a\n\n\n\nb");
    }

    #[test]
    fn missing_terminator_is_an_error() {
        let err = normalize("x = <<~EOS\n  text\n").unwrap_err();
        assert_eq!(err.line, 1);
        assert_eq!(err.column, 5);
        assert!(err.message.contains("EOS"));
    }
}
