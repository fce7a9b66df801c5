const BOX_COMMANDS: [&str; 2] = [r"\boxed", r"\fbox"];

/// The contents of the box opening at `start`, if its braces balance.
fn box_contents(text: &str, start: usize) -> Option<&str> {
    let rest = &text[start..];
    let open = start + rest.len() - rest.trim_start().len();
    if text.as_bytes().get(open) != Some(&b'{') {
        return None;
    }
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut i = open;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 1,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[open + 1..i]);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Finds the answer inside a free-form response: the contents of the first
/// balanced `\boxed{...}` or `\fbox{...}`, or the whole trimmed text when
/// there is none.
pub fn isolate_answer(text: &str) -> &str {
    let mut starts = BOX_COMMANDS
        .iter()
        .flat_map(|command| {
            text.match_indices(command)
                .map(move |(index, _)| index + command.len())
        })
        .collect::<Vec<_>>();
    starts.sort_unstable();
    starts
        .into_iter()
        .find_map(|start| box_contents(text, start))
        .map(str::trim)
        .unwrap_or_else(|| text.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn first_box_wins() {
        assert_eq!(
            isolate_answer(r"So the answer is \boxed{\frac{1}{2}}, not \boxed{3}."),
            r"\frac{1}{2}"
        );
        assert_eq!(isolate_answer(r"\fbox{x} then \boxed{y}"), "x");
    }

    #[test]
    fn nested_and_escaped_braces() {
        assert_eq!(isolate_answer(r"\boxed{ \sqrt{x^{2}} + \{ }"), r"\sqrt{x^{2}} + \{");
    }

    #[test]
    fn unbalanced_box_falls_through() {
        assert_eq!(isolate_answer(r"\boxed{x \boxed{y}"), "y");
        assert_eq!(isolate_answer(r"  x + 1 "), "x + 1");
        assert_eq!(isolate_answer(r"\boxed x"), r"\boxed x");
    }
}
