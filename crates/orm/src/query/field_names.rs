//! Qualification of bare field names with a table alias

/// Qualify bare field names in `expression` with `alias`.
///
/// Expressions joined by top-level `AND`/`OR` are qualified operand by
/// operand. Anything that already contains a `.` or a `(` outside of quotes is
/// returned as is. Otherwise the expression is read as a comma separated list
/// where each item starts with a field name, which is qualified when it is `*`
/// or one of `fields`.
pub fn add_table_name(alias: &str, fields: &[String], expression: &str) -> String {
    let operands = split_connectives(expression);
    if operands.len() > 1 {
        let mut result = String::new();
        for (connective, operand) in operands {
            if let Some(connective) = connective {
                result.push(' ');
                result.push_str(connective);
                result.push(' ');
            }
            result.push_str(&add_table_name(alias, fields, operand.trim()));
        }
        return result;
    }

    if contains_unquoted(expression, &['.', '(']) {
        return expression.to_string();
    }

    split_unquoted(expression, ',')
        .into_iter()
        .map(|part| {
            let trimmed = part.trim_start();
            let lead = &part[..part.len() - trimmed.len()];
            let (head, rest) = match trimmed.find(' ') {
                Some(index) => trimmed.split_at(index),
                None => (trimmed, ""),
            };
            if head == "*" || fields.iter().any(|f| f == head) {
                format!("{}{}.{}{}", lead, alias, head, rest)
            } else {
                part.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Qualify every expression of a list
pub fn add_table_names<S: AsRef<str>>(alias: &str, fields: &[String], expressions: &[S]) -> Vec<String> {
    expressions
        .iter()
        .map(|e| add_table_name(alias, fields, e.as_ref()))
        .collect()
}

fn contains_unquoted(expression: &str, needles: &[char]) -> bool {
    let mut quote: Option<char> = None;
    for c in expression.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '\'' || c == '"' => quote = Some(c),
            None if needles.contains(&c) => return true,
            None => {}
        }
    }
    false
}

/// Split on `separator` outside of quotes, keeping whitespace around items
fn split_unquoted(expression: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in expression.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '\'' || c == '"' => quote = Some(c),
            None if c == separator => {
                parts.push(&expression[start..i]);
                start = i + c.len_utf8();
            }
            None => {}
        }
    }
    parts.push(&expression[start..]);
    parts
}

/// Split on whole-word `AND`/`OR` outside of quotes. Each operand carries the
/// connective written in front of it.
fn split_connectives(expression: &str) -> Vec<(Option<&'static str>, &str)> {
    let bytes = expression.as_bytes();
    let mut operands = Vec::new();
    let mut quote: Option<u8> = None;
    let mut start = 0;
    let mut pending: Option<&'static str> = None;
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            i += 1;
            continue;
        }
        if c == b'\'' || c == b'"' {
            quote = Some(c);
            i += 1;
            continue;
        }

        let at_word_start = i > 0 && bytes[i - 1].is_ascii_whitespace();
        if at_word_start {
            if let Some((word, len)) = connective_at(&bytes[i..]) {
                let operand = &expression[start..i];
                if !operand.trim().is_empty() {
                    operands.push((pending, operand));
                    pending = Some(word);
                    start = i + len;
                    i = start;
                    continue;
                }
            }
        }
        i += 1;
    }

    operands.push((pending, &expression[start..]));
    operands
}

fn connective_at(rest: &[u8]) -> Option<(&'static str, usize)> {
    for (word, len) in [("AND", 3), ("OR", 2)] {
        if rest.len() > len
            && rest[..len].eq_ignore_ascii_case(word.as_bytes())
            && rest[len].is_ascii_whitespace()
        {
            return Some((word, len));
        }
    }
    None
}
