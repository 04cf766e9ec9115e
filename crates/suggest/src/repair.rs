//! Forgiving rewrites for almost-JSON.
//!
//! While streaming, the model sometimes drops quotes: `{category: מילה,
//! words: [א, ב]}`. Two rewrites bring such text back to strict JSON:
//!
//! 1. [`quote_bare_keys`] wraps bare tokens that are followed by `:`.
//! 2. [`quote_bare_values`] wraps every other bare token, except JSON
//!    literals (`true`, `false`, `null`, numbers).
//!
//! String literals are copied through untouched. Neither rewrite validates
//! anything; the caller re-parses and drops whatever still fails.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Keys,
    Values,
}

/// Apply both rewrites, keys first.
pub fn repair(text: &str) -> String {
    quote_bare_values(&quote_bare_keys(text))
}

/// Wrap bare object keys in quotes.
pub fn quote_bare_keys(text: &str) -> String {
    rewrite(text, Target::Keys)
}

/// Wrap bare scalar values (object values and array elements) in quotes.
pub fn quote_bare_values(text: &str) -> String {
    rewrite(text, Target::Values)
}

fn is_structural(c: char) -> bool {
    matches!(c, '{' | '}' | '[' | ']' | ':' | ',')
}

fn is_literal(token: &str) -> bool {
    match token {
        "true" | "false" | "null" => true,
        _ => {
            token.starts_with(|c: char| c.is_ascii_digit() || c == '-')
                && token.parse::<f64>().is_ok()
        }
    }
}

fn rewrite(text: &str, target: Target) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len() + 16);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c == '"' {
            let start = i;
            i += 1;
            while i < chars.len() {
                match chars[i] {
                    '\\' => i += 2,
                    '"' => {
                        i += 1;
                        break;
                    }
                    _ => i += 1,
                }
            }
            let end = i.min(chars.len());
            out.extend(&chars[start..end]);
            i = end;
            continue;
        }

        if is_structural(c) || c.is_whitespace() {
            out.push(c);
            i += 1;
            continue;
        }

        // A bare token runs until the next structural character or quote;
        // inner spaces belong to it ("בית ספר").
        let start = i;
        while i < chars.len() && !is_structural(chars[i]) && chars[i] != '"' {
            i += 1;
        }
        let token: String = chars[start..i].iter().collect();
        let trimmed = token.trim_end();
        let trailing = &token[trimmed.len()..];

        let is_key = chars[i..].iter().find(|c| !c.is_whitespace()) == Some(&':');
        let quote = match target {
            Target::Keys => is_key,
            Target::Values => !is_key && !is_literal(trimmed),
        };

        if quote {
            out.push_str(&serde_json::Value::String(trimmed.to_string()).to_string());
        } else {
            out.push_str(trimmed);
        }
        out.push_str(trailing);
    }

    out
}
