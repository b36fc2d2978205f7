use html_escape::decode_html_entities;

const BLOCK_TAGS: &[&str] = &[
    "br", "p", "li", "div", "ol", "ul", "h1", "h2", "h3", "h4", "h5", "h6", "tr",
];

/// Single-line text: entities decoded, markup dropped, whitespace collapsed.
pub(crate) fn clean_text(raw: &str) -> String {
    collapse_whitespace(&strip_markup(&decode(raw)))
}

pub(crate) fn clean_list<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    items
        .into_iter()
        .map(|item| clean_text(item.as_ref()))
        .filter(|item| !item.is_empty())
        .collect()
}

/// Split a free-form instruction blob into steps.
///
/// Steps are separated by line breaks (including `<br>` / `<p>` markup) and by inline
/// numbering that counts up from 1 (`1. Mix 2. Bake`). Leading `3.`, `4)` and `Step 5:`
/// markers are removed from each step.
pub(crate) fn split_steps(raw: &str) -> Vec<String> {
    let text = strip_markup(&decode(raw));
    let mut steps = Vec::new();
    for line in text.lines() {
        for piece in split_numbered(line) {
            let step = collapse_whitespace(strip_step_marker(piece));
            if !step.is_empty() {
                steps.push(step);
            }
        }
    }
    steps
}

/// Render an ISO-8601 duration (`PT1H30M`, `P0DT45M`) as `1h 30m`.
///
/// Values that are not ISO durations are returned trimmed; empty and all-zero
/// durations yield `None`.
pub(crate) fn format_duration(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let Some(rest) = raw.strip_prefix('P').or_else(|| raw.strip_prefix('p')) else {
        return Some(raw.to_owned());
    };

    let mut hours = 0_u64;
    let mut minutes = 0_u64;
    let mut number = String::new();
    let mut in_time = false;
    for ch in rest.chars() {
        match ch {
            '0'..='9' => number.push(ch),
            '.' | ',' => number.push('.'),
            'T' | 't' => in_time = true,
            unit => {
                let value = number.parse::<f64>().unwrap_or(0.0) as u64;
                number.clear();
                let total = match (unit.to_ascii_uppercase(), in_time) {
                    ('D', false) => value.checked_mul(24).and_then(|h| hours.checked_add(h)),
                    ('H', true) => hours.checked_add(value),
                    ('M', true) => {
                        minutes = minutes.saturating_add(value);
                        Some(hours)
                    }
                    ('S', true) => Some(hours),
                    _ => None,
                };
                let Some(total) = total else {
                    return Some(raw.to_owned());
                };
                hours = total;
            }
        }
    }

    let Some(total) = hours.checked_add(minutes / 60) else {
        return Some(raw.to_owned());
    };
    hours = total;
    minutes %= 60;
    match (hours, minutes) {
        (0, 0) => None,
        (h, 0) => Some(format!("{h}h")),
        (0, m) => Some(format!("{m}m")),
        (h, m) => Some(format!("{h}h {m}m")),
    }
}

pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn decode(raw: &str) -> String {
    // Some sites double-encode (`&amp;amp;`).
    decode_html_entities(&decode_html_entities(raw)).into_owned()
}

/// Drop tags, turning block-level boundaries into line breaks.
fn strip_markup(text: &str) -> String {
    if !text.contains('<') {
        return text.to_owned();
    }

    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    while let Some(rel_lt) = text[cursor..].find('<') {
        let lt = cursor + rel_lt;
        out.push_str(&text[cursor..lt]);

        let Some(rel_gt) = text[lt..].find('>') else {
            out.push_str(&text[lt..]);
            return out;
        };
        let gt = lt + rel_gt;
        let name = text[lt + 1..gt]
            .trim_start_matches('/')
            .split(|c: char| c.is_whitespace() || c == '/')
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();

        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric()) {
            // Not a tag (`a < b > c`); keep the text.
            out.push('<');
            cursor = lt + 1;
            continue;
        }
        if BLOCK_TAGS.contains(&name.as_str()) {
            out.push('\n');
        }
        cursor = gt + 1;
    }
    out.push_str(&text[cursor..]);
    out
}

fn split_numbered(line: &str) -> Vec<&str> {
    let mut cuts = Vec::new();
    let mut expected: Option<u32> = None;
    for (pos, number) in numbered_markers(line) {
        let starts_run = match expected {
            None => number == 1 || pos == 0,
            Some(next) => number == next,
        };
        if starts_run {
            cuts.push(pos);
            expected = number.checked_add(1);
        }
    }
    if cuts.len() < 2 {
        return vec![line];
    }

    let mut pieces = Vec::with_capacity(cuts.len() + 1);
    if cuts[0] > 0 {
        pieces.push(&line[..cuts[0]]);
    }
    for (idx, start) in cuts.iter().enumerate() {
        let end = cuts.get(idx + 1).copied().unwrap_or(line.len());
        pieces.push(&line[*start..end]);
    }
    pieces
}

/// Byte offsets and values of `N.` / `N)` markers at the start of a word.
fn numbered_markers(line: &str) -> Vec<(usize, u32)> {
    let bytes = line.as_bytes();
    let mut markers = Vec::new();
    let mut idx = 0;
    while idx < bytes.len() {
        let at_word_start = idx == 0 || bytes[idx - 1].is_ascii_whitespace();
        if !at_word_start || !bytes[idx].is_ascii_digit() {
            idx += 1;
            continue;
        }

        let start = idx;
        while idx < bytes.len() && bytes[idx].is_ascii_digit() {
            idx += 1;
        }
        let is_marker = matches!(bytes.get(idx), Some(b'.') | Some(b')'))
            && bytes
                .get(idx + 1)
                .is_none_or(|b| b.is_ascii_whitespace());
        if is_marker && let Ok(number) = line[start..idx].parse::<u32>() {
            markers.push((start, number));
        }
    }
    markers
}

fn strip_step_marker(piece: &str) -> &str {
    let mut rest = piece.trim();

    if rest.get(..4).is_some_and(|p| p.eq_ignore_ascii_case("step")) {
        let after = rest[4..].trim_start();
        let digits = after.len() - after.trim_start_matches(|c: char| c.is_ascii_digit()).len();
        if digits > 0 {
            rest = after[digits..].trim_start_matches([':', '.', ')', '-']).trim_start();
            return rest;
        }
    }

    let digits = rest.len() - rest.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits > 0 {
        let after = &rest[digits..];
        if let Some(stripped) = after.strip_prefix('.').or_else(|| after.strip_prefix(')'))
            && (stripped.is_empty() || stripped.starts_with(char::is_whitespace))
        {
            rest = stripped.trim_start();
        }
    }
    rest
}
