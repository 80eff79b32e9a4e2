//! Normalization of metric keys, dimension keys, and dimension values.
//!
//! The ingest grammar only accepts a narrow set of characters in keys, so arbitrary names coming from instrumentation
//! are rewritten rather than rejected wherever possible. A key is only considered invalid when nothing meaningful is
//! left of it: empty or whitespace-only input, a leading empty section (such as `.foo`), or input made up entirely of
//! dots.

/// Maximum length, in characters, of a metric key or dimension key.
pub const MAX_KEY_LENGTH: usize = 250;

/// Maximum length, in characters, of a dimension value, both before and after escaping.
pub const MAX_DIMENSION_VALUE_LENGTH: usize = 250;

#[derive(Clone, Copy)]
enum KeyKind {
    Metric,
    Dimension,
}

impl KeyKind {
    fn is_valid_section_start(self, c: char, first_section: bool) -> bool {
        match self {
            // Metric keys may not start with a digit, but later sections can.
            Self::Metric if first_section => c.is_ascii_alphabetic() || c == '_',
            Self::Metric => c.is_ascii_alphanumeric() || c == '_',
            // Dimension keys are lowercased up front, and no section may start with a digit.
            Self::Dimension => c.is_ascii_lowercase() || c == '_',
        }
    }
}

#[inline]
fn is_valid_key_char(c: char) -> bool {
    // Matches `[A-Za-z0-9_\-:]`. Periods are handled separately as section separators.
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | ':')
}

#[inline]
fn is_valid_key_end(c: char) -> bool {
    // Matches `[A-Za-z0-9_]`.
    c.is_ascii_alphanumeric() || c == '_'
}

#[inline]
fn needs_escape(c: char) -> bool {
    matches!(c, ' ' | ',' | '=' | '\\')
}

/// Truncates `s` to at most `max_chars` characters.
pub(crate) fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Normalizes a metric key.
///
/// Returns `None` if the key is invalid and cannot be rewritten into a valid one. The casing of the input is preserved.
///
/// # Examples
///
/// ```
/// use mint_protocol::normalize::normalize_metric_key;
///
/// assert_eq!(normalize_metric_key("some~thing").as_deref(), Some("some_thing"));
/// assert_eq!(normalize_metric_key("a....b").as_deref(), Some("a.b"));
/// assert_eq!(normalize_metric_key(".a."), None);
/// ```
pub fn normalize_metric_key(input: &str) -> Option<String> {
    normalize_key(input, KeyKind::Metric)
}

/// Normalizes a dimension key.
///
/// Works like [`normalize_metric_key`], except that the input is lowercased first and no section of the key may begin
/// with a digit. Returns `None` if the key is invalid.
pub fn normalize_dimension_key(input: &str) -> Option<String> {
    normalize_key(&input.to_ascii_lowercase(), KeyKind::Dimension)
}

fn normalize_key(input: &str, kind: KeyKind) -> Option<String> {
    if input.trim().is_empty() {
        return None;
    }

    let truncated = truncate_chars(input, MAX_KEY_LENGTH);

    let mut sections = truncated.split('.');
    let first_section = sections.next().unwrap_or_default();
    if first_section.is_empty() {
        return None;
    }

    // Consecutive, trailing, or otherwise empty sections after the first one are dropped entirely. We collect up front
    // so that we know which section comes last, since only the very end of the key has its invalid trailing
    // characters stripped.
    let sections = std::iter::once(first_section)
        .chain(sections.filter(|section| !section.is_empty()))
        .collect::<Vec<_>>();
    let last_idx = sections.len() - 1;

    let mut normalized = String::with_capacity(truncated.len());
    for (idx, section) in sections.into_iter().enumerate() {
        if idx > 0 {
            normalized.push('.');
        }

        normalize_key_section(section, kind, idx == 0, idx == last_idx, &mut normalized);
    }

    if normalized.is_empty() {
        None
    } else {
        Some(normalized)
    }
}

fn normalize_key_section(section: &str, kind: KeyKind, first_section: bool, last_section: bool, out: &mut String) {
    // Collapse any leading run of characters that can't start a section into a single underscore.
    let body_start = section
        .char_indices()
        .find(|(_, c)| kind.is_valid_section_start(*c, first_section))
        .map(|(idx, _)| idx)
        .unwrap_or(section.len());
    if body_start > 0 {
        out.push('_');
    }

    let mut body = &section[body_start..];
    if last_section {
        body = body.trim_end_matches(|c: char| !is_valid_key_end(c));
    }

    // Replace each run of remaining invalid characters with a single underscore.
    let mut in_invalid_run = false;
    for c in body.chars() {
        if is_valid_key_char(c) {
            out.push(c);
            in_invalid_run = false;
        } else if !in_invalid_run {
            out.push('_');
            in_invalid_run = true;
        }
    }
}

/// Normalizes a dimension value.
///
/// The value is truncated to [`MAX_DIMENSION_VALUE_LENGTH`] characters, and each run of control characters is replaced
/// with a single underscore. Dimension values are never invalid: an empty input produces an empty output.
///
/// The returned value is not yet escaped: see [`escape_dimension_value`].
pub fn normalize_dimension_value(input: &str) -> String {
    let truncated = truncate_chars(input, MAX_DIMENSION_VALUE_LENGTH);

    let mut normalized = String::with_capacity(truncated.len());
    let mut in_control_run = false;
    for c in truncated.chars() {
        if c.is_control() {
            if !in_control_run {
                normalized.push('_');
                in_control_run = true;
            }
        } else {
            normalized.push(c);
            in_control_run = false;
        }
    }

    normalized
}

/// Escapes a normalized dimension value for the wire.
///
/// Each space, comma, equals sign, and backslash is prefixed with a backslash. The escaped value is capped at
/// [`MAX_DIMENSION_VALUE_LENGTH`] characters: an escape sequence which would not fit entirely is dropped, so the result
/// never ends with a dangling, unescaped backslash.
///
/// # Examples
///
/// ```
/// use mint_protocol::normalize::escape_dimension_value;
///
/// assert_eq!(escape_dimension_value(r"a,,,b c=d\e"), r"a\,\,\,b\ c\=d\\e");
/// ```
pub fn escape_dimension_value(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len() + 8);
    let mut escaped_len = 0;

    for c in input.chars() {
        let width = if needs_escape(c) { 2 } else { 1 };
        if escaped_len + width > MAX_DIMENSION_VALUE_LENGTH {
            break;
        }

        if width == 2 {
            escaped.push('\\');
        }
        escaped.push(c);
        escaped_len += width;
    }

    escaped
}
