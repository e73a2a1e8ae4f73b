//! Cheap value-type classification along the ordering ladder.

/// Value types in ladder order. The discriminant order is the cross-type
/// ordering used everywhere in the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ValKind {
    /// The empty byte sequence.
    Missing,
    /// JSON `null`.
    Null,
    /// JSON `true` / `false`.
    Bool,
    /// JSON number.
    Number,
    /// JSON string.
    String,
    /// JSON array.
    Array,
    /// JSON object.
    Object,
    /// Bytes that do not begin like any JSON value (e.g. binary).
    Unknown,
}

/// Classify a value by sniffing its first non-whitespace byte.
///
/// This does not validate the full text; operators that need the parsed
/// value go through `serde_json` and treat failures per the comparator's
/// parse-failure rule.
pub fn classify(val: &[u8]) -> ValKind {
    let mut i = 0;
    while i < val.len() && val[i].is_ascii_whitespace() {
        i += 1;
    }
    if i >= val.len() {
        return ValKind::Missing;
    }
    match val[i] {
        b'n' => ValKind::Null,
        b't' | b'f' => ValKind::Bool,
        b'-' | b'0'..=b'9' => ValKind::Number,
        b'"' => ValKind::String,
        b'[' => ValKind::Array,
        b'{' => ValKind::Object,
        _ => ValKind::Unknown,
    }
}

/// Whether the value carries data worth aggregating: anything above NULL on
/// the ladder.
pub fn has_value(val: &[u8]) -> bool {
    classify(val) > ValKind::Null
}

/// TRUE means exactly the JSON literal `true`; every other value, including
/// `null`, numbers, and strings, is non-true.
pub fn is_true(val: &[u8]) -> bool {
    val == b"true"
}

/// Parse a value as an IEEE-754 double, if it is a JSON number.
pub fn parse_f64(val: &[u8]) -> Option<f64> {
    if classify(val) != ValKind::Number {
        return None;
    }
    std::str::from_utf8(val).ok()?.trim().parse::<f64>().ok()
}
