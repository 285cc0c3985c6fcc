//! Small formatting helpers shared by the emitters.

/// Format an f32 as an HLSL float literal. Always keeps a fractional part so
/// the literal never reads as an integer.
pub fn fmt_f32(v: f32) -> String {
    if !v.is_finite() {
        return "0.0".to_string();
    }
    let s = v.to_string();
    if s.contains('.') { s } else { format!("{s}.0") }
}

/// Whether `s` can be emitted as an HLSL identifier as is.
pub fn is_hlsl_ident(s: &str) -> bool {
    !s.is_empty()
        && !s.starts_with(|c: char| c.is_ascii_digit())
        && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

pub fn sanitize_hlsl_ident(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 1);
    for ch in s.chars() {
        if ch.is_ascii_alphanumeric() || ch == '_' {
            out.push(ch);
        } else {
            out.push('_');
        }
    }
    if out.is_empty() || out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}
