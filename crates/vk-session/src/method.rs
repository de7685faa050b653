//! Remote method name normalization

/// Convert an underscore-separated name to the lower-camel-case form the
/// VK server dispatches on (`get_profiles` -> `getProfiles`). The server
/// matches on the exact string, so this must stay byte-for-byte stable.
pub(crate) fn lower_camel(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = false;

    for ch in name.chars() {
        if ch == '_' {
            upper_next = true;
        } else if out.is_empty() {
            out.extend(ch.to_lowercase());
            upper_next = false;
        } else if upper_next {
            out.extend(ch.to_uppercase());
            upper_next = false;
        } else {
            out.push(ch);
        }
    }

    out
}

/// Qualify a normalized method name with an optional namespace prefix.
pub(crate) fn qualify(prefix: Option<&str>, method: &str) -> String {
    match prefix {
        Some(prefix) => format!("{}.{}", prefix, method),
        None => method.to_string(),
    }
}
