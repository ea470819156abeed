/// Parse a boolean flag from a string value, or return the given default value otherwise.
pub fn parse_boolean_flag(value: Option<String>, default: bool) -> bool {
    let value = match value {
        Some(v) => v,
        None => return default,
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

/// A deliberately loose email shape check: one `@`, a non-empty local part, and a dotted domain without spaces.
///
/// Real validation happens when the mail is delivered; this only rejects obvious typos before an order is created.
pub fn is_plausible_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let mut parts = email.split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => {
            !local.is_empty() &&
                domain.contains('.') &&
                !domain.starts_with('.') &&
                !domain.ends_with('.') &&
                !domain.contains("..")
        },
        _ => false,
    }
}
