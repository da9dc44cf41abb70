//! Masking helpers for values that end up in logs or API responses.

/// Mask the middle of a phone number, keeping the country prefix and the
/// last two digits: `+15551234567` → `+155******67`.
pub fn mask_phone(phone_number: &str) -> String {
    let (plus, digits) = match phone_number.strip_prefix('+') {
        Some(rest) => ("+", rest),
        None => ("", phone_number),
    };

    let len = digits.chars().count();
    if len <= 5 {
        return format!("{}{}", plus, "*".repeat(len));
    }

    let head: String = digits.chars().take(3).collect();
    let tail: String = digits.chars().skip(len - 2).collect();
    format!("{}{}{}{}", plus, head, "*".repeat(len - 5), tail)
}

/// Show only the first few characters of a secret (session strings).
pub fn mask_secret(secret: &str) -> String {
    let show = std::cmp::min(4, secret.len() / 4);
    let head: String = secret.chars().take(show).collect();
    format!("{}{}", head, "*".repeat(8))
}
