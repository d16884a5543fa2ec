// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Phone number normalization for Israeli mobile numbers.

use crate::error::AppError;

/// User-facing validation message ("invalid phone number").
pub const INVALID_PHONE_MESSAGE: &str = "מספר טלפון לא תקין";

const COUNTRY_CODE: &str = "972";

/// Normalize to international format: keep digits, replace a leading
/// trunk `0` with the country code, prefix `+`.
///
/// `"050-123-4567"` becomes `"+972501234567"`. Applying it twice is a no-op.
pub fn normalize_phone(raw: &str) -> String {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();

    match digits.strip_prefix('0') {
        Some(rest) => format!("+{COUNTRY_CODE}{rest}"),
        None => format!("+{digits}"),
    }
}

/// Israeli mobile: `+9725` followed by eight digits.
pub fn is_valid_israeli_mobile(normalized: &str) -> bool {
    let Some(national) = normalized
        .strip_prefix('+')
        .and_then(|n| n.strip_prefix(COUNTRY_CODE))
    else {
        return false;
    };

    national.len() == 9
        && national.starts_with('5')
        && national.chars().all(|c| c.is_ascii_digit())
}

/// Normalize and validate, returning the canonical number.
pub fn parse_phone(raw: &str) -> Result<String, AppError> {
    let normalized = normalize_phone(raw);
    if !is_valid_israeli_mobile(&normalized) {
        return Err(AppError::BadRequest(INVALID_PHONE_MESSAGE.to_string()));
    }
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_format() {
        assert_eq!(normalize_phone("050-123-4567"), "+972501234567");
        assert_eq!(normalize_phone("0501234567"), "+972501234567");
        assert_eq!(normalize_phone(" 052 987 6543 "), "+972529876543");
    }

    #[test]
    fn test_international_formats() {
        assert_eq!(normalize_phone("+972-50-123-4567"), "+972501234567");
        assert_eq!(normalize_phone("972501234567"), "+972501234567");
    }

    #[test]
    fn test_idempotent() {
        for raw in [
            "050-123-4567",
            "+972 50 123 4567",
            "(054) 000-1111",
            "12345",
            "",
            "0",
        ] {
            let once = normalize_phone(raw);
            assert_eq!(normalize_phone(&once), once, "input {raw:?}");
        }
    }

    #[test]
    fn test_validation() {
        assert!(is_valid_israeli_mobile("+972501234567"));
        assert!(!is_valid_israeli_mobile("+97250123456"));
        assert!(!is_valid_israeli_mobile("+972301234567"));
        assert!(!is_valid_israeli_mobile("+14155550100"));
        assert!(!is_valid_israeli_mobile("972501234567"));
    }

    #[test]
    fn test_parse_phone_rejects_landline() {
        assert_eq!(parse_phone("050-123-4567").unwrap(), "+972501234567");
        let err = parse_phone("03-123-4567").unwrap_err();
        assert!(matches!(err, AppError::BadRequest(msg) if msg == INVALID_PHONE_MESSAGE));
    }
}
