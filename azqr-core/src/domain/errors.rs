//! API error codes that mean "nothing to scan here" rather than failure

/// Codes returned for unregistered providers, blocked operations or missing scopes
pub const SKIPPABLE_ERROR_CODES: [&str; 4] = [
    "MissingRegistrationForResourceProvider",
    "MissingSubscriptionRegistration",
    "DisallowedOperation",
    "NotFound",
];

/// Exact match against [`SKIPPABLE_ERROR_CODES`]
pub fn is_skippable_error_code(code: &str) -> bool {
    SKIPPABLE_ERROR_CODES.contains(&code)
}

/// True when free-form error text mentions one of the skippable codes
pub fn contains_skippable_error(text: &str) -> bool {
    SKIPPABLE_ERROR_CODES.iter().any(|code| text.contains(code))
}
