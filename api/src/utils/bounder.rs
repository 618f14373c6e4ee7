//! Bounds checking utilities for user input to aclforge

use super::ApiError;
use crate::bad;

/// Bounds check a string
///
/// This enforces a minimum and maximum size for a string.
///
/// # Arguments
///
/// * `input` - The string to bounds check
/// * `name` - The variable name to be bounds checked (for logging/errors)
/// * `min` - The minimum length of this string
/// * `max` - The maximum length of this string
pub fn string(input: &str, name: &'static str, min: usize, max: usize) -> Result<(), ApiError> {
    // bounds check length
    let input_len = input.len();
    if input_len < min || input_len > max {
        return bad!(format!(
            "{} must be between {} and {} chars",
            name, min, max
        ));
    }
    // ensure this string is alphanumeric with basic separators
    if !input
        .chars()
        .all(|chr| char::is_alphanumeric(chr) || chr == '-' || chr == '_' || chr == ' ')
    {
        return bad!(format!(
            "{} must be only alphanumeric, '-', '_' or spaces: {}",
            name, input
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strings_are_bounds_checked() {
        assert!(string("prod firewall", "name", 1, 64).is_ok());
        assert!(string("", "name", 1, 64).is_err());
        assert!(string("bad/name", "name", 1, 64).is_err());
        assert!(string(&"a".repeat(65), "name", 1, 64).is_err());
    }
}
