//! Local file name validation.

use canopy_core::ValidationError;

/// Characters rejected anywhere in a name.
pub const FORBIDDEN_CHARS: [char; 7] = ['<', '>', ':', '"', '|', '?', '*'];

/// Device names reserved by Windows, with or without an extension.
pub const RESERVED_NAMES: [&str; 22] = [
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

const MAX_NAME_BYTES: usize = 255;

/// Validate a single file or folder name for cross-platform use.
///
/// Rules are enforced on every platform so a project stays portable.
pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() {
        return Err(ValidationError::Empty);
    }
    if name.len() > MAX_NAME_BYTES {
        return Err(ValidationError::TooLong);
    }
    if name == "." || name == ".." {
        return Err(ValidationError::DotName);
    }
    if name.contains(['/', '\\']) {
        return Err(ValidationError::PathSeparator);
    }
    if name.chars().any(char::is_control) {
        return Err(ValidationError::ControlChar);
    }
    if let Some(c) = name.chars().find(|c| FORBIDDEN_CHARS.contains(c)) {
        return Err(ValidationError::ForbiddenChar(c));
    }

    let base = name.split('.').next().unwrap_or_default();
    if RESERVED_NAMES
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(base))
    {
        return Err(ValidationError::Reserved(base.to_string()));
    }

    if name.starts_with(' ') || name.ends_with(' ') {
        return Err(ValidationError::SurroundingSpace);
    }
    if name.ends_with('.') {
        return Err(ValidationError::TrailingDot);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_names() {
        for name in ["test.txt", "my-file", ".hidden", "file with spaces", "console.log"] {
            assert_eq!(validate_name(name), Ok(()), "{name}");
        }
    }

    #[test]
    fn test_separators_and_dots() {
        assert_eq!(validate_name(""), Err(ValidationError::Empty));
        assert_eq!(validate_name("a/b"), Err(ValidationError::PathSeparator));
        assert_eq!(validate_name("a\\b"), Err(ValidationError::PathSeparator));
        assert_eq!(validate_name("."), Err(ValidationError::DotName));
        assert_eq!(validate_name(".."), Err(ValidationError::DotName));
        assert_eq!(validate_name("file."), Err(ValidationError::TrailingDot));
        assert_eq!(validate_name(" file"), Err(ValidationError::SurroundingSpace));
    }

    #[test]
    fn test_forbidden_and_control_chars() {
        assert_eq!(validate_name("what?"), Err(ValidationError::ForbiddenChar('?')));
        assert_eq!(validate_name("a<b"), Err(ValidationError::ForbiddenChar('<')));
        assert_eq!(validate_name("tab\there"), Err(ValidationError::ControlChar));
        assert_eq!(validate_name("nul\0"), Err(ValidationError::ControlChar));
    }

    #[test]
    fn test_reserved_names_case_insensitive() {
        assert_eq!(
            validate_name("con"),
            Err(ValidationError::Reserved("con".into()))
        );
        assert_eq!(
            validate_name("Lpt1.txt"),
            Err(ValidationError::Reserved("Lpt1".into()))
        );
        assert!(validate_name("COM10").is_ok());
        assert!(validate_name("prnt.txt").is_ok());
    }

    #[test]
    fn test_too_long() {
        assert_eq!(validate_name(&"a".repeat(256)), Err(ValidationError::TooLong));
        assert!(validate_name(&"a".repeat(255)).is_ok());
    }
}
