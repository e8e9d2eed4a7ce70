use crate::error::ApiError;

/// Maximum participant name length, in characters
const MAX_NAME_LENGTH: usize = 128;

/// Validate a participant name or identity and return it trimmed.
pub fn validate_participant_name(name: &str) -> Result<&str, ApiError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ApiError::InvalidInput(
            "Participant name cannot be empty".to_string(),
        ));
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(ApiError::InvalidInput(format!(
            "Participant name too long (max {} characters)",
            MAX_NAME_LENGTH
        )));
    }
    if name.chars().any(char::is_control) {
        return Err(ApiError::InvalidInput(
            "Participant name contains control characters".to_string(),
        ));
    }
    Ok(name)
}
