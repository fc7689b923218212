use crate::error::ApiError;

pub const MAX_NAME_LEN: usize = 100;
pub const MAX_EMAIL_LEN: usize = 254;
pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_QUESTION_LEN: usize = 300;
pub const MAX_OPTION_LEN: usize = 200;

/// Reject `value` when it is longer than `max` characters.
pub fn max_len(field: &str, value: &str, max: usize) -> Result<(), ApiError> {
    if value.chars().count() > max {
        return Err(ApiError::validation(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(())
}

/// Trim every option label, rejecting blanks and overlong labels.
pub fn option_labels(options: &[String]) -> Result<Vec<String>, ApiError> {
    options
        .iter()
        .map(|label| {
            let label = label.trim();
            if label.is_empty() {
                return Err(ApiError::validation("Poll options cannot be empty"));
            }
            max_len("Poll option", label, MAX_OPTION_LEN)?;
            Ok(label.to_string())
        })
        .collect()
}
