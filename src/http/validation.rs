use crate::http::AppError;

/// Trims and bounds a required text field, counted in characters.
pub fn required_text(field: &str, value: &str, max_chars: usize) -> Result<String, AppError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::bad_request(format!("{} is required", field)));
    }
    if value.chars().count() > max_chars {
        return Err(AppError::bad_request(format!(
            "{} must be at most {} characters",
            field, max_chars
        )));
    }
    Ok(value.to_string())
}

/// Patch variant: absent stays absent, present must still be valid.
pub fn optional_text(
    field: &str,
    value: Option<&str>,
    max_chars: usize,
) -> Result<Option<String>, AppError> {
    value
        .map(|value| required_text(field, value, max_chars))
        .transpose()
}

/// Maps a wire value onto a closed enum via its `from_db` parser.
pub fn choice<T>(field: &str, value: &str, parse: fn(&str) -> Option<T>) -> Result<T, AppError> {
    parse(value.trim()).ok_or_else(|| AppError::bad_request(format!("invalid {}: {}", field, value)))
}

pub fn optional_choice<T>(
    field: &str,
    value: Option<&str>,
    parse: fn(&str) -> Option<T>,
) -> Result<Option<T>, AppError> {
    value.map(|value| choice(field, value, parse)).transpose()
}

/// Listing selector: empty or `all` disables the filter.
pub fn filter_choice<T>(
    field: &str,
    value: Option<&str>,
    parse: fn(&str) -> Option<T>,
) -> Result<Option<T>, AppError> {
    match value.map(str::trim) {
        None => Ok(None),
        Some(value) if value.is_empty() || value.eq_ignore_ascii_case("all") => Ok(None),
        Some(value) => choice(field, value, parse).map(Some),
    }
}

pub fn email(value: &str) -> Result<String, AppError> {
    let value = required_text("email", value, 254)?;
    let valid = match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !value.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if !valid {
        return Err(AppError::bad_request("email is invalid"));
    }
    Ok(value)
}
