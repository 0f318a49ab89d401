use chrono::NaiveDate;

/// Request-level problems the caller maps to a 400 response.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("invalid date '{0}'; expected YYYY-MM-DD")]
    InvalidDate(String),
    #[error("date {date} is after the processing date {today}")]
    FutureDate { date: NaiveDate, today: NaiveDate },
    #[error("user_id must not be empty")]
    EmptyUserId,
}

pub fn parse_date(raw: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| ValidationError::InvalidDate(raw.to_string()))
}

/// Parse a decision date and reject anything after `today`.
pub fn validate_decision_date(raw: &str, today: NaiveDate) -> Result<NaiveDate, ValidationError> {
    let date = parse_date(raw)?;
    if date > today {
        return Err(ValidationError::FutureDate { date, today });
    }
    Ok(date)
}

pub fn validate_user_id(user_id: &str) -> Result<&str, ValidationError> {
    let trimmed = user_id.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyUserId);
    }
    Ok(trimmed)
}
