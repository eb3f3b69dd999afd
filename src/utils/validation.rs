use crate::domain::model::CustomerDetails;
use crate::utils::error::{Result, SchedulingError};

const MAX_NAME_LENGTH: usize = 100;
const MIN_PHONE_DIGITS: usize = 7;
const MAX_PHONE_DIGITS: usize = 15;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(SchedulingError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path cannot be empty".to_string(),
        });
    }

    if path.contains('\0') {
        return Err(SchedulingError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path contains null bytes".to_string(),
        });
    }

    Ok(())
}

pub fn validate_positive_number(field_name: &str, value: u32, min_value: u32) -> Result<()> {
    if value < min_value {
        return Err(SchedulingError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be at least {}", min_value),
        });
    }
    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(SchedulingError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(SchedulingError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be between {} and {}", min, max),
        });
    }
    Ok(())
}

pub fn validate_customer_name(name: &str) -> Result<()> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(invalid_input("customer_name", name, "Name cannot be empty"));
    }
    if trimmed.chars().count() > MAX_NAME_LENGTH {
        return Err(invalid_input(
            "customer_name",
            name,
            &format!("Name cannot be longer than {} characters", MAX_NAME_LENGTH),
        ));
    }
    Ok(())
}

/// 允許 `+`、空白、`-` 與括號，數字位數需介於 7 到 15 之間
pub fn validate_phone(phone: &str) -> Result<()> {
    let trimmed = phone.trim();
    if let Some(bad) = trimmed
        .chars()
        .find(|c| !(c.is_ascii_digit() || matches!(c, '+' | ' ' | '-' | '(' | ')')))
    {
        return Err(invalid_input(
            "phone",
            phone,
            &format!("Unexpected character '{}'", bad),
        ));
    }
    if trimmed.chars().skip(1).any(|c| c == '+') {
        return Err(invalid_input("phone", phone, "'+' is only allowed as prefix"));
    }

    let digits = trimmed.chars().filter(|c| c.is_ascii_digit()).count();
    if !(MIN_PHONE_DIGITS..=MAX_PHONE_DIGITS).contains(&digits) {
        return Err(invalid_input(
            "phone",
            phone,
            &format!(
                "Phone number must have between {} and {} digits",
                MIN_PHONE_DIGITS, MAX_PHONE_DIGITS
            ),
        ));
    }
    Ok(())
}

fn invalid_input(field: &str, value: &str, reason: &str) -> SchedulingError {
    SchedulingError::InvalidInput {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

impl Validate for CustomerDetails {
    fn validate(&self) -> Result<()> {
        validate_customer_name(&self.customer_name)?;
        validate_phone(&self.phone)
    }
}
