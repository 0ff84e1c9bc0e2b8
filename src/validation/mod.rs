use std::fmt;

pub const NAME_MAX_LEN: usize = 120;
pub const ADDRESS_MAX_LEN: usize = 500;
pub const EMAIL_MAX_LEN: usize = 254;
pub const PRODUCT_ID_MAX_LEN: usize = 64;
pub const CANCEL_REASON_MAX_LEN: usize = 200;
pub const CANCEL_DETAILS_MAX_LEN: usize = 1000;
pub const PINCODE_LEN: usize = 6;
pub const PHONE_MIN_DIGITS: usize = 10;
pub const PHONE_MAX_DIGITS: usize = 13;
pub const MAX_LINE_QUANTITY: i32 = 99;
pub const MAX_ORDER_LINES: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult = Result<(), ValidationError>;

pub fn sanitize_string(value: &str) -> String {
    value
        .chars()
        .filter(|ch| !ch.is_control())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn validate_required(field: &'static str, value: &str) -> ValidationResult {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }

    Ok(())
}

pub fn validate_max_len(field: &'static str, value: &str, max_len: usize) -> ValidationResult {
    if value.len() > max_len {
        return Err(ValidationError::new(
            field,
            format!("must be at most {} characters", max_len),
        ));
    }

    Ok(())
}

pub fn validate_enum(field: &'static str, value: &str, allowed: &[&str]) -> ValidationResult {
    if allowed.iter().all(|candidate| value != *candidate) {
        return Err(ValidationError::new(
            field,
            format!("must be one of: {}", allowed.join(", ")),
        ));
    }

    Ok(())
}

/// Accepts digits with an optional leading `+` and common separators.
pub fn validate_phone(phone: &str) -> ValidationResult {
    let phone = sanitize_string(phone);
    validate_required("phone", &phone)?;

    let mut digits = 0;
    for (idx, ch) in phone.chars().enumerate() {
        match ch {
            '0'..='9' => digits += 1,
            '+' if idx == 0 => {}
            ' ' | '-' => {}
            _ => {
                return Err(ValidationError::new(
                    "phone",
                    "must contain only digits, spaces, dashes and a leading '+'",
                ))
            }
        }
    }

    if !(PHONE_MIN_DIGITS..=PHONE_MAX_DIGITS).contains(&digits) {
        return Err(ValidationError::new(
            "phone",
            format!(
                "must have between {} and {} digits",
                PHONE_MIN_DIGITS, PHONE_MAX_DIGITS
            ),
        ));
    }

    Ok(())
}

pub fn validate_pincode(pincode: &str) -> ValidationResult {
    let pincode = pincode.trim();
    validate_required("pincode", pincode)?;

    if pincode.len() != PINCODE_LEN || !pincode.chars().all(|ch| ch.is_ascii_digit()) {
        return Err(ValidationError::new(
            "pincode",
            format!("must be exactly {} digits", PINCODE_LEN),
        ));
    }

    Ok(())
}

pub fn validate_email(email: &str) -> ValidationResult {
    let email = email.trim();
    validate_required("email", email)?;
    validate_max_len("email", email, EMAIL_MAX_LEN)?;

    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };

    if !valid {
        return Err(ValidationError::new("email", "must be a valid email address"));
    }

    Ok(())
}

pub fn validate_quantity(quantity: i32) -> ValidationResult {
    if !(1..=MAX_LINE_QUANTITY).contains(&quantity) {
        return Err(ValidationError::new(
            "quantity",
            format!("must be between 1 and {}", MAX_LINE_QUANTITY),
        ));
    }

    Ok(())
}

pub fn validate_product_id(product_id: &str) -> ValidationResult {
    validate_required("productId", product_id)?;
    validate_max_len("productId", product_id, PRODUCT_ID_MAX_LEN)?;

    if !product_id
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
    {
        return Err(ValidationError::new(
            "productId",
            "must contain only letters, digits, '-' and '_'",
        ));
    }

    Ok(())
}
