use crate::utils::error::{DispatchError, Result};
use std::net::SocketAddr;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_positive_number(field_name: &str, value: usize, min_value: usize) -> Result<()> {
    if value < min_value {
        return Err(DispatchError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be at least {}", min_value),
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
        return Err(DispatchError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be between {} and {}", min, max),
        });
    }
    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(DispatchError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

/// 表名規則：3 到 255 個字元，只能包含英數字、底線、連字號與句點
pub fn validate_table_name(field_name: &str, table_name: &str) -> Result<()> {
    if table_name.len() < 3 || table_name.len() > 255 {
        return Err(DispatchError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: table_name.to_string(),
            reason: "Table name must be between 3 and 255 characters".to_string(),
        });
    }

    if !table_name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
    {
        return Err(DispatchError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: table_name.to_string(),
            reason: "Table name can only contain letters, numbers, underscores, hyphens, and dots"
                .to_string(),
        });
    }

    Ok(())
}

pub fn validate_key_schema(field_name: &str, key: &[String]) -> Result<()> {
    if key.is_empty() || key.len() > 2 {
        return Err(DispatchError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: key.join(","),
            reason: "Key schema needs a partition key and at most one sort key".to_string(),
        });
    }
    for attr in key {
        validate_non_empty_string(field_name, attr)?;
    }
    Ok(())
}

pub fn validate_socket_addr(field_name: &str, addr: &str) -> Result<SocketAddr> {
    addr.parse::<SocketAddr>()
        .map_err(|e| DispatchError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: addr.to_string(),
            reason: format!("Invalid socket address: {}", e),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_positive_number() {
        assert!(validate_positive_number("max_concurrency", 5, 1).is_ok());
        assert!(validate_positive_number("max_concurrency", 0, 1).is_err());
    }

    #[test]
    fn test_validate_table_name() {
        assert!(validate_table_name("table", "Users").is_ok());
        assert!(validate_table_name("table", "lambda-apigateway.v2_items").is_ok());
        assert!(validate_table_name("table", "ab").is_err());
        assert!(validate_table_name("table", "bad name").is_err());
    }

    #[test]
    fn test_validate_key_schema() {
        assert!(validate_key_schema("key", &["id".to_string()]).is_ok());
        assert!(validate_key_schema("key", &["pk".to_string(), "sk".to_string()]).is_ok());
        assert!(validate_key_schema("key", &[]).is_err());
        assert!(validate_key_schema("key", &[" ".to_string()]).is_err());
    }

    #[test]
    fn test_validate_socket_addr() {
        assert!(validate_socket_addr("bind", "127.0.0.1:3000").is_ok());
        assert!(validate_socket_addr("bind", "localhost").is_err());
    }
}
