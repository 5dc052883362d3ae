//! Response envelopes and request validators shared by every endpoint

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use rust_decimal_macros::dec;
use validator::ValidationError;

/// Largest amount a `NUMERIC(14,2)` money column holds
pub const MAX_MONEY: Decimal = dec!(999_999_999_999.99);

/// Money amounts must be positive, in whole pennies and fit a money column
pub fn validate_amount(value: &Decimal) -> Result<(), ValidationError> {
    if *value <= Decimal::ZERO {
        let mut err = ValidationError::new("positive");
        err.message = Some("amount must be greater than zero".into());
        return Err(err);
    }
    if *value > MAX_MONEY {
        let mut err = ValidationError::new("range");
        err.message = Some(format!("amount must not exceed {}", MAX_MONEY).into());
        return Err(err);
    }
    if value.normalize().scale() > 2 {
        let mut err = ValidationError::new("precision");
        err.message = Some("amount must have at most two decimal places".into());
        return Err(err);
    }
    Ok(())
}

/// APRs are percentages in `(0, 100]`
pub fn validate_apr(value: &Decimal) -> Result<(), ValidationError> {
    if *value <= Decimal::ZERO || *value > Decimal::ONE_HUNDRED {
        let mut err = ValidationError::new("apr_range");
        err.message = Some("APR must be greater than 0 and at most 100".into());
        return Err(err);
    }
    Ok(())
}

/// API response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

/// Pagination parameters
#[derive(Debug, Default, Deserialize)]
pub struct PaginationParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl PaginationParams {
    pub const DEFAULT_LIMIT: i64 = 20;
    pub const MAX_LIMIT: i64 = 100;

    /// Clamped `(page, limit, offset)`
    pub fn resolve(&self) -> (i64, i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let limit = self
            .limit
            .unwrap_or(Self::DEFAULT_LIMIT)
            .clamp(1, Self::MAX_LIMIT);
        (page, limit, (page - 1) * limit)
    }
}

/// Paginated response
#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_defaults() {
        assert_eq!(PaginationParams::default().resolve(), (1, 20, 0));
    }

    #[test]
    fn test_pagination_clamps() {
        let params = PaginationParams { page: Some(0), limit: Some(500) };
        assert_eq!(params.resolve(), (1, 100, 0));

        let params = PaginationParams { page: Some(3), limit: Some(10) };
        assert_eq!(params.resolve(), (3, 10, 20));
    }

    #[test]
    fn test_validate_amount() {
        use rust_decimal_macros::dec;

        assert!(validate_amount(&dec!(10.50)).is_ok());
        assert!(validate_amount(&dec!(10.500)).is_ok());
        assert!(validate_amount(&dec!(0)).is_err());
        assert!(validate_amount(&dec!(-1)).is_err());
        assert!(validate_amount(&dec!(0.001)).is_err());
    }

    #[test]
    fn test_validate_amount_upper_bound() {
        assert!(validate_amount(&MAX_MONEY).is_ok());
        assert!(validate_amount(&dec!(1000000000000)).is_err());
        assert!(validate_amount(&dec!(10000000000000)).is_err());
    }

    #[test]
    fn test_validate_apr() {
        use rust_decimal_macros::dec;

        assert!(validate_apr(&dec!(24.99)).is_ok());
        assert!(validate_apr(&dec!(0)).is_err());
        assert!(validate_apr(&dec!(101)).is_err());
    }

    #[test]
    fn test_success_envelope() {
        let body = serde_json::to_value(ApiResponse::success(42)).unwrap();
        assert_eq!(body["success"], true);
        assert_eq!(body["data"], 42);
        assert!(body["error"].is_null());
    }
}
