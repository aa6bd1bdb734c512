use validator::ValidationError;
use crate::constants::TICKET_CAP;
use crate::prize::Prize;

pub fn validate_weight(weight: f64) -> Result<(), ValidationError> {
    if !weight.is_finite() || weight <= 0.0 {
        return Err(ValidationError::new("non_positive_weight"));
    }
    Ok(())
}

pub fn validate_ticket_credit(tickets: u32) -> Result<(), ValidationError> {
    if tickets > TICKET_CAP {
        return Err(ValidationError::new("ticket_credit_above_cap"));
    }
    Ok(())
}

/// Struct-level check run by `#[validate(schema(...))]` on [`Prize`].
pub fn validate_prize(prize: &Prize) -> Result<(), ValidationError> {
    validate_weight(prize.weight)?;
    validate_ticket_credit(prize.tickets)
}

/// A wallet identifier is any non-blank string.
pub fn validate_wallet(wallet: &str) -> Result<(), ValidationError> {
    if wallet.trim().is_empty() {
        return Err(ValidationError::new("missing_wallet"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weight_must_be_positive_and_finite() {
        assert!(validate_weight(0.5).is_ok());
        assert!(validate_weight(0.0).is_err());
        assert!(validate_weight(-1.0).is_err());
        assert!(validate_weight(f64::NAN).is_err());
        assert!(validate_weight(f64::INFINITY).is_err());
    }

    #[test]
    fn test_blank_wallet_rejected() {
        assert!(validate_wallet("abc").is_ok());
        assert!(validate_wallet("").is_err());
        assert!(validate_wallet("   ").is_err());
    }
}
