//! Command definitions
//!
//! Commands represent intentions to change the system state.

use serde::{Deserialize, Serialize};

use crate::domain::{Amount, DomainError, MAX_DESCRIPTION_LENGTH};

/// Command to move funds from a user's wallet to one of their bank accounts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisburseCommand {
    pub user_id: i64,
    pub bank_account_id: i64,
    /// Amount in minor units
    pub amount: i64,
    pub description: Option<String>,
}

impl DisburseCommand {
    pub fn new(user_id: i64, bank_account_id: i64, amount: i64) -> Self {
        Self {
            user_id,
            bank_account_id,
            amount,
            description: None,
        }
    }

    pub fn with_description(mut self, description: String) -> Self {
        self.description = Some(description);
        self
    }

    /// Pure input checks, run before the store is touched.
    pub fn validate(&self) -> Result<(Amount, Option<String>), DomainError> {
        let amount = Amount::new(self.amount)?;

        let description = match &self.description {
            Some(text) => {
                let length = text.chars().count();
                if length > MAX_DESCRIPTION_LENGTH {
                    return Err(DomainError::DescriptionTooLong {
                        length,
                        max: MAX_DESCRIPTION_LENGTH,
                    });
                }
                Some(text.clone()).filter(|t| !t.is_empty())
            }
            None => None,
        };

        Ok((amount, description))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disburse_command() {
        let cmd = DisburseCommand::new(1, 1, 1_000_000).with_description("Payout".to_string());

        let (amount, description) = cmd.validate().unwrap();
        assert_eq!(amount.value(), 1_000_000);
        assert_eq!(description, Some("Payout".to_string()));
    }

    #[test]
    fn test_non_positive_amount_rejected() {
        assert!(matches!(
            DisburseCommand::new(1, 1, 0).validate(),
            Err(DomainError::InvalidAmount(_))
        ));
        assert!(matches!(
            DisburseCommand::new(1, 1, -5).validate(),
            Err(DomainError::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_description_length_counts_characters() {
        let at_limit = "é".repeat(MAX_DESCRIPTION_LENGTH);
        assert!(DisburseCommand::new(1, 1, 10)
            .with_description(at_limit)
            .validate()
            .is_ok());

        let too_long = "x".repeat(MAX_DESCRIPTION_LENGTH + 1);
        assert_eq!(
            DisburseCommand::new(1, 1, 10)
                .with_description(too_long)
                .validate()
                .unwrap_err(),
            DomainError::DescriptionTooLong {
                length: 256,
                max: 255
            }
        );
    }

    #[test]
    fn test_empty_description_is_dropped() {
        let (_, description) = DisburseCommand::new(1, 1, 10)
            .with_description(String::new())
            .validate()
            .unwrap();
        assert!(description.is_none());
    }
}
