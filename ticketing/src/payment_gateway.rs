//! Payment gateway seam.
//!
//! The checkout reducer asks a [`PaymentGateway`] whether a charge goes
//! through. The box office ships a mock gateway; a real processor integration
//! would implement the same trait.

use crate::types::{Money, PaymentId, PaymentMethod};
use std::sync::Arc;
use thiserror::Error;

/// Payment gateway result
pub type GatewayResult<T> = Result<T, PaymentGatewayError>;

/// Payment gateway error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaymentGatewayError {
    /// Card or account declined
    #[error("Payment declined: {reason}")]
    Declined {
        /// Decline reason
        reason: String,
    },
    /// Insufficient funds
    #[error("Insufficient funds")]
    InsufficientFunds,
    /// Gateway did not answer
    #[error("Gateway timeout")]
    Timeout,
}

/// Payment gateway transaction result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentTransaction {
    /// Payment ID (internal)
    pub payment_id: PaymentId,
    /// Gateway transaction ID
    pub transaction_id: String,
    /// Amount charged
    pub amount: Money,
    /// Payment method used
    pub method: PaymentMethod,
}

/// Payment gateway trait
///
/// Abstraction over payment processors.
pub trait PaymentGateway: Send + Sync {
    /// Charge a customer
    ///
    /// # Errors
    ///
    /// Returns error if the charge is refused
    fn charge(
        &self,
        payment_id: &PaymentId,
        amount: Money,
        method: PaymentMethod,
    ) -> GatewayResult<PaymentTransaction>;
}

/// Mock payment gateway
///
/// Approves every charge unless built with [`MockPaymentGateway::declining`].
#[derive(Clone, Debug, Default)]
pub struct MockPaymentGateway {
    decline_reason: Option<String>,
}

impl MockPaymentGateway {
    /// Creates a gateway that approves every charge
    #[must_use]
    pub const fn new() -> Self {
        Self {
            decline_reason: None,
        }
    }

    /// Creates a gateway that declines every charge with `reason`
    #[must_use]
    pub fn declining(reason: impl Into<String>) -> Self {
        Self {
            decline_reason: Some(reason.into()),
        }
    }

    /// Creates an Arc-wrapped approving instance for sharing
    #[must_use]
    pub fn shared() -> Arc<dyn PaymentGateway> {
        Arc::new(Self::new())
    }
}

impl PaymentGateway for MockPaymentGateway {
    fn charge(
        &self,
        payment_id: &PaymentId,
        amount: Money,
        method: PaymentMethod,
    ) -> GatewayResult<PaymentTransaction> {
        if let Some(reason) = &self.decline_reason {
            tracing::info!(payment_id = %payment_id, amount = amount.cents(), %reason, "Mock payment declined");
            return Err(PaymentGatewayError::Declined {
                reason: reason.clone(),
            });
        }

        let transaction_id = format!("mock_txn_{payment_id}");

        tracing::info!(
            payment_id = %payment_id,
            amount = amount.cents(),
            transaction_id = %transaction_id,
            "Mock payment processed successfully"
        );

        Ok(PaymentTransaction {
            payment_id: payment_id.clone(),
            transaction_id,
            amount,
            method,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_payment_success() {
        let gateway = MockPaymentGateway::new();
        let payment_id = PaymentId::new("PAY001");
        let amount = Money::from_cents(10_000);

        let transaction = gateway
            .charge(&payment_id, amount, PaymentMethod::CardPayment)
            .unwrap();

        assert_eq!(transaction.payment_id, payment_id);
        assert_eq!(transaction.amount, amount);
        assert!(transaction.transaction_id.starts_with("mock_txn_"));
    }

    #[test]
    fn test_mock_payment_decline() {
        let gateway = MockPaymentGateway::declining("card expired");

        let result = gateway.charge(&PaymentId::new("PAY002"), Money::from_cents(1), PaymentMethod::EWallet);

        assert_eq!(
            result,
            Err(PaymentGatewayError::Declined {
                reason: "card expired".to_string()
            })
        );
    }
}
