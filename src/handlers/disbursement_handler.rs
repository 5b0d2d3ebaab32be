//! Disbursement Handler
//!
//! Moves funds from a user's wallet to one of their bank accounts. Every
//! read, the debit, the ledger row and the final status are written inside
//! one unit of work: either all of it commits or none of it does.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::{Amount, NewDisbursement, OperationContext, ReferenceGenerator};
use crate::error::{AppError, AppResult};
use crate::projection::{DisbursementView, ProjectionService};
use crate::settlement::{SettlementError, SettlementGateway, SettlementInstruction};
use crate::store::{EntityStore, UnitOfWork};

use super::DisburseCommand;

/// Upper bound on one settlement call unless configured otherwise
pub const DEFAULT_SETTLEMENT_TIMEOUT: Duration = Duration::from_secs(10);

/// How a unit resolved its disbursement before commit
enum Resolution {
    Completed {
        id: i64,
    },
    Failed {
        id: i64,
        reference: String,
        reason: SettlementError,
    },
}

/// Handler for wallet disbursements
pub struct DisbursementHandler {
    store: Arc<dyn EntityStore>,
    gateway: Arc<dyn SettlementGateway>,
    projection: ProjectionService,
    references: ReferenceGenerator,
    settlement_timeout: Duration,
}

impl DisbursementHandler {
    pub fn new(store: Arc<dyn EntityStore>, gateway: Arc<dyn SettlementGateway>) -> Self {
        Self {
            projection: ProjectionService::new(store.clone()),
            store,
            gateway,
            references: ReferenceGenerator::new(),
            settlement_timeout: DEFAULT_SETTLEMENT_TIMEOUT,
        }
    }

    pub fn with_settlement_timeout(mut self, timeout: Duration) -> Self {
        self.settlement_timeout = timeout;
        self
    }

    pub fn projection(&self) -> &ProjectionService {
        &self.projection
    }

    /// Execute the disburse command
    ///
    /// Precondition failures and store errors roll the unit back. If this
    /// future is dropped mid-flight the unit is dropped with it, which rolls
    /// back and releases the wallet lock.
    pub async fn execute(
        &self,
        command: DisburseCommand,
        context: &OperationContext,
    ) -> AppResult<DisbursementView> {
        let (amount, description) = command.validate()?;

        let mut unit = self.store.begin().await?;
        let outcome = self
            .run_unit(unit.as_mut(), &command, amount, description)
            .await;

        let resolution = match outcome {
            Ok(resolution) => resolution,
            Err(e) => {
                if let Err(rollback_err) = unit.rollback().await {
                    tracing::warn!(
                        correlation_id = ?context.correlation_id,
                        "Rollback after failed disbursement errored: {}",
                        rollback_err
                    );
                }
                tracing::info!(
                    correlation_id = ?context.correlation_id,
                    user_id = command.user_id,
                    bank_account_id = command.bank_account_id,
                    amount = command.amount,
                    "Disbursement rejected: {}",
                    e
                );
                return Err(e);
            }
        };

        unit.commit().await.map_err(|e| {
            tracing::error!(
                correlation_id = ?context.correlation_id,
                user_id = command.user_id,
                "Disbursement commit failed: {}",
                e
            );
            AppError::from(e)
        })?;

        match resolution {
            Resolution::Completed { id } => {
                tracing::info!(
                    correlation_id = ?context.correlation_id,
                    disbursement_id = id,
                    user_id = command.user_id,
                    amount = command.amount,
                    "Disbursement completed"
                );
                self.projection.disbursement(id).await.map_err(|e| match e {
                    AppError::DisbursementNotFound(id) => {
                        AppError::Internal(format!("disbursement {} missing after commit", id))
                    }
                    other => other,
                })
            }
            Resolution::Failed {
                id,
                reference,
                reason,
            } => {
                tracing::warn!(
                    correlation_id = ?context.correlation_id,
                    disbursement_id = id,
                    reference = %reference,
                    "Disbursement failed at settlement, debit reversed"
                );
                Err(AppError::SettlementFailed {
                    reference,
                    reason: reason.to_string(),
                })
            }
        }
    }

    async fn run_unit(
        &self,
        unit: &mut dyn UnitOfWork,
        command: &DisburseCommand,
        amount: Amount,
        description: Option<String>,
    ) -> AppResult<Resolution> {
        let user = unit
            .find_user(command.user_id)
            .await?
            .ok_or(AppError::UserNotFound(command.user_id))?;

        let bank_account = unit
            .find_bank_account(command.bank_account_id, user.id)
            .await?
            .ok_or(AppError::BankAccountNotFound(command.bank_account_id))?;

        // Locks the wallet row until the unit ends
        let wallet = unit
            .find_wallet_by_owner(user.id)
            .await?
            .ok_or(AppError::WalletNotFound(user.id))?;

        wallet.ensure_can_debit(&amount)?;

        let now = Utc::now();
        let id = unit.reserve_disbursement_id().await?;
        let reference = self.references.generate(user.id, id, now).to_string();

        let record = NewDisbursement {
            id,
            user_id: user.id,
            wallet_id: wallet.id,
            bank_account_id: bank_account.id,
            amount,
            reference: reference.clone(),
            description,
            created_at: now,
        };
        unit.insert_disbursement(&record).await?;
        let balance = unit.debit_wallet(wallet.id, amount, now).await?;

        tracing::debug!(
            disbursement_id = id,
            reference = %reference,
            wallet_id = wallet.id,
            balance,
            "Wallet debited, disbursement pending settlement"
        );

        let mut disbursement = record.into_pending();
        let instruction = SettlementInstruction::new(
            id,
            reference.clone(),
            amount,
            wallet.currency.clone(),
            &bank_account,
        );

        let settlement =
            match tokio::time::timeout(self.settlement_timeout, self.gateway.settle(&instruction))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(SettlementError::TimedOut(self.settlement_timeout)),
            };

        match settlement {
            Ok(receipt) => {
                disbursement.complete(receipt.settled_at)?;
                unit.update_disbursement_status(
                    id,
                    disbursement.status,
                    disbursement.completed_at,
                    disbursement.updated_at,
                )
                .await?;

                tracing::debug!(
                    disbursement_id = id,
                    external_id = %receipt.external_id,
                    "Settlement confirmed"
                );
                Ok(Resolution::Completed { id })
            }
            Err(reason) => {
                let at = Utc::now();
                let restored = unit.credit_wallet(wallet.id, amount, at).await?;
                tracing::debug!(
                    disbursement_id = id,
                    wallet_id = wallet.id,
                    balance = restored,
                    "Debit reversed after settlement failure"
                );

                disbursement.fail(at)?;
                unit.update_disbursement_status(id, disbursement.status, None, at)
                    .await?;

                Ok(Resolution::Failed {
                    id,
                    reference,
                    reason,
                })
            }
        }
    }
}
