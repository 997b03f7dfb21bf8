//! Applies per-token multicast outcomes to the token table.

use promet_common::error::AppError;
use promet_common::stats::{StatKind, Statistics};
use promet_common::store::StoreTx;
use promet_common::types::NewDeviceToken;
use promet_notifier::{MulticastResponse, TokenError};

/// User agent recorded for rows created from a canonical replacement.
pub const CANONICAL_USER_AGENT: &str = "fcm-canonical";

/// What reconciliation did to one page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Tokens removed because the provider no longer accepts them.
    pub deleted: Vec<String>,
    /// `(old, new)` pairs for canonical replacements.
    pub replaced: Vec<(String, String)>,
    /// Failures with an error code we do not act on.
    pub unknown_errors: usize,
}

/// Reconcile one page. `tokens[i]` is the token `response.results[i]` belongs to.
///
/// Store failures on a single token are logged and skipped; they never abort
/// the page.
pub async fn reconcile<T: StoreTx>(
    tx: &mut T,
    tokens: &[String],
    response: &MulticastResponse,
    stats: &Statistics,
) -> ReconcileReport {
    let mut report = ReconcileReport::default();

    if response.failure_count == 0 && response.canonical_count == 0 {
        return report;
    }

    for (token, result) in tokens.iter().zip(&response.results) {
        if let Some(error) = &result.error {
            stats.increment(StatKind::FailedMessages);

            match error {
                TokenError::NotRegistered | TokenError::InvalidRegistration => {
                    tracing::info!(token = %token, error = %error, "Removing rejected device token");
                    if remove(tx, token).await {
                        report.deleted.push(token.clone());
                    }
                }
                TokenError::MissingRegistration => {
                    tracing::warn!(
                        token = %token,
                        missing_registration = true,
                        "Provider reported a missing registration, removing token"
                    );
                    if remove(tx, token).await {
                        report.deleted.push(token.clone());
                    }
                }
                TokenError::Other(code) => {
                    tracing::error!(token = %token, error = %code, "Unknown per-token delivery error");
                    report.unknown_errors += 1;
                }
            }
            continue;
        }

        if let Some(canonical) = result.canonical_id.as_ref().filter(|c| *c != token) {
            match replace(tx, token, canonical).await {
                Ok(()) => {
                    stats.increment(StatKind::UpdatedPushKeys);
                    report.replaced.push((token.clone(), canonical.clone()));
                }
                Err(e) => {
                    tracing::error!(
                        token = %token,
                        canonical = %canonical,
                        error = %e,
                        "Failed to apply canonical token replacement"
                    );
                }
            }
        }
    }

    report
}

async fn remove<T: StoreTx>(tx: &mut T, token: &str) -> bool {
    match tx.delete_token(token).await {
        Ok(removed) => removed,
        Err(e) => {
            tracing::error!(token = %token, error = %e, "Failed to delete device token");
            false
        }
    }
}

async fn replace<T: StoreTx>(tx: &mut T, old: &str, canonical: &str) -> Result<(), AppError> {
    tracing::info!(old = %old, new = %canonical, "Replacing device token with canonical id");
    tx.delete_token(old).await?;
    if !tx
        .insert_token_if_absent(&NewDeviceToken::new(canonical, CANONICAL_USER_AGENT))
        .await?
    {
        tracing::debug!(token = %canonical, "Canonical token already registered");
    }
    Ok(())
}
