use store::Transaction;

use crate::DomainError;

/// Commits `tx` if `result` is Ok, otherwise rolls it back.
///
/// A failed commit becomes the returned error. A failed rollback is logged
/// and the operation's own error is returned.
pub(crate) async fn finish<T>(
    tx: Box<dyn Transaction>,
    result: Result<T, DomainError>,
) -> Result<T, DomainError> {
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::warn!(error = %rollback_err, "rollback failed");
            }
            Err(err)
        }
    }
}
