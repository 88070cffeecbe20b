//! Timeout helper.

use std::future::Future;
use std::time::Duration;

use crate::error::VoiceError;

/// Bound a fallible future by `duration`, mapping expiry to [`VoiceError::Timeout`].
pub async fn with_timeout<T>(
    duration: Duration,
    future: impl Future<Output = Result<T, VoiceError>>,
) -> Result<T, VoiceError> {
    match tokio::time::timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(VoiceError::Timeout(duration.as_millis() as u64)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn expired_future_becomes_timeout_error() {
        let result: Result<(), VoiceError> = with_timeout(Duration::from_millis(50), async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            Ok(())
        })
        .await;

        assert!(matches!(result, Err(VoiceError::Timeout(50))));
    }

    #[tokio::test]
    async fn completed_future_passes_through() {
        let result = with_timeout(Duration::from_secs(1), async { Ok::<_, VoiceError>(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }
}
