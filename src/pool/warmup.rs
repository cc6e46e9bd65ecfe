//! Warmup exchange that gates a new session

use crate::error::{ClaudeError, Result};
use crate::session::{SessionDriver, TurnResult};

use super::config::PoolConfig;

/// Whether a warmup reply signals readiness
///
/// Any reply that mentions the token counts, in any case and anywhere in
/// the text: models rarely answer with the bare word.
#[must_use]
pub fn is_ready_response(text: &str, token: &str) -> bool {
    let token = token.trim();
    !token.is_empty() && text.to_lowercase().contains(&token.to_lowercase())
}

/// Wait for the warmup result and validate it
///
/// The warmup prompt must already be in the session's channel.
pub(super) async fn await_warmup(driver: &mut SessionDriver, config: &PoolConfig) -> Result<TurnResult> {
    let turn = tokio::time::timeout(config.warmup_timeout(), driver.next_result())
        .await
        .map_err(|_| {
            ClaudeError::timeout(format!(
                "no warmup reply within {}ms",
                config.warmup_timeout_ms
            ))
        })??;

    if !turn.is_success() {
        return Err(ClaudeError::warmup(format!(
            "warmup ended with {} (is_error={})",
            turn.subtype, turn.is_error
        )));
    }

    if !is_ready_response(&turn.text, &config.readiness_token) {
        return Err(ClaudeError::warmup(format!(
            "reply {:?} does not contain {:?}",
            turn.text, config.readiness_token
        )));
    }

    Ok(turn)
}
