//! Log subscriber and the server's structured log events.
//!
//! The engine crate logs through the `log` facade. The subscriber installed
//! by [`init`] bridges those records too, so engine lines and HTTP lines share
//! one filter, one format and the request span opened per call.

use pet_battle::battle::RequestContext;
use std::time::Duration;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "info,sqlx=warn,hyper=warn";

/// Battle calls slower than this are reported at warn level
pub const SLOW_CALL: Duration = Duration::from_millis(500);

/// Install the global subscriber
///
/// Only the first call takes effect; later calls are ignored so tests can
/// call it freely.
///
/// ```no_run
/// pb_server::logging::init();
/// tracing::info!("Server starting");
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_line_number(true),
        )
        .try_init();

    if installed.is_ok() {
        tracing::debug!(filter = DEFAULT_FILTER, "Logging ready");
    }
}

/// A request was refused before reaching the engine because of its token
pub fn rejected_token(request_id: Option<&str>, reason: &str) {
    tracing::warn!(event = "rejected_token", request_id, "SECURITY: {}", reason);
}

/// One finished battle call with its latency
pub fn battle_call(endpoint: &str, ctx: &RequestContext, elapsed: Duration, outcome: &str) {
    let elapsed_ms = elapsed.as_millis() as u64;
    if elapsed > SLOW_CALL {
        tracing::warn!(
            endpoint,
            request_id = %ctx.request_id,
            role_id = ctx.role_id,
            elapsed_ms,
            outcome,
            "Slow battle call"
        );
    } else {
        tracing::debug!(
            endpoint,
            request_id = %ctx.request_id,
            role_id = ctx.role_id,
            elapsed_ms,
            outcome,
            "Battle call"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_is_harmless() {
        init();
        init();
    }

    #[test]
    fn test_battle_call_both_paths() {
        let ctx = RequestContext::new(1, "req-1");
        battle_call("bet", &ctx, Duration::from_millis(5), "ok");
        battle_call("settlement", &ctx, SLOW_CALL + Duration::from_millis(1), "ServerBusy");
        rejected_token(Some("req-2"), "Expired access token");
    }
}
