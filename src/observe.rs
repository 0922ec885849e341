use std::time::Duration;

use crate::error::Error;

pub(crate) fn record_handled(netfn: u8, cmd: u8, elapsed: Duration, completion_code: u8) {
    #[cfg(feature = "metrics")]
    {
        let outcome = if completion_code == 0x00 { "ok" } else { "completion_code" };
        metrics::counter!("ipmi_bmc_requests_total", "outcome" => outcome).increment(1);
        metrics::histogram!("ipmi_bmc_request_seconds").record(elapsed.as_secs_f64());
    }

    tracing::debug!(
        netfn,
        cmd,
        completion_code,
        elapsed_us = elapsed.as_micros() as u64,
        "ipmi request handled"
    );
}

pub(crate) fn record_dropped(reason: &'static str) {
    #[cfg(feature = "metrics")]
    metrics::counter!("ipmi_bmc_dropped_total", "reason" => reason).increment(1);

    tracing::warn!(reason, "datagram dropped");
}

pub(crate) fn record_malformed(err: &Error) {
    #[cfg(feature = "metrics")]
    metrics::counter!("ipmi_bmc_dropped_total", "reason" => "malformed").increment(1);

    tracing::warn!(error = %err, "malformed datagram dropped");
}

pub(crate) fn record_active_sessions(active: usize) {
    #[cfg(feature = "metrics")]
    metrics::gauge!("ipmi_bmc_active_sessions").set(active as f64);

    let _ = active;
}
