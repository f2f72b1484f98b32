#![cfg(feature = "metrics")]

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge,
};

lazy_static! {
    pub static ref ACTIVE_SESSIONS: IntGauge = register_int_gauge!(
        "vpnhub_active_sessions",
        "Number of currently live tunnel sessions"
    )
    .expect("register vpnhub_active_sessions gauge");
    pub static ref TOTAL_SESSIONS: IntCounter = register_int_counter!(
        "vpnhub_sessions_total",
        "Total number of admitted sessions since start"
    )
    .expect("register vpnhub_sessions_total counter");
    pub static ref REJECTED_ADMISSIONS: IntCounterVec = register_int_counter_vec!(
        "vpnhub_admissions_rejected_total",
        "Total number of rejected admission attempts by reason",
        &["reason"]
    )
    .expect("register vpnhub_admissions_rejected_total counter_vec");
    pub static ref SUPPRESSED_SESSIONS: IntCounterVec = register_int_counter_vec!(
        "vpnhub_sessions_suppressed_total",
        "Total number of sessions suppressed, by cause",
        &["cause"]
    )
    .expect("register vpnhub_sessions_suppressed_total counter_vec");
    pub static ref REAPED_SESSIONS: IntCounter = register_int_counter!(
        "vpnhub_sessions_reaped_total",
        "Total number of disposed sessions removed by the reaper"
    )
    .expect("register vpnhub_sessions_reaped_total counter");
    pub static ref SESSION_DURATION: Histogram = register_histogram!(HistogramOpts::new(
        "vpnhub_session_duration_seconds",
        "Observed tunnel session duration in seconds"
    )
    .buckets(vec![
        0.5, 1.0, 5.0, 15.0, 60.0, 300.0, 900.0, 1800.0, 3600.0, 7200.0
    ]))
    .expect("register vpnhub_session_duration_seconds histogram");
}

pub fn record_session_start() {
    ACTIVE_SESSIONS.inc();
    TOTAL_SESSIONS.inc();
}

pub fn record_session_close(duration_secs: Option<i64>) {
    ACTIVE_SESSIONS.dec();
    if let Some(duration) = duration_secs {
        SESSION_DURATION.observe(duration.max(0) as f64);
    }
}

pub fn record_rejected_admission(reason: &'static str) {
    REJECTED_ADMISSIONS.with_label_values(&[reason]).inc();
}

pub fn record_suppression(cause: &'static str) {
    SUPPRESSED_SESSIONS.with_label_values(&[cause]).inc();
}

pub fn record_reaped(count: u64) {
    if count > 0 {
        REAPED_SESSIONS.inc_by(count);
    }
}
