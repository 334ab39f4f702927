/// Metrics and telemetry
///
/// Provides Prometheus-compatible metrics for monitoring:
/// - OTP issuance and verification outcomes
/// - SMS dispatch results
/// - QR issuance and scan outcomes
/// - Approval decisions
/// - Background job execution and internal errors

use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, Encoder,
    HistogramVec, IntCounter, IntCounterVec, TextEncoder,
};

lazy_static! {
    // ========== OTP Metrics ==========

    /// One-time codes issued
    pub static ref OTP_ISSUED_TOTAL: IntCounter = register_int_counter!(
        "otp_issued_total",
        "Total number of one-time codes issued"
    )
    .unwrap();

    /// Verification attempts by outcome
    pub static ref OTP_VERIFICATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "otp_verifications_total",
        "Total number of OTP verification attempts",
        &["outcome"]
    )
    .unwrap();

    // ========== Notification Metrics ==========

    /// SMS dispatch attempts by status
    pub static ref SMS_DISPATCH_TOTAL: IntCounterVec = register_int_counter_vec!(
        "sms_dispatch_total",
        "Total number of SMS dispatch attempts",
        &["status"]
    )
    .unwrap();

    // ========== QR Metrics ==========

    /// QR credentials issued
    pub static ref QR_ISSUED_TOTAL: IntCounter = register_int_counter!(
        "qr_issued_total",
        "Total number of QR credentials issued"
    )
    .unwrap();

    /// QR scans by outcome
    pub static ref QR_SCANS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "qr_scans_total",
        "Total number of QR scans",
        &["outcome"]
    )
    .unwrap();

    // ========== Workflow Metrics ==========

    /// Approval decisions by resulting status
    pub static ref APPROVAL_DECISIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "approval_decisions_total",
        "Total number of approval decisions",
        &["status"]
    )
    .unwrap();

    // ========== Background Job Metrics ==========

    /// Background job executions by job type and status
    pub static ref BACKGROUND_JOBS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "background_jobs_total",
        "Total number of background job executions",
        &["job_type", "status"]
    )
    .unwrap();

    /// Background job duration in seconds
    pub static ref BACKGROUND_JOB_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "background_job_duration_seconds",
        "Background job execution time in seconds",
        &["job_type"],
        vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0]
    )
    .unwrap();

    // ========== Error Metrics ==========

    /// Internal errors surfaced to clients, by error code
    pub static ref ERRORS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "errors_total",
        "Total number of internal errors returned to clients",
        &["error_type"]
    )
    .unwrap();
}

/// Render all metrics in Prometheus text format
pub fn render_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

pub fn record_otp_issued() {
    OTP_ISSUED_TOTAL.inc();
}

pub fn record_otp_verification(outcome: &str) {
    OTP_VERIFICATIONS_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn record_sms_dispatch(status: &str) {
    SMS_DISPATCH_TOTAL.with_label_values(&[status]).inc();
}

pub fn record_qr_issued() {
    QR_ISSUED_TOTAL.inc();
}

pub fn record_qr_scan(outcome: &str) {
    QR_SCANS_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn record_approval_decision(status: &str) {
    APPROVAL_DECISIONS_TOTAL.with_label_values(&[status]).inc();
}

pub fn record_background_job(job_type: &str, status: &str, duration: f64) {
    BACKGROUND_JOBS_TOTAL
        .with_label_values(&[job_type, status])
        .inc();
    BACKGROUND_JOB_DURATION_SECONDS
        .with_label_values(&[job_type])
        .observe(duration);
}

pub fn record_error(error_type: &str) {
    ERRORS_TOTAL.with_label_values(&[error_type]).inc();
}
