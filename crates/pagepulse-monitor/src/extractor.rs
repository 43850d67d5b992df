//! Metric extraction.
//!
//! Pure functions that derive durations from a timing snapshot and write them
//! into a bucket. A metric is only computed when all of its inputs are present
//! and positive; otherwise its slot stays unset. Differences are never
//! clamped, so clock skew shows up as a negative value.

use pagepulse_core::models::entry::{positive, TimingSnapshot};
use pagepulse_core::models::timing::{MetricKey, TimingBucket};
use tracing::{debug, info};

/// Decimal places of a normalized value
pub const DEFAULT_PRECISION: usize = 3;

/// ms → s
pub const DEFAULT_DIVISOR: f64 = 1000.0;

/// Normalizes a millisecond duration to seconds with three decimals.
///
/// `0` and NaN yield `"0"`.
pub fn handle_fixed(value: f64) -> String {
    handle_fixed_with(value, DEFAULT_PRECISION, DEFAULT_DIVISOR)
}

pub fn handle_fixed_with(value: f64, precision: usize, divisor: f64) -> String {
    if value == 0.0 || value.is_nan() {
        return "0".to_string();
    }
    format!("{:.*}", precision, value / divisor)
}

fn record(bucket: &mut TimingBucket, key: MetricKey, value: f64) -> bool {
    bucket.record(key, handle_fixed(value))
}

fn span(end: Option<f64>, start: Option<f64>) -> Option<f64> {
    Some(positive(end)? - positive(start)?)
}

/// Time since navigation start. Navigation entries start at 0, so a zero
/// start is valid here.
fn since_start(value: Option<f64>, navigation_start: Option<f64>) -> Option<f64> {
    let start = navigation_start.filter(|v| !v.is_nan())?;
    Some(positive(value)? - start)
}

/// Pass 1, network phases: redirect, DNS, TLS, TCP.
///
/// Returns the number of slots written.
pub fn network_pass(bucket: &mut TimingBucket, t: &TimingSnapshot) -> usize {
    let mut written = 0;

    if let Some(v) = span(t.redirect_end, t.redirect_start) {
        written += record(bucket, MetricKey::RedirectTime, v) as usize;
    }
    if let Some(v) = span(t.domain_lookup_end, t.domain_lookup_start) {
        written += record(bucket, MetricKey::DnsTime, v) as usize;
    }
    if let Some(v) = span(t.connect_end, t.secure_connection_start) {
        written += record(bucket, MetricKey::TlsTime, v) as usize;
    }
    if let Some(v) = span(t.connect_end, t.connect_start) {
        written += record(bucket, MetricKey::TcpTime, v) as usize;
    }

    written
}

/// Pass 2, after the document was parsed: request, white screen, DOM
/// structure, DOMContentLoaded.
pub fn document_pass(bucket: &mut TimingBucket, t: &TimingSnapshot) -> usize {
    let mut written = 0;

    if let Some(v) = span(t.fetch_start, t.worker_start) {
        written += record(bucket, MetricKey::ServiceWorkerTime, v) as usize;
    }
    if let Some(v) = span(t.response_end, t.request_start) {
        written += record(bucket, MetricKey::HttpTime, v) as usize;
    }
    if let Some(v) = since_start(t.response_start, t.navigation_start) {
        written += record(bucket, MetricKey::FirstPaintWhiteScreen, v) as usize;
    }
    if let Some(v) = since_start(t.dom_interactive, t.navigation_start) {
        written += record(bucket, MetricKey::DomParseWhiteScreen, v) as usize;
    }
    if let Some(v) = span(t.dom_interactive, t.dom_loading) {
        written += record(bucket, MetricKey::DomStructureTime, v) as usize;
    }
    if let Some(v) = since_start(t.dom_content_loaded_event_end, t.navigation_start) {
        written += record(bucket, MetricKey::DomContentLoadedTime, v) as usize;
    }

    written
}

/// Pass 3, after the full load: document complete, full load.
pub fn load_pass(bucket: &mut TimingBucket, t: &TimingSnapshot) -> usize {
    let mut written = 0;

    if let Some(v) = span(t.dom_complete, t.dom_loading) {
        written += record(bucket, MetricKey::DocumentCompleteTime, v) as usize;
    }
    if let Some(v) = since_start(t.load_event_end, t.navigation_start) {
        written += record(bucket, MetricKey::FullLoadTime, v) as usize;
    }

    written
}

/// Logs every slot of a bucket; `verbose` lifts it from debug to info.
pub fn dump_bucket(bucket: &TimingBucket, verbose: bool) {
    for (key, entry) in bucket.iter() {
        let time = entry.time.as_deref().unwrap_or("null");
        if verbose {
            info!(source = ?bucket.source(), metric = %key, "{}: {}", entry.label, time);
        } else {
            debug!(source = ?bucket.source(), metric = %key, "{}: {}", entry.label, time);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pagepulse_core::models::timing::TimingSource;

    fn full_snapshot() -> TimingSnapshot {
        TimingSnapshot {
            navigation_start: Some(0.0),
            domain_lookup_start: Some(10.0),
            domain_lookup_end: Some(40.0),
            connect_start: Some(40.0),
            connect_end: Some(60.0),
            request_start: Some(60.0),
            response_start: Some(90.0),
            response_end: Some(120.0),
            dom_interactive: Some(150.0),
            dom_content_loaded_event_end: Some(160.0),
            dom_complete: Some(300.0),
            load_event_end: Some(310.0),
            ..Default::default()
        }
    }

    #[test]
    fn handle_fixed_defaults() {
        assert_eq!(handle_fixed(3000.0), "3.000");
        assert_eq!(handle_fixed(30.0), "0.030");
        assert_eq!(handle_fixed(0.0), "0");
        assert_eq!(handle_fixed(f64::NAN), "0");
    }

    #[test]
    fn handle_fixed_custom_precision_and_divisor() {
        assert_eq!(handle_fixed_with(1234.5, 1, 1.0), "1234.5");
        assert_eq!(handle_fixed_with(1500.0, 2, 1000.0), "1.50");
    }

    #[test]
    fn negative_durations_are_kept() {
        let mut bucket = TimingBucket::new(TimingSource::Legacy);
        let t = TimingSnapshot {
            domain_lookup_start: Some(50.0),
            domain_lookup_end: Some(40.0),
            ..Default::default()
        };
        network_pass(&mut bucket, &t);
        assert_eq!(bucket.time(MetricKey::DnsTime), Some("-0.010"));
    }

    #[test]
    fn missing_inputs_leave_slots_unset() {
        let mut bucket = TimingBucket::new(TimingSource::Navigation);
        let empty = TimingSnapshot::default();

        assert_eq!(network_pass(&mut bucket, &empty), 0);
        assert_eq!(document_pass(&mut bucket, &empty), 0);
        assert_eq!(load_pass(&mut bucket, &empty), 0);
        assert_eq!(bucket.populated(), 0);
    }

    #[test]
    fn tls_needs_secure_connection_start() {
        let mut bucket = TimingBucket::new(TimingSource::Legacy);
        let mut t = full_snapshot();
        t.secure_connection_start = Some(0.0);
        network_pass(&mut bucket, &t);
        assert_eq!(bucket.time(MetricKey::TlsTime), None);

        let mut bucket = TimingBucket::new(TimingSource::Legacy);
        t.secure_connection_start = Some(45.0);
        network_pass(&mut bucket, &t);
        assert_eq!(bucket.time(MetricKey::TlsTime), Some("0.015"));
    }

    #[test]
    fn three_passes_over_a_full_page_load() {
        let mut bucket = TimingBucket::new(TimingSource::Legacy);
        let t = full_snapshot();

        assert_eq!(network_pass(&mut bucket, &t), 2);
        document_pass(&mut bucket, &t);
        load_pass(&mut bucket, &t);

        assert_eq!(bucket.time(MetricKey::DnsTime), Some("0.030"));
        assert_eq!(bucket.time(MetricKey::TcpTime), Some("0.020"));
        assert_eq!(bucket.time(MetricKey::HttpTime), Some("0.060"));
        assert_eq!(bucket.time(MetricKey::FirstPaintWhiteScreen), Some("0.090"));
        assert_eq!(bucket.time(MetricKey::DomParseWhiteScreen), Some("0.150"));
        assert_eq!(bucket.time(MetricKey::DomContentLoadedTime), Some("0.160"));
        assert_eq!(bucket.time(MetricKey::FullLoadTime), Some("0.310"));
        // no domLoading in the snapshot
        assert_eq!(bucket.time(MetricKey::DomStructureTime), None);
        assert_eq!(bucket.time(MetricKey::DocumentCompleteTime), None);
        assert_eq!(bucket.time(MetricKey::RedirectTime), None);
    }

    #[test]
    fn start_relative_metrics_need_navigation_start() {
        let epoch = 1_718_000_000_000.0;
        let t = TimingSnapshot {
            request_start: Some(epoch + 60.0),
            response_start: Some(epoch + 90.0),
            response_end: Some(epoch + 120.0),
            dom_interactive: Some(epoch + 150.0),
            dom_content_loaded_event_end: Some(epoch + 160.0),
            load_event_end: Some(epoch + 310.0),
            ..Default::default()
        };

        let mut bucket = TimingBucket::new(TimingSource::Legacy);
        document_pass(&mut bucket, &t);
        load_pass(&mut bucket, &t);
        assert_eq!(bucket.time(MetricKey::HttpTime), Some("0.060"));
        assert_eq!(bucket.time(MetricKey::FirstPaintWhiteScreen), None);
        assert_eq!(bucket.time(MetricKey::DomParseWhiteScreen), None);
        assert_eq!(bucket.time(MetricKey::DomContentLoadedTime), None);
        assert_eq!(bucket.time(MetricKey::FullLoadTime), None);

        let mut bucket = TimingBucket::new(TimingSource::Legacy);
        let nan_start = TimingSnapshot {
            navigation_start: Some(f64::NAN),
            ..t
        };
        load_pass(&mut bucket, &nan_start);
        assert_eq!(bucket.time(MetricKey::FullLoadTime), None);

        let mut bucket = TimingBucket::new(TimingSource::Legacy);
        let with_start = TimingSnapshot {
            navigation_start: Some(epoch),
            ..t
        };
        load_pass(&mut bucket, &with_start);
        assert_eq!(bucket.time(MetricKey::FullLoadTime), Some("0.310"));
    }

    #[test]
    fn passes_do_not_overwrite() {
        let mut bucket = TimingBucket::new(TimingSource::Legacy);
        let mut t = full_snapshot();
        network_pass(&mut bucket, &t);

        t.domain_lookup_end = Some(500.0);
        assert_eq!(network_pass(&mut bucket, &t), 0);
        assert_eq!(bucket.time(MetricKey::DnsTime), Some("0.030"));
    }
}
