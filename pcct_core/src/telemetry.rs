//! Minimal run‑time metrics sink.
//!
//! Prometheus export is intentionally left out; instead the host process
//! registers a raw callback that receives name/value pairs. The recorder is
//! installed only once a callback exists, so a Rust host remains free to
//! install its own.

use metrics::{Counter, Gauge, Histogram, Key, KeyName, Recorder, SharedString, Unit};
use once_cell::sync::OnceCell;
use std::ffi::CString;
use std::os::raw::{c_char, c_ulonglong};
use std::sync::Arc;

/// Signature for external collectors.
pub type StatsCallback = unsafe extern "C" fn(name: *const c_char, value: c_ulonglong);

static CALLBACK: OnceCell<StatsCallback> = OnceCell::new();

/// Register a callback from C/other languages. Only the first call counts.
///
/// # Safety
/// `cb` must stay callable for the life of the process and tolerate calls
/// from any thread.
#[no_mangle]
pub unsafe extern "C" fn pcct_register_stats_callback(cb: StatsCallback) {
    if CALLBACK.set(cb).is_ok() {
        init();
    }
}

/// Forwarding recorder. Uses the callback **if** it was registered.
struct FfiRecorder;

/// Metric name as a C string, built once at registration.
#[derive(Clone)]
struct FfiMetric {
    name: Arc<CString>,
}

impl FfiMetric {
    fn new(key: &Key) -> Self {
        let name = CString::new(key.name().replace('\0', "_")).unwrap_or_default();
        Self {
            name: Arc::new(name),
        }
    }

    fn emit(&self, value: u64) {
        if let Some(cb) = CALLBACK.get() {
            unsafe { cb(self.name.as_ptr(), value as c_ulonglong) };
        }
    }
}

impl Recorder for FfiRecorder {
    fn describe_counter(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {
        // No-op for FFI
    }
    fn describe_gauge(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {
        // No-op for FFI
    }
    fn describe_histogram(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {
        // No-op for FFI
    }

    fn register_counter(&self, key: &Key, _metadata: &metrics::Metadata<'_>) -> Counter {
        Counter::from_arc(Arc::new(FfiMetric::new(key)))
    }
    fn register_gauge(&self, key: &Key, _metadata: &metrics::Metadata<'_>) -> Gauge {
        Gauge::from_arc(Arc::new(FfiMetric::new(key)))
    }
    fn register_histogram(&self, key: &Key, _metadata: &metrics::Metadata<'_>) -> Histogram {
        Histogram::from_arc(Arc::new(FfiMetric::new(key)))
    }
}

impl metrics::CounterFn for FfiMetric {
    fn increment(&self, value: u64) {
        self.emit(value);
    }
    fn absolute(&self, value: u64) {
        self.emit(value);
    }
}

// Gauges and histograms are truncated to integers on the way out.
impl metrics::GaugeFn for FfiMetric {
    fn set(&self, value: f64) {
        self.emit(value as u64);
    }
    fn increment(&self, value: f64) {
        self.emit(value as u64);
    }
    fn decrement(&self, value: f64) {
        self.emit(value as u64);
    }
}

impl metrics::HistogramFn for FfiMetric {
    fn record(&self, value: f64) {
        self.emit(value as u64);
    }
}

/// Install exactly **once**.
pub fn init() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        if metrics::set_global_recorder(FfiRecorder).is_err() {
            log::warn!("[TELEMETRY] another metrics recorder is already installed");
        }
    });
}
