//! Envelope fan-out
//!
//! Named-channel listeners run first, then wildcard listeners, each group in
//! registration order. A panicking listener is logged and skipped.
//!
//! An envelope whose `type` is itself `*` reaches wildcard listeners twice:
//! once with `data` as its direct channel, once whole.

use super::registry::{Listener, SubscriptionRegistry};
use crate::protocol::{Channel, Envelope};
use parking_lot::Mutex;
use serde_json::Value;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

/// Outcome of delivering one envelope
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Listeners that returned normally
    pub delivered: usize,
    /// Listeners that panicked
    pub failed: usize,
}

impl DeliveryReport {
    #[must_use]
    pub fn total(&self) -> usize {
        self.delivered + self.failed
    }
}

/// Deliver an envelope to every matching listener
///
/// The registry lock is released before any listener runs, so listeners may
/// subscribe or unsubscribe from inside the callback.
pub fn dispatch(registry: &Mutex<SubscriptionRegistry>, envelope: &Envelope) -> DeliveryReport {
    let (direct, wildcard) = {
        let registry = registry.lock();
        (
            registry.listeners(&Channel::parse(&envelope.event_type)),
            registry.listeners(&Channel::Wildcard),
        )
    };

    let mut report = DeliveryReport::default();

    for listener in &direct {
        record(&mut report, invoke(listener, &envelope.data, &envelope.event_type));
    }

    if !wildcard.is_empty() {
        let whole = envelope.to_value();
        for listener in &wildcard {
            record(&mut report, invoke(listener, &whole, &envelope.event_type));
        }
    }

    tracing::trace!(
        event_type = %envelope.event_type,
        delivered = report.delivered,
        failed = report.failed,
        "Envelope dispatched"
    );

    report
}

fn record(report: &mut DeliveryReport, ok: bool) {
    if ok {
        report.delivered += 1;
    } else {
        report.failed += 1;
    }
}

fn invoke(listener: &Listener, value: &Value, event_type: &str) -> bool {
    match panic::catch_unwind(AssertUnwindSafe(|| listener(value))) {
        Ok(()) => true,
        Err(payload) => {
            tracing::error!(
                event_type = %event_type,
                panic = %panic_message(payload.as_ref()),
                "Listener panicked"
            );
            false
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
