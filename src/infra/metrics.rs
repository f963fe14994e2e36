//! Lock-free pipeline counters and periodic reporting
//!
//! Uses atomics so handlers and barrier tasks can record without a lock.
//!
//! NOTE: All atomics use Relaxed ordering: these are statistical
//! counters only. Do NOT use these atomics for coordination or logic decisions.

use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// Lock-free metrics collector
#[derive(Default)]
pub struct Metrics {
    messages_received: AtomicU64,
    messages_malformed: AtomicU64,
    messages_unroutable: AtomicU64,
    messages_dropped: AtomicU64,
    rest_calls: AtomicU64,
    rest_not_found: AtomicU64,
    rest_transport_failures: AtomicU64,
    spots_created: AtomicU64,
    announcements_published: AtomicU64,
    barrier_sequences_started: AtomicU64,
    barrier_sequences_completed: AtomicU64,
    barrier_commands_ignored: AtomicU64,
    open_commands_published: AtomicU64,
    entries_denied: AtomicU64,
}

/// Point-in-time copy of all counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSummary {
    pub messages_received: u64,
    pub messages_malformed: u64,
    pub messages_unroutable: u64,
    pub messages_dropped: u64,
    pub rest_calls: u64,
    pub rest_not_found: u64,
    pub rest_transport_failures: u64,
    pub spots_created: u64,
    pub announcements_published: u64,
    pub barrier_sequences_started: u64,
    pub barrier_sequences_completed: u64,
    pub barrier_commands_ignored: u64,
    pub open_commands_published: u64,
    pub entries_denied: u64,
}

impl MetricsSummary {
    pub fn log(&self) {
        info!(
            received = %self.messages_received,
            malformed = %self.messages_malformed,
            unroutable = %self.messages_unroutable,
            dropped = %self.messages_dropped,
            rest_calls = %self.rest_calls,
            rest_not_found = %self.rest_not_found,
            rest_failures = %self.rest_transport_failures,
            spots_created = %self.spots_created,
            announcements = %self.announcements_published,
            barrier_started = %self.barrier_sequences_started,
            barrier_completed = %self.barrier_sequences_completed,
            barrier_ignored = %self.barrier_commands_ignored,
            open_cmds = %self.open_commands_published,
            entries_denied = %self.entries_denied,
            "metrics_summary"
        );
    }
}

macro_rules! counter {
    ($record:ident, $field:ident) => {
        #[inline]
        pub fn $record(&self) {
            self.$field.fetch_add(1, Ordering::Relaxed);
        }
    };
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    counter!(record_message_received, messages_received);
    counter!(record_message_malformed, messages_malformed);
    counter!(record_message_unroutable, messages_unroutable);
    counter!(record_message_dropped, messages_dropped);
    counter!(record_rest_call, rest_calls);
    counter!(record_rest_not_found, rest_not_found);
    counter!(record_rest_transport_failure, rest_transport_failures);
    counter!(record_spot_created, spots_created);
    counter!(record_announcement, announcements_published);
    counter!(record_barrier_started, barrier_sequences_started);
    counter!(record_barrier_completed, barrier_sequences_completed);
    counter!(record_barrier_ignored, barrier_commands_ignored);
    counter!(record_open_command, open_commands_published);
    counter!(record_entry_denied, entries_denied);

    /// Read all counters (monotonic, never reset)
    pub fn report(&self) -> MetricsSummary {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        MetricsSummary {
            messages_received: load(&self.messages_received),
            messages_malformed: load(&self.messages_malformed),
            messages_unroutable: load(&self.messages_unroutable),
            messages_dropped: load(&self.messages_dropped),
            rest_calls: load(&self.rest_calls),
            rest_not_found: load(&self.rest_not_found),
            rest_transport_failures: load(&self.rest_transport_failures),
            spots_created: load(&self.spots_created),
            announcements_published: load(&self.announcements_published),
            barrier_sequences_started: load(&self.barrier_sequences_started),
            barrier_sequences_completed: load(&self.barrier_sequences_completed),
            barrier_commands_ignored: load(&self.barrier_commands_ignored),
            open_commands_published: load(&self.open_commands_published),
            entries_denied: load(&self.entries_denied),
        }
    }
}
