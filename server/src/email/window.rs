use chrono::{DateTime, Duration, Utc};

use super::message::Message;

pub const DEFAULT_WINDOW_DAYS: i64 = 7;

/// Keep messages dated within the trailing `window_days` ending at `now`.
///
/// The relevant timestamp is the sent time when present, else the received time.
/// Messages without either, or whose relevant timestamp does not parse, are dropped.
pub fn filter_recent(messages: Vec<Message>, window_days: i64, now: DateTime<Utc>) -> Vec<Message> {
    let cutoff = now - Duration::days(window_days);
    let total = messages.len();
    let mut undated = 0usize;

    let retained = messages
        .into_iter()
        .filter(|msg| match msg.timestamp() {
            Some(ts) => ts >= cutoff,
            None => {
                undated += 1;
                false
            }
        })
        .collect::<Vec<_>>();

    tracing::debug!(
        "Window filter kept {} of {} messages since {} ({} undated or unparseable)",
        retained.len(),
        total,
        cutoff,
        undated
    );

    retained
}
