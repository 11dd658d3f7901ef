//! Debounced departures for flaky transports.
//!
//! Some transports report users vanishing and reappearing in quick
//! succession (a bouncing connection, a client rejoining after a hiccup).
//! Mirroring every flap across the bus would thrash puppet identities on
//! every other transport, so a departure is only emitted once the user has
//! stayed gone for a configured timeout; a reappearance before the deadline
//! cancels the pending leave.
//!
//! The pending table is shared between a transport's worker (which marks and
//! cancels) and the sweeper task (which drains), so it is a concurrent map
//! rather than dispatcher-owned state.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::DebounceConfig;
use crate::event::{EntityId, EventPayload};
use crate::manager::ManagerHandle;
use crate::target;

/// A per-(user, channel) pending-departure table.
pub struct LeaveDebouncer {
    pending: DashMap<(EntityId, EntityId), Instant>,
    timeout: Duration,
    sweep_interval: Duration,
}

impl LeaveDebouncer {
    pub fn new(config: &DebounceConfig) -> Self {
        Self::with_timeouts(
            Duration::from_secs(config.timeout_secs),
            Duration::from_secs(config.sweep_interval_secs),
        )
    }

    pub fn with_timeouts(timeout: Duration, sweep_interval: Duration) -> Self {
        Self {
            pending: DashMap::new(),
            timeout,
            sweep_interval,
        }
    }

    /// Records that `user` vanished from `channel`. An already-pending
    /// departure keeps its original deadline.
    pub fn mark(&self, user: EntityId, channel: EntityId) {
        self.pending.entry((user, channel)).or_insert_with(Instant::now);
    }

    /// Cancels a pending departure; returns whether one was pending.
    pub fn cancel(&self, user: EntityId, channel: EntityId) -> bool {
        self.pending.remove(&(user, channel)).is_some()
    }

    /// Removes and returns every (user, channel) whose deadline has passed.
    pub fn drain_expired(&self, now: Instant) -> Vec<(EntityId, EntityId)> {
        let mut expired = Vec::new();
        self.pending.retain(|key, vanished_at| {
            if now.saturating_duration_since(*vanished_at) >= self.timeout {
                expired.push(*key);
                false
            } else {
                true
            }
        });
        expired
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Spawns the housekeeping task: every sweep interval, expired entries
    /// are drained and a `user_leave` sourced from `bridge` is enqueued for
    /// each. The task exits when the manager's queue closes.
    pub fn spawn_sweeper(self: Arc<Self>, manager: ManagerHandle, bridge: EntityId) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(self.sweep_interval);
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = tick.tick() => {
                        for (user_id, channel_id) in self.drain_expired(Instant::now()) {
                            tracing::debug!(user = %user_id, channel = %channel_id, "departure timed out");
                            manager.send(
                                bridge,
                                target::MANAGER,
                                EventPayload::UserLeave { channel_id, user_id },
                            );
                        }
                    }
                    _ = manager.closed() => {
                        tracing::debug!("departure sweeper exiting, manager queue closed");
                        break;
                    }
                }
            }
        })
    }
}
