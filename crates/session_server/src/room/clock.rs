//! Per-room clock scheduler.
//!
//! Each running room owns exactly one scheduler task, spawned on game start
//! and cancelled through [`Room::stop_clock`] on every path out of the
//! running state. The task wakes once per second, applies a tick under the
//! room lock, and broadcasts the resulting snapshot, so every member sees
//! the same authoritative countdown.

use super::{registry::RoomHandle, RoomCode, TickOutcome};
use crate::broadcast::Broadcaster;
use crate::messaging::ServerEvent;
use crate::room::EndReason;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{info, warn};

const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Spawns the scheduler task for a room that just entered the running state.
///
/// The returned handle must be stored via [`Room::set_clock_handle`] so the
/// room can cancel it. The first tick fires one full period after spawn,
/// never immediately.
pub(crate) fn spawn(code: RoomCode, room: RoomHandle, broadcaster: Broadcaster) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + TICK_PERIOD, TICK_PERIOD);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let mut room = room.lock().await;
            match room.tick() {
                TickOutcome::Idle => {
                    // The room left the running state between our wakeup and
                    // the lock; the abort is already in flight.
                    break;
                }
                TickOutcome::Running => {
                    if let Err(e) = broadcaster.room_state(&room).await {
                        warn!("Tick broadcast failed for room {}: {}", code, e);
                    }
                }
                TickOutcome::Expired(loser) => {
                    info!("⏰ Room {}: {} ran out of time", code, loser);
                    let game_over = ServerEvent::GameOver {
                        reason: EndReason::Timeout(loser).to_string(),
                    };
                    if let Err(e) = broadcaster.send_many(&room.members(), &game_over).await {
                        warn!("Game-over broadcast failed for room {}: {}", code, e);
                    }
                    if let Err(e) = broadcaster.room_state(&room).await {
                        warn!("Final broadcast failed for room {}: {}", code, e);
                    }
                    break;
                }
            }
        }
    })
}
