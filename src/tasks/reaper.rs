//! Expiry Reaper Task
//!
//! Background task that sleeps until the soonest entry is due, removes every
//! expired entry, and re-arms against the new soonest deadline. The schedule
//! is published through a `watch` channel, so a write that changes the
//! soonest deadline wakes the reaper and it never fires on a stale timer.

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, info, trace};

use crate::cache::expires_at;

// == Schedule ==
/// What the reaper should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// Nothing stored: wake after the idle re-arm period and re-check
    Idle,
    /// Wake at the soonest expiration
    At(Instant),
    /// Terminal: exit without reaping again
    Stopped,
}

impl Schedule {
    /// Builds the schedule for a store whose soonest expiration is `deadline`.
    pub fn from_deadline(deadline: Option<Instant>) -> Self {
        deadline.map_or(Schedule::Idle, Schedule::At)
    }
}

// == Reap ==
/// The state the reaper removes expired entries from.
pub trait Reap: Send + Sync + 'static {
    /// Removes every entry that is due now and publishes the next schedule.
    ///
    /// Returns the number of entries removed.
    fn reap_expired(&self) -> usize;
}

/// Spawns the reaper onto `runtime`.
///
/// # Arguments
/// * `runtime` - Runtime the task is spawned on
/// * `target` - State to reap
/// * `schedule` - Receiver for schedule updates
/// * `idle_rearm` - Sleep period used while the schedule is `Idle`
///
/// # Returns
/// A JoinHandle for the spawned task. The task exits only once
/// `Schedule::Stopped` is published. When `target` owns the schedule sender,
/// as the cache does, the sender outlives the task, so the owner must publish
/// `Stopped` on close and on drop.
pub fn spawn_reaper<R: Reap>(
    runtime: &Handle,
    target: Arc<R>,
    schedule: watch::Receiver<Schedule>,
    idle_rearm: Duration,
) -> JoinHandle<()> {
    runtime.spawn(reaper_loop(target, schedule, idle_rearm))
}

async fn reaper_loop<R: Reap>(
    target: Arc<R>,
    mut schedule: watch::Receiver<Schedule>,
    idle_rearm: Duration,
) {
    info!(
        "Starting expiry reaper with idle period of {} seconds",
        idle_rearm.as_secs()
    );

    loop {
        let current = *schedule.borrow_and_update();
        let deadline = match current {
            Schedule::Stopped => break,
            Schedule::Idle => expires_at(Instant::now(), idle_rearm),
            Schedule::At(at) => at,
        };

        tokio::select! {
            () = time::sleep_until(deadline) => {
                let removed = target.reap_expired();
                if removed > 0 {
                    debug!(removed, "Reaped expired entries");
                } else {
                    trace!(?current, "Reaper woke with nothing due");
                }
            }
            changed = schedule.changed() => {
                // Unreachable while `target` owns the sender.
                if changed.is_err() {
                    debug!("Schedule sender dropped");
                    break;
                }
            }
        }
    }

    info!("Expiry reaper stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts reaps and publishes `Idle` afterwards, like an emptied store.
    struct CountingTarget {
        reaps: AtomicUsize,
        schedule: watch::Sender<Schedule>,
    }

    impl Reap for CountingTarget {
        fn reap_expired(&self) -> usize {
            self.reaps.fetch_add(1, Ordering::SeqCst);
            self.schedule.send_replace(Schedule::Idle);
            1
        }
    }

    fn start(initial: Schedule, idle: Duration) -> (Arc<CountingTarget>, JoinHandle<()>) {
        let (tx, rx) = watch::channel(initial);
        let target = Arc::new(CountingTarget {
            reaps: AtomicUsize::new(0),
            schedule: tx,
        });
        let handle = spawn_reaper(&Handle::current(), Arc::clone(&target), rx, idle);
        (target, handle)
    }

    fn reaps(target: &CountingTarget) -> usize {
        target.reaps.load(Ordering::SeqCst)
    }

    #[test]
    fn test_schedule_from_deadline() {
        let now = Instant::now();
        assert_eq!(Schedule::from_deadline(None), Schedule::Idle);
        assert_eq!(Schedule::from_deadline(Some(now)), Schedule::At(now));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reaper_fires_at_deadline() {
        let deadline = Instant::now() + Duration::from_millis(100);
        let (target, handle) = start(Schedule::At(deadline), Duration::from_secs(3600));

        time::sleep(Duration::from_millis(50)).await;
        assert_eq!(reaps(&target), 0, "Reaper must not fire before the deadline");

        time::sleep(Duration::from_millis(100)).await;
        assert_eq!(reaps(&target), 1);

        target.schedule.send_replace(Schedule::Stopped);
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_reaper_rearms_on_earlier_deadline() {
        let far = Instant::now() + Duration::from_secs(60);
        let (target, handle) = start(Schedule::At(far), Duration::from_secs(3600));

        time::sleep(Duration::from_millis(1)).await;
        let near = Instant::now() + Duration::from_millis(10);
        target.schedule.send_replace(Schedule::At(near));

        time::sleep(Duration::from_millis(20)).await;
        assert_eq!(reaps(&target), 1, "Reaper should follow the fresher deadline");

        target.schedule.send_replace(Schedule::Stopped);
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_reaper_idle_wakeup() {
        let (target, handle) = start(Schedule::Idle, Duration::from_secs(1));

        time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(reaps(&target), 1);

        target.schedule.send_replace(Schedule::Stopped);
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_reaper_stops() {
        let deadline = Instant::now() + Duration::from_millis(100);
        let (target, handle) = start(Schedule::At(deadline), Duration::from_secs(3600));

        target.schedule.send_replace(Schedule::Stopped);
        handle.await.unwrap();

        time::sleep(Duration::from_millis(200)).await;
        assert_eq!(reaps(&target), 0, "No reaping may happen after stop");
    }
}
