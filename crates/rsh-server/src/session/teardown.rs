//! Exactly-once session teardown

use std::sync::{Mutex, OnceLock};

use portable_pty::ChildKiller;
use tokio_util::sync::CancellationToken;

use super::SessionEnd;

/// Shared end-of-session signal for one interactive session.
///
/// `trigger` may be called from any task or thread, any number of times.
/// The first call records the reason and cancels the session token; later
/// calls change nothing. `release` kills the shell at most once, and
/// never after the shell has been reaped.
pub struct Teardown {
    token: CancellationToken,
    reason: OnceLock<SessionEnd>,
    killer: Mutex<Option<Box<dyn ChildKiller + Send + Sync>>>,
}

impl Teardown {
    /// Create a teardown guarding `killer`, cancelled through `token`
    pub fn new(token: CancellationToken, killer: Box<dyn ChildKiller + Send + Sync>) -> Self {
        Self {
            token,
            reason: OnceLock::new(),
            killer: Mutex::new(Some(killer)),
        }
    }

    /// Record `reason` if no reason is set yet, and cancel the session.
    ///
    /// Returns true for the call that set the reason.
    pub fn trigger(&self, reason: SessionEnd) -> bool {
        let first = self.reason.set(reason).is_ok();
        self.token.cancel();
        first
    }

    /// Record that the shell was reaped with `code`.
    ///
    /// Disarms the killer first: once reaped, the pid may belong to an
    /// unrelated process.
    pub fn process_exited(&self, code: Option<u32>) -> bool {
        drop(self.take_killer());
        self.trigger(SessionEnd::ProcessExited(code))
    }

    /// Whether output already read from the PTY should still be delivered.
    ///
    /// True when the shell side ended on its own; a session torn down by the
    /// peer, an error, idle timeout or shutdown drops it.
    pub fn drains_output(&self) -> bool {
        matches!(
            self.reason.get(),
            Some(SessionEnd::ProcessExited(_)) | Some(SessionEnd::PtyClosed)
        )
    }

    /// Whether the session has been cancelled, by a trigger or by shutdown
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Wait until the session is cancelled
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// Kill the shell if it has not been killed or reaped yet.
    ///
    /// Returns true for the call that performed the kill.
    pub fn release(&self) -> bool {
        let killer = self.take_killer();
        if matches!(self.reason.get(), Some(SessionEnd::ProcessExited(_))) {
            return false;
        }

        match killer {
            Some(mut killer) => {
                if let Err(e) = killer.kill() {
                    // Already reaped; nothing left to kill
                    tracing::debug!("Kill after session end: {}", e);
                }
                true
            }
            None => false,
        }
    }

    fn take_killer(&self) -> Option<Box<dyn ChildKiller + Send + Sync>> {
        match self.killer.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }

    /// The recorded reason. A session cancelled from outside without a
    /// trigger ended because the responder is shutting down.
    pub fn reason(&self) -> SessionEnd {
        self.reason.get().cloned().unwrap_or(SessionEnd::Shutdown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Debug, Clone, Default)]
    struct CountingKiller(Arc<AtomicUsize>);

    impl ChildKiller for CountingKiller {
        fn kill(&mut self) -> io::Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn clone_killer(&self) -> Box<dyn ChildKiller + Send + Sync> {
            Box::new(self.clone())
        }
    }

    fn teardown() -> (Teardown, Arc<AtomicUsize>) {
        let killer = CountingKiller::default();
        let kills = Arc::clone(&killer.0);
        (Teardown::new(CancellationToken::new(), Box::new(killer)), kills)
    }

    #[test]
    fn test_first_reason_wins() {
        let (teardown, _) = teardown();
        assert!(!teardown.is_cancelled());

        assert!(teardown.trigger(SessionEnd::PeerClosed));
        assert!(!teardown.trigger(SessionEnd::ProcessExited(Some(0))));
        assert!(!teardown.trigger(SessionEnd::IdleTimeout));

        assert!(teardown.is_cancelled());
        assert_eq!(teardown.reason(), SessionEnd::PeerClosed);
    }

    #[test]
    fn test_release_kills_once() {
        let (teardown, kills) = teardown();
        teardown.trigger(SessionEnd::PtyClosed);

        assert!(teardown.release());
        assert!(!teardown.release());
        assert!(!teardown.release());
        assert_eq!(kills.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_concurrent_release_kills_once() {
        let (teardown, kills) = teardown();
        let teardown = Arc::new(teardown);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let teardown = Arc::clone(&teardown);
                std::thread::spawn(move || {
                    if i % 2 == 0 {
                        teardown.trigger(SessionEnd::PeerClosed);
                    } else {
                        teardown.trigger(SessionEnd::IdleTimeout);
                    }
                    teardown.release()
                })
            })
            .collect();

        let released = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|released| *released)
            .count();

        assert_eq!(released, 1);
        assert_eq!(kills.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_reaped_shell_is_never_killed() {
        let (teardown, kills) = teardown();

        assert!(teardown.process_exited(Some(0)));
        assert!(!teardown.release());
        assert_eq!(kills.load(Ordering::SeqCst), 0);
        assert_eq!(teardown.reason(), SessionEnd::ProcessExited(Some(0)));
    }

    #[test]
    fn test_exit_after_other_reason_still_disarms() {
        let (teardown, kills) = teardown();

        teardown.trigger(SessionEnd::PtyClosed);
        assert!(!teardown.process_exited(Some(1)));
        assert!(!teardown.release());
        assert_eq!(kills.load(Ordering::SeqCst), 0);
        assert_eq!(teardown.reason(), SessionEnd::PtyClosed);
    }

    #[test]
    fn test_drains_output_only_when_shell_ended() {
        let (teardown, _) = teardown();
        assert!(!teardown.drains_output());
        teardown.trigger(SessionEnd::PtyClosed);
        assert!(teardown.drains_output());

        let (teardown, _) = self::teardown();
        teardown.trigger(SessionEnd::PeerClosed);
        assert!(!teardown.drains_output());

        let parent = CancellationToken::new();
        let teardown = Teardown::new(parent.child_token(), Box::new(CountingKiller::default()));
        parent.cancel();
        assert!(!teardown.drains_output());
    }

    #[test]
    fn test_parent_cancel_reads_as_shutdown() {
        let parent = CancellationToken::new();
        let teardown = Teardown::new(parent.child_token(), Box::new(CountingKiller::default()));

        parent.cancel();
        assert!(teardown.is_cancelled());
        assert_eq!(teardown.reason(), SessionEnd::Shutdown);
    }

    #[tokio::test]
    async fn test_cancelled_resolves_after_trigger() {
        let (teardown, _) = teardown();
        let teardown = Arc::new(teardown);

        let waiter = {
            let teardown = Arc::clone(&teardown);
            tokio::spawn(async move { teardown.cancelled().await })
        };

        teardown.trigger(SessionEnd::IdleTimeout);
        waiter.await.unwrap();
    }
}
