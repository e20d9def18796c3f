//! Cooperative cancellation for pull-sequence pipelines.
//!
//! Cancellation is signal-based, never preemptive. A [`CancelSource`] owns
//! the signal and fires it at most once; any number of [`CancelToken`]s
//! observe it. Cursors poll `is_requested` at the top of an advance and, when
//! they must react while a pull is parked, register a callback that is
//! invoked exactly once when the signal fires.
//!
//! Registrations are scoped resources: dropping a [`Registration`] removes
//! the callback in O(1), so a cursor that loses a race (or is disposed) never
//! leaks a listener.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use std::task::Waker;

type Callback = Box<dyn FnMut() + Send>;

/// Shared state behind a cancellation signal.
struct TokenState {
    /// Whether cancellation has been requested.
    requested: AtomicBool,
    /// Registered listeners, keyed by slot for O(1) removal.
    listeners: Mutex<ListenerTable>,
}

#[derive(Default)]
struct ListenerTable {
    slots: Vec<Option<Callback>>,
    free: Vec<usize>,
}

impl ListenerTable {
    fn insert(&mut self, callback: Callback) -> usize {
        if let Some(slot) = self.free.pop() {
            self.slots[slot] = Some(callback);
            slot
        } else {
            self.slots.push(Some(callback));
            self.slots.len() - 1
        }
    }

    fn remove(&mut self, slot: usize) {
        if let Some(entry) = self.slots.get_mut(slot) {
            if entry.take().is_some() {
                self.free.push(slot);
            }
        }
    }
}

/// The owning half of a cancellation signal.
///
/// Firing is idempotent; listeners are invoked exactly once, outside the
/// registry lock.
pub struct CancelSource {
    state: Arc<TokenState>,
}

impl CancelSource {
    /// Creates a new, unfired source.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(TokenState {
                requested: AtomicBool::new(false),
                listeners: Mutex::new(ListenerTable::default()),
            }),
        }
    }

    /// Returns an observing token for this source.
    #[must_use]
    pub fn token(&self) -> CancelToken {
        CancelToken {
            state: Some(Arc::clone(&self.state)),
        }
    }

    /// Requests cancellation, invoking all registered listeners.
    ///
    /// Only the first call has any effect.
    pub fn cancel(&self) {
        if self.state.requested.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut callbacks: Vec<Callback> = {
            let mut table = self.state.listeners.lock();
            table.free.clear();
            table.slots.drain(..).flatten().collect()
        };
        for callback in &mut callbacks {
            callback();
        }
    }

    /// Returns true if cancellation has been requested.
    #[must_use]
    pub fn is_requested(&self) -> bool {
        self.state.requested.load(Ordering::SeqCst)
    }
}

impl Default for CancelSource {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancelSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelSource")
            .field("requested", &self.is_requested())
            .finish_non_exhaustive()
    }
}

/// An observing handle on a cancellation signal.
///
/// Tokens are cheap to clone and never own the signal. The
/// [`never`](CancelToken::never) token can stand in wherever a signal is
/// required but cancellation is impossible.
#[derive(Clone)]
pub struct CancelToken {
    state: Option<Arc<TokenState>>,
}

impl CancelToken {
    /// A token that can never fire.
    #[must_use]
    pub fn never() -> Self {
        Self { state: None }
    }

    /// Returns true if this token is backed by a live source.
    #[must_use]
    pub fn can_be_canceled(&self) -> bool {
        self.state.is_some()
    }

    /// Returns true if cancellation has been requested.
    #[must_use]
    pub fn is_requested(&self) -> bool {
        self.state
            .as_ref()
            .is_some_and(|s| s.requested.load(Ordering::SeqCst))
    }

    /// Registers a callback to run when the signal fires.
    ///
    /// If the signal has already fired the callback runs immediately, on the
    /// caller's stack. The returned [`Registration`] removes the callback
    /// when dropped.
    pub fn register(&self, mut callback: impl FnMut() + Send + 'static) -> Registration {
        let Some(state) = self.state.as_ref() else {
            return Registration { state: Weak::new(), slot: usize::MAX };
        };
        if state.requested.load(Ordering::SeqCst) {
            callback();
            return Registration { state: Weak::new(), slot: usize::MAX };
        }
        let slot = {
            let mut table = state.listeners.lock();
            // Racing with cancel(): re-check under the lock so a firing that
            // drained the table cannot strand this listener.
            if state.requested.load(Ordering::SeqCst) {
                usize::MAX
            } else {
                table.insert(Box::new(callback))
            }
        };
        if slot == usize::MAX {
            // Lost the race; the signal fired while we were registering.
            return Registration { state: Weak::new(), slot: usize::MAX };
        }
        Registration {
            state: Arc::downgrade(state),
            slot,
        }
    }
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken")
            .field("can_be_canceled", &self.can_be_canceled())
            .field("requested", &self.is_requested())
            .finish()
    }
}

/// A scoped listener registration; dropping it deregisters the callback.
#[must_use = "dropping a registration immediately deregisters the callback"]
pub struct Registration {
    state: Weak<TokenState>,
    slot: usize,
}

impl Registration {
    /// Removes the callback now instead of at drop time.
    pub fn revoke(self) {
        drop(self);
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        if let Some(state) = self.state.upgrade() {
            state.listeners.lock().remove(self.slot);
        }
    }
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration").finish_non_exhaustive()
    }
}

/// Which of two raced signals fired first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaceWinner {
    /// The first token claimed the transition.
    First,
    /// The second token claimed the transition.
    Second,
}

struct RaceInner {
    /// 0 = unclaimed, 1 = first, 2 = second.
    claimed: AtomicU8,
    waker: Mutex<Option<Waker>>,
}

impl RaceInner {
    fn claim(&self, id: u8) {
        if self
            .claimed
            .compare_exchange(0, id, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            if let Some(waker) = self.waker.lock().take() {
                waker.wake();
            }
        }
    }
}

/// A first-wins race between two cancellation signals.
///
/// Both tokens are registered on construction; the first to fire claims the
/// single transition with an atomic compare-exchange and wakes the stored
/// waker. When both fire "simultaneously" the winner is whichever callback
/// runs first — externally nondeterministic by design. Once the race is
/// decided both registrations are revoked, so the loser can never cause a
/// second transition or leak a listener.
pub struct RaceTrigger {
    inner: Arc<RaceInner>,
    registrations: [Option<Registration>; 2],
}

impl RaceTrigger {
    /// Races `first` against `second`.
    #[must_use]
    pub fn new(first: &CancelToken, second: &CancelToken) -> Self {
        let inner = Arc::new(RaceInner {
            claimed: AtomicU8::new(0),
            waker: Mutex::new(None),
        });
        let a = Arc::clone(&inner);
        let reg_first = first.register(move || a.claim(1));
        let b = Arc::clone(&inner);
        let reg_second = second.register(move || b.claim(2));
        Self {
            inner,
            registrations: [Some(reg_first), Some(reg_second)],
        }
    }

    /// Races a single token (the second lane never fires).
    #[must_use]
    pub fn single(token: &CancelToken) -> Self {
        Self::new(token, &CancelToken::never())
    }

    /// Returns the winner if the race has been decided, revoking both
    /// registrations on the first decided observation.
    pub fn fired(&mut self) -> Option<RaceWinner> {
        let winner = match self.inner.claimed.load(Ordering::SeqCst) {
            1 => Some(RaceWinner::First),
            2 => Some(RaceWinner::Second),
            _ => None,
        };
        if winner.is_some() {
            self.release();
        }
        winner
    }

    /// Stores the waker to notify when the race is decided.
    ///
    /// Returns the winner instead if the race was already decided, closing
    /// the decide-then-park window.
    pub fn park(&mut self, waker: &Waker) -> Option<RaceWinner> {
        *self.inner.waker.lock() = Some(waker.clone());
        self.fired()
    }

    /// Revokes both registrations.
    pub fn release(&mut self) {
        for registration in &mut self.registrations {
            registration.take();
        }
    }
}

impl Drop for RaceTrigger {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for RaceTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RaceTrigger")
            .field("claimed", &self.inner.claimed.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn token_observes_source() {
        let source = CancelSource::new();
        let token = source.token();
        assert!(token.can_be_canceled());
        assert!(!token.is_requested());

        source.cancel();
        assert!(token.is_requested());
    }

    #[test]
    fn never_token_is_inert() {
        let token = CancelToken::never();
        assert!(!token.can_be_canceled());
        assert!(!token.is_requested());
        let _registration = token.register(|| panic!("must not fire"));
    }

    #[test]
    fn listener_fires_once() {
        let source = CancelSource::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let _registration = source.token().register(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });

        source.cancel();
        source.cancel();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn late_registration_fires_immediately() {
        let source = CancelSource::new();
        source.cancel();

        let fired = Arc::new(AtomicBool::new(false));
        let f = Arc::clone(&fired);
        let _registration = source.token().register(move || {
            f.store(true, Ordering::SeqCst);
        });
        assert!(fired.load(Ordering::SeqCst));
    }

    #[test]
    fn dropped_registration_never_fires() {
        let source = CancelSource::new();
        let fired = Arc::new(AtomicBool::new(false));
        let f = Arc::clone(&fired);
        let registration = source.token().register(move || {
            f.store(true, Ordering::SeqCst);
        });
        drop(registration);

        source.cancel();
        assert!(!fired.load(Ordering::SeqCst));
    }

    #[test]
    fn slot_reuse_after_deregistration() {
        let source = CancelSource::new();
        let token = source.token();

        let first = token.register(|| {});
        drop(first);
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let _second = token.register(move || {
            h.fetch_add(1, Ordering::SeqCst);
        });

        source.cancel();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn race_first_wins() {
        let a = CancelSource::new();
        let b = CancelSource::new();
        let mut race = RaceTrigger::new(&a.token(), &b.token());

        assert_eq!(race.fired(), None);
        a.cancel();
        assert_eq!(race.fired(), Some(RaceWinner::First));

        // The loser firing afterwards cannot change the outcome.
        b.cancel();
        assert_eq!(race.fired(), Some(RaceWinner::First));
    }

    #[test]
    fn race_second_wins() {
        let a = CancelSource::new();
        let b = CancelSource::new();
        let mut race = RaceTrigger::new(&a.token(), &b.token());

        b.cancel();
        assert_eq!(race.fired(), Some(RaceWinner::Second));
        a.cancel();
        assert_eq!(race.fired(), Some(RaceWinner::Second));
    }

    #[test]
    fn race_single_lane() {
        let a = CancelSource::new();
        let mut race = RaceTrigger::single(&a.token());
        assert_eq!(race.fired(), None);
        a.cancel();
        assert_eq!(race.fired(), Some(RaceWinner::First));
    }

    #[test]
    fn race_release_revokes_listeners() {
        let a = CancelSource::new();
        let mut race = RaceTrigger::single(&a.token());
        race.release();
        a.cancel();
        // Claim can no longer happen through the revoked registration.
        assert_eq!(race.fired(), None);
    }
}
