//! # Rate limiting
//!
//! Debounce and throttle combinators driven by the cooperative [`Scheduler`].
//!
//! Semantics follow the usual trailing-edge debounce:
//!
//! - every call records the latest event and restarts the quiet period;
//! - with `leading`, the first call of a burst runs immediately;
//! - with `trailing` (default), the latest event runs once the quiet period
//!   of `wait` elapses;
//! - `max_wait` bounds how long a continuous burst can postpone a run.
//!
//! A throttle is a debounce with `leading = true` and `max_wait = wait`, which
//! yields at most one run per window.
//!
//! Calls that run synchronously return the handler's result. Runs deferred to
//! a timer have no caller to return to, so their failures are handed to the
//! `on_deferred_error` sink.

use crate::error::HandlerError;
use crate::events::DomEvent;
use crate::modifiers::RateLimitSpec;
use crate::scheduler::{Scheduler, TimerId};
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::time::Duration;
use tracing::debug;

pub type HandlerResult = Result<(), HandlerError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitKind {
    Debounce,
    Throttle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitOptions {
    pub kind: RateLimitKind,
    pub wait: Duration,
    pub leading: bool,
    pub trailing: bool,
    pub max_wait: Option<Duration>,
}

impl RateLimitOptions {
    pub fn debounce(wait: Duration) -> Self {
        Self {
            kind: RateLimitKind::Debounce,
            wait,
            leading: false,
            trailing: true,
            max_wait: None,
        }
    }

    pub fn throttle(wait: Duration) -> Self {
        Self {
            kind: RateLimitKind::Throttle,
            wait,
            leading: true,
            trailing: true,
            max_wait: Some(wait),
        }
    }

    /// Build options from declared flags, falling back to `default_wait`
    pub fn from_spec(kind: RateLimitKind, spec: &RateLimitSpec, default_wait: Duration) -> Self {
        let wait = spec.delay.map(Duration::from_millis).unwrap_or(default_wait);
        let mut options = match kind {
            RateLimitKind::Debounce => Self::debounce(wait),
            RateLimitKind::Throttle => Self::throttle(wait),
        };
        if let Some(leading) = spec.leading {
            options.leading = leading;
        }
        if let Some(trailing) = spec.trailing {
            options.trailing = trailing;
        }
        if let Some(max_wait) = spec.max_wait {
            options.max_wait = Some(Duration::from_millis(max_wait).max(wait));
        }
        options
    }
}

#[derive(Default)]
struct LimiterState {
    timer: Option<TimerId>,
    last_call: Option<Duration>,
    last_invoke: Duration,
    pending: Option<DomEvent>,
}

struct Inner {
    scheduler: Scheduler,
    options: RateLimitOptions,
    func: Rc<dyn Fn(&DomEvent) -> HandlerResult>,
    on_deferred_error: Rc<dyn Fn(HandlerError)>,
    state: RefCell<LimiterState>,
}

/// Cloneable handle to a debounced or throttled function
#[derive(Clone)]
pub struct RateLimiter {
    inner: Rc<Inner>,
}

impl RateLimiter {
    pub fn new(
        scheduler: Scheduler,
        options: RateLimitOptions,
        func: Rc<dyn Fn(&DomEvent) -> HandlerResult>,
        on_deferred_error: Rc<dyn Fn(HandlerError)>,
    ) -> Self {
        Self {
            inner: Rc::new(Inner {
                scheduler,
                options,
                func,
                on_deferred_error,
                state: RefCell::new(LimiterState::default()),
            }),
        }
    }

    pub fn options(&self) -> &RateLimitOptions {
        &self.inner.options
    }

    /// Record a call. Runs the function now if the leading edge applies.
    pub fn call(&self, event: &DomEvent) -> HandlerResult {
        let now = self.inner.scheduler.now();
        let invoking = self.should_invoke(now);
        let has_timer = {
            let mut state = self.inner.state.borrow_mut();
            state.pending = Some(event.clone());
            state.last_call = Some(now);
            state.timer.is_some()
        };

        if invoking {
            if !has_timer {
                return self.leading_edge(now);
            }
            if self.inner.options.max_wait.is_some() {
                // Burst outlived max_wait while the timer was still pending
                self.restart_timer(self.inner.options.wait);
                return self.invoke(now);
            }
        }
        if !has_timer {
            self.restart_timer(self.inner.options.wait);
        }
        Ok(())
    }

    /// Drop any pending run and reset to the initial state
    pub fn cancel(&self) {
        let mut state = self.inner.state.borrow_mut();
        if let Some(timer) = state.timer.take() {
            self.inner.scheduler.clear_timeout(timer);
            debug!(kind = ?self.inner.options.kind, "Cancelled pending rate-limited call");
        }
        *state = LimiterState::default();
    }

    /// Run a pending trailing call immediately
    pub fn flush(&self) -> HandlerResult {
        let timer = self.inner.state.borrow_mut().timer.take();
        match timer {
            Some(timer) => {
                self.inner.scheduler.clear_timeout(timer);
                self.trailing_edge(self.inner.scheduler.now())
            }
            None => Ok(()),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.inner.state.borrow().timer.is_some()
    }

    fn should_invoke(&self, now: Duration) -> bool {
        let state = self.inner.state.borrow();
        let Some(last_call) = state.last_call else {
            return true;
        };
        let since_call = now.saturating_sub(last_call);
        let since_invoke = now.saturating_sub(state.last_invoke);
        since_call >= self.inner.options.wait
            || self
                .inner
                .options
                .max_wait
                .map_or(false, |max_wait| since_invoke >= max_wait)
    }

    fn remaining_wait(&self, now: Duration) -> Duration {
        let state = self.inner.state.borrow();
        let since_call = state
            .last_call
            .map_or(Duration::ZERO, |last| now.saturating_sub(last));
        let waiting = self.inner.options.wait.saturating_sub(since_call);
        match self.inner.options.max_wait {
            Some(max_wait) => {
                let since_invoke = now.saturating_sub(state.last_invoke);
                waiting.min(max_wait.saturating_sub(since_invoke))
            }
            None => waiting,
        }
    }

    fn leading_edge(&self, now: Duration) -> HandlerResult {
        self.inner.state.borrow_mut().last_invoke = now;
        self.restart_timer(self.inner.options.wait);
        if self.inner.options.leading {
            self.invoke(now)
        } else {
            Ok(())
        }
    }

    fn trailing_edge(&self, now: Duration) -> HandlerResult {
        let has_pending = {
            let mut state = self.inner.state.borrow_mut();
            state.timer = None;
            state.pending.is_some()
        };
        let result = if self.inner.options.trailing && has_pending {
            self.invoke(now)
        } else {
            Ok(())
        };
        self.inner.state.borrow_mut().pending = None;
        result
    }

    fn invoke(&self, now: Duration) -> HandlerResult {
        let event = {
            let mut state = self.inner.state.borrow_mut();
            state.last_invoke = now;
            state.pending.take()
        };
        match event {
            Some(event) => (self.inner.func)(&event),
            None => Ok(()),
        }
    }

    fn restart_timer(&self, delay: Duration) {
        let previous = self.inner.state.borrow_mut().timer.take();
        if let Some(previous) = previous {
            self.inner.scheduler.clear_timeout(previous);
        }
        let weak: Weak<Inner> = Rc::downgrade(&self.inner);
        let timer = self.inner.scheduler.set_timeout(delay, move || {
            if let Some(inner) = weak.upgrade() {
                RateLimiter { inner }.timer_expired();
            }
        });
        self.inner.state.borrow_mut().timer = Some(timer);
    }

    fn timer_expired(&self) {
        let now = self.inner.scheduler.now();
        self.inner.state.borrow_mut().timer = None;
        if self.should_invoke(now) {
            if let Err(err) = self.trailing_edge(now) {
                (self.inner.on_deferred_error)(err);
            }
        } else {
            self.restart_timer(self.remaining_wait(now));
        }
    }
}

impl fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiter")
            .field("options", &self.inner.options)
            .field("pending", &self.is_pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    struct Probe {
        scheduler: Scheduler,
        calls: Rc<RefCell<Vec<(Duration, String)>>>,
        errors: Rc<RefCell<Vec<HandlerError>>>,
    }

    impl Probe {
        fn new() -> Self {
            Self {
                scheduler: Scheduler::new(),
                calls: Rc::new(RefCell::new(Vec::new())),
                errors: Rc::new(RefCell::new(Vec::new())),
            }
        }

        fn limiter(&self, options: RateLimitOptions) -> RateLimiter {
            let calls = self.calls.clone();
            let scheduler = self.scheduler.clone();
            let errors = self.errors.clone();
            RateLimiter::new(
                self.scheduler.clone(),
                options,
                Rc::new(move |event: &DomEvent| {
                    calls.borrow_mut().push((scheduler.now(), event.name.clone()));
                    if event.name == "fail" {
                        Err(HandlerError::new("boom"))
                    } else {
                        Ok(())
                    }
                }),
                Rc::new(move |err: HandlerError| errors.borrow_mut().push(err)),
            )
        }

        fn times(&self) -> Vec<Duration> {
            self.calls.borrow().iter().map(|(t, _)| *t).collect()
        }
    }

    #[test]
    fn test_debounce_runs_once_after_quiet_period() {
        let probe = Probe::new();
        let limiter = probe.limiter(RateLimitOptions::debounce(ms(200)));

        for _ in 0..5 {
            limiter.call(&DomEvent::new("click")).unwrap();
            probe.scheduler.advance(ms(50));
        }
        assert!(probe.calls.borrow().is_empty());

        probe.scheduler.advance(ms(200));
        // Last call at t=200, quiet until t=400
        assert_eq!(probe.times(), vec![ms(400)]);
    }

    #[test]
    fn test_debounce_uses_latest_event() {
        let probe = Probe::new();
        let limiter = probe.limiter(RateLimitOptions::debounce(ms(100)));
        limiter.call(&DomEvent::new("first")).unwrap();
        limiter.call(&DomEvent::new("second")).unwrap();
        probe.scheduler.advance(ms(100));
        assert_eq!(probe.calls.borrow()[0].1, "second");
    }

    #[test]
    fn test_throttle_runs_leading_and_once_per_window() {
        let probe = Probe::new();
        let limiter = probe.limiter(RateLimitOptions::throttle(ms(300)));

        for _ in 0..10 {
            limiter.call(&DomEvent::new("scroll")).unwrap();
            probe.scheduler.advance(ms(100));
        }
        probe.scheduler.advance(ms(1000));

        let times = probe.times();
        assert_eq!(times[0], ms(0));
        for pair in times.windows(2) {
            assert!(pair[1] - pair[0] >= ms(300), "runs too close: {:?}", times);
        }
        assert!(times.len() >= 3);
    }

    #[test]
    fn test_cancel_drops_pending_run() {
        let probe = Probe::new();
        let limiter = probe.limiter(RateLimitOptions::debounce(ms(100)));
        limiter.call(&DomEvent::new("click")).unwrap();
        assert!(limiter.is_pending());

        limiter.cancel();
        probe.scheduler.advance(ms(500));
        assert!(probe.calls.borrow().is_empty());
        assert_eq!(probe.scheduler.pending_timers(), 0);
    }

    #[test]
    fn test_flush_runs_pending_now() {
        let probe = Probe::new();
        let limiter = probe.limiter(RateLimitOptions::debounce(ms(100)));
        limiter.call(&DomEvent::new("click")).unwrap();
        limiter.flush().unwrap();
        assert_eq!(probe.times(), vec![ms(0)]);
        probe.scheduler.advance(ms(500));
        assert_eq!(probe.calls.borrow().len(), 1);
    }

    #[test]
    fn test_deferred_errors_reach_sink() {
        let probe = Probe::new();
        let limiter = probe.limiter(RateLimitOptions::debounce(ms(100)));
        assert!(limiter.call(&DomEvent::new("fail")).is_ok());
        probe.scheduler.advance(ms(100));
        assert_eq!(probe.errors.borrow().as_slice(), &[HandlerError::new("boom")]);
    }

    #[test]
    fn test_options_from_spec() {
        let spec = RateLimitSpec {
            delay: Some(50),
            leading: Some(true),
            trailing: Some(false),
            max_wait: Some(20),
        };
        let options = RateLimitOptions::from_spec(RateLimitKind::Debounce, &spec, ms(300));
        assert_eq!(options.wait, ms(50));
        assert!(options.leading);
        assert!(!options.trailing);
        assert_eq!(options.max_wait, Some(ms(50)));

        let defaults =
            RateLimitOptions::from_spec(RateLimitKind::Debounce, &RateLimitSpec::default(), ms(300));
        assert_eq!(defaults, RateLimitOptions::debounce(ms(300)));
    }
}
