//! Bounded polling.
//!
//! Every wait on the target is expressed as a fixed number of attempts with a
//! fixed delay in between, so the worst case duration of any operation is
//! known up front.

use crate::host::Clock;
use crate::{Error, ErrorKind};

/// A bounded retry policy.
#[derive(Debug, Clone, Copy)]
pub struct Retry {
    attempts: u32,
    interval_us: u32,
    retry_on: fn(&Error) -> bool,
    what: &'static str,
}

impl Retry {
    /// Try at most `attempts` times. Errors end the loop unless
    /// [`Retry::retry_on`] says otherwise.
    pub const fn new(what: &'static str, attempts: u32) -> Self {
        Self {
            attempts,
            interval_us: 0,
            retry_on: never,
            what,
        }
    }

    /// Wait this long between two attempts.
    pub const fn with_interval_ms(mut self, ms: u32) -> Self {
        self.interval_us = ms * 1000;
        self
    }

    pub const fn with_interval_us(mut self, us: u32) -> Self {
        self.interval_us = us;
        self
    }

    /// Decide which errors count as a failed attempt instead of aborting.
    pub const fn retry_on(mut self, classifier: fn(&Error) -> bool) -> Self {
        self.retry_on = classifier;
        self
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Run `op` until it returns `Ok(Some(_))`.
    ///
    /// `op` receives the context and the zero based attempt number.
    /// `Ok(None)` means "not yet". When all attempts are used up the result is
    /// [`ErrorKind::Timeout`], carrying the last retried error as context.
    pub fn run<C, T>(
        &self,
        ctx: &mut C,
        mut op: impl FnMut(&mut C, u32) -> Result<Option<T>, Error>,
    ) -> Result<T, Error>
    where
        C: Clock + ?Sized,
    {
        let mut last_error = None;

        for attempt in 0..self.attempts {
            if attempt > 0 && self.interval_us > 0 {
                ctx.delay_us(self.interval_us);
            }
            ctx.yield_now();

            match op(ctx, attempt) {
                Ok(Some(value)) => return Ok(value),
                Ok(None) => {}
                Err(e) if (self.retry_on)(&e) => {
                    tracing::debug!("{} attempt {} failed: {}", self.what, attempt + 1, e);
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        let context = match last_error {
            Some(e) => format!("{} after {} attempts, last error: {}", self.what, self.attempts, e),
            None => format!("{} after {} attempts", self.what, self.attempts),
        };
        Err(Error::new(ErrorKind::Timeout).with_context(context))
    }
}

fn never(_: &Error) -> bool {
    false
}

/// Retry classifier for transient acknowledges.
pub fn is_wait(error: &Error) -> bool {
    error.kind() == ErrorKind::Wait
}

/// Retry classifier that treats every error as transient.
pub fn any_error(_: &Error) -> bool {
    true
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Default)]
    struct CountingClock {
        delayed_us: u64,
        yields: u32,
    }

    impl Clock for CountingClock {
        fn delay_us(&mut self, us: u32) {
            self.delayed_us += us as u64;
        }

        fn yield_now(&mut self) {
            self.yields += 1;
        }
    }

    #[test]
    fn exhausts_attempts_with_timeout() {
        let mut clock = CountingClock::default();
        let mut calls = 0;

        let result: Result<(), Error> = Retry::new("poll", 10)
            .with_interval_ms(1)
            .run(&mut clock, |_, _| {
                calls += 1;
                Ok(None)
            });

        assert_eq!(result.map_err(|e| e.kind()), Err(ErrorKind::Timeout));
        assert_eq!(calls, 10);
        assert_eq!(clock.delayed_us, 9_000);
        assert_eq!(clock.yields, 10);
    }

    #[test]
    fn stops_at_first_success() {
        let mut clock = CountingClock::default();

        let value = Retry::new("poll", 5)
            .run(&mut clock, |_, attempt| Ok((attempt == 2).then_some(attempt)))
            .unwrap();

        assert_eq!(value, 2);
    }

    #[test]
    fn unclassified_errors_abort() {
        let mut clock = CountingClock::default();
        let mut calls = 0;

        let retry = Retry::new("poll", 5).retry_on(is_wait);
        let result: Result<(), Error> = retry.run(&mut clock, |_, _| {
            calls += 1;
            Err(Error::new(ErrorKind::Fault))
        });

        assert_eq!(result.map_err(|e| e.kind()), Err(ErrorKind::Fault));
        assert_eq!(calls, 1);
    }

    #[test]
    fn classified_errors_are_retried() {
        let mut clock = CountingClock::default();
        let mut calls = 0;

        let retry = Retry::new("poll", 3).retry_on(is_wait);
        let result: Result<(), Error> = retry.run(&mut clock, |_, _| {
            calls += 1;
            Err(Error::new(ErrorKind::Wait))
        });

        let error = result.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Timeout);
        assert!(error.context().unwrap().contains("last error"));
        assert_eq!(calls, 3);
    }
}
