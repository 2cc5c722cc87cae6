//! Asynchronous timer abstraction providing the clock and the sleeps used by
//! response polling and retry backoff.

/// Timer trait abstraction; must remain thread-safe when applicable.
pub trait CookerTimer {
    /// Asynchronously wait for `millis` milliseconds.
    fn delay_ms<'a>(&'a mut self, millis: u32) -> impl core::future::Future<Output = ()> + 'a;

    /// Monotonic time in milliseconds since an arbitrary origin.
    fn now_ms(&self) -> u64;
}
