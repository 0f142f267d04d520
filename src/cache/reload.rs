//! Host reload primitive.

/// Reloads the running application.
///
/// Injected into [`HardReset`](super::HardReset) so tests can count calls
/// instead of reloading anything.
pub trait PageReloader: Send + Sync {
    fn reload(&self);
}

impl<F> PageReloader for F
where
    F: Fn() + Send + Sync,
{
    fn reload(&self) {
        self()
    }
}

/// Reloader for hosts that cannot reload; the cache wipe still happens.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopReloader;

impl PageReloader for NoopReloader {
    fn reload(&self) {}
}
