use std::io::Write;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A handy shortcut for the `RwLock` read()/write().unwrap() pattern.
///
/// A poisoned lock means another thread panicked while holding it; there
/// is no sensible way to continue, so unwrapping here is deliberate.
pub trait HandyRwLock<T: ?Sized> {
    fn wl(&self) -> RwLockWriteGuard<'_, T>;
    fn rl(&self) -> RwLockReadGuard<'_, T>;
}

impl<T: ?Sized> HandyRwLock<T> for RwLock<T> {
    fn wl(&self) -> RwLockWriteGuard<'_, T> {
        self.write().unwrap()
    }

    fn rl(&self) -> RwLockReadGuard<'_, T> {
        self.read().unwrap()
    }
}

/// Initialize the logger. Safe to call more than once; only the first
/// call takes effect.
pub fn init_log() {
    let mut builder = env_logger::Builder::from_default_env();

    builder.format_timestamp_secs().format(|buf, record| {
        writeln!(
            buf,
            "[{} - {}] [{}:{}] {}",
            record.level(),
            record.target(),
            record.file().unwrap_or("unknown"),
            record.line().unwrap_or(0),
            record.args()
        )
    });

    let _ = builder.try_init();
}
