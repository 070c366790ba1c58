use std::sync::OnceLock;

use parking_lot::Mutex;

/// A write-once cell whose initializer may fail.
///
/// Reads after initialization are lock-free. Initialization runs under a mutex, so concurrent first callers block
/// until the winner finishes and then observe its value. A failed initialization leaves the cell empty.
///
/// Stand-in for `OnceLock::get_or_try_init` until <https://github.com/rust-lang/rust/issues/109737> is stabilized.
#[derive(Debug, Default)]
pub struct TryOnce<T> {
    value: OnceLock<T>,
    initializing: Mutex<()>,
}

impl<T> TryOnce<T> {
    pub const fn new() -> Self {
        Self {
            value: OnceLock::new(),
            initializing: Mutex::new(()),
        }
    }

    pub fn get(&self) -> Option<&T> {
        self.value.get()
    }

    pub fn get_or_try_init<E, F>(&self, init: F) -> Result<&T, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        if let Some(value) = self.value.get() {
            return Ok(value);
        }

        let _guard = self.initializing.lock();
        if let Some(value) = self.value.get() {
            return Ok(value);
        }
        let value = init()?;
        Ok(self.value.get_or_init(|| value))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Barrier,
    };

    use super::TryOnce;

    #[test]
    fn initializes_once_under_contention() {
        const THREADS: usize = 16;
        let cell = TryOnce::new();
        let calls = AtomicUsize::new(0);
        let barrier = Barrier::new(THREADS);

        std::thread::scope(|s| {
            for _ in 0..THREADS {
                s.spawn(|| {
                    barrier.wait();
                    let value = cell
                        .get_or_try_init(|| {
                            calls.fetch_add(1, Ordering::SeqCst);
                            std::thread::sleep(std::time::Duration::from_millis(20));
                            Ok::<_, ()>(42)
                        })
                        .unwrap();
                    assert_eq!(*value, 42);
                });
            }
        });
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failure_leaves_cell_empty() {
        let cell = TryOnce::<u32>::new();
        assert_eq!(cell.get_or_try_init(|| Err("nope")), Err("nope"));
        assert!(cell.get().is_none());
        assert_eq!(cell.get_or_try_init(|| Ok::<_, &str>(7)), Ok(&7));
        assert_eq!(cell.get_or_try_init(|| Ok::<_, &str>(8)), Ok(&7));
    }
}
