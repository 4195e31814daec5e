//! In-flight operation flags

use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use super::OperationKind;
use crate::error::Error;

/// Holds an exclusive in-flight flag until dropped.
pub(super) struct BusyGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> BusyGuard<'a> {
    /// Raises `flag`, or fails with [`Error::Busy`] if it is already raised.
    pub(super) fn acquire(flag: &'a AtomicBool, kind: OperationKind) -> Result<Self, Error> {
        if flag.swap(true, Ordering::AcqRel) {
            return Err(Error::Busy(kind));
        }
        Ok(Self { flag })
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Counts one in-flight load until dropped.
pub(super) struct LoadingGuard<'a> {
    count: &'a AtomicUsize,
}

impl<'a> LoadingGuard<'a> {
    pub(super) fn new(count: &'a AtomicUsize) -> Self {
        count.fetch_add(1, Ordering::AcqRel);
        Self { count }
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.count.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_is_busy() {
        let flag = AtomicBool::new(false);

        let guard = BusyGuard::acquire(&flag, OperationKind::Save).unwrap();
        assert!(matches!(
            BusyGuard::acquire(&flag, OperationKind::Save),
            Err(Error::Busy(OperationKind::Save))
        ));

        drop(guard);
        assert!(!flag.load(Ordering::Acquire));
        assert!(BusyGuard::acquire(&flag, OperationKind::Save).is_ok());
    }

    #[test]
    fn test_loading_guard_counts() {
        let count = AtomicUsize::new(0);
        let a = LoadingGuard::new(&count);
        let b = LoadingGuard::new(&count);
        assert_eq!(count.load(Ordering::Acquire), 2);

        drop(a);
        drop(b);
        assert_eq!(count.load(Ordering::Acquire), 0);
    }
}
