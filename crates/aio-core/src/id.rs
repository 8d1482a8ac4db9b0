//! Identity newtypes, kept distinct so a `TaskId` can never be mixed up
//! with a `RequestId` at a call site.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

macro_rules! sequential_id {
    ($name:ident, $counter:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(u64);

        static $counter: AtomicU64 = AtomicU64::new(1);

        impl $name {
            pub const NONE: $name = $name(0);

            pub fn next() -> Self {
                $name($counter.fetch_add(1, Ordering::Relaxed))
            }

            pub fn is_none(self) -> bool {
                self.0 == 0
            }

            pub fn as_u64(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

sequential_id!(TaskId, TASK_ID_COUNTER);
sequential_id!(RequestId, REQUEST_ID_COUNTER);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_distinct_and_increasing() {
        let a = TaskId::next();
        let b = TaskId::next();
        assert!(b.as_u64() > a.as_u64());
        assert!(!a.is_none());
        assert!(TaskId::NONE.is_none());
    }
}
