/// Values that have to outlive the JS callback currently on the stack, such as
/// a `Closure` whose timer or listener was just removed from inside a
/// callback. The owner runs `sweep` from a fresh task and drops the batch it
/// returns.
pub struct Retired<T> {
    items: Vec<T>,
    sweep_pending: bool,
}

impl<T> Default for Retired<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            sweep_pending: false,
        }
    }
}

impl<T> Retired<T> {
    /// Park `item`. Returns true when the caller must schedule a sweep, i.e.
    /// for the first item since the last sweep.
    pub fn retire(&mut self, item: T) -> bool {
        self.items.push(item);
        !std::mem::replace(&mut self.sweep_pending, true)
    }

    /// Hand back everything parked so far.
    pub fn sweep(&mut self) -> Vec<T> {
        self.sweep_pending = false;
        std::mem::take(&mut self.items)
    }

    /// The sweep could not be queued; the next `retire` asks again.
    pub fn sweep_failed(&mut self) {
        self.sweep_pending = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn one_sweep_per_batch() {
        let mut retired = Retired::default();
        assert!(retired.retire(1));
        assert!(!retired.retire(2));
        assert_eq!(retired.sweep(), vec![1, 2]);
        assert!(retired.sweep().is_empty());
        assert!(retired.retire(3));
    }

    #[test]
    fn repeated_start_stop_does_not_accumulate() {
        // Two timers cleared per stop, with no frame ever rendered in between.
        let token = Rc::new(());
        let mut retired = Retired::default();
        for _ in 0..1000 {
            assert!(retired.retire(token.clone()));
            assert!(!retired.retire(token.clone()));
            assert_eq!(retired.sweep().len(), 2);
        }
        assert_eq!(Rc::strong_count(&token), 1);
    }

    #[test]
    fn failed_sweep_is_requested_again() {
        let mut retired = Retired::default();
        assert!(retired.retire('a'));
        retired.sweep_failed();
        assert!(retired.retire('b'));
        assert_eq!(retired.sweep(), vec!['a', 'b']);
    }
}
