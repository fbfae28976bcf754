use std::sync::{Mutex, MutexGuard, PoisonError};

/// Mutex-guarded state with closure-based transitions.
///
/// Monkeys keep their loop state here: the loop task advances it while HTTP
/// handlers read it concurrently. A transition closure sees the state under the
/// lock and decides both the new state and what to report back.
///
/// # Example
///
/// ```rust
/// use mobu_common::state_machine::StateMachine;
///
/// #[derive(Clone, Debug, PartialEq)]
/// enum Loop {
///     Idle,
///     Running,
/// }
///
/// let machine = StateMachine::new(Loop::Idle);
///
/// let started = machine.transition(|state| match state {
///     Loop::Idle => {
///         *state = Loop::Running;
///         true
///     }
///     Loop::Running => false,
/// });
///
/// assert!(started);
/// assert_eq!(machine.snapshot(), Loop::Running);
/// ```
#[derive(Debug)]
pub struct StateMachine<S> {
    state: Mutex<S>,
}

impl<S> StateMachine<S> {
    /// Creates a new `StateMachine` in the given initial state.
    pub fn new(initial_state: S) -> Self {
        Self {
            state: Mutex::new(initial_state),
        }
    }

    /// Direct access to the state for reads that need more than a clone.
    ///
    /// A panic in another holder does not make the state unreadable; the last
    /// written value is returned.
    pub fn lock(&self) -> MutexGuard<'_, S> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Perform an atomic transition on the state.
    ///
    /// The lock is held for the duration of the closure, so keep it free of
    /// `.await` points and I/O.
    pub fn transition<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        let mut state = self.lock();
        f(&mut state)
    }
}

impl<S: Clone> StateMachine<S> {
    /// Returns a copy of the current state.
    pub fn snapshot(&self) -> S {
        self.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn concurrent_transitions_are_serialized() {
        let machine = Arc::new(StateMachine::new(0u32));
        let mut handles = vec![];

        for _ in 0..10 {
            let machine = machine.clone();
            handles.push(thread::spawn(move || {
                for _ in 0..100 {
                    machine.transition(|count| *count += 1);
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(machine.snapshot(), 1000);
    }

    #[test]
    fn terminal_state_rejects_restart() {
        #[derive(Clone, Debug, PartialEq)]
        enum Loop {
            Idle,
            Running,
            Failed,
        }

        let machine = StateMachine::new(Loop::Idle);
        let start = |state: &mut Loop| match state {
            Loop::Idle => {
                *state = Loop::Running;
                Ok(())
            }
            other => Err(other.clone()),
        };

        assert_eq!(machine.transition(start), Ok(()));
        machine.transition(|state| *state = Loop::Failed);
        assert_eq!(machine.transition(start), Err(Loop::Failed));
        assert_eq!(machine.snapshot(), Loop::Failed);
    }

    #[test]
    fn poisoned_lock_still_readable() {
        let machine = Arc::new(StateMachine::new(7));
        let poisoner = machine.clone();
        let _ = thread::spawn(move || {
            poisoner.transition(|_| panic!("boom"));
        })
        .join();

        assert_eq!(machine.snapshot(), 7);
    }
}
