/// Monotonic virtual clock.
///
/// Time only moves forward: [`VirtualClock::advance_to`] ignores targets in the past so that
/// callers can feed it deadlines popped from several queues without ordering them first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VirtualClock {
    now_ns: u64,
}

impl VirtualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now_ns(&self) -> u64 {
        self.now_ns
    }

    /// Move the clock to `target_ns` if it is in the future. Returns the new time.
    pub fn advance_to(&mut self, target_ns: u64) -> u64 {
        if target_ns > self.now_ns {
            self.now_ns = target_ns;
        }
        self.now_ns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_moves_backwards() {
        let mut clock = VirtualClock::new();
        assert_eq!(clock.advance_to(50), 50);
        assert_eq!(clock.advance_to(10), 50);
        assert_eq!(clock.now_ns(), 50);
    }
}
