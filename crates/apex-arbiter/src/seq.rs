use crate::types::Sequence;

/// Issues monotonically increasing transaction ids.
#[derive(Debug, Clone, Default)]
pub struct SequenceGenerator {
    next: u64,
}

impl SequenceGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the current counter value and advance it.
    pub fn next(&mut self) -> Sequence {
        let seq = Sequence(self.next);
        self.next += 1;
        seq
    }

    /// The sequence the next call to [`SequenceGenerator::next`] will return.
    pub fn peek(&self) -> Sequence {
        Sequence(self.next)
    }

    pub fn reset(&mut self) {
        self.next = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_up_from_zero_and_resets() {
        let mut gen = SequenceGenerator::new();
        assert_eq!(gen.next(), Sequence(0));
        assert_eq!(gen.next(), Sequence(1));
        assert_eq!(gen.peek(), Sequence(2));
        gen.reset();
        assert_eq!(gen.next(), Sequence(0));
    }
}
