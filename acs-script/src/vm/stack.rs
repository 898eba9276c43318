use crate::format::STACK_DEPTH;

/// Fixed-depth operand stack of one script instance.
///
/// Compiled scripts keep their stack balanced; overflow and underflow are
/// content bugs and only checked in debug builds. In release builds a push
/// past the top is discarded and a pop from an empty stack yields 0.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValueStack {
    slots: [i32; STACK_DEPTH],
    len: usize,
}

impl Default for ValueStack {
    fn default() -> Self {
        Self { slots: [0; STACK_DEPTH], len: 0 }
    }
}

impl ValueStack {
    pub fn from_parts(slots: [i32; STACK_DEPTH], len: usize) -> Self {
        Self { slots, len: len.min(STACK_DEPTH) }
    }

    #[inline]
    pub fn push(&mut self, v: i32) {
        debug_assert!(self.len < STACK_DEPTH, "script stack overflow");
        if let Some(slot) = self.slots.get_mut(self.len) {
            *slot = v;
            self.len += 1;
        }
    }

    #[inline]
    pub fn pop(&mut self) -> i32 {
        debug_assert!(self.len > 0, "script stack underflow");
        if self.len == 0 {
            return 0;
        }
        self.len -= 1;
        self.slots[self.len]
    }

    #[inline]
    pub fn top(&self) -> i32 {
        debug_assert!(self.len > 0, "script stack underflow");
        self.len.checked_sub(1).map(|i| self.slots[i]).unwrap_or(0)
    }

    #[inline]
    pub fn drop_top(&mut self) {
        self.pop();
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_slice(&self) -> &[i32] {
        &self.slots[..self.len]
    }

    /// The whole backing array, including slots above the top.
    pub fn raw_slots(&self) -> &[i32; STACK_DEPTH] {
        &self.slots
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_pop_top() {
        let mut s = ValueStack::default();
        s.push(1);
        s.push(2);
        assert_eq!(s.top(), 2);
        assert_eq!(s.as_slice(), &[1, 2]);
        assert_eq!(s.pop(), 2);
        s.drop_top();
        assert!(s.is_empty());
    }

    #[test]
    fn from_parts_clamps_depth() {
        let s = ValueStack::from_parts([7; STACK_DEPTH], STACK_DEPTH + 5);
        assert_eq!(s.len(), STACK_DEPTH);
    }
}
