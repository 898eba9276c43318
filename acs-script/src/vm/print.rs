use crate::format::PRINT_BUFFER_SIZE;

/// Text accumulated between BeginPrint and EndPrint.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PrintBuffer {
    text: String,
}

impl PrintBuffer {
    pub fn clear(&mut self) {
        self.text.clear();
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Append, dropping whatever does not fit.
    pub fn push_str(&mut self, s: &str) {
        for c in s.chars() {
            if !self.push_char(c) {
                break;
            }
        }
    }

    pub fn push_char(&mut self, c: char) -> bool {
        if self.text.len() + c.len_utf8() > PRINT_BUFFER_SIZE - 1 {
            return false;
        }
        self.text.push(c);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_at_capacity() {
        let mut p = PrintBuffer::default();
        p.push_str(&"x".repeat(300));
        assert_eq!(p.as_str().len(), PRINT_BUFFER_SIZE - 1);
        assert!(!p.push_char('y'));
        p.clear();
        p.push_str("Hello ");
        p.push_char('7');
        assert_eq!(p.as_str(), "Hello 7");
    }
}
