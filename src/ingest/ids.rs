// Per-day identifiers: "0001", "0002", ...

use crate::constants::IDENTIFIER_WIDTH;

/// Dense 1-based counter for one unit. Only called for events that end up in
/// the ledger, so identifiers never have gaps.
#[derive(Debug, Clone)]
pub struct IdentifierAssigner {
    next: u32,
    width: usize,
}

impl Default for IdentifierAssigner {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentifierAssigner {
    pub fn new() -> Self {
        Self {
            next: 1,
            width: IDENTIFIER_WIDTH,
        }
    }

    /// Identifier the next `assign` will return.
    pub fn peek(&self) -> String {
        format_identifier(self.next, self.width)
    }

    pub fn assign(&mut self) -> String {
        let id = format_identifier(self.next, self.width);
        self.next += 1;
        id
    }

    /// Number of identifiers handed out so far.
    pub fn assigned(&self) -> u32 {
        self.next - 1
    }
}

/// Zero-pad to `width`; larger numbers keep all their digits.
pub fn format_identifier(n: u32, width: usize) -> String {
    format!("{:0width$}", n, width = width)
}
