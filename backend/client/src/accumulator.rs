/// Pops counted on this side and not yet claimed.
///
/// Starts at zero every time it is created, which is what makes a reload
/// without claiming drop the unclaimed pops.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LocalAccumulator {
    pops: u64,
}

impl LocalAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pop(&mut self) -> u64 {
        self.pops = self.pops.saturating_add(1);
        self.pops
    }

    pub fn pops(&self) -> u64 {
        self.pops
    }

    pub fn is_empty(&self) -> bool {
        self.pops == 0
    }

    pub fn reset(&mut self) {
        self.pops = 0;
    }
}
