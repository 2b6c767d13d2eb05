//! Per-stream and per-connection flow-control window tracking.
//!
//! Only the send side is tracked (the side that must not write more DATA
//! than the peer has granted); the receive side never needs to shrink below
//! zero here because `crate::connection` caps each outbound DATA frame to
//! `available()` before it is ever queued.

const DEFAULT_INITIAL_WINDOW_SIZE: i32 = 65_535;

#[derive(Debug, Clone, Copy)]
pub struct FlowControl {
    window_size: i32,
}

impl FlowControl {
    pub fn new() -> Self {
        FlowControl {
            window_size: DEFAULT_INITIAL_WINDOW_SIZE,
        }
    }

    /// Bytes currently available to send without violating the peer's
    /// advertised window. Never negative.
    pub fn available(&self) -> usize {
        self.window_size.max(0) as usize
    }

    /// Deducts `len` bytes after a DATA frame of that size has been queued.
    pub fn claim_capacity(&mut self, len: usize) {
        self.window_size -= len as i32;
    }

    /// Applies a WINDOW_UPDATE increment received from the peer.
    pub fn inc_window(&mut self, increment: u32) {
        self.window_size = self.window_size.saturating_add(increment as i32);
    }
}

impl Default for FlowControl {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claims_reduce_available_and_updates_restore_it() {
        let mut fc = FlowControl::new();
        let before = fc.available();
        fc.claim_capacity(16_384);
        assert_eq!(fc.available(), before - 16_384);
        fc.inc_window(16_384);
        assert_eq!(fc.available(), before);
    }

    #[test]
    fn available_never_goes_negative() {
        let mut fc = FlowControl::new();
        fc.claim_capacity(1_000_000);
        assert_eq!(fc.available(), 0);
    }
}
