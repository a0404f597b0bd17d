//! Logical retransmission timer.
//!
//! Reliable delivery requires that the oldest unacknowledged segment is
//! re-sent if no ACK arrives within the retransmission timeout (RTO).  Time
//! never advances on its own here: the owner reports elapsed milliseconds via
//! [`RetransmitTimer::tick`], which keeps the protocol deterministic under
//! test.
//!
//! The RTO starts at a configured value and doubles on each back-off
//! (exponential back-off, RFC 6298 §5.5).  It returns to the initial value
//! whenever new data is acknowledged.

/// A stoppable countdown measured in milliseconds.
#[derive(Debug, Clone)]
pub struct RetransmitTimer {
    /// RTO restored by [`reset_rto`](Self::reset_rto).
    initial_rto: u64,
    /// Current RTO, doubled by [`back_off`](Self::back_off).
    current_rto: u64,
    /// Milliseconds since the timer was last (re)started.
    elapsed: u64,
    running: bool,
}

impl RetransmitTimer {
    /// Construct a stopped timer.
    pub fn new(initial_rto: u64) -> Self {
        Self {
            initial_rto,
            current_rto: initial_rto,
            elapsed: 0,
            running: false,
        }
    }

    /// Start counting from zero if not already running.
    pub fn start(&mut self) {
        if !self.running {
            self.running = true;
            self.elapsed = 0;
        }
    }

    /// Start counting from zero, running or not.
    pub fn restart(&mut self) {
        self.running = true;
        self.elapsed = 0;
    }

    pub fn stop(&mut self) {
        self.running = false;
        self.elapsed = 0;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Advance the clock by `ms`.  Returns `true` when the RTO has been
    /// reached or exceeded.
    pub fn tick(&mut self, ms: u64) -> bool {
        if !self.running {
            return false;
        }
        self.elapsed = self.elapsed.saturating_add(ms);
        self.elapsed >= self.current_rto
    }

    /// Double the RTO.
    pub fn back_off(&mut self) {
        self.current_rto = self.current_rto.saturating_mul(2);
    }

    /// Restore the RTO to its initial value.
    pub fn reset_rto(&mut self) {
        self.current_rto = self.initial_rto;
    }

    pub fn current_rto(&self) -> u64 {
        self.current_rto
    }
}
