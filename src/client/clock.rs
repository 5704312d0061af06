//! Client estimate of the server simulation clock

/// Weight given to each new offset sample.
const OFFSET_SMOOTHING: f64 = 0.1;

/// Maps the client's local clock (seconds) onto the server simulation clock.
///
/// `Welcome` gives a first, one-way estimate. Every `Pong` adds a sample corrected by half the
/// round trip, blended into the running offset.
#[derive(Debug, Clone, Default)]
pub struct ServerClock {
    /// server_time - client_time
    offset: Option<f64>,
    rtt: Option<f64>,
}

impl ServerClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// First estimate from `Welcome`, received at `client_now`.
    pub fn sync(&mut self, server_time: f64, client_now: f64) {
        self.offset = Some(server_time - client_now);
    }

    /// Fold in a pong. `sent_at` is the client time the ping left, `client_now` when the pong
    /// arrived.
    pub fn observe_pong(&mut self, sent_at: f64, server_time: f64, client_now: f64) {
        let rtt = client_now - sent_at;
        if !rtt.is_finite() || rtt < 0.0 {
            return;
        }
        self.rtt = Some(match self.rtt {
            Some(prev) => prev + (rtt - prev) * OFFSET_SMOOTHING,
            None => rtt,
        });

        let sample = server_time + rtt * 0.5 - client_now;
        self.offset = Some(match self.offset {
            Some(prev) => prev + (sample - prev) * OFFSET_SMOOTHING,
            None => sample,
        });
    }

    /// Estimated server time at `client_now`, if synced.
    pub fn now(&self, client_now: f64) -> Option<f64> {
        self.offset.map(|offset| client_now + offset)
    }

    /// Smoothed round-trip time (seconds)
    pub fn rtt(&self) -> Option<f64> {
        self.rtt
    }

    pub fn is_synced(&self) -> bool {
        self.offset.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsynced_clock_has_no_time() {
        assert_eq!(ServerClock::new().now(5.0), None);
    }

    #[test]
    fn welcome_sets_offset() {
        let mut clock = ServerClock::new();
        clock.sync(100.0, 10.0);
        assert_eq!(clock.now(12.0), Some(102.0));
    }

    #[test]
    fn pongs_converge_on_half_rtt_offset() {
        let mut clock = ServerClock::new();
        // Server runs 50 s ahead, 100 ms round trip
        clock.sync(50.0, 0.0);
        for i in 0..200 {
            let sent = f64::from(i);
            let server_at_reply = sent + 0.05 + 50.0;
            clock.observe_pong(sent, server_at_reply, sent + 0.1);
        }
        let offset = clock.now(0.0).unwrap();
        assert!((offset - 50.0).abs() < 1e-3, "offset = {offset}");
        assert!((clock.rtt().unwrap() - 0.1).abs() < 1e-9);
    }

    #[test]
    fn negative_round_trips_are_ignored() {
        let mut clock = ServerClock::new();
        clock.observe_pong(5.0, 1.0, 4.0);
        assert!(!clock.is_synced());
    }
}
