//! Tracks whether the unit is still answering.
//!
//! Every scheduler tick counts as one unanswered round until a status frame
//! (`0x62`/`0x06`) arrives. Too many unanswered rounds in a row mark the unit
//! disconnected, and it stays that way until a connect request is acknowledged.

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ConnectionState {
    /// The serial line is open.
    pub transport_connected: bool,
    /// The unit acknowledged a connect request and keeps answering.
    pub device_connected: bool,
    pub non_response_count: u8,
    /// Time of the last valid frame from the unit.
    pub last_response_ms: Option<u64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    Connected,
    Lost,
}

#[derive(Debug)]
pub struct Liveness {
    state: ConnectionState,
    max_non_response: u8,
}

impl Liveness {
    pub fn new(max_non_response: u8) -> Self {
        Liveness { state: ConnectionState::default(), max_non_response }
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn transport_opened(&mut self) {
        self.state.transport_connected = true;
        self.state.non_response_count = 0;
    }

    pub fn transport_closed(&mut self) -> Option<Transition> {
        self.state.transport_connected = false;
        self.state.non_response_count = 0;
        self.lose()
    }

    pub fn frame_received(&mut self, now_ms: u64) {
        self.state.last_response_ms = Some(now_ms);
    }

    pub fn handshake_acknowledged(&mut self) -> Option<Transition> {
        self.state.non_response_count = 0;
        if self.state.device_connected {
            return None;
        }
        self.state.device_connected = true;
        log::info!("heat pump connected");
        Some(Transition::Connected)
    }

    pub fn status_received(&mut self) {
        self.state.non_response_count = 0;
    }

    /// Counts one more round without a status frame.
    pub fn request_scheduled(&mut self) -> Option<Transition> {
        if !self.state.device_connected {
            return None;
        }
        self.state.non_response_count = self.state.non_response_count.saturating_add(1);
        log::trace!("non-response count {}", self.state.non_response_count);
        if self.state.non_response_count >= self.max_non_response {
            log::warn!("no status from heat pump after {} requests", self.state.non_response_count);
            return self.lose();
        }
        None
    }

    pub fn can_send(&self) -> bool {
        self.state.transport_connected && self.state.device_connected
    }

    pub fn since_last_response(&self, now_ms: u64) -> Option<u64> {
        self.state.last_response_ms.map(|last| now_ms.saturating_sub(last))
    }

    fn lose(&mut self) -> Option<Transition> {
        if !self.state.device_connected {
            return None;
        }
        self.state.device_connected = false;
        Some(Transition::Lost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connected(max: u8) -> Liveness {
        let mut liveness = Liveness::new(max);
        liveness.transport_opened();
        assert_eq!(liveness.handshake_acknowledged(), Some(Transition::Connected));
        liveness
    }

    #[test]
    fn handshake_connects_once() {
        let mut liveness = connected(5);
        assert!(liveness.can_send());
        assert_eq!(liveness.handshake_acknowledged(), None);
    }

    #[test]
    fn lost_exactly_once_at_the_limit() {
        let mut liveness = connected(5);
        let transitions: std::vec::Vec<_> = (1..=10).map(|_| liveness.request_scheduled()).collect();
        assert_eq!(transitions.iter().filter(|t| t.is_some()).count(), 1);
        assert_eq!(transitions[4], Some(Transition::Lost));
        assert!(!liveness.can_send());
    }

    #[test]
    fn status_resets_the_count() {
        let mut liveness = connected(3);
        liveness.request_scheduled();
        liveness.request_scheduled();
        liveness.status_received();
        assert_eq!(liveness.state().non_response_count, 0);
        assert_eq!(liveness.request_scheduled(), None);
        assert_eq!(liveness.request_scheduled(), None);
        assert_eq!(liveness.request_scheduled(), Some(Transition::Lost));
    }

    #[test]
    fn reconnect_after_loss() {
        let mut liveness = connected(1);
        assert_eq!(liveness.request_scheduled(), Some(Transition::Lost));
        assert_eq!(liveness.handshake_acknowledged(), Some(Transition::Connected));
        assert_eq!(liveness.state().non_response_count, 0);
    }

    #[test]
    fn closing_the_transport() {
        let mut liveness = connected(5);
        assert_eq!(liveness.transport_closed(), Some(Transition::Lost));
        assert_eq!(liveness.transport_closed(), None);
        assert!(!liveness.state().transport_connected);
    }

    #[test]
    fn last_response_time() {
        let mut liveness = Liveness::new(5);
        assert_eq!(liveness.since_last_response(100), None);
        liveness.frame_received(100);
        assert_eq!(liveness.since_last_response(350), Some(250));
    }
}
