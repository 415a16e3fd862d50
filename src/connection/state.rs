/// The lifecycle of a session, driven by the offline handshake and the
/// connection request exchanged inside frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SessionStatus {
    /// First contact; nothing negotiated yet.
    Fresh,
    /// OpenConnectionRequest1 was answered.
    HandshakeStage1,
    /// OpenConnectionRequest2 was answered; frames may flow.
    HandshakeStage2,
    /// The connection request completed; application payloads flow.
    Established,
    /// Disconnected or timed out; the session only awaits cleanup.
    Closed,
}

impl SessionStatus {
    pub fn is_established(self) -> bool {
        self == SessionStatus::Established
    }

    pub fn is_closed(self) -> bool {
        self == SessionStatus::Closed
    }

    /// Whether the offline handshake is still in progress.
    pub fn in_handshake(self) -> bool {
        matches!(
            self,
            SessionStatus::Fresh | SessionStatus::HandshakeStage1 | SessionStatus::HandshakeStage2
        )
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fresh => write!(f, "Fresh"),
            Self::HandshakeStage1 => write!(f, "HandshakeStage1"),
            Self::HandshakeStage2 => write!(f, "HandshakeStage2"),
            Self::Established => write!(f, "Established"),
            Self::Closed => write!(f, "Closed"),
        }
    }
}
