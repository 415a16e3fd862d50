/// The error type for a [`Session`].
///
/// Per-datagram decode failures never surface here: malformed input is
/// dropped where it is detected. What remains is socket trouble and the
/// resource faults that terminate a session.
///
/// [`Session`]: crate::connection::Session
#[derive(Debug)]
pub enum SessionError {
    /// The socket failed while transmitting.
    Io(std::io::Error),
    /// The session is closed and cannot accept traffic.
    Closed,
    /// The peer opened more concurrent split groups than allowed.
    SplitPoolExhausted,
}

impl From<std::io::Error> for SessionError {
    fn from(err: std::io::Error) -> Self {
        SessionError::Io(err)
    }
}
