//! Liveness probing for a socket a `ClientStream` is about to hand off for
//! reuse. Conservative by design: any error while probing counts as "not
//! alive" rather than risking a handoff over a half-dead socket.

use socket2::SockRef;
use tokio::net::TcpStream;

/// A socket is alive when the peer endpoint is still resolvable and a
/// zero-timeout poll for a pending error (`SO_ERROR`) comes back empty.
pub fn is_alive(stream: &TcpStream) -> bool {
    if stream.peer_addr().is_err() {
        return false;
    }

    let sock_ref = SockRef::from(stream);
    matches!(sock_ref.take_error(), Ok(None))
}
