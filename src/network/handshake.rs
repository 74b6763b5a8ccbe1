// Session handshake
// Runs once per connection before any player events, fixing roles and exchanging identities

use std::io::{Read, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, info};

use super::error::ProtocolError;
use super::wire::{DataInput, DataOutput};

/// Which side of the connection we are. Fixed for the whole session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Server,
    Client,
}

/// What both sides know once the handshake succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeResult {
    pub role: Role,
    /// Shared board seed. Chosen by the client, received by the server.
    pub seed: i64,
    pub remote_id: i32,
    pub remote_name: String,
}

/// The handshake failed. No part of it can be used.
#[derive(Debug, thiserror::Error)]
#[error("handshake failed as {role:?}: {source}")]
pub struct HandshakeError {
    pub role: Role,
    #[source]
    pub source: ProtocolError,
}

/// Local identity sent to the other side.
#[derive(Debug, Clone, Copy)]
pub struct LocalIdentity<'a> {
    pub id: i32,
    pub name: &'a str,
}

/// Runs the handshake for `role`. The client seeds with the current time.
pub fn handshake<R, W>(
    role: Role,
    input: &mut R,
    output: &mut W,
    local: LocalIdentity<'_>,
) -> Result<HandshakeResult, HandshakeError>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    match role {
        Role::Server => server_handshake(input, output, local),
        Role::Client => client_handshake(input, output, local, current_millis()),
    }
}

/// Server side: read the client's seed and identity first, then answer with ours.
pub fn server_handshake<R, W>(
    input: &mut R,
    output: &mut W,
    local: LocalIdentity<'_>,
) -> Result<HandshakeResult, HandshakeError>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let mut run = || -> Result<HandshakeResult, ProtocolError> {
        let seed = input.read_long()?;
        let remote_id = input.read_int()?;
        let remote_name = input.read_utf()?;
        debug!("Server read client id={} name={:?}", remote_id, remote_name);

        output.write_int(local.id)?;
        output.write_utf(local.name)?;
        output.flush()?;

        Ok(HandshakeResult {
            role: Role::Server,
            seed,
            remote_id,
            remote_name,
        })
    };
    let result = run().map_err(|source| HandshakeError {
        role: Role::Server,
        source,
    })?;
    info!("Handshake complete as server with {:?}", result.remote_name);
    Ok(result)
}

/// Client side: send seed and identity, then read the server's identity.
pub fn client_handshake<R, W>(
    input: &mut R,
    output: &mut W,
    local: LocalIdentity<'_>,
    seed: i64,
) -> Result<HandshakeResult, HandshakeError>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let mut run = || -> Result<HandshakeResult, ProtocolError> {
        output.write_long(seed)?;
        output.write_int(local.id)?;
        output.write_utf(local.name)?;
        output.flush()?;

        let remote_id = input.read_int()?;
        let remote_name = input.read_utf()?;

        Ok(HandshakeResult {
            role: Role::Client,
            seed,
            remote_id,
            remote_name,
        })
    };
    let result = run().map_err(|source| HandshakeError {
        role: Role::Client,
        source,
    })?;
    info!("Handshake complete as client with {:?}", result.remote_name);
    Ok(result)
}

pub(crate) fn current_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::connection::{memory_pair, GameConnection};
    use std::io::Cursor;
    use std::thread;

    #[test]
    fn test_loopback_handshake_exchanges_identities() {
        let (server_conn, client_conn) = memory_pair();

        let server = thread::spawn(move || {
            let mut input = server_conn.input().unwrap();
            let mut output = server_conn.output().unwrap();
            server_handshake(
                &mut *input,
                &mut *output,
                LocalIdentity { id: 11, name: "host" },
            )
            .unwrap()
        });

        let mut input = client_conn.input().unwrap();
        let mut output = client_conn.output().unwrap();
        let client = client_handshake(
            &mut *input,
            &mut *output,
            LocalIdentity { id: -22, name: "gäst" },
            1_234_567_890_123,
        )
        .unwrap();
        let server = server.join().unwrap();

        assert_eq!(client.role, Role::Client);
        assert_eq!(client.remote_id, 11);
        assert_eq!(client.remote_name, "host");

        assert_eq!(server.role, Role::Server);
        assert_eq!(server.remote_id, -22);
        assert_eq!(server.remote_name, "gäst");
        assert_eq!(server.seed, client.seed);
    }

    #[test]
    fn test_client_writes_seed_first() {
        let mut written = Vec::new();
        // Server reply: id 5, name "s"
        let mut reply = Cursor::new(vec![0, 0, 0, 5, 0, 1, b's']);
        client_handshake(&mut reply, &mut written, LocalIdentity { id: 1, name: "c" }, 42).unwrap();
        assert_eq!(
            written,
            vec![0, 0, 0, 0, 0, 0, 0, 42, 0, 0, 0, 1, 0, 1, b'c']
        );
    }

    #[test]
    fn test_truncated_reply_fails_handshake() {
        let mut written = Vec::new();
        let mut reply = Cursor::new(vec![0, 0]);
        let err = client_handshake(&mut reply, &mut written, LocalIdentity { id: 1, name: "c" }, 0)
            .unwrap_err();
        assert_eq!(err.role, Role::Client);
        assert!(err.source.is_end_of_stream());
    }

    #[test]
    fn test_server_fails_on_closed_stream() {
        let mut written = Vec::new();
        let mut empty = Cursor::new(Vec::new());
        let err = server_handshake(&mut empty, &mut written, LocalIdentity { id: 1, name: "s" })
            .unwrap_err();
        assert_eq!(err.role, Role::Server);
        assert!(written.is_empty());
    }
}
