// Byte stream connections between two devices
// TCP stands in for the serial-port link; the in-memory pair is used for loopback play and tests

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info};

/// An established, ordered, reliable, bidirectional byte stream.
///
/// Once a session starts the mediator owns the connection and is the only one
/// that closes it.
pub trait GameConnection: Send + Sync {
    /// Returns a reader for the incoming direction.
    fn input(&self) -> io::Result<Box<dyn Read + Send>>;

    /// Returns a writer for the outgoing direction.
    fn output(&self) -> io::Result<Box<dyn Write + Send>>;

    /// Closes both directions. Blocked readers on either side see end-of-stream.
    fn close(&self) -> io::Result<()>;

    fn is_closed(&self) -> bool;

    /// Human readable description of the other end.
    fn peer(&self) -> String;
}

// ---------------------------------------------------------------------------
// TCP
// ---------------------------------------------------------------------------

pub struct TcpConnection {
    stream: TcpStream,
    peer: String,
    closed: AtomicBool,
}

impl TcpConnection {
    fn from_stream(stream: TcpStream) -> io::Result<Self> {
        stream.set_nodelay(true)?;
        let peer = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        Ok(Self {
            stream,
            peer,
            closed: AtomicBool::new(false),
        })
    }

    /// Connects to a listening host, trying every resolved address until one answers.
    pub fn connect(address: &str, timeout: Duration) -> io::Result<Self> {
        let mut last_err = None;
        for addr in address.to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => {
                    info!("Connected to {}", addr);
                    return Self::from_stream(stream);
                }
                Err(e) => {
                    debug!("Connect to {} failed: {}", addr, e);
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("no address for {address}"))
        }))
    }
}

impl GameConnection for TcpConnection {
    fn input(&self) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(io::BufReader::new(self.stream.try_clone()?)))
    }

    fn output(&self) -> io::Result<Box<dyn Write + Send>> {
        Ok(Box::new(io::BufWriter::new(self.stream.try_clone()?)))
    }

    fn close(&self) -> io::Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        match self.stream.shutdown(Shutdown::Both) {
            // Already torn down by the peer
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            other => other,
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn peer(&self) -> String {
        self.peer.clone()
    }
}

/// Listening side of a hosted game.
pub struct TcpServer {
    listener: TcpListener,
    cancelled: Arc<AtomicBool>,
    poll_interval: Duration,
}

/// Handle that stops a pending `wait_for_client` from another thread.
#[derive(Clone)]
pub struct ServerCancel(Arc<AtomicBool>);

impl ServerCancel {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

impl TcpServer {
    pub fn bind(port: u16, poll_interval: Duration) -> io::Result<Self> {
        let listener = TcpListener::bind(("0.0.0.0", port))?;
        listener.set_nonblocking(true)?;
        Ok(Self {
            listener,
            cancelled: Arc::new(AtomicBool::new(false)),
            poll_interval,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn cancel_handle(&self) -> ServerCancel {
        ServerCancel(self.cancelled.clone())
    }

    /// Blocks until a client connects. Returns `Ok(None)` if cancelled first.
    pub fn wait_for_client(&self) -> io::Result<Option<TcpConnection>> {
        let started = Instant::now();
        loop {
            if self.cancelled.load(Ordering::SeqCst) {
                info!("Server cancelled after {:?}", started.elapsed());
                return Ok(None);
            }
            match self.listener.accept() {
                Ok((stream, addr)) => {
                    info!("Client connected from {}", addr);
                    stream.set_nonblocking(false)?;
                    return TcpConnection::from_stream(stream).map(Some);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    thread::sleep(self.poll_interval);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// In-memory pair
// ---------------------------------------------------------------------------

enum Chunk {
    Data(Vec<u8>),
    Eof,
}

struct PipeReader {
    rx: Arc<Mutex<mpsc::Receiver<Chunk>>>,
    buf: Vec<u8>,
    pos: usize,
    eof: bool,
}

impl Read for PipeReader {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        while self.pos >= self.buf.len() {
            if self.eof {
                return Ok(0);
            }
            let next = {
                let rx = self.rx.lock().unwrap_or_else(|e| e.into_inner());
                rx.recv()
            };
            match next {
                Ok(Chunk::Data(data)) => {
                    self.buf = data;
                    self.pos = 0;
                }
                Ok(Chunk::Eof) | Err(_) => self.eof = true,
            }
        }
        let n = out.len().min(self.buf.len() - self.pos);
        out[..n].copy_from_slice(&self.buf[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

struct PipeWriter {
    tx: mpsc::Sender<Chunk>,
    closed: Arc<AtomicBool>,
}

impl Write for PipeWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "connection closed"));
        }
        self.tx
            .send(Chunk::Data(data.to_vec()))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "peer gone"))?;
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// One end of an in-memory connection.
pub struct MemoryConnection {
    name: String,
    incoming: Arc<Mutex<mpsc::Receiver<Chunk>>>,
    // Used to wake our own readers on close
    incoming_tx: mpsc::Sender<Chunk>,
    outgoing: mpsc::Sender<Chunk>,
    closed: Arc<AtomicBool>,
}

/// Two connected in-memory endpoints. Bytes written on one are read on the other in order.
pub fn memory_pair() -> (MemoryConnection, MemoryConnection) {
    let (a_tx, a_rx) = mpsc::channel();
    let (b_tx, b_rx) = mpsc::channel();
    let closed = Arc::new(AtomicBool::new(false));
    let a = MemoryConnection {
        name: "memory-a".to_string(),
        incoming: Arc::new(Mutex::new(a_rx)),
        incoming_tx: a_tx.clone(),
        outgoing: b_tx.clone(),
        closed: closed.clone(),
    };
    let b = MemoryConnection {
        name: "memory-b".to_string(),
        incoming: Arc::new(Mutex::new(b_rx)),
        incoming_tx: b_tx,
        outgoing: a_tx,
        closed,
    };
    (a, b)
}

impl GameConnection for MemoryConnection {
    fn input(&self) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(PipeReader {
            rx: self.incoming.clone(),
            buf: Vec::new(),
            pos: 0,
            eof: false,
        }))
    }

    fn output(&self) -> io::Result<Box<dyn Write + Send>> {
        Ok(Box::new(PipeWriter {
            tx: self.outgoing.clone(),
            closed: self.closed.clone(),
        }))
    }

    fn close(&self) -> io::Result<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            let _ = self.outgoing.send(Chunk::Eof);
            let _ = self.incoming_tx.send(Chunk::Eof);
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn peer(&self) -> String {
        self.name.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_pair_delivers_in_order() {
        let (a, b) = memory_pair();
        let mut out = a.output().unwrap();
        out.write_all(b"hello ").unwrap();
        out.write_all(b"world").unwrap();

        let mut input = b.input().unwrap();
        let mut buf = [0u8; 11];
        input.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"hello world");
    }

    #[test]
    fn test_memory_close_wakes_both_readers() {
        let (a, b) = memory_pair();
        let mut a_in = a.input().unwrap();
        let mut b_in = b.input().unwrap();

        let reader = thread::spawn(move || {
            let mut buf = [0u8; 1];
            a_in.read(&mut buf).unwrap()
        });
        b.close().unwrap();
        assert_eq!(reader.join().unwrap(), 0);

        let mut buf = [0u8; 1];
        assert_eq!(b_in.read(&mut buf).unwrap(), 0);
        assert!(a.is_closed());
        assert!(a.output().unwrap().write_all(b"x").is_err());
    }

    #[test]
    fn test_tcp_server_cancel() {
        let server = TcpServer::bind(0, Duration::from_millis(10)).unwrap();
        let cancel = server.cancel_handle();
        let waiter = thread::spawn(move || server.wait_for_client().unwrap().is_none());
        thread::sleep(Duration::from_millis(30));
        cancel.cancel();
        assert!(waiter.join().unwrap());
    }

    #[test]
    fn test_tcp_connect_and_exchange() {
        let server = TcpServer::bind(0, Duration::from_millis(5)).unwrap();
        let port = server.local_addr().unwrap().port();
        let accept = thread::spawn(move || server.wait_for_client().unwrap().unwrap());

        let client = TcpConnection::connect(&format!("127.0.0.1:{port}"), Duration::from_secs(2)).unwrap();
        let host = accept.join().unwrap();

        let mut out = client.output().unwrap();
        out.write_all(b"ping").unwrap();
        out.flush().unwrap();

        let mut buf = [0u8; 4];
        host.input().unwrap().read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"ping");

        client.close().unwrap();
        client.close().unwrap();
        assert!(client.is_closed());
    }
}
