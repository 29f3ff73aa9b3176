/// The byte source the router reads from: a UART, a ring buffer fed by
/// an ISR, a loopback for tests. Blocking by design — the read loop runs
/// on its own `std::thread`, not inside an async runtime.
pub trait DeviceTransport {
    /// Read at least one byte into `buf`, blocking until data is
    /// available. Returns the number of bytes read, or an I/O error if
    /// the underlying source is gone.
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize>;
}

/// Runs a [`crate::router::StreamRouter`] against a [`DeviceTransport`]
/// on a dedicated thread until the transport returns an error or
/// `running` is cleared.
pub fn spawn_reader<T>(
    mut transport: T,
    mut router: crate::router::StreamRouter,
    running: std::sync::Arc<std::sync::atomic::AtomicBool>,
    read_chunk: usize,
) -> std::thread::JoinHandle<crate::router::StreamRouter>
where
    T: DeviceTransport + Send + 'static,
{
    std::thread::spawn(move || {
        let mut buf = vec![0u8; read_chunk.max(1)];
        while running.load(std::sync::atomic::Ordering::Relaxed) {
            match transport.read(&mut buf) {
                Ok(0) => continue,
                Ok(n) => {
                    let _ = router.feed_slice(&buf[..n]);
                }
                Err(_) => break,
            }
        }
        router
    })
}

#[cfg(test)]
pub mod mock {
    use super::DeviceTransport;
    use std::collections::VecDeque;

    /// Hands back bytes from a fixed queue, then returns `WouldBlock`
    /// forever — enough to drive one feed pass in a test without
    /// needing a real thread loop to terminate cleanly.
    pub struct LoopbackTransport {
        pending: VecDeque<u8>,
    }

    impl LoopbackTransport {
        pub fn new(bytes: Vec<u8>) -> Self {
            Self { pending: bytes.into() }
        }
    }

    impl DeviceTransport for LoopbackTransport {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pending.is_empty() {
                return Err(std::io::Error::new(std::io::ErrorKind::WouldBlock, "no more test data"));
            }
            let mut n = 0;
            while n < buf.len() {
                let Some(b) = self.pending.pop_front() else { break };
                buf[n] = b;
                n += 1;
            }
            Ok(n)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::LoopbackTransport;
    use super::*;
    use crate::msgf::MsgfReceiver;
    use crate::router::StreamRouter;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn reader_thread_feeds_router_until_transport_errors() {
        let frame = hud_wire::encode_msgf_reboot(1, false);
        let transport = LoopbackTransport::new(frame);

        let mut router = StreamRouter::new(64).unwrap();
        router.register(Box::new(MsgfReceiver::new(hud_wire::MAGIC_MSGF, false, 4, 32).unwrap()));

        let running = Arc::new(AtomicBool::new(true));
        let handle = spawn_reader(transport, router, running.clone(), 256);
        let router = handle.join().unwrap();
        assert_eq!(router.frames_ok(), 1);
    }
}
