use async_trait::async_trait;

/// The byte-pipe to the device: a serial port, a BLE characteristic, a
/// TCP socket — whatever actually carries frames. The dispatch engine
/// only ever sees this trait, so tests substitute an in-memory transport
/// without touching the writer or scheduler.
#[async_trait]
pub trait HudTransport {
    async fn write(&self, bytes: &[u8]) -> std::io::Result<()>;
    async fn close(&self) -> std::io::Result<()>;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::Mutex;

    /// Records every frame it's handed, for assertions in scheduler/writer
    /// tests. `fail_after` makes the Nth write onward return an error, to
    /// exercise the writer's error-reporting path.
    #[derive(Default)]
    pub struct MockTransport {
        pub sent: Mutex<Vec<Vec<u8>>>,
        pub fail_after: Option<usize>,
        pub closed: Mutex<bool>,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_fail_after(n: usize) -> Self {
            Self { fail_after: Some(n), ..Default::default() }
        }

        pub fn sent_count(&self) -> usize {
            self.sent.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl HudTransport for MockTransport {
        async fn write(&self, bytes: &[u8]) -> std::io::Result<()> {
            let mut sent = self.sent.lock().unwrap();
            if let Some(n) = self.fail_after {
                if sent.len() >= n {
                    return Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "mock failure"));
                }
            }
            sent.push(bytes.to_vec());
            Ok(())
        }

        async fn close(&self) -> std::io::Result<()> {
            *self.closed.lock().unwrap() = true;
            Ok(())
        }
    }
}
