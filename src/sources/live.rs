//! Live respiration source
//!
//! Producers push samples through a `LiveFeed`; the engine pulls from the
//! matching `LiveSource`. Each pull takes the newest queued sample and
//! discards older ones, so a slow consumer tracks the present instead of
//! working through a backlog.

use std::io::BufRead;
use std::net::SocketAddr;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use tracing::{debug, info, warn};

use super::row::{parse_row, Row};
use super::{Sample, SignalSource, SourceEvent};
use crate::error::SourceError;

/// How long a pull waits before reporting `Pending`
pub const DEFAULT_POLL: Duration = Duration::from_millis(50);

const DROP_REPORT_EVERY: u64 = 1000;

/// Create a connected producer/consumer pair.
pub fn live_channel(name: impl Into<String>, sample_rate: f64) -> (LiveFeed, LiveSource) {
    let (sender, receiver) = unbounded();
    let feed = LiveFeed {
        sender,
        origin: Instant::now(),
    };
    let source = LiveSource {
        name: name.into(),
        receiver,
        sample_rate,
        poll: DEFAULT_POLL,
        dropped: 0,
        last_timestamp: None,
    };
    (feed, source)
}

/// Producer side of a live stream
#[derive(Clone)]
pub struct LiveFeed {
    sender: Sender<Sample>,
    origin: Instant,
}

impl LiveFeed {
    /// Push an amplitude stamped with the time since the feed was created.
    ///
    /// Returns false once the consumer is gone.
    pub fn push(&self, amplitude: f64) -> bool {
        self.push_at(self.origin.elapsed(), amplitude)
    }

    /// Push an amplitude with a producer-supplied timestamp.
    pub fn push_at(&self, timestamp: Duration, amplitude: f64) -> bool {
        self.sender.send(Sample::new(timestamp, amplitude)).is_ok()
    }
}

/// Consumer side of a live stream
pub struct LiveSource {
    name: String,
    receiver: Receiver<Sample>,
    sample_rate: f64,
    poll: Duration,
    dropped: u64,
    last_timestamp: Option<Duration>,
}

impl LiveSource {
    pub fn with_poll(mut self, poll: Duration) -> Self {
        self.poll = poll;
        self
    }

    /// Samples discarded because a newer one was already waiting
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    fn note_dropped(&mut self, n: u64) {
        if n == 0 {
            return;
        }
        let before = self.dropped / DROP_REPORT_EVERY;
        self.dropped += n;
        debug!(dropped = n, "skipped stale samples");
        if self.dropped / DROP_REPORT_EVERY > before {
            warn!(
                total = self.dropped,
                "run loop is behind the sensor, stale samples dropped"
            );
        }
    }
}

impl SignalSource for LiveSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    fn next_sample(&mut self) -> Result<SourceEvent, SourceError> {
        let mut latest = match self.receiver.recv_timeout(self.poll) {
            Ok(sample) => sample,
            Err(RecvTimeoutError::Timeout) => return Ok(SourceEvent::Pending),
            Err(RecvTimeoutError::Disconnected) => return Err(SourceError::Disconnected),
        };

        let mut skipped = 0;
        loop {
            match self.receiver.try_recv() {
                Ok(newer) => {
                    latest = newer;
                    skipped += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        self.note_dropped(skipped);

        // Never hand out a sample older than one already processed
        if let Some(last) = self.last_timestamp {
            if latest.timestamp < last {
                self.note_dropped(1);
                return Ok(SourceEvent::Pending);
            }
        }
        self.last_timestamp = Some(latest.timestamp);

        Ok(SourceEvent::Sample(latest))
    }
}

/// Read one row per line from `reader` on a background thread.
///
/// Unparseable lines (headers, partial writes) are skipped. The feed is
/// dropped when the reader hits end of input, which the consumer sees as
/// a disconnect.
pub fn spawn_line_reader<R>(reader: R, column: usize, feed: LiveFeed) -> std::io::Result<JoinHandle<()>>
where
    R: BufRead + Send + 'static,
{
    thread::Builder::new()
        .name("live-reader".to_string())
        .spawn(move || {
            for (index, line) in reader.lines().enumerate() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        warn!("live input read error: {}", e);
                        break;
                    }
                };
                match parse_row(&line, column) {
                    Row::Value(value) => {
                        if !feed.push(value) {
                            break;
                        }
                    }
                    Row::Blank => {}
                    Row::Invalid(message) => debug!(line = index + 1, "skipping row: {}", message),
                }
            }
            info!("live input closed");
        })
}

/// Listen for sample rows on a UDP socket.
///
/// Each datagram may hold one or more newline separated rows. Returns the
/// bound address; the listener task ends when the consumer goes away or
/// the socket fails.
pub fn spawn_udp_listener(
    runtime: &tokio::runtime::Handle,
    addr: &str,
    column: usize,
    feed: LiveFeed,
) -> Result<SocketAddr, SourceError> {
    let bind_error = |source| SourceError::Bind {
        addr: addr.to_string(),
        source,
    };
    let socket = std::net::UdpSocket::bind(addr).map_err(bind_error)?;
    socket.set_nonblocking(true).map_err(bind_error)?;
    let local = socket.local_addr().map_err(bind_error)?;

    runtime.spawn(async move {
        let socket = match tokio::net::UdpSocket::from_std(socket) {
            Ok(socket) => socket,
            Err(e) => {
                warn!("UDP listener setup failed: {}", e);
                return;
            }
        };
        info!("listening for respiration data on udp://{}", local);

        let mut buf = [0u8; 2048];
        'recv: loop {
            let len = match socket.recv_from(&mut buf).await {
                Ok((len, _peer)) => len,
                Err(e) => {
                    warn!("UDP receive failed: {}", e);
                    break;
                }
            };
            let text = String::from_utf8_lossy(&buf[..len]);
            for line in text.lines() {
                match parse_row(line, column) {
                    Row::Value(value) => {
                        if !feed.push(value) {
                            break 'recv;
                        }
                    }
                    Row::Blank => {}
                    Row::Invalid(message) => debug!("skipping datagram row: {}", message),
                }
            }
        }
    });

    Ok(local)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_pending_when_idle() {
        let (_feed, source) = live_channel("live", 100.0);
        let mut source = source.with_poll(ms(5));
        assert_eq!(source.next_sample().unwrap(), SourceEvent::Pending);
    }

    #[test]
    fn test_newest_sample_wins() {
        let (feed, mut source) = live_channel("live", 100.0);
        for i in 0..10 {
            feed.push_at(ms(i * 10), i as f64);
        }

        let event = source.next_sample().unwrap();
        assert_eq!(event, SourceEvent::Sample(Sample::new(ms(90), 9.0)));
        assert_eq!(source.dropped(), 9);
    }

    #[test]
    fn test_never_goes_backwards() {
        let (feed, mut source) = live_channel("live", 100.0);
        feed.push_at(ms(100), 1.0);
        assert!(matches!(source.next_sample(), Ok(SourceEvent::Sample(_))));

        feed.push_at(ms(50), 2.0);
        assert_eq!(source.next_sample().unwrap(), SourceEvent::Pending);
        assert_eq!(source.dropped(), 1);
    }

    #[test]
    fn test_disconnect_after_queue_drained() {
        let (feed, mut source) = live_channel("live", 100.0);
        feed.push(0.5);
        drop(feed);

        assert!(matches!(source.next_sample(), Ok(SourceEvent::Sample(_))));
        assert!(matches!(source.next_sample(), Err(SourceError::Disconnected)));
    }

    #[test]
    fn test_line_reader_feeds_samples() {
        let (feed, source) = live_channel("stdin", 100.0);
        let mut source = source.with_poll(ms(500));
        let input = Cursor::new("time,resp\n0.00,0.1\n0.01,0.2\n\n");

        let handle = spawn_line_reader(input, 1, feed).unwrap();
        handle.join().unwrap();

        // Both rows queued before we pulled, so only the newest remains
        match source.next_sample().unwrap() {
            SourceEvent::Sample(sample) => assert_eq!(sample.amplitude, 0.2),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(source.next_sample(), Err(SourceError::Disconnected)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_udp_listener() {
        let (feed, source) = live_channel("udp", 100.0);
        let mut source = source.with_poll(Duration::from_secs(2));

        let addr = spawn_udp_listener(&tokio::runtime::Handle::current(), "127.0.0.1:0", 0, feed)
            .unwrap();

        let sender = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        sender.send_to(b"0.75\n", addr).await.unwrap();

        let event = tokio::task::spawn_blocking(move || source.next_sample())
            .await
            .unwrap()
            .unwrap();
        match event {
            SourceEvent::Sample(sample) => assert_eq!(sample.amplitude, 0.75),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_udp_bind_error() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let (feed, _source) = live_channel("udp", 100.0);
        let result = spawn_udp_listener(rt.handle(), "not an address", 0, feed);
        assert!(matches!(result, Err(SourceError::Bind { .. })));
    }
}
