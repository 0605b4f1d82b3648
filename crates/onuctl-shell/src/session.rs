// ── Interactive shell session ──
//
// A `Session` owns one shell channel plus the connector that produced
// it, so callers can reopen after a drop without knowing how the shell
// was built. `send` implements the read-windowing protocol the OLT CLI
// needs: quiet-interval cutoff, prompt grace and `--More--` paging.
// `send_awaiting_prompt` suspends the quiet cutoff until the prompt shows.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{Instant, sleep};
use tracing::{debug, trace};

use crate::error::Error;

/// Marker that ends every CLI prompt (`OLT#`, `OLT(config)#`, ...).
pub const PROMPT_MARKER: &str = "#";

/// Markers the device prints when it pauses continued output.
pub const PAGINATION_MARKERS: [&str; 2] = ["--More--", "-- More --"];

// ── Seams ───────────────────────────────────────────────────────────

/// One open interactive shell channel.
#[async_trait]
pub trait Shell: Send {
    /// Write raw bytes to the channel.
    async fn write(&mut self, data: &[u8]) -> Result<(), Error>;

    /// Wait up to `wait` for the next chunk of output.
    ///
    /// `Ok(None)` means nothing arrived in time. A closed channel is an
    /// error, not `None`.
    async fn recv(&mut self, wait: Duration) -> Result<Option<String>, Error>;

    /// Release the channel. Must tolerate an already-dead connection.
    async fn close(&mut self);
}

/// Produces fresh shells against one device.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn open(&self) -> Result<Box<dyn Shell>, Error>;

    /// Human-readable target label for logs.
    fn label(&self) -> String;
}

// ── Timing ──────────────────────────────────────────────────────────

/// Read-window tuning for [`Session::send`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadTiming {
    /// Pause between writing a command and the first read.
    pub send_delay: Duration,
    /// Overall read window for a single send.
    pub read_window: Duration,
    /// Stop reading once no data has arrived for this long.
    pub quiet: Duration,
    /// Upper bound of a single read attempt.
    pub poll: Duration,
    /// Window granted after a chunk containing the prompt marker.
    pub prompt_grace: Duration,
}

impl Default for ReadTiming {
    fn default() -> Self {
        Self {
            send_delay: Duration::from_millis(100),
            read_window: Duration::from_secs(1),
            quiet: Duration::from_millis(800),
            poll: Duration::from_millis(200),
            prompt_grace: Duration::from_millis(1500),
        }
    }
}

// ── Session ─────────────────────────────────────────────────────────

/// A reopenable interactive session against one device.
pub struct Session {
    connector: Arc<dyn Connector>,
    shell: Option<Box<dyn Shell>>,
    timing: ReadTiming,
}

impl Session {
    /// Open a shell through `connector`.
    pub async fn open(connector: Arc<dyn Connector>, timing: ReadTiming) -> Result<Self, Error> {
        let shell = connector.open().await?;
        debug!(target = %connector.label(), "session opened");
        Ok(Self {
            connector,
            shell: Some(shell),
            timing,
        })
    }

    pub fn timing(&self) -> &ReadTiming {
        &self.timing
    }

    pub fn label(&self) -> String {
        self.connector.label()
    }

    /// Whether a shell is currently attached.
    pub fn is_open(&self) -> bool {
        self.shell.is_some()
    }

    /// [`send`](Self::send) with the session's default delay and window.
    pub async fn send_default(&mut self, command: &str) -> Result<String, Error> {
        let (delay, window) = (self.timing.send_delay, self.timing.read_window);
        self.send(command, delay, window).await
    }

    /// Send `command` (newline-terminated) and capture the output.
    ///
    /// Returns whatever was captured, which may be empty. An error that
    /// indicates connection loss detaches the shell, so the session
    /// reports [`is_open`](Self::is_open) `false` until reopened.
    pub async fn send(
        &mut self,
        command: &str,
        send_delay: Duration,
        read_window: Duration,
    ) -> Result<String, Error> {
        self.guarded(command, send_delay, read_window, false).await
    }

    /// [`send`](Self::send) for slow commands such as `write` or a long
    /// state listing: the quiet cutoff is held off until a prompt arrives,
    /// so only `read_window` ends a capture that stalls mid-output.
    pub async fn send_awaiting_prompt(
        &mut self,
        command: &str,
        send_delay: Duration,
        read_window: Duration,
    ) -> Result<String, Error> {
        self.guarded(command, send_delay, read_window, true).await
    }

    async fn guarded(
        &mut self,
        command: &str,
        send_delay: Duration,
        read_window: Duration,
        hold_for_prompt: bool,
    ) -> Result<String, Error> {
        let result = self
            .exchange(command, send_delay, read_window, hold_for_prompt)
            .await;
        if let Err(ref e) = result {
            if e.is_connection_loss() {
                debug!(target = %self.label(), error = %e, "shell lost during send");
                self.close().await;
            }
        }
        result
    }

    async fn exchange(
        &mut self,
        command: &str,
        send_delay: Duration,
        read_window: Duration,
        hold_for_prompt: bool,
    ) -> Result<String, Error> {
        let timing = self.timing.clone();
        let shell = self.shell.as_mut().ok_or(Error::NotConnected)?;

        let mut text = command.to_owned();
        if !text.ends_with('\n') {
            text.push('\n');
        }
        shell.write(text.as_bytes()).await?;
        sleep(send_delay).await;

        let mut out = String::new();
        let mut deadline = Instant::now() + read_window;
        let mut last_data = Instant::now();
        let mut quiet_armed = !hold_for_prompt;

        loop {
            let now = Instant::now();
            if now >= deadline || (quiet_armed && now.duration_since(last_data) >= timing.quiet) {
                break;
            }

            let wait = timing.poll.min(deadline - now);
            let Some(chunk) = shell.recv(wait).await? else {
                continue;
            };
            last_data = Instant::now();

            let paged = PAGINATION_MARKERS.iter().any(|m| chunk.contains(m));
            let prompted = chunk.contains(PROMPT_MARKER);
            out.push_str(&chunk);

            if paged {
                trace!("pagination marker, requesting more output");
                shell.write(b" ").await?;
                deadline = Instant::now() + read_window;
            } else if prompted {
                deadline = Instant::now() + timing.prompt_grace;
                quiet_armed = true;
            }
        }

        Ok(out)
    }

    /// Drop the current shell (if any) and open a fresh one.
    pub async fn reopen(&mut self) -> Result<(), Error> {
        self.close().await;
        let shell = self.connector.open().await?;
        self.shell = Some(shell);
        debug!(target = %self.label(), "session reopened");
        Ok(())
    }

    /// Release the shell. Safe to call any number of times.
    pub async fn close(&mut self) {
        if let Some(mut shell) = self.shell.take() {
            shell.close().await;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use pretty_assertions::assert_eq;

    use super::*;

    /// Shell that answers each write with the next scripted chunk list.
    struct ScriptShell {
        replies: VecDeque<Vec<&'static str>>,
        pending: VecDeque<String>,
        writes: Arc<Mutex<Vec<String>>>,
        fail_writes: bool,
    }

    #[async_trait]
    impl Shell for ScriptShell {
        async fn write(&mut self, data: &[u8]) -> Result<(), Error> {
            if self.fail_writes {
                return Err(Error::ChannelClosed);
            }
            self.writes
                .lock()
                .unwrap()
                .push(String::from_utf8_lossy(data).into_owned());
            if let Some(next) = self.replies.pop_front() {
                self.pending.extend(next.into_iter().map(String::from));
            }
            Ok(())
        }

        async fn recv(&mut self, wait: Duration) -> Result<Option<String>, Error> {
            if let Some(chunk) = self.pending.pop_front() {
                return Ok(Some(chunk));
            }
            sleep(wait).await;
            Ok(None)
        }

        async fn close(&mut self) {}
    }

    struct ScriptConnector {
        replies: Vec<Vec<&'static str>>,
        writes: Arc<Mutex<Vec<String>>>,
        opens: AtomicUsize,
        fail_writes: bool,
    }

    impl ScriptConnector {
        fn new(replies: Vec<Vec<&'static str>>) -> Arc<Self> {
            Arc::new(Self {
                replies,
                writes: Arc::new(Mutex::new(Vec::new())),
                opens: AtomicUsize::new(0),
                fail_writes: false,
            })
        }
    }

    #[async_trait]
    impl Connector for ScriptConnector {
        async fn open(&self) -> Result<Box<dyn Shell>, Error> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(ScriptShell {
                replies: self.replies.clone().into(),
                pending: VecDeque::new(),
                writes: Arc::clone(&self.writes),
                fail_writes: self.fail_writes,
            }))
        }

        fn label(&self) -> String {
            "script:22".into()
        }
    }

    /// Shell that releases each scripted chunk a fixed time after the
    /// write that triggered it.
    struct TimedShell {
        script: Vec<(Duration, &'static str)>,
        due: VecDeque<(Instant, String)>,
    }

    #[async_trait]
    impl Shell for TimedShell {
        async fn write(&mut self, _data: &[u8]) -> Result<(), Error> {
            let now = Instant::now();
            let script = self.script.drain(..);
            self.due
                .extend(script.map(|(after, chunk)| (now + after, chunk.to_owned())));
            Ok(())
        }

        async fn recv(&mut self, wait: Duration) -> Result<Option<String>, Error> {
            let give_up = Instant::now() + wait;
            match self.due.front() {
                Some((at, _)) if *at <= give_up => {
                    tokio::time::sleep_until(*at).await;
                    Ok(self.due.pop_front().map(|(_, chunk)| chunk))
                }
                _ => {
                    tokio::time::sleep_until(give_up).await;
                    Ok(None)
                }
            }
        }

        async fn close(&mut self) {}
    }

    struct TimedConnector(Vec<(Duration, &'static str)>);

    #[async_trait]
    impl Connector for TimedConnector {
        async fn open(&self) -> Result<Box<dyn Shell>, Error> {
            Ok(Box::new(TimedShell {
                script: self.0.clone(),
                due: VecDeque::new(),
            }))
        }

        fn label(&self) -> String {
            "timed:22".into()
        }
    }

    fn slow_write_device() -> Arc<TimedConnector> {
        Arc::new(TimedConnector(vec![
            (Duration::ZERO, "Building configuration...\r\n"),
            (Duration::from_secs(3), "[OK]\r\nOLT(config)#"),
        ]))
    }

    #[tokio::test(start_paused = true)]
    async fn awaiting_prompt_outlasts_a_silent_save() {
        let mut session = Session::open(slow_write_device(), ReadTiming::default())
            .await
            .unwrap();

        let started = Instant::now();
        let out = session
            .send_awaiting_prompt("write", Duration::from_millis(100), Duration::from_secs(10))
            .await
            .unwrap();

        assert!(out.contains("[OK]"), "capture cut short: {out:?}");
        assert!(out.ends_with("OLT(config)#"));
        assert!(started.elapsed() >= Duration::from_secs(3));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn plain_send_stops_at_quiet_interval_after_banner() {
        let mut session = Session::open(slow_write_device(), ReadTiming::default())
            .await
            .unwrap();

        let out = session
            .send("write", Duration::from_millis(100), Duration::from_secs(10))
            .await
            .unwrap();

        assert_eq!(out, "Building configuration...\r\n");
    }

    #[tokio::test(start_paused = true)]
    async fn awaiting_prompt_is_still_bounded_by_read_window() {
        let connector = ScriptConnector::new(Vec::new());
        let mut session = Session::open(connector, ReadTiming::default())
            .await
            .unwrap();

        let started = Instant::now();
        let out = session
            .send_awaiting_prompt(
                "show gpon onu state gpon-olt_1/2/6",
                Duration::ZERO,
                Duration::from_secs(20),
            )
            .await
            .unwrap();

        assert!(out.is_empty());
        assert!(started.elapsed() >= Duration::from_secs(20));
        assert!(started.elapsed() < Duration::from_secs(21));
    }

    #[tokio::test(start_paused = true)]
    async fn send_terminates_command_with_newline() {
        let connector = ScriptConnector::new(vec![vec!["OLT#"]]);
        let mut session = Session::open(connector.clone(), ReadTiming::default())
            .await
            .unwrap();

        let out = session.send_default("show clock").await.unwrap();

        assert_eq!(out, "OLT#");
        assert_eq!(*connector.writes.lock().unwrap(), vec!["show clock\n"]);
    }

    #[tokio::test(start_paused = true)]
    async fn pagination_marker_injects_space_and_keeps_reading() {
        let connector = ScriptConnector::new(vec![
            vec!["1/2/6:1 working\n--More--"],
            vec!["1/2/6:2 working\nOLT#"],
        ]);
        let mut session = Session::open(connector.clone(), ReadTiming::default())
            .await
            .unwrap();

        let out = session
            .send("show gpon onu state gpon-olt_1/2/6", Duration::ZERO, Duration::from_secs(5))
            .await
            .unwrap();

        assert!(out.contains("1/2/6:1"));
        assert!(out.contains("1/2/6:2"));
        assert_eq!(
            *connector.writes.lock().unwrap(),
            vec!["show gpon onu state gpon-olt_1/2/6\n", " "]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn silent_device_yields_empty_output_after_quiet_interval() {
        let connector = ScriptConnector::new(Vec::new());
        let mut session = Session::open(connector, ReadTiming::default())
            .await
            .unwrap();

        let started = Instant::now();
        let out = session
            .send("interface gpon-olt_1/2/6", Duration::ZERO, Duration::from_secs(30))
            .await
            .unwrap();

        assert!(out.is_empty());
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn multi_chunk_output_is_concatenated() {
        let connector = ScriptConnector::new(vec![vec!["OLT(config)#", "interface x\n", "OLT(config-if)#"]]);
        let mut session = Session::open(connector, ReadTiming::default())
            .await
            .unwrap();

        let out = session.send_default("interface x").await.unwrap();
        assert_eq!(out, "OLT(config)#interface x\nOLT(config-if)#");
    }

    #[tokio::test(start_paused = true)]
    async fn connection_loss_detaches_shell_until_reopened() {
        let connector = Arc::new(ScriptConnector {
            replies: Vec::new(),
            writes: Arc::new(Mutex::new(Vec::new())),
            opens: AtomicUsize::new(0),
            fail_writes: true,
        });
        let mut session = Session::open(connector.clone(), ReadTiming::default())
            .await
            .unwrap();

        let err = session.send_default("enable").await.unwrap_err();
        assert!(err.is_connection_loss());
        assert!(!session.is_open());

        let err = session.send_default("enable").await.unwrap_err();
        assert!(matches!(err, Error::NotConnected));

        session.reopen().await.unwrap();
        assert!(session.is_open());
        assert_eq!(connector.opens.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn close_is_idempotent() {
        let connector = ScriptConnector::new(Vec::new());
        let mut session = Session::open(connector, ReadTiming::default())
            .await
            .unwrap();
        session.close().await;
        session.close().await;
        assert!(!session.is_open());
    }
}
