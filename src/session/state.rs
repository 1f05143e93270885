use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

use tokio::sync::watch;

/// Session lifecycle states. Transitions are strictly monotonic:
/// Idle -> Connecting -> Active -> Draining -> Closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RunState {
    Idle = 0,
    Connecting = 1,
    Active = 2,
    Draining = 3,
    Closed = 4,
}

impl RunState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => RunState::Idle,
            1 => RunState::Connecting,
            2 => RunState::Active,
            3 => RunState::Draining,
            _ => RunState::Closed,
        }
    }
}

/// Why the session left the Active state. Recorded once, by whichever
/// party wins the Active -> Draining transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Operator-initiated (signal or explicit stop)
    UserStop,
    /// Server closed the WebSocket or the stream ended
    PeerClosed,
    /// A binary frame could not be sent
    SendFailed,
    /// The receive side of the transport failed
    RecvFailed,
    /// The capture source stopped producing frames mid-session
    CaptureEnded,
}

impl StopReason {
    pub fn label(&self) -> &'static str {
        match self {
            StopReason::UserStop => "user stop",
            StopReason::PeerClosed => "peer closed",
            StopReason::SendFailed => "send failed",
            StopReason::RecvFailed => "receive failed",
            StopReason::CaptureEnded => "capture ended",
        }
    }

    /// Faults exit non-zero; user stop and peer closure do not.
    pub fn is_fault(&self) -> bool {
        matches!(
            self,
            StopReason::SendFailed | StopReason::RecvFailed | StopReason::CaptureEnded
        )
    }

    fn to_u8(self) -> u8 {
        match self {
            StopReason::UserStop => 1,
            StopReason::PeerClosed => 2,
            StopReason::SendFailed => 3,
            StopReason::RecvFailed => 4,
            StopReason::CaptureEnded => 5,
        }
    }

    fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(StopReason::UserStop),
            2 => Some(StopReason::PeerClosed),
            3 => Some(StopReason::SendFailed),
            4 => Some(StopReason::RecvFailed),
            5 => Some(StopReason::CaptureEnded),
            _ => None,
        }
    }
}

/// Shared session state: the run-state machine, the shutdown wake channel,
/// and the frame counter. One instance per session, shared by both paths
/// and the coordinator via `Arc`.
///
/// `begin_draining` is the only racy transition; compare-and-set makes the
/// first caller the winner so the stop reason is recorded exactly once and
/// error logging is never duplicated.
#[derive(Debug)]
pub struct SessionState {
    state: AtomicU8,
    stop_reason: AtomicU8,
    frames_sent: AtomicUsize,
    shutdown_tx: watch::Sender<bool>,
}

impl SessionState {
    pub fn new() -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            state: AtomicU8::new(RunState::Idle as u8),
            stop_reason: AtomicU8::new(0),
            frames_sent: AtomicUsize::new(0),
            shutdown_tx,
        }
    }

    pub fn current(&self) -> RunState {
        RunState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn is_active(&self) -> bool {
        self.current() == RunState::Active
    }

    /// Idle -> Connecting. False when the session was already started.
    pub fn begin_connecting(&self) -> bool {
        self.advance(RunState::Idle, RunState::Connecting)
    }

    /// Connecting -> Active.
    pub fn activate(&self) -> bool {
        self.advance(RunState::Connecting, RunState::Active)
    }

    /// Active -> Draining. The winner records the stop reason and wakes
    /// every waiter; losers (and late callers) observe the transition.
    pub fn begin_draining(&self, reason: StopReason) -> bool {
        if !self.advance(RunState::Active, RunState::Draining) {
            return false;
        }
        self.stop_reason.store(reason.to_u8(), Ordering::SeqCst);
        self.shutdown_tx.send_replace(true);
        true
    }

    /// Connecting -> Draining, for sessions torn down before they activate.
    pub fn abandon_connecting(&self) -> bool {
        self.advance(RunState::Connecting, RunState::Draining)
    }

    /// Draining -> Closed.
    pub fn mark_closed(&self) -> bool {
        self.advance(RunState::Draining, RunState::Closed)
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        StopReason::from_u8(self.stop_reason.load(Ordering::SeqCst))
    }

    /// A fresh shutdown watcher. `wait_for(|stop| *stop)` observes the
    /// current value before suspending, so a subscriber that arrives after
    /// the wake can never miss it.
    pub fn subscribe_shutdown(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    pub fn record_frame_sent(&self) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn frames_sent(&self) -> usize {
        self.frames_sent.load(Ordering::Relaxed)
    }

    fn advance(&self, from: RunState, to: RunState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}
