//! Gateway session record
//!
//! Holds what survives a dropped connection (session id, resume URL, last
//! sequence) and decides how the next connection attempt starts.

use crate::core::protocol::{self, ReadyPayload};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Why a connection ended
#[derive(Debug, Clone, PartialEq)]
pub enum Disconnect {
    /// Socket closed, with the close code when the peer sent one
    Closed(Option<u16>),
    /// A heartbeat came due before the previous one was acknowledged
    Zombie,
    /// Server sent RECONNECT (op 7)
    ReconnectRequested,
    /// Server sent INVALID_SESSION (op 9)
    InvalidSession { resumable: bool },
    /// No HELLO within the handshake timeout
    HelloTimeout,
    /// Undecodable or out-of-order frame
    Protocol(String),
    /// WebSocket level failure (connect or read/write)
    Transport(String),
    /// Local shutdown request
    Shutdown,
}

/// How the next connection attempt authenticates
#[derive(Debug, Clone, PartialEq)]
pub enum ReconnectPlan {
    Identify,
    Resume {
        session_id: String,
        resume_url: String,
        seq: Option<u64>,
    },
}

/// Session state shared between the connection loop and observers
#[derive(Debug, Default, Clone)]
pub struct Session {
    session_id: Option<String>,
    resume_url: Option<String>,
    application_id: Option<String>,
    seq: Option<u64>,
    heartbeat_interval: Option<Duration>,
    jitter: f64,
    failed_attempts: usize,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn resume_url(&self) -> Option<&str> {
        self.resume_url.as_deref()
    }

    pub fn application_id(&self) -> Option<&str> {
        self.application_id.as_deref()
    }

    pub fn seq(&self) -> Option<u64> {
        self.seq
    }

    pub fn heartbeat_interval(&self) -> Option<Duration> {
        self.heartbeat_interval
    }

    pub fn jitter(&self) -> f64 {
        self.jitter
    }

    pub fn failed_attempts(&self) -> usize {
        self.failed_attempts
    }

    pub fn is_identified(&self) -> bool {
        self.session_id.is_some()
    }

    pub fn can_resume(&self) -> bool {
        self.session_id.is_some() && self.resume_url.is_some()
    }

    /// Record a frame's sequence number; never moves backwards
    pub fn observe_seq(&mut self, s: Option<u64>) {
        if let Some(s) = s {
            match self.seq {
                Some(current) if s < current => {
                    warn!("Ignoring out-of-order sequence {} (current {})", s, current);
                }
                _ => self.seq = Some(s),
            }
        }
    }

    /// Record the HELLO interval and this connection's jitter factor
    pub fn on_hello(&mut self, interval: Duration, jitter: f64) {
        self.heartbeat_interval = Some(interval);
        self.jitter = if (0.0..1.0).contains(&jitter) { jitter } else { 0.0 };
    }

    pub fn on_ready(&mut self, ready: &ReadyPayload) {
        info!("Gateway session established: {}", ready.session_id);
        self.session_id = Some(ready.session_id.clone());
        self.resume_url = Some(ready.resume_gateway_url.clone());
        if let Some(app) = &ready.application {
            self.application_id = Some(app.id.clone());
        }
        self.failed_attempts = 0;
    }

    pub fn on_resumed(&mut self) {
        info!("Gateway session resumed at seq {:?}", self.seq);
        self.failed_attempts = 0;
    }

    /// Forget the session so the next attempt identifies from scratch
    pub fn clear(&mut self) {
        debug!("Clearing gateway session");
        self.session_id = None;
        self.resume_url = None;
        self.seq = None;
    }

    /// Count a connection attempt that never reached the steady state
    pub fn record_failure(&mut self) -> usize {
        self.failed_attempts += 1;
        self.failed_attempts
    }

    /// Decide how to reconnect after `disconnect`
    ///
    /// Clears the session whenever the vendor would reject a resume.
    pub fn plan_reconnect(&mut self, disconnect: &Disconnect) -> ReconnectPlan {
        let resumable = match disconnect {
            Disconnect::Closed(Some(code)) => {
                if protocol::is_unrecoverable_close(*code) {
                    error!(
                        "Gateway closed with code {} which the vendor marks as not reconnectable; \
                         check the token and intents",
                        code
                    );
                }
                protocol::is_resumable_close(*code, self.is_identified())
            }
            Disconnect::Closed(None) => true,
            Disconnect::Zombie | Disconnect::ReconnectRequested => true,
            Disconnect::InvalidSession { resumable } => *resumable,
            Disconnect::HelloTimeout | Disconnect::Protocol(_) | Disconnect::Transport(_) => true,
            Disconnect::Shutdown => false,
        };

        if resumable {
            if let (Some(session_id), Some(resume_url)) = (&self.session_id, &self.resume_url) {
                return ReconnectPlan::Resume {
                    session_id: session_id.clone(),
                    resume_url: resume_url.clone(),
                    seq: self.seq,
                };
            }
        }

        if !resumable {
            self.clear();
        }
        ReconnectPlan::Identify
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::protocol::ReadyApplication;

    fn ready() -> ReadyPayload {
        ReadyPayload {
            session_id: "sess-1".to_string(),
            resume_gateway_url: "wss://resume.example".to_string(),
            application: Some(ReadyApplication {
                id: "99".to_string(),
            }),
            v: Some(10),
        }
    }

    #[test]
    fn test_seq_tracks_last_increasing_value() {
        let mut session = Session::new();
        assert_eq!(session.seq(), None);
        for s in [1, 2, 5, 9, 12] {
            session.observe_seq(Some(s));
        }
        assert_eq!(session.seq(), Some(12));
    }

    #[test]
    fn test_seq_ignores_null_and_lower_values() {
        let mut session = Session::new();
        session.observe_seq(Some(7));
        session.observe_seq(None);
        session.observe_seq(Some(3));
        assert_eq!(session.seq(), Some(7));
    }

    #[test]
    fn test_resumable_close_plans_resume_with_session_and_seq() {
        let mut session = Session::new();
        session.on_ready(&ready());
        session.observe_seq(Some(41));

        let plan = session.plan_reconnect(&Disconnect::Closed(Some(4000)));
        assert_eq!(
            plan,
            ReconnectPlan::Resume {
                session_id: "sess-1".to_string(),
                resume_url: "wss://resume.example".to_string(),
                seq: Some(41),
            }
        );
    }

    #[test]
    fn test_non_resumable_close_plans_identify_and_clears() {
        let mut session = Session::new();
        session.on_ready(&ready());
        session.observe_seq(Some(41));

        let plan = session.plan_reconnect(&Disconnect::Closed(Some(4004)));
        assert_eq!(plan, ReconnectPlan::Identify);
        assert!(!session.can_resume());
        assert_eq!(session.seq(), None);
    }

    #[test]
    fn test_invalid_session_false_reidentifies() {
        let mut session = Session::new();
        session.on_ready(&ready());
        let plan = session.plan_reconnect(&Disconnect::InvalidSession { resumable: false });
        assert_eq!(plan, ReconnectPlan::Identify);
        assert!(session.session_id().is_none());
    }

    #[test]
    fn test_resumable_close_without_session_identifies() {
        let mut session = Session::new();
        let plan = session.plan_reconnect(&Disconnect::Closed(Some(4000)));
        assert_eq!(plan, ReconnectPlan::Identify);
    }

    #[test]
    fn test_ready_resets_failures_and_records_application() {
        let mut session = Session::new();
        session.record_failure();
        session.record_failure();
        session.on_ready(&ready());
        assert_eq!(session.failed_attempts(), 0);
        assert_eq!(session.application_id(), Some("99"));
    }
}
