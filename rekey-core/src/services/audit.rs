//! In-memory security audit log.
//!
//! A bounded, append-only ring of the most recent security-relevant events,
//! kept in process memory for operational visibility. This is explicitly
//! volatile, best-effort state: it survives for the lifetime of the process
//! and nothing longer. Durable audit trails belong to an external sink.
//!
//! The log is an ordinary injectable value, constructed by the composition
//! root and shared via `Arc`; there is no process-global instance.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Default number of events retained; oldest are evicted first.
pub const DEFAULT_CAPACITY: usize = 1000;

/// An IP with more than this many events in the inspected window is flagged.
const SUSPICIOUS_IP_EVENTS: usize = 10;

/// An email with more than this many events in the inspected window is flagged.
const SUSPICIOUS_EMAIL_EVENTS: usize = 5;

/// The closed set of security-relevant occurrences this subsystem records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SecurityEventType {
    PasswordResetRequested,
    PasswordResetCompleted,
    PasswordResetBlocked,
    InvalidTokenAttempt,
    RateLimitExceeded,
    SuspiciousActivity,
}

impl std::fmt::Display for SecurityEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::PasswordResetRequested => "PASSWORD_RESET_REQUESTED",
            Self::PasswordResetCompleted => "PASSWORD_RESET_COMPLETED",
            Self::PasswordResetBlocked => "PASSWORD_RESET_BLOCKED",
            Self::InvalidTokenAttempt => "INVALID_TOKEN_ATTEMPT",
            Self::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            Self::SuspiciousActivity => "SUSPICIOUS_ACTIVITY",
        };
        f.write_str(s)
    }
}

/// An immutable record of one security-relevant occurrence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityEvent {
    pub event_type: SecurityEventType,
    pub email: Option<String>,
    pub ip_address: String,
    pub user_agent: Option<String>,
    pub details: Option<serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

impl SecurityEvent {
    pub fn new(event_type: SecurityEventType, ip_address: impl Into<String>) -> Self {
        Self {
            event_type,
            email: None,
            ip_address: ip_address.into(),
            user_agent: None,
            details: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Summary produced by [`SecurityAuditLog::suspicious_activity`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SuspiciousActivityReport {
    pub suspicious_ips: Vec<String>,
    pub suspicious_emails: Vec<String>,
    pub summary: HashMap<SecurityEventType, usize>,
}

/// Bounded FIFO ring of recent [`SecurityEvent`]s, newest first.
///
/// `log_event` never blocks on I/O and never fails; queries are linear scans
/// over the buffer, acceptable at the fixed capacity. The buffer is guarded
/// by a `Mutex` since events arrive from any request-handling task.
pub struct SecurityAuditLog {
    events: Mutex<VecDeque<SecurityEvent>>,
    capacity: usize,
}

impl Default for SecurityAuditLog {
    fn default() -> Self {
        Self::new()
    }
}

impl SecurityAuditLog {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Record an event, stamping the current time and evicting the oldest
    /// entry once the buffer is full.
    pub fn log_event(&self, mut event: SecurityEvent) {
        event.timestamp = Utc::now();
        self.trace(&event);

        let mut events = self.lock();
        events.push_front(event);
        events.truncate(self.capacity);
    }

    /// The most recent `limit` events, newest first.
    pub fn recent_events(&self, limit: usize) -> Vec<SecurityEvent> {
        self.lock().iter().take(limit).cloned().collect()
    }

    pub fn events_by_type(&self, event_type: SecurityEventType, limit: usize) -> Vec<SecurityEvent> {
        self.lock()
            .iter()
            .filter(|e| e.event_type == event_type)
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn events_by_email(&self, email: &str, limit: usize) -> Vec<SecurityEvent> {
        self.lock()
            .iter()
            .filter(|e| e.email.as_deref() == Some(email))
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn events_by_ip(&self, ip_address: &str, limit: usize) -> Vec<SecurityEvent> {
        self.lock()
            .iter()
            .filter(|e| e.ip_address == ip_address)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Tally events within the trailing window and flag heavy hitters.
    ///
    /// An IP with more than 10 events or an email with more than 5 events in
    /// the window is flagged. Thresholds are fixed, not per-call knobs.
    pub fn suspicious_activity(&self, window_minutes: i64) -> SuspiciousActivityReport {
        let cutoff = Utc::now() - Duration::minutes(window_minutes);

        let mut ip_counts: HashMap<String, usize> = HashMap::new();
        let mut email_counts: HashMap<String, usize> = HashMap::new();
        let mut summary: HashMap<SecurityEventType, usize> = HashMap::new();

        for event in self.lock().iter().filter(|e| e.timestamp > cutoff) {
            *ip_counts.entry(event.ip_address.clone()).or_default() += 1;
            if let Some(email) = &event.email {
                *email_counts.entry(email.clone()).or_default() += 1;
            }
            *summary.entry(event.event_type).or_default() += 1;
        }

        let mut suspicious_ips: Vec<String> = ip_counts
            .into_iter()
            .filter(|(_, count)| *count > SUSPICIOUS_IP_EVENTS)
            .map(|(ip, _)| ip)
            .collect();
        suspicious_ips.sort();

        let mut suspicious_emails: Vec<String> = email_counts
            .into_iter()
            .filter(|(_, count)| *count > SUSPICIOUS_EMAIL_EVENTS)
            .map(|(email, _)| email)
            .collect();
        suspicious_emails.sort();

        SuspiciousActivityReport {
            suspicious_ips,
            suspicious_emails,
            summary,
        }
    }

    /// Drop all buffered events (administrative reset).
    pub fn clear_events(&self) {
        self.lock().clear();
        tracing::info!("security audit events cleared");
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<SecurityEvent>> {
        // The buffer stays consistent even if a panicking thread poisoned it.
        self.events.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn trace(&self, event: &SecurityEvent) {
        match event.event_type {
            SecurityEventType::PasswordResetBlocked
            | SecurityEventType::RateLimitExceeded
            | SecurityEventType::SuspiciousActivity
            | SecurityEventType::InvalidTokenAttempt => {
                tracing::warn!(
                    event_type = %event.event_type,
                    email = event.email.as_deref(),
                    ip_address = %event.ip_address,
                    details = ?event.details,
                    "security event"
                );
            }
            SecurityEventType::PasswordResetRequested
            | SecurityEventType::PasswordResetCompleted => {
                tracing::info!(
                    event_type = %event.event_type,
                    email = event.email.as_deref(),
                    ip_address = %event.ip_address,
                    "security event"
                );
            }
        }
    }
}
