//! Registration state
//!
//! The trunk refreshes its registration every 300 s. Network failures retry
//! with exponential backoff (2 s doubling to a 60 s cap); an authentication
//! rejection is permanent until the operator fixes the credentials.

use std::time::Duration;

/// Why a registration attempt failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterFailure {
    /// Socket/network error; retried with backoff
    Network,
    /// Credentials rejected; not retried
    Auth,
    /// No response from the registrar; retried with backoff
    Timeout,
}

/// Current state of the trunk registration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationStatus {
    /// No registration attempted yet
    Unregistered,
    /// REGISTER in flight
    Registering,
    /// Registrar accepted; refresh scheduled
    Active,
    /// Last attempt failed
    Failed(RegisterFailure),
}

impl RegistrationStatus {
    /// Whether the trunk can currently take calls
    pub fn is_active(&self) -> bool {
        matches!(self, RegistrationStatus::Active)
    }
}

/// Exponential backoff schedule for re-registration
#[derive(Debug)]
pub struct RegisterBackoff {
    current: Duration,
}

/// First retry delay after a transient failure
pub const BACKOFF_START: Duration = Duration::from_secs(2);
/// Upper bound for the retry delay
pub const BACKOFF_CAP: Duration = Duration::from_secs(60);
/// Registration refresh interval
pub const REGISTER_INTERVAL: Duration = Duration::from_secs(300);
/// How long to wait for a registrar response
pub const REGISTER_TIMEOUT: Duration = Duration::from_secs(5);

impl RegisterBackoff {
    /// Fresh schedule starting at [`BACKOFF_START`]
    pub fn new() -> Self {
        Self {
            current: BACKOFF_START,
        }
    }

    /// Delay to wait before the next attempt; doubles up to [`BACKOFF_CAP`]
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(BACKOFF_CAP);
        delay
    }

    /// Reset after a successful registration
    pub fn reset(&mut self) {
        self.current = BACKOFF_START;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_to_cap() {
        let mut backoff = RegisterBackoff::new();
        let delays: Vec<u64> = (0..7).map(|_| backoff.next_delay().as_secs()).collect();
        assert_eq!(delays, vec![2, 4, 8, 16, 32, 60, 60]);
        backoff.reset();
        assert_eq!(backoff.next_delay(), BACKOFF_START);
    }

    #[test]
    fn only_active_takes_calls() {
        assert!(RegistrationStatus::Active.is_active());
        assert!(!RegistrationStatus::Registering.is_active());
        assert!(!RegistrationStatus::Failed(RegisterFailure::Auth).is_active());
    }
}
