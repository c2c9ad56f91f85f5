use std::time::{SystemTime, UNIX_EPOCH};

/// Actions that count against a submission quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitedAction {
    Feedback,
    SupportTicket,
    Comment,
    Login,
}

impl LimitedAction {
    pub fn as_key(&self) -> &'static str {
        match self {
            Self::Feedback => "feedback",
            Self::SupportTicket => "ticket",
            Self::Comment => "comment",
            Self::Login => "login",
        }
    }
}

/// Per-hour quotas, built from configuration.
#[derive(Debug, Clone, Copy)]
pub struct RateLimits {
    pub submissions_per_hour: u32,
    pub login_attempts_per_hour: u32,
}

impl RateLimits {
    pub fn limit_for(&self, action: LimitedAction) -> u32 {
        match action {
            LimitedAction::Feedback | LimitedAction::SupportTicket | LimitedAction::Comment => {
                self.submissions_per_hour
            }
            LimitedAction::Login => self.login_attempts_per_hour,
        }
    }
}

/// All quotas use one-hour fixed windows.
pub const WINDOW_SECONDS: u64 = 3600;

/// Index of the fixed window containing now.
pub fn current_window(window_seconds: u64) -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0);
    now / window_seconds
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submissions_share_one_quota() {
        let limits = RateLimits {
            submissions_per_hour: 7,
            login_attempts_per_hour: 3,
        };
        assert_eq!(limits.limit_for(LimitedAction::Feedback), 7);
        assert_eq!(limits.limit_for(LimitedAction::Comment), 7);
        assert_eq!(limits.limit_for(LimitedAction::Login), 3);
    }

    #[test]
    fn windows_are_coarser_for_longer_spans() {
        let hour = current_window(WINDOW_SECONDS);
        let day = current_window(WINDOW_SECONDS * 24);
        assert!(hour >= day * 24);
    }
}
