/// Per-IP limits for the unauthenticated credential endpoints.
#[derive(Debug, Clone, Copy)]
pub struct IpRateLimits {
    pub login_per_hour: u32,
    pub signup_per_day: u32,
}

impl IpRateLimits {
    pub fn for_action(&self, action: IpAction) -> (u32, RateWindow) {
        match action {
            IpAction::Login => (self.login_per_hour, RateWindow::Hour),
            IpAction::Signup => (self.signup_per_day, RateWindow::Day),
        }
    }
}

impl Default for IpRateLimits {
    fn default() -> Self {
        Self {
            login_per_hour: 10,
            signup_per_day: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpAction {
    Login,
    Signup,
}

impl IpAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            IpAction::Login => "login",
            IpAction::Signup => "signup",
        }
    }
}

/// Time window for rate limiting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateWindow {
    Hour,
    Day,
}

impl RateWindow {
    pub fn seconds(&self) -> u64 {
        match self {
            RateWindow::Hour => 3600,
            RateWindow::Day => 86400,
        }
    }
}

/// Index of the fixed window containing `now_seconds`.
pub fn window_index(now_seconds: u64, window_seconds: u64) -> u64 {
    now_seconds / window_seconds
}

pub fn unix_now() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}
