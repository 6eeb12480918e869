use core::time::Duration;
use super::devices::ModuleIdentity;


/// tunable parameters of a [Bridge](super::Bridge)
#[derive(Clone, Debug)]
pub struct Parameters {
    /// width of the pulse announcing the master on the sense lines
    pub pulse: Duration,
    /// error thresholds used while the head unit record is not mapped in the image
    pub error_budget: ErrorBudget,
    /// identity of the head unit, always first in the device list
    pub head: ModuleIdentity,
}
impl Default for Parameters {
    fn default() -> Self {
        Self {
            pulse: Duration::from_millis(9),
            error_budget: ErrorBudget::default(),
            head: ModuleIdentity::head(),
        }
    }
}
impl Parameters {
    pub fn with_pulse(mut self, pulse: Duration) -> Self {
        self.pulse = pulse;
        self
    }
    pub fn with_error_budget(mut self, budget: ErrorBudget) -> Self {
        self.error_budget = budget;
        self
    }
    pub fn with_head(mut self, head: ModuleIdentity) -> Self {
        self.head = head;
        self
    }
}


/// thresholds on the communication error counter, 0 disables a threshold
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ErrorBudget {
    /// above it inputs are no longer trusted
    pub soft: u16,
    /// above it the bridge is stopped
    pub hard: u16,
}
/// position of an error counter relative to an [ErrorBudget]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    Nominal,
    Degraded,
    Exceeded,
}
impl ErrorBudget {
    pub const fn new(soft: u16, hard: u16) -> Self {
        Self {soft, hard}
    }
    pub const fn check(&self, errors: u16) -> Verdict {
        if self.hard > 0 && errors > self.hard
            {Verdict::Exceeded}
        else if self.soft > 0 && errors > self.soft
            {Verdict::Degraded}
        else
            {Verdict::Nominal}
    }
}
