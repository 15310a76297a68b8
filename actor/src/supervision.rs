//! Supervision directives
//!

use std::fmt::{self, Display, Formatter};

/// What the message pump does after an actor's handler failed.
///
/// Each failure is judged on its own by `Actor::on_failure`; no restart count
/// or backoff is kept between failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SupervisionDirective {
    /// Keep going with the next message. Whatever state the failed handler
    /// left behind is kept.
    Resume,
    /// Run `post_stop` then `pre_start` on the same instance, then continue.
    #[default]
    Restart,
    /// Unregister the actor. Its path becomes free again.
    Stop,
    /// There is no parent to escalate to: the failure is recorded at error
    /// level and processing resumes.
    Escalate,
}

impl Display for SupervisionDirective {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            SupervisionDirective::Resume => "RESUME",
            SupervisionDirective::Restart => "RESTART",
            SupervisionDirective::Stop => "STOP",
            SupervisionDirective::Escalate => "ESCALATE",
        };
        write!(f, "{}", name)
    }
}
