// SPDX-License-Identifier: GPL-3.0-only

//! What a recording session does about repeated write failures
//!
//! Failures are counted per sink and only while consecutive; a successful
//! write resets the streak. A sink that never opened is not counted.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum WriteFailurePolicy {
    /// Keep writing, failures are only logged
    #[default]
    Tolerate,
    /// Report the session as degraded once a sink reaches `after` failures in a row
    Warn { after: u32 },
    /// End the session once a sink reaches `after` failures in a row
    Abort { after: u32 },
}

/// Outcome of applying the policy to a failure streak
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyVerdict {
    Continue,
    Degraded { failures: u32 },
    Abort { failures: u32 },
}

impl WriteFailurePolicy {
    /// Judge a sink that has just failed `consecutive` times in a row
    ///
    /// `Warn` fires once per streak, exactly when the threshold is reached.
    pub fn evaluate(&self, consecutive: u32) -> PolicyVerdict {
        match *self {
            WriteFailurePolicy::Tolerate => PolicyVerdict::Continue,
            WriteFailurePolicy::Warn { after } if consecutive == after.max(1) => {
                PolicyVerdict::Degraded {
                    failures: consecutive,
                }
            }
            WriteFailurePolicy::Warn { .. } => PolicyVerdict::Continue,
            WriteFailurePolicy::Abort { after } if consecutive >= after.max(1) => {
                PolicyVerdict::Abort {
                    failures: consecutive,
                }
            }
            WriteFailurePolicy::Abort { .. } => PolicyVerdict::Continue,
        }
    }
}

impl std::fmt::Display for WriteFailurePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WriteFailurePolicy::Tolerate => write!(f, "tolerate"),
            WriteFailurePolicy::Warn { after } => write!(f, "warn after {}", after),
            WriteFailurePolicy::Abort { after } => write!(f, "abort after {}", after),
        }
    }
}
