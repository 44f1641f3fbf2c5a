//! Kernel errors.
//!
//! Every variant signals misuse of the kernel by model code. None of them is
//! expected in a correctly wired simulation, so they are fatal to the run.

use thiserror::Error;

use crate::{ProcessId, ProcessState, ResourceId};

#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum SimError {
    /// An event was scheduled before the current clock (or at a NaN time).
    #[error("cannot schedule an event at t={time} when the clock reads t={now}")]
    InvalidSchedule { time: f64, now: f64 },

    /// A resource was created with zero slots.
    #[error("resource capacity must be at least 1")]
    InvalidCapacity,

    /// A process referred to a resource that was never added.
    #[error("unknown resource {0:?}")]
    UnknownResource(ResourceId),

    /// A process id that no simulation handed out.
    #[error("unknown process {0:?}")]
    UnknownProcess(ProcessId),

    /// Only a process sleeping on a timeout can be woken from outside. A
    /// process queued on a resource is resumed by the grant alone.
    #[error("cannot wake {process:?} while it is {state:?}")]
    NotSleeping {
        process: ProcessId,
        state: ProcessState,
    },

    /// A slot was released while no slot was held.
    #[error("released {0:?} while no slot was in use")]
    IdleRelease(ResourceId),
}

pub type SimResult<T> = std::result::Result<T, SimError>;
