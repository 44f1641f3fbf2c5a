//! Discrete-event simulation kernel.
//!
//! A [`Simulation`] owns a virtual clock, a time-ordered event queue, a table
//! of resumable [`Process`]es and any number of capacity-bounded
//! [`Resource`]s. Processes are explicit state machines: the kernel calls
//! [`Process::resume`], the process does its work against a [`Context`] and
//! tells the kernel what it is waiting for next by returning a [`Step`].
//!
//! Everything runs on one thread. Events at the same timestamp fire in the
//! order they were scheduled, so a run is fully determined by its inputs and
//! the seeds of whatever random generators the model state carries.
//!
//! ```rust
//! use des::{Context, Process, SimResult, Simulation, Step};
//!
//! struct Ticker;
//!
//! impl Process<Vec<f64>> for Ticker {
//!     fn resume(&mut self, ctx: &mut Context<'_, Vec<f64>>) -> SimResult<Step> {
//!         let now = ctx.now();
//!         ctx.state_mut().push(now);
//!         Ok(Step::Timeout(2.5))
//!     }
//! }
//!
//! let mut sim = Simulation::new(Vec::new());
//! sim.spawn(Ticker);
//! sim.run_until(6.0).unwrap();
//!
//! assert_eq!(sim.state(), &vec![0.0, 2.5, 5.0]);
//! assert_eq!(sim.now(), 6.0);
//! ```

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use tracing::trace;

mod error;
pub mod parallel;
mod resource;

pub use error::{SimError, SimResult};
pub use resource::{Grant, Resource, ResourceId};

/// Handle to a process registered with a [`Simulation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProcessId(pub(crate) usize);

impl ProcessId {
    /// Registration order of the process, starting at 0.
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Running,
    WaitingTimeout,
    WaitingResource,
    Terminated,
}

/// What a process waits for after a call to [`Process::resume`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Step {
    /// Resume again after this many time units.
    Timeout(f64),
    /// Resume once a slot of this resource is held. If a slot is free the
    /// process is resumed straight away, inside the same dispatch.
    Request(ResourceId),
    /// The process is done and is dropped by the kernel.
    Terminate,
}

/// A resumable unit of simulated behaviour over model state `C`.
pub trait Process<C> {
    fn resume(&mut self, ctx: &mut Context<'_, C>) -> SimResult<Step>;
}

/// Why an event resumes its process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Wake {
    Timeout,
    Granted,
}

impl Wake {
    // the only state in which this kind of wake-up is still current
    fn expects(self) -> ProcessState {
        match self {
            Wake::Timeout => ProcessState::WaitingTimeout,
            Wake::Granted => ProcessState::WaitingResource,
        }
    }
}

struct Event {
    time: f64,
    sequence: u64,
    process: ProcessId,
    wake: Wake,
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Event {}

impl Ord for Event {
    // BinaryHeap is a max-heap, so the earliest (time, sequence) must compare greatest
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .time
            .total_cmp(&self.time)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

struct ProcessEntry<C> {
    // None while the process is being resumed and after it terminates
    process: Option<Box<dyn Process<C>>>,
    state: ProcessState,
}

struct Scheduler<C> {
    now: f64,
    next_sequence: u64,
    queue: BinaryHeap<Event>,
    processes: Vec<ProcessEntry<C>>,
    resources: Vec<Resource>,
}

impl<C> Scheduler<C> {
    fn new() -> Self {
        Scheduler {
            now: 0.0,
            next_sequence: 0,
            queue: BinaryHeap::new(),
            processes: Vec::new(),
            resources: Vec::new(),
        }
    }

    fn schedule_at(&mut self, time: f64, process: ProcessId) -> SimResult<()> {
        // written so that NaN fails too
        if !(time >= self.now) {
            return Err(SimError::InvalidSchedule {
                time,
                now: self.now,
            });
        }
        self.enqueue(time, process, Wake::Timeout);
        Ok(())
    }

    // callers guarantee time >= now
    fn enqueue(&mut self, time: f64, process: ProcessId, wake: Wake) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.queue.push(Event {
            time,
            sequence,
            process,
            wake,
        });
    }

    fn register(&mut self, process: Box<dyn Process<C>>) -> ProcessId {
        let id = ProcessId(self.processes.len());
        self.processes.push(ProcessEntry {
            process: Some(process),
            state: ProcessState::WaitingTimeout,
        });
        id
    }

    /// Registers `process` and queues its first resumption at the current
    /// time, behind every event already due now.
    fn spawn_now(&mut self, process: Box<dyn Process<C>>) -> ProcessId {
        let id = self.register(process);
        self.enqueue(self.now, id, Wake::Timeout);
        id
    }

    fn spawn_at(&mut self, time: f64, process: Box<dyn Process<C>>) -> SimResult<ProcessId> {
        if !(time >= self.now) {
            return Err(SimError::InvalidSchedule {
                time,
                now: self.now,
            });
        }
        let id = self.register(process);
        self.schedule_at(time, id)?;
        Ok(id)
    }

    fn resource(&self, id: ResourceId) -> SimResult<&Resource> {
        self.resources.get(id.0).ok_or(SimError::UnknownResource(id))
    }

    fn resource_mut(&mut self, id: ResourceId) -> SimResult<&mut Resource> {
        self.resources
            .get_mut(id.0)
            .ok_or(SimError::UnknownResource(id))
    }

    fn release(&mut self, id: ResourceId) -> SimResult<()> {
        if let Some(waiter) = self.resource_mut(id)?.release()? {
            // zero-delay wake-up still goes through the queue to keep tie order
            self.enqueue(self.now, waiter, Wake::Granted);
        }
        Ok(())
    }
}

/// The view a process gets of the simulation while it is being resumed.
pub struct Context<'a, C> {
    scheduler: &'a mut Scheduler<C>,
    state: &'a mut C,
    current: ProcessId,
}

impl<C> Context<'_, C> {
    pub fn now(&self) -> f64 {
        self.scheduler.now
    }

    /// Id of the process being resumed.
    pub fn id(&self) -> ProcessId {
        self.current
    }

    pub fn state(&self) -> &C {
        self.state
    }

    pub fn state_mut(&mut self) -> &mut C {
        self.state
    }

    /// Registers a new process. Its first resumption is scheduled at the
    /// current time, behind every event already queued for this instant.
    pub fn spawn<P: Process<C> + 'static>(&mut self, process: P) -> ProcessId {
        self.scheduler.spawn_now(Box::new(process))
    }

    /// Releases one slot held on `resource`, waking its oldest waiter.
    pub fn release(&mut self, resource: ResourceId) -> SimResult<()> {
        self.scheduler.release(resource)
    }

    pub fn resource(&self, resource: ResourceId) -> SimResult<&Resource> {
        self.scheduler.resource(resource)
    }

    /// Length of the wait queue of `resource`.
    pub fn queue_len(&self, resource: ResourceId) -> SimResult<usize> {
        self.resource(resource).map(Resource::queue_len)
    }
}

/// Event scheduler, process table and model state for one simulation run.
pub struct Simulation<C> {
    scheduler: Scheduler<C>,
    state: C,
}

impl<C> Simulation<C> {
    pub fn new(state: C) -> Simulation<C> {
        Simulation {
            scheduler: Scheduler::new(),
            state,
        }
    }

    pub fn now(&self) -> f64 {
        self.scheduler.now
    }

    pub fn add_resource(&mut self, capacity: usize) -> SimResult<ResourceId> {
        let id = ResourceId(self.scheduler.resources.len());
        self.scheduler.resources.push(Resource::new(id, capacity)?);
        Ok(id)
    }

    pub fn resource(&self, id: ResourceId) -> Option<&Resource> {
        self.scheduler.resources.get(id.0)
    }

    /// Every resource, in the order they were added.
    pub fn resources(&self) -> impl Iterator<Item = &Resource> {
        self.scheduler.resources.iter()
    }

    /// Registers a process and schedules its first resumption now.
    pub fn spawn<P: Process<C> + 'static>(&mut self, process: P) -> ProcessId {
        self.scheduler.spawn_now(Box::new(process))
    }

    /// Registers a process whose first resumption happens at `time`.
    pub fn spawn_at<P: Process<C> + 'static>(
        &mut self,
        time: f64,
        process: P,
    ) -> SimResult<ProcessId> {
        self.scheduler.spawn_at(time, Box::new(process))
    }

    /// Schedules an extra resumption of a process sleeping on a timeout.
    ///
    /// Fails with [`SimError::InvalidSchedule`] if `time` lies before the
    /// clock and with [`SimError::NotSleeping`] unless the process is in
    /// [`ProcessState::WaitingTimeout`]. A wake-up that is no longer current
    /// when it comes due is dropped.
    pub fn schedule_at(&mut self, time: f64, process: ProcessId) -> SimResult<()> {
        match self.process_state(process) {
            Some(ProcessState::WaitingTimeout) => self.scheduler.schedule_at(time, process),
            Some(state) => Err(SimError::NotSleeping { process, state }),
            None => Err(SimError::UnknownProcess(process)),
        }
    }

    pub fn process_state(&self, id: ProcessId) -> Option<ProcessState> {
        self.scheduler.processes.get(id.0).map(|entry| entry.state)
    }

    pub fn pending_events(&self) -> usize {
        self.scheduler.queue.len()
    }

    /// Time of the earliest queued event.
    pub fn peek_time(&self) -> Option<f64> {
        self.scheduler.queue.peek().map(|event| event.time)
    }

    /// Dispatches the earliest event if it lies strictly before `deadline`.
    ///
    /// Returns `false` once nothing is left to do before the deadline. The
    /// clock is left at the last dispatched event.
    pub fn step(&mut self, deadline: f64) -> SimResult<bool> {
        match self.scheduler.queue.peek() {
            Some(event) if event.time < deadline => {}
            _ => return Ok(false),
        }
        let Some(event) = self.scheduler.queue.pop() else {
            return Ok(false);
        };
        self.scheduler.now = event.time;
        trace!(
            t = event.time,
            sequence = event.sequence,
            process = event.process.0,
            "dispatch"
        );
        self.dispatch(event.process, event.wake)?;
        Ok(true)
    }

    /// Runs every event scheduled before `deadline`, then sets the clock to
    /// `deadline`. Events at exactly `deadline` stay queued.
    pub fn run_until(&mut self, deadline: f64) -> SimResult<()> {
        if !(deadline >= self.scheduler.now) {
            return Err(SimError::InvalidSchedule {
                time: deadline,
                now: self.scheduler.now,
            });
        }
        while self.step(deadline)? {}
        self.scheduler.now = deadline;
        Ok(())
    }

    pub fn state(&self) -> &C {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut C {
        &mut self.state
    }

    pub fn into_state(self) -> C {
        self.state
    }

    fn dispatch(&mut self, id: ProcessId, wake: Wake) -> SimResult<()> {
        let Some(entry) = self.scheduler.processes.get_mut(id.0) else {
            return Ok(());
        };
        if entry.state != wake.expects() {
            trace!(process = id.0, state = ?entry.state, ?wake, "dropping stale wake-up");
            return Ok(());
        }
        let Some(mut process) = entry.process.take() else {
            return Ok(());
        };
        entry.state = ProcessState::Running;

        let outcome = self.drive(id, process.as_mut());

        let entry = &mut self.scheduler.processes[id.0];
        match outcome {
            Ok(ProcessState::Terminated) => {
                trace!(process = id.0, t = self.scheduler.now, "process finished");
                entry.state = ProcessState::Terminated;
            }
            Ok(state) => {
                entry.process = Some(process);
                entry.state = state;
            }
            Err(err) => {
                // the process is dropped along with the failed run
                entry.state = ProcessState::Terminated;
                return Err(err);
            }
        }
        Ok(())
    }

    /// Resumes `process` until it suspends and returns the state it
    /// suspended in.
    fn drive(&mut self, id: ProcessId, process: &mut dyn Process<C>) -> SimResult<ProcessState> {
        loop {
            let mut ctx = Context {
                scheduler: &mut self.scheduler,
                state: &mut self.state,
                current: id,
            };
            match process.resume(&mut ctx)? {
                Step::Timeout(delay) => {
                    let at = self.scheduler.now + delay;
                    self.scheduler.schedule_at(at, id)?;
                    return Ok(ProcessState::WaitingTimeout);
                }
                Step::Request(resource) => {
                    match self.scheduler.resource_mut(resource)?.request(id) {
                        Grant::Granted => continue,
                        Grant::Queued => return Ok(ProcessState::WaitingResource),
                    }
                }
                Step::Terminate => return Ok(ProcessState::Terminated),
            }
        }
    }
}
