//! Validation Coordinator
//!
//! Debounces graph changes and, once the graph has been quiet for the
//! configured window, re-validates every entity and connection, refreshes
//! their cached error maps and recomputes the global validity flag.
//!
//! Time is passed in explicitly so the coordinator can be driven by the
//! session's event loop or stepped by hand.

use std::time::{Duration, Instant};
use tracing::{info, trace};

use crate::config::ValidationConfig;
use crate::error::Result;
use crate::graph::{GraphChange, SchemaGraph, SchemaSnapshot};
use crate::validate::{validate_connection, validate_entity};

/// Single cancellable timer with cancel-and-restart semantics
#[derive(Debug, Clone)]
pub struct DebounceTimer {
    window: Duration,
    deadline: Option<Instant>,
}

impl DebounceTimer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            deadline: None,
        }
    }

    /// (Re)start the timer; any pending deadline is superseded
    pub fn arm(&mut self, now: Instant) {
        if self.deadline.is_some() {
            trace!("debounce timer restarted");
        }
        self.deadline = Some(now + self.window);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Disarm and return true if the deadline has passed
    pub fn fire_if_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    Idle,
    PendingRecheck,
}

/// Outcome of one validation pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    /// 1-based pass counter
    pub pass: u64,
    pub valid: bool,
    pub entities_with_errors: usize,
    pub connections_with_errors: usize,
}

#[derive(Debug)]
pub struct ValidationCoordinator {
    timer: DebounceTimer,
    export_on_valid: bool,
    valid: bool,
    passes: u64,
    schema: Option<SchemaSnapshot>,
}

impl ValidationCoordinator {
    pub fn new(config: &ValidationConfig) -> Self {
        Self {
            timer: DebounceTimer::new(config.debounce()),
            export_on_valid: config.export_on_valid,
            valid: false,
            passes: 0,
            schema: None,
        }
    }

    pub fn state(&self) -> CoordinatorState {
        if self.timer.is_armed() {
            CoordinatorState::PendingRecheck
        } else {
            CoordinatorState::Idle
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Number of passes run so far
    pub fn passes(&self) -> u64 {
        self.passes
    }

    /// Last schema exported by a valid pass
    pub fn schema(&self) -> Option<&SchemaSnapshot> {
        self.schema.as_ref()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.timer.deadline()
    }

    /// Record a graph change and restart the quiescence window
    pub fn notify(&mut self, change: &GraphChange, now: Instant) {
        trace!(?change, "graph changed");
        self.timer.arm(now);
    }

    /// Drop the pending pass, if any
    pub fn cancel(&mut self) {
        trace!("pending validation cancelled");
        self.timer.cancel();
    }

    /// Run the pending pass if its deadline has passed
    pub fn poll(
        &mut self,
        graph: &mut SchemaGraph,
        now: Instant,
    ) -> Result<Option<ValidationReport>> {
        if !self.timer.fire_if_due(now) {
            return Ok(None);
        }
        self.run_pass(graph).map(Some)
    }

    /// Run any pending pass immediately
    pub fn flush(&mut self, graph: &mut SchemaGraph) -> Result<Option<ValidationReport>> {
        if !self.timer.is_armed() {
            return Ok(None);
        }
        self.timer.cancel();
        self.run_pass(graph).map(Some)
    }

    /// Validate every record, refresh their error caches and the validity flag
    pub fn run_pass(&mut self, graph: &mut SchemaGraph) -> Result<ValidationReport> {
        let mut entities_with_errors = 0;
        for (_, entity) in graph.entities_mut() {
            entity.mapping.error = validate_entity(entity);
            if entity.mapping.has_error() {
                entities_with_errors += 1;
            }
        }

        let mut connections_with_errors = 0;
        for (_, _, connection) in graph.connections_mut() {
            connection.mapping.error = validate_connection(connection);
            if connection.mapping.has_error() {
                connections_with_errors += 1;
            }
        }

        let valid = entities_with_errors == 0 && connections_with_errors == 0;
        if valid != self.valid {
            info!(valid, "schema validity changed");
        }
        self.valid = valid;
        self.passes += 1;

        if valid && self.export_on_valid {
            self.schema = Some(graph.export()?);
        }

        Ok(ValidationReport {
            pass: self.passes,
            valid,
            entities_with_errors,
            connections_with_errors,
        })
    }
}
