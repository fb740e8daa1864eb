//! This module contains constants that are needed throughout the codebase.

/// The default maximum number of worklist steps that a single exploded graph
/// walk may take before it is abandoned as incomplete.
pub const DEFAULT_MAX_STEPS: usize = 1_000;

/// The default maximum number of times that a single path may visit the same
/// program point.
///
/// This is what bounds the exploration of loops, as the fresh symbolic values
/// created on each iteration would otherwise make every iteration's state
/// distinct.
pub const DEFAULT_MAX_PROGRAM_POINT_VISITS: usize = 2;

/// The default maximum number of states that asserting a single constraint on
/// a composite boolean value may fork into before the engine gives up on
/// propagating the constraint into the operands.
pub const DEFAULT_MAX_CONSTRAINT_FORKS: usize = 16;

/// The default number of loop iterations the walker will wait before polling
/// the watchdog.
pub const DEFAULT_WATCHDOG_POLL_LOOP_ITERATIONS: usize = 100;

/// The default value for whether the walker prunes bindings of dead variables
/// at block boundaries.
///
/// Pruning makes states that only differ in dead bindings compare equal, which
/// is what allows paths to re-converge after branches.
pub const DEFAULT_PRUNE_DEAD_BINDINGS: bool = true;
