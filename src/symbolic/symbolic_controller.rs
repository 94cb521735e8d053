//! # Evaluation Controller
//!
//! Carries the run-time context of one evaluation:
//! - a cancellation flag, shared through [`StopHandle`] so another thread (a UI, a timer) can stop a
//!   runaway `while` loop or an ongoing `sleep`,
//! - two capability gates: loops (`while`, `for`, `sum`) and randomness (`randlist`),
//! - a pool of scratch term lists reused by the term collector.
//!
//! Every recursive entry point takes `Option<&Controller>`. `None` means: no capability granted,
//! no pooling, never stopped.
//!
//! The pool sits behind a `RefCell`, so one controller serves one evaluating thread at a time.
//! Independent threads build their own controllers and may share a `StopHandle`.

use crate::Utils::task_parser::CalcConfig;
use crate::symbolic::symbolic_engine::Expr;
use log::info;
use std::cell::RefCell;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Cloneable cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        StopHandle::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::Relaxed);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

pub const DEFAULT_POOL_CAPACITY: usize = 8;
pub const DEFAULT_SLEEP_POLL: Duration = Duration::from_millis(1);

#[derive(Debug)]
pub struct Controller {
    stop: StopHandle,
    allow_loops: bool,
    allow_random: bool,
    sleep_poll: Duration,
    pool: RefCell<Vec<Vec<Expr>>>,
    pool_capacity: usize,
}

impl Default for Controller {
    fn default() -> Self {
        Controller::new()
    }
}

impl Controller {
    /// Controller with both gates closed, a fresh stop flag and the default pool.
    pub fn new() -> Self {
        Controller {
            stop: StopHandle::new(),
            allow_loops: false,
            allow_random: false,
            sleep_poll: DEFAULT_SLEEP_POLL,
            pool: RefCell::new(Vec::with_capacity(DEFAULT_POOL_CAPACITY)),
            pool_capacity: DEFAULT_POOL_CAPACITY,
        }
    }

    /// Controller with every capability granted.
    pub fn permissive() -> Self {
        Controller::new().with_loops(true).with_random(true)
    }

    pub fn from_config(config: &CalcConfig) -> Self {
        info!(
            "controller: loops {}, random {}, pool {}, poll {} ms",
            config.allow_loops, config.allow_random, config.scratch_pool, config.sleep_poll_ms
        );
        Controller::new()
            .with_loops(config.allow_loops)
            .with_random(config.allow_random)
            .with_pool_capacity(config.scratch_pool)
            .with_sleep_poll(Duration::from_millis(config.sleep_poll_ms))
    }

    pub fn with_loops(mut self, allow: bool) -> Self {
        self.allow_loops = allow;
        self
    }

    pub fn with_random(mut self, allow: bool) -> Self {
        self.allow_random = allow;
        self
    }

    pub fn with_pool_capacity(mut self, capacity: usize) -> Self {
        self.pool_capacity = capacity;
        self.pool.get_mut().truncate(capacity);
        self
    }

    pub fn with_sleep_poll(mut self, poll: Duration) -> Self {
        self.sleep_poll = poll.max(Duration::from_micros(1));
        self
    }

    /// Shares an existing stop flag, e.g. between the controllers of several worker threads.
    pub fn with_stop_handle(mut self, handle: StopHandle) -> Self {
        self.stop = handle;
        self
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_stopped()
    }

    pub fn loops_allowed(&self) -> bool {
        self.allow_loops
    }

    pub fn random_allowed(&self) -> bool {
        self.allow_random
    }

    pub fn sleep_poll(&self) -> Duration {
        self.sleep_poll
    }

    /// Number of idle buffers in the pool.
    pub fn pooled(&self) -> usize {
        self.pool.borrow().len()
    }

    /// Empty buffer, recycled when one is available.
    pub fn checkout(&self) -> Vec<Expr> {
        self.pool.borrow_mut().pop().unwrap_or_default()
    }

    /// Returns a buffer to the pool; dropped when the pool is full.
    pub fn give_back(&self, mut buffer: Vec<Expr>) {
        buffer.clear();
        let mut pool = self.pool.borrow_mut();
        if pool.len() < self.pool_capacity {
            pool.push(buffer);
        }
    }
}

pub fn is_stopped(ctrl: Option<&Controller>) -> bool {
    ctrl.is_some_and(Controller::is_stopped)
}

pub fn loops_allowed(ctrl: Option<&Controller>) -> bool {
    ctrl.is_some_and(Controller::loops_allowed)
}

pub fn random_allowed(ctrl: Option<&Controller>) -> bool {
    ctrl.is_some_and(Controller::random_allowed)
}

/// Scratch term list that goes back to its controller's pool when dropped.
pub struct ScratchList<'c> {
    items: Vec<Expr>,
    owner: Option<&'c Controller>,
}

impl<'c> ScratchList<'c> {
    pub fn new(ctrl: Option<&'c Controller>) -> Self {
        ScratchList {
            items: ctrl.map(Controller::checkout).unwrap_or_default(),
            owner: ctrl,
        }
    }
}

impl Deref for ScratchList<'_> {
    type Target = Vec<Expr>;

    fn deref(&self) -> &Vec<Expr> {
        &self.items
    }
}

impl DerefMut for ScratchList<'_> {
    fn deref_mut(&mut self) -> &mut Vec<Expr> {
        &mut self.items
    }
}

impl Drop for ScratchList<'_> {
    fn drop(&mut self) {
        if let Some(ctrl) = self.owner {
            ctrl.give_back(std::mem::take(&mut self.items));
        }
    }
}
