//! Monitor lifecycle flags: init -> start -> finish.

/// Lifecycle state of one monitor instance
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Lifecycle {
    init: bool,
    started: bool,
    finished: bool,
}

impl Lifecycle {
    pub fn is_init(&self) -> bool {
        self.init
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Started and not finished: inputs are processed
    pub fn is_running(&self) -> bool {
        self.started && !self.finished
    }

    /// Returns false if already initialized or finished
    pub fn mark_init(&mut self) -> bool {
        if self.init || self.finished {
            return false;
        }
        self.init = true;
        true
    }

    /// Returns false unless initialized and not yet started
    pub fn mark_started(&mut self) -> bool {
        if !self.init || self.started || self.finished {
            return false;
        }
        self.started = true;
        true
    }

    /// Returns true only for the first finish of an initialized or started monitor
    pub fn mark_finished(&mut self) -> bool {
        if self.finished || !(self.init || self.started) {
            return false;
        }
        self.init = false;
        self.started = false;
        self.finished = true;
        true
    }
}
