//! The output interface: the seam between the control plane and whatever
//! prints lines for a human to read.
//!
//! Terminal I/O is named in the spec as an external collaborator the core
//! only touches through this interface, so the dispatcher, coordinator, and
//! election engine never call `println!` directly — they go through an
//! `Output` implementation. Production wiring uses [`StdioOutput`]; tests can
//! substitute a line-capturing implementation instead.

use std::sync::{Arc, Mutex};

/// Something that can display a rendered line to the user.
pub trait Output: Send + Sync {
    fn emit(&self, line: String);
}

/// A cheaply-cloned handle to an `Output`, passed into every spawned task.
pub type SharedOutput = Arc<dyn Output>;

/// Prints straight to stdout, matching the teacher's plain `println!` style.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdioOutput;

impl Output for StdioOutput {
    fn emit(&self, line: String) {
        println!("{line}");
    }
}

/// Captures emitted lines in memory instead of printing them. Used by tests
/// that need to assert on exactly what the core would have shown the user.
#[derive(Debug, Default, Clone)]
pub struct CapturingOutput(Arc<Mutex<Vec<String>>>);

impl CapturingOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.0.lock().expect("capturing output mutex poisoned").clone()
    }
}

impl Output for CapturingOutput {
    fn emit(&self, line: String) {
        self.0.lock().expect("capturing output mutex poisoned").push(line);
    }
}

pub fn system(out: &dyn Output, msg: impl std::fmt::Display) {
    out.emit(format!("[System] {msg}"));
}

pub fn coordinator(out: &dyn Output, msg: impl std::fmt::Display) {
    out.emit(format!("[Coordinator] {msg}"));
}

pub fn election(out: &dyn Output, msg: impl std::fmt::Display) {
    out.emit(format!("[Election] {msg}"));
}
