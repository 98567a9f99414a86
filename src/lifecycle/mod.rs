// src/lifecycle/mod.rs
mod pid;
mod signals;

pub use pid::{read_pid, PidFile};
#[cfg(unix)]
pub use signals::spawn_reload_listener;
pub use signals::{reload_backends, send_signal, shutdown_signal, ControlSignal};
