//! Named thread spawning for the report reader.
//!
//! The reader is the only long-lived thread the driver owns. It gets a
//! name (visible in debuggers and panic messages) and an explicit stack
//! size; callbacks run on it, so keep their stack use modest.

use std::io;
use std::thread::{Builder, JoinHandle};

/// Spawn `f` on a thread called `name` with `stack_kb` KiB of stack.
pub fn spawn_reader(
    name: &str,
    stack_kb: usize,
    f: impl FnOnce() + Send + 'static,
) -> io::Result<JoinHandle<()>> {
    log::info!("Spawning '{}' (stack={}KB)", name, stack_kb);
    Builder::new()
        .name(name.into())
        .stack_size(stack_kb * 1024)
        .spawn(f)
}
