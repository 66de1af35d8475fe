//! 🧵 Workers: the ones who actually do the work while the Supervisor takes all the
//! credit in the sprint retro.
//!
//! 🚀 Two of them. One reads events and pushes them into the queue. One pulls them out
//! and hands them to the sink. They never meet. They communicate only through a bounded
//! channel, like coworkers who only talk through Jira tickets. 🦆

use anyhow::Result;
use tokio::task::JoinHandle;

mod sink_worker;
mod source_worker;

pub(super) use sink_worker::SinkWorker;
pub(super) use source_worker::SourceWorker;

/// 🏗️ A background worker, that does work. duh.
///
/// "What's the DEAL with lifetime annotations? You borrow something,
///  you give it back. It's not that hard, Jerry!": Seinfeld, on Rust
pub(super) trait Worker {
    /// 📊 What the worker hands back when it's done.
    type Output: Send + 'static;

    /// 🚀 Start the worker. Returns a JoinHandle because we trust
    /// but verify. Mostly verify. Okay, we don't trust at all.
    fn start(self) -> JoinHandle<Result<Self::Output>>;
}
