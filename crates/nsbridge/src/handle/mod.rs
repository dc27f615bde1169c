//! Deferred-failure handles to foreign reflection metadata
//!
//! Host-side caches keep handles to types and members for as long as the host
//! likes, while the managed universe behind them may be replaced by a hot
//! reload. Handles survive the reload by identity: each one is rebuilt from
//! its captured identity, and any that cannot be found again turn into dead
//! handles whose failure surfaces only when the value is actually read.
//!
//! ```text
//! wrap(live) ──capture──► CapturedIdentity ──rehydrate──► Live(T)
//!                                                   └──► Dead(cause)
//! ```

mod deferred;
mod identity;

pub use deferred::{Deferred, MaybeMember, MaybeMethod, MaybeType, StaleReferenceError};
pub use identity::{method_identity, CapturedIdentity, Rehydrate, RehydrateError};
