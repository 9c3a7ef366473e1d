//! Background reload of synonym maps.
//!
//! A [`ReloadService`] owns one periodic timer per pipeline identifier. Each
//! timer ticks the [`Monitor`]s attached to it, one after the other, so ticks
//! of a pipeline never overlap:
//!
//! ```text
//! timer(pipeline) ──▶ monitor.tick()
//!                       ├─ source.poll_change()?  no ──▶ Unchanged
//!                       ├─ read + build            err ─▶ Failed (old map stays)
//!                       └─ publish + acknowledge   ────▶ Reloaded
//! ```

pub mod monitor;
pub mod service;

pub use monitor::{Monitor, MonitorSpec, TickOutcome};
pub use service::{MonitorState, ReloadService, ReloadServiceConfig, ReloadStats};
