//! Common monitor surface driven by the hub.

use contracts::OverlapNotification;

use crate::context::MonitorContext;
use crate::lifecycle::Lifecycle;
use crate::scheduler::TimerKind;
use crate::MonitorError;

/// Lifecycle and inbound callbacks shared by every monitor type
pub trait Monitor {
    /// Configured name
    fn name(&self) -> &str;

    fn lifecycle(&self) -> &Lifecycle;

    /// Resolve the owner and validate configuration. On error the monitor
    /// stays inert for the rest of the session.
    fn init(&mut self, ctx: &mut MonitorContext<'_>) -> Result<(), MonitorError>;

    /// Begin processing inputs
    fn start(&mut self, ctx: &mut MonitorContext<'_>);

    /// Flush deferred ends, cancel timers, ignore everything afterwards
    fn finish(&mut self, ctx: &mut MonitorContext<'_>, forced: bool);

    fn on_overlap_begin(&mut self, ctx: &mut MonitorContext<'_>, overlap: &OverlapNotification);

    fn on_overlap_end(&mut self, ctx: &mut MonitorContext<'_>, overlap: &OverlapNotification);

    /// A timer armed by this monitor came due
    fn on_timer(&mut self, ctx: &mut MonitorContext<'_>, kind: TimerKind);

    fn is_init(&self) -> bool {
        self.lifecycle().is_init()
    }

    fn is_started(&self) -> bool {
        self.lifecycle().is_started()
    }

    fn is_finished(&self) -> bool {
        self.lifecycle().is_finished()
    }
}
