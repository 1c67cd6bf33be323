/// Radio driver as seen by the session
///
/// Radio interrupts only latch what happened. The work they defer is done by
/// [`Radio::irq_process`], which the session calls from the main loop before the
/// engine's own processing step.
pub trait Radio {
    /// Handle the radio events latched since the last call
    fn irq_process(&mut self);
}
