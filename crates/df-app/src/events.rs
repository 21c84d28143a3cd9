use std::sync::Arc;

use df_core::{GenerationOutcome, OutcomeSink};
use log::error;
use winit::event_loop::EventLoopProxy;

use crate::ui::UiEvent;

#[derive(Debug, Clone)]
pub enum DfEvent {
    Ui(UiEvent),
    Generation(GenerationOutcome),
}

/// Hands finished jobs to the event loop, which applies them on the UI thread.
pub struct ProxySink {
    event_loop_proxy: Arc<EventLoopProxy<DfEvent>>,
}

impl ProxySink {
    pub fn new(event_loop_proxy: Arc<EventLoopProxy<DfEvent>>) -> Self {
        Self { event_loop_proxy }
    }
}

impl OutcomeSink for ProxySink {
    fn deliver(&self, outcome: GenerationOutcome) {
        if self.event_loop_proxy.send_event(DfEvent::Generation(outcome)).is_err() {
            error!("Event loop closed before the generation finished");
        }
    }
}
