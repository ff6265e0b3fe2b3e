//! A thin `eframe` shell over the control bridge: every 100ms tick it polls
//! the bridge's read views and redraws. It owns no emulator state itself --
//! all it does is translate button presses into bridge requests and render
//! whatever the execution thread last published.

use std::sync::Arc;
use std::time::Duration;

use eframe::Frame;
use egui::{CentralPanel, Context, RichText, TopBottomPanel};
use pasm_bridge::Bridge;

const TICK_INTERVAL: Duration = Duration::from_millis(100);

pub struct App {
    bridge: Arc<Bridge>,
    open_path: String,
}

impl App {
    #[must_use]
    pub fn new(bridge: Arc<Bridge>) -> Self {
        Self { bridge, open_path: String::new() }
    }
}

impl eframe::App for App {
    fn update(&mut self, ctx: &Context, _frame: &mut Frame) {
        ctx.request_repaint_after(TICK_INTERVAL);

        let snapshot = self.bridge.snapshot();

        TopBottomPanel::top("controls").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.text_edit_singleline(&mut self.open_path);
                if ui.button("Open").clicked() && !self.bridge.request_open_file(self.open_path.clone()) {
                    log::warn!("open request dropped, backend hasn't acknowledged the pending request");
                }
                if ui.button("Reset").clicked() {
                    let _ = self.bridge.request_reset();
                }
                if ui.button("Step").clicked() {
                    let _ = self.bridge.request_start_step();
                }
                if ui
                    .button(if snapshot.single_step_mode { "Resume" } else { "Single-step" })
                    .clicked()
                {
                    let _ = self.bridge.request_single_step_toggle();
                }
            });
        });

        CentralPanel::default().show(ctx, |ui| {
            ui.label(RichText::new(format!("Accumulator: {}", snapshot.accumulator)).strong());
            ui.label(format!("Instruction counter: {}", snapshot.instruction_counter));
            ui.label(format!("Instruction size: {}", snapshot.instruction_size));
            ui.label(if snapshot.executing { "Executing" } else { "Idle" });
            ui.separator();
            ui.label(&snapshot.instruction);
            if !snapshot.coinstruction.is_empty() {
                ui.label(&snapshot.coinstruction);
            }
            if !snapshot.cocoinstruction.is_empty() {
                ui.label(&snapshot.cocoinstruction);
            }
        });

        // Draining here keeps the queue from filling up even if no widget
        // currently visualizes individual cache events; a richer memory view
        // would consume this to animate specific slots.
        for event in self.bridge.drain_events() {
            log::trace!("cache event: {event:?}");
        }
    }
}
