//! Wires the loader and dispatcher together: loading a program image into a
//! fresh [`Machine`], running it to completion headlessly, or driving it
//! from a background thread that honors bridge interrupts between
//! instructions.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use pasm_bridge::{Bridge, GuiRequest};
use pasm_vm::{Cache, EventQueue, Machine};

use crate::disassembly::disassemble_all;

pub struct LoadOptions {
    pub cache_bits: u8,
    pub overwrite_memory_size: Option<u32>,
    pub overwrite_operand_size: Option<u8>,
}

fn load_machine(path: &Path, options: &LoadOptions) -> Result<Machine> {
    let file = File::open(path)
        .with_context(|| format!("failed to open program file at '{}'", path.display()))?;
    let mut reader = BufReader::new(file);

    let mut cache = Cache::new(options.cache_bits)?;
    let program = pasm_loader::load(
        &mut reader,
        &mut cache,
        options.overwrite_memory_size,
        options.overwrite_operand_size,
    )?;

    Ok(Machine::new(program.ram, cache, program.operand_size))
}

/// Runs `path` to completion on the current thread, printing the live
/// per-instruction disassembly and the final whole-memory disassembly.
pub fn run_headless(path: &Path, options: &LoadOptions) -> Result<()> {
    let mut machine = load_machine(path, options)?;
    let mut events = EventQueue::new(pasm_bridge::EVENT_QUEUE_CAPACITY);

    while machine.is_running() {
        let disasm = machine.step(&mut events)?;
        println!("{}", disasm.instruction);
        if !disasm.coinstruction.is_empty() {
            println!("{}", disasm.coinstruction);
        }
        if !disasm.cocoinstruction.is_empty() {
            println!("{}", disasm.cocoinstruction);
        }
    }

    machine.flush_cache();
    for line in disassemble_all(machine.ram(), machine.instruction_size() - 1) {
        println!("{line}");
    }

    Ok(())
}

/// Drives `path` on a background thread, honoring bridge interrupts between
/// instructions. Intended to be paired with [`pasm_gui::App`] on the calling
/// thread.
pub fn spawn_backend_thread(
    path: &Path,
    options: LoadOptions,
    initial_singlestep: bool,
    bridge: Arc<Bridge>,
) -> Result<thread::JoinHandle<()>> {
    let mut machine = load_machine(path, &options)?;
    bridge.refresh_memory_snapshot(machine.cache(), machine.ram());

    Ok(thread::spawn(move || {
        run_interactive(&mut machine, initial_singlestep, &bridge);
    }))
}

fn run_interactive(machine: &mut Machine, initial_singlestep: bool, bridge: &Bridge) {
    let mut events = EventQueue::new(pasm_bridge::EVENT_QUEUE_CAPACITY);
    let mut single_step_mode = initial_singlestep;
    let mut step_requested = false;

    loop {
        match bridge.poll_gui_request() {
            Some(GuiRequest::CloseFile) => break,
            Some(GuiRequest::Reset) => {
                machine.flush_cache();
                bridge.refresh_memory_snapshot(machine.cache(), machine.ram());
                bridge.notify_backend_reset();
            }
            Some(GuiRequest::SingleStepToggle) => single_step_mode = !single_step_mode,
            Some(GuiRequest::StartStep) => step_requested = true,
            Some(GuiRequest::ChangeCacheBits(_) | GuiRequest::OpenFile(_)) => {
                log::warn!("runtime reconfiguration of cache bits/program is not supported mid-run");
            }
            None => {}
        }

        if !machine.is_running() {
            break;
        }

        if single_step_mode && !step_requested {
            thread::sleep(Duration::from_millis(10));
            continue;
        }
        step_requested = false;

        match machine.step(&mut events) {
            Ok(disasm) => {
                while let Some(event) = events.dequeue() {
                    bridge.publish_event(event);
                }
                bridge.publish_step(
                    machine.registers().accumulator,
                    machine.instruction_size(),
                    machine.registers().instruction_counter,
                    &disasm,
                    machine.is_running(),
                    single_step_mode,
                );
            }
            Err(err) => {
                log::error!("execution halted: {err}");
                break;
            }
        }
    }

    machine.flush_cache();
    bridge.refresh_memory_snapshot(machine.cache(), machine.ram());
}
