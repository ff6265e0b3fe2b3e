mod backend;
mod disassembly;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use env_logger::Env;
use pasm_bridge::Bridge;

use crate::backend::LoadOptions;

const USAGE: &str = "\
pasm [flags] <file>.p

Flags:
  --disable-gui, -ng                 Run headless (no visualisation thread)
  --singlestep, -s                   Start paused; step with the gui's Step button
  --overwrite-memory-size=N, -m=N    Override the declared memory size
  --overwrite-operand-size=N, -o=N   Override the declared operand size
  --cache-bits=N, -c=N               Cache index width, in [1,6] (default 4)
  --lt-run-gui, -ltrg                Run only the visualisation, no program
  --help, -h                         Print this message
  --version, -v                      Print the version number";

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let argv: Vec<String> = std::env::args().skip(1).collect();
    let args = pasm_args::parse(&argv)?;

    if args.help {
        println!("{USAGE}");
        return Ok(());
    }
    if args.version {
        println!("pASM {}\n© 2024 BeyerCorp", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    if args.lt_run_gui {
        return run_gui_only();
    }

    let Some(program_path) = args.program_path.clone() else {
        bail!("{USAGE}");
    };
    if !program_path.ends_with(".p") {
        bail!("expected a '.p' file, got '{program_path}'\n\n{USAGE}");
    }
    let program_path = PathBuf::from(program_path);

    let options = LoadOptions {
        cache_bits: args.cache_bits,
        overwrite_memory_size: args.overwrite_memory_size,
        overwrite_operand_size: args.overwrite_operand_size,
    };

    if args.disable_gui {
        backend::run_headless(&program_path, &options)
    } else {
        run_with_gui(&program_path, options, args.singlestep)
    }
}

fn run_with_gui(program_path: &std::path::Path, options: LoadOptions, singlestep: bool) -> Result<()> {
    let bridge = Arc::new(Bridge::new());
    let handle = backend::spawn_backend_thread(program_path, options, singlestep, Arc::clone(&bridge))?;

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size(egui::Vec2::new(640.0, 480.0)),
        ..Default::default()
    };
    eframe::run_native(
        "pasm",
        native_options,
        Box::new(|_cc| Box::new(pasm_gui::App::new(bridge))),
    )
    .map_err(|err| anyhow!("gui error: {err}"))?;

    handle.join().map_err(|_| anyhow!("execution thread panicked"))?;
    Ok(())
}

fn run_gui_only() -> Result<()> {
    let bridge = Arc::new(Bridge::new());
    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size(egui::Vec2::new(640.0, 480.0)),
        ..Default::default()
    };
    eframe::run_native(
        "pasm",
        native_options,
        Box::new(|_cc| Box::new(pasm_gui::App::new(bridge))),
    )
    .map_err(|err| anyhow!("gui error: {err}"))?;
    Ok(())
}
