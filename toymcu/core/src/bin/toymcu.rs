use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use nibble_vm::{run, trace, Machine, RunOutcome, Status};
use std::fmt::Display;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use toymcu_core::{FlipJump, Gmc4, RunConfig, Tps, TpsPin};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(
    name = "toymcu",
    about = "Run HT46F47E (TPS), FlipJump and GMC-4 programs."
)]
struct Args {
    /// Maximum number of instructions to execute.
    #[arg(long, global = true, value_name = "N")]
    steps: Option<u64>,

    /// JSON run configuration; flags override its values.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Print one JSON snapshot per step on stdout.
    #[arg(long, global = true, default_value_t = false)]
    trace: bool,

    #[command(subcommand)]
    machine: MachineCmd,
}

#[derive(Subcommand, Debug)]
enum MachineCmd {
    /// HT46F47E program made of `AAA HH` records.
    Tps {
        program: PathBuf,

        #[arg(long, value_name = "ADDR")]
        start: Option<u32>,

        /// Level of the DIN port, DIN1 being bit 0.
        #[arg(long, value_name = "NIBBLE", value_parser = clap::value_parser!(u8).range(0..16))]
        din: Option<u8>,

        /// Switch held high; may be repeated.
        #[arg(long, value_enum)]
        switch: Vec<Switch>,

        #[arg(long, value_name = "NIBBLE", value_parser = clap::value_parser!(u8).range(0..16))]
        ad1: Option<u8>,

        #[arg(long, value_name = "NIBBLE", value_parser = clap::value_parser!(u8).range(0..16))]
        ad2: Option<u8>,
    },
    /// FlipJump memory image of hex bytes.
    Flipjump {
        image: PathBuf,

        /// Start bit address.
        #[arg(long, value_name = "BIT")]
        start: Option<u32>,

        #[arg(long, value_name = "BITS")]
        word_bits: Option<u32>,
    },
    /// GMC-4 program of hex nibbles.
    Gmc4 {
        program: PathBuf,

        #[arg(long, value_name = "ADDR")]
        start: Option<u32>,

        /// Address of the first program nibble.
        #[arg(long, value_name = "ADDR")]
        load: Option<u32>,

        /// Key latched for the first `KA`.
        #[arg(long, value_name = "NIBBLE", value_parser = clap::value_parser!(u8).range(0..16))]
        key: Option<u8>,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum Switch {
    S1,
    S2,
}

fn setup_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let fmt_layer = fmt::layer().with_target(false).with_writer(io::stderr);
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

/// Run to halt or budget, optionally streaming snapshots, then print the
/// final state and outcome.
fn execute<M>(machine: &mut M, max_steps: u64, json_trace: bool) -> Result<RunOutcome>
where
    M: Machine + Display,
{
    let outcome = if json_trace {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        let mut taken = 0u64;
        for (index, snapshot) in trace(machine, max_steps).enumerate() {
            serde_json::to_writer(&mut out, &snapshot)?;
            writeln!(out)?;
            taken = index as u64;
        }
        match machine.status() {
            Status::Halted(reason) => RunOutcome::Halted {
                reason: reason.clone(),
                steps: taken,
            },
            Status::Running => RunOutcome::BudgetExceeded { steps: taken },
        }
    } else {
        run(machine, max_steps)
    };

    let summary = serde_json::to_string(&outcome)?;
    if json_trace {
        eprintln!("{machine}");
        eprintln!("outcome: {summary}");
    } else {
        println!("{machine}");
        println!("outcome: {summary}");
    }
    Ok(outcome)
}

fn main() -> Result<ExitCode> {
    setup_tracing();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => RunConfig::from_path(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => RunConfig::default(),
    };
    if let Some(steps) = args.steps {
        config.max_steps = steps;
    }

    let outcome = match args.machine {
        MachineCmd::Tps {
            program,
            start,
            din,
            switch,
            ad1,
            ad2,
        } => {
            if let Some(start) = start {
                config.tps.start_address = start;
            }
            config.validate()?;
            let text = read_text(&program)?;
            let mut machine = Tps::from_source(&text, config.tps)
                .with_context(|| format!("loading {}", program.display()))?;
            if let Some(din) = din {
                machine.set_din(din);
            }
            for sw in switch {
                let pin = match sw {
                    Switch::S1 => TpsPin::S1,
                    Switch::S2 => TpsPin::S2,
                };
                machine.set_input(pin, true);
            }
            machine.set_analog(ad1.unwrap_or(0), ad2.unwrap_or(0));
            execute(&mut machine, config.max_steps, args.trace)?
        }
        MachineCmd::Flipjump {
            image,
            start,
            word_bits,
        } => {
            if let Some(start) = start {
                config.flipjump.start_ip = start;
            }
            if let Some(bits) = word_bits {
                config.flipjump.word_bits = bits;
            }
            config.validate()?;
            let text = read_text(&image)?;
            let mut machine = FlipJump::from_source(&text, config.flipjump)
                .with_context(|| format!("loading {}", image.display()))?;
            execute(&mut machine, config.max_steps, args.trace)?
        }
        MachineCmd::Gmc4 {
            program,
            start,
            load,
            key,
        } => {
            if let Some(start) = start {
                config.gmc4.start_address = start;
            }
            if let Some(load) = load {
                config.gmc4.load_address = load;
            }
            config.validate()?;
            let text = read_text(&program)?;
            let mut machine = Gmc4::from_source(&text, config.gmc4)
                .with_context(|| format!("loading {}", program.display()))?;
            if let Some(key) = key {
                machine.press_key(key);
            }
            let outcome = execute(&mut machine, config.max_steps, args.trace)?;
            for event in machine.drain_events() {
                eprintln!("event: {}", serde_json::to_string(&event)?);
            }
            outcome
        }
    };

    if let RunOutcome::Halted { reason, steps } = &outcome {
        tracing::debug!(?reason, steps, "run finished");
    }
    Ok(if outcome.is_fault() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
