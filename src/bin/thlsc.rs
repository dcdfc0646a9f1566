//! thls compiler driver.
//!
//! Compiles one of the built-in reference programs and prints what the execution substrate
//! has to be loaded and configured with.

use clap::{Parser, ValueEnum};
use thls::{compile, samples, verify, Target};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Program {
    /// `a = 5 + 3; return a * 4`
    Simple,
    /// Three-tap filter over persistent globals
    Filter,
}

#[derive(Debug, Parser)]
#[command(name = "thlsc", about = "Compile a straight-line program for the thls processor")]
struct Args {
    /// Program to compile.
    #[arg(long, value_enum, default_value_t = Program::Simple)]
    program: Program,

    /// Bits per data memory word.
    #[arg(long, default_value_t = 32)]
    data_width: u32,

    /// Pipeline stages inside the multiplier.
    #[arg(long, default_value_t = 2)]
    multiplier_stages: u32,

    /// Print the cycle-by-cycle listing.
    #[arg(long)]
    listing: bool,

    /// Check the schedule for hazards before printing.
    #[arg(long)]
    verify: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let target = Target::new(args.data_width, args.multiplier_stages)?;
    let function = match args.program {
        Program::Simple => samples::simple_test(),
        Program::Filter => samples::fir_filter(),
    };

    let compiled = compile(&target, &function)?;
    if args.verify {
        verify(&compiled)?;
        log::info!("schedule verified");
    }

    if args.listing {
        print!("{compiled}");
    }

    let layout = compiled.layout();
    println!("program words:    {}", layout.program_words);
    println!("data words:       {}", layout.data_words);
    println!("register bits:    {}", layout.reg_bits);
    println!("opcode bits:      {}", layout.opcode_bits);
    println!("instruction bits: {}", layout.instruction_bits());
    println!("data width:       {}", target.data_width());
    println!("multiplier:       {} stages", target.multiplier_stages());
    for (opcode, latency) in target.latency_table() {
        match latency {
            Some(cycles) => println!("latency {opcode:<8} {cycles}"),
            None => println!("latency {opcode:<8} -"),
        }
    }

    let mut globals: Vec<_> = compiled.globals().iter().collect();
    globals.sort_by_key(|&(_, slot)| *slot);
    for (name, slot) in globals {
        println!("global {name} @ r{slot}");
    }

    println!("program: {:?}", compiled.encode()?);
    println!("data:    {:?}", compiled.data_image());
    Ok(())
}
