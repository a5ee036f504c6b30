use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::filter::EnvFilter;

use aqbc::bytecode::{parse_assembly, Encoder, Instruction, OpcodeTable, Revision};
use aqbc::listing::Listing;
use aqbc::samples::Sample;

#[derive(Parser)]
#[command(name = "aqbc", version, about = "Assemble and disassemble stack machine bytecode")]
struct Cli {
  /// Opcode table revision: classic or runtime.
  #[arg(short, long, global = true, default_value = "classic")]
  revision: Revision,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Assemble a text program into bytecode.
  Asm {
    source: PathBuf,
    #[arg(short, long, default_value = "test.abc")]
    output: PathBuf,
  },
  /// Print the listing of a bytecode file.
  Dump {
    file: PathBuf,
    /// Print a boxed table instead of plain lines.
    #[arg(long)]
    table: bool,
  },
  /// Write one of the built in fixture programs.
  Sample {
    name: Sample,
    #[arg(short, long, default_value = "test.abc")]
    output: PathBuf,
  },
  /// Print the opcode table of the selected revision.
  Opcodes,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env().add_directive("warn".parse()?))
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();
  let table = OpcodeTable::for_revision(cli.revision);

  match cli.command {
    Commands::Asm { source, output } => {
      let text = std::fs::read_to_string(&source)
        .with_context(|| format!("reading {}", source.display()))?;
      let program = parse_assembly(&text)?;
      write_program(table, &program, &output)?;
    }
    Commands::Dump { file, table: boxed } => dump(table, &file, boxed)?,
    Commands::Sample { name, output } => write_program(table, &name.program(), &output)?,
    Commands::Opcodes => print!("{}", table),
  }

  Ok(())
}

fn write_program(table: &OpcodeTable, program: &[Instruction], output: &Path) -> Result<()> {
  let bytes = Encoder::new(table).encode(program)?;
  std::fs::write(output, &bytes).with_context(|| format!("writing {}", output.display()))?;
  info!(path = %output.display(), bytes = bytes.len(), "wrote program");
  Ok(())
}

fn dump(table: &OpcodeTable, file: &Path, boxed: bool) -> Result<()> {
  let bytes = std::fs::read(file).with_context(|| format!("reading {}", file.display()))?;
  let listing = Listing::disassemble(table, &bytes);

  match boxed {
    true  => {
      listing.table().printstd();
    }
    false => {
      for line in listing.lines() {
        println!("{}", line);
      }
    }
  }

  if let Some(error) = listing.fault {
    bail!("listing halted at offset {}: {}", error.offset(), error);
  }
  Ok(())
}
