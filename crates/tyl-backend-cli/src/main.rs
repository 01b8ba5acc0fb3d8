//! `tylc` — command-line driver for the Tyl/Flex native code generator.
//!
//! No lexer, parser, or type checker lives in this crate (§1 Non-goals), so
//! the input a user hands `tylc` is the checked AST itself, serialized as
//! JSON by whatever front end produced it. `tylc`'s own job starts at the
//! optimizer and ends at a linked code blob handed to the PE writer.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use codespan_reporting::files::SimpleFiles;

use tyl_backend::ast::{PrettyPrint, Program};
use tyl_backend::monomorphize::MonomorphizedProgram;
use tyl_backend::optimize::{OptLevel, Pipeline};
use tyl_backend::pe::{self, PeWriter, TestPeWriter};
use tyl_backend::record::RecordTable;
use tyl_backend::typetab::TypeTable;
use tyl_backend::{compile_program, diagnostic, link};

#[derive(Parser)]
#[command(name = "tylc")]
#[command(about = "Native x86-64 code generator for Tyl/Flex")]
#[command(version)]
struct Cli {
    /// Checked-AST source file, as JSON
    input: PathBuf,

    /// Output file path
    #[arg(short, long, default_value = "a.exe")]
    output: PathBuf,

    /// Emit a DLL instead of an executable
    #[arg(long)]
    dll: bool,

    /// Module-definition file listing exported symbols, for `--dll`
    #[arg(long, value_name = "FILE")]
    def: Option<PathBuf>,

    /// Optimization level: 0, 1, 2, 3, s, z, fast
    #[arg(short = 'O', long = "opt", default_value = "0")]
    opt_level: String,

    /// Dump the post-optimizer AST as text instead of emitting an image
    #[arg(long)]
    emit_ir: bool,
}

fn main() -> ExitCode {
    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    if cli.def.is_some() && !cli.dll {
        anyhow::bail!("--def is only meaningful together with --dll");
    }

    let level = OptLevel::from_flag(&cli.opt_level)
        .with_context(|| format!("unrecognized optimization level `{}`", cli.opt_level))?;

    let source = fs::read_to_string(&cli.input)
        .with_context(|| format!("reading `{}`", cli.input.display()))?;
    let mut program: Program = serde_json::from_str(&source)
        .with_context(|| format!("`{}` is not a valid checked-AST fixture", cli.input.display()))?;

    let stats = Pipeline::new(level).run(&mut program);
    if stats.any_skipped() {
        eprintln!("warning: one or more optimizer passes were skipped on an internal inconsistency");
    }

    if cli.emit_ir {
        print!("{}", program.pretty_print());
        return Ok(());
    }

    let types = TypeTable::new();
    let records = RecordTable::build(&program.records);
    let monomorphized = MonomorphizedProgram::from_checked(program, Vec::new());
    let module = match compile_program(&monomorphized, &types, &records) {
        Ok(module) => module,
        Err(err) => {
            let mut files = SimpleFiles::new();
            let file_id = files.add(cli.input.display().to_string(), source);
            diagnostic::emit(&err, &files, file_id).context("rendering diagnostic")?;
            anyhow::bail!("compilation failed");
        }
    };

    let linked = link::link(&module)?;

    // The real COFF/PE assembly is an external collaborator (`crate::pe`'s
    // own doc comment); this double stands in until one is wired up.
    let mut writer = TestPeWriter::new();
    pe::place_module(&mut writer, &linked)?;
    // A real `--def` parser would drive `request_export` calls here, one per
    // listed symbol; `--dll` alone currently emits no exports.
    let image = writer.finish()?;

    fs::write(&cli.output, image).with_context(|| format!("writing `{}`", cli.output.display()))?;
    Ok(())
}
