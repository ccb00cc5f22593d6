pub mod asm;
pub mod catalog;
pub mod cli;
pub mod compile;
pub mod compile_error;
pub mod lang;

use anyhow::Context;
use clap::Parser;

use crate::asm::AsmProgram;
use crate::catalog::Catalog;
use crate::compile::Compiler;
use crate::compile_error::CompileError;
use crate::lang::Module;

/// Compile `module` into a linked program.
pub fn compile_program(module: &Module, catalog: &Catalog) -> Result<AsmProgram, CompileError> {
    Compiler::new(catalog).compile_module(module)
}

/// Compile `module` into assembly text.
pub fn compile(module: &Module, catalog: &Catalog) -> Result<String, CompileError> {
    compile_program(module, catalog).map(|p| asm::render::render(&p))
}

/// Built-in catalog with every overlay in `paths` merged on top, in order.
pub fn load_catalog<P: AsRef<std::path::Path>>(paths: &[P]) -> anyhow::Result<Catalog> {
    let mut catalog = Catalog::builtin();
    for path in paths {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Reading catalog {}", path.display()))?;
        let file = Catalog::file_from_json(&json)
            .with_context(|| format!("Parsing catalog {}", path.display()))?;
        catalog.merge(file);
    }
    Ok(catalog)
}

pub fn run() -> anyhow::Result<()> {
    let args = cli::Cli::parse();
    logger::init(args.verbose);

    // 1. ── Load ───────────────────────────────────────────────────────
    let json = std::fs::read_to_string(&args.input)
        .with_context(|| format!("Reading {}", args.input.display()))?;
    let module = Module::from_json(&json).with_context(|| "Parsing input AST")?;
    let catalog = load_catalog(&args.catalogs)?;

    // 2. ── Compile ────────────────────────────────────────────────────
    let program = compile_program(&module, &catalog)
        .with_context(|| format!("Compiling {}", args.input.display()))?;

    // 3. ── Write outputs ──────────────────────────────────────────────
    let text = asm::render::render(&program);
    match &args.output {
        Some(path) => std::fs::write(path, &text)
            .with_context(|| format!("Writing {}", path.display()))?,
        None => print!("{}", text),
    }

    if let Some(path) = &args.records {
        let bytes = program
            .dump()
            .map_err(|e| anyhow::anyhow!("Encoding records: {}", e))?;
        std::fs::write(path, bytes).with_context(|| format!("Writing {}", path.display()))?;
    }

    if args.listing {
        eprint!("{}", asm::render::listing(&program));
    }

    Ok(())
}

mod logger {
    use log::{LevelFilter, Log, Metadata, Record};

    struct StderrLogger;

    static LOGGER: StderrLogger = StderrLogger;

    impl Log for StderrLogger {
        fn enabled(&self, metadata: &Metadata) -> bool {
            metadata.level() <= log::max_level()
        }

        fn log(&self, record: &Record) {
            if self.enabled(record.metadata()) {
                eprintln!("[{}] {}", record.level(), record.args());
            }
        }

        fn flush(&self) {}
    }

    pub fn init(verbose: u8) {
        let level = match verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };
        // A second init (tests, embedding hosts) keeps the first logger.
        if log::set_logger(&LOGGER).is_ok() {
            log::set_max_level(level);
        }
    }
}
