//! Binary entry point: parses the CLI, wires up tracing, loads the optional
//! project config, and dispatches to the `Plan`/`Fetch`/`Build` mode.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use plan_orchestrator::cli::{Cli, Mode};
use plan_orchestrator::compiler::{UnitArgs, UnitArgsProvider};
use plan_orchestrator::config::Config;
use plan_orchestrator::destdir::DestDir;
use plan_orchestrator::error::{render_chain, Result};
use plan_orchestrator::executor::{self, ExecutionContext};
use plan_orchestrator::fetch::{check_fetch_dir, FetchDirMode, Fetcher};
use plan_orchestrator::pkgdb::PkgDbManager;
use plan_orchestrator::plan::{self, ConfiguredUnit};
use plan_orchestrator::process::ProcessRunner;
use plan_orchestrator::semaphore::Semaphore;
use plan_orchestrator::setup_tag;
use plan_orchestrator::sort;
use plan_orchestrator::dummy;
use plan_orchestrator::types::UnitSpecs;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli);

    let result = run(&cli);
    if let Err(err) = &result {
        eprintln!("error: {}", render_chain(err));
    }
    ExitCode::from(plan_orchestrator::error::exit_code(&result) as u8)
}

fn init_tracing(cli: &Cli) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.verbosity().as_filter_directive()));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn run(cli: &Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load(&std::path::PathBuf::from("orchestrator.toml"))?,
    };

    match &cli.mode {
        Mode::Plan { seeds, out } => run_plan(cli, seeds, out),
        Mode::Fetch { plan_file } => run_fetch(cli, plan_file),
        Mode::Build { plan_file } => run_build(cli, &config, plan_file),
    }
}

/// Renders the scratch seed package against `seeds` and asks `unpack_tool`
/// to turn it into a plan, writing the resulting blob to `out`.
fn run_plan(cli: &Cli, seeds: &std::path::Path, out: &std::path::Path) -> Result<()> {
    let text = std::fs::read_to_string(seeds)
        .map_err(|e| plan_orchestrator::error::OrchestratorError::io(seeds, e))?;
    let seed_specs: UnitSpecs = serde_json::from_str(&text)?;
    let descriptor = dummy::render_descriptor(&seed_specs);

    plan_orchestrator::tempdir::with_temp_dir(
        plan_orchestrator::tempdir::RetentionPolicy::Delete,
        "plan-orchestrator-plan-",
        |scratch| {
            let descriptor_path = scratch.join("dummy-package-0-inplace.cabal");
            std::fs::write(&descriptor_path, &descriptor)
                .map_err(|e| plan_orchestrator::error::OrchestratorError::io(&descriptor_path, e))?;

            let runner = ProcessRunner::new(Semaphore::none());
            let out_path = scratch.join("plan.json");
            let cmd = plan_orchestrator::process::Cmd::new(cli.unpack_tool.clone(), scratch)
                .arg("plan")
                .arg("--plan-json")
                .arg(out_path.display().to_string());
            runner.run(&cmd)?;

            let blob = std::fs::read(&out_path)
                .map_err(|e| plan_orchestrator::error::OrchestratorError::io(&out_path, e))?;
            std::fs::write(out, &blob)
                .map_err(|e| plan_orchestrator::error::OrchestratorError::io(out, e))?;
            Ok(())
        },
    )
}

fn run_fetch(cli: &Cli, plan_file: &std::path::Path) -> Result<()> {
    let blob = std::fs::read(plan_file)
        .map_err(|e| plan_orchestrator::error::OrchestratorError::io(plan_file, e))?;
    let parsed = plan::parse(&blob)?;

    let mode = if cli.update {
        FetchDirMode::Existing
    } else {
        FetchDirMode::New
    };
    check_fetch_dir(mode, &cli.fetch_dir)?;
    plan_orchestrator::tempdir::create_dir_all(&cli.fetch_dir)?;

    let runner = ProcessRunner::new(Semaphore::none());
    let fetcher = Fetcher {
        fetch_dir: &cli.fetch_dir,
        unpack_tool: &cli.unpack_tool,
        runner: &runner,
    };
    let units: Vec<ConfiguredUnit> = parsed.configured_units().cloned().collect();
    let issued = fetcher.fetch_all(&units)?;
    tracing::info!(issued, "fetch complete");
    Ok(())
}

fn run_build(cli: &Cli, config: &Config, plan_file: &std::path::Path) -> Result<()> {
    if !cli.prefetched {
        run_fetch(cli, plan_file)?;
    }

    let blob = std::fs::read(plan_file)
        .map_err(|e| plan_orchestrator::error::OrchestratorError::io(plan_file, e))?;
    let parsed = plan::parse(&blob)?;

    let sorted = sort::sort_plan(&parsed)?;
    let tagged = setup_tag::tag_units(sorted);

    let prefix = cli
        .prefix
        .clone()
        .unwrap_or_else(|| std::path::PathBuf::from("/usr/local"));
    let dest_dir = cli
        .dest_dir
        .clone()
        .unwrap_or_else(|| cli.fetch_dir.join("dest"));
    let dest = DestDir::new(&prefix, &dest_dir)?;
    plan_orchestrator::tempdir::create_dir_all(&dest.install_dir)?;

    let pkg_db = PkgDbManager::prepare(&cli.fetch_dir, &dest.install_dir)?;

    let configure_args = cli.configure_args.clone();
    let register_args = cli.register_args.clone();
    let extra_configure: Vec<String> = config
        .configure_args
        .iter()
        .cloned()
        .chain(configure_args)
        .collect();
    let extra_register: Vec<String> = config
        .register_args
        .iter()
        .cloned()
        .chain(register_args)
        .collect();

    let args_provider: Arc<dyn UnitArgsProvider> = Arc::new(move |_unit: &ConfiguredUnit| UnitArgs {
        configure_args: extra_configure.clone(),
        build_args: Vec::new(),
        register_args: extra_register.clone(),
    });

    let ctx = ExecutionContext {
        plan: &parsed,
        prefix: dest.prefix.clone(),
        dest_dir: dest.dest_dir.clone(),
        install_dir: dest.install_dir.clone(),
        fetch_dir: cli.fetch_dir.clone(),
        pkg_db,
        compiler_prog: cli.compiler.clone(),
        register_tool: cli.register_tool.clone(),
        args_provider,
    };

    let strategy = cli.strategy(config);
    executor::execute(&strategy, tagged, &ctx)
}
