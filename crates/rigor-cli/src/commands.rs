use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::ArgMatches;
use rigor_client::{HttpBackend, NewWorkspace};
use rigor_core::presentation::workspace_looks_ai_generated;
use rigor_core::{
    RemoteRunStatus, RigorConfig, RunOrchestrator, RunOutcome, WorkspaceId, WorkspaceStore,
};

/// Exit code when the user interrupts a run
const INTERRUPTED: u8 = 130;

pub(crate) async fn dispatch(matches: &ArgMatches) -> Result<ExitCode> {
    let config = load_config(matches)?;
    let backend = Arc::new(
        HttpBackend::new(&config.client).context("failed to set up the API client")?,
    );
    tracing::debug!(base_url = %backend.base_url(), "api client ready");

    match matches.subcommand() {
        Some(("show", args)) => show(&backend, &config, workspace_of(args)?).await,
        Some(("push", args)) => push(&backend, &config, workspace_of(args)?, args).await,
        Some(("new-file", args)) => {
            let name = required(args, "name")?;
            let mut store = open_store(&backend, &config, workspace_of(args)?).await?;
            store.create_file(name).await?;
            println!("created {name}");
            Ok(ExitCode::SUCCESS)
        }
        Some(("rm", args)) => {
            let path = required(args, "path")?;
            let mut store = open_store(&backend, &config, workspace_of(args)?).await?;
            store.delete_file(path).await?;
            println!("deleted {path}");
            Ok(ExitCode::SUCCESS)
        }
        Some(("run", args)) => run(&backend, &config, workspace_of(args)?, args).await,
        Some(("runs", args)) => runs(&backend, workspace_of(args)?, args.get_flag("json")).await,
        Some(("create", args)) => create(&backend, args).await,
        Some((other, _)) => bail!("unknown command {other}"),
        None => bail!("no command given"),
    }
}

fn load_config(matches: &ArgMatches) -> Result<RigorConfig> {
    let mut config = match matches.get_one::<PathBuf>("config") {
        Some(path) => RigorConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => RigorConfig::new(),
    }
    .with_env_overrides();

    if let Some(url) = matches.get_one::<String>("api-url") {
        config.client.base_url.clone_from(url);
    }
    config.validate()?;
    Ok(config)
}

fn workspace_of(args: &ArgMatches) -> Result<WorkspaceId> {
    args.get_one::<u64>("workspace")
        .copied()
        .map(WorkspaceId)
        .context("missing workspace id")
}

fn required<'a>(args: &'a ArgMatches, name: &str) -> Result<&'a str> {
    args.get_one::<String>(name)
        .map(String::as_str)
        .with_context(|| format!("missing argument {name}"))
}

fn read_local(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

async fn open_store(
    backend: &Arc<HttpBackend>,
    config: &RigorConfig,
    workspace: WorkspaceId,
) -> Result<WorkspaceStore> {
    let mut store = WorkspaceStore::new(backend.clone(), config.workspace.clone());
    store
        .load(workspace)
        .await
        .with_context(|| format!("failed to load workspace {workspace}"))?;
    Ok(store)
}

async fn show(backend: &Arc<HttpBackend>, config: &RigorConfig, workspace: WorkspaceId) -> Result<ExitCode> {
    let store = open_store(backend, config, workspace).await?;
    if let Some(meta) = store.meta() {
        println!("workspace {} {}", meta.id, meta.name);
        if let Some(description) = meta.description.as_deref().filter(|d| !d.is_empty()) {
            println!("  {description}");
        }
        if let Some(investigation) = meta.investigation_id {
            println!("  investigation {investigation}");
        }
    }
    if workspace_looks_ai_generated(&store) {
        println!("  entry file looks AI-generated");
    }

    let entry = store.entry_path();
    for file in store.files() {
        let marker = if Some(file.path.as_str()) == entry { "  (entry)" } else { "" };
        println!("  {:<32} {:>7} bytes{marker}", file.path, file.content.len());
    }
    Ok(ExitCode::SUCCESS)
}

async fn push(
    backend: &Arc<HttpBackend>,
    config: &RigorConfig,
    workspace: WorkspaceId,
    args: &ArgMatches,
) -> Result<ExitCode> {
    let path = required(args, "path")?;
    let local = args
        .get_one::<PathBuf>("from")
        .cloned()
        .unwrap_or_else(|| PathBuf::from(path));
    let content = read_local(&local)?;

    let mut store = open_store(backend, config, workspace).await?;
    if store.get_file(path).is_none() {
        store.create_file(path).await?;
    }
    store.set_content(path, content)?;
    store.save(path).await?;
    println!("saved {path}");
    Ok(ExitCode::SUCCESS)
}

async fn run(
    backend: &Arc<HttpBackend>,
    config: &RigorConfig,
    workspace: WorkspaceId,
    args: &ArgMatches,
) -> Result<ExitCode> {
    let mut store = open_store(backend, config, workspace).await?;
    let active = match args.get_one::<String>("file") {
        Some(file) => file.clone(),
        None => store
            .entry_path()
            .context("workspace has no files")?
            .to_string(),
    };
    if let Some(local) = args.get_one::<PathBuf>("from") {
        store.set_content(&active, read_local(local)?)?;
    }

    let orchestrator = RunOrchestrator::new(workspace, backend.clone(), config.poll);
    let handle = orchestrator.submit(&mut store, &active).await?;
    if let Some(run_id) = handle.run_id() {
        eprintln!("run {run_id} accepted, waiting for the result");
    }

    let completion = tokio::select! {
        done = handle.wait() => done?,
        _ = tokio::signal::ctrl_c() => {
            orchestrator.cancel();
            eprintln!("stopped waiting; the remote run was not cancelled");
            return Ok(ExitCode::from(INTERRUPTED));
        }
    };

    if args.get_flag("json") {
        let body = serde_json::json!({
            "run": &completion.run,
            "outcome": completion.outcome.as_ref().map_err(ToString::to_string),
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
    }

    let outcome = completion.outcome?;
    if !args.get_flag("json") {
        print_outcome(&outcome);
    }
    Ok(ExitCode::from(exit_code(&outcome)))
}

fn print_outcome(outcome: &RunOutcome) {
    match outcome {
        RunOutcome::Success { stdout } => print!("{stdout}"),
        RunOutcome::ExecutionFailure { stdout, stderr } => {
            print!("{stdout}");
            eprint!("{stderr}");
        }
        RunOutcome::PolicyBlocked { violations } => {
            eprintln!("blocked by the sandbox policy:");
            for violation in violations {
                eprintln!("  - {violation}");
            }
        }
        RunOutcome::LocalTimeout { attempts } => {
            eprintln!("no result after {attempts} polls; the run may still finish remotely");
        }
    }
}

/// Process exit code for a run outcome
pub(crate) fn exit_code(outcome: &RunOutcome) -> u8 {
    match outcome {
        RunOutcome::Success { .. } => 0,
        RunOutcome::ExecutionFailure { .. } => 1,
        RunOutcome::PolicyBlocked { .. } => 2,
        RunOutcome::LocalTimeout { .. } => 3,
    }
}

fn status_label(status: RemoteRunStatus) -> &'static str {
    match status {
        RemoteRunStatus::Queued => "queued",
        RemoteRunStatus::Running => "running",
        RemoteRunStatus::Completed => "completed",
        RemoteRunStatus::Failed => "failed",
        RemoteRunStatus::FailedStaticCheck => "failed_static_check",
    }
}

async fn runs(backend: &Arc<HttpBackend>, workspace: WorkspaceId, json: bool) -> Result<ExitCode> {
    let runs = backend.list_runs(workspace).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&runs)?);
        return Ok(ExitCode::SUCCESS);
    }

    if runs.is_empty() {
        println!("no runs yet");
    }
    for run in &runs {
        let exit = run.exit_code.map_or_else(|| "-".to_string(), |c| c.to_string());
        let duration = run
            .duration_ms
            .map_or_else(|| "-".to_string(), |ms| format!("{ms}ms"));
        println!(
            "{:>6}  {:<20} exit {:>3}  {:>8}  {}",
            run.id.to_string(),
            status_label(run.status),
            exit,
            duration,
            run.started_at.as_deref().unwrap_or("")
        );
    }
    Ok(ExitCode::SUCCESS)
}

async fn create(backend: &Arc<HttpBackend>, args: &ArgMatches) -> Result<ExitCode> {
    let mut request = NewWorkspace::named(required(args, "name")?);
    if let Some(description) = args.get_one::<String>("description") {
        request = request.with_description(description.as_str());
    }
    if let Some(investigation) = args.get_one::<u64>("investigation") {
        request = request.for_investigation(*investigation);
    }
    if let Some(agent) = args.get_one::<u64>("agent") {
        request = request.with_agent(*agent);
    }
    if args.get_flag("generate") {
        request = request.generated();
    }

    let created = backend.create_workspace(&request).await?;
    println!(
        "created workspace {} {}",
        created.workspace.meta.id, created.workspace.meta.name
    );
    if let Some(explanation) = created.explanation {
        println!("{explanation}");
    }
    Ok(ExitCode::SUCCESS)
}
