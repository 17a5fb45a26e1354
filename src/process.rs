use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use log::{debug, info, warn};

use crate::{
    cli::{LoadArgs, MapArgs, ValidateArgs},
    engine::{self, MappingEngine, RuleOutcome},
    loader::{LoaderOptions, WorkbookLoader},
    observer::{LogObserver, RecordingObserver, Tee},
    plan::MappingPlan,
    table::render_table,
    table_set::TableSet,
    writer,
};

pub fn loader_from_args(args: &LoadArgs) -> WorkbookLoader {
    let mut options = LoaderOptions {
        mode: args.mode,
        ..LoaderOptions::default()
    };
    if let Some(max_rows) = args.max_rows {
        options.max_data_rows = max_rows;
    }
    if let Some(max_mb) = args.max_size_mb {
        options.max_file_size = max_mb.saturating_mul(1024 * 1024);
    }
    debug!("Loader options: {options:?}");
    WorkbookLoader::new(options)
}

pub fn validate(args: &ValidateArgs) -> Result<()> {
    let plan = load_plan(&args.plan)?;
    let loader = loader_from_args(&args.load);
    let source = load_workbooks(&loader, &args.sources, "source")?;
    let target = load_workbooks(&loader, &args.targets, "target")?;

    let mut problem_count = 0;
    for rule in &plan.rules {
        let problems = engine::validate(rule, &source, &target);
        if problems.is_empty() {
            println!("ok     {}", rule.name);
            continue;
        }
        problem_count += problems.len();
        for problem in problems {
            println!("error  {}: {problem}", rule.name);
        }
    }

    if problem_count > 0 {
        return Err(anyhow!(
            "Plan '{}' has {problem_count} problem(s) across {} rule(s)",
            plan.name,
            plan.rules.len()
        ));
    }
    info!("Plan '{}': all {} rule(s) are valid", plan.name, plan.rules.len());
    Ok(())
}

pub fn map(args: &MapArgs) -> Result<()> {
    let plan = load_plan(&args.plan)?;
    let loader = loader_from_args(&args.load);
    let source = load_workbooks(&loader, &args.sources, "source")?;
    let target = load_workbooks(&loader, &args.targets, "target")?;

    for key in plan.required_tables() {
        if !source.contains(key) && !target.contains(key) {
            warn!("Plan '{}' refers to table '{key}' which was not loaded", plan.name);
        }
    }

    let mut log = LogObserver;
    let mut recorder = RecordingObserver::new();
    let report = MappingEngine::with_observer(Tee(&mut log, &mut recorder))
        .execute_plan(&plan, &source, &target);

    let rows = report
        .reports
        .iter()
        .map(|rule| {
            let (outcome, extracted, positions, written) = match &rule.outcome {
                Ok(RuleOutcome::Applied {
                    extracted,
                    positions,
                    written,
                }) => (
                    "applied".to_string(),
                    extracted.to_string(),
                    positions.to_string(),
                    written.to_string(),
                ),
                Ok(RuleOutcome::NoSourceMatch) => no_match("no source match"),
                Ok(RuleOutcome::NoTargetMatch) => no_match("no target match"),
                Err(err) => no_match(&format!("failed: {err}")),
            };
            vec![rule.rule_name.clone(), outcome, extracted, positions, written]
        })
        .collect::<Vec<_>>();
    let headers = ["rule", "outcome", "extracted", "positions", "written"]
        .map(String::from)
        .to_vec();
    print!("{}", render_table(&headers, &rows));

    let paths = writer::write_tables(&report.tables, &args.output_dir)
        .with_context(|| format!("Writing target tables to {:?}", args.output_dir))?;
    let failed = report.failed().count();
    println!(
        "{} of {} rule(s) applied, {} cell(s) written, {failed} failed, {} evaluation fallback(s); {} workbook(s) written to {}",
        report.applied(),
        report.reports.len(),
        report.cells_written(),
        recorder.fallback_count(),
        paths.len(),
        args.output_dir.display()
    );

    if args.strict && failed > 0 {
        return Err(anyhow!("{failed} rule(s) failed"));
    }
    Ok(())
}

fn no_match(outcome: &str) -> (String, String, String, String) {
    (outcome.to_string(), "-".into(), "-".into(), "-".into())
}

fn load_plan(path: &Path) -> Result<MappingPlan> {
    let plan = MappingPlan::load(path).with_context(|| format!("Loading mapping plan {path:?}"))?;
    info!("Loaded plan '{}' with {} rule(s)", plan.name, plan.rules.len());
    Ok(plan)
}

fn load_workbooks(loader: &WorkbookLoader, paths: &[PathBuf], role: &str) -> Result<TableSet> {
    let mut tables = TableSet::new();
    for path in paths {
        let loaded = loader
            .load(path)
            .with_context(|| format!("Loading {role} workbook {path:?}"))?;
        tables.extend(loaded);
    }
    info!(
        "Loaded {} {role} table(s): {}",
        tables.len(),
        tables.keys().collect::<Vec<_>>().join(", ")
    );
    Ok(tables)
}
