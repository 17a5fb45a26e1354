mod common;

use common::{TestWorkspace, int, text};
use sheet_mapper::{
    data::Value,
    engine::{MappingEngine, RuleOutcome, validate},
    filter::{MatchOperator, evaluate},
    loader::WorkbookLoader,
    observer::{RecordingObserver, TraceEvent},
    plan::{MappingPlan, MappingRule, RowRange},
    table::Table,
    table_set::TableSet,
    writer::write_tables,
};

fn readings_rule() -> MappingRule {
    MappingRule::new("readings", "meters", "B", "C", "summary", "A", "D")
        .unwrap()
        .with_match_values("202 main", "202 main")
}

fn load(workspace: &TestWorkspace, existing: [Option<Value>; 3]) -> (TableSet, TableSet) {
    let loader = WorkbookLoader::default();
    let source = loader.load(&workspace.meters_workbook()).unwrap();
    let target = loader.load(&workspace.summary_workbook(existing)).unwrap();
    (source, target)
}

fn reading_column(tables: &TableSet) -> Vec<Option<Value>> {
    tables.get("summary").unwrap().column(3).unwrap().to_vec()
}

#[test]
fn loaded_workbooks_map_end_to_end() {
    let workspace = TestWorkspace::new();
    let (source, mut target) = load(&workspace, [None, None, None]);
    let mut engine = MappingEngine::with_observer(RecordingObserver::new());

    let outcome = engine.execute(&readings_rule(), &source, &mut target).unwrap();

    assert_eq!(outcome.written(), 2);
    assert_eq!(
        reading_column(&target),
        vec![text("reading"), None, int(20), int(30)]
    );
    assert_eq!(engine.observer().written_rows(), vec![2, 3]);
}

#[test]
fn overwrite_policy_applies_to_loaded_cells() {
    let workspace = TestWorkspace::new();
    let (source, mut target) = load(&workspace, [None, int(99), None]);

    MappingEngine::with_observer(RecordingObserver::new())
        .execute(&readings_rule().with_overwrite(false), &source, &mut target)
        .unwrap();

    assert_eq!(
        reading_column(&target),
        vec![text("reading"), None, int(99), int(30)]
    );
}

#[test]
fn whitespace_cells_count_as_empty_for_overwrite() {
    let workspace = TestWorkspace::new();
    let (source, mut target) = load(&workspace, [None, text("   "), None]);

    MappingEngine::with_observer(RecordingObserver::new())
        .execute(&readings_rule().with_overwrite(false), &source, &mut target)
        .unwrap();

    assert_eq!(
        reading_column(&target),
        vec![text("reading"), None, int(20), int(30)]
    );
}

#[test]
fn text_match_value_finds_numeric_cells() {
    let workspace = TestWorkspace::new();
    let (source, mut target) = load(&workspace, [None, None, None]);
    // Column A of the meters sheet holds numbers; the rule was typed as text.
    let rule = MappingRule::new("by id", "meters", "A", "C", "summary", "A", "D")
        .unwrap()
        .with_match_values("4", "201 main");
    let mut engine = MappingEngine::with_observer(RecordingObserver::new());

    let outcome = engine.execute(&rule, &source, &mut target).unwrap();

    assert_eq!(outcome.written(), 1);
    assert_eq!(reading_column(&target)[1], int(40));
    assert!(engine.observer().events.iter().any(|e| matches!(
        e,
        TraceEvent::CoercionTried { matched: 1, .. }
    )));
}

#[test]
fn row_windows_restrict_matching() {
    let workspace = TestWorkspace::new();
    let (source, mut target) = load(&workspace, [None, None, None]);
    let rule = readings_rule()
        .with_source_rows(RowRange::new(3, 10).unwrap())
        .with_target_rows(RowRange::new(4, 4).unwrap());

    let outcome = MappingEngine::with_observer(RecordingObserver::new())
        .execute(&rule, &source, &mut target)
        .unwrap();

    assert_eq!(
        outcome,
        RuleOutcome::Applied {
            extracted: 1,
            positions: 1,
            written: 1
        }
    );
    assert_eq!(
        reading_column(&target),
        vec![text("reading"), None, None, int(30)]
    );
}

#[test]
fn operators_select_expected_rows() {
    let cells = vec![int(10), text("15"), None, text("  "), text("abc"), Some(Value::Float(20.5))];

    let positions = |value: Option<Value>, operator: MatchOperator| {
        evaluate(&cells, value.as_ref(), operator).unwrap().positions()
    };

    assert_eq!(positions(int(15), MatchOperator::GreaterEqual), vec![1, 5]);
    assert_eq!(positions(int(15), MatchOperator::LessThan), vec![0]);
    assert_eq!(positions(text("b"), MatchOperator::Contains), vec![4]);
    assert_eq!(positions(text("b"), MatchOperator::NotContains), vec![0, 1, 2, 3, 5]);
    assert_eq!(positions(text("1"), MatchOperator::StartsWith), vec![0, 1]);
    assert_eq!(positions(text(".5"), MatchOperator::EndsWith), vec![5]);
    assert_eq!(positions(None, MatchOperator::IsNotEmpty), vec![0, 1, 4, 5]);
    assert_eq!(positions(int(10), MatchOperator::NotEquals), vec![1, 2, 3, 4, 5]);
}

#[test]
fn plan_round_trip_executes_the_same() {
    let workspace = TestWorkspace::new();
    let (source, target) = load(&workspace, [None, None, None]);
    let mut plan = MappingPlan::new("monthly");
    plan.add_rule(readings_rule());
    plan.add_rule(
        MappingRule::new("units", "meters", "B", "A", "summary", "A", "B")
            .unwrap()
            .with_match_values("201 main", "201 main"),
    );
    let path = workspace.path().join("plan.yaml");
    plan.save(&path).unwrap();
    let reloaded = MappingPlan::load(&path).unwrap();

    let report = MappingEngine::with_observer(RecordingObserver::new())
        .execute_plan(&reloaded, &source, &target);

    assert_eq!(report.applied(), 2);
    assert_eq!(report.cells_written(), 3);
    let summary = report.tables.get("summary").unwrap();
    assert_eq!(summary.cell(1, 1), Some(&Value::Integer(1)));

    let written = write_tables(&report.tables, &workspace.path().join("out")).unwrap();
    // The written workbook gains a label row (A, B, C, D) above the data.
    let reread = WorkbookLoader::default().load(&written[0]).unwrap();
    let reread = reread.get("summary").unwrap();
    assert_eq!(reread.cell(0, 3), Some(&Value::from("D")));
    assert_eq!(reread.cell(4, 3), Some(&Value::Integer(30)));
}

#[test]
fn date_like_text_keys_survive_plan_persistence() {
    let workspace = TestWorkspace::new();
    let mut source = TableSet::new();
    source.insert(
        "meters",
        Table::from_rows(
            "meters",
            vec!["A".into(), "B".into()],
            vec![vec![text("2024-05-06"), int(7)]],
        ),
    );
    let mut target = TableSet::new();
    target.insert(
        "summary",
        Table::from_rows(
            "summary",
            vec!["A".into(), "B".into()],
            vec![vec![text("2024-05-06"), None]],
        ),
    );
    let rule = MappingRule::new("by day", "meters", "A", "B", "summary", "A", "B")
        .unwrap()
        .with_match_values("2024-05-06", "2024-05-06");
    let mut plan = MappingPlan::new("daily");
    plan.add_rule(rule);

    for name in ["daily.json", "daily.yaml"] {
        let path = workspace.path().join(name);
        plan.save(&path).unwrap();
        let reloaded = MappingPlan::load(&path).unwrap();
        assert_eq!(
            reloaded.rules[0].source_match_value,
            Some(Value::from("2024-05-06")),
            "match value type after {name}"
        );

        let report = MappingEngine::with_observer(RecordingObserver::new())
            .execute_plan(&reloaded, &source, &target);
        assert_eq!(report.cells_written(), 1, "rule applied after {name}");
        assert_eq!(
            report.tables.get("summary").unwrap().cell(0, 1),
            Some(&Value::Integer(7))
        );
    }
}

#[test]
fn validate_reports_problems_without_mutation() {
    let workspace = TestWorkspace::new();
    let (source, target) = load(&workspace, [None, None, None]);
    let before = (source.clone(), target.clone());
    let mut rule = readings_rule();
    rule.source_file = "nope".into();

    let problems = validate(&rule, &source, &target);

    assert!(!problems.is_empty());
    assert!(problems[0].contains("nope"));
    assert_eq!((source, target), before);
}

#[test]
fn batch_keeps_going_after_a_failing_rule() {
    let mut source = TableSet::new();
    source.insert(
        "meters",
        Table::from_rows(
            "meters",
            vec!["A".into(), "B".into()],
            vec![vec![text("x"), int(1)]],
        ),
    );
    let mut target = TableSet::new();
    target.insert(
        "summary",
        Table::from_rows("summary", vec!["A".into(), "B".into()], vec![vec![text("x"), None]]),
    );
    let bad = MappingRule::new("bad", "meters", "A", "Q", "summary", "A", "B")
        .unwrap()
        .with_match_values("x", "x");
    let good = MappingRule::new("good", "meters", "A", "B", "summary", "A", "B")
        .unwrap()
        .with_match_values("x", "x");

    let mut engine = MappingEngine::with_observer(RecordingObserver::new());
    let report = engine.execute_multiple(&[bad, good], &source, &target);

    let failures = report.failed().map(|(rule, _)| rule.rule_name.as_str()).collect::<Vec<_>>();
    assert_eq!(failures, vec!["bad"]);
    assert_eq!(report.tables.get("summary").unwrap().cell(0, 1), Some(&Value::Integer(1)));
    assert!(engine.observer().events.iter().any(|e| matches!(e, TraceEvent::RuleFailed { .. })));
}
