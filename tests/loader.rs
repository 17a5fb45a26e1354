mod common;

use common::{TestWorkspace, int, text};
use sheet_mapper::{
    data::Value,
    error::MappingError,
    loader::{LoadMode, LoaderOptions, WorkbookLoader},
    table_set::SOURCE_FILE_COLUMN,
};

fn loader_with(mode: LoadMode) -> WorkbookLoader {
    WorkbookLoader::new(LoaderOptions {
        mode,
        ..LoaderOptions::default()
    })
}

/// A report sheet: title and station lines above the header row.
fn report_rows(device: &str, reading: i64) -> Vec<Vec<Option<Value>>> {
    vec![
        vec![text("110kV 变电站 电度表")],
        vec![text("2024-05")],
        vec![None, text("prior\nreading"), text("current reading"), None],
        vec![text(device), int(reading - 5), int(reading), int(2)],
        vec![None, None, None, None],
        vec![text("aux"), int(1), int(3), int(2)],
    ]
}

#[test]
fn standard_workbook_uses_positional_labels() {
    let workspace = TestWorkspace::new();
    let path = workspace.workbook(
        "plain.xlsx",
        &[(
            "Data",
            vec![
                vec![text("meter"), text("reading")],
                vec![None, None],
                vec![text("202 main"), Some(Value::Float(20.0))],
            ],
        )],
    );

    let tables = WorkbookLoader::default().load(&path).unwrap();

    assert_eq!(tables.keys().collect::<Vec<_>>(), vec!["plain"]);
    let table = tables.get("plain").unwrap();
    assert_eq!(table.headers(), vec!["A", "B"]);
    // Row 1 of the sheet is data, the blank row is dropped.
    assert_eq!(table.row_count(), 2);
    assert_eq!(table.cell(0, 0), Some(&Value::from("meter")));
    assert_eq!(table.cell(1, 1), Some(&Value::Integer(20)));
    assert_eq!(tables.original_file_names(), vec!["plain.xlsx"]);
}

#[test]
fn keyword_in_first_sheet_marks_a_report() {
    let workspace = TestWorkspace::new();
    let path = workspace.workbook("station.xlsx", &[("Jan", report_rows("#1 主变", 120))]);

    let loader = WorkbookLoader::default();
    assert!(loader.detect_complex_report(&path));

    let tables = loader.load(&path).unwrap();
    let table = tables.get("station_Jan").unwrap();
    assert_eq!(
        table.headers(),
        vec!["device id", "priorreading", "current reading", "multiplier"]
    );
    assert_eq!(table.row_count(), 2);
    assert_eq!(table.cell(0, 0), Some(&Value::from("#1 主变")));
    assert_eq!(table.cell(0, 2), Some(&Value::Integer(120)));
    assert_eq!(tables.sheets_for_file("station.xlsx"), vec!["station_Jan"]);
}

#[test]
fn many_sheets_mark_a_report_and_each_sheet_is_keyed() {
    let workspace = TestWorkspace::new();
    let months = ["Jan", "Feb", "Mar", "Apr", "May", "Jun"];
    let sheets = months
        .iter()
        .enumerate()
        .map(|(i, month)| {
            (
                *month,
                vec![
                    vec![text("header")],
                    vec![text("notes")],
                    vec![text("device"), text("reading")],
                    vec![text("202 main"), int(10 + i as i64)],
                ],
            )
        })
        .collect::<Vec<_>>();
    let path = workspace.workbook("monthly.xlsx", &sheets);

    let loader = WorkbookLoader::default();
    assert!(loader.detect_complex_report(&path));
    let tables = loader.load(&path).unwrap();

    assert_eq!(tables.len(), 6);
    assert_eq!(
        tables.table_for_file("monthly.xlsx", Some("mar")).unwrap().cell(0, 1),
        Some(&Value::Integer(12))
    );
    let combined = tables.combined();
    assert_eq!(combined.row_count(), 6);
    assert_eq!(
        combined.headers(),
        vec!["device", "reading", SOURCE_FILE_COLUMN]
    );
    assert_eq!(combined.cell(5, 2), Some(&Value::from("monthly_Jun")));
}

#[test]
fn plain_workbook_is_not_a_report() {
    let workspace = TestWorkspace::new();
    let path = workspace.meters_workbook();
    assert!(!WorkbookLoader::default().detect_complex_report(&path));
}

#[test]
fn forced_complex_mode_falls_back_when_no_sheet_has_data() {
    let workspace = TestWorkspace::new();
    let path = workspace.workbook("tiny.xlsx", &[("Only", vec![vec![text("lonely header")]])]);

    let tables = loader_with(LoadMode::Complex).load(&path).unwrap();

    assert_eq!(tables.keys().collect::<Vec<_>>(), vec!["tiny"]);
    assert_eq!(tables.get("tiny").unwrap().headers(), vec!["A"]);
}

#[test]
fn standard_mode_ignores_report_markers() {
    let workspace = TestWorkspace::new();
    let path = workspace.workbook("station.xlsx", &[("Jan", report_rows("#1", 50))]);

    let tables = loader_with(LoadMode::Standard).load(&path).unwrap();

    let table = tables.get("station").unwrap();
    assert_eq!(table.headers(), vec!["A", "B", "C", "D"]);
    assert_eq!(table.row_count(), 5);
}

#[test]
fn repeated_headers_get_suffixes() {
    let workspace = TestWorkspace::new();
    let path = workspace.workbook(
        "dupes.xlsx",
        &[(
            "S",
            vec![
                vec![text("reading"), text("reading"), text("reading")],
                vec![int(1), int(2), int(3)],
            ],
        )],
    );

    let tables = loader_with(LoadMode::Complex).load(&path).unwrap();

    assert_eq!(
        tables.get("dupes_S").unwrap().headers(),
        vec!["reading", "reading_1", "reading_2"]
    );
}

#[test]
fn row_limit_truncates_tables() {
    let workspace = TestWorkspace::new();
    let path = workspace.meters_workbook();
    let loader = WorkbookLoader::new(LoaderOptions {
        max_data_rows: 2,
        ..LoaderOptions::default()
    });

    let tables = loader.load(&path).unwrap();

    assert_eq!(tables.get("meters").unwrap().row_count(), 2);
}

#[test]
fn invalid_files_are_rejected_before_reading() {
    let workspace = TestWorkspace::new();
    let loader = WorkbookLoader::default();

    let missing = workspace.path().join("absent.xlsx");
    assert!(matches!(loader.load(&missing), Err(MappingError::File { .. })));

    let csv = workspace.write("readings.csv", "a,b\n1,2\n");
    let err = loader.load(&csv).unwrap_err();
    assert!(err.to_string().contains("unsupported extension"));

    let meters = workspace.meters_workbook();
    let strict = WorkbookLoader::new(LoaderOptions {
        max_file_size: 10,
        ..LoaderOptions::default()
    });
    assert!(matches!(strict.load(&meters), Err(MappingError::File { .. })));

    let garbage = workspace.write("broken.xlsx", "not a workbook");
    assert!(matches!(loader.load(&garbage), Err(MappingError::File { .. })));
}

#[test]
fn load_many_merges_tables_from_every_workbook() {
    let workspace = TestWorkspace::new();
    let paths = [
        workspace.meters_workbook(),
        workspace.summary_workbook([None, None, None]),
    ];

    let tables = WorkbookLoader::default().load_many(&paths).unwrap();

    assert_eq!(tables.keys().collect::<Vec<_>>(), vec!["meters", "summary"]);
    assert_eq!(
        tables.original_file_names(),
        vec!["meters.xlsx", "summary.xlsx"]
    );
}
