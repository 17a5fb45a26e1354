use proptest::prelude::*;
use sheet_mapper::coordinate::{Coordinate, CoordinateKind, to_column_letters, to_index};

fn letters_strategy() -> impl Strategy<Value = String> {
    "[A-Z]{1,3}"
}

fn coordinate_text() -> impl Strategy<Value = String> {
    let row = 1u32..100_000;
    prop_oneof![
        (letters_strategy(), row.clone()).prop_map(|(c, r)| format!("{c}{r}")),
        (letters_strategy(), row.clone(), letters_strategy(), row.clone())
            .prop_map(|(c1, r1, c2, r2)| format!("{c1}{r1}:{c2}{r2}")),
        letters_strategy(),
        letters_strategy().prop_map(|c| format!("{c}:{c}")),
        row.clone().prop_map(|r| r.to_string()),
        row.prop_map(|r| format!("{r}:{r}")),
    ]
}

proptest! {
    #[test]
    fn index_round_trips_through_letters(index in 0usize..1_000_000) {
        prop_assert_eq!(to_index(&to_column_letters(index)), index);
    }

    #[test]
    fn letters_round_trip_through_index(letters in letters_strategy()) {
        prop_assert_eq!(to_column_letters(to_index(&letters)), letters);
    }

    #[test]
    fn canonical_form_is_idempotent(text in coordinate_text()) {
        let parsed = Coordinate::parse(&text).unwrap();
        let reparsed = Coordinate::parse(&parsed.to_string()).unwrap();
        prop_assert_eq!(reparsed.to_string(), parsed.to_string());
        prop_assert_eq!(reparsed, parsed);
    }

    #[test]
    fn lowercase_input_parses_like_uppercase(text in coordinate_text()) {
        let lower = format!("  {}  ", text.to_lowercase());
        prop_assert_eq!(Coordinate::parse(&lower).unwrap(), Coordinate::parse(&text).unwrap());
    }
}

#[test]
fn multi_letter_columns_map_past_z() {
    assert_eq!(to_index("Z"), 25);
    assert_eq!(to_index("AA"), 26);
    assert_eq!(to_column_letters(26), "AA");
    assert_eq!(to_column_letters(701), "ZZ");
    assert_eq!(to_column_letters(702), "AAA");
}

#[test]
fn degenerate_ranges_collapse() {
    let column = Coordinate::parse("A1:A1").unwrap();
    assert_eq!(column.kind(), CoordinateKind::Column);
    assert_eq!(column.column_letters(), "A");

    let row = Coordinate::parse("1:1").unwrap();
    assert_eq!(row.kind(), CoordinateKind::Row);
    assert_eq!(row.row_number(), Some(1));

    let range = Coordinate::parse("A1:B5").unwrap();
    assert_eq!(range.kind(), CoordinateKind::Range);
    assert_eq!(range.to_string(), "A1:B5");
    assert_eq!(range.end_column_letters(), Some("B"));
    assert_eq!(range.end_row_number(), Some(5));
}

#[test]
fn malformed_text_is_rejected() {
    for bad in ["", "A0", "1A", "A1:", "A1:B2:C3", "A-1", "é5"] {
        assert!(Coordinate::parse(bad).is_err(), "{bad:?} should not parse");
    }
}
