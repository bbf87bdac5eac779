use pretty_assertions::assert_eq;
use proptest::prelude::*;
use roster_core::csv::{parse, parse_table, to_csv_string};
use roster_core::{CsvError, CsvRow};

fn row(cells: &[(&str, &str)]) -> CsvRow {
    cells.iter().map(|(h, v)| (*h, *v)).collect()
}

#[test]
fn quoted_comma_and_blank_trailing_line() {
    let rows = parse("Name,Email\n\"Smith, J\",j@x.com\n\n").unwrap();
    assert_eq!(rows, vec![row(&[("Name", "Smith, J"), ("Email", "j@x.com")])]);
}

#[test]
fn escaped_quotes_and_embedded_newlines_are_data() {
    let text = "Name,Notes\r\n\"O\"\"Brien\",\"line one\r\nline two\"\r\n";
    let rows = parse(text).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("Name"), Some("O\"Brien"));
    assert_eq!(rows[0].get("Notes"), Some("line one\r\nline two"));
}

#[test]
fn bare_carriage_returns_end_rows() {
    let rows = parse("A,B\r1,2\r3,4").unwrap();
    assert_eq!(rows, vec![row(&[("A", "1"), ("B", "2")]), row(&[("A", "3"), ("B", "4")])]);
}

#[test]
fn headers_and_cells_are_trimmed() {
    let rows = parse("  First Name , Year \n  Ada  ,  12 \n").unwrap();
    assert_eq!(rows, vec![row(&[("First Name", "Ada"), ("Year", "12")])]);
    assert_eq!(rows[0].headers().collect::<Vec<_>>(), vec!["First Name", "Year"]);
}

#[test]
fn missing_trailing_cells_default_to_empty() {
    let rows = parse("A,B,C\nx\ny,z\n").unwrap();
    assert_eq!(
        rows,
        vec![
            row(&[("A", "x"), ("B", ""), ("C", "")]),
            row(&[("A", "y"), ("B", "z"), ("C", "")]),
        ]
    );
}

#[test]
fn rows_of_only_whitespace_cells_are_dropped() {
    let rows = parse("A,B\n , \n,\n1,2\n\"\",\"  \"\n").unwrap();
    assert_eq!(rows, vec![row(&[("A", "1"), ("B", "2")])]);
}

#[test]
fn extra_cells_beyond_headers_are_ignored() {
    let rows = parse("A\n1,2,3\n").unwrap();
    assert_eq!(rows, vec![row(&[("A", "1")])]);
}

#[test]
fn header_only_input_yields_no_rows() {
    let table = parse_table("Email,Role\n").unwrap();
    assert_eq!(table.headers, vec!["Email".to_string(), "Role".to_string()]);
    assert!(table.rows.is_empty());
}

#[test]
fn blank_input_is_rejected() {
    assert_eq!(parse(""), Err(CsvError::EmptyInput));
    assert_eq!(parse("\n\r\n  ,  \n"), Err(CsvError::EmptyInput));
}

#[test]
fn duplicate_headers_are_rejected() {
    assert_eq!(
        parse("Email, Email\na,b\n"),
        Err(CsvError::DuplicateHeader("Email".to_string()))
    );
}

#[test]
fn blank_header_columns_are_dropped() {
    let table = parse_table("Name,Email,,\nAda,a@x.com,,\n").unwrap();
    assert_eq!(table.headers, vec!["Name".to_string(), "Email".to_string()]);
    assert_eq!(table.rows, vec![row(&[("Name", "Ada"), ("Email", "a@x.com")])]);
}

#[test]
fn blank_header_in_the_middle_skips_its_column() {
    let rows = parse("Name, ,Email\nAda,ignored,a@x.com\n,only here,\n").unwrap();
    assert_eq!(rows, vec![row(&[("Name", "Ada"), ("Email", "a@x.com")])]);
}

#[test]
fn leading_byte_order_mark_is_stripped() {
    let rows = parse("\u{FEFF}Email\nx@y.z\n").unwrap();
    assert_eq!(rows[0].get("Email"), Some("x@y.z"));
}

#[test]
fn serializer_quotes_only_where_needed() {
    let headers = vec!["Name".to_string(), "Notes".to_string()];
    let rows = vec![row(&[("Name", "Plain"), ("Notes", "a,\"b\"\nc")])];
    assert_eq!(
        to_csv_string(&headers, &rows),
        "Name,Notes\nPlain,\"a,\"\"b\"\"\nc\"\n"
    );
}

#[test]
fn rows_serialize_as_ordered_json_objects() {
    let rows = parse("Zeta,Alpha\n1,2\n").unwrap();
    let json = serde_json::to_string(&rows[0]).unwrap();
    assert_eq!(json, r#"{"Zeta":"1","Alpha":"2"}"#);
}

fn cell() -> impl Strategy<Value = String> {
    // Cells never start or end with whitespace, since parsing trims them.
    "[a-zA-Z0-9@.]([a-zA-Z0-9 ,\"\n@.]{0,10}[a-zA-Z0-9@.])?"
}

proptest! {
    #[test]
    fn serialized_rows_parse_back_unchanged(
        width in 1usize..5,
        cells in prop::collection::vec(prop::collection::vec(cell(), 5), 1..8),
    ) {
        let headers: Vec<String> = (0..width).map(|i| format!("col{i}")).collect();
        let rows: Vec<CsvRow> = cells
            .iter()
            .map(|values| headers.iter().cloned().zip(values.iter().cloned()).collect())
            .collect();

        let text = to_csv_string(&headers, &rows);
        prop_assert_eq!(parse(&text).unwrap(), rows);
    }

    #[test]
    fn parsed_rows_are_never_blank(text in "[a ,\"\n]{0,40}") {
        if let Ok(rows) = parse(&format!("h1,h2\n{text}")) {
            for row in rows {
                prop_assert!(row.iter().any(|(_, value)| !value.is_empty()));
            }
        }
    }
}
