use chrono::NaiveDate;
use dashsync_io::{
    CellData, CellValue, Sheet, SpreadsheetReader, SpreadsheetWriter, UmyaAdapter,
    WriteTransaction,
};

fn build_dashboard(path: &std::path::Path) {
    let mut book = umya_spreadsheet::new_file();
    let ws = book.get_sheet_by_name_mut("Sheet1").expect("default sheet");
    ws.set_name("Campaigns");
    ws.get_cell_mut((1, 1)).set_value("bitly");
    ws.get_cell_mut((2, 1)).set_value("total_clicks");
    ws.get_cell_mut((1, 6)).set_value("bitly");
    ws.get_cell_mut((2, 6)).set_value("http://bit.ly/abc");
    ws.get_cell_mut((3, 6)).set_value_number(3.0);
    ws.get_cell_mut((4, 6)).set_formula("C6*2");
    umya_spreadsheet::writer::xlsx::write(&book, path).expect("write workbook");
}

#[test]
fn reads_values_and_formulas() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("dashboard.xlsx");
    build_dashboard(&path);

    let mut adapter = UmyaAdapter::open_path(&path).unwrap();
    assert_eq!(adapter.sheet_names().unwrap(), vec!["Campaigns".to_string()]);
    let sheet = Sheet::load(&mut adapter, "Campaigns").unwrap();
    assert_eq!(sheet.text(1, 1).as_deref(), Some("bitly"));
    assert_eq!(sheet.get(6, 3), Some(&CellValue::Int(3)));
    assert!(!sheet.is_blank(6, 4));
    assert_eq!(sheet.cell(6, 4).unwrap().formula.as_deref(), Some("=C6*2"));
}

#[test]
fn committed_writes_persist_in_place() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("dashboard.xlsx");
    build_dashboard(&path);

    let mut adapter = UmyaAdapter::open_path(&path).unwrap();
    let mut sheet = Sheet::load(&mut adapter, "Campaigns").unwrap();
    sheet.set(6, 3, CellValue::Int(12));
    sheet.set(7, 5, CellValue::Date(NaiveDate::from_ymd_opt(2016, 3, 15).unwrap()));
    let mut tx = WriteTransaction::new(&mut adapter);
    sheet.stage(&mut tx);
    tx.commit().unwrap();

    let mut reopened = UmyaAdapter::open_path(&path).unwrap();
    let sheet = Sheet::load(&mut reopened, "Campaigns").unwrap();
    assert_eq!(sheet.get(6, 3), Some(&CellValue::Int(12)));
    // dates are stored as serials
    assert_eq!(
        sheet.get(7, 5).and_then(CellValue::as_date),
        NaiveDate::from_ymd_opt(2016, 3, 15)
    );
}

#[test]
fn bytes_roundtrip() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("dashboard.xlsx");
    build_dashboard(&path);

    let mut adapter = UmyaAdapter::open_path(&path).unwrap();
    adapter
        .write_cell("Campaigns", 6, 5, CellData::from_value(true))
        .unwrap();
    let bytes = adapter.save_to_bytes().unwrap();

    let mut from_bytes = UmyaAdapter::open_bytes(bytes).unwrap();
    let data = from_bytes.read_sheet("Campaigns").unwrap();
    assert_eq!(
        data.cells.get(&(6, 5)).unwrap().value,
        Some(CellValue::Boolean(true))
    );
}
