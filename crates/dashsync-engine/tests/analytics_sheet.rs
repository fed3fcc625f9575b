use chrono::NaiveDate;
use dashsync_common::CellValue;
use dashsync_engine::sheets::analytics;
use dashsync_engine::{AnalyticsQuery, AnalyticsReport, Providers, ReconcileError, SheetPass, SheetSummary};
use dashsync_io::Sheet;
use dashsync_testkit::{FakeAnalytics, date, report, sheet, value_at, website};

const HEADER: &[&str] = &[
    "description",
    "metrics",
    "dimensions",
    "sort",
    "filters",
    "max_results",
    "display_dimension",
    "index",
    "2024-01",
    "2024-02",
];

fn dashboard() -> Sheet {
    sheet(
        "example.org",
        &[
            HEADER,
            &["Sessions", "ga:sessions", "", "", "", "", "", ""],
            &["Top countries", "ga:sessions", "ga:country", "-ga:sessions", "", "5", "", ""],
            &["#1", "", "", "", "", "", "", "1"],
            &["#2", "", "", "", "", "", "", "2"],
            &["Mobile", "ga:sessions", "ga:deviceCategory", "", "", "", "mobile", ""],
        ],
    )
}

fn answer(query: &AnalyticsQuery) -> AnalyticsReport {
    match query.dimensions.as_deref() {
        None => report(&[], &[("ga:sessions", "1200")]),
        Some("ga:country") => report(
            &[&["US", "600"], &["DE", "300"], &["FR", "100"]],
            &[("ga:sessions", "1000")],
        ),
        Some(_) => report(
            &[&["desktop", "700"], &["mobile", "500"]],
            &[("ga:sessions", "1200")],
        ),
    }
}

fn run(sheet: &mut Sheet, fake: &mut FakeAnalytics, today: NaiveDate) -> Result<SheetSummary, ReconcileError> {
    let mut providers = Providers::new().with_analytics(fake);
    let mut pass = SheetPass::new(sheet, &mut providers, today);
    analytics::reconcile(&mut pass, &website("example.org"))?;
    Ok(pass.into_summary())
}

#[test]
fn elapsed_month_is_filled_and_open_month_deferred() {
    let mut s = dashboard();
    let mut fake = FakeAnalytics::new(|q| Ok(answer(q)));

    let summary = run(&mut s, &mut fake, date(2024, 2, 10)).unwrap();

    assert_eq!(value_at(&s, "I2"), CellValue::Int(1200));
    assert!(s.is_blank(3, 9), "group head rows only feed the cache");
    assert_eq!(value_at(&s, "I4"), CellValue::text("60% - US (600)"));
    assert_eq!(value_at(&s, "I5"), CellValue::text("30% - DE (300)"));
    assert_eq!(value_at(&s, "I6"), CellValue::Int(500));
    for row in 2..=6 {
        assert!(s.is_blank(row, 10), "February is still open");
    }

    assert_eq!(summary.cells_written, 4);
    assert_eq!(summary.cells_deferred, 4);
    assert_eq!(summary.provider_calls, 3);
}

#[test]
fn one_query_serves_every_index_row_of_a_group() {
    let mut s = dashboard();
    let mut fake = FakeAnalytics::new(|q| Ok(answer(q)));
    run(&mut s, &mut fake, date(2024, 2, 10)).unwrap();

    let grouped: Vec<_> = fake
        .calls
        .iter()
        .filter(|q| q.dimensions.as_deref() == Some("ga:country"))
        .collect();
    assert_eq!(grouped.len(), 1);
    assert_eq!(grouped[0].max_results, Some(5));
    assert_eq!(grouped[0].sort.as_deref(), Some("-ga:sessions"));
    assert_eq!(grouped[0].window.start, date(2024, 1, 1));
    assert_eq!(grouped[0].window.end, date(2024, 1, 31));
    assert!(fake.calls.iter().all(|q| q.profile_id == "12345"));
}

#[test]
fn second_run_makes_no_queries() {
    let mut s = dashboard();
    let mut fake = FakeAnalytics::new(|q| Ok(answer(q)));
    run(&mut s, &mut fake, date(2024, 2, 10)).unwrap();
    s.take_changes();

    let mut idle = FakeAnalytics::unreachable();
    let summary = run(&mut s, &mut idle, date(2024, 2, 11)).unwrap();
    assert_eq!(summary.cells_written, 0);
    assert!(s.changes().is_empty());
}

#[test]
fn filled_cells_are_never_overwritten() {
    let mut s = dashboard();
    s.set(4, 9, CellValue::text("edited by hand"));
    s.take_changes();
    let mut fake = FakeAnalytics::new(|q| Ok(answer(q)));

    run(&mut s, &mut fake, date(2024, 2, 10)).unwrap();

    assert_eq!(value_at(&s, "I4"), CellValue::text("edited by hand"));
    assert_eq!(value_at(&s, "I5"), CellValue::text("30% - DE (300)"));
    assert!(!s.changes().contains_key(&(4, 9)));
}

#[test]
fn both_months_fill_once_elapsed() {
    let mut s = dashboard();
    let mut fake = FakeAnalytics::new(|q| Ok(answer(q)));
    let summary = run(&mut s, &mut fake, date(2024, 3, 1)).unwrap();
    assert_eq!(summary.cells_written, 8);
    assert_eq!(summary.cells_deferred, 0);
    assert_eq!(value_at(&s, "J4"), CellValue::text("60% - US (600)"));
    assert_eq!(fake.call_count(), 6);
}

#[test]
fn period_data_below_the_templates_is_rejected() {
    let mut s = dashboard();
    s.set(8, 9, CellValue::Int(3));
    let mut fake = FakeAnalytics::unreachable();
    let err = run(&mut s, &mut fake, date(2024, 3, 1)).unwrap_err();
    assert!(matches!(err, ReconcileError::TemplateLengthMismatch { .. }), "{err}");
}

#[test]
fn several_metrics_need_max_results() {
    let mut s = dashboard();
    s.set(2, 2, CellValue::text("ga:sessions,ga:users"));
    let mut fake = FakeAnalytics::unreachable();
    let err = run(&mut s, &mut fake, date(2024, 3, 1)).unwrap_err();
    match err {
        ReconcileError::UnsupportedMetrics { cell, metrics, .. } => {
            assert_eq!(cell, "B2");
            assert_eq!(metrics, "ga:sessions,ga:users");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn header_problems_are_configuration_errors() {
    let mut missing = sheet("example.org", &[&HEADER[..7], &["Sessions", "ga:sessions"]]);
    let mut fake = FakeAnalytics::unreachable();
    let err = run(&mut missing, &mut fake, date(2024, 3, 1)).unwrap_err();
    assert!(matches!(
        err,
        ReconcileError::MissingTemplateColumn { ref column, .. } if column == "index"
    ));
    assert!(err.is_configuration());

    let mut bad_period = dashboard();
    bad_period.set(1, 11, CellValue::text("Total"));
    let err = run(&mut bad_period, &mut fake, date(2024, 3, 1)).unwrap_err();
    assert!(matches!(err, ReconcileError::InvalidPeriod { ref cell, .. } if cell == "K1"));
}

#[test]
fn non_positive_index_is_rejected() {
    let mut s = dashboard();
    s.set(5, 8, CellValue::Int(0));
    let mut fake = FakeAnalytics::unreachable();
    let err = run(&mut s, &mut fake, date(2024, 3, 1)).unwrap_err();
    assert!(matches!(
        err,
        ReconcileError::InvalidTemplateValue { ref column, .. } if column == "index"
    ));
}

#[test]
fn index_rows_read_their_group_across_spacers_and_totals() {
    let mut s = sheet(
        "example.org",
        &[
            HEADER,
            &["Top countries", "ga:sessions", "ga:country", "-ga:sessions", "", "5", "", ""],
            &["#1", "", "", "", "", "", "", "1"],
            &[],
            &["#2", "", "", "", "", "", "", "2"],
            &["Sessions", "ga:sessions", "", "", "", "", "", ""],
            &["#3", "", "", "", "", "", "", "3"],
        ],
    );
    let mut fake = FakeAnalytics::new(|q| Ok(answer(q)));

    run(&mut s, &mut fake, date(2024, 2, 10)).unwrap();

    assert_eq!(value_at(&s, "I3"), CellValue::text("60% - US (600)"));
    assert!(s.is_blank(4, 9));
    assert_eq!(value_at(&s, "I5"), CellValue::text("30% - DE (300)"));
    assert_eq!(value_at(&s, "I6"), CellValue::Int(1200));
    assert_eq!(value_at(&s, "I7"), CellValue::text("10% - FR (100)"));
    assert_eq!(fake.call_count(), 2);
}

#[test]
fn a_group_is_refetched_while_any_member_is_blank() {
    let mut s = sheet(
        "example.org",
        &[
            HEADER,
            &["Top countries", "ga:sessions", "ga:country", "-ga:sessions", "", "5", "", ""],
            &["#1", "", "", "", "", "", "", "1"],
            &["Sessions", "ga:sessions", "", "", "", "", "", ""],
            &["#2", "", "", "", "", "", "", "2"],
        ],
    );
    s.set(3, 9, CellValue::text("kept"));
    s.set(4, 9, CellValue::Int(7));
    let mut fake = FakeAnalytics::new(|q| Ok(answer(q)));

    run(&mut s, &mut fake, date(2024, 2, 10)).unwrap();

    assert_eq!(value_at(&s, "I3"), CellValue::text("kept"));
    assert_eq!(value_at(&s, "I5"), CellValue::text("30% - DE (300)"));
    assert_eq!(fake.call_count(), 1);
    assert_eq!(fake.calls[0].dimensions.as_deref(), Some("ga:country"));
}

#[test]
fn index_past_the_cached_rows_stays_blank() {
    let mut s = dashboard();
    s.set(5, 8, CellValue::Int(9));
    let mut fake = FakeAnalytics::new(|q| Ok(answer(q)));

    let summary = run(&mut s, &mut fake, date(2024, 2, 10)).unwrap();

    assert_eq!(value_at(&s, "I4"), CellValue::text("60% - US (600)"));
    assert!(s.is_blank(5, 9));
    assert_eq!(summary.cells_written, 3);
}

#[test]
fn an_empty_result_leaves_every_index_row_blank() {
    let mut s = dashboard();
    let mut fake = FakeAnalytics::new(|q| match q.dimensions.as_deref() {
        Some("ga:country") => Ok(report(&[], &[("ga:sessions", "0")])),
        _ => Ok(answer(q)),
    });

    run(&mut s, &mut fake, date(2024, 2, 10)).unwrap();

    assert!(s.is_blank(4, 9));
    assert!(s.is_blank(5, 9));
    assert_eq!(value_at(&s, "I2"), CellValue::Int(1200));
}

#[test]
fn display_dimension_without_a_matching_row_stays_blank() {
    let mut s = dashboard();
    let mut fake = FakeAnalytics::new(|q| match q.dimensions.as_deref() {
        Some("ga:deviceCategory") => Ok(report(&[&["desktop", "700"]], &[("ga:sessions", "700")])),
        _ => Ok(answer(q)),
    });

    run(&mut s, &mut fake, date(2024, 2, 10)).unwrap();

    assert!(s.is_blank(6, 9));
    assert_eq!(value_at(&s, "I2"), CellValue::Int(1200));
}

#[test]
fn repeated_display_label_takes_the_last_row() {
    let mut s = dashboard();
    let mut fake = FakeAnalytics::new(|q| match q.dimensions.as_deref() {
        Some("ga:deviceCategory") => Ok(report(
            &[&["mobile", "500"], &["desktop", "700"], &["mobile", "450"]],
            &[("ga:sessions", "1650")],
        )),
        _ => Ok(answer(q)),
    });

    run(&mut s, &mut fake, date(2024, 2, 10)).unwrap();

    assert_eq!(value_at(&s, "I6"), CellValue::Int(450));
}

#[test]
fn whitespace_is_content_and_is_kept() {
    let mut s = dashboard();
    s.set(2, 9, CellValue::text(" "));
    s.take_changes();
    let mut fake = FakeAnalytics::new(|q| Ok(answer(q)));

    run(&mut s, &mut fake, date(2024, 2, 10)).unwrap();

    assert_eq!(value_at(&s, "I2"), CellValue::text(" "));
    assert!(!s.changes().contains_key(&(2, 9)));
}

#[test]
fn numeric_headers_are_not_periods() {
    let mut s = dashboard();
    s.set(1, 11, CellValue::Int(5));
    let mut fake = FakeAnalytics::unreachable();
    let err = run(&mut s, &mut fake, date(2024, 3, 1)).unwrap_err();
    assert!(matches!(err, ReconcileError::InvalidPeriod { ref cell, .. } if cell == "K1"));
}
