use chrono::NaiveDate;
use dashsync_common::CellValue;
use dashsync_engine::sheets::campaigns;
use dashsync_engine::{AnalyticsQuery, AnalyticsReport, Providers, ReconcileError, SheetPass, SheetSummary};
use dashsync_io::Sheet;
use dashsync_testkit::{
    FakeAnalytics, FakeEmail, FakeShortener, date, report, sheet, value_at, website,
};
use serde_json::json;

fn campaigns_sheet() -> Sheet {
    sheet(
        "campaigns",
        &[
            &["bitly", "total_clicks", "target_url"],
            &["mailchimp", "settings/subject_line", "report/opens/open_rate", "emails_sent", "a/b tested"],
            &[
                "analytics",
                "ga:pageViews (7d)",
                "ga:bounceRate (7d)",
                "ga:avgTimeOnPage (at)",
                "Top Source (7d)",
                "Source Unique Page Views (7d)",
            ],
            &[],
            &[],
            &["2024-01-01", "Winter launch", "14"],
            &["bitly|https://bit.ly/abc"],
            &["mailchimp|c123"],
            &["analytics|https://example.org/blog/post/"],
        ],
    )
}

fn page_answer(query: &AnalyticsQuery) -> AnalyticsReport {
    if query.dimensions.as_deref() == Some("ga:sourceMedium") {
        return report(
            &[
                &["google / organic", "20", "18", "12"],
                &["(direct) / (none)", "30", "25", "20"],
            ],
            &[("ga:uniquePageviews", "43")],
        );
    }
    report(
        &[],
        &[
            ("ga:visits", "120"),
            ("ga:pageviews", "250"),
            ("ga:uniquePageviews", "200"),
            ("ga:newUsers", "80"),
            ("ga:bounceRate", "40"),
            ("ga:avgTimeOnPage", "93.52"),
            ("ga:entrances", "110"),
        ],
    )
}

fn email() -> FakeEmail {
    FakeEmail::new()
        .with_campaign(
            "c123",
            json!({
                "id": "c123",
                "emails_sent": 1000,
                "settings": {"subject_line": "Hello winter"},
                "variate_settings": {"winner_criteria": "opens"},
            }),
        )
        .with_report("c123", json!({"id": "c123", "opens": {"open_rate": 0.25}}))
}

struct Fakes {
    analytics: FakeAnalytics,
    links: FakeShortener,
    email: FakeEmail,
}

impl Fakes {
    fn new() -> Self {
        Self {
            analytics: FakeAnalytics::new(|q| Ok(page_answer(q))),
            links: FakeShortener::new().with_link("https://bit.ly/abc", "https://example.org/launch/", 42),
            email: email(),
        }
    }

    fn run(&mut self, sheet: &mut Sheet, today: NaiveDate) -> Result<SheetSummary, ReconcileError> {
        let mut providers = Providers::new()
            .with_analytics(&mut self.analytics)
            .with_links(&mut self.links)
            .with_email(&mut self.email);
        let mut pass = SheetPass::new(sheet, &mut providers, today);
        campaigns::reconcile(&mut pass, &website("example.org"))?;
        Ok(pass.into_summary())
    }
}

#[test]
fn rows_are_filled_by_their_type() {
    let mut s = campaigns_sheet();
    let mut fakes = Fakes::new();

    let summary = fakes.run(&mut s, date(2024, 1, 5)).unwrap();

    assert_eq!(value_at(&s, "B7"), CellValue::Int(42));
    assert_eq!(value_at(&s, "C7"), CellValue::text("https://example.org/launch/"));

    assert_eq!(value_at(&s, "B8"), CellValue::text("Hello winter"));
    assert_eq!(value_at(&s, "C8"), CellValue::Number(0.25));
    assert_eq!(value_at(&s, "D8"), CellValue::Int(1000));
    assert_eq!(value_at(&s, "E8"), CellValue::Boolean(true));

    // only the running total is due five days into a seven day window
    assert_eq!(value_at(&s, "D9"), CellValue::text("1:33"));
    for col in [2, 3, 5, 6] {
        assert!(s.is_blank(9, col));
    }
    assert_eq!(summary.cells_deferred, 4);

    // the campaign document is fetched once for two campaign columns
    assert_eq!(fakes.email.calls, vec!["campaign:c123", "report:c123"]);
    assert_eq!(fakes.analytics.call_count(), 1);
    let at = &fakes.analytics.calls[0];
    assert_eq!(at.filters.as_deref(), Some("ga:pagePath==/blog/post/"));
    assert_eq!(at.window.start, date(2024, 1, 1));
    assert_eq!(at.window.end, date(2024, 1, 5));
}

#[test]
fn window_columns_fill_after_the_window_closes() {
    let mut s = campaigns_sheet();
    let mut fakes = Fakes::new();
    fakes.run(&mut s, date(2024, 1, 5)).unwrap();
    s.take_changes();

    let summary = fakes.run(&mut s, date(2024, 1, 20)).unwrap();

    assert_eq!(value_at(&s, "B9"), CellValue::Int(250));
    assert_eq!(value_at(&s, "C9"), CellValue::Number(0.4));
    assert_eq!(value_at(&s, "E9"), CellValue::text("(direct) / (none): 20"));
    assert_eq!(value_at(&s, "F9"), CellValue::Int(43));
    assert_eq!(summary.cells_deferred, 0);

    // 7d totals, 7d referrals and the refreshed running window
    assert_eq!(fakes.analytics.call_count(), 4);
    let windows: Vec<_> = fakes.analytics.calls[1..].iter().map(|q| q.window.end).collect();
    assert!(windows.contains(&date(2024, 1, 8)));
    assert!(windows.contains(&date(2024, 1, 20)));

    // mailchimp cells were already written; nothing new is fetched
    assert_eq!(fakes.email.call_count(), 2);
    // the running total did not change, so it is not rewritten
    assert!(!s.changes().contains_key(&(9, 4)));
}

#[test]
fn live_link_columns_follow_the_provider() {
    let mut s = campaigns_sheet();
    s.set(7, 2, CellValue::Int(10));
    let mut fakes = Fakes::new();

    fakes.run(&mut s, date(2024, 1, 5)).unwrap();

    assert_eq!(value_at(&s, "B7"), CellValue::Int(42));
    assert_eq!(fakes.links.calls, 2);
}

#[test]
fn missing_paths_read_as_a_dash() {
    let mut s = sheet(
        "campaigns",
        &[
            &["mailchimp", "settings/preview_text", "report/clicks", "a/b tested"],
            &[],
            &[],
            &[],
            &[],
            &["mailchimp|c9"],
        ],
    );
    let mut fakes = Fakes::new();
    fakes.email = FakeEmail::new()
        .with_campaign("c9", json!({"id": "c9", "settings": {"preview_text": null}}))
        .with_report("c9", json!({"id": "c9"}));

    fakes.run(&mut s, date(2024, 1, 5)).unwrap();

    assert_eq!(value_at(&s, "B6"), CellValue::text("-"));
    assert_eq!(value_at(&s, "C6"), CellValue::text("-"));
    assert_eq!(value_at(&s, "D6"), CellValue::Boolean(false));
}

#[test]
fn a_foreign_campaign_document_is_refused() {
    let mut s = campaigns_sheet();
    let mut fakes = Fakes::new();
    fakes.email = FakeEmail::new().with_campaign("c123", json!({"id": "c999"}));

    let err = fakes.run(&mut s, date(2024, 1, 5)).unwrap_err();

    match err {
        ReconcileError::CampaignMismatch { requested, found, .. } => {
            assert_eq!(requested, "c123");
            assert_eq!(found, "c999");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn row_structure_errors() {
    let mut orphan = sheet(
        "campaigns",
        &[
            &["analytics", "ga:pageViews (7d)"],
            &[],
            &[],
            &[],
            &[],
            &["analytics|https://example.org/"],
        ],
    );
    let err = Fakes::new().run(&mut orphan, date(2024, 1, 5)).unwrap_err();
    assert!(matches!(err, ReconcileError::MissingCampaignContext { ref cell, .. } if cell == "A6"));

    let mut unknown = campaigns_sheet();
    unknown.set(10, 1, CellValue::text("twitter|@acme"));
    let err = Fakes::new().run(&mut unknown, date(2024, 1, 5)).unwrap_err();
    assert!(matches!(err, ReconcileError::UnrecognizedRow { ref cell, .. } if cell == "A10"));

    let mut headless = sheet("campaigns", &[&["bitly", "total_clicks"], &[], &[], &[], &[], &["mailchimp|c1"]]);
    let err = Fakes::new().run(&mut headless, date(2024, 1, 5)).unwrap_err();
    assert!(matches!(err, ReconcileError::MissingHeaderRow { ref kind, .. } if kind == "mailchimp"));
}

#[test]
fn unknown_header_label_names_its_cell() {
    let mut s = campaigns_sheet();
    s.set(1, 4, CellValue::text("clicks_per_day"));
    let err = Fakes::new().run(&mut s, date(2024, 1, 5)).unwrap_err();
    match err {
        ReconcileError::UnknownColumn { cell, label, .. } => {
            assert_eq!(cell, "D1");
            assert_eq!(label, "clicks_per_day");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn three_segment_paths_are_rejected_at_bind_time() {
    let mut s = campaigns_sheet();
    s.set(2, 6, CellValue::text("settings/tracking/opens"));
    let err = Fakes::new().run(&mut s, date(2024, 1, 5)).unwrap_err();
    assert!(matches!(err, ReconcileError::PathTooDeep { ref cell, .. } if cell == "F2"));
}

fn sources_sheet() -> Sheet {
    sheet(
        "campaigns",
        &[
            &["analytics", "Top Source (7d)", "Second Source (7d)"],
            &[],
            &[],
            &[],
            &[],
            &["2024-01-01", "Winter launch", "7"],
            &["analytics|https://example.org/blog/post/"],
        ],
    )
}

#[test]
fn missing_referral_rows_read_as_not_found() {
    let mut one = sources_sheet();
    let mut fakes = Fakes::new();
    fakes.analytics = FakeAnalytics::fixed(report(
        &[&["google / organic", "20", "18", "12"]],
        &[("ga:uniquePageviews", "18")],
    ));
    fakes.run(&mut one, date(2024, 1, 20)).unwrap();
    assert_eq!(value_at(&one, "B7"), CellValue::text("google / organic: 12"));
    assert_eq!(value_at(&one, "C7"), CellValue::text("Not Found"));

    let mut none = sources_sheet();
    let mut fakes = Fakes::new();
    fakes.analytics = FakeAnalytics::fixed(report(&[], &[]));
    fakes.run(&mut none, date(2024, 1, 20)).unwrap();
    assert_eq!(value_at(&none, "B7"), CellValue::text("Not Found"));
    assert_eq!(value_at(&none, "C7"), CellValue::text("Not Found"));
    assert_eq!(fakes.analytics.call_count(), 1);
}

#[test]
fn a_numeric_first_cell_is_not_a_date_row() {
    let mut s = campaigns_sheet();
    s.set(10, 1, CellValue::Int(12));
    let err = Fakes::new().run(&mut s, date(2024, 1, 5)).unwrap_err();
    assert!(matches!(err, ReconcileError::UnrecognizedRow { ref cell, .. } if cell == "A10"));
}
