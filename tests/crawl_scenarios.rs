//! End-to-end crawl scenarios against the in-memory browser

use std::ops::ControlFlow;

use flanco_price_tracker::crawling::{
    CategorySummary, CrawlOrchestrator, CrawlSession, CrawlSettings, ErrorKind, RunSummary,
};
use flanco_price_tracker::domain::RunMode;
use flanco_price_tracker::infrastructure::CsvRecordSink;
use flanco_price_tracker::infrastructure::record_sink::RecordSink;
use flanco_price_tracker::test_utils::catalog::{
    self, ROOT, listing_page, menu_page, next_control, product_entry, product_page, product_url,
    prp_price_box, search_field, stale_price_entry, unpriced_entry,
};
use flanco_price_tracker::test_utils::{FakeBrowser, FakeNode, MemorySink, fast_config};
use flanco_price_tracker::infrastructure::config::flanco;

fn category(name: &str) -> String {
    format!("{ROOT}{name}.html")
}

fn orchestrator_with<S: RecordSink>(
    browser: &FakeBrowser,
    sink: S,
    max_entries: Option<usize>,
) -> CrawlOrchestrator<FakeBrowser, S> {
    let config = fast_config();
    let session = CrawlSession::new(sink.location(), max_entries, config.output.progress_log_interval);
    let settings = CrawlSettings::from_config(&config).unwrap();
    CrawlOrchestrator::new(browser.clone(), sink, session, settings)
}

fn orchestrator(
    browser: &FakeBrowser,
    max_entries: Option<usize>,
) -> CrawlOrchestrator<FakeBrowser, MemorySink> {
    orchestrator_with(browser, MemorySink::default(), max_entries)
}

async fn walk_category(
    orchestrator: &mut CrawlOrchestrator<FakeBrowser, MemorySink>,
    url: &str,
) -> CategorySummary {
    match orchestrator.crawl_category(url).await.unwrap() {
        ControlFlow::Continue(summary) => summary,
        ControlFlow::Break(stop) => panic!("unexpected stop: {stop}"),
    }
}

async fn run(
    orchestrator: &mut CrawlOrchestrator<FakeBrowser, MemorySink>,
    mode: RunMode,
) -> RunSummary {
    orchestrator.run(&mode).await.unwrap()
}

#[tokio::test]
async fn entry_without_price_is_skipped() {
    let url = category("frigidere");
    let browser = FakeBrowser::new().with_page(
        &url,
        listing_page(
            vec![
                product_entry("1", "1.299,99", "1.299,99"),
                unpriced_entry("2"),
                product_entry("3", "2.499,00", "1.999,00"),
            ],
            None,
        ),
    );
    let mut orchestrator = orchestrator(&browser, None);

    let summary = walk_category(&mut orchestrator, &url).await;

    assert_eq!(orchestrator.sink().product_ids(), vec!["1", "3"]);
    assert_eq!(summary.records_written, 2);
    assert_eq!(summary.entries_failed, 1);
    assert_eq!(summary.duplicates_skipped, 0);

    let third = &orchestrator.sink().records()[1];
    assert_eq!(third.original_price(), "2.499,00");
    assert_eq!(third.current_price(), "1.999,00");
    assert_eq!(third.source_url(), product_url("3"));
}

#[tokio::test]
async fn pages_are_walked_in_order_and_duplicates_counted() {
    let url = category("televizoare");
    let page_two = format!("{url}?p=2");
    let browser = FakeBrowser::new()
        .with_page(
            &url,
            listing_page(
                vec![product_entry("10", "100", "100"), product_entry("11", "200", "150")],
                Some(&page_two),
            ),
        )
        .with_page(
            &page_two,
            listing_page(
                vec![product_entry("12", "300", "300"), product_entry("10", "100", "100")],
                None,
            ),
        );
    let mut orchestrator = orchestrator(&browser, None);

    let summary = walk_category(&mut orchestrator, &url).await;

    assert_eq!(orchestrator.sink().product_ids(), vec!["10", "11", "12"]);
    assert_eq!(summary.pages_visited, 2);
    assert_eq!(summary.duplicates_skipped, 1);
    assert_eq!(browser.navigations(), vec![url, page_two]);
}

#[tokio::test]
async fn cap_writes_exactly_max_entries() {
    let url = category("laptopuri");
    let entries = (1..=5)
        .map(|id| product_entry(&id.to_string(), "10", "10"))
        .collect();
    let browser = FakeBrowser::new().with_page(&url, listing_page(entries, None));
    let mut orchestrator = orchestrator(&browser, Some(3));

    let summary = run(&mut orchestrator, RunMode::Category { url: url.clone() }).await;

    assert_eq!(orchestrator.sink().product_ids(), vec!["1", "2", "3"]);
    assert_eq!(summary.records_written, 3);
    let stop = summary.stopped.expect("cap should stop the run");
    assert_eq!(stop.cause().kind(), ErrorKind::LimitReached);
}

#[tokio::test]
async fn cap_ends_the_whole_catalog_walk() {
    let first = category("audio");
    let second = category("foto");
    let browser = FakeBrowser::new()
        .with_page(ROOT, menu_page(&[first.as_str(), second.as_str()]))
        .with_page(
            &first,
            listing_page(
                vec![
                    product_entry("1", "5", "5"),
                    product_entry("2", "5", "5"),
                    product_entry("3", "5", "5"),
                ],
                None,
            ),
        )
        .with_page(&second, listing_page(vec![product_entry("4", "5", "5")], None));
    let mut orchestrator = orchestrator(&browser, Some(2));

    let summary = run(&mut orchestrator, RunMode::Entire).await;

    assert_eq!(orchestrator.sink().product_ids(), vec!["1", "2"]);
    assert!(summary.stopped.is_some());
    assert!(!browser.navigations().contains(&second));
}

#[tokio::test]
async fn stale_entry_does_not_block_the_rest() {
    let url = category("telefoane");
    let browser = FakeBrowser::new().with_page(
        &url,
        listing_page(
            vec![
                product_entry("1", "10", "10"),
                product_entry("2", "20", "20").stale(),
                product_entry("3", "30", "30"),
                product_entry("4", "40", "40"),
            ],
            None,
        ),
    );
    let mut orchestrator = orchestrator(&browser, None);

    let summary = walk_category(&mut orchestrator, &url).await;

    assert_eq!(orchestrator.sink().product_ids(), vec!["1", "3", "4"]);
    assert_eq!(summary.entries_failed, 1);
}

#[tokio::test]
async fn price_going_stale_skips_only_that_product() {
    let url = category("televizoare");
    let second = format!("{url}?p=2");
    let browser = FakeBrowser::new()
        .with_page(
            &url,
            listing_page(
                vec![
                    product_entry("1", "10", "10"),
                    stale_price_entry("2"),
                    product_entry("3", "35", "30"),
                ],
                Some(&second),
            ),
        )
        .with_page(
            &second,
            listing_page(vec![product_entry("2", "20", "20"), product_entry("4", "40", "40")], None),
        );
    let mut orchestrator = orchestrator(&browser, None);

    let summary = walk_category(&mut orchestrator, &url).await;

    // the failed entry was never marked seen, so its relisting is recorded
    assert_eq!(orchestrator.sink().product_ids(), vec!["1", "3", "2", "4"]);
    assert_eq!(summary.entries_failed, 1);
    assert_eq!(summary.duplicates_skipped, 0);
}

#[tokio::test]
async fn entry_without_id_is_skipped() {
    let url = category("climatizare");
    let anonymous = FakeNode::new(flanco::PRODUCT_ENTRY)
        .child(catalog::price_box(flanco::PRICE_BOX, "10", "10"));
    let browser = FakeBrowser::new().with_page(
        &url,
        listing_page(vec![anonymous, product_entry("5", "50", "50")], None),
    );
    let mut orchestrator = orchestrator(&browser, None);

    let summary = walk_category(&mut orchestrator, &url).await;

    assert_eq!(orchestrator.sink().product_ids(), vec!["5"]);
    assert_eq!(summary.entries_failed, 1);
}

#[tokio::test]
async fn last_price_variant_is_used_as_fallback() {
    let url = category("gaming");
    let entry = FakeNode::new(flanco::PRODUCT_ENTRY)
        .child(
            FakeNode::new(format!("*[{}]", flanco::PRODUCT_ID_ATTRIBUTE))
                .attr(flanco::PRODUCT_ID_ATTRIBUTE, "77"),
        )
        .child(prp_price_box(flanco::PRICE_BOX, "3.199,99", "2.899,99"))
        .child(FakeNode::new(flanco::PRODUCT_LINK).attr("href", "/gaming/consola-77.html"));
    let browser = FakeBrowser::new().with_page(&url, listing_page(vec![entry], None));
    let mut orchestrator = orchestrator(&browser, None);

    walk_category(&mut orchestrator, &url).await;

    let record = &orchestrator.sink().records()[0];
    assert_eq!(record.original_price(), "3.199,99");
    assert_eq!(record.current_price(), "2.899,99");
    // relative links are resolved against the catalog root
    assert_eq!(record.source_url(), format!("{ROOT}gaming/consola-77.html"));
}

#[tokio::test]
async fn stale_next_control_ends_the_category() {
    let url = category("electrocasnice");
    let mut nodes = listing_page(vec![product_entry("1", "10", "10")], None);
    nodes.push(next_control(&format!("{url}?p=2")).stale());
    let browser = FakeBrowser::new()
        .with_page(&url, nodes)
        .with_page(format!("{url}?p=2"), listing_page(vec![product_entry("2", "10", "10")], None));
    let mut orchestrator = orchestrator(&browser, None);

    let summary = walk_category(&mut orchestrator, &url).await;

    assert_eq!(summary.pages_visited, 1);
    assert_eq!(orchestrator.sink().product_ids(), vec!["1"]);
}

#[tokio::test]
async fn empty_category_is_abandoned_and_walk_continues() {
    let empty = category("promotii");
    let full = category("ingrijire");
    let unreachable = category("offline");
    let browser = FakeBrowser::new()
        .with_page(ROOT, menu_page(&[empty.as_str(), unreachable.as_str(), full.as_str()]))
        .with_page(&empty, vec![FakeNode::new("div.message.info.empty")])
        .with_unreachable(&unreachable)
        .with_page(&full, listing_page(vec![product_entry("9", "90", "90")], None));
    let mut orchestrator = orchestrator(&browser, None);

    let summary = run(&mut orchestrator, RunMode::Entire).await;

    assert_eq!(orchestrator.sink().product_ids(), vec!["9"]);
    assert_eq!(summary.categories_visited, 3);
    assert_eq!(summary.pages_visited, 1);
    assert!(summary.stopped.is_none());
}

#[tokio::test]
async fn product_in_two_categories_is_recorded_once() {
    let first = category("frigidere");
    let second = category("oferte");
    let browser = FakeBrowser::new()
        .with_page(ROOT, menu_page(&[first.as_str(), second.as_str()]))
        .with_page(
            &first,
            listing_page(vec![product_entry("143800", "10", "10")], None),
        )
        .with_page(
            &second,
            listing_page(
                vec![product_entry("144043", "20", "20"), product_entry("143800", "10", "10")],
                None,
            ),
        );
    let mut orchestrator = orchestrator(&browser, None);

    let summary = run(&mut orchestrator, RunMode::Entire).await;

    assert_eq!(orchestrator.sink().product_ids(), vec!["143800", "144043"]);
    assert_eq!(summary.categories_visited, 2);
    assert_eq!(summary.duplicates_skipped, 1);
    assert_eq!(summary.records_written, 2);
}

#[tokio::test]
async fn missing_category_menu_aborts_the_run() {
    let browser = FakeBrowser::new().with_page(ROOT, vec![search_field()]);
    let mut orchestrator = orchestrator(&browser, None);

    let err = orchestrator.run(&RunMode::Entire).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timeout);

    let (sink, closed) = orchestrator.shutdown().await;
    assert!(closed.is_ok());
    assert!(sink.records().is_empty());
    assert!(browser.is_closed());
}

#[tokio::test]
async fn relative_category_url_is_joined_onto_the_root() {
    let url = category("tv-audio-video/televizoare");
    let browser = FakeBrowser::new()
        .with_page(&url, listing_page(vec![product_entry("1", "1", "1")], None));
    let mut orchestrator = orchestrator(&browser, None);

    run(
        &mut orchestrator,
        RunMode::Category {
            url: "/tv-audio-video/televizoare.html".to_string(),
        },
    )
    .await;

    assert_eq!(browser.navigations(), vec![url]);
    assert_eq!(orchestrator.sink().product_ids(), vec!["1"]);
}

#[tokio::test]
async fn list_mode_looks_products_up_through_search() {
    let not_listed = format!("{ROOT}catalogsearch/result/?q=999");
    let browser = FakeBrowser::new()
        .with_page(ROOT, menu_page(&[]))
        .with_page(product_url("147719"), product_page("1.499,99", "1.299,99"))
        .with_page(product_url("143800"), product_page("2.199,00", "2.199,00"))
        .with_page(&not_listed, vec![search_field()])
        .with_search_result("147719", product_url("147719"))
        .with_search_result("143800", product_url("143800"));
    let mut orchestrator = orchestrator(&browser, None);

    let summary = run(
        &mut orchestrator,
        RunMode::List {
            product_ids: vec!["147719".into(), "999".into(), "143800".into(), "147719".into()],
        },
    )
    .await;

    let records = orchestrator.sink().records();
    assert_eq!(orchestrator.sink().product_ids(), vec!["147719", "143800"]);
    assert_eq!(records[0].original_price(), "1.499,99");
    assert_eq!(records[0].current_price(), "1.299,99");
    assert_eq!(records[0].source_url(), product_url("147719"));
    assert_eq!(summary.entries_failed, 1);
    assert_eq!(summary.duplicates_skipped, 1);
}

#[tokio::test]
async fn test_mode_uses_builtin_products() {
    let mut browser = FakeBrowser::new().with_page(ROOT, menu_page(&[]));
    for id in ["147719", "143800", "144043"] {
        browser = browser
            .with_page(product_url(id), product_page("10", "10"))
            .with_search_result(id, product_url(id));
    }
    let mut orchestrator = orchestrator(&browser, Some(2));

    let summary = run(&mut orchestrator, RunMode::Test).await;

    assert_eq!(orchestrator.sink().product_ids(), vec!["147719", "143800"]);
    assert!(summary.stopped.is_some());
}

#[tokio::test]
async fn session_is_closed_after_a_successful_run() {
    let url = category("mici");
    let browser = FakeBrowser::new().with_page(&url, listing_page(vec![], None));
    let mut orchestrator = orchestrator(&browser, None);

    run(&mut orchestrator, RunMode::Category { url }).await;
    assert!(!browser.is_closed());

    orchestrator.shutdown().await.1.unwrap();
    assert!(browser.is_closed());
}

#[tokio::test]
async fn records_land_in_per_product_csv_files() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let url = category("aspiratoare");
    let browser = FakeBrowser::new().with_page(
        &url,
        listing_page(
            vec![product_entry("201", "899,99", "749,99"), product_entry("202", "99", "99")],
            None,
        ),
    );
    let sink = CsvRecordSink::create(temp_dir.path().join("flanco_csv")).unwrap();
    let mut orchestrator = orchestrator_with(&browser, sink, None);

    orchestrator
        .run(&RunMode::Category { url })
        .await
        .unwrap();

    let dir = temp_dir.path().join("flanco_csv");
    let row = std::fs::read_to_string(dir.join("product201.csv")).unwrap();
    let fields: Vec<_> = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_reader(row.as_bytes())
        .records()
        .next()
        .unwrap()
        .unwrap()
        .iter()
        .map(ToString::to_string)
        .collect();
    assert_eq!(fields[0], "201");
    assert_eq!(fields[2], "899,99");
    assert_eq!(fields[3], "749,99");
    assert_eq!(fields[4], product_url("201"));
    assert!(dir.join("product202.csv").exists());
}
