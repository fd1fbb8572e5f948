use afip_extractor::report::{write_error_marker, write_failed_csv, write_html};
use afip_extractor::roster::{convert_legacy_listing, load_roster, write_sample_roster};
use afip_extractor::{ErrorCategory, ExtractorError, OutcomeRecord, RunReport, TaxpayerRecord};

#[test]
fn legacy_listing_converts_into_a_loadable_roster() {
    let dir = tempfile::tempdir().unwrap();
    let txt = dir.path().join("clientes.txt");
    let csv = dir.path().join("clientes.csv");
    std::fs::write(
        &txt,
        "# Lista de clientes\n\
         ES IMPORTANTE DEJAR ESPACIO ENTRE CLIENTES\n\
         Juan Perez\n20111111112\nclave1\n\n\
         Maria Gomez\n27222222223\nclave2\n",
    )
    .unwrap();

    assert_eq!(convert_legacy_listing(&txt, &csv).unwrap(), 2);

    let roster = load_roster(&csv).unwrap();
    assert_eq!(roster.len(), 2);
    assert_eq!(roster.skipped, 0);
    assert_eq!(
        roster.find("27222222223"),
        Some(&TaxpayerRecord::new("Maria Gomez", "27222222223", "clave2"))
    );
}

#[test]
fn sample_roster_round_trips_through_the_loader() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("ejemplo.csv");
    write_sample_roster(&path).unwrap();

    let roster = load_roster(&path).unwrap();
    assert_eq!(roster.len(), 2);
    assert_eq!(roster.records[0].credential, "contraseña123");
}

#[test]
fn missing_roster_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        load_roster(dir.path().join("nope.csv")),
        Err(ExtractorError::Io(_))
    ));
}

#[test]
fn run_artifacts_are_written_for_failures_only() {
    let dir = tempfile::tempdir().unwrap();
    let roster_path = dir.path().join("roster.csv");
    std::fs::write(
        &roster_path,
        "name,tax_id,credential\n\
         Acme,20111111112,a\n\
         Beta,20222222223,b\n\
         Gamma,20333333334,c\n",
    )
    .unwrap();
    let roster = load_roster(&roster_path).unwrap();

    let mut report = RunReport::new("2023");
    report.push(OutcomeRecord::success(&roster.records[0], "2023"));
    report.push(OutcomeRecord::failure(
        &roster.records[1],
        "2023",
        &ExtractorError::ProcessingTimeout(std::time::Duration::from_secs(1200)),
    ));
    report.push(OutcomeRecord::failure(
        &roster.records[2],
        "2023",
        &ExtractorError::login(ErrorCategory::InvalidId, "Usuario inexistente"),
    ));
    report.finish();

    assert_eq!(report.processed(), 3);
    assert_eq!(report.succeeded(), 1);
    assert_eq!(report.failed(), 2);

    let failed = dir.path().join("fallidos.csv");
    assert_eq!(write_failed_csv(&failed, &report, &roster).unwrap(), 2);
    let rerun = load_roster(&failed).unwrap();
    let ids: Vec<&str> = rerun.records.iter().map(|r| r.tax_id.as_str()).collect();
    // most fixable first
    assert_eq!(ids, vec!["20333333334", "20222222223"]);

    let html = dir.path().join("reporte.html");
    write_html(&html, &report).unwrap();
    let body = std::fs::read_to_string(&html).unwrap();
    assert!(body.contains("Gamma"));
    assert!(body.contains("Failed: 2"));

    let marker_dir = dir.path().join("Acme");
    assert_eq!(
        write_error_marker(&marker_dir, &report.outcomes[0]).unwrap(),
        None
    );
    let marker = write_error_marker(&marker_dir, &report.outcomes[2])
        .unwrap()
        .unwrap();
    assert_eq!(
        marker.file_name().and_then(|n| n.to_str()),
        Some("error_invalid-id.txt")
    );
}
