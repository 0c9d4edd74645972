use best_data_review::core::solar_modeling::solar_position::SpaEphemeris;
use best_data_review::core::solar_modeling::tracking::SingleAxisTracker;
use best_data_review::core::solar_modeling::transposition::PerezTransposition;
use best_data_review::input::ProjectConfig;
use best_data_review::output::{FileOutput, SinkOutput};
use best_data_review::timeseries::{long_variables, Timeseries};
use best_data_review::{run_review, Pipeline, ReviewRequest};
use chrono::DateTime;
use pretty_assertions::assert_eq;
use rstest::*;
use serde_json::json;
use std::fs;

#[fixture]
fn config() -> String {
    json!({
        "site": {"latitude": 39.742, "longitude": -105.18, "elevation": 1828.8},
        "systems": [{"site": "BEST", "row": "row7", "max_tilt": 52.0, "gcr": 0.33}],
        "augmentation": {
            "sensor": {"geometry": {"height": 1.5, "offset": 1.0}}
        }
    })
    .to_string()
}

/// One-minute telemetry from 11:55 to 12:04 local, written the way pandas writes it.
#[fixture]
fn data() -> String {
    let mut csv = String::from(
        "timestamp,albedo,SRRL_albedo,row7tracker_angle,SRRL_GHI,SRRL_DHI,SRRL_DNI,\
GlobGnd,GlobHor,DifHor,Alb_Inc,BkVFLss,BmIncBk,GlobBak\n",
    );
    for minute in 55..65 {
        let (hour, minute) = (11 + minute / 60, minute % 60);
        csv.push_str(&format!(
            "2021-06-21 {hour:02}:{minute:02}:00-07:00,0.21,0.2,1.5,1010,95,930,1005,1010,95,2,35,0,{}\n",
            if minute == 0 { "" } else { "140" }
        ));
    }
    csv
}

#[rstest]
fn should_run_review_end_to_end(data: String, config: String) {
    let request = ReviewRequest {
        start: Some(DateTime::parse_from_rfc3339("2021-06-21T11:58:00-07:00").unwrap()),
        end: None,
        variables: None,
    };
    let result = run_review(data.as_bytes(), config.as_bytes(), SinkOutput, &request).unwrap();

    assert_eq!(result.wide.len(), 7);

    // near solar noon the modelled tracker lies almost flat
    for theta in result.wide.column("modeled_row7tracker_theta").unwrap() {
        assert!(theta.abs() < 5., "tracker rotation {theta} too large at noon");
    }
    for zenith in result.wide.column("solar_apparent_zenith").unwrap() {
        assert!((15. ..18.).contains(zenith));
    }

    // a missing back irradiance is never flagged
    let odd = result.wide.column("odd").unwrap();
    let glob_bak = result.wide.column("GlobBak").unwrap();
    for (odd, glob_bak) in odd.iter().zip(glob_bak) {
        if glob_bak.is_nan() {
            assert_eq!(*odd, 0.);
        }
    }

    let variables = long_variables(&result.long);
    assert_eq!(variables.len(), result.wide.column_names().count());
    assert_eq!(variables[0], "albedo");
}

#[rstest]
fn should_write_wide_and_long_files(data: String, config: String) {
    let directory = std::env::temp_dir().join(format!("best-data-review-{}", std::process::id()));
    fs::create_dir_all(&directory).unwrap();
    let output = FileOutput::new(directory.clone(), "june_{}.csv".into());
    let request = ReviewRequest {
        variables: Some(vec!["W".into(), "modeled_Gfront_row7pos".into()]),
        ..ReviewRequest::default()
    };

    run_review(data.as_bytes(), config.as_bytes(), &output, &request).unwrap();

    let wide = Timeseries::read_csv(fs::read(directory.join("june_augmented.csv")).unwrap().as_slice())
        .unwrap();
    assert_eq!(
        wide.column_names().collect::<Vec<_>>(),
        ["W", "modeled_Gfront_row7pos"]
    );
    assert_eq!(wide.len(), 10);

    let long = fs::read_to_string(directory.join("june_long.csv")).unwrap();
    assert!(long.starts_with("timestamp,variable,value\n2021-06-21T11:55:00-07:00,W,"));
    assert_eq!(long.lines().count(), 1 + 2 * 10);

    fs::remove_dir_all(&directory).unwrap();
}

#[rstest]
fn should_accept_custom_models(data: String, config: String) {
    let project = ProjectConfig::from_json(config.as_bytes()).unwrap();
    let pipeline = Pipeline::with_models(
        project.site.clone(),
        project.system_table(),
        project.augmentation.clone(),
        SpaEphemeris::new(69., 25., Default::default()),
        SingleAxisTracker,
        PerezTransposition,
    );
    let table = Timeseries::read_csv(data.as_bytes()).unwrap();

    let output = pipeline.run(table, &ReviewRequest::default()).unwrap();

    assert_eq!(output.wide.len(), 10);
    assert!(output.wide.has_column("E_rear_calc"));
}

#[rstest]
fn should_reject_config_without_systems(data: String) {
    let config = json!({
        "site": {"latitude": 39.742, "longitude": -105.18, "elevation": 1828.8},
        "systems": []
    })
    .to_string();

    let error = run_review(data.as_bytes(), config.as_bytes(), SinkOutput, &ReviewRequest::default())
        .unwrap_err();
    assert!(error.to_string().contains("row7"));
}
