// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

#![allow(clippy::unwrap_used)]

use std::fs;
use std::path::Path;

use dd_metric_functions::catalog::builtin;
use dd_metric_functions::config::load_config;
use dd_metric_functions::{
    Category, Error, FunctionInstance, ParamValue, PipelineTarget, Point, Series, apply_functions,
    consolidate, run_targets,
};

fn func(name: &str, params: Vec<ParamValue>) -> FunctionInstance {
    FunctionInstance::from_catalog(builtin(), name, Some(params)).unwrap()
}

fn series(label: &str, points: &[(Option<f64>, i64)]) -> Series {
    Series::new(
        label,
        points.iter().map(|(v, ts)| Point { value: *v, timestamp: *ts }).collect(),
    )
}

#[test]
fn test_scale_then_sum_two_series() {
    let sum = func("sum", vec!["1m".into()]);
    let label = sum.text();
    let target = PipelineTarget::new("cpu", vec![func("scale", vec![2.into()]), sum]);

    let input = vec![
        series("cpu", &[(Some(1.0), 0), (Some(2.0), 60_000)]),
        series("cpu", &[(Some(3.0), 0), (Some(4.0), 60_000)]),
    ];
    let out = apply_functions(input, &target).unwrap();

    assert_eq!(
        out,
        vec![series(&label, &[(Some(8.0), 0), (Some(12.0), 60_000)])]
    );
    assert_eq!(label, "sum(1m)");
}

#[test]
fn test_lookup_unknown_and_category_listing() {
    let catalog = builtin();
    assert!(matches!(
        catalog.lookup("averageXYZ"),
        Err(Error::MethodNotFound(name)) if name == "averageXYZ"
    ));
    assert!(
        catalog
            .category(Category::Aggregate)
            .iter()
            .any(|def| def.name == "average")
    );
}

#[test]
fn test_group_by_fills_gaps_with_nulls() {
    let target = PipelineTarget::new("m", vec![func("groupBy", vec!["1m".into(), "max".into()])]);
    let input = vec![series(
        "m",
        &[(Some(5.0), 180_000), (Some(1.0), 10_000), (Some(3.0), 20_000)],
    )];
    let out = apply_functions(input, &target).unwrap();
    assert_eq!(
        out[0].points,
        vec![
            Point::new(3.0, 0),
            Point::null(60_000),
            Point::null(120_000),
            Point::new(5.0, 180_000),
        ]
    );
}

#[test]
fn test_range_grouping_emits_two_points() {
    let target = PipelineTarget::new(
        "m",
        vec![func("groupBy", vec!["range_series".into(), "avg".into()])],
    );
    let input = vec![series(
        "m",
        &[(Some(1.0), 1000), (Some(2.0), 5000), (Some(6.0), 9000)],
    )];
    let out = apply_functions(input, &target).unwrap();
    assert_eq!(out[0].points, vec![Point::new(3.0, 1000), Point::new(3.0, 9000)]);
}

#[test]
fn test_transform_chain_and_alias() {
    let target = PipelineTarget::new(
        "SR:beam:current",
        vec![
            func("replaceAlias", vec!["/SR:beam:(.*)/".into(), "$1".into()]),
            func("transformNull", vec![0.into()]),
            func("offset", vec![(-1).into()]),
            func("removeBelowValue", vec![0.into()]),
        ],
    );
    let input = vec![series(
        "SR:beam:current",
        &[(Some(3.0), 0), (None, 1000), (Some(0.5), 2000)],
    )];
    let out = apply_functions(input, &target).unwrap();
    assert_eq!(
        out,
        vec![series(
            "current",
            &[(Some(2.0), 0), (None, 1000), (None, 2000)]
        )]
    );
}

#[test]
fn test_sum_series_interpolates_gaps() {
    let target = PipelineTarget::new("m", vec![func("sumSeries", vec![])]);
    let input = vec![
        series("a", &[(Some(0.0), 0), (Some(10.0), 2000)]),
        series("b", &[(Some(1.0), 1000)]),
    ];
    let out = apply_functions(input, &target).unwrap();
    assert_eq!(
        out,
        vec![series(
            "sumSeries()",
            &[(Some(0.0), 0), (Some(6.0), 1000), (Some(10.0), 2000)]
        )]
    );
}

#[test]
fn test_bottom_then_sort_desc() {
    let target = PipelineTarget::new(
        "m*",
        vec![
            func("bottom", vec![2.into(), "max".into()]),
            func("sortSeries", vec!["desc".into()]),
        ],
    );
    let input = vec![
        series("m1", &[(Some(9.0), 0)]),
        series("m2", &[(Some(1.0), 0)]),
        series("m3", &[(Some(4.0), 0)]),
    ];
    let out = apply_functions(input, &target).unwrap();
    let labels: Vec<&str> = out.iter().map(|s| s.label.as_str()).collect();
    assert_eq!(labels, vec!["m3", "m2"]);
}

#[test]
fn test_time_shift_with_aggregate() {
    let target = PipelineTarget::new(
        "m",
        vec![
            func("timeShift", vec!["+1h".into()]),
            func("sum", vec!["1h".into()]),
        ],
    );
    let input = vec![series("m", &[(Some(1.0), 7_200_000), (Some(2.0), 7_300_000)])];
    let out = apply_functions(input, &target).unwrap();
    assert_eq!(out, vec![series("sum(1h)", &[(Some(3.0), 3_600_000)])]);
}

#[test]
fn test_config_driven_run() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pipeline.yaml");
    fs::write(
        &path,
        r#"
settings:
  max_data_points: 2
  consolidation_interval: 2s
targets:
  - metric: temp
    ref_id: A
    functions:
      - name: consolidateBy
        params: [max]
      - name: scale
        params: ["10"]
  - metric: temp
    ref_id: B
    functions:
      - name: movingAverage
        params: [0]
"#,
    )
    .unwrap();
    let config = load_config(&path).unwrap();
    let input = series(
        "temp",
        &[(Some(1.0), 1000), (Some(2.0), 2000), (Some(3.0), 3000), (Some(4.0), 4000)],
    );

    let jobs = config
        .targets
        .iter()
        .map(|t| (t.build(builtin()).unwrap(), vec![input.clone()]))
        .collect::<Vec<_>>();
    let aggregator = jobs[0].0.consolidation().unwrap();
    let mut results = run_targets(jobs).into_iter();

    let first = results.next().unwrap().unwrap();
    let interval = config.settings.consolidation_interval().unwrap();
    let consolidated = consolidate(
        first,
        config.settings.max_data_points.unwrap(),
        interval,
        aggregator,
    );
    assert_eq!(
        consolidated[0].points,
        vec![Point::new(20.0, 2000), Point::new(40.0, 4000)]
    );

    assert!(matches!(
        results.next().unwrap(),
        Err(Error::InvalidParameter { .. })
    ));
}

#[test]
fn test_render_and_parse_agree() {
    let catalog = builtin();
    for def in catalog.categories().values().flatten() {
        let instance = FunctionInstance::new(def.clone());
        let rendered = instance.render(None);
        let parsed = FunctionInstance::parse(catalog, &rendered).unwrap();
        assert_eq!(parsed.render(None), rendered, "{}", def.name);
        assert_eq!(
            parsed.bind().map(|b| b.phase()),
            instance.bind().map(|b| b.phase()),
            "{}",
            def.name
        );
    }
}

#[test]
fn test_sample_pipeline() {
    let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("testdata");
    let config = load_config(&dir.join("pipeline.yaml")).unwrap();
    let input: Vec<Series> =
        serde_json::from_str(&fs::read_to_string(dir.join("series.json")).unwrap()).unwrap();

    let mut labels = Vec::new();
    for target_config in config.targets.iter().filter(|t| !t.hide) {
        let target = target_config.build(builtin()).unwrap();
        let selected = input
            .iter()
            .filter(|s| target.selects(&s.label))
            .cloned()
            .collect();
        let out = apply_functions(selected, &target).unwrap();
        labels.extend(out.into_iter().map(|s| s.label));
    }
    assert_eq!(labels, vec!["current", "rf total (kW)"]);
}
