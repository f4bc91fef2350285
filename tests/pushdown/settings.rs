use aggpush::{Error, NoScripts, PushdownSettings, optimize_with_settings};

use crate::common::{GroupingSets, events_catalog};

#[test]
fn test_settings_from_toml() {
    let settings = PushdownSettings::from_toml(
        r#"
        push_grouping_sets = false
        timezone = "Europe/Berlin"
        "#,
    )
    .unwrap();

    assert!(!settings.push_grouping_sets);
    assert!(settings.script_fallback);
    assert_eq!(settings.timezone, "Europe/Berlin");
}

#[test]
fn test_unknown_timezone_is_rejected() {
    let result = PushdownSettings::from_toml(r#"timezone = "Mars/Olympus""#);
    assert!(matches!(result, Err(Error::InvalidConfig(_))));

    let plan = GroupingSets::new(&["city"], &[], &[vec!["city"], vec![]]).aggregate(vec![]);
    let settings = PushdownSettings {
        timezone: "Mars/Olympus".to_string(),
        ..PushdownSettings::default()
    };
    let result = optimize_with_settings(&plan, &events_catalog(), &NoScripts, &settings);
    assert!(matches!(result, Err(Error::InvalidConfig(_))));
}

#[test]
fn test_disabled_settings_leave_grouping_sets_to_host() {
    let plan = GroupingSets::new(&["city"], &[], &[vec!["city"], vec![]]).aggregate(vec![]);

    let optimized =
        optimize_with_settings(&plan, &events_catalog(), &NoScripts, &PushdownSettings::all_disabled())
            .unwrap();
    assert!(optimized.pushed_aggregates().is_empty());

    let optimized =
        optimize_with_settings(&plan, &events_catalog(), &NoScripts, &PushdownSettings::all_enabled())
            .unwrap();
    assert_eq!(optimized.pushed_aggregates().len(), 1);
}
