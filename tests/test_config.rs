use log_bootstrap::{
    LoggingConfig, Severity,
    config::file::{HandlerConfig, HandlerKind, LoggerConfig},
};
use std::io::Write;
use tempfile::NamedTempFile;

#[test]
fn builder_matches_parsed_config() {
    let built = LoggingConfig::new()
        .set_root(Some(Severity::INFO), &["console"])
        .set_handler("console", HandlerConfig::console())
        .set_logger(
            "main",
            LoggerConfig::default()
                .set_level(Severity::DEBUG)
                .set_handlers(&["console"]),
        );

    let parsed = LoggingConfig::from_toml_str(
        r#"
        [root]
        level = 20
        handlers = ["console"]

        [handlers.console]

        [loggers.main]
        level = 10
        handlers = ["console"]
    "#,
    )
    .unwrap();

    assert_eq!(built, parsed);
    assert_eq!(parsed.handlers["console"].kind, HandlerKind::Console);
}

#[test]
fn bundled_default_config_is_valid() {
    let bundle = log_bootstrap::config::source::Bundle::builtin();
    let cfg = LoggingConfig::from_toml_str(bundle.get("logging.toml").unwrap()).unwrap();
    let validated = cfg.validate().unwrap();
    assert_eq!(validated.root_level, Severity::INFO);
    assert!(validated.loggers.contains_key("main"));
}

#[test]
fn from_file_round_trips_through_disk() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(
        br#"
        [handlers.file]
        kind = "file"
        filename = "logs/nested/app.log"
        rotation = "hourly"
    "#,
    )
    .unwrap();

    let cfg = LoggingConfig::from_file(file.path()).unwrap();
    let files: Vec<_> = cfg.handler_filenames().map(|(n, _)| n.to_string()).collect();
    assert_eq!(files, vec!["file".to_string()]);
}

#[cfg(feature = "json")]
#[test]
fn json_config_selected_by_extension() {
    let cfg = LoggingConfig::parse(
        "logging.json",
        r#"{"root": {"level": "DEBUG", "handlers": ["console"]}, "handlers": {"console": {}}}"#,
    )
    .unwrap();
    assert_eq!(cfg.validate().unwrap().root_level, Severity::DEBUG);
}
