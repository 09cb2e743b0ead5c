use super::*;

#[test]
fn defaults_match_documented_values() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.server.addr.port(), DEFAULT_PORT);
    assert_eq!(settings.server.environment, DeployEnvironment::Development);
    assert!(!settings.server.trust_proxy);
    assert_eq!(settings.browser.max_parallel_contexts.get(), 2);
    assert_eq!(
        settings.render.registry_path,
        PathBuf::from("./render-config.json")
    );
    assert_eq!(settings.render.ready_selector, "#ready");
    assert_eq!(settings.render.network_idle, NetworkIdle::default());
    assert_eq!(settings.render.timeout, Some(Duration::from_secs(60)));
    assert_eq!(settings.cors.origins, AllowedOrigins::Any);
    assert!(!settings.rate_limit.enabled);
}

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.server.port = Some(4000);
    raw.logging.level = Some("info".to_string());
    raw.render.registry_path = Some(PathBuf::from("/etc/pressroom/file.json"));

    let overrides = ServeOverrides {
        server_port: Some(4321),
        log_level: Some("debug".to_string()),
        registry: RegistryOverride {
            registry_path: Some(PathBuf::from("/tmp/renderers.json")),
        },
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.server.addr.port(), 4321);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
    assert_eq!(
        settings.render.registry_path,
        PathBuf::from("/tmp/renderers.json")
    );
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    let overrides = ServeOverrides {
        log_json: Some(true),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn zero_parallel_contexts_is_rejected() {
    let mut raw = RawSettings::default();
    raw.browser.max_parallel_contexts = Some(0);

    let err = Settings::from_raw(raw).expect_err("invalid");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "browser.max_parallel_contexts",
            ..
        }
    ));
}

#[test]
fn zero_render_timeout_disables_the_deadline() {
    let mut raw = RawSettings::default();
    raw.render.timeout_seconds = Some(0);

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.render.timeout, None);
}

#[test]
fn unknown_environment_is_rejected() {
    let mut raw = RawSettings::default();
    raw.server.environment = Some("staging".to_string());

    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn cors_origins_are_split_and_normalised() {
    let mut raw = RawSettings::default();
    raw.cors.origins = Some("https://app.example.com/, http://localhost:5173".to_string());

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(
        settings.cors.origins,
        AllowedOrigins::List(vec![
            "https://app.example.com".to_string(),
            "http://localhost:5173".to_string(),
        ])
    );
}

#[test]
fn wildcard_anywhere_allows_any_origin() {
    let mut raw = RawSettings::default();
    raw.cors.origins = Some("https://app.example.com,*".to_string());

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.cors.origins, AllowedOrigins::Any);
}

#[test]
fn render_settings_convert_into_pipeline_config() {
    let mut raw = RawSettings::default();
    raw.render.network_idle_ms = Some(750);
    raw.render.network_idle_max_inflight = Some(0);

    let settings = Settings::from_raw(raw).expect("valid settings");
    let config = RenderConfig::from(&settings.render);

    assert_eq!(config.network_idle.window, Duration::from_millis(750));
    assert_eq!(config.network_idle.max_inflight, 0);
    assert_eq!(config.ready_poll_interval, Duration::from_millis(100));
}

#[test]
fn default_to_serve_command() {
    let args = CliArgs::parse_from(["pressroom"]);
    let command = args
        .command
        .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
    assert!(matches!(command, Command::Serve(_)));
}

#[test]
fn parse_serve_overrides() {
    let args = CliArgs::parse_from([
        "pressroom",
        "serve",
        "--server-host",
        "0.0.0.0",
        "--max-parallel-contexts",
        "4",
        "--rate-limit",
        "true",
    ]);

    match args.command.expect("serve command") {
        Command::Serve(serve) => {
            assert_eq!(serve.overrides.server_host.as_deref(), Some("0.0.0.0"));
            assert_eq!(serve.overrides.max_parallel_contexts, Some(4));
            assert_eq!(serve.overrides.rate_limit, Some(true));
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_renderers_arguments() {
    let args = CliArgs::parse_from([
        "pressroom",
        "renderers",
        "--registry-path",
        "/tmp/renderers.json",
    ]);

    match args.command.expect("renderers command") {
        Command::Renderers(list) => {
            assert_eq!(
                list.registry.registry_path.as_deref(),
                Some(std::path::Path::new("/tmp/renderers.json"))
            );
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn origin_list_matches_exactly() {
    let origins = AllowedOrigins::List(vec!["https://app.example.com".to_string()]);

    assert!(origins.allows("https://app.example.com"));
    assert!(origins.allows("https://app.example.com/"));
    assert!(!origins.allows("https://evil.example.com"));
    assert!(AllowedOrigins::Any.allows("https://evil.example.com"));
}
