use clap::Parser;

use super::*;

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.server.public_port = Some(4000);
    raw.logging.level = Some("info".to_string());
    raw.listing.page_size = Some(25);

    let overrides = ServeOverrides {
        public_port: Some(4321),
        log_level: Some("debug".to_string()),
        listing_page_size: Some(5),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.server.public_addr.port(), 4321);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
    assert_eq!(settings.listing.page_size.get(), 5);
}

#[test]
fn defaults_match_the_blog_conventions() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.listing.page_size.get(), 10);
    assert_eq!(settings.cache.index_ttl, Duration::from_secs(20));
    assert!(settings.cache.enabled);
    assert_eq!(settings.auth.login_url, "/auth/login/");
    assert_eq!(settings.auth.cookie_name, "yatube_session");
    assert_eq!(
        settings.uploads.max_request_bytes.get(),
        DEFAULT_UPLOAD_REQUEST_LIMIT_BYTES
    );
    assert!(settings.database.url.is_none());
}

#[test]
fn zero_page_size_is_rejected() {
    let mut raw = RawSettings::default();
    raw.listing.page_size = Some(0);

    match Settings::from_raw(raw) {
        Err(LoadError::Invalid { key, .. }) => assert_eq!(key, "listing.page_size"),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn relative_login_url_is_rejected() {
    let mut raw = RawSettings::default();
    raw.auth.login_url = Some("auth/login/".to_string());

    assert!(matches!(
        Settings::from_raw(raw),
        Err(LoadError::Invalid {
            key: "auth.login_url",
            ..
        })
    ));
}

#[test]
fn listeners_must_not_collide() {
    let mut raw = RawSettings::default();
    raw.server.public_port = Some(9000);
    raw.server.admin_port = Some(9000);

    assert!(Settings::from_raw(raw).is_err());
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
fn cache_can_be_disabled_from_cli() {
    let args = CliArgs::parse_from([
        "yatube",
        "serve",
        "--cache-enabled",
        "false",
        "--cache-index-ttl-seconds",
        "5",
    ]);

    let Some(Command::Serve(serve)) = args.command else {
        panic!("serve command expected");
    };
    let mut raw = RawSettings::default();
    raw.apply_serve_overrides(&serve.overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(!settings.cache.enabled);
    assert_eq!(settings.cache.index_ttl, Duration::from_secs(5));
}

#[test]
fn default_to_serve_command() {
    let args = CliArgs::parse_from(["yatube"]);
    let command = args
        .command
        .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
    assert!(matches!(command, Command::Serve(_)));
}

#[test]
fn parse_create_group_arguments() {
    let args = CliArgs::parse_from([
        "yatube",
        "create-group",
        "--database-url",
        "postgres://example",
        "--title",
        "Cats",
        "--description",
        "All about cats",
    ]);

    match args.command.expect("create-group command") {
        Command::CreateGroup(group) => {
            assert_eq!(
                group.database.database_url.as_deref(),
                Some("postgres://example")
            );
            assert_eq!(group.title, "Cats");
            assert!(group.slug.is_none());
            assert_eq!(group.description, "All about cats");
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_migrate_arguments() {
    let args = CliArgs::parse_from(["yatube", "migrate", "--database-url", "postgres://m"]);

    match args.command.expect("migrate command") {
        Command::Migrate(database) => {
            assert_eq!(database.database_url.as_deref(), Some("postgres://m"));
        }
        _ => panic!("wrong command parsed"),
    }
}
