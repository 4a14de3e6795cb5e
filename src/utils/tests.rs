use super::RelayError;
use super::logging;
use axum::http::StatusCode;

#[test]
fn logging_init_accepts_levels() {
    // Should not panic
    logging::init("info", None).unwrap();
    logging::init("debug", None).unwrap();
    logging::init("warning", None).unwrap();
}

#[test]
fn logging_init_creates_log_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("logs").join("server.log");

    logging::init("info", Some(&path)).unwrap();

    assert!(path.exists());
}

#[test]
fn error_statuses_are_defined() {
    assert_eq!(
        RelayError::MissingParameter("type").status(),
        StatusCode::BAD_REQUEST
    );
    assert_eq!(
        RelayError::BrokerUnavailable("down".into()).status(),
        StatusCode::BAD_GATEWAY
    );
    assert_eq!(
        RelayError::BrokerAuth("WRONGPASS".into()).status(),
        StatusCode::BAD_GATEWAY
    );
    assert_eq!(
        RelayError::NoSubscribers {
            channel: "gChannel".into()
        }
        .status(),
        StatusCode::INTERNAL_SERVER_ERROR
    );
}
