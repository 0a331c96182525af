use lantern::http::response::{BuildError, Outcome, StatusCode, WriteBuffer};

#[test]
fn test_status_code_as_u16() {
    assert_eq!(StatusCode::Ok.as_u16(), 200);
    assert_eq!(StatusCode::BadRequest.as_u16(), 400);
    assert_eq!(StatusCode::Forbidden.as_u16(), 403);
    assert_eq!(StatusCode::NotFound.as_u16(), 404);
    assert_eq!(StatusCode::InternalServerError.as_u16(), 500);
}

#[test]
fn test_status_code_reason_phrase() {
    assert_eq!(StatusCode::Ok.reason_phrase(), "OK");
    assert_eq!(StatusCode::BadRequest.reason_phrase(), "Bad Request");
    assert_eq!(StatusCode::Forbidden.reason_phrase(), "Forbidden");
    assert_eq!(StatusCode::NotFound.reason_phrase(), "Not Found");
    assert_eq!(
        StatusCode::InternalServerError.reason_phrase(),
        "Internal Error"
    );
}

#[test]
fn test_every_error_status_has_a_page() {
    for status in [
        StatusCode::BadRequest,
        StatusCode::Forbidden,
        StatusCode::NotFound,
        StatusCode::InternalServerError,
    ] {
        assert!(!status.canned_body().is_empty(), "{status:?}");
    }
    assert_eq!(StatusCode::Ok.canned_body(), "");
}

#[test]
fn test_outcome_status_mapping() {
    assert_eq!(Outcome::BadRequest.status(), StatusCode::BadRequest);
    assert_eq!(Outcome::Forbidden.status(), StatusCode::Forbidden);
    assert_eq!(Outcome::NotFound.status(), StatusCode::NotFound);
    assert_eq!(Outcome::InternalError.status(), StatusCode::InternalServerError);
}

#[test]
fn test_write_buffer_serializes_head() {
    let mut buf = WriteBuffer::with_capacity(1024);
    buf.status_line(StatusCode::NotFound).unwrap();
    buf.headers(49, false).unwrap();
    buf.content(StatusCode::NotFound.canned_body()).unwrap();

    let text = std::str::from_utf8(buf.as_bytes()).unwrap();
    assert_eq!(
        text,
        "HTTP/1.1 404 Not Found\r\n\
         Content-Length: 49\r\n\
         Content-Type: text/html\r\n\
         Connection: close\r\n\
         \r\n\
         The requested file was not found on this server.\n"
    );
}

#[test]
fn test_write_buffer_keep_alive_header() {
    let mut buf = WriteBuffer::with_capacity(1024);
    buf.headers(0, true).unwrap();

    let text = std::str::from_utf8(buf.as_bytes()).unwrap();
    assert!(text.contains("Connection: keep-alive\r\n"));
}

#[test]
fn test_write_buffer_overflow_is_all_or_nothing() {
    let mut buf = WriteBuffer::with_capacity(20);
    buf.status_line(StatusCode::Ok).unwrap();
    let before = buf.len();

    let err = buf.headers(10, false).unwrap_err();
    assert_eq!(err, BuildError::Overflow { capacity: 20 });
    assert_eq!(buf.len(), before);
}

#[test]
fn test_write_buffer_exact_fit() {
    let line = "HTTP/1.1 200 OK\r\n";
    let mut buf = WriteBuffer::with_capacity(line.len());
    buf.status_line(StatusCode::Ok).unwrap();
    assert_eq!(buf.len(), line.len());
    assert!(buf.content("x").is_err());
}
