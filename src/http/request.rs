/// HTTP request methods.
///
/// Only GET is served; every other method is rejected while parsing the
/// request line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Method {
    /// GET - Retrieve a resource
    #[default]
    GET,
}

/// The only protocol version the server speaks.
pub const HTTP_1_1: &str = "HTTP/1.1";

impl Method {
    /// Parses an HTTP method, ignoring ASCII case.
    ///
    /// # Example
    ///
    /// ```
    /// # use lantern::http::request::Method;
    /// assert_eq!(Method::parse("GET"), Some(Method::GET));
    /// assert_eq!(Method::parse("get"), Some(Method::GET));
    /// assert_eq!(Method::parse("POST"), None);
    /// ```
    pub fn parse(s: &str) -> Option<Self> {
        s.eq_ignore_ascii_case("GET").then_some(Method::GET)
    }
}

/// Fields extracted from the request line and the recognized headers.
///
/// The body is never retained; only its declared length matters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Request {
    /// The HTTP method (always GET once parsed)
    pub method: Method,
    /// Origin-form target, always starting with `/`
    pub url: String,
    /// Protocol version as sent by the client
    pub version: String,
    /// Value of the `Host` header, if any
    pub host: Option<String>,
    /// Value of the `Content-Length` header, 0 when absent
    pub content_length: usize,
    /// Set by `Connection: keep-alive`
    pub keep_alive: bool,
}

impl Request {
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Reduces a request target to its origin form.
///
/// Absolute targets (`http://host[:port]/path`) lose their scheme and
/// authority; the path and query are kept byte for byte. Returns `None` when
/// the result does not start with `/` or the authority is not a valid host.
///
/// ```
/// # use lantern::http::request::origin_form;
/// assert_eq!(origin_form("/index.html").as_deref(), Some("/index.html"));
/// assert_eq!(
///     origin_form("http://10.0.0.1:8080/a/b.html").as_deref(),
///     Some("/a/b.html"),
/// );
/// assert_eq!(origin_form("index.html"), None);
/// ```
pub fn origin_form(target: &str) -> Option<String> {
    let absolute = target
        .get(..7)
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case("http://"));

    if !absolute {
        return target.starts_with('/').then(|| target.to_string());
    }

    let rest = &target[7..];
    let slash = rest.find('/')?;
    let (authority, path) = rest.split_at(slash);
    url::Url::parse(&format!("http://{authority}/")).ok()?;
    Some(path.to_string())
}
