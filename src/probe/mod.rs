pub mod broken_links;
pub mod cmd_injection;
pub mod cors;
pub mod crlf;
pub mod default_creds;
pub mod graphql;
pub mod methods;
pub mod nosql;
pub mod open_redirect;
pub mod prototype_pollution;
pub mod rate_limit;
pub mod smuggling;
pub mod sqli;
pub mod ssrf;
pub mod ssti;
pub mod tls;
pub mod xss;
pub mod xxe;

use crate::http_client::HttpClient;
use crate::state::{Form, FormMethod};
use anyhow::Result;
use reqwest::Response;
use std::time::Duration;

/// Submit a form with the given field data, honoring the form's method.
pub(crate) async fn submit_form(
    http: &HttpClient,
    form: &Form,
    data: &[(String, String)],
    timeout: Option<Duration>,
) -> Result<Response> {
    let builder = match form.method {
        FormMethod::Post => http.client().post(form.action.clone()).form(data),
        FormMethod::Get => http.client().get(form.action.clone()).query(data),
    };
    let builder = match timeout {
        Some(timeout) => builder.timeout(timeout),
        None => builder,
    };
    Ok(builder.send().await?)
}
