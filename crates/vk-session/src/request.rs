//! Remote call request construction

use std::collections::BTreeMap;

use serde_json::Value;
use url::Url;

use crate::method::{lower_camel, qualify};
use crate::session::Params;
use crate::Result;

/// Reserved form field carrying the session's access token.
pub(crate) const ACCESS_TOKEN_KEY: &str = "access_token";

/// One outgoing remote call, fully formed: the namespace-qualified method
/// name, the target URL and the form fields with the token injected.
#[derive(Debug)]
pub(crate) struct CallRequest {
    pub method: String,
    pub url: Url,
    pub fields: BTreeMap<String, String>,
}

impl CallRequest {
    /// Build the request for `method` under `prefix`. The access token is
    /// inserted under [`ACCESS_TOKEN_KEY`], replacing any caller-supplied
    /// value for that field.
    pub fn build(
        base: &str,
        prefix: Option<&str>,
        method: &str,
        params: Params,
        access_token: &str,
    ) -> Result<Self> {
        let method = qualify(prefix, &lower_camel(method));

        let mut fields: BTreeMap<String, String> = params
            .into_iter()
            .map(|(name, value)| (name, field_value(value)))
            .collect();
        fields.insert(ACCESS_TOKEN_KEY.to_string(), access_token.to_string());

        let url = Url::parse(&format!("{}/method/{}", base, method))?;

        Ok(Self {
            method,
            url,
            fields,
        })
    }
}

/// Form representation of one parameter value: strings verbatim, anything
/// else as its JSON text.
fn field_value(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}
