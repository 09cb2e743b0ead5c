use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde_json::Value;
use url::Url;

/// Build the address the renderer page is loaded from.
///
/// The payload travels as base64 of its JSON text in the `data` query
/// parameter; the renderer id follows in `renderer`. Query values are
/// form-encoded so `+`, `/` and `=` from the base64 alphabet survive intact.
pub fn render_target(base: &Url, renderer: &str, data: &Value) -> Result<Url, serde_json::Error> {
    let json = serde_json::to_string(data)?;
    let encoded = STANDARD.encode(json.as_bytes());

    let mut url = base.clone();
    url.query_pairs_mut()
        .append_pair("data", &encoded)
        .append_pair("renderer", renderer);
    Ok(url)
}
