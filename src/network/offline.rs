//! Responses synthesized when neither the network nor a partition can answer.

use super::registry::PartitionKind;
use super::request::{OutboundRequest, ResponseSnapshot};

pub const OFFLINE_HEADER: &str = "x-vellum-offline";
pub const OFFLINE_STATUS: u16 = 503;

const OFFLINE_PAGE: &str = r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Offline</title>
<style>
body { font-family: system-ui, sans-serif; display: grid; place-items: center; min-height: 100vh; margin: 0; color: #333; }
main { max-width: 28rem; padding: 2rem; text-align: center; }
</style>
</head>
<body>
<main>
<h1>You are offline</h1>
<p>This page has not been saved for offline reading yet. Check your connection and try again.</p>
</main>
</body>
</html>
"#;

const PLACEHOLDER_IMAGE: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="400" height="300" viewBox="0 0 400 300"><rect width="400" height="300" fill="#e5e7eb"/><path d="M150 200l40-50 30 35 20-20 40 35z" fill="#9ca3af"/><circle cx="170" cy="120" r="14" fill="#9ca3af"/></svg>"##;

const OFFLINE_BODY: &str = r#"{"error":{"code":"offline","message":"network unavailable and no cached copy"}}"#;

/// Pick a stand-in response for a request that could not be served.
pub fn offline_response(request: &OutboundRequest, kind: PartitionKind) -> ResponseSnapshot {
    let (content_type, body) = if request.is_navigation() {
        ("text/html; charset=utf-8", OFFLINE_PAGE)
    } else if kind == PartitionKind::Images {
        ("image/svg+xml", PLACEHOLDER_IMAGE)
    } else {
        ("application/json", OFFLINE_BODY)
    };

    ResponseSnapshot::new(OFFLINE_STATUS, body)
        .with_header("content-type", content_type)
        .with_header("cache-control", "no-store")
        .with_header(OFFLINE_HEADER, "1")
}

pub fn is_offline(response: &ResponseSnapshot) -> bool {
    response.header(OFFLINE_HEADER).is_some()
}
