//! Upload session responder
//!
//! Reads the `Content-Range` of each PUT and answers like Graph does:
//! `200` with the next expected range while bytes are missing, `201`
//! once the last byte has arrived. The other variants misbehave.

use serde_json::json;
use wiremock::{Request, Respond, ResponseTemplate};

#[derive(Clone, Copy)]
pub enum SliceResponder {
    /// Accept every slice in order.
    Accept,
    /// Keep asking for the first byte again.
    Stall,
    /// Answer `200` with a body that is not JSON.
    Malformed,
}

/// `(start, end, total)` from `bytes start-end/total`.
pub fn content_range(request: &Request) -> Option<(u64, u64, u64)> {
    let value = request.headers.get("content-range")?.to_str().ok()?;
    let (range, total) = value.strip_prefix("bytes ")?.split_once('/')?;
    let (start, end) = range.split_once('-')?;
    Some((start.parse().ok()?, end.parse().ok()?, total.parse().ok()?))
}

impl Respond for SliceResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let Some((start, end, total)) = content_range(request) else {
            return ResponseTemplate::new(400);
        };

        if request.body.len() as u64 != end - start + 1 {
            return ResponseTemplate::new(400);
        }

        match self {
            Self::Accept => {}
            Self::Stall => {
                return ResponseTemplate::new(200)
                    .set_body_json(json!({ "nextExpectedRanges": ["0-"] }));
            }
            Self::Malformed => return ResponseTemplate::new(200).set_body_string("oops"),
        }

        if end + 1 >= total {
            ResponseTemplate::new(201).set_body_json(json!({ "id": "uploaded" }))
        } else {
            ResponseTemplate::new(200).set_body_json(json!({
                "nextExpectedRanges": [format!("{}-", end + 1)]
            }))
        }
    }
}
