//! Wire types exchanged with the Playwright helper.
//!
//! One JSON document per line in both directions. Requests carry a numeric
//! id; the helper answers each with a `response` or `error` message carrying
//! the same id, and streams page events as `event` messages in between.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ContextOptions, PageEvent, WaitUntil};

#[derive(Debug, Serialize)]
pub(crate) struct Request<'a> {
    pub id: u64,
    pub method: &'a str,
    pub params: Value,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub(crate) enum HelperMessage {
    Ready,
    Response {
        id: u64,
        #[serde(default)]
        result: Value,
    },
    Error {
        id: u64,
        #[serde(default)]
        name: Option<String>,
        message: String,
    },
    Event {
        #[serde(rename = "pageId")]
        page_id: String,
        event: PageEvent,
    },
    Fatal {
        message: String,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct NewContextParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viewport: Option<ViewportSize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_scale_factor: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_mobile: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_touch: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_scheme: Option<&'static str>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ViewportSize {
    pub width: u32,
    pub height: u32,
}

impl From<&ContextOptions> for NewContextParams {
    fn from(options: &ContextOptions) -> Self {
        let viewport = options.viewport.as_ref();
        Self {
            viewport: viewport.map(|vp| ViewportSize {
                width: vp.width,
                height: vp.height,
            }),
            device_scale_factor: viewport.map(|vp| vp.device_scale_factor),
            is_mobile: viewport.map(|vp| vp.is_mobile),
            has_touch: viewport.map(|vp| vp.has_touch),
            color_scheme: options.color_scheme.map(|scheme| scheme.value()),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GotoParams<'a> {
    pub page_id: &'a str,
    pub url: &'a str,
    pub wait_until: WaitUntil,
    pub timeout: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LoadStateParams<'a> {
    pub page_id: &'a str,
    pub state: WaitUntil,
    pub timeout: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct EvaluateParams<'a> {
    pub page_id: &'a str,
    pub expression: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ScreenshotParams<'a> {
    pub page_id: &'a str,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selector: Option<&'a str>,
    pub full_page: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ContextCreated {
    pub context_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PageCreated {
    pub page_id: String,
}
