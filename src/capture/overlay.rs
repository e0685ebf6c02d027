// src/capture/overlay.rs
// =============================================================================
// Best-effort removal of cookie banners and consent modals before capture.
//
// We probe an ordered list of known affordances and click only the first one
// that exists. Nothing in here can fail a capture: a missing button, a script
// error, or a click that throws are all logged and ignored.
// =============================================================================

use crate::engine::RenderPage;
use serde::Serialize;

/// One thing to look for on the page
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum OverlayProbe {
    /// A <button> whose text contains this string (case-insensitive)
    ButtonText(&'static str),
    /// Any element matching this CSS selector
    Selector(&'static str),
}

/// Probed in order; the first match wins
pub const OVERLAY_PROBES: &[OverlayProbe] = &[
    OverlayProbe::ButtonText("Accept"),
    OverlayProbe::ButtonText("Accept All"),
    OverlayProbe::ButtonText("OK"),
    OverlayProbe::ButtonText("I Accept"),
    OverlayProbe::ButtonText("Close"),
    OverlayProbe::Selector("[aria-label=\"Accept cookies\"]"),
    OverlayProbe::Selector("#cookie-notice button"),
    OverlayProbe::Selector(".cookie-banner button"),
    OverlayProbe::Selector(".consent-banner button"),
];

// The probe list is embedded as JSON so selectors never need escaping by hand.
// The script returns the probe that matched, or null.
const SCRIPT_TEMPLATE: &str = r#"((probes) => {
    const find = (probe) => {
        if (probe.kind === 'button_text') {
            const needle = probe.value.toLowerCase();
            return Array.from(document.querySelectorAll('button'))
                .find((b) => (b.innerText || b.textContent || '').toLowerCase().includes(needle));
        }
        try { return document.querySelector(probe.value); } catch (e) { return null; }
    };
    for (const probe of probes) {
        const el = find(probe);
        if (el) {
            try { el.click(); } catch (e) {}
            return probe.value;
        }
    }
    return null;
})(__PROBES__)"#;

pub fn dismissal_script() -> String {
    let probes = serde_json::to_string(OVERLAY_PROBES).unwrap_or_else(|_| "[]".to_string());
    SCRIPT_TEMPLATE.replace("__PROBES__", &probes)
}

// Runs the heuristic on a loaded page
//
// Returns the probe that was clicked, if any.
pub async fn dismiss_overlays(page: &mut dyn RenderPage, url: &str) -> Option<String> {
    match page.evaluate(&dismissal_script()).await {
        Ok(serde_json::Value::String(matched)) => {
            tracing::debug!("Dismissed overlay on {} via '{}'", url, matched);
            Some(matched)
        }
        Ok(_) => None,
        Err(e) => {
            tracing::debug!("Overlay dismissal failed on {}: {}", url, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_embeds_probes_in_order() {
        let script = dismissal_script();
        assert!(!script.contains("__PROBES__"));

        let accept = script.find(r#"{"kind":"button_text","value":"Accept"}"#).unwrap();
        let close = script.find(r#"{"kind":"button_text","value":"Close"}"#).unwrap();
        let consent = script.find(".consent-banner button").unwrap();
        assert!(accept < close && close < consent);
    }

    #[test]
    fn test_selector_quotes_are_escaped() {
        let script = dismissal_script();
        assert!(script.contains(r#"[aria-label=\"Accept cookies\"]"#));
    }
}
