//! Generates the self-contained browser script the user installs as a
//! bookmark. The artifact embeds the project's data snapshot and the mapping
//! rule table directly — it makes no network calls at fill time, so no
//! third-party CORS cooperation is required.
//!
//! The generator is a templating concern: one fixed logic template, two
//! injected JSON payloads (profile, rules). Output is deterministic for a
//! given snapshot — no timestamps, no random ids — so the artifact itself is
//! cacheable and diffable.

use serde_json::json;

use crate::mapping::MAPPING_RULES;
use crate::models::profile::BusinessProfileSnapshot;

/// Pause between typed characters, in milliseconds. Long enough to read as
/// "the tool is typing", short enough not to stall the page.
const FILL_DELAY_MS: u32 = 18;

/// Placeholder markers in the template. The template never contains these
/// strings except at the injection points.
const PROFILE_SLOT: &str = "__PROFILE_JSON__";
const RULES_SLOT: &str = "__RULES_JSON__";
const DELAY_SLOT: &str = "__FILL_DELAY_MS__";

/// The fixed fill logic. Mirrors `crate::mapping`: same rule order, same
/// first-match-wins evaluation, same eligibility guard. It fills matched
/// fields character by character and never submits the form — submission
/// stays a manual, explicit user action.
const SCRIPT_TEMPLATE: &str = r#"(function () {
  "use strict";
  var PROFILE = __PROFILE_JSON__;
  var RULES = __RULES_JSON__;
  var DELAY = __FILL_DELAY_MS__;
  var SKIP_TYPES = ["hidden", "submit", "button", "password", "checkbox", "radio", "file", "image", "reset"];

  function fieldType(el) {
    if (el.tagName === "TEXTAREA") { return "textarea"; }
    return (el.getAttribute("type") || "text").toLowerCase();
  }

  function descriptorText(el) {
    return ((el.name || "") + " " + (el.id || "") + " " + (el.placeholder || "")).toLowerCase();
  }

  function mapField(el) {
    var text = descriptorText(el);
    var type = fieldType(el);
    for (var i = 0; i < RULES.length; i++) {
      var rule = RULES[i];
      for (var t = 0; t < rule.types.length; t++) {
        if (rule.types[t] === type) { return rule.attr; }
      }
      for (var k = 0; k < rule.keywords.length; k++) {
        if (text.indexOf(rule.keywords[k]) !== -1) { return rule.attr; }
      }
    }
    return null;
  }

  function eligible(el) {
    if (el.disabled || el.readOnly) { return false; }
    if ((el.value || "").replace(/\s/g, "") !== "") { return false; }
    return SKIP_TYPES.indexOf(fieldType(el)) === -1;
  }

  function fire(el, kind) {
    var ev = document.createEvent("Event");
    ev.initEvent(kind, true, true);
    el.dispatchEvent(ev);
  }

  function typeInto(el, value, done) {
    var i = 0;
    el.focus();
    function step() {
      if (i >= value.length) { fire(el, "change"); done(); return; }
      el.value = value.slice(0, i + 1);
      fire(el, "input");
      i += 1;
      window.setTimeout(step, DELAY);
    }
    step();
  }

  var inputs = document.querySelectorAll("input, textarea");
  var queue = [];
  for (var i = 0; i < inputs.length; i++) {
    var el = inputs[i];
    if (!eligible(el)) { continue; }
    var attr = mapField(el);
    if (!attr) { continue; }
    var value = PROFILE[attr] || "";
    if (value === "") { continue; }
    queue.push({ el: el, value: value });
  }

  function next() {
    if (queue.length === 0) { return; }
    var job = queue.shift();
    typeInto(job.el, job.value, next);
  }
  next();
})();"#;

/// Render the fill script for one snapshot.
pub fn generate(snapshot: &BusinessProfileSnapshot) -> String {
    let profile_json =
        serde_json::to_string(snapshot).expect("snapshot serialization is infallible");

    SCRIPT_TEMPLATE
        .replace(PROFILE_SLOT, &profile_json)
        .replace(RULES_SLOT, &rules_json())
        .replace(DELAY_SLOT, &FILL_DELAY_MS.to_string())
}

/// Render the script as a `javascript:` URL suitable for a bookmark href.
pub fn bookmarklet_href(snapshot: &BusinessProfileSnapshot) -> String {
    format!("javascript:{}", urlencoding::encode(&generate(snapshot)))
}

/// Serialize the shared rule table for embedding. Rule order is preserved —
/// the script's first-match-wins walk must agree with the server-side engine.
fn rules_json() -> String {
    let rules: Vec<_> = MAPPING_RULES
        .iter()
        .map(|rule| {
            json!({
                "types": rule.types,
                "keywords": rule.keywords,
                "attr": rule.attribute.key(),
            })
        })
        .collect();
    serde_json::to_string(&rules).expect("rule serialization is infallible")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> BusinessProfileSnapshot {
        BusinessProfileSnapshot {
            name: "Dana Rivers".into(),
            email: "dana@acme.test".into(),
            company: "Acme Widgets".into(),
            url: "https://acme.test".into(),
            ..Default::default()
        }
    }

    #[test]
    fn output_is_byte_identical_for_identical_snapshots() {
        let a = generate(&snapshot());
        let b = generate(&snapshot());
        assert_eq!(a, b);
    }

    #[test]
    fn output_embeds_profile_values_and_rules() {
        let script = generate(&snapshot());
        assert!(script.contains("dana@acme.test"));
        assert!(script.contains("Acme Widgets"));
        // The rule table travels with the script.
        assert!(script.contains("\"company\""));
        assert!(script.contains("\"postal_code\""));
    }

    #[test]
    fn no_placeholder_survives_rendering() {
        let script = generate(&snapshot());
        assert!(!script.contains(PROFILE_SLOT));
        assert!(!script.contains(RULES_SLOT));
        assert!(!script.contains(DELAY_SLOT));
    }

    #[test]
    fn script_never_submits_the_form() {
        let script = generate(&snapshot());
        assert!(!script.contains(".submit("));
        assert!(!script.contains("requestSubmit"));
    }

    #[test]
    fn bookmarklet_href_is_a_javascript_url() {
        let href = bookmarklet_href(&snapshot());
        assert!(href.starts_with("javascript:"));
        // Percent-encoded: no raw whitespace survives.
        assert!(!href.contains(' '));
        assert!(!href.contains('\n'));
    }

    #[test]
    fn bookmarklet_href_is_deterministic() {
        assert_eq!(bookmarklet_href(&snapshot()), bookmarklet_href(&snapshot()));
    }

    #[test]
    fn rules_json_preserves_engine_order() {
        let rules: serde_json::Value = serde_json::from_str(&rules_json()).unwrap();
        let rules = rules.as_array().unwrap();
        assert_eq!(rules.len(), MAPPING_RULES.len());
        // Declared-type email rule stays first; bare name fallback stays last.
        assert_eq!(rules[0]["attr"], "email");
        assert_eq!(rules[0]["types"][0], "email");
        assert_eq!(rules[rules.len() - 1]["attr"], "name");
    }
}
