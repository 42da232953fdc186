//! Install guidance for the generated bookmarklet.
//!
//! Browsers expose no reliable API for programmatic bookmark creation, so
//! installation is a capability-probe chain: try the richest strategy the
//! client supports, fall through to the next, and end at manual-copy
//! instructions that work everywhere. Strategies share one result type and
//! are walked in order — no nested conditionals.

use serde::{Deserialize, Serialize};

/// What we can infer about the requesting client from transport metadata.
#[derive(Debug, Clone, Default)]
pub struct ClientCapabilities {
    pub user_agent: String,
}

impl ClientCapabilities {
    pub fn from_user_agent(user_agent: &str) -> Self {
        Self {
            user_agent: user_agent.to_lowercase(),
        }
    }

    /// Phones and tablets have no bookmarks toolbar to drag onto.
    fn is_mobile(&self) -> bool {
        ["android", "iphone", "ipad", "mobile"]
            .iter()
            .any(|needle| self.user_agent.contains(needle))
    }

    /// Recognized desktop browsers, all of which have a conventional
    /// bookmarks toolbar.
    fn has_bookmarks_toolbar(&self) -> bool {
        !self.is_mobile()
            && ["chrome", "firefox", "safari", "edg", "opera"]
                .iter()
                .any(|needle| self.user_agent.contains(needle))
    }

    /// Some identifiable desktop client, even if we don't recognize the
    /// browser family.
    fn is_desktop(&self) -> bool {
        !self.is_mobile() && !self.user_agent.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallMethod {
    DragToToolbar,
    BookmarkDialog,
    ManualCopy,
}

/// Uniform result of the probe chain: one method plus the user-facing steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallPlan {
    pub method: InstallMethod,
    pub title: String,
    pub steps: Vec<String>,
}

type Strategy = fn(&ClientCapabilities) -> Option<InstallPlan>;

/// Ordered probe chain. The last entry always applies, so the chain cannot
/// come back empty-handed.
const STRATEGIES: &[Strategy] = &[try_toolbar_drag, try_bookmark_dialog, manual_copy];

/// Pick the best installation path for this client.
pub fn install_plan(caps: &ClientCapabilities) -> InstallPlan {
    STRATEGIES
        .iter()
        .find_map(|strategy| strategy(caps))
        .expect("manual-copy strategy always applies")
}

fn try_toolbar_drag(caps: &ClientCapabilities) -> Option<InstallPlan> {
    if !caps.has_bookmarks_toolbar() {
        return None;
    }
    Some(InstallPlan {
        method: InstallMethod::DragToToolbar,
        title: "Drag to your bookmarks bar".to_string(),
        steps: vec![
            "Show your bookmarks bar (Ctrl+Shift+B / Cmd+Shift+B).".to_string(),
            "Drag the fill button onto the bookmarks bar.".to_string(),
            "On any directory form, click the bookmark to fill it.".to_string(),
        ],
    })
}

fn try_bookmark_dialog(caps: &ClientCapabilities) -> Option<InstallPlan> {
    if !caps.is_desktop() {
        return None;
    }
    Some(InstallPlan {
        method: InstallMethod::BookmarkDialog,
        title: "Add via the bookmark dialog".to_string(),
        steps: vec![
            "Open your browser's add-bookmark dialog (Ctrl+D / Cmd+D).".to_string(),
            "Replace the URL with the copied fill link.".to_string(),
            "Save it, then click it on any directory form.".to_string(),
        ],
    })
}

fn manual_copy(_caps: &ClientCapabilities) -> Option<InstallPlan> {
    Some(InstallPlan {
        method: InstallMethod::ManualCopy,
        title: "Copy the fill link manually".to_string(),
        steps: vec![
            "Copy the fill link below.".to_string(),
            "Create a new bookmark and paste the link as its address.".to_string(),
            "Open the target form and tap the bookmark to fill it.".to_string(),
        ],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn desktop_clients_get_toolbar_drag() {
        let caps = ClientCapabilities::from_user_agent(
            "Mozilla/5.0 (X11; Linux x86_64) Firefox/126.0",
        );
        assert_eq!(install_plan(&caps).method, InstallMethod::DragToToolbar);
    }

    #[test]
    fn mobile_clients_fall_through_to_manual_copy() {
        let caps = ClientCapabilities::from_user_agent(
            "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) Mobile/15E148",
        );
        assert_eq!(install_plan(&caps).method, InstallMethod::ManualCopy);
    }

    #[test]
    fn unrecognized_desktop_browser_gets_the_dialog_path() {
        let caps = ClientCapabilities::from_user_agent("SomeBrowser/1.0 (X11; Linux x86_64)");
        assert_eq!(install_plan(&caps).method, InstallMethod::BookmarkDialog);
    }

    #[test]
    fn unknown_client_still_gets_a_plan() {
        let plan = install_plan(&ClientCapabilities::default());
        assert_eq!(plan.method, InstallMethod::ManualCopy);
        assert!(!plan.steps.is_empty());
    }
}
