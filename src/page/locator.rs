//! Locator script builders
//!
//! Generates the JavaScript snippets the page driver evaluates through
//! `Runtime.evaluate`. Query scripts return JSON strings describing the
//! visible matches; action scripts return a boolean indicating whether a
//! matching element was acted on.

use super::Selector;

/// Embed a Rust string as a JavaScript string literal
fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

/// Expression evaluating to an array of elements matching the selector
fn match_expr(selector: &Selector) -> String {
    match selector {
        Selector::Css(css) => {
            format!("Array.from(document.querySelectorAll({}))", js_string(css))
        }
        Selector::XPath(xpath) => format!(
            r#"(() => {{
                const snapshot = document.evaluate({}, document, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null);
                const nodes = [];
                for (let i = 0; i < snapshot.snapshotLength; i++) {{
                    nodes.push(snapshot.snapshotItem(i));
                }}
                return nodes;
            }})()"#,
            js_string(xpath)
        ),
        Selector::Text { css, contains } => format!(
            "Array.from(document.querySelectorAll({})).filter(el => (el.textContent || '').includes({}))",
            js_string(css),
            js_string(contains)
        ),
    }
}

/// Filter expression keeping only rendered, visible elements
const VISIBLE_FILTER: &str = r#"el => {
    const rect = el.getBoundingClientRect();
    const style = window.getComputedStyle(el);
    return rect.width > 0 && rect.height > 0 && style.visibility !== 'hidden' && style.display !== 'none';
}"#;

/// Script returning a JSON array of visible matches in display order
pub fn query_visible_script(selector: &Selector) -> String {
    format!(
        r#"(() => {{
            const matches = {matches};
            const visible = matches.filter({filter});
            return JSON.stringify(visible.map((el, i) => ({{
                index: i,
                tag_name: el.tagName.toLowerCase(),
                text: (el.textContent || '').trim().substring(0, 200)
            }})));
        }})()"#,
        matches = match_expr(selector),
        filter = VISIBLE_FILTER,
    )
}

/// Script clicking the n-th visible match; returns whether a click happened
pub fn click_nth_script(selector: &Selector, index: usize) -> String {
    format!(
        r#"(() => {{
            const matches = {matches};
            const visible = matches.filter({filter});
            if (visible.length <= {index}) return false;
            const el = visible[{index}];
            el.scrollIntoView({{ block: 'center' }});
            el.click();
            return true;
        }})()"#,
        matches = match_expr(selector),
        filter = VISIBLE_FILTER,
        index = index,
    )
}

/// Script filling the first match and firing input/change events
pub fn fill_script(selector: &Selector, value: &str) -> String {
    format!(
        r#"(() => {{
            const matches = {matches};
            const el = matches[0];
            if (!el) return false;
            el.focus();
            el.value = {value};
            el.dispatchEvent(new Event('input', {{ bubbles: true }}));
            el.dispatchEvent(new Event('change', {{ bubbles: true }}));
            return true;
        }})()"#,
        matches = match_expr(selector),
        value = js_string(value),
    )
}

/// Script toggling a checkbox into the requested state
pub fn set_checked_script(selector: &Selector, checked: bool) -> String {
    format!(
        r#"(() => {{
            const matches = {matches};
            const el = matches[0];
            if (!el) return false;
            if (el.checked !== {checked}) el.click();
            return true;
        }})()"#,
        matches = match_expr(selector),
        checked = checked,
    )
}

/// Script snapshotting local storage as a JSON object
pub fn storage_snapshot_script() -> String {
    r#"(() => {
        const data = {};
        for (let i = 0; i < localStorage.length; i++) {
            const key = localStorage.key(i);
            data[key] = localStorage.getItem(key);
        }
        return JSON.stringify(data);
    })()"#
        .to_string()
}

/// Script restoring a local storage snapshot
pub fn storage_restore_script(entries: &serde_json::Value) -> String {
    format!(
        r#"(() => {{
            const entries = {entries};
            for (const [key, value] of Object.entries(entries)) {{
                localStorage.setItem(key, value);
            }}
            return true;
        }})()"#,
        entries = entries,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_css_query_script() {
        let script = query_visible_script(&Selector::css("div.element"));
        assert!(script.contains("querySelectorAll(\"div.element\")"));
        assert!(script.contains("getBoundingClientRect"));
        assert!(script.contains("JSON.stringify"));
    }

    #[test]
    fn test_xpath_query_script() {
        let script = query_visible_script(&Selector::xpath("//label/div[contains(.,'2026-08-08')]"));
        assert!(script.contains("document.evaluate"));
        assert!(script.contains("ORDERED_NODE_SNAPSHOT_TYPE"));
    }

    #[test]
    fn test_text_selector_escapes_quotes() {
        let script = query_visible_script(&Selector::text("button", "it's \"quoted\""));
        assert!(script.contains(r#"includes("it's \"quoted\"")"#));
    }

    #[test]
    fn test_click_nth_script_indexes_visible_set() {
        let script = click_nth_script(&Selector::css("div"), 2);
        assert!(script.contains("visible.length <= 2"));
        assert!(script.contains("visible[2]"));
        assert!(script.contains("el.click()"));
    }

    #[test]
    fn test_fill_script_dispatches_events() {
        let script = fill_script(&Selector::css("#username"), "2023123456");
        assert!(script.contains("el.value = \"2023123456\""));
        assert!(script.contains("new Event('input'"));
        assert!(script.contains("new Event('change'"));
    }

    #[test]
    fn test_storage_restore_script_embeds_entries() {
        let entries = serde_json::json!({ "token": "abc" });
        let script = storage_restore_script(&entries);
        assert!(script.contains(r#"{"token":"abc"}"#));
        assert!(script.contains("localStorage.setItem"));
    }
}
