//! DOM scan scripts evaluated through [`PageAutomation::evaluate`]
//!
//! Every script starts with a one-line header comment
//! `/* replay:<kind> <json-args> */` so page implementations (and the
//! in-memory fake) can recognise it without parsing JavaScript.
//!
//! Coordinates reported by the scripts are viewport coordinates, the same
//! space `hover`/`click` operate in.
//!
//! [`PageAutomation::evaluate`]: crate::PageAutomation::evaluate

use serde_json::{json, Value};

const HEADER_PREFIX: &str = "/* replay:";

/// Maximum characters of visible text kept in a page snapshot.
pub const SNAPSHOT_TEXT_LIMIT: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptKind {
    TextScan,
    SelectorQuery,
    FileInputScan,
    PageSnapshot,
    ExtractText,
}

impl ScriptKind {
    pub fn name(&self) -> &'static str {
        match self {
            ScriptKind::TextScan => "text_scan",
            ScriptKind::SelectorQuery => "selector_query",
            ScriptKind::FileInputScan => "file_input_scan",
            ScriptKind::PageSnapshot => "page_snapshot",
            ScriptKind::ExtractText => "extract_text",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "text_scan" => Some(ScriptKind::TextScan),
            "selector_query" => Some(ScriptKind::SelectorQuery),
            "file_input_scan" => Some(ScriptKind::FileInputScan),
            "page_snapshot" => Some(ScriptKind::PageSnapshot),
            "extract_text" => Some(ScriptKind::ExtractText),
            _ => None,
        }
    }
}

/// Shared helpers injected into every scan.
const PRELUDE: &str = r#"
  const ATTR = 'data-replay-handle';
  const stamp = (el) => {
    let id = el.getAttribute(ATTR);
    if (!id) {
      window.__replaySeq = (window.__replaySeq || 0) + 1;
      id = 'r-' + window.__replaySeq;
      el.setAttribute(ATTR, id);
    }
    return id;
  };
  const visibleBox = (el) => {
    const style = window.getComputedStyle(el);
    const r = el.getBoundingClientRect();
    const hidden = style.display === 'none' || style.visibility === 'hidden' || Number(style.opacity) === 0;
    return { x: r.left, y: r.top, width: hidden ? 0 : r.width, height: hidden ? 0 : r.height };
  };
  const textOf = (el) => ((el.innerText || el.value || el.textContent || '') + '').replace(/\s+/g, ' ').trim();
  const record = (el, source) => Object.assign(
    { handle: stamp(el), text: textOf(el), tag: el.tagName.toLowerCase(), source },
    visibleBox(el)
  );
  const viewport = { width: window.innerWidth, height: window.innerHeight };
"#;

const TEXT_SCAN_BODY: &str = r#"
  const needle = String(ARGS.target || '').toLowerCase();
  const elements = [];
  if (needle) {
    const walker = document.createTreeWalker(document.body, NodeFilter.SHOW_TEXT);
    while (walker.nextNode()) {
      const node = walker.currentNode;
      if (node.parentElement && node.textContent.toLowerCase().includes(needle)) {
        elements.push(record(node.parentElement, 'text_node'));
      }
    }
    const composite = 'button, a, label, summary, option, [role=button], [role=link], [role=tab], [role=menuitem], input[type=submit], input[type=button]';
    document.querySelectorAll(composite).forEach((el) => {
      if (textOf(el).toLowerCase().includes(needle)) {
        elements.push(record(el, 'element'));
      }
    });
  }
  return { viewport, elements };
"#;

const SELECTOR_QUERY_BODY: &str = r#"
  let nodes = [];
  try {
    nodes = Array.from(document.querySelectorAll(ARGS.selector));
  } catch (e) {
    return { viewport, elements: [], error: String(e) };
  }
  return { viewport, elements: nodes.map((el) => record(el, 'selector')) };
"#;

const FILE_INPUT_SCAN_BODY: &str = r#"
  return Array.from(document.querySelectorAll('input[type=file]')).map((el) => ({
    handle: stamp(el),
    accept: el.getAttribute('accept'),
    multiple: !!el.multiple,
  }));
"#;

const PAGE_SNAPSHOT_BODY: &str = r#"
  const text = (document.body ? document.body.innerText : '') || '';
  return {
    url: location.href,
    title: document.title,
    viewport_width: viewport.width,
    viewport_height: viewport.height,
    element_count: document.getElementsByTagName('*').length,
    visible_text: text.slice(0, ARGS.limit),
  };
"#;

const EXTRACT_TEXT_BODY: &str = r#"
  const el = document.querySelector(ARGS.selector);
  return el ? textOf(el) : null;
"#;

fn build(kind: ScriptKind, args: Value, body: &str) -> String {
    // `*/` inside an argument would close the header comment early
    let header_args = args.to_string().replace("*/", "*\\/");
    format!(
        "{}{} {} */\n(() => {{\n  const ARGS = {};\n{}{}}})()",
        HEADER_PREFIX,
        kind.name(),
        header_args,
        args,
        PRELUDE,
        body
    )
}

/// Scan text nodes and composite elements for `target`.
pub fn text_scan(target: &str) -> String {
    build(
        ScriptKind::TextScan,
        json!({ "target": target }),
        TEXT_SCAN_BODY,
    )
}

/// Report every element matching `selector`.
pub fn selector_query(selector: &str) -> String {
    build(
        ScriptKind::SelectorQuery,
        json!({ "selector": selector }),
        SELECTOR_QUERY_BODY,
    )
}

/// List file inputs with their `accept` attribute.
pub fn file_input_scan() -> String {
    build(ScriptKind::FileInputScan, json!({}), FILE_INPUT_SCAN_BODY)
}

/// URL, title, viewport, element count and truncated visible text.
pub fn page_snapshot() -> String {
    build(
        ScriptKind::PageSnapshot,
        json!({ "limit": SNAPSHOT_TEXT_LIMIT }),
        PAGE_SNAPSHOT_BODY,
    )
}

/// Visible text of the first element matching `selector`, or null.
pub fn extract_text(selector: &str) -> String {
    build(
        ScriptKind::ExtractText,
        json!({ "selector": selector }),
        EXTRACT_TEXT_BODY,
    )
}

/// Recover the kind and arguments from a script's header line.
pub fn parse_header(script: &str) -> Option<(ScriptKind, Value)> {
    let first = script.lines().next()?;
    let rest = first.strip_prefix(HEADER_PREFIX)?.strip_suffix("*/")?.trim();
    let (name, args) = rest.split_once(' ')?;
    let kind = ScriptKind::from_name(name)?;
    let args = serde_json::from_str(args.trim()).ok()?;
    Some((kind, args))
}
