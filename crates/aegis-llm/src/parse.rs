use regex::Regex;
use std::sync::OnceLock;

/// Extract the first JSON object embedded in model output. Reasoning steps
/// are told to answer with a bare JSON object, but models wrap it in prose
/// or code fences often enough that callers must not rely on that.
pub fn extract_json_object(text: &str) -> Option<serde_json::Value> {
    static OBJECT_RE: OnceLock<Regex> = OnceLock::new();
    let re = OBJECT_RE.get_or_init(|| Regex::new(r"\{[\s\S]*\}").expect("valid regex"));

    let candidate = re.find(text)?.as_str();
    serde_json::from_str(candidate).ok()
}
