//! Cleanup of enrichment output before it is shown to a seller.
use once_cell::sync::Lazy;
use regex::Regex;

static LABEL_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(?:Title|Description|Result|Output|Here's?(?:\s+(?:your|the))?(?:\s+(?:result|listing|post|title|description))?):?\s*",
    )
    .expect("valid label regex")
});
static WRAPPING_QUOTES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^["']|["']$"#).expect("valid quote regex"));
static INTRO: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(?:I've generated|I have created|Here is|This is)\s+(?:a|the)\s+(?:listing|post|title|description)(?:\s+for you)?:?\s*",
    )
    .expect("valid intro regex")
});
static OUTRO: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\s*(?:Let me know if you'd like any changes|How's that|Is this what you were looking for)\??$",
    )
    .expect("valid outro regex")
});
static RUNS_OF_BLANKS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]+").expect("valid regex"));
static EXTRA_NEWLINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").expect("valid regex"));
static TRAILING_SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r" +\n").expect("valid regex"));
static LEADING_SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n +").expect("valid regex"));

/// Strip labels, wrapping quotes, chatty intros/outros and excess
/// whitespace from a generated title or description.
pub fn clean_generated_text(text: &str) -> String {
    let text = LABEL_PREFIX.replace(text, "");
    let text = WRAPPING_QUOTES.replace_all(&text, "");
    let text = INTRO.replace(&text, "");
    let text = OUTRO.replace(&text, "");
    let text = RUNS_OF_BLANKS.replace_all(&text, " ");
    let text = EXTRA_NEWLINES.replace_all(&text, "\n\n");
    let text = TRAILING_SPACES.replace_all(&text, "\n");
    let text = LEADING_SPACES.replace_all(&text, "\n");
    text.trim().to_string()
}
