//! Language detection from a filename's extension.

use std::path::Path;

/// Label returned for files whose extension is missing or not in the table.
pub const UNKNOWN_LANGUAGE: &str = "Unknown";

/// Extension → canonical language label. Extensions are lowercase and dotted.
const LANGUAGE_TABLE: &[(&str, &str)] = &[
    (".py", "Python"),
    (".js", "JavaScript"),
    (".jsx", "JavaScript"),
    (".ts", "TypeScript"),
    (".tsx", "TypeScript"),
    (".java", "Java"),
    (".c", "C"),
    (".h", "C"),
    (".cpp", "C++"),
    (".cc", "C++"),
    (".hpp", "C++"),
    (".cs", "C#"),
    (".go", "Go"),
    (".rs", "Rust"),
    (".php", "PHP"),
    (".rb", "Ruby"),
    (".kt", "Kotlin"),
    (".swift", "Swift"),
    (".scala", "Scala"),
    (".txt", "Text"),
];

/// Returns the lowercase dotted extension of `filename` (`"main.PY"` → `".py"`).
pub fn extension_of(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
}

/// Maps a filename to its language label. Never fails.
pub fn detect(filename: &str) -> &'static str {
    let Some(ext) = extension_of(filename) else {
        return UNKNOWN_LANGUAGE;
    };
    LANGUAGE_TABLE
        .iter()
        .find(|(candidate, _)| *candidate == ext)
        .map(|(_, label)| *label)
        .unwrap_or(UNKNOWN_LANGUAGE)
}

/// All distinct labels the detector can produce, in table order.
pub fn known_languages() -> Vec<&'static str> {
    let mut labels: Vec<&'static str> = Vec::new();
    for (_, label) in LANGUAGE_TABLE {
        if !labels.contains(label) {
            labels.push(label);
        }
    }
    labels
}
