/// Language id used when the extension is unknown
pub const PLAINTEXT: &str = "plaintext";

/// Editor language id for a file name, based on its extension
pub fn language_for(file_name: &str) -> &'static str {
    let extension = match file_name.rsplit_once('.') {
        Some((_, ext)) => ext.to_ascii_lowercase(),
        None => return PLAINTEXT,
    };

    match extension.as_str() {
        "js" | "jsx" => "javascript",
        "ts" | "tsx" => "typescript",
        "py" => "python",
        "java" => "java",
        "cpp" | "cc" | "cxx" => "cpp",
        "c" => "c",
        "json" => "json",
        "html" | "vue" => "html",
        "css" => "css",
        "scss" => "scss",
        "less" => "less",
        "md" => "markdown",
        "yml" | "yaml" => "yaml",
        "xml" | "svg" => "xml",
        "sql" => "sql",
        "sh" | "bash" => "shell",
        "php" => "php",
        "go" => "go",
        "rs" => "rust",
        "rb" => "ruby",
        "pl" => "perl",
        "lua" => "lua",
        "swift" => "swift",
        "dart" => "dart",
        "graphql" => "graphql",
        "kt" => "kotlin",
        "scala" => "scala",
        _ => PLAINTEXT,
    }
}
