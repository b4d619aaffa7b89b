use serde::{Deserialize, Serialize};

/// Editor language of a file, inferred from its extension
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    JavaScript,
    TypeScript,
    Json,
    Markdown,
    Yaml,
    Html,
    Css,
    Sql,
    Shell,
    Dockerfile,
    #[default]
    PlainText,
}

impl Language {
    /// Infer the language from a file name.
    ///
    /// The extension is the text after the last `.`; a name without a dot is
    /// used whole, so `Dockerfile` maps to [`Language::Dockerfile`].
    pub fn infer(file_name: &str) -> Self {
        let ext = file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext)
            .unwrap_or(file_name)
            .to_ascii_lowercase();

        match ext.as_str() {
            "py" => Language::Python,
            "js" | "jsx" => Language::JavaScript,
            "ts" | "tsx" => Language::TypeScript,
            "json" => Language::Json,
            "md" => Language::Markdown,
            "yaml" | "yml" => Language::Yaml,
            "html" => Language::Html,
            "css" => Language::Css,
            "sql" => Language::Sql,
            "sh" => Language::Shell,
            "dockerfile" => Language::Dockerfile,
            _ => Language::PlainText,
        }
    }

    /// Parse the serialized name (`"python"`, `"plaintext"`, ...)
    pub fn from_name(name: &str) -> Option<Self> {
        let language = match name.to_ascii_lowercase().as_str() {
            "python" => Language::Python,
            "javascript" => Language::JavaScript,
            "typescript" => Language::TypeScript,
            "json" => Language::Json,
            "markdown" => Language::Markdown,
            "yaml" => Language::Yaml,
            "html" => Language::Html,
            "css" => Language::Css,
            "sql" => Language::Sql,
            "shell" => Language::Shell,
            "dockerfile" => Language::Dockerfile,
            "plaintext" => Language::PlainText,
            _ => return None,
        };
        Some(language)
    }

    pub fn name(self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Json => "json",
            Language::Markdown => "markdown",
            Language::Yaml => "yaml",
            Language::Html => "html",
            Language::Css => "css",
            Language::Sql => "sql",
            Language::Shell => "shell",
            Language::Dockerfile => "dockerfile",
            Language::PlainText => "plaintext",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
