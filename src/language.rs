//! Language registry.
//!
//! The set of runnable languages is closed: each variant maps to one file
//! extension, one launcher command and one argument rule. Parsing a language
//! id is the only validation the language field gets.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A supported snippet language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    JavaScript,
    TypeScript,
    Python,
    Go,
}

/// Returned when a language id is not one of [`Language::ALL`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Unsupported language: '{0}'. Supported: javascript, typescript, python, go")]
pub struct UnknownLanguage(pub String);

impl Language {
    /// Every supported language, in display order.
    pub const ALL: [Self; 4] = [Self::JavaScript, Self::TypeScript, Self::Python, Self::Go];

    /// Identifier used on the wire.
    pub const fn id(self) -> &'static str {
        match self {
            Self::JavaScript => "javascript",
            Self::TypeScript => "typescript",
            Self::Python => "python",
            Self::Go => "go",
        }
    }

    /// Scratch file extension, including the leading dot.
    pub const fn extension(self) -> &'static str {
        match self {
            Self::JavaScript => ".js",
            Self::TypeScript => ".ts",
            Self::Python => ".py",
            Self::Go => ".go",
        }
    }

    /// Launcher used when configuration does not override it.
    pub fn default_launcher(self) -> String {
        match self {
            Self::JavaScript => "node".into(),
            Self::TypeScript => "npx".into(),
            Self::Python => default_python_launcher(),
            Self::Go => "go".into(),
        }
    }

    /// Starter snippet shown for a fresh editor buffer.
    pub const fn starter_template(self) -> &'static str {
        match self {
            Self::JavaScript => {
                "// JavaScript Example\n\
                 function greet(name) {\n  return `Hello, ${name}!`;\n}\n\n\
                 console.log(greet('World'));\n"
            }
            Self::TypeScript => {
                "// TypeScript Example\n\
                 function greet(name: string): string {\n  return `Hello, ${name}!`;\n}\n\n\
                 console.log(greet('World'));\n"
            }
            Self::Python => {
                "# Python Example\n\
                 def greet(name):\n    return f\"Hello, {name}!\"\n\n\
                 print(greet(\"World\"))\n"
            }
            Self::Go => {
                "// Go Example\n\
                 package main\n\nimport \"fmt\"\n\n\
                 func greet(name string) string {\n\treturn fmt.Sprintf(\"Hello, %s!\", name)\n}\n\n\
                 func main() {\n\tfmt.Println(greet(\"World\"))\n}\n"
            }
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Language {
    type Err = UnknownLanguage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|lang| lang.id() == s)
            .ok_or_else(|| UnknownLanguage(s.to_string()))
    }
}

/// Prefer a project-local virtualenv interpreter when one exists.
fn default_python_launcher() -> String {
    let venv = std::env::current_dir()
        .map(|dir| dir.join(".venv/bin/python"))
        .unwrap_or_else(|_| PathBuf::from(".venv/bin/python"));
    if venv.is_file() {
        venv.to_string_lossy().into_owned()
    } else {
        "python3".into()
    }
}

/// How to launch one language's scratch file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageProfile {
    pub language: Language,
    pub extension: &'static str,
    pub launcher: String,
}

impl LanguageProfile {
    fn new(language: Language, launcher: String) -> Self {
        Self {
            language,
            extension: language.extension(),
            launcher,
        }
    }

    /// Arguments passed to the launcher, in order. Never joined into a shell string.
    pub fn build_args(&self, path: &Path) -> Vec<String> {
        let path = path.to_string_lossy().into_owned();
        match self.language {
            Language::JavaScript | Language::Python => vec![path],
            Language::TypeScript => vec!["ts-node".into(), "--transpile-only".into(), path],
            Language::Go => vec!["run".into(), path],
        }
    }
}

/// Process-wide table of launch profiles, built once at startup.
#[derive(Debug, Clone)]
pub struct LanguageRegistry {
    profiles: HashMap<Language, LanguageProfile>,
}

impl LanguageRegistry {
    /// Build the registry, replacing default launchers with any overrides.
    pub fn new(overrides: &HashMap<Language, String>) -> Self {
        let profiles = Language::ALL
            .into_iter()
            .map(|lang| {
                let launcher = overrides
                    .get(&lang)
                    .cloned()
                    .unwrap_or_else(|| lang.default_launcher());
                (lang, LanguageProfile::new(lang, launcher))
            })
            .collect();
        Self { profiles }
    }

    /// Look up a profile by wire id.
    pub fn resolve(&self, id: &str) -> Option<&LanguageProfile> {
        id.parse::<Language>().ok().map(|lang| self.profile(lang))
    }

    /// Profile for an already-validated language.
    pub fn profile(&self, language: Language) -> &LanguageProfile {
        // Every variant is inserted in `new`.
        &self.profiles[&language]
    }

    /// Profiles in [`Language::ALL`] order.
    pub fn profiles(&self) -> impl Iterator<Item = &LanguageProfile> {
        Language::ALL.into_iter().map(move |lang| self.profile(lang))
    }
}

impl Default for LanguageRegistry {
    fn default() -> Self {
        Self::new(&HashMap::new())
    }
}
