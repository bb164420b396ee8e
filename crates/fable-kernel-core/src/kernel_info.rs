//! Kernel metadata reported to notebook frontends.

use serde::Serialize;

/// Language description for syntax highlighting and file export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LanguageInfo {
    pub name: String,
    pub mimetype: String,
    pub pygments_lexer: String,
    pub codemirror_mode: String,
    pub file_extension: String,
}

/// Answer to a frontend's `kernel_info_request`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KernelInfo {
    pub implementation: String,
    pub implementation_version: String,
    pub language: String,
    pub banner: String,
    pub language_info: LanguageInfo,
}

impl Default for KernelInfo {
    fn default() -> Self {
        Self {
            implementation: "Fable Python".to_string(),
            implementation_version: env!("CARGO_PKG_VERSION").to_string(),
            language: "fsharp".to_string(),
            banner: "Fable Python is a compiler designed to make F# a first-class citizen \
                     of the Python ecosystem."
                .to_string(),
            language_info: LanguageInfo {
                name: "fsharp".to_string(),
                mimetype: "text/x-fsharp".to_string(),
                pygments_lexer: "fsharp".to_string(),
                codemirror_mode: "fsharp".to_string(),
                file_extension: ".fs".to_string(),
            },
        }
    }
}
