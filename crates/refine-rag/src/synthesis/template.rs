//! Prompt templates with named `{placeholder}` slots

use std::collections::HashMap;
use std::path::Path;

use crate::config::PromptConfig;
use crate::error::{Error, Result};

/// Every placeholder synthesis knows how to bind
pub const KNOWN_PLACEHOLDERS: &[&str] = &["context_str", "query_str", "existing_answer", "context_msg"];

/// Placeholders the question-answer template must contain
pub const QA_PLACEHOLDERS: &[&str] = &["context_str", "query_str"];

/// Placeholders the refine template must contain
pub const REFINE_PLACEHOLDERS: &[&str] = &["query_str", "existing_answer", "context_msg"];

pub const DEFAULT_QA_TEMPLATE: &str = "Context information is below.\n\
---------------------\n\
{context_str}\n\
---------------------\n\
Given the context information and not prior knowledge, answer the question: {query_str}\n";

pub const DEFAULT_REFINE_TEMPLATE: &str = "The original question is as follows: {query_str}\n\
We have provided an existing answer: {existing_answer}\n\
We have the opportunity to refine the existing answer (only if needed) with some more context below.\n\
------------\n\
{context_msg}\n\
------------\n\
Given the new context, refine the original answer to better answer the question. \
If the context isn't useful, return the original answer.";

/// A template and the placeholders it substitutes
///
/// Only the declared placeholders are substituted; other brace text (JSON
/// examples, code) passes through untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptTemplate {
    text: String,
    placeholders: Vec<String>,
}

impl PromptTemplate {
    /// Create a template, checking that every required placeholder appears
    ///
    /// Only names from `KNOWN_PLACEHOLDERS` can be declared.
    pub fn new(text: impl Into<String>, required: &[&str]) -> Result<Self> {
        let text = text.into();
        if let Some(unknown) = required
            .iter()
            .copied()
            .find(|name| !KNOWN_PLACEHOLDERS.contains(name))
        {
            return Err(Error::template(format!(
                "unknown placeholder {{{}}}; expected one of {}",
                unknown,
                KNOWN_PLACEHOLDERS.join(", ")
            )));
        }
        let missing: Vec<&str> = required
            .iter()
            .copied()
            .filter(|name| !text.contains(&format!("{{{}}}", name)))
            .collect();

        if !missing.is_empty() {
            return Err(Error::template(format!(
                "template is missing placeholder(s): {}",
                missing
                    .iter()
                    .map(|n| format!("{{{}}}", n))
                    .collect::<Vec<_>>()
                    .join(", ")
            )));
        }

        Ok(Self {
            text,
            placeholders: required.iter().map(|s| s.to_string()).collect(),
        })
    }

    /// Read a template file
    pub fn from_file(path: &Path, required: &[&str]) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::template(format!("cannot read template {}: {}", path.display(), e))
        })?;
        Self::new(text, required)
            .map_err(|e| Error::template(format!("{}: {}", path.display(), e)))
    }

    pub fn default_qa() -> Self {
        Self {
            text: DEFAULT_QA_TEMPLATE.to_string(),
            placeholders: QA_PLACEHOLDERS.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn default_refine() -> Self {
        Self {
            text: DEFAULT_REFINE_TEMPLATE.to_string(),
            placeholders: REFINE_PLACEHOLDERS.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Substitute every placeholder in one pass
    ///
    /// Bound values are inserted verbatim and never rescanned, so an answer
    /// containing `{query_str}` stays as written.
    pub fn render(&self, bindings: &HashMap<&str, &str>) -> Result<String> {
        let slots: Vec<(String, &str)> = self
            .placeholders
            .iter()
            .map(|name| {
                bindings
                    .get(name.as_str())
                    .map(|value| (format!("{{{}}}", name), *value))
                    .ok_or_else(|| Error::template(format!("no value bound for {{{}}}", name)))
            })
            .collect::<Result<_>>()?;

        let mut out = String::with_capacity(self.text.len());
        let mut rest = self.text.as_str();

        while let Some(pos) = rest.find('{') {
            out.push_str(&rest[..pos]);
            let tail = &rest[pos..];
            match slots.iter().find(|(slot, _)| tail.starts_with(slot.as_str())) {
                Some((slot, value)) => {
                    out.push_str(value);
                    rest = &tail[slot.len()..];
                }
                None => {
                    out.push('{');
                    rest = &tail[1..];
                }
            }
        }
        out.push_str(rest);

        Ok(out)
    }
}

/// The question-answer and refine templates used for synthesis
#[derive(Debug, Clone, PartialEq)]
pub struct Prompts {
    pub qa: PromptTemplate,
    pub refine: PromptTemplate,
}

impl Default for Prompts {
    fn default() -> Self {
        Self {
            qa: PromptTemplate::default_qa(),
            refine: PromptTemplate::default_refine(),
        }
    }
}

impl Prompts {
    /// Defaults, replaced by any template files named in the config
    pub fn from_config(config: &PromptConfig) -> Result<Self> {
        let qa = match &config.qa_template_path {
            Some(path) => PromptTemplate::from_file(path, QA_PLACEHOLDERS)?,
            None => PromptTemplate::default_qa(),
        };
        let refine = match &config.refine_template_path {
            Some(path) => PromptTemplate::from_file(path, REFINE_PLACEHOLDERS)?,
            None => PromptTemplate::default_refine(),
        };
        Ok(Self { qa, refine })
    }

    pub fn render_qa(&self, context: &str, query: &str) -> Result<String> {
        self.qa.render(&HashMap::from([
            ("context_str", context),
            ("query_str", query),
        ]))
    }

    pub fn render_refine(&self, query: &str, existing_answer: &str, context: &str) -> Result<String> {
        self.refine.render(&HashMap::from([
            ("query_str", query),
            ("existing_answer", existing_answer),
            ("context_msg", context),
        ]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_declare_required_placeholders() {
        assert!(PromptTemplate::new(DEFAULT_QA_TEMPLATE, QA_PLACEHOLDERS).is_ok());
        assert!(PromptTemplate::new(DEFAULT_REFINE_TEMPLATE, REFINE_PLACEHOLDERS).is_ok());
    }

    #[test]
    fn test_missing_placeholder_rejected() {
        let err = PromptTemplate::new("Answer {query_str}", QA_PLACEHOLDERS).unwrap_err();
        assert!(matches!(err, Error::Template(_)));
        assert!(err.to_string().contains("{context_str}"));
    }

    #[test]
    fn test_unknown_placeholder_rejected() {
        let err =
            PromptTemplate::new("{persona}: {query_str}", &["persona", "query_str"]).unwrap_err();
        assert!(matches!(err, Error::Template(_)));
        assert!(err.to_string().contains("{persona}"));
    }

    #[test]
    fn test_render_substitutes_once_and_keeps_other_braces() {
        let template =
            PromptTemplate::new("{\"q\": \"{query_str}\"} {unknown} {query_str}", &["query_str"])
                .unwrap();
        let out = template
            .render(&HashMap::from([("query_str", "why {query_str}?")]))
            .unwrap();
        assert_eq!(out, "{\"q\": \"why {query_str}?\"} {unknown} why {query_str}?");
    }

    #[test]
    fn test_render_missing_binding_fails() {
        let result = PromptTemplate::default_qa().render(&HashMap::from([("query_str", "q")]));
        assert!(matches!(result, Err(Error::Template(_))));
    }

    #[test]
    fn test_prompts_render() {
        let prompts = Prompts::default();
        let qa = prompts.render_qa("Paris is in France.", "Where is Paris?").unwrap();
        assert!(qa.contains("Paris is in France.\n"));
        assert!(qa.ends_with("answer the question: Where is Paris?\n"));

        let refine = prompts.render_refine("Q", "A0", "more").unwrap();
        assert!(refine.contains("existing answer: A0"));
        assert!(refine.contains("------------\nmore\n------------"));
    }

    #[test]
    fn test_template_file_override() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "CTX={{context_str}} Q={{query_str}}").unwrap();

        let config = PromptConfig {
            qa_template_path: Some(file.path().to_path_buf()),
            refine_template_path: None,
        };
        let prompts = Prompts::from_config(&config).unwrap();
        assert_eq!(prompts.render_qa("c", "q").unwrap(), "CTX=c Q=q");
        assert_eq!(prompts.refine, PromptTemplate::default_refine());

        let mut bad = NamedTempFile::new().unwrap();
        write!(bad, "no slots here").unwrap();
        let config = PromptConfig {
            qa_template_path: None,
            refine_template_path: Some(bad.path().to_path_buf()),
        };
        assert!(matches!(Prompts::from_config(&config), Err(Error::Template(_))));
    }

    #[test]
    fn test_bundled_japanese_templates() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("templates");
        let config = PromptConfig {
            qa_template_path: Some(dir.join("qa_ja.txt")),
            refine_template_path: Some(dir.join("refine_ja.txt")),
        };
        let prompts = Prompts::from_config(&config).unwrap();

        let qa = prompts.render_qa("東京は日本の首都です。", "首都は?").unwrap();
        assert!(qa.starts_with("コンテキスト情報は以下のとおりです。"));
        assert!(qa.contains("---------------------\n東京は日本の首都です。\n---------------------"));
        assert!(qa.ends_with("質問に答えてください。:首都は?\n"));

        let refine = prompts.render_refine("首都は?", "東京", "追加").unwrap();
        assert!(refine.contains("既存の回答を提供しました: 東京\n"));
        assert!(refine.contains("------------\n追加\n------------"));
    }
}
